//! Visitor-facing chat assistant. Best effort: collaborator failures degrade
//! to a fixed apology instead of an error.

use crate::ai::{AiError, Content, ContentGenerator, ContentRole, GenerationRequest};
use kamitori_common::model::{
    Page,
    chat::{ChatRole, ChatTurn},
    shop::Shop,
};
use kamitori_db::{DbError, Store};
use thiserror::Error;
use tracing::warn;

pub const APOLOGY: &str =
    "Sorry, I am having trouble connecting to my brain right now. Please try again later.";
pub const DIRECTORY_PAGE_SIZE: u32 = 1000;
pub const TEMPERATURE: f32 = 0.7;
const MISSING: &str = "-";

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum ChatReply {
    Answered(String),
    Degraded(String),
}

impl ChatReply {
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            ChatReply::Answered(text) | ChatReply::Degraded(text) => text,
        }
    }
}

#[derive(Debug, Error)]
enum AssistantError {
    #[error("Loading the shop directory failed: {0}")]
    Store(#[from] DbError),
    #[error(transparent)]
    Generation(#[from] AiError),
}

pub async fn respond(
    store: &dyn Store,
    generator: &dyn ContentGenerator,
    message: String,
    history: Vec<ChatTurn>,
) -> ChatReply {
    match try_respond(store, generator, message, history).await {
        Ok(answer) => ChatReply::Answered(answer),
        Err(err) => {
            warn!(error = %err, "Assistant degraded to apology");
            ChatReply::Degraded(APOLOGY.to_owned())
        }
    }
}

async fn try_respond(
    store: &dyn Store,
    generator: &dyn ContentGenerator,
    message: String,
    history: Vec<ChatTurn>,
) -> Result<String, AssistantError> {
    let shops = store.fetch_shops(Page::new(0, DIRECTORY_PAGE_SIZE)).await?;

    let contents = history
        .into_iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => ContentRole::User,
                ChatRole::Assistant => ContentRole::Model,
            };
            Content::text(role, turn.content)
        })
        .chain([Content::text(ContentRole::User, message)])
        .collect();

    let request = GenerationRequest {
        system_instruction: Some(system_instruction(&shop_directory(&shops))),
        contents,
        temperature: Some(TEMPERATURE),
        response_schema: None,
    };

    Ok(generator.generate(request).await?)
}

/// One line per shop.
fn shop_directory(shops: &[Shop]) -> String {
    shops
        .iter()
        .map(|shop| {
            format!(
                "- ID: {}, Name: {}, Category: {}, Description: {}, Location: {}, Map: {}\n",
                shop.id,
                shop.name,
                shop.category.as_deref().unwrap_or(MISSING),
                shop.description.as_deref().unwrap_or(MISSING),
                shop.location.as_deref().unwrap_or(MISSING),
                shop.map_url.as_deref().unwrap_or(MISSING),
            )
        })
        .collect()
}

fn system_instruction(directory: &str) -> String {
    format!(
        "You are a friendly and helpful AI tourist guide for the 'Kamitori Shopping Street' \
(Kamitori Shoueikai) in Kumamoto, Japan.

Here is a list of shops in the shopping street:
{directory}
Please answer the user's question based on this information.
If the user asks about something not in the list, politely say you don't have information about that, \
but try to recommend something similar from the list if possible.
If the user asks where a shop is or how to get there, include the shop's Map URL in your answer.
Respond in the same language as the user's question (Japanese, English, Chinese, Korean, etc.).
Keep your answers concise and engaging."
    )
}

#[cfg(test)]
mod tests {
    use super::{APOLOGY, ChatReply, TEMPERATURE, respond, shop_directory};
    use crate::ai::{Content, ContentRole, testing::StubGenerator};
    use kamitori_common::model::{
        Id,
        chat::{ChatRole, ChatTurn},
        shop::{NewShop, Shop},
    };
    use kamitori_db::{Store, memory::MemoryStore};

    async fn directory() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_shop(NewShop {
                name: "Ramen Kumamoto".to_owned(),
                category: Some("ramen".to_owned()),
                map_url: Some("https://maps.example/ramen".to_owned()),
                ..NewShop::default()
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn answers_with_directory_context_and_history() {
        let store = directory().await;
        let generator = StubGenerator::answering("Try Ramen Kumamoto!");
        let history = vec![
            ChatTurn {
                role: ChatRole::Assistant,
                content: "Welcome!".to_owned(),
            },
            ChatTurn {
                role: ChatRole::User,
                content: "I am hungry".to_owned(),
            },
        ];

        let reply = respond(&store, &generator, "Where is ramen?".to_owned(), history).await;

        assert_eq!(reply, ChatReply::Answered("Try Ramen Kumamoto!".to_owned()));
        let request = generator.last_request();
        let instruction = request.system_instruction.unwrap();
        assert!(instruction.contains(
            "- ID: 1, Name: Ramen Kumamoto, Category: ramen, Description: -, \
             Location: -, Map: https://maps.example/ramen"
        ));
        assert_eq!(request.temperature, Some(TEMPERATURE));
        assert_eq!(request.response_schema, None);
        assert_eq!(
            request.contents,
            [
                Content::text(ContentRole::Model, "Welcome!"),
                Content::text(ContentRole::User, "I am hungry"),
                Content::text(ContentRole::User, "Where is ramen?"),
            ]
        );
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_apology() {
        let store = directory().await;
        let generator = StubGenerator::failing();

        let reply = respond(&store, &generator, "hello".to_owned(), Vec::new()).await;

        assert_eq!(reply, ChatReply::Degraded(APOLOGY.to_owned()));
        assert_eq!(reply.into_text(), APOLOGY);
    }

    #[test]
    fn directory_has_one_line_per_shop() {
        let shops = [
            Shop {
                id: Id::new(1),
                name: "Cafe X".to_owned(),
                location: Some("1-2-3".to_owned()),
                ..Shop::default()
            },
            Shop {
                id: Id::new(2),
                name: "Books".to_owned(),
                ..Shop::default()
            },
        ];

        assert_eq!(
            shop_directory(&shops),
            "- ID: 1, Name: Cafe X, Category: -, Description: -, Location: 1-2-3, Map: -\n\
             - ID: 2, Name: Books, Category: -, Description: -, Location: -, Map: -\n"
        );
        assert_eq!(shop_directory(&[]), "");
    }
}
