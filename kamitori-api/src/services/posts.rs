//! Post creation: store the photo, have the model write and translate the
//! post, then persist the post and its translations as one unit.

use crate::{
    ai::{AiError, Content, ContentGenerator, ContentRole, GenerationRequest, Part},
    services::uploads::{UploadDir, image_mime_type},
};
use kamitori_common::model::{
    Id,
    post::{GeneratedPost, NewPost, Post},
    shop::ShopMarker,
};
use kamitori_db::{DbError, Store};
use serde_json::{Value, json};
use std::io;
use thiserror::Error;
use tracing::{debug, info};

const POST_INSTRUCTION: &str = "\
You are a professional social media manager for a shopping street in Japan.
Based on the image and the shop owner's comment (text), create an engaging post for SNS in Japanese.
Then, translate the content into English (en), Traditional Chinese (zh_tw), Simplified Chinese (zh_cn), and Korean (ko).

Return ONLY a JSON object with the following structure:
{
    \"enhanced_text\": \"Japanese content...\",
    \"en\": \"English content...\",
    \"zh_tw\": \"Traditional Chinese content...\",
    \"zh_cn\": \"Simplified Chinese content...\",
    \"ko\": \"Korean content...\"
}";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Storing the image failed: {0}")]
    ImageWrite(#[from] io::Error),
    #[error(transparent)]
    Generation(#[from] AiError),
    #[error("The generated post contained no text in any language")]
    BlankGeneration,
    #[error("Saving the post failed: {0}")]
    Store(#[from] DbError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostUpload {
    pub shop_id: Id<ShopMarker>,
    pub text: String,
    pub image: Vec<u8>,
    pub image_filename: Option<String>,
}

pub struct PostPipeline<'a> {
    pub store: &'a dyn Store,
    pub generator: &'a dyn ContentGenerator,
    pub uploads: &'a UploadDir,
}

impl PostPipeline<'_> {
    /// Runs the whole pipeline. On error nothing is committed to the store,
    /// although the image file may already be on disk.
    pub async fn create_post(&self, upload: PostUpload) -> Result<Post, PipelineError> {
        let PostUpload {
            shop_id,
            text,
            image,
            image_filename,
        } = upload;

        let stored = self
            .uploads
            .save_image(&image, image_filename.as_deref())
            .await?;
        debug!(path = %stored.file_path.display(), "Stored post image");

        let mime_type = image_mime_type(image_filename.as_deref());
        let translations = self
            .generate(image, mime_type, &text)
            .await?
            .into_translations();
        if translations.is_empty() {
            return Err(PipelineError::BlankGeneration);
        }
        debug!(%shop_id, languages = translations.len(), "Generated post content");

        let post = NewPost {
            shop_id,
            original_text: text,
            image_path: stored.web_path,
        };
        let post = self
            .store
            .create_post(post, translations)
            .await?;

        info!(
            post_id = %post.id,
            %shop_id,
            translations = post.translations.len(),
            "Created post"
        );
        Ok(post)
    }

    async fn generate(
        &self,
        image: Vec<u8>,
        mime_type: &str,
        text: &str,
    ) -> Result<GeneratedPost, AiError> {
        let request = GenerationRequest {
            system_instruction: None,
            contents: vec![Content {
                role: ContentRole::User,
                parts: vec![
                    Part::Text(POST_INSTRUCTION.to_owned()),
                    Part::Text(format!("Owner's comment: {text}")),
                    Part::Image {
                        mime_type: mime_type.to_owned(),
                        data: image,
                    },
                ],
            }],
            temperature: None,
            response_schema: Some(generated_post_schema()),
        };

        let answer = self.generator.generate(request).await?;
        Ok(serde_json::from_str(&answer)?)
    }
}

fn generated_post_schema() -> Value {
    let properties: serde_json::Map<String, Value> = GeneratedPost::FIELDS
        .iter()
        .map(|field| ((*field).to_owned(), json!({"type": "STRING"})))
        .collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": GeneratedPost::FIELDS,
    })
}

#[cfg(test)]
mod tests {
    use super::{PipelineError, PostPipeline, PostUpload};
    use crate::{
        ai::{AiError, Part, testing::StubGenerator},
        services::uploads::UploadDir,
    };
    use kamitori_common::model::{
        Id,
        shop::{NewShop, ShopMarker},
    };
    use kamitori_db::{DbError, Store, memory::MemoryStore};
    use serde_json::json;

    fn generated_json() -> String {
        json!({
            "enhanced_text": "新作のケーキが登場！",
            "en": "Our new cake is here!",
            "zh_tw": "新蛋糕登場！",
            "zh_cn": "新蛋糕登场！",
            "ko": "새 케이크가 나왔어요!"
        })
        .to_string()
    }

    async fn store_with_shop() -> (MemoryStore, Id<ShopMarker>) {
        let store = MemoryStore::new();
        let shop = store
            .create_shop(NewShop {
                name: "Cafe X".to_owned(),
                ..NewShop::default()
            })
            .await
            .unwrap();
        (store, shop.id)
    }

    fn upload(shop_id: Id<ShopMarker>) -> PostUpload {
        PostUpload {
            shop_id,
            text: "新しいケーキです".to_owned(),
            image: b"\x89PNG fake".to_vec(),
            image_filename: Some("cake.png".to_owned()),
        }
    }

    #[tokio::test]
    async fn creates_post_with_all_translations() {
        let (store, shop_id) = store_with_shop().await;
        let generator = StubGenerator::answering(generated_json());
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        let post = pipeline.create_post(upload(shop_id)).await.unwrap();

        let image_path = post.image_path.as_deref().unwrap();
        assert!(image_path.starts_with("/static/images/") && image_path.ends_with(".png"));
        assert_eq!(post.shop_id, shop_id);
        assert_eq!(post.original_text, "新しいケーキです");
        let languages: Vec<_> = post
            .translations
            .iter()
            .map(|translation| translation.language.get())
            .collect();
        assert_eq!(languages, ["ja", "en", "zh-tw", "zh-cn", "ko"]);
        assert_eq!(post.translations[1].translated_content, "Our new cake is here!");
        assert_eq!(store.fetch_post(post.id).await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn generator_receives_image_and_comment_with_schema() {
        let (store, shop_id) = store_with_shop().await;
        let generator = StubGenerator::answering(generated_json());
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        pipeline.create_post(upload(shop_id)).await.unwrap();

        let request = generator.last_request();
        let schema = request.response_schema.unwrap();
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);
        let parts = &request.contents[0].parts;
        assert!(parts.contains(&Part::Text("Owner's comment: 新しいケーキです".to_owned())));
        assert!(parts.contains(&Part::Image {
            mime_type: "image/png".to_owned(),
            data: b"\x89PNG fake".to_vec(),
        }));
    }

    #[tokio::test]
    async fn generator_failure_writes_no_rows() {
        let (store, shop_id) = store_with_shop().await;
        let generator = StubGenerator::failing();
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        let result = pipeline.create_post(upload(shop_id)).await;

        assert!(matches!(result, Err(PipelineError::Generation(_))));
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.translation_count(), 0);
    }

    #[tokio::test]
    async fn malformed_generator_json_writes_no_rows() {
        let (store, shop_id) = store_with_shop().await;
        let generator = StubGenerator::answering(r#"{"enhanced_text": "only one field"}"#);
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        let result = pipeline.create_post(upload(shop_id)).await;

        assert!(matches!(
            result,
            Err(PipelineError::Generation(AiError::MalformedJson(_)))
        ));
        assert_eq!(store.post_count(), 0);
    }

    #[tokio::test]
    async fn blank_generation_writes_no_rows() {
        let (store, shop_id) = store_with_shop().await;
        let generator = StubGenerator::answering(
            json!({"enhanced_text": "", "en": " ", "zh_tw": "", "zh_cn": "", "ko": ""})
                .to_string(),
        );
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        let result = pipeline.create_post(upload(shop_id)).await;

        assert!(matches!(result, Err(PipelineError::BlankGeneration)));
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.translation_count(), 0);
    }

    #[tokio::test]
    async fn missing_shop_writes_no_rows() {
        let store = MemoryStore::new();
        let generator = StubGenerator::answering(generated_json());
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        let result = pipeline.create_post(upload(Id::new(404))).await;

        assert!(matches!(
            result,
            Err(PipelineError::Store(DbError::ForeignKeyViolation(_)))
        ));
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.translation_count(), 0);
    }

    #[tokio::test]
    async fn failing_translation_insert_writes_no_rows() {
        let (store, shop_id) = store_with_shop().await;
        store.fail_translation_inserts("zh-cn");
        let generator = StubGenerator::answering(generated_json());
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());
        let pipeline = PostPipeline {
            store: &store,
            generator: &generator,
            uploads: &uploads,
        };

        let result = pipeline.create_post(upload(shop_id)).await;

        assert!(matches!(result, Err(PipelineError::Store(_))));
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.translation_count(), 0);
    }
}
