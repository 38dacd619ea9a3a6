use crate::{
    ai::ContentGenerator,
    server::{ServerError, ServerRouter, json::Json},
    services::assistant::{self, ChatReply},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use kamitori_common::model::chat::{ChatRequest, ChatResponse};
use kamitori_db::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(chat)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/chat", rejection(ServerError))]
struct ChatPath();

async fn chat(
    ChatPath(): ChatPath,
    State(store): State<Arc<dyn Store>>,
    State(generator): State<Arc<dyn ContentGenerator>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let reply =
        assistant::respond(store.as_ref(), generator.as_ref(), request.message, request.history)
            .await;

    if let ChatReply::Degraded(_) = reply {
        debug!("Chat answered with apology");
    }

    Json(ChatResponse {
        response: reply.into_text(),
    })
}
