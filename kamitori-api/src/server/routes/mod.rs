use crate::server::ServerRouter;
use axum::Router;

mod auth;
mod chat;
mod health;
mod posts;
mod shops;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(shops::routes())
        .merge(posts::routes())
        .merge(chat::routes())
}
