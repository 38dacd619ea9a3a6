use crate::server::{ServerError, ServerRouter, json::Json};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(root).typed_get(health)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Welcome {
    message: &'static str,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Health {
    status: &'static str,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct RootPath();

async fn root(RootPath(): RootPath) -> Json<Welcome> {
    Json(Welcome {
        message: "Welcome to Kamitori Connect API",
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/health", rejection(ServerError))]
struct HealthPath();

async fn health(HealthPath(): HealthPath) -> Json<Health> {
    Json(Health { status: "ok" })
}
