use crate::{
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, extract::Form, json::Json},
    services::identity::{Identity, Registration},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use kamitori_common::model::{auth::TokenResponse, user::User};
use kamitori_db::Store;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_get(me)
}

/// OAuth2 password-grant form. `username` carries the email.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<Arc<dyn Store>>,
    State(identity): State<Arc<Identity>>,
    Json(registration): Json<Registration>,
) -> Result<Json<TokenResponse>> {
    let token = identity.register(store.as_ref(), registration).await?;

    Ok(Json(token))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/token", rejection(ServerError))]
struct TokenPath();

async fn login(
    TokenPath(): TokenPath,
    State(store): State<Arc<dyn Store>>,
    State(identity): State<Arc<Identity>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>> {
    let token = identity
        .login(store.as_ref(), form.username, &form.password)
        .await?;

    Ok(Json(token))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/me", rejection(ServerError))]
struct MePath();

async fn me(MePath(): MePath, user: AuthenticatedUser) -> Json<User> {
    Json(user.user().clone())
}
