use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, extract::Query, json::Json,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use kamitori_common::model::{
    Id, Page,
    shop::{NewShop, Shop, ShopMarker, ShopUpdate},
};
use kamitori_db::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_shops)
        .typed_post(create_shop)
        .typed_get(get_shop)
        .typed_put(update_shop)
        .typed_delete(delete_shop)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/shops", rejection(ServerError))]
struct ShopsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/shops/{id}", rejection(ServerError))]
struct ShopPath {
    id: Id<ShopMarker>,
}

async fn list_shops(
    ShopsPath(): ShopsPath,
    State(store): State<Arc<dyn Store>>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Shop>>> {
    let shops = store.fetch_shops(page).await?;

    Ok(Json(shops))
}

async fn create_shop(
    ShopsPath(): ShopsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(shop): Json<NewShop>,
) -> Result<Json<Shop>> {
    let shop = store.create_shop(shop).await?;
    info!(shop_id = %shop.id, user_id = %user.user().id, "Created shop");

    Ok(Json(shop))
}

async fn get_shop(
    ShopPath { id }: ShopPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Shop>> {
    let shop = store
        .fetch_shop(id)
        .await?
        .ok_or(ServerError::ShopByIdNotFound(id))?;

    Ok(Json(shop))
}

async fn update_shop(
    ShopPath { id }: ShopPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(update): Json<ShopUpdate>,
) -> Result<Json<Shop>> {
    let shop = store
        .update_shop(id, update)
        .await?
        .ok_or(ServerError::ShopByIdNotFound(id))?;
    info!(shop_id = %id, user_id = %user.user().id, "Updated shop");

    Ok(Json(shop))
}

async fn delete_shop(
    ShopPath { id }: ShopPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Shop>> {
    let shop = store
        .delete_shop(id)
        .await?
        .ok_or(ServerError::ShopByIdNotFound(id))?;
    info!(shop_id = %id, user_id = %user.user().id, "Deleted shop");

    Ok(Json(shop))
}
