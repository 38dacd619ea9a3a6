use crate::{
    server::{Result, ServerError, ServerRouter, ServerState, extract::Query, json::Json},
    services::posts::{PostPipeline, PostUpload},
};
use axum::extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection};
use axum_extra::routing::{RouterExt, TypedPath};
use kamitori_common::model::{Id, Page, post::Post};
use kamitori_db::Store;
use serde::Deserialize;
use std::sync::Arc;

/// Photos straight off a phone camera need more than axum's default 2 MiB.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(list_posts)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Post>>> {
    let posts = store.fetch_posts(page).await?;

    Ok(Json(posts))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(state): State<ServerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Post>> {
    let upload = read_upload(multipart?).await?;

    let pipeline = PostPipeline {
        store: state.store.as_ref(),
        generator: state.generator.as_ref(),
        uploads: &state.uploads,
    };
    let post = pipeline.create_post(upload).await?;

    Ok(Json(post))
}

async fn read_upload(mut multipart: Multipart) -> Result<PostUpload> {
    let mut shop_id = None;
    let mut text = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some("shop_id") => {
                let raw = field.text().await?;
                let id = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ServerError::InvalidField("shop_id"))?;
                shop_id = Some(Id::new(id));
            }
            Some("text") => text = Some(field.text().await?),
            Some("image") => {
                let filename = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await?;
                image = Some((bytes.to_vec(), filename));
            }
            _ => {}
        }
    }

    let shop_id = shop_id.ok_or(ServerError::MissingField("shop_id"))?;
    let text = text.ok_or(ServerError::MissingField("text"))?;
    let (image, image_filename) = image.ok_or(ServerError::MissingField("image"))?;

    if text.trim().is_empty() {
        return Err(ServerError::InvalidField("text"));
    }
    if image.is_empty() {
        return Err(ServerError::InvalidField("image"));
    }

    Ok(PostUpload {
        shop_id,
        text,
        image,
        image_filename,
    })
}
