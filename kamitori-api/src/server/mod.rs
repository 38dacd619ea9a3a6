use crate::{
    ai::ContentGenerator,
    services::{
        identity::{Identity, IdentityError},
        posts::PipelineError,
        uploads::{STATIC_URL_PREFIX, UploadDir},
    },
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, Uri, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use kamitori_common::model::{Id, shop::ShopMarker};
use kamitori_db::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, normalize_path::NormalizePath, services::ServeDir, trace::TraceLayer};
use tracing::error;

mod auth;
mod extract;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn ContentGenerator>,
    pub identity: Arc<Identity>,
    pub uploads: Arc<UploadDir>,
}

/// The complete application, with static files, CORS and request tracing.
/// Trailing slashes are trimmed before routing.
pub fn app(state: ServerState, cors: CorsLayer) -> NormalizePath<Router> {
    let static_files = ServeDir::new(state.uploads.root());

    let router = routes()
        .nest_service(STATIC_URL_PREFIX, static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    NormalizePath::trim_trailing_slash(router)
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Incoming multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading multipart form failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Form field `{0}` is missing")]
    MissingField(&'static str),
    #[error("Form field `{0}` is invalid")]
    InvalidField(&'static str),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Shop not found")]
    ShopByIdNotFound(Id<ShopMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::ShopByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(rejection) => rejection.status(),
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(err) => err.status(),
            ServerError::InvalidAuthorizationHeader(_) => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_)
            | ServerError::FormRejection(_)
            | ServerError::MissingField(_)
            | ServerError::InvalidField(_) => StatusCode::BAD_REQUEST,
            ServerError::Identity(err) => match err {
                IdentityError::InvalidInviteCode | IdentityError::EmailTaken => {
                    StatusCode::BAD_REQUEST
                }
                IdentityError::IncorrectCredentials | IdentityError::UnknownSubject => {
                    StatusCode::UNAUTHORIZED
                }
                IdentityError::Token(token) if token.is_credentials_failure() => {
                    StatusCode::UNAUTHORIZED
                }
                IdentityError::Token(_)
                | IdentityError::PasswordHash(_)
                | IdentityError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            detail: self.to_string(),
        };
        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
