use ai::{AiError, gemini::GeminiClient};
use axum::{
    extract::Request,
    http::{HeaderValue, header::InvalidHeaderValue},
};
use config::{Env, TokenLifetimeError};
use kamitori_common::model::auth::TokenSigner;
use kamitori_db::{DbClient, DbError};
use server::ServerState;
use services::{identity::Identity, uploads::UploadDir};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::signal;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ai;
mod config;
mod server;
mod services;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error preparing database: {0}")]
    Database(#[from] DbError),
    #[error("Error building AI client: {0}")]
    Ai(#[from] AiError),
    #[error("ACCESS_TOKEN_EXPIRE_MINUTES is invalid: {0}")]
    TokenLifetime(#[from] TokenLifetimeError),
    #[error("Invalid CORS origin {0:?}: {1}")]
    CorsOrigin(String, InvalidHeaderValue),
    #[error("Error creating static directory: {0}")]
    StaticDir(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kamitori_api=debug,\
                kamitori_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

/// Credentials are allowed, so methods and headers mirror the request instead of `*`.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, InitError> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| InitError::CorsOrigin(origin.clone(), err))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

fn identity(env: &Env) -> Result<Identity, InitError> {
    let lifetime = env.token_lifetime()?;

    if env.secret_key.is_none() {
        warn!("SECRET_KEY is not set, tokens can neither be issued nor verified");
    }
    if env.invite_code.is_none() {
        warn!("INVITE_CODE is not set, registration is closed");
    }

    let signer = TokenSigner::new(env.secret_key.as_deref(), lifetime);
    Ok(Identity::new(signer, env.invite_code.clone()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!(error = %err, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    debug!(?env, "Loaded configuration");

    let db = DbClient::connect(&env.database_url, env.database_max_connections).await?;
    db.migrate().await?;
    info!("Database ready");

    if env.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set, post generation and chat will fail");
    }
    let generator = GeminiClient::new(
        env.gemini_api_key.clone(),
        env.gemini_model.clone(),
        env.gemini_base_url.clone(),
    )?;

    let uploads = UploadDir::new(&env.static_dir);
    tokio::fs::create_dir_all(uploads.root())
        .await
        .map_err(InitError::StaticDir)?;

    let state = ServerState {
        store: Arc::new(db),
        generator: Arc::new(generator),
        identity: Arc::new(identity(&env)?),
        uploads: Arc::new(uploads),
    };
    let app = server::app(state, cors_layer(&env.cors_origins)?);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(
        listener,
        axum::ServiceExt::<Request>::into_make_service(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(InitError::TcpServe)?;

    Ok(())
}
