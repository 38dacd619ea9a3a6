use kamitori_common::util::{NonPositiveDurationError, PositiveDuration};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Process configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct Env {
    #[serde(default = "default_server_address")]
    pub server_address: IpAddr,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub secret_key: Option<String>,
    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,
    pub invite_code: Option<String>,
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

// Hand-written so secrets never end up in logs.
impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field("database_max_connections", &self.database_max_connections)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("static_dir", &self.static_dir)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum TokenLifetimeError {
    #[error(transparent)]
    NonPositive(#[from] NonPositiveDurationError),
    #[error("{0} minutes is too long for a token lifetime")]
    TooLarge(i64),
}

impl Env {
    /// Tokens issued right now must still get a representable expiry.
    pub fn token_lifetime(&self) -> Result<PositiveDuration, TokenLifetimeError> {
        let minutes = self.access_token_expire_minutes;
        let seconds = minutes
            .checked_mul(60)
            .ok_or(TokenLifetimeError::TooLarge(minutes))?;
        let lifetime = PositiveDuration::try_from(Duration::seconds(seconds))?;

        OffsetDateTime::now_utc()
            .checked_add(lifetime.get())
            .map(|_| lifetime)
            .ok_or(TokenLifetimeError::TooLarge(minutes))
    }
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_server_port() -> u16 {
    8000
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_access_token_expire_minutes() -> i64 {
    300
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_owned()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_owned()
}

fn default_static_dir() -> String {
    "static".to_owned()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_owned(),
        "http://localhost:3000".to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::{Env, TokenLifetimeError};
    use std::net::{IpAddr, Ipv4Addr};
    use time::Duration;

    fn env_with_lifetime(minutes: &str) -> Env {
        envy::from_iter([
            ("DATABASE_URL".to_owned(), "postgres://db/k".to_owned()),
            (
                "ACCESS_TOKEN_EXPIRE_MINUTES".to_owned(),
                minutes.to_owned(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn defaults_fill_everything_but_the_database() {
        let env: Env = envy::from_iter([(
            "DATABASE_URL".to_owned(),
            "postgres://localhost/kamitori".to_owned(),
        )])
        .unwrap();

        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(env.server_port, 8000);
        assert_eq!(env.access_token_expire_minutes, 300);
        assert_eq!(env.secret_key, None);
        assert_eq!(env.invite_code, None);
        assert_eq!(env.gemini_model, "gemini-2.5-flash-lite");
        assert_eq!(
            env.cors_origins,
            ["http://localhost", "http://localhost:3000"]
        );
    }

    #[test]
    fn reads_overrides() {
        let env: Env = envy::from_iter([
            ("DATABASE_URL".to_owned(), "postgres://db/k".to_owned()),
            ("SERVER_PORT".to_owned(), "9000".to_owned()),
            ("SECRET_KEY".to_owned(), "s3cret".to_owned()),
            (
                "CORS_ORIGINS".to_owned(),
                "https://a.example,https://b.example".to_owned(),
            ),
        ])
        .unwrap();

        assert_eq!(env.server_port, 9000);
        assert_eq!(env.secret_key.as_deref(), Some("s3cret"));
        assert_eq!(env.cors_origins, ["https://a.example", "https://b.example"]);
        assert!(!format!("{env:?}").contains("s3cret"));
    }

    #[test]
    fn database_url_is_required() {
        let env = envy::from_iter::<_, Env>(Vec::<(String, String)>::new());

        assert!(env.is_err());
    }

    #[test]
    fn token_lifetime_is_bounded() {
        assert_eq!(
            env_with_lifetime("300").token_lifetime().unwrap().get(),
            Duration::minutes(300)
        );
        assert!(matches!(
            env_with_lifetime("0").token_lifetime(),
            Err(TokenLifetimeError::NonPositive(_))
        ));
        assert_eq!(
            env_with_lifetime("10000000000").token_lifetime(),
            Err(TokenLifetimeError::TooLarge(10_000_000_000))
        );
        assert_eq!(
            env_with_lifetime(&i64::MAX.to_string()).token_lifetime(),
            Err(TokenLifetimeError::TooLarge(i64::MAX))
        );
    }
}
