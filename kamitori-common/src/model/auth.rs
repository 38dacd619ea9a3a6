use crate::{model::user::Email, util::PositiveDuration};
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::OffsetDateTime;

pub const PASSWORD_SALT_LEN: usize = 16;
pub const TOKEN_TYPE_BEARER: &str = "bearer";

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("No token signing secret is configured")]
    MissingSecret,
    #[error("Signing the token failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
    #[error("Could not validate credentials: {0}")]
    InvalidCredentials(jsonwebtoken::errors::Error),
    #[error("Token subject is not a valid email")]
    InvalidSubject,
    #[error("Token expiry is past the representable date range")]
    ExpiryOutOfRange,
}

impl TokenError {
    /// Whether the presented token itself is at fault, as opposed to the server setup.
    #[must_use]
    pub fn is_credentials_failure(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_) | Self::InvalidSubject)
    }
}

/// Argon2 hash of a user password, in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn generate(password: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    /// Wraps a hash read back from storage.
    #[must_use]
    pub fn from_stored(phc: String) -> Self {
        Self(phc)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        let Ok(parsed) = password_hash::PasswordHash::new(&self.0) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    #[must_use]
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
        }
    }
}

/// Issues and resolves HS256 bearer tokens whose subject is the user's email.
#[derive(Clone)]
pub struct TokenSigner {
    keys: Option<(EncodingKey, DecodingKey)>,
    ttl: PositiveDuration,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: Option<&str>, ttl: PositiveDuration) -> Self {
        let keys = secret.map(|secret| {
            (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            )
        });

        Self { keys, ttl }
    }

    pub fn issue(&self, subject: &Email) -> Result<String, TokenError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, subject: &Email, now: OffsetDateTime) -> Result<String, TokenError> {
        let (encoding_key, _) = self.keys.as_ref().ok_or(TokenError::MissingSecret)?;

        let expires_at = now
            .checked_add(self.ttl.get())
            .ok_or(TokenError::ExpiryOutOfRange)?;

        let claims = TokenClaims {
            sub: subject.get().to_owned(),
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, encoding_key)
            .map_err(TokenError::Encode)
    }

    pub fn resolve(&self, token: &str) -> Result<Email, TokenError> {
        let (_, decoding_key) = self.keys.as_ref().ok_or(TokenError::MissingSecret)?;

        let data = jsonwebtoken::decode::<TokenClaims>(
            token,
            decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(TokenError::InvalidCredentials)?;

        Email::new(data.claims.sub).map_err(|_| TokenError::InvalidSubject)
    }
}

impl Debug for TokenSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("keys", &self.keys.as_ref().map(|_| "[redacted]"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{PasswordHash, TokenError, TokenSigner};
    use crate::{model::user::Email, util::PositiveDuration};
    use time::{Duration, OffsetDateTime};

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(
            Some(secret),
            PositiveDuration::new(Duration::minutes(300)).unwrap(),
        )
    }

    fn email() -> Email {
        Email::new("a@x.com".to_owned()).unwrap()
    }

    #[test]
    fn password_verifies_only_itself() {
        let hash = PasswordHash::generate("pw123").unwrap();

        assert!(hash.verify("pw123"));
        assert!(!hash.verify("pw124"));
        assert!(!PasswordHash::from_stored("not a phc string".to_owned()).verify("pw123"));
    }

    #[test]
    fn token_resolves_to_its_subject() {
        let signer = signer("secret");
        let token = signer.issue(&email()).unwrap();

        assert_eq!(signer.resolve(&token).unwrap(), email());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let signer = signer("secret");
        let token = signer.issue(&email()).unwrap();

        let (unsigned, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{unsigned}.{flipped}{}", &signature[1..]);

        assert!(matches!(
            signer.resolve(&tampered),
            Err(TokenError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = signer("other").issue(&email()).unwrap();

        assert!(matches!(
            signer("secret").resolve(&token),
            Err(TokenError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer("secret");
        let issued_at = OffsetDateTime::now_utc() - Duration::days(1);
        let token = signer.issue_at(&email(), issued_at).unwrap();

        assert!(matches!(
            signer.resolve(&token),
            Err(TokenError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn oversized_lifetime_fails_instead_of_overflowing() {
        let signer = TokenSigner::new(
            Some("secret"),
            PositiveDuration::new(Duration::minutes(10_000_000_000)).unwrap(),
        );

        assert!(matches!(
            signer.issue(&email()),
            Err(TokenError::ExpiryOutOfRange)
        ));
    }

    #[test]
    fn missing_secret_fails_per_call() {
        let signer = TokenSigner::new(None, PositiveDuration::new(Duration::minutes(1)).unwrap());

        assert!(matches!(
            signer.issue(&email()),
            Err(TokenError::MissingSecret)
        ));
        assert!(matches!(
            signer.resolve("a.b.c"),
            Err(TokenError::MissingSecret)
        ));
    }
}
