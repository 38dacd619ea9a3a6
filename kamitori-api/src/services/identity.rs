use kamitori_common::model::{
    auth::{PasswordHash, PasswordHashError, TokenError, TokenResponse, TokenSigner},
    user::{Email, NewUser, User},
};
use kamitori_db::{DbError, Store};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid invitation code")]
    InvalidInviteCode,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Incorrect email or password")]
    IncorrectCredentials,
    #[error("Could not validate credentials")]
    UnknownSubject,
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Database(#[from] DbError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Registration {
    pub email: Email,
    pub password: String,
    pub invite_code: String,
}

/// Invite-gated registration, password login and bearer-token resolution.
#[derive(Clone, Debug)]
pub struct Identity {
    signer: TokenSigner,
    invite_code: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(signer: TokenSigner, invite_code: Option<String>) -> Self {
        Self {
            signer,
            invite_code,
        }
    }

    /// Fails closed when no invite code is configured.
    fn check_invite_code(&self, code: &str) -> Result<(), IdentityError> {
        match &self.invite_code {
            Some(expected) if !expected.is_empty() && expected == code => Ok(()),
            _ => Err(IdentityError::InvalidInviteCode),
        }
    }

    pub async fn register(
        &self,
        store: &dyn Store,
        registration: Registration,
    ) -> Result<TokenResponse, IdentityError> {
        self.check_invite_code(&registration.invite_code)?;

        if store
            .fetch_user_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(IdentityError::EmailTaken);
        }

        let new_user = NewUser {
            email: registration.email,
            hashed_password: PasswordHash::generate(&registration.password)?,
        };
        let user = store.create_user(new_user).await.map_err(|err| match err {
            DbError::UniqueViolation(_) => IdentityError::EmailTaken,
            err => IdentityError::Database(err),
        })?;
        info!(user_id = %user.id, "Registered user");

        Ok(TokenResponse::bearer(self.signer.issue(&user.email)?))
    }

    pub async fn login(
        &self,
        store: &dyn Store,
        username: String,
        password: &str,
    ) -> Result<TokenResponse, IdentityError> {
        let email = Email::new(username).map_err(|_| IdentityError::IncorrectCredentials)?;

        let credentials = store
            .fetch_user_by_email(&email)
            .await?
            .filter(|credentials| credentials.hashed_password.verify(password))
            .ok_or(IdentityError::IncorrectCredentials)?;

        Ok(TokenResponse::bearer(
            self.signer.issue(&credentials.user.email)?,
        ))
    }

    /// Resolves a bearer token to a user that still exists.
    pub async fn authenticate(&self, store: &dyn Store, token: &str) -> Result<User, IdentityError> {
        let email = self.signer.resolve(token)?;

        let credentials = store
            .fetch_user_by_email(&email)
            .await?
            .ok_or(IdentityError::UnknownSubject)?;

        Ok(credentials.user)
    }
}
