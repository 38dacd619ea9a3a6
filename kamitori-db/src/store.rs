use async_trait::async_trait;
use kamitori_common::model::{
    Id, ModelValidationError, Page,
    post::{NewPost, NewTranslation, Post, PostMarker},
    shop::{NewShop, Shop, ShopMarker, ShopUpdate},
    user::{Email, NewUser, User, UserCredentials},
};
use sqlx::error::ErrorKind;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Referenced row does not exist: {0}")]
    ForeignKeyViolation(String),
    #[error("Row already exists: {0}")]
    UniqueViolation(String),
    #[error("Post with id {0} disappeared after it was written")]
    PostVanished(Id<PostMarker>),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(value: sqlx::Error) -> Self {
        let kind = value.as_database_error().map(|err| (err.kind(), err.message().to_owned()));

        match kind {
            Some((ErrorKind::ForeignKeyViolation, message)) => Self::ForeignKeyViolation(message),
            Some((ErrorKind::UniqueViolation, message)) => Self::UniqueViolation(message),
            _ => Self::Sqlx(value),
        }
    }
}

/// Data access for shops, posts with their translations, and users.
///
/// Posts and translations are only ever written together through
/// [`Store::create_post`], which is all-or-nothing.
#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_shop(&self, shop_id: Id<ShopMarker>) -> Result<Option<Shop>>;

    async fn fetch_shops(&self, page: Page) -> Result<Vec<Shop>>;

    async fn create_shop(&self, shop: NewShop) -> Result<Shop>;

    /// Returns `None` if the shop does not exist.
    async fn update_shop(&self, shop_id: Id<ShopMarker>, update: ShopUpdate)
    -> Result<Option<Shop>>;

    /// Deletes the shop with its posts and their translations, returning the deleted shop.
    async fn delete_shop(&self, shop_id: Id<ShopMarker>) -> Result<Option<Shop>>;

    /// Inserts the post and every translation in one transaction, then reads the
    /// post back with its translations.
    async fn create_post(&self, post: NewPost, translations: Vec<NewTranslation>) -> Result<Post>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Newest first.
    async fn fetch_posts(&self, page: Page) -> Result<Vec<Post>>;

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<UserCredentials>>;

    async fn create_user(&self, user: NewUser) -> Result<User>;
}
