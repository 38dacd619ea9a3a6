use kamitori_common::model::{
    ModelValidationError,
    auth::PasswordHash,
    post::{LanguageCode, Post, Translation},
    shop::Shop,
    user::{Email, User, UserCredentials},
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct ShopRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub map_url: Option<String>,
    pub reservation_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub shop_id: i64,
    pub original_text: String,
    pub image_path: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct TranslationRecord {
    pub id: i64,
    pub post_id: i64,
    pub language: String,
    pub translated_content: String,
}

/// One row of `posts LEFT JOIN translations`.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostTranslationRecord {
    #[sqlx(flatten)]
    pub post: PostRecord,
    pub translation_id: Option<i64>,
    pub language: Option<String>,
    pub translated_content: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
}

impl From<ShopRecord> for Shop {
    fn from(value: ShopRecord) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            description: value.description,
            location: value.location,
            category: value.category,
            map_url: value.map_url,
            reservation_url: value.reservation_url,
        }
    }
}

impl TryFrom<TranslationRecord> for Translation {
    type Error = ModelValidationError;

    fn try_from(value: TranslationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            language: LanguageCode::new(value.language)?,
            translated_content: value.translated_content,
        })
    }
}

impl PostRecord {
    pub(crate) fn into_post(self, translations: Vec<Translation>) -> Post {
        Post {
            id: self.id.into(),
            shop_id: self.shop_id.into(),
            original_text: self.original_text,
            image_path: self.image_path,
            created_at: self.created_at,
            translations,
        }
    }
}

/// Assembles a post from its joined rows. No rows means no post.
pub(crate) fn post_from_rows(
    rows: Vec<PostTranslationRecord>,
) -> Result<Option<Post>, ModelValidationError> {
    let Some(post) = rows.first().map(|row| row.post.clone()) else {
        return Ok(None);
    };

    let translations = rows
        .into_iter()
        .filter_map(|row| match (row.translation_id, row.language, row.translated_content) {
            (Some(id), Some(language), Some(translated_content)) => Some(TranslationRecord {
                id,
                post_id: row.post.id,
                language,
                translated_content,
            }),
            _ => None,
        })
        .map(Translation::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(post.into_post(translations)))
}

impl TryFrom<UserRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.id.into(),
                email: Email::new(value.email)?,
            },
            hashed_password: PasswordHash::from_stored(value.hashed_password),
        })
    }
}
