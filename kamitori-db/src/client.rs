use crate::{
    record::{
        PostRecord, PostTranslationRecord, ShopRecord, TranslationRecord, UserRecord,
        post_from_rows,
    },
    store::{DbError, Result, Store},
};
use async_trait::async_trait;
use kamitori_common::model::{
    Id, Page,
    post::{NewPost, NewTranslation, Post, PostMarker, Translation},
    shop::{NewShop, Shop, ShopMarker, ShopUpdate},
    user::{Email, NewUser, User, UserCredentials},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use std::collections::HashMap;
use tracing::debug;

pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_shop(&self, shop_id: Id<ShopMarker>) -> Result<Option<Shop>> {
        let record = query_as::<_, ShopRecord>(
            "
            SELECT id, name, description, location, category, map_url, reservation_url
            FROM shops
            WHERE id = $1
            ",
        )
        .bind(shop_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Shop::from))
    }

    async fn fetch_shops(&self, page: Page) -> Result<Vec<Shop>> {
        let records = query_as::<_, ShopRecord>(
            "
            SELECT id, name, description, location, category, map_url, reservation_url
            FROM shops
            ORDER BY id
            OFFSET $1
            LIMIT $2
            ",
        )
        .bind(i64::from(page.skip))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Shop::from).collect())
    }

    async fn create_shop(&self, shop: NewShop) -> Result<Shop> {
        let record = query_as::<_, ShopRecord>(
            "
            INSERT INTO shops (name, description, location, category, map_url, reservation_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, location, category, map_url, reservation_url
            ",
        )
        .bind(shop.name)
        .bind(shop.description)
        .bind(shop.location)
        .bind(shop.category)
        .bind(shop.map_url)
        .bind(shop.reservation_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    async fn update_shop(
        &self,
        shop_id: Id<ShopMarker>,
        update: ShopUpdate,
    ) -> Result<Option<Shop>> {
        let mut transaction = self.pool.begin().await?;

        let Some(record) = query_as::<_, ShopRecord>(
            "
            SELECT id, name, description, location, category, map_url, reservation_url
            FROM shops
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(shop_id.get())
        .fetch_optional(&mut *transaction)
        .await?
        else {
            return Ok(None);
        };

        let mut shop = Shop::from(record);
        update.apply(&mut shop);

        let record = query_as::<_, ShopRecord>(
            "
            UPDATE shops
            SET name = $2,
                description = $3,
                location = $4,
                category = $5,
                map_url = $6,
                reservation_url = $7
            WHERE id = $1
            RETURNING id, name, description, location, category, map_url, reservation_url
            ",
        )
        .bind(shop_id.get())
        .bind(shop.name)
        .bind(shop.description)
        .bind(shop.location)
        .bind(shop.category)
        .bind(shop.map_url)
        .bind(shop.reservation_url)
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(Some(record.into()))
    }

    async fn delete_shop(&self, shop_id: Id<ShopMarker>) -> Result<Option<Shop>> {
        let record = query_as::<_, ShopRecord>(
            "
            DELETE FROM shops
            WHERE id = $1
            RETURNING id, name, description, location, category, map_url, reservation_url
            ",
        )
        .bind(shop_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Shop::from))
    }

    async fn create_post(&self, post: NewPost, translations: Vec<NewTranslation>) -> Result<Post> {
        let mut transaction = self.pool.begin().await?;

        let post_id: i64 = query_scalar(
            "
            INSERT INTO posts (shop_id, original_text, image_path)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(post.shop_id.get())
        .bind(post.original_text)
        .bind(post.image_path)
        .fetch_one(&mut *transaction)
        .await?;

        for translation in translations {
            query(
                "
                INSERT INTO translations (post_id, language, translated_content)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(post_id)
            .bind(translation.language.get())
            .bind(translation.translated_content)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        debug!(post_id, "Committed post with translations");

        let post_id = Id::new(post_id);
        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::PostVanished(post_id))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let rows = query_as::<_, PostTranslationRecord>(
            "
            SELECT
                posts.id,
                posts.shop_id,
                posts.original_text,
                posts.image_path,
                posts.created_at,
                translations.id AS translation_id,
                translations.language,
                translations.translated_content
            FROM
                posts LEFT JOIN translations ON translations.post_id = posts.id
            WHERE
                posts.id = $1
            ORDER BY
                translations.id
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(post_from_rows(rows)?)
    }

    async fn fetch_posts(&self, page: Page) -> Result<Vec<Post>> {
        let posts = query_as::<_, PostRecord>(
            "
            SELECT id, shop_id, original_text, image_path, created_at
            FROM posts
            ORDER BY created_at DESC, id DESC
            OFFSET $1
            LIMIT $2
            ",
        )
        .bind(i64::from(page.skip))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        let post_ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
        let translation_records = query_as::<_, TranslationRecord>(
            "
            SELECT id, post_id, language, translated_content
            FROM translations
            WHERE post_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut translations: HashMap<i64, Vec<Translation>> = HashMap::new();
        for record in translation_records {
            let post_id = record.post_id;
            translations
                .entry(post_id)
                .or_default()
                .push(Translation::try_from(record)?);
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let post_translations = translations.remove(&post.id).unwrap_or_default();
                post.into_post(post_translations)
            })
            .collect())
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT id, email, hashed_password
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(UserCredentials::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let user_id: i64 = query_scalar(
            "
            INSERT INTO users (email, hashed_password)
            VALUES ($1, $2)
            RETURNING id
            ",
        )
        .bind(user.email.get())
        .bind(user.hashed_password.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: user_id.into(),
            email: user.email,
        })
    }
}
