//! In-process [`Store`] used by tests. Mirrors the foreign-key, uniqueness and
//! cascade rules of the PostgreSQL schema.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use kamitori_common::model::{
    Id, Page,
    post::{NewPost, NewTranslation, Post, PostMarker, Translation},
    shop::{NewShop, Shop, ShopMarker, ShopUpdate},
    user::{Email, NewUser, User, UserCredentials},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    shops: BTreeMap<i64, Shop>,
    posts: BTreeMap<i64, Post>,
    users: BTreeMap<i64, UserCredentials>,
    failing_language: Option<String>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following translation insert for `language` fail, aborting
    /// the surrounding post insert.
    pub fn fail_translation_inserts(&self, language: &str) {
        self.lock().failing_language = Some(language.to_owned());
    }

    #[must_use]
    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    #[must_use]
    pub fn translation_count(&self) -> usize {
        self.lock()
            .posts
            .values()
            .map(|post| post.translations.len())
            .sum()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_shop(&self, shop_id: Id<ShopMarker>) -> Result<Option<Shop>> {
        Ok(self.lock().shops.get(&shop_id.get()).cloned())
    }

    async fn fetch_shops(&self, page: Page) -> Result<Vec<Shop>> {
        Ok(self
            .lock()
            .shops
            .values()
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn create_shop(&self, shop: NewShop) -> Result<Shop> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let shop = Shop::from_new(id.into(), shop);
        tables.shops.insert(id, shop.clone());
        Ok(shop)
    }

    async fn update_shop(
        &self,
        shop_id: Id<ShopMarker>,
        update: ShopUpdate,
    ) -> Result<Option<Shop>> {
        let mut tables = self.lock();
        let Some(shop) = tables.shops.get_mut(&shop_id.get()) else {
            return Ok(None);
        };

        update.apply(shop);
        Ok(Some(shop.clone()))
    }

    async fn delete_shop(&self, shop_id: Id<ShopMarker>) -> Result<Option<Shop>> {
        let mut tables = self.lock();
        let shop = tables.shops.remove(&shop_id.get());

        if shop.is_some() {
            tables.posts.retain(|_, post| post.shop_id != shop_id);
        }

        Ok(shop)
    }

    async fn create_post(&self, post: NewPost, translations: Vec<NewTranslation>) -> Result<Post> {
        let mut tables = self.lock();

        if !tables.shops.contains_key(&post.shop_id.get()) {
            return Err(DbError::ForeignKeyViolation(format!(
                "shop {} does not exist",
                post.shop_id
            )));
        }

        let post_id = tables.next_id();
        let mut staged = Vec::with_capacity(translations.len());
        for translation in translations {
            if tables.failing_language.as_deref() == Some(translation.language.get()) {
                return Err(DbError::Sqlx(sqlx::Error::Protocol(format!(
                    "injected failure inserting {} translation",
                    translation.language.get()
                ))));
            }

            staged.push(Translation {
                id: tables.next_id().into(),
                language: translation.language,
                translated_content: translation.translated_content,
            });
        }

        let post = Post {
            id: post_id.into(),
            shop_id: post.shop_id,
            original_text: post.original_text,
            image_path: Some(post.image_path),
            created_at: OffsetDateTime::now_utc(),
            translations: staged,
        };
        tables.posts.insert(post_id, post.clone());

        Ok(post)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.lock().posts.get(&post_id.get()).cloned())
    }

    async fn fetch_posts(&self, page: Page) -> Result<Vec<Post>> {
        Ok(self
            .lock()
            .posts
            .values()
            .rev()
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<UserCredentials>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|credentials| &credentials.user.email == email)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.lock();

        if tables
            .users
            .values()
            .any(|credentials| credentials.user.email == user.email)
        {
            return Err(DbError::UniqueViolation(format!(
                "email {} is taken",
                user.email.get()
            )));
        }

        let id = tables.next_id();
        let created = User {
            id: id.into(),
            email: user.email,
        };
        tables.users.insert(
            id,
            UserCredentials {
                user: created.clone(),
                hashed_password: user.hashed_password,
            },
        );

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::store::{DbError, Store};
    use kamitori_common::model::{
        Id, Page,
        post::{GeneratedPost, NewPost},
        shop::{NewShop, ShopUpdate},
    };

    fn new_shop(name: &str) -> NewShop {
        NewShop {
            name: name.to_owned(),
            category: Some("cafe".to_owned()),
            ..NewShop::default()
        }
    }

    fn generated() -> GeneratedPost {
        GeneratedPost {
            enhanced_text: "ja".to_owned(),
            en: "en".to_owned(),
            zh_tw: "zh-tw".to_owned(),
            zh_cn: "zh-cn".to_owned(),
            ko: "ko".to_owned(),
        }
    }

    #[tokio::test]
    async fn created_shop_reads_back_identically() {
        let store = MemoryStore::new();
        let created = store.create_shop(new_shop("Cafe X")).await.unwrap();

        assert_eq!(store.fetch_shop(created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn update_of_missing_shop_is_none() {
        let store = MemoryStore::new();

        let updated = store
            .update_shop(Id::new(99), ShopUpdate::default())
            .await
            .unwrap();

        assert_eq!(updated, None);
    }

    #[tokio::test]
    async fn deleting_shop_cascades_to_posts() {
        let store = MemoryStore::new();
        let kept = store.create_shop(new_shop("Kept")).await.unwrap();
        let doomed = store.create_shop(new_shop("Doomed")).await.unwrap();

        for shop_id in [kept.id, doomed.id] {
            let post = NewPost {
                shop_id,
                original_text: "text".to_owned(),
                image_path: "/static/images/a.jpg".to_owned(),
            };
            store
                .create_post(post, generated().into_translations())
                .await
                .unwrap();
        }
        let doomed_post = store.fetch_posts(Page::default()).await.unwrap()[0].clone();
        assert_eq!(doomed_post.shop_id, doomed.id);

        store.delete_shop(doomed.id).await.unwrap();

        assert_eq!(store.fetch_post(doomed_post.id).await.unwrap(), None);
        assert_eq!(store.post_count(), 1);
        assert_eq!(store.translation_count(), 5);
    }

    #[tokio::test]
    async fn post_for_missing_shop_is_a_foreign_key_violation() {
        let store = MemoryStore::new();
        let post = NewPost {
            shop_id: Id::new(7),
            original_text: "text".to_owned(),
            image_path: "/static/images/a.jpg".to_owned(),
        };

        let result = store.create_post(post, generated().into_translations()).await;

        assert!(matches!(result, Err(DbError::ForeignKeyViolation(_))));
        assert_eq!(store.post_count(), 0);
    }

    #[tokio::test]
    async fn failed_translation_insert_writes_nothing() {
        let store = MemoryStore::new();
        let shop = store.create_shop(new_shop("Cafe X")).await.unwrap();
        store.fail_translation_inserts("ko");
        let post = NewPost {
            shop_id: shop.id,
            original_text: "text".to_owned(),
            image_path: "/static/images/a.jpg".to_owned(),
        };

        let result = store.create_post(post, generated().into_translations()).await;

        assert!(result.is_err());
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.translation_count(), 0);
    }

    #[tokio::test]
    async fn shops_are_paginated_in_insertion_order() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store.create_shop(new_shop(name)).await.unwrap();
        }

        let names: Vec<_> = store
            .fetch_shops(Page::new(1, 5))
            .await
            .unwrap()
            .into_iter()
            .map(|shop| shop.name)
            .collect();

        assert_eq!(names, ["b", "c"]);
    }
}
