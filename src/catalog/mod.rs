//! CardStore: abstracts the card data store behind the router.
//!
//! Uses enum dispatch to support multiple backends without trait objects.
//! - `Db` variant: SQLite database
//! - `Memory` variant: in-memory catalog (`--memory`, tests)

pub mod memory;
mod types;

pub use memory::MemoryCatalog;
pub use types::{Card, CatalogFile, CategoryCount, CollectionItem, OwnedCard};

use crate::db::{queries, Database};
use crate::draw::DrawStatus;
use crate::error::{BotError, Result};
use crate::interaction::{UserId, UserInfo};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Storage backend consulted by the interaction router
#[derive(Clone)]
pub enum CardStore {
    /// SQLite database backend
    Db(Arc<Database>),
    /// In-memory backend
    Memory(Arc<MemoryCatalog>),
}

impl CardStore {
    /// Every card the user owns, ordered by card id
    pub async fn fetch_owned_collection(&self, user: &UserId) -> Result<Vec<CollectionItem>> {
        match self {
            CardStore::Db(db) => {
                let user = user.as_str().to_string();
                db.with_conn(move |conn| queries::owned_collection(conn, &user))
                    .await
            }
            CardStore::Memory(mem) => Ok(mem.owned_collection(user.as_str())),
        }
    }

    /// Owned counts for every catalog category
    pub async fn fetch_category_counts(&self, user: &UserId) -> Result<Vec<CategoryCount>> {
        match self {
            CardStore::Db(db) => {
                let user = user.as_str().to_string();
                db.with_conn(move |conn| queries::category_counts(conn, &user))
                    .await
            }
            CardStore::Memory(mem) => Ok(mem.category_counts(user.as_str())),
        }
    }

    /// Owned cards in one category, ordered by card id ascending
    pub async fn fetch_cards_in_category(
        &self,
        user: &UserId,
        category: &str,
    ) -> Result<Vec<CollectionItem>> {
        match self {
            CardStore::Db(db) => {
                let user = user.as_str().to_string();
                let category = category.to_string();
                db.with_conn(move |conn| queries::cards_in_category(conn, &user, &category))
                    .await
            }
            CardStore::Memory(mem) => Ok(mem.cards_in_category(user.as_str(), category)),
        }
    }

    /// Owned cards with display details, optionally only `card_id`
    pub async fn fetch_owned_cards(
        &self,
        user: &UserId,
        card_id: Option<i64>,
    ) -> Result<Vec<OwnedCard>> {
        match self {
            CardStore::Db(db) => {
                let user = user.as_str().to_string();
                db.with_conn(move |conn| queries::owned_cards(conn, &user, card_id))
                    .await
            }
            CardStore::Memory(mem) => Ok(mem.owned_cards(user.as_str(), card_id)),
        }
    }

    /// One owned card, or `NotFound` when the user does not own it
    pub async fn fetch_owned_card(&self, user: &UserId, card_id: i64) -> Result<OwnedCard> {
        self.fetch_owned_cards(user, Some(card_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BotError::NotFound("card", format!("{} for user {}", card_id, user)))
    }

    /// The whole catalog, ordered by id
    pub async fn all_cards(&self) -> Result<Vec<Card>> {
        match self {
            CardStore::Db(db) => db.with_conn(|conn| queries::list_cards(conn)).await,
            CardStore::Memory(mem) => Ok(mem.list_cards()),
        }
    }

    /// Insert or replace catalog cards. Rejects the whole batch if any card is invalid.
    pub async fn import_cards(&self, cards: Vec<Card>) -> Result<usize> {
        validate_cards(&cards)?;
        match self {
            CardStore::Db(db) => {
                db.with_conn(move |conn| queries::upsert_cards(conn, &cards))
                    .await
            }
            CardStore::Memory(mem) => Ok(mem.upsert_cards(cards)),
        }
    }

    /// Load a `[[cards]]` TOML file into the store
    pub async fn import_catalog_file(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let catalog: CatalogFile = toml::from_str(&content)?;
        let written = self.import_cards(catalog.cards).await?;
        tracing::info!("Imported {} cards from {}", written, path.display());
        Ok(written)
    }

    /// Check the cooldown and stamp the draw time when the draw may proceed
    pub async fn begin_draw(
        &self,
        user: &UserInfo,
        now: DateTime<Utc>,
        cooldown_hours: u32,
    ) -> Result<DrawStatus> {
        match self {
            CardStore::Db(db) => {
                let user_id = user.id.as_str().to_string();
                let username = user.username.clone();
                db.with_conn(move |conn| {
                    queries::begin_draw(conn, &user_id, &username, now, cooldown_hours)
                })
                .await
            }
            CardStore::Memory(mem) => Ok(mem.begin_draw(user.id.as_str(), now, cooldown_hours)),
        }
    }

    /// Add one copy of a card to the user's album; returns the amount now owned
    pub async fn grant_card(&self, user: &UserId, card_id: i64, max_copies: u32) -> Result<u32> {
        match self {
            CardStore::Db(db) => {
                let user = user.as_str().to_string();
                db.with_conn(move |conn| queries::grant_card(conn, &user, card_id, max_copies))
                    .await
            }
            CardStore::Memory(mem) => Ok(mem.grant_card(user.as_str(), card_id, max_copies)),
        }
    }
}

fn validate_cards(cards: &[Card]) -> Result<()> {
    for card in cards {
        if card.name.trim().is_empty() || card.category.trim().is_empty() {
            return Err(BotError::Validation(format!(
                "card {} needs a name and a category",
                card.id
            )));
        }
        if !card.percentage.is_finite() || card.percentage < 0.0 {
            return Err(BotError::Validation(format!(
                "card {} has an invalid drop percentage: {}",
                card.id, card.percentage
            )));
        }
    }
    Ok(())
}
