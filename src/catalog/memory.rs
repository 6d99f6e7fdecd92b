//! In-memory card store.
//!
//! Volatile catalog and albums used when `--memory` is passed and by tests.
//! All data is lost on restart.

use super::{Card, CategoryCount, CollectionItem, OwnedCard};
use crate::draw::{cooldown_remaining, DrawStatus};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Per-user album state
#[derive(Debug, Default)]
struct MemoryUser {
    last_draw_at: Option<DateTime<Utc>>,
    /// card id → owned amount
    owned: BTreeMap<i64, u32>,
}

/// In-memory catalog and albums
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    cards: RwLock<Vec<Card>>,
    users: DashMap<String, MemoryUser>,
}

impl MemoryCatalog {
    pub fn new(cards: Vec<Card>) -> Self {
        let catalog = MemoryCatalog::default();
        catalog.upsert_cards(cards);
        catalog
    }

    /// Insert or replace cards by id, keeping the catalog ordered by id
    pub fn upsert_cards(&self, cards: Vec<Card>) -> usize {
        let written = cards.len();
        let mut catalog = self.cards.write().unwrap_or_else(|e| e.into_inner());
        for card in cards {
            match catalog.iter_mut().find(|c| c.id == card.id) {
                Some(existing) => *existing = card,
                None => catalog.push(card),
            }
        }
        catalog.sort_by_key(|c| c.id);
        written
    }

    pub fn list_cards(&self) -> Vec<Card> {
        self.cards.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn owned_collection(&self, user_id: &str) -> Vec<CollectionItem> {
        self.collect_owned(user_id, |_| true)
    }

    pub fn cards_in_category(&self, user_id: &str, category: &str) -> Vec<CollectionItem> {
        self.collect_owned(user_id, |card| card.category == category)
    }

    /// Counts for every catalog category, in order of first appearance by card id
    pub fn category_counts(&self, user_id: &str) -> Vec<CategoryCount> {
        let cards = self.cards.read().unwrap_or_else(|e| e.into_inner());
        let user = self.users.get(user_id);

        let mut counts: Vec<CategoryCount> = Vec::new();
        for card in cards.iter() {
            let owned = user
                .as_ref()
                .is_some_and(|u| u.owned.contains_key(&card.id)) as u32;
            match counts.iter_mut().find(|c| c.category == card.category) {
                Some(entry) => entry.count += owned,
                None => counts.push(CategoryCount {
                    category: card.category.clone(),
                    count: owned,
                }),
            }
        }
        counts
    }

    pub fn owned_cards(&self, user_id: &str, card_id: Option<i64>) -> Vec<OwnedCard> {
        let cards = self.cards.read().unwrap_or_else(|e| e.into_inner());
        let Some(user) = self.users.get(user_id) else {
            return Vec::new();
        };
        cards
            .iter()
            .filter(|c| card_id.is_none_or(|id| c.id == id))
            .filter(|c| user.owned.contains_key(&c.id))
            .map(OwnedCard::from_card)
            .collect()
    }

    pub fn begin_draw(&self, user_id: &str, now: DateTime<Utc>, cooldown_hours: u32) -> DrawStatus {
        // The entry guard serializes concurrent draws by the same user
        match self.users.entry(user_id.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryUser {
                    last_draw_at: Some(now),
                    owned: BTreeMap::new(),
                });
                DrawStatus::Ready { new_user: true }
            }
            Entry::Occupied(mut occupied) => {
                let user = occupied.get_mut();
                match cooldown_remaining(user.last_draw_at, now, cooldown_hours) {
                    Some(remaining_minutes) => DrawStatus::CoolingDown { remaining_minutes },
                    None => {
                        user.last_draw_at = Some(now);
                        DrawStatus::Ready { new_user: false }
                    }
                }
            }
        }
    }

    pub fn grant_card(&self, user_id: &str, card_id: i64, max_copies: u32) -> u32 {
        let mut user = self.users.entry(user_id.to_string()).or_default();
        let amount = user.owned.entry(card_id).or_insert(0);
        *amount = (*amount + 1).min(max_copies.max(1));
        *amount
    }

    fn collect_owned(&self, user_id: &str, keep: impl Fn(&Card) -> bool) -> Vec<CollectionItem> {
        let cards = self.cards.read().unwrap_or_else(|e| e.into_inner());
        let Some(user) = self.users.get(user_id) else {
            return Vec::new();
        };
        cards
            .iter()
            .filter(|c| keep(*c))
            .filter_map(|c| {
                user.owned.get(&c.id).map(|amount| CollectionItem {
                    card_id: c.id,
                    name: c.name.clone(),
                    category: c.category.clone(),
                    amount: *amount,
                    percentage: c.percentage,
                })
            })
            .collect()
    }
}
