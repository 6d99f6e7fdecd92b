//! Records exchanged with the card store

use serde::{Deserialize, Serialize};

/// A card in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Drop weight, in percent of all draws
    pub percentage: f64,
}

/// One owned card as seen from a user's album.
///
/// Sessions keep a copy of these, so later draws never change an open album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub card_id: i64,
    pub name: String,
    pub category: String,
    pub amount: u32,
    pub percentage: f64,
}

/// Number of owned cards in one catalog category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u32,
}

/// Owned card with the details needed to show it on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedCard {
    pub card_id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
}

impl OwnedCard {
    pub fn from_card(card: &Card) -> Self {
        OwnedCard {
            card_id: card.id,
            name: card.name.clone(),
            category: card.category.clone(),
            description: card.description.clone(),
            image_url: card.image_url.clone(),
        }
    }
}

/// Card catalog file used to seed a store (`[[cards]]` tables)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub cards: Vec<Card>,
}
