//! Album browsing sessions
//!
//! A session is one user's open album menu: a snapshot of their collection,
//! the category they are looking at and the page within it. Sessions are
//! owned by the [`SessionStore`], which also runs their expiry timers.

pub mod store;

pub use store::{RetireReason, SessionStore};

use crate::catalog::{CategoryCount, CollectionItem};
use crate::interaction::{MessageHandle, UserId};
use serde::Serialize;
use std::str::FromStr;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Page navigation button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    First,
    Previous,
    Next,
    Last,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::First,
        Direction::Previous,
        Direction::Next,
        Direction::Last,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::First => "first",
            Direction::Previous => "previous",
            Direction::Next => "next",
            Direction::Last => "last",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Direction::First),
            "previous" => Ok(Direction::Previous),
            "next" => Ok(Direction::Next),
            "last" => Ok(Direction::Last),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// The slice of a session currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub items: Vec<CollectionItem>,
    pub page: usize,
    pub total_pages: usize,
    pub category: Option<String>,
}

/// Read-only summary of a registered session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub owner: UserId,
    pub token: Uuid,
    pub category: Option<String>,
    pub page: usize,
    pub total_pages: usize,
    pub message: MessageHandle,
}

/// One user's open album menu
#[derive(Debug)]
pub struct Session {
    owner: UserId,
    token: Uuid,
    /// Snapshot of the owned collection, ordered by card id
    items: Vec<CollectionItem>,
    categories: Vec<CategoryCount>,
    category: Option<String>,
    /// 1-based, within `1..=max(total_pages, 1)`
    page: usize,
    page_size: usize,
    message: MessageHandle,
    expiry: Option<AbortHandle>,
    /// When the running expiry timer may retire this session
    expires_at: Option<Instant>,
}

impl Session {
    pub fn new(
        owner: UserId,
        mut items: Vec<CollectionItem>,
        categories: Vec<CategoryCount>,
        message: MessageHandle,
        page_size: usize,
    ) -> Self {
        items.sort_by_key(|item| item.card_id);
        Session {
            owner,
            token: Uuid::new_v4(),
            items,
            categories,
            category: None,
            page: 1,
            page_size: page_size.max(1),
            message,
            expiry: None,
            expires_at: None,
        }
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Correlation token stamped into this session's component ids
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn message(&self) -> &MessageHandle {
        &self.message
    }

    pub fn categories(&self) -> &[CategoryCount] {
        &self.categories
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Sum of the drop percentages of every owned card
    pub fn completion_percentage(&self) -> f64 {
        self.items.iter().map(|item| item.percentage).sum()
    }

    fn filtered(&self) -> impl Iterator<Item = &CollectionItem> {
        self.items
            .iter()
            .filter(move |item| self.category.as_deref().is_none_or(|c| item.category == c))
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().count().div_ceil(self.page_size)
    }

    /// Switch category and go back to the first page
    pub fn select_category(&mut self, category: impl Into<String>) {
        self.category = Some(category.into());
        self.page = 1;
    }

    /// Move between pages, clamping at both ends
    pub fn navigate(&mut self, direction: Direction) {
        let total = self.total_pages();
        if total == 0 {
            self.page = 1;
            return;
        }

        self.page = match direction {
            Direction::First => 1,
            Direction::Previous => self.page.saturating_sub(1).max(1),
            Direction::Next => (self.page + 1).min(total),
            Direction::Last => total,
        };
    }

    pub fn current_view(&self) -> PageView {
        let start = (self.page - 1) * self.page_size;
        let items = self
            .filtered()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();

        PageView {
            items,
            page: self.page,
            total_pages: self.total_pages(),
            category: self.category.clone(),
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            owner: self.owner.clone(),
            token: self.token,
            category: self.category.clone(),
            page: self.page,
            total_pages: self.total_pages(),
            message: self.message.clone(),
        }
    }

    pub(crate) fn set_expiry(&mut self, handle: AbortHandle, expires_at: Instant) {
        if let Some(previous) = self.expiry.replace(handle) {
            previous.abort();
        }
        self.expires_at = Some(expires_at);
    }

    /// A timer that already woke up may still be waiting on the map lock
    /// when the session is touched; it must not retire the renewed session.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    pub(crate) fn cancel_expiry(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}
