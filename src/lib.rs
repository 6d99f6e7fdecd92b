//! Albumbot - chat bot core for drawing, collecting and browsing card albums
//!
//! This crate provides the core functionality behind the bot:
//! - Weighted card draws with a per-user cooldown
//! - Paginated, per-user album menus that expire after inactivity
//! - SQLite or in-memory card storage
//! - HTTP API the chat platform adapter talks to
//!
//! # Usage
//!
//! As a library (embedded next to a platform adapter):
//! ```ignore
//! use albumbot::{Bot, Config};
//!
//! let bot = Bot::new(Config::default())?;
//! if let Some(instruction) = bot.handle(&interaction).await {
//!     // render it
//! }
//! ```
//!
//! As a standalone server (CLI):
//! ```text
//! albumbot --config ~/.albumbot/config.toml
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod draw;
pub mod error;
pub mod events;
pub mod interaction;
pub mod render;
pub mod router;
pub mod session;

// Re-export main types for convenience
pub use catalog::CardStore;
pub use config::Config;
pub use db::Database;
pub use error::{BotError, Result};
pub use events::BotEvent;
pub use interaction::Interaction;
pub use render::RenderInstruction;

use catalog::MemoryCatalog;
use render::Renderer;
use router::InteractionRouter;
use session::SessionStore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Bot service that wires storage, sessions and routing together
pub struct Bot {
    /// Configuration
    pub config: Config,

    /// Card storage backend
    store: CardStore,

    /// Open album menus
    sessions: SessionStore,

    router: Arc<InteractionRouter>,

    /// Broadcast channel for events the adapter acts on
    event_tx: broadcast::Sender<BotEvent>,
}

impl Bot {
    /// Create a bot backed by the SQLite database in the data directory
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.data_dir().join("albumbot.db");
        let db = Database::new(db_path)?;
        tracing::info!("Using card database at {}", db.path().display());
        Ok(Self::with_store(config, CardStore::Db(Arc::new(db))))
    }

    /// Create a bot whose cards and albums live only in memory
    pub fn in_memory(config: Config) -> Self {
        tracing::info!("Using in-memory card store, albums are lost on restart");
        Self::with_store(config, CardStore::Memory(Arc::new(MemoryCatalog::default())))
    }

    /// Create a bot over an existing store
    pub fn with_store(config: Config, store: CardStore) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let sessions = SessionStore::new(
            config.album.session_timeout(),
            config.album.page_size,
            event_tx.clone(),
        );
        let router = InteractionRouter::new(
            store.clone(),
            sessions.clone(),
            Renderer::new(config.album.category_icons.clone()),
            config.draw.clone(),
        );

        Bot {
            config,
            store,
            sessions,
            router: Arc::new(router),
            event_tx,
        }
    }

    /// Handle one interaction in-process, without the HTTP layer
    pub async fn handle(&self, interaction: &Interaction) -> Option<RenderInstruction> {
        self.router.handle(interaction).await
    }

    /// Start the HTTP API server (blocks until shutdown)
    pub async fn start_api_server(&self) -> Result<()> {
        let addr = self.config.server_addr();
        tracing::info!("Starting API server on {}", addr);
        let state = api::AppState {
            router: self.router.clone(),
            store: self.store.clone(),
            sessions: self.sessions.clone(),
            api_key: self.config.server.api_key.clone(),
            event_tx: self.event_tx.clone(),
        };
        api::serve(addr, state).await
    }

    /// Retire every open album menu. Returns how many were open.
    pub fn shutdown(&self) -> usize {
        self.sessions.clear()
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Subscribe to bot events (controls to strip)
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.event_tx.subscribe()
    }
}
