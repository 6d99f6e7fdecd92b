//! Configuration management for Albumbot
//!
//! Loads settings from TOML file at ~/.albumbot/config.toml

use crate::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interaction server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Album browsing (sessions and pagination)
    #[serde(default)]
    pub album: AlbumConfig,

    /// Card draw rules
    #[serde(default)]
    pub draw: DrawConfig,

    /// Data directory (defaults to ~/.albumbot)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Optional directory for daily rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".albumbot"))
        .unwrap_or_else(|| PathBuf::from(".albumbot"))
}

/// HTTP interaction server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port (default: 19530)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server host (default: 127.0.0.1 - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Optional API key the platform adapter must send as a Bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_port() -> u16 {
    19530
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            host: default_host(),
            api_key: None,
        }
    }
}

/// Album browsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumConfig {
    /// Inactivity window after which an open album menu is retired
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Cards shown per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Icon shown next to each category in the album summary
    #[serde(default = "default_category_icons")]
    pub category_icons: BTreeMap<String, String>,
}

fn default_session_timeout_ms() -> u64 {
    60_000
}

fn default_page_size() -> usize {
    5
}

fn default_category_icons() -> BTreeMap<String, String> {
    [
        ("Comun", "<:pepposad:1253059533933117631>"),
        ("Especial", "<:3_:1253060277402996788>"),
        ("Especial Jugador", "<a:mexicano:1252717621397291071>"),
        ("Shiny", "<:ping:1253059493005099199>"),
        ("Ex", "<a:emoji_34:1253473698589970523>"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl AlbumConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

impl Default for AlbumConfig {
    fn default() -> Self {
        AlbumConfig {
            session_timeout_ms: default_session_timeout_ms(),
            page_size: default_page_size(),
            category_icons: default_category_icons(),
        }
    }
}

/// Card draw configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawConfig {
    /// Hours a user must wait between draws
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u32,

    /// Maximum copies of a single card a user can hold
    #[serde(default = "default_max_copies")]
    pub max_copies: u32,
}

fn default_cooldown_hours() -> u32 {
    6
}

fn default_max_copies() -> u32 {
    2
}

impl Default for DrawConfig {
    fn default() -> Self {
        DrawConfig {
            cooldown_hours: default_cooldown_hours(),
            max_copies: default_max_copies(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            album: AlbumConfig::default(),
            draw: DrawConfig::default(),
            data_dir: default_data_dir(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(BotError::Config(format!(
                "Configuration file not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Reject values that would make pagination or expiry meaningless
    pub fn validate(&self) -> Result<()> {
        if self.album.page_size == 0 {
            return Err(BotError::Config("album.page_size must be at least 1".into()));
        }
        if self.album.session_timeout_ms == 0 {
            return Err(BotError::Config(
                "album.session_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|p| p.join(".albumbot").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".albumbot/config.toml"))
    }

    /// Get the data directory, expanding ~ if present
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    /// Get the log directory, expanding ~ if present
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(expand_path)
    }

    /// Get the server socket address
    pub fn server_addr(&self) -> SocketAddr {
        use std::net::ToSocketAddrs;

        format!("{}:{}", self.server.host, self.server.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], self.server.port)))
    }

    /// Apply `ALBUMBOT_*` environment overrides (server options and data directory)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ALBUMBOT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ALBUMBOT_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(key) = std::env::var("ALBUMBOT_SERVER_API_KEY") {
            self.server.api_key = if key.is_empty() { None } else { Some(key) };
        }
        if let Ok(data_dir) = std::env::var("ALBUMBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
    }

    /// Create a default configuration file at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# Albumbot Configuration

# Where the card database lives
# data_dir = "~/.albumbot"

# Uncomment to also write daily rolling log files
# log_dir = "~/.albumbot/logs"

[server]
# Port the platform adapter posts interactions to (default: 19530)
port = 19530

# Host to bind to
# "127.0.0.1" = localhost only (recommended when the adapter runs alongside)
host = "127.0.0.1"

# Optional API key for the adapter
# If set, requests must send: Authorization: Bearer <api_key>
# api_key = "your-secret-key"

[album]
# Inactivity window before an open album menu loses its controls
session_timeout_ms = 60000
# Cards per page
page_size = 5

[album.category_icons]
Comun = "<:pepposad:1253059533933117631>"
Especial = "<:3_:1253060277402996788>"
"Especial Jugador" = "<a:mexicano:1252717621397291071>"
Shiny = "<:ping:1253059493005099199>"
Ex = "<a:emoji_34:1253473698589970523>"

[draw]
# Hours between draws
cooldown_hours = 6
# Copies of one card a user can hold
max_copies = 2
"#;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
