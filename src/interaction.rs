//! Interaction events delivered by the platform adapter.
//!
//! Component custom ids carry everything needed to route a click back to
//! its origin: album controls embed the session token, peek buttons embed
//! the card index they were rendered for.

use crate::session::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Slash command that opens the paginated album
pub const ALBUM_COMMAND: &str = "myalbum";
/// Slash command that shows owned cards one at a time
pub const PEEK_COMMAND: &str = "mostrar";
/// Slash command that draws a card
pub const DRAW_COMMAND: &str = "generar";

/// Stable platform user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The invoking user as the platform describes them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    /// Server nickname, when the platform has one
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserInfo {
    /// Nickname if set, otherwise the username
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Reference to a live interactive message.
///
/// The adapter edits the message through the token of the interaction that
/// created it. The bot never owns the message itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub interaction_id: String,
    pub interaction_token: String,
}

/// An inbound interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Platform interaction id
    pub id: String,
    /// Token used to edit the response to this interaction
    pub token: String,
    pub user: UserInfo,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

/// What the user did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionKind {
    /// Slash command invocation
    Command {
        name: String,
        #[serde(default)]
        options: CommandOptions,
    },
    /// Button click or select menu choice
    Component {
        custom_id: String,
        #[serde(default)]
        values: Vec<String>,
    },
}

/// Options accepted by the bot's slash commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Card to jump to in the peek command
    #[serde(default)]
    pub album_id: Option<i64>,
}

/// Direction of a peek button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekStep {
    Prev,
    Next,
}

impl PeekStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeekStep::Prev => "prev",
            PeekStep::Next => "next",
        }
    }
}

/// Parsed component custom id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomId {
    /// `album:{token}:category`
    AlbumCategory { token: Uuid },
    /// `album:{token}:{first|previous|next|last}`
    AlbumPage { token: Uuid, direction: Direction },
    /// `peek:{index}:{prev|next}`
    Peek { index: usize, step: PeekStep },
}

impl fmt::Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomId::AlbumCategory { token } => write!(f, "album:{}:category", token),
            CustomId::AlbumPage { token, direction } => {
                write!(f, "album:{}:{}", token, direction.as_str())
            }
            CustomId::Peek { index, step } => write!(f, "peek:{}:{}", index, step.as_str()),
        }
    }
}

impl FromStr for CustomId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(prefix), Some(key), Some(action)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("malformed custom id: {}", s));
        };

        match prefix {
            "album" => {
                let token = Uuid::parse_str(key).map_err(|e| format!("bad album token: {}", e))?;
                if action == "category" {
                    return Ok(CustomId::AlbumCategory { token });
                }
                let direction = action
                    .parse::<Direction>()
                    .map_err(|_| format!("unknown album action: {}", action))?;
                Ok(CustomId::AlbumPage { token, direction })
            }
            "peek" => {
                let index = key
                    .parse::<usize>()
                    .map_err(|e| format!("bad peek index: {}", e))?;
                let step = match action {
                    "prev" => PeekStep::Prev,
                    "next" => PeekStep::Next,
                    other => return Err(format!("unknown peek action: {}", other)),
                };
                Ok(CustomId::Peek { index, step })
            }
            other => Err(format!("unknown custom id prefix: {}", other)),
        }
    }
}

/// Where an interaction is routed
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    OpenAlbum,
    CategorySelected { token: Uuid, category: String },
    PageNavigated { token: Uuid, direction: Direction },
    Draw,
    Peek { card_id: Option<i64> },
    PeekNavigated { index: usize, step: PeekStep },
}

impl Route {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Route::OpenAlbum => "open_album",
            Route::CategorySelected { .. } => "category_selected",
            Route::PageNavigated { .. } => "page_navigated",
            Route::Draw => "draw",
            Route::Peek { .. } => "peek",
            Route::PeekNavigated { .. } => "peek_navigated",
        }
    }
}

impl Interaction {
    /// Handle of the message this interaction's response creates or edits
    pub fn message_handle(&self) -> MessageHandle {
        MessageHandle {
            interaction_id: self.id.clone(),
            interaction_token: self.token.clone(),
        }
    }

    /// Resolve the route, or `None` when the interaction is not for this bot
    pub fn route(&self) -> Option<Route> {
        match &self.kind {
            InteractionKind::Command { name, options } => match name.as_str() {
                ALBUM_COMMAND => Some(Route::OpenAlbum),
                DRAW_COMMAND => Some(Route::Draw),
                PEEK_COMMAND => Some(Route::Peek {
                    card_id: options.album_id,
                }),
                _ => None,
            },
            InteractionKind::Component { custom_id, values } => {
                let parsed = match custom_id.parse::<CustomId>() {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::debug!("Ignoring component {}: {}", custom_id, e);
                        return None;
                    }
                };
                match parsed {
                    CustomId::AlbumCategory { token } => {
                        let category = values.first()?.clone();
                        Some(Route::CategorySelected { token, category })
                    }
                    CustomId::AlbumPage { token, direction } => {
                        Some(Route::PageNavigated { token, direction })
                    }
                    CustomId::Peek { index, step } => Some(Route::PeekNavigated { index, step }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(custom_id: &str, values: &[&str]) -> Interaction {
        Interaction {
            id: "i1".into(),
            token: "t1".into(),
            user: UserInfo {
                id: UserId::new("42"),
                username: "alice".into(),
                display_name: None,
                avatar_url: None,
            },
            kind: InteractionKind::Component {
                custom_id: custom_id.into(),
                values: values.iter().map(|v| v.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_custom_id_display_parses_back() {
        let token = Uuid::new_v4();
        let ids = [
            CustomId::AlbumCategory { token },
            CustomId::AlbumPage { token, direction: Direction::Last },
            CustomId::Peek { index: 3, step: PeekStep::Prev },
        ];
        for id in ids {
            assert_eq!(id.to_string().parse::<CustomId>().unwrap(), id);
        }
    }

    #[test]
    fn test_route_album_controls() {
        let token = Uuid::new_v4();
        let select = component(&format!("album:{}:category", token), &["Comun"]);
        assert_eq!(
            select.route(),
            Some(Route::CategorySelected { token, category: "Comun".into() })
        );

        let next = component(&format!("album:{}:next", token), &[]);
        assert_eq!(
            next.route(),
            Some(Route::PageNavigated { token, direction: Direction::Next })
        );
    }

    #[test]
    fn test_route_ignores_foreign_components() {
        assert_eq!(component("first", &[]).route(), None);
        assert_eq!(component("album:not-a-uuid:next", &[]).route(), None);
        assert_eq!(component("other:1:next", &[]).route(), None);
        // A select without a chosen value has nothing to route
        let token = Uuid::new_v4();
        assert_eq!(component(&format!("album:{}:category", token), &[]).route(), None);
    }

    #[test]
    fn test_interaction_json_shape() {
        let json = r#"{
            "id": "900",
            "token": "tok",
            "user": { "id": "42", "username": "alice", "display_name": "Ali" },
            "type": "command",
            "name": "mostrar",
            "options": { "album_id": 7 }
        }"#;
        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(interaction.user.shown_name(), "Ali");
        assert_eq!(interaction.route(), Some(Route::Peek { card_id: Some(7) }));
        assert_eq!(interaction.message_handle().interaction_token, "tok");
    }
}
