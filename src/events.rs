//! Events broadcast to the platform adapter

use crate::interaction::{MessageHandle, UserId};
use crate::session::RetireReason;
use serde::Serialize;

/// Events emitted by the bot core
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BotEvent {
    /// An album menu was retired; its message must lose its controls
    ControlsStripped {
        owner: UserId,
        message: MessageHandle,
        reason: RetireReason,
    },
}
