//! Server-Sent Events for the platform adapter

use super::AppState;
use crate::events::BotEvent;
use crate::interaction::{MessageHandle, UserId};
use crate::session::RetireReason;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// SSE event types sent to clients
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    /// Heartbeat to keep connection alive
    Heartbeat { timestamp: String },
    /// The adapter should remove every control from this message
    ControlsStripped {
        owner: UserId,
        message: MessageHandle,
        reason: RetireReason,
    },
}

impl SseEvent {
    fn name(&self) -> &'static str {
        match self {
            SseEvent::Heartbeat { .. } => "heartbeat",
            SseEvent::ControlsStripped { .. } => "controls:stripped",
        }
    }

    fn into_event(self) -> Event {
        let data = serde_json::to_string(&self).unwrap_or_default();
        Event::default().event(self.name()).data(data)
    }
}

impl From<BotEvent> for SseEvent {
    fn from(event: BotEvent) -> Self {
        match event {
            BotEvent::ControlsStripped {
                owner,
                message,
                reason,
            } => SseEvent::ControlsStripped {
                owner,
                message,
                reason,
            },
        }
    }
}

/// SSE events handler
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let event_rx = state.event_tx.subscribe();

    let broadcast_stream = BroadcastStream::new(event_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(SseEvent::from(event).into_event())),
        Err(e) => {
            // A lagging adapter loses strip events; those menus stay clickable until reopened
            tracing::warn!("SSE subscriber lagged: {}", e);
            None
        }
    });

    let heartbeat_stream =
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
            .map(|_| {
                Ok(SseEvent::Heartbeat {
                    timestamp: chrono::Utc::now().to_rfc3339(),
                }
                .into_event())
            });

    let merged_stream = futures::stream::select(broadcast_stream, heartbeat_stream);

    Sse::new(merged_stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_stripped_payload() {
        let event = SseEvent::from(BotEvent::ControlsStripped {
            owner: UserId::new("7"),
            message: MessageHandle {
                interaction_id: "100".into(),
                interaction_token: "tok".into(),
            },
            reason: RetireReason::Expired,
        });
        assert_eq!(event.name(), "controls:stripped");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "controls_stripped");
        assert_eq!(json["owner"], "7");
        assert_eq!(json["message"]["interaction_token"], "tok");
        assert_eq!(json["reason"], "expired");
    }
}
