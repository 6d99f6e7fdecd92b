//! HTTP route handlers for the API

use super::AppState;
use crate::error::BotError;
use crate::interaction::{Interaction, UserId};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Route one interaction and return what the adapter should render.
///
/// Answers 204 when the interaction is not addressed to this bot.
pub async fn handle_interaction(
    State(state): State<AppState>,
    Json(interaction): Json<Interaction>,
) -> Response {
    tracing::debug!(
        "Interaction {} from user {}",
        interaction.id,
        interaction.user.id
    );

    match state.router.handle(&interaction).await {
        Some(instruction) => Json(instruction).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn list_cards(State(state): State<AppState>) -> Response {
    match state.store.all_cards().await {
        Ok(cards) => Json(serde_json::json!({
            "total": cards.len(),
            "cards": cards
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn user_categories(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let user = UserId::new(id);
    match state.store.fetch_category_counts(&user).await {
        Ok(categories) => Json(serde_json::json!({
            "user_id": user,
            "categories": categories
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UserCardsQuery {
    pub category: Option<String>,
}

pub async fn user_cards(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserCardsQuery>,
) -> Response {
    let user = UserId::new(id);
    let result = match query.category.as_deref() {
        Some(category) => state.store.fetch_cards_in_category(&user, category).await,
        None => state.store.fetch_owned_collection(&user).await,
    };

    match result {
        Ok(cards) => Json(serde_json::json!({
            "user_id": user,
            "category": query.category,
            "cards": cards
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// A single owned card with its display details
pub async fn user_card(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(String, i64)>,
) -> Response {
    let user = UserId::new(id);
    match state.store.fetch_owned_card(&user, card_id).await {
        Ok(card) => Json(card).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "active": state.sessions.len(),
        "timeout_ms": state.sessions.timeout().as_millis() as u64
    }))
}

fn error_response(e: BotError) -> Response {
    let status = match &e {
        BotError::NotFound(..) => StatusCode::NOT_FOUND,
        BotError::Validation(_) => StatusCode::BAD_REQUEST,
        BotError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("API request failed: {}", e);
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}
