//! Card draw rules: cooldown arithmetic and weighted selection

use crate::catalog::Card;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Outcome of checking whether a user may draw now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStatus {
    /// The draw may proceed. `new_user` is set when the user was registered by this check.
    Ready { new_user: bool },
    /// The user drew too recently
    CoolingDown { remaining_minutes: i64 },
}

/// Minutes left until `last_draw + cooldown`, rounded up, or `None` once it has passed.
pub fn cooldown_remaining(
    last_draw: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_hours: u32,
) -> Option<i64> {
    let last_draw = last_draw?;
    let cooldown = Duration::hours(cooldown_hours as i64);
    let elapsed = now.signed_duration_since(last_draw);
    if elapsed >= cooldown {
        return None;
    }

    // Any partial minute counts as a whole one
    let remaining_ms = (cooldown - elapsed).num_milliseconds();
    Some((remaining_ms + 59_999) / 60_000)
}

/// Pick a card by its drop percentage using a roll in `[0, 100)`.
///
/// Walks the cumulative distribution in catalog order. Returns `None` when the
/// weights sum to less than the roll.
pub fn pick_with_roll(cards: &[Card], roll: f64) -> Option<&Card> {
    let mut cumulative = 0.0;
    for card in cards {
        cumulative += card.percentage;
        if roll <= cumulative {
            return Some(card);
        }
    }
    None
}

/// Pick a card with a fresh random roll
pub fn pick_card<'a, R: Rng + ?Sized>(cards: &'a [Card], rng: &mut R) -> Option<&'a Card> {
    let roll = rng.gen_range(0.0..100.0);
    let picked = pick_with_roll(cards, roll);
    if let Some(card) = picked {
        tracing::debug!("Draw roll {:.3} selected card {} ({})", roll, card.id, card.name);
    }
    picked
}
