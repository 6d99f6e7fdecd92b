//! Card store queries over the SQLite schema

use crate::catalog::{Card, CategoryCount, CollectionItem, OwnedCard};
use crate::draw::{cooldown_remaining, DrawStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

/// All catalog cards, ordered by id
pub fn list_cards(conn: &Connection) -> Result<Vec<Card>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, description, image_url, percentage
         FROM cards
         ORDER BY id ASC",
    )?;

    let cards = stmt
        .query_map([], |row| {
            Ok(Card {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                description: row.get(3)?,
                image_url: row.get(4)?,
                percentage: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(cards)
}

/// Insert or replace catalog cards. Returns the number written.
pub fn upsert_cards(conn: &mut Connection, cards: &[Card]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO cards (id, name, category, description, image_url, percentage)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                description = excluded.description,
                image_url = excluded.image_url,
                percentage = excluded.percentage",
        )?;
        for card in cards {
            stmt.execute(params![
                card.id,
                card.name,
                card.category,
                card.description,
                card.image_url,
                card.percentage
            ])?;
        }
    }
    tx.commit()?;
    Ok(cards.len())
}

/// Every card the user owns, with the owned amount, ordered by card id
pub fn owned_collection(conn: &Connection, user_id: &str) -> Result<Vec<CollectionItem>> {
    let mut stmt = conn.prepare(
        "SELECT cards.id, cards.name, cards.category, user_cards.amount, cards.percentage
         FROM cards
         JOIN user_cards ON cards.id = user_cards.card_id
         WHERE user_cards.user_id = ?
         ORDER BY cards.id ASC",
    )?;

    let items = stmt
        .query_map([user_id], collection_item_from_row)?
        .collect::<Result<Vec<_>>>()?;

    Ok(items)
}

/// Owned card counts for every catalog category, including empty ones
pub fn category_counts(conn: &Connection, user_id: &str) -> Result<Vec<CategoryCount>> {
    let mut stmt = conn.prepare(
        "SELECT cards.category, COUNT(user_cards.card_id)
         FROM cards
         LEFT JOIN user_cards
            ON cards.id = user_cards.card_id
            AND user_cards.user_id = ?
         GROUP BY cards.category
         ORDER BY MIN(cards.id) ASC",
    )?;

    let counts = stmt
        .query_map([user_id], |row| {
            Ok(CategoryCount {
                category: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(counts)
}

/// Owned cards in one category, ordered by card id
pub fn cards_in_category(
    conn: &Connection,
    user_id: &str,
    category: &str,
) -> Result<Vec<CollectionItem>> {
    let mut stmt = conn.prepare(
        "SELECT cards.id, cards.name, cards.category, user_cards.amount, cards.percentage
         FROM cards
         JOIN user_cards ON cards.id = user_cards.card_id
         WHERE user_cards.user_id = ? AND cards.category = ?
         ORDER BY cards.id ASC",
    )?;

    let items = stmt
        .query_map(params![user_id, category], collection_item_from_row)?
        .collect::<Result<Vec<_>>>()?;

    Ok(items)
}

/// Owned cards with display details, optionally narrowed to one card id
pub fn owned_cards(
    conn: &Connection,
    user_id: &str,
    card_id: Option<i64>,
) -> Result<Vec<OwnedCard>> {
    let mut stmt = conn.prepare(
        "SELECT cards.id, cards.name, cards.category, cards.description, cards.image_url
         FROM cards
         JOIN user_cards ON cards.id = user_cards.card_id
         WHERE user_cards.user_id = ?1 AND (?2 IS NULL OR cards.id = ?2)
         ORDER BY cards.id ASC",
    )?;

    let cards = stmt
        .query_map(params![user_id, card_id], |row| {
            Ok(OwnedCard {
                card_id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                description: row.get(3)?,
                image_url: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(cards)
}

/// Check the draw cooldown and, when allowed, stamp the draw time.
///
/// Unknown users are registered and may draw immediately. Runs in one
/// transaction so two concurrent draws by the same user cannot both pass.
pub fn begin_draw(
    conn: &mut Connection,
    user_id: &str,
    username: &str,
    now: DateTime<Utc>,
    cooldown_hours: u32,
) -> Result<DrawStatus> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let now_str = now.to_rfc3339();

    let existing: Option<Option<String>> = tx
        .query_row(
            "SELECT last_draw_at FROM users WHERE id = ?",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;

    let status = match existing {
        None => {
            tx.execute(
                "INSERT INTO users (id, username, last_draw_at, created_at) VALUES (?, ?, ?, ?)",
                params![user_id, username, now_str, now_str],
            )?;
            DrawStatus::Ready { new_user: true }
        }
        Some(last_draw_at) => {
            let last_draw = last_draw_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            match cooldown_remaining(last_draw, now, cooldown_hours) {
                Some(remaining_minutes) => DrawStatus::CoolingDown { remaining_minutes },
                None => {
                    tx.execute(
                        "UPDATE users SET last_draw_at = ?, username = ? WHERE id = ?",
                        params![now_str, username, user_id],
                    )?;
                    DrawStatus::Ready { new_user: false }
                }
            }
        }
    };

    tx.commit()?;
    Ok(status)
}

/// Add one copy of a card to the user's album, capped at `max_copies`.
/// Returns the amount now owned.
pub fn grant_card(conn: &Connection, user_id: &str, card_id: i64, max_copies: u32) -> Result<u32> {
    conn.execute(
        "INSERT INTO user_cards (user_id, card_id, amount) VALUES (?1, ?2, 1)
         ON CONFLICT(user_id, card_id) DO UPDATE SET amount = MIN(amount + 1, ?3)",
        params![user_id, card_id, max_copies.max(1)],
    )?;

    conn.query_row(
        "SELECT amount FROM user_cards WHERE user_id = ? AND card_id = ?",
        params![user_id, card_id],
        |row| row.get(0),
    )
}

fn collection_item_from_row(row: &rusqlite::Row<'_>) -> Result<CollectionItem> {
    Ok(CollectionItem {
        card_id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        amount: row.get(3)?,
        percentage: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_db;
    use chrono::Duration;

    fn card(id: i64, name: &str, category: &str, percentage: f64) -> Card {
        Card {
            id,
            name: name.to_string(),
            category: category.to_string(),
            description: format!("{} description", name),
            image_url: Some(format!("https://cards.example/{}.png", id)),
            percentage,
        }
    }

    fn seeded() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        upsert_cards(
            &mut conn,
            &[
                card(1, "Pepe", "Comun", 40.0),
                card(2, "Lalo", "Comun", 30.0),
                card(3, "Brillo", "Shiny", 20.0),
                card(4, "Mega", "Ex", 10.0),
            ],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_collection_and_counts() {
        let mut conn = seeded();
        let now = Utc::now();
        begin_draw(&mut conn, "u1", "alice", now, 6).unwrap();
        grant_card(&conn, "u1", 2, 2).unwrap();
        grant_card(&conn, "u1", 1, 2).unwrap();
        grant_card(&conn, "u1", 3, 2).unwrap();

        let items = owned_collection(&conn, "u1").unwrap();
        let ids: Vec<i64> = items.iter().map(|i| i.card_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let counts = category_counts(&conn, "u1").unwrap();
        assert_eq!(
            counts,
            vec![
                CategoryCount { category: "Comun".into(), count: 2 },
                CategoryCount { category: "Shiny".into(), count: 1 },
                CategoryCount { category: "Ex".into(), count: 0 },
            ]
        );

        let comun = cards_in_category(&conn, "u1", "Comun").unwrap();
        assert_eq!(comun.len(), 2);
        assert!(comun.windows(2).all(|w| w[0].card_id < w[1].card_id));
    }

    #[test]
    fn test_owned_cards_filter() {
        let mut conn = seeded();
        begin_draw(&mut conn, "u1", "alice", Utc::now(), 6).unwrap();
        grant_card(&conn, "u1", 3, 2).unwrap();
        grant_card(&conn, "u1", 4, 2).unwrap();

        assert_eq!(owned_cards(&conn, "u1", None).unwrap().len(), 2);
        let one = owned_cards(&conn, "u1", Some(4)).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name, "Mega");
        assert!(owned_cards(&conn, "u1", Some(1)).unwrap().is_empty());
    }

    #[test]
    fn test_grant_caps_copies() {
        let mut conn = seeded();
        begin_draw(&mut conn, "u1", "alice", Utc::now(), 6).unwrap();
        assert_eq!(grant_card(&conn, "u1", 1, 2).unwrap(), 1);
        assert_eq!(grant_card(&conn, "u1", 1, 2).unwrap(), 2);
        assert_eq!(grant_card(&conn, "u1", 1, 2).unwrap(), 2);
    }

    #[test]
    fn test_begin_draw_cooldown() {
        let mut conn = seeded();
        let start = Utc::now();

        assert_eq!(
            begin_draw(&mut conn, "u1", "alice", start, 6).unwrap(),
            DrawStatus::Ready { new_user: true }
        );
        assert_eq!(
            begin_draw(&mut conn, "u1", "alice", start + Duration::hours(1), 6).unwrap(),
            DrawStatus::CoolingDown { remaining_minutes: 300 }
        );
        assert_eq!(
            begin_draw(&mut conn, "u1", "alice", start + Duration::hours(6), 6).unwrap(),
            DrawStatus::Ready { new_user: false }
        );
        // The successful draw restarted the cooldown
        assert!(matches!(
            begin_draw(&mut conn, "u1", "alice", start + Duration::hours(7), 6).unwrap(),
            DrawStatus::CoolingDown { .. }
        ));
    }
}
