//! Interaction router
//!
//! Dispatches each routed interaction to its handler and turns the outcome
//! into a [`RenderInstruction`]. Every failure stops here: it is logged with
//! the owner and interaction kind and answered with a generic notice.

use crate::catalog::CardStore;
use crate::config::DrawConfig;
use crate::draw::{pick_card, DrawStatus};
use crate::error::Result;
use crate::interaction::{Interaction, PeekStep, Route, UserInfo};
use crate::render::{RenderInstruction, Renderer};
use crate::session::{Direction, SessionStore};
use uuid::Uuid;

pub const NO_CARDS_IN_ALBUM: &str =
    "No tienes cartas aún. Usa el comando `/generar` para obtener tus primeras cartas.";
pub const NO_CARDS_TO_SHOW: &str = "Todavía no tienes cartas a disposición.";
pub const SESSION_EXPIRED: &str = "Expiro este menu. Utiliza el comando /myalbum de nuevo";
pub const GENERIC_FAILURE: &str = "Hubo un error al realizar la petición.";
pub const NO_CARD_PICKED: &str = "No se pudo seleccionar ninguna carta.";

/// Routes interactions to the album, peek and draw flows
pub struct InteractionRouter {
    store: CardStore,
    sessions: SessionStore,
    renderer: Renderer,
    draw: DrawConfig,
}

impl InteractionRouter {
    pub fn new(
        store: CardStore,
        sessions: SessionStore,
        renderer: Renderer,
        draw: DrawConfig,
    ) -> Self {
        InteractionRouter {
            store,
            sessions,
            renderer,
            draw,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one interaction. Returns `None` when it is not addressed to this bot.
    pub async fn handle(&self, interaction: &Interaction) -> Option<RenderInstruction> {
        let route = interaction.route()?;
        let kind = route.kind();
        let user = &interaction.user;

        match self.dispatch(interaction, route).await {
            Ok(instruction) => Some(instruction),
            Err(e) => {
                tracing::error!(
                    "Interaction {} ({}) from user {} failed: {}",
                    interaction.id,
                    kind,
                    user.id,
                    e
                );
                Some(RenderInstruction::notice(GENERIC_FAILURE))
            }
        }
    }

    async fn dispatch(&self, interaction: &Interaction, route: Route) -> Result<RenderInstruction> {
        let user = &interaction.user;
        match route {
            Route::OpenAlbum => self.open_album(interaction).await,
            Route::CategorySelected { token, category } => {
                Ok(self.select_category(user, token, category))
            }
            Route::PageNavigated { token, direction } => Ok(self.navigate(user, token, direction)),
            Route::Draw => self.draw(user).await,
            Route::Peek { card_id } => self.peek(user, card_id).await,
            Route::PeekNavigated { index, step } => self.peek_step(user, index, step).await,
        }
    }

    async fn open_album(&self, interaction: &Interaction) -> Result<RenderInstruction> {
        let user = &interaction.user;

        // Fetch everything before touching the session store so a failing
        // store leaves any open menu as it was
        let items = self.store.fetch_owned_collection(&user.id).await?;
        if items.is_empty() {
            return Ok(RenderInstruction::notice(NO_CARDS_IN_ALBUM));
        }
        let categories = self.store.fetch_category_counts(&user.id).await?;

        let info = self.sessions.open(
            user.id.clone(),
            items,
            categories,
            interaction.message_handle(),
        );
        tracing::info!("User {} opened album session {}", user.id, info.token);

        let view = self.sessions.with_session(&user.id, info.token, |session| {
            self.renderer.render_summary(
                user,
                session.completion_percentage(),
                session.categories(),
                session.token(),
            )
        });

        // A second open from the same user may already have replaced this one
        Ok(match view {
            Some(view) => RenderInstruction::Reply {
                view,
                ephemeral: false,
            },
            None => RenderInstruction::notice(SESSION_EXPIRED),
        })
    }

    fn select_category(&self, user: &UserInfo, token: Uuid, category: String) -> RenderInstruction {
        let view = self.sessions.with_session(&user.id, token, |session| {
            session.select_category(category);
            self.renderer.render_page(
                user,
                &session.current_view(),
                session.categories(),
                session.token(),
            )
        });
        self.updated(user, token, view)
    }

    fn navigate(&self, user: &UserInfo, token: Uuid, direction: Direction) -> RenderInstruction {
        let view = self.sessions.with_session(&user.id, token, |session| {
            session.navigate(direction);
            self.renderer.render_page(
                user,
                &session.current_view(),
                session.categories(),
                session.token(),
            )
        });
        self.updated(user, token, view)
    }

    fn updated(
        &self,
        user: &UserInfo,
        token: Uuid,
        view: Option<crate::render::RenderDescriptor>,
    ) -> RenderInstruction {
        match view {
            Some(view) => {
                self.sessions.touch(&user.id, token);
                RenderInstruction::Update { view }
            }
            None => {
                tracing::debug!("User {} used an expired album menu ({})", user.id, token);
                RenderInstruction::notice(SESSION_EXPIRED)
            }
        }
    }

    async fn draw(&self, user: &UserInfo) -> Result<RenderInstruction> {
        let status = self
            .store
            .begin_draw(user, chrono::Utc::now(), self.draw.cooldown_hours)
            .await?;

        if let DrawStatus::CoolingDown { remaining_minutes } = status {
            return Ok(RenderInstruction::Notice {
                content: format!(
                    "Debes esperar {} minutos antes de generar otra carta.",
                    remaining_minutes
                ),
                ephemeral: false,
            });
        }

        let cards = self.store.all_cards().await?;
        let picked = {
            let mut rng = rand::thread_rng();
            pick_card(&cards, &mut rng).cloned()
        };
        let Some(card) = picked else {
            tracing::warn!(
                "Draw for {} picked nothing; catalog weights sum below 100%",
                user.id
            );
            return Ok(RenderInstruction::Notice {
                content: NO_CARD_PICKED.to_string(),
                ephemeral: false,
            });
        };

        let amount = self
            .store
            .grant_card(&user.id, card.id, self.draw.max_copies)
            .await?;
        tracing::info!(
            "User {} drew card {} ({}), now owns {}",
            user.id,
            card.id,
            card.name,
            amount
        );

        Ok(RenderInstruction::Reply {
            view: self.renderer.render_draw(&card),
            ephemeral: false,
        })
    }

    async fn peek(&self, user: &UserInfo, card_id: Option<i64>) -> Result<RenderInstruction> {
        let cards = self.store.fetch_owned_cards(&user.id, card_id).await?;
        let Some(first) = cards.first() else {
            return Ok(RenderInstruction::notice(NO_CARDS_TO_SHOW));
        };

        Ok(RenderInstruction::Reply {
            view: self.renderer.render_peek(first, 0, cards.len()),
            ephemeral: false,
        })
    }

    async fn peek_step(&self, user: &UserInfo, index: usize, step: PeekStep) -> Result<RenderInstruction> {
        let cards = self.store.fetch_owned_cards(&user.id, None).await?;
        if cards.is_empty() {
            return Ok(RenderInstruction::notice(NO_CARDS_TO_SHOW));
        }

        let count = cards.len();
        let current = index % count;
        let next = match step {
            PeekStep::Prev => (current + count - 1) % count,
            PeekStep::Next => (current + 1) % count,
        };

        Ok(RenderInstruction::Update {
            view: self.renderer.render_peek(&cards[next], next, count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Card, MemoryCatalog};
    use crate::events::BotEvent;
    use crate::interaction::{CommandOptions, InteractionKind, UserId};
    use crate::render::{Button, ControlRow, RenderDescriptor};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;

    struct Harness {
        router: InteractionRouter,
        catalog: Arc<MemoryCatalog>,
        events: broadcast::Receiver<BotEvent>,
        counter: std::cell::Cell<u32>,
    }

    fn catalog_cards() -> Vec<Card> {
        // 7 Comun (ids 1..=7), 5 Shiny (ids 8..=12)
        (1..=12)
            .map(|id| Card {
                id,
                name: format!("Card {}", id),
                category: if id <= 7 { "Comun".into() } else { "Shiny".into() },
                description: format!("Description {}", id),
                image_url: None,
                percentage: 100.0 / 12.0,
            })
            .collect()
    }

    fn harness() -> Harness {
        let catalog = Arc::new(MemoryCatalog::new(catalog_cards()));
        let (tx, events) = broadcast::channel(16);
        let sessions = SessionStore::new(Duration::from_secs(60), 5, tx);
        let router = InteractionRouter::new(
            CardStore::Memory(catalog.clone()),
            sessions,
            Renderer::default(),
            DrawConfig::default(),
        );
        Harness {
            router,
            catalog,
            events,
            counter: std::cell::Cell::new(0),
        }
    }

    impl Harness {
        fn give_all(&self, user: &str) {
            for id in 1..=12 {
                self.catalog.grant_card(user, id, 2);
            }
        }

        fn interaction(&self, user: &str, kind: InteractionKind) -> Interaction {
            let n = self.counter.get() + 1;
            self.counter.set(n);
            Interaction {
                id: format!("i{}", n),
                token: format!("t{}", n),
                user: UserInfo {
                    id: UserId::new(user),
                    username: format!("user{}", user),
                    display_name: None,
                    avatar_url: None,
                },
                kind,
            }
        }

        fn command(&self, user: &str, name: &str) -> Interaction {
            self.interaction(
                user,
                InteractionKind::Command {
                    name: name.into(),
                    options: CommandOptions::default(),
                },
            )
        }

        fn component(&self, user: &str, custom_id: &str, values: &[&str]) -> Interaction {
            self.interaction(
                user,
                InteractionKind::Component {
                    custom_id: custom_id.into(),
                    values: values.iter().map(|v| v.to_string()).collect(),
                },
            )
        }

        async fn run(&self, interaction: Interaction) -> RenderInstruction {
            self.router.handle(&interaction).await.unwrap()
        }
    }

    fn view_of(instruction: &RenderInstruction) -> &RenderDescriptor {
        match instruction {
            RenderInstruction::Reply { view, .. } | RenderInstruction::Update { view } => view,
            other => panic!("expected a view, got {:?}", other),
        }
    }

    fn nav_buttons(view: &RenderDescriptor) -> Vec<Button> {
        view.controls
            .iter()
            .find_map(|row| match row {
                ControlRow::Buttons { buttons } => Some(buttons.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn select_id(view: &RenderDescriptor) -> String {
        view.controls
            .iter()
            .find_map(|row| match row {
                ControlRow::Select(menu) => Some(menu.custom_id.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_album_pagination() {
        let h = harness();
        h.give_all("1");

        let opened = h.run(h.command("1", "myalbum")).await;
        let summary = view_of(&opened);
        assert_eq!(summary.fields.len(), 2);
        let select = select_id(summary);

        let page1 = h.run(h.component("1", &select, &["Comun"])).await;
        let view = view_of(&page1);
        assert!(matches!(page1, RenderInstruction::Update { .. }));
        assert_eq!(view.description.as_deref(), Some("Página 1 de 2"));
        let ids: Vec<&str> = view.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(ids, vec!["ID: 1", "ID: 2", "ID: 3", "ID: 4", "ID: 5"]);
        let disabled: Vec<bool> = nav_buttons(view).iter().map(|b| b.disabled).collect();
        assert_eq!(disabled, vec![true, true, false, false]);

        let next_id = nav_buttons(view)[2].custom_id.clone();
        let page2 = h.run(h.component("1", &next_id, &[])).await;
        let view = view_of(&page2);
        assert_eq!(view.description.as_deref(), Some("Página 2 de 2"));
        let ids: Vec<&str> = view.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(ids, vec!["ID: 6", "ID: 7"]);
        let disabled: Vec<bool> = nav_buttons(view).iter().map(|b| b.disabled).collect();
        assert_eq!(disabled, vec![false, false, true, true]);
    }

    #[tokio::test]
    async fn test_empty_album_is_informational() {
        let h = harness();
        let reply = h.run(h.command("9", "myalbum")).await;
        assert_eq!(reply, RenderInstruction::notice(NO_CARDS_IN_ALBUM));
        assert!(h.router.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_retires_first_menu() {
        let mut h = harness();
        h.give_all("1");

        let first = h.run(h.command("1", "myalbum")).await;
        let old_select = select_id(view_of(&first));
        h.run(h.command("1", "myalbum")).await;

        assert_eq!(h.router.sessions().len(), 1);
        match h.events.try_recv().unwrap() {
            BotEvent::ControlsStripped { message, .. } => assert_eq!(message.interaction_id, "i1"),
        }

        // The first message's controls no longer drive anything
        let stale = h.run(h.component("1", &old_select, &["Comun"])).await;
        assert_eq!(stale, RenderInstruction::notice(SESSION_EXPIRED));
    }

    #[tokio::test]
    async fn test_other_user_cannot_drive_menu() {
        let h = harness();
        h.give_all("1");
        h.give_all("2");

        let opened = h.run(h.command("1", "myalbum")).await;
        let select = select_id(view_of(&opened));

        let intruder = h.run(h.component("2", &select, &["Comun"])).await;
        assert_eq!(intruder, RenderInstruction::notice(SESSION_EXPIRED));
        assert_eq!(h.router.sessions().get(&UserId::new("1")).unwrap().category, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_after_expiry_yields_notice() {
        let h = harness();
        h.give_all("1");

        let opened = h.run(h.command("1", "myalbum")).await;
        let select = select_id(view_of(&opened));

        tokio::time::sleep(Duration::from_secs(61)).await;
        let late = h.run(h.component("1", &select, &["Comun"])).await;
        assert_eq!(late, RenderInstruction::notice(SESSION_EXPIRED));
        assert!(h.router.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_unrouted_interactions_are_ignored() {
        let h = harness();
        assert!(h.router.handle(&h.command("1", "ping")).await.is_none());
        assert!(h.router.handle(&h.component("1", "first", &[])).await.is_none());
    }

    #[tokio::test]
    async fn test_peek_wraps_around() {
        let h = harness();
        for id in [3, 5, 8] {
            h.catalog.grant_card("1", id, 2);
        }

        let first = h.run(h.command("1", "mostrar")).await;
        assert_eq!(view_of(&first).title, "Card 3");

        let prev = h.run(h.component("1", "peek:0:prev", &[])).await;
        assert_eq!(view_of(&prev).title, "Card 8");
        assert_eq!(nav_buttons(view_of(&prev))[0].custom_id, "peek:2:prev");

        let next = h.run(h.component("1", "peek:2:next", &[])).await;
        assert_eq!(view_of(&next).title, "Card 3");
    }

    #[tokio::test]
    async fn test_peek_specific_card() {
        let h = harness();
        h.catalog.grant_card("1", 4, 2);
        h.catalog.grant_card("1", 6, 2);

        let mut interaction = h.command("1", "mostrar");
        interaction.kind = InteractionKind::Command {
            name: "mostrar".into(),
            options: CommandOptions { album_id: Some(6) },
        };
        let reply = h.run(interaction).await;
        let view = view_of(&reply);
        assert_eq!(view.title, "Card 6");
        assert!(view.controls.is_empty());

        let empty = h.run(h.command("2", "mostrar")).await;
        assert_eq!(empty, RenderInstruction::notice(NO_CARDS_TO_SHOW));
    }

    #[tokio::test]
    async fn test_draw_then_cooldown() {
        let h = harness();

        let drawn = h.run(h.command("1", "generar")).await;
        assert!(matches!(drawn, RenderInstruction::Reply { .. }));
        assert_eq!(h.catalog.owned_collection("1").len(), 1);

        let again = h.run(h.command("1", "generar")).await;
        match again {
            RenderInstruction::Notice { content, .. } => {
                assert!(content.starts_with("Debes esperar"))
            }
            other => panic!("expected cooldown notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_keeps_open_menu() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(crate::db::Database::new(dir.path().join("cards.db")).unwrap());
        let store = CardStore::Db(db.clone());
        store.import_cards(catalog_cards()).await.unwrap();

        let (tx, mut events) = broadcast::channel(16);
        let h = Harness {
            router: InteractionRouter::new(
                store.clone(),
                SessionStore::new(Duration::from_secs(60), 5, tx),
                Renderer::default(),
                DrawConfig::default(),
            ),
            catalog: Arc::new(MemoryCatalog::new(Vec::new())),
            events: broadcast::channel(1).1,
            counter: std::cell::Cell::new(0),
        };

        let first = h.command("1", "myalbum");
        store
            .begin_draw(&first.user, chrono::Utc::now(), 6)
            .await
            .unwrap();
        store.grant_card(&UserId::new("1"), 3, 2).await.unwrap();

        let opened = h.run(first).await;
        assert!(matches!(opened, RenderInstruction::Reply { .. }));
        let owner = UserId::new("1");
        let token = h.router.sessions().get(&owner).unwrap().token;

        db.with_conn(|conn| conn.execute_batch("DROP TABLE user_cards"))
            .await
            .unwrap();

        let failed = h.run(h.command("1", "myalbum")).await;
        assert_eq!(failed, RenderInstruction::notice(GENERIC_FAILURE));
        assert_eq!(h.router.sessions().get(&owner).unwrap().token, token);
        assert!(events.try_recv().is_err());
    }
}
