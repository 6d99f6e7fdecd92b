//! Page renderer
//!
//! Turns view state into structured descriptors. The platform adapter maps
//! descriptors onto its own widgets; nothing here produces platform markup.
//! Output depends only on the inputs, so identical state renders identically.

use crate::catalog::{Card, CategoryCount, OwnedCard};
use crate::interaction::{CustomId, PeekStep, UserInfo};
use crate::session::{Direction, PageView};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Icon used for categories missing from the icon table
pub const UNKNOWN_CATEGORY_ICON: &str = "Unknown";

/// A renderable message body
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderDescriptor {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub fields: Vec<Field>,
    pub controls: Vec<ControlRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// One row of interactive components
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRow {
    Select(SelectMenu),
    Buttons { buttons: Vec<Button> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: String,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub disabled: bool,
}

/// What the adapter should do with the interaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderInstruction {
    /// Respond with a new message
    Reply {
        view: RenderDescriptor,
        ephemeral: bool,
    },
    /// Edit the message the component belongs to
    Update { view: RenderDescriptor },
    /// Respond with plain text
    Notice { content: String, ephemeral: bool },
}

impl RenderInstruction {
    pub fn notice(content: impl Into<String>) -> Self {
        RenderInstruction::Notice {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Builds descriptors for every bot view
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    category_icons: BTreeMap<String, String>,
}

impl Renderer {
    pub fn new(category_icons: BTreeMap<String, String>) -> Self {
        Renderer { category_icons }
    }

    fn icon(&self, category: &str) -> &str {
        self.category_icons
            .get(category)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY_ICON)
    }

    /// Album overview shown when the album is opened
    pub fn render_summary(
        &self,
        user: &UserInfo,
        completion: f64,
        categories: &[CategoryCount],
        token: Uuid,
    ) -> RenderDescriptor {
        let fields = categories
            .iter()
            .map(|c| Field {
                name: c.category.clone(),
                value: format!("{} Cantidad: {}", self.icon(&c.category), c.count),
            })
            .collect();

        RenderDescriptor {
            title: format!("{} (@{})", user.shown_name(), user.username),
            description: Some(format!("Total de album completado ({:.2}%)", completion)),
            thumbnail_url: user.avatar_url.clone(),
            fields,
            controls: vec![category_select(categories, token)],
            ..Default::default()
        }
    }

    /// One page of a category
    pub fn render_page(
        &self,
        user: &UserInfo,
        view: &PageView,
        categories: &[CategoryCount],
        token: Uuid,
    ) -> RenderDescriptor {
        let category = view.category.as_deref().unwrap_or_default();
        let description = if view.total_pages == 0 {
            "No tienes cartas de esta categoría.".to_string()
        } else {
            format!("Página {} de {}", view.page, view.total_pages)
        };

        let fields = view
            .items
            .iter()
            .map(|item| Field {
                name: format!("ID: {}", item.card_id),
                value: format!("**Nombre:** {}\n**Cantidad:** {}", item.name, item.amount),
            })
            .collect();

        let mut controls = vec![category_select(categories, token)];
        if view.total_pages > 1 {
            controls.push(navigation_row(view.page, view.total_pages, token));
        }

        RenderDescriptor {
            title: format!("Colección {} de {}", category, user.username),
            description: Some(description),
            thumbnail_url: user.avatar_url.clone(),
            fields,
            controls,
            ..Default::default()
        }
    }

    /// A single owned card with wrap-around browsing
    pub fn render_peek(&self, card: &OwnedCard, index: usize, count: usize) -> RenderDescriptor {
        let controls = if count > 1 {
            vec![ControlRow::Buttons {
                buttons: vec![
                    Button {
                        custom_id: CustomId::Peek { index, step: PeekStep::Prev }.to_string(),
                        label: "Previous".to_string(),
                        disabled: false,
                    },
                    Button {
                        custom_id: CustomId::Peek { index, step: PeekStep::Next }.to_string(),
                        label: "Next".to_string(),
                        disabled: false,
                    },
                ],
            }]
        } else {
            Vec::new()
        };

        RenderDescriptor {
            title: card.name.clone(),
            description: Some(card.description.clone()),
            image_url: card.image_url.clone(),
            footer: Some(format!("Categoria: {} | ID: {}", card.category, card.card_id)),
            controls,
            ..Default::default()
        }
    }

    /// The card a user just drew
    pub fn render_draw(&self, card: &Card) -> RenderDescriptor {
        RenderDescriptor {
            title: card.name.clone(),
            description: Some(card.description.clone()),
            image_url: card.image_url.clone(),
            footer: Some(card.category.clone()),
            ..Default::default()
        }
    }
}

fn category_select(categories: &[CategoryCount], token: Uuid) -> ControlRow {
    ControlRow::Select(SelectMenu {
        custom_id: CustomId::AlbumCategory { token }.to_string(),
        placeholder: "Elige una opción".to_string(),
        options: categories
            .iter()
            .map(|c| SelectOption {
                label: c.category.clone(),
                value: c.category.clone(),
            })
            .collect(),
    })
}

fn navigation_row(page: usize, total_pages: usize, token: Uuid) -> ControlRow {
    let buttons = Direction::ALL
        .iter()
        .map(|&direction| {
            let (label, disabled) = match direction {
                Direction::First => ("Primera", page == 1),
                Direction::Previous => ("Anterior", page == 1),
                Direction::Next => ("Siguiente", page == total_pages),
                Direction::Last => ("Última", page == total_pages),
            };
            Button {
                custom_id: CustomId::AlbumPage { token, direction }.to_string(),
                label: label.to_string(),
                disabled,
            }
        })
        .collect();

    ControlRow::Buttons { buttons }
}
