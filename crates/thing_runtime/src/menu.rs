//! Navigation menu over things and their properties
//!
//! Flattens the thing → property tree into one ordered list: each thing,
//! in input order, immediately followed by its properties in property order.

use serde::{Deserialize, Serialize};
use thing_types::Thing;

pub const THING_ICON: &str = "devices";
pub const PROPERTY_ICON: &str = "timeline";

/// What a menu entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Thing,
    Property,
}

/// One row of the navigation menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Route path: `<thing>` or `<thing>/properties/<property>`
    pub path: String,
    pub title: String,
    pub kind: EntryKind,
    pub icon: String,
}

/// Route path of a property entry
pub fn property_path(thing: impl std::fmt::Display, property: impl std::fmt::Display) -> String {
    format!("{}/properties/{}", thing, property)
}

/// Build the menu for `things`
pub fn build_menu(things: &[Thing]) -> Vec<MenuEntry> {
    let len = things.iter().map(|t| 1 + t.properties.len()).sum();
    let mut menu = Vec::with_capacity(len);

    for thing in things {
        menu.push(MenuEntry {
            path: thing.id.to_string(),
            title: thing.name.clone(),
            kind: EntryKind::Thing,
            icon: THING_ICON.to_string(),
        });

        for property in &thing.properties {
            menu.push(MenuEntry {
                path: property_path(thing.id, property.id),
                title: property.name.clone(),
                kind: EntryKind::Property,
                icon: PROPERTY_ICON.to_string(),
            });
        }
    }

    menu
}

/// Retitle the entry at exactly `path`
///
/// Returns false, leaving the menu untouched, when no entry matches.
pub fn update_entry(menu: &mut [MenuEntry], path: &str, title: impl Into<String>) -> bool {
    match menu.iter_mut().find(|e| e.path == path) {
        Some(entry) => {
            entry.title = title.into();
            true
        }
        None => false,
    }
}
