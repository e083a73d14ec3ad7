use serde::{Deserialize, Serialize};

use depot_core::{Entity, ItemId, LedgerError, LedgerResult};

pub const DEFAULT_CATEGORY: &str = "No category";
pub const DEFAULT_DESCRIPTION: &str = "No description";

/// An item tracked by the ledger.
///
/// `quantity` is the aggregate over every placement of the item and is only
/// changed by supply/consume, never by `update_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub quantity: i64,
}

impl Item {
    /// Substring match against the description, ignoring ASCII case (SQL `LIKE`).
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        self.description
            .to_ascii_lowercase()
            .contains(&keyword.to_ascii_lowercase())
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Editable attributes of an item, normalized for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: String,
    pub category: String,
    pub description: String,
}

impl ItemDraft {
    /// Validate raw input. Blank category and description fall back to the
    /// column defaults.
    pub fn new(name: &str, category: &str, description: &str) -> LedgerResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("name cannot be empty"));
        }
        Ok(Self {
            name: name.to_string(),
            category: or_default(category, DEFAULT_CATEGORY),
            description: or_default(description, DEFAULT_DESCRIPTION),
        })
    }

    pub fn into_item(self, id: ItemId, quantity: i64) -> Item {
        Item {
            id,
            name: self.name,
            category: self.category,
            description: self.description,
            quantity,
        }
    }
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
