use serde::{Deserialize, Serialize};

use depot_core::{Entity, LedgerError, LedgerResult, WarehouseId};

/// A warehouse with a hard limit on the total units it may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub position: String,
    pub capacity: i64,
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Editable attributes of a warehouse, validated for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseDraft {
    pub name: String,
    pub position: String,
    pub capacity: i64,
}

impl WarehouseDraft {
    pub fn new(name: &str, position: &str, capacity: i64) -> LedgerResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("name cannot be empty"));
        }
        if capacity <= 0 {
            return Err(LedgerError::validation("capacity must be greater than 0"));
        }
        Ok(Self {
            name: name.to_string(),
            position: position.trim().to_string(),
            capacity,
        })
    }

    pub fn into_warehouse(self, id: WarehouseId) -> Warehouse {
        Warehouse {
            id,
            name: self.name,
            position: self.position,
            capacity: self.capacity,
        }
    }
}
