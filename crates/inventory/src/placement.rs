use serde::{Deserialize, Serialize};

use depot_core::{ItemId, WarehouseId};

use crate::{Item, Warehouse};

/// Units of one item physically held in one warehouse.
///
/// At most one placement exists per `(item_id, warehouse_id)`. A placement
/// that drops to zero is kept as a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// Denormalized read model: a placement joined with its item and warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementView {
    pub item_id: ItemId,
    pub item_name: String,
    pub item_description: String,
    pub item_category: String,
    /// Units of the item held in this warehouse (not the item aggregate).
    pub quantity: i64,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub warehouse_position: String,
    pub warehouse_capacity: i64,
}

impl PlacementView {
    pub fn join(item: &Item, warehouse: &Warehouse, quantity: i64) -> Self {
        Self {
            item_id: item.id,
            item_name: item.name.clone(),
            item_description: item.description.clone(),
            item_category: item.category.clone(),
            quantity,
            warehouse_id: warehouse.id,
            warehouse_name: warehouse.name.clone(),
            warehouse_position: warehouse.position.clone(),
            warehouse_capacity: warehouse.capacity,
        }
    }
}
