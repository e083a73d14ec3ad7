//! Inventory ledger domain.
//!
//! Items, warehouses and placements, the pure rules every mutation obeys, the
//! in-memory [`Ledger`] state machine, and the [`InventoryStore`] /
//! [`StoreFactory`] ports that storage backends implement.

pub mod item;
pub mod ledger;
pub mod placement;
pub mod rules;
pub mod store;
pub mod warehouse;

pub use item::{Item, ItemDraft, DEFAULT_CATEGORY, DEFAULT_DESCRIPTION};
pub use ledger::Ledger;
pub use placement::{Placement, PlacementView};
pub use store::{InventoryStore, StoreFactory};
pub use warehouse::{Warehouse, WarehouseDraft};
