//! `depot-core` — ledger foundation building blocks.
//!
//! Identifiers, the entity trait and the error taxonomy shared by every other
//! crate. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, ItemId, StoreId, WarehouseId};
