//! Tenant inventory stores and the factories that open them.

pub mod memory;
mod schema;
pub mod sqlite;

pub use memory::{InMemoryInventoryStore, InMemoryStoreFactory};
pub use sqlite::{SqliteInventoryStore, SqliteStoreFactory};

use depot_core::{LedgerError, LedgerResult, StoreId};

/// Store ids become file names; keep them to a safe alphabet.
pub(crate) fn ensure_safe_store_id(store_id: &StoreId) -> LedgerResult<()> {
    let id = store_id.as_str();
    let safe = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !safe {
        return Err(LedgerError::validation(format!(
            "invalid store identifier: {id:?}"
        )));
    }
    Ok(())
}
