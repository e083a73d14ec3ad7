//! Ledger rules as pure functions of the numbers involved.
//!
//! Every store implementation reads the current state inside its atomic scope,
//! runs these checks, and only then writes. Check order matters: callers run
//! them in the order the operations document.

use depot_core::{LedgerError, LedgerResult};

/// Supply/consume/transfer amounts must be strictly positive.
pub fn ensure_positive_quantity(quantity: i64) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::validation("quantity must be greater than 0"));
    }
    Ok(())
}

/// Capacity check for adding `quantity` units to a warehouse already holding
/// `stored` units.
pub fn check_supply(stored: i64, quantity: i64, capacity: i64) -> LedgerResult<()> {
    let requested = stored.saturating_add(quantity);
    if requested > capacity {
        return Err(LedgerError::CapacityExceeded {
            requested,
            capacity,
        });
    }
    Ok(())
}

/// Stock checks for removing `quantity` units of an item from a warehouse.
///
/// `placement` is `None` when the item was never supplied to that warehouse.
pub fn check_consume(item_quantity: i64, placement: Option<i64>, quantity: i64) -> LedgerResult<()> {
    if item_quantity < quantity {
        return Err(LedgerError::InsufficientItemStock {
            available: item_quantity,
            requested: quantity,
        });
    }
    let held = placement.ok_or(LedgerError::PlacementNotFound)?;
    if held < quantity {
        return Err(LedgerError::InsufficientWarehouseStock {
            available: held,
            requested: quantity,
        });
    }
    Ok(())
}

/// `current + quantity`, refusing totals that do not fit in an `i64`.
pub fn add_quantity(current: i64, quantity: i64) -> LedgerResult<i64> {
    current.checked_add(quantity).ok_or_else(|| {
        LedgerError::validation(format!("quantity overflow: {current} + {quantity}"))
    })
}

/// A warehouse may not shrink below what it already stores.
pub fn check_capacity_change(capacity: i64, stored: i64) -> LedgerResult<()> {
    if capacity < stored {
        return Err(LedgerError::validation(format!(
            "capacity cannot be lower than stored quantity: {capacity} < {stored}"
        )));
    }
    Ok(())
}

pub fn check_item_removable(quantity: i64) -> LedgerResult<()> {
    if quantity > 0 {
        return Err(LedgerError::conflict("item is not empty"));
    }
    Ok(())
}

/// A warehouse is removable only without any placement row, zero rows included.
pub fn check_warehouse_removable(placement_rows: usize) -> LedgerResult<()> {
    if placement_rows != 0 {
        return Err(LedgerError::conflict("warehouse is not empty"));
    }
    Ok(())
}
