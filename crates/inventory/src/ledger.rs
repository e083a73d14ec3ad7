//! Pure, in-memory inventory ledger.
//!
//! `Ledger` owns the item, warehouse and placement tables of one tenant and
//! applies every operation deterministically, without IO. Each method either
//! applies its whole effect or returns an error with the state untouched.
//!
//! Deleting an item only retires it: its placement rows stay behind, so a
//! warehouse that ever held the item keeps failing the emptiness guard.

use std::collections::BTreeMap;

use depot_core::{ItemId, LedgerError, LedgerResult, WarehouseId};

use crate::rules;
use crate::{Item, ItemDraft, Placement, PlacementView, Warehouse, WarehouseDraft};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    items: BTreeMap<ItemId, Item>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    placements: BTreeMap<(ItemId, WarehouseId), i64>,
    next_item_id: i64,
    next_warehouse_id: i64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            warehouses: BTreeMap::new(),
            placements: BTreeMap::new(),
            next_item_id: 1,
            next_warehouse_id: 1,
        }
    }

    pub fn create_item(&mut self, draft: ItemDraft) -> LedgerResult<ItemId> {
        if self.items.values().any(|i| i.name == draft.name) {
            return Err(LedgerError::conflict("item name already exists"));
        }
        let id = ItemId::new(self.next_item_id);
        self.next_item_id += 1;
        self.items.insert(id, draft.into_item(id, 0));
        Ok(id)
    }

    pub fn create_warehouse(&mut self, draft: WarehouseDraft) -> LedgerResult<WarehouseId> {
        if self.warehouses.values().any(|w| w.name == draft.name) {
            return Err(LedgerError::conflict("warehouse name already exists"));
        }
        let id = WarehouseId::new(self.next_warehouse_id);
        self.next_warehouse_id += 1;
        self.warehouses.insert(id, draft.into_warehouse(id));
        Ok(id)
    }

    pub fn update_item(&mut self, id: ItemId, draft: ItemDraft) -> LedgerResult<()> {
        let quantity = self.item(id)?.quantity;
        if self.items.values().any(|i| i.id != id && i.name == draft.name) {
            return Err(LedgerError::conflict("item name already exists"));
        }
        self.items.insert(id, draft.into_item(id, quantity));
        Ok(())
    }

    pub fn update_warehouse(&mut self, id: WarehouseId, draft: WarehouseDraft) -> LedgerResult<()> {
        self.warehouse(id)?;
        if self.warehouses.values().any(|w| w.id != id && w.name == draft.name) {
            return Err(LedgerError::conflict("warehouse name already exists"));
        }
        rules::check_capacity_change(draft.capacity, self.stored_in(id))?;
        self.warehouses.insert(id, draft.into_warehouse(id));
        Ok(())
    }

    /// Retires an empty item. Its zero placement rows are kept.
    pub fn delete_item(&mut self, id: ItemId) -> LedgerResult<()> {
        rules::check_item_removable(self.item(id)?.quantity)?;
        self.items.remove(&id);
        Ok(())
    }

    pub fn delete_warehouse(&mut self, id: WarehouseId) -> LedgerResult<()> {
        self.warehouse(id)?;
        let rows = self.placements.keys().filter(|(_, w)| *w == id).count();
        rules::check_warehouse_removable(rows)?;
        self.warehouses.remove(&id);
        Ok(())
    }

    pub fn supply_items(&mut self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        rules::ensure_positive_quantity(quantity)?;
        let item_quantity = self.item(item)?.quantity;
        let capacity = self.warehouse(warehouse)?.capacity;
        rules::check_supply(self.stored_in(warehouse), quantity, capacity)?;

        let held = self.placements.get(&(item, warehouse)).copied().unwrap_or(0);
        let held = rules::add_quantity(held, quantity)?;
        let item_quantity = rules::add_quantity(item_quantity, quantity)?;

        self.placements.insert((item, warehouse), held);
        if let Some(entry) = self.items.get_mut(&item) {
            entry.quantity = item_quantity;
        }
        Ok(())
    }

    pub fn consume_items(&mut self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        rules::ensure_positive_quantity(quantity)?;
        let item_quantity = self.item(item)?.quantity;
        self.warehouse(warehouse)?;
        let held = self.placements.get(&(item, warehouse)).copied();
        rules::check_consume(item_quantity, held, quantity)?;

        if let Some(held) = self.placements.get_mut(&(item, warehouse)) {
            *held = held.saturating_sub(quantity);
        }
        if let Some(entry) = self.items.get_mut(&item) {
            entry.quantity = entry.quantity.saturating_sub(quantity);
        }
        Ok(())
    }

    /// Consume from `source` and supply to `destination` as one unit.
    pub fn transfer_items(
        &mut self,
        item: ItemId,
        source: WarehouseId,
        quantity: i64,
        destination: WarehouseId,
    ) -> LedgerResult<()> {
        let mut draft = self.clone();
        draft.consume_items(item, source, quantity)?;
        draft.supply_items(item, destination, quantity)?;
        *self = draft;
        Ok(())
    }

    pub fn item(&self, id: ItemId) -> LedgerResult<&Item> {
        self.items.get(&id).ok_or(LedgerError::not_found("item"))
    }

    pub fn warehouse(&self, id: WarehouseId) -> LedgerResult<&Warehouse> {
        self.warehouses.get(&id).ok_or(LedgerError::not_found("warehouse"))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn warehouses(&self) -> impl Iterator<Item = &Warehouse> {
        self.warehouses.values()
    }

    pub fn placements(&self) -> impl Iterator<Item = Placement> + '_ {
        self.placements.iter().map(|(&(item_id, warehouse_id), &quantity)| Placement {
            item_id,
            warehouse_id,
            quantity,
        })
    }

    /// Total units currently held by a warehouse, across all items.
    pub fn stored_in(&self, warehouse: WarehouseId) -> i64 {
        self.placements
            .iter()
            .filter(|((_, w), _)| *w == warehouse)
            .map(|(_, q)| *q)
            .sum()
    }

    pub fn items_in_warehouse(&self, warehouse: WarehouseId) -> Vec<PlacementView> {
        self.placement_views(|p| p.warehouse_id == warehouse)
    }

    pub fn warehouses_for_item(&self, item: ItemId) -> Vec<PlacementView> {
        self.placement_views(|p| p.item_id == item)
    }

    fn placement_views(&self, keep: impl Fn(&Placement) -> bool) -> Vec<PlacementView> {
        self.placements()
            .filter(|p| keep(p))
            .filter_map(|p| {
                let item = self.items.get(&p.item_id)?;
                let warehouse = self.warehouses.get(&p.warehouse_id)?;
                Some(PlacementView::join(item, warehouse, p.quantity))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(name: &str) -> ItemDraft {
        ItemDraft::new(name, "parts", "steel bolt").unwrap()
    }

    fn warehouse(name: &str, capacity: i64) -> WarehouseDraft {
        WarehouseDraft::new(name, "north", capacity).unwrap()
    }

    fn assert_invariants(ledger: &Ledger) {
        for item in ledger.items() {
            let placed: i64 = ledger
                .placements()
                .filter(|p| p.item_id == item.id)
                .map(|p| p.quantity)
                .sum();
            assert_eq!(item.quantity, placed, "aggregate mismatch for {}", item.name);
            assert!(item.quantity >= 0);
        }
        for w in ledger.warehouses() {
            assert!(ledger.stored_in(w.id) <= w.capacity, "{} over capacity", w.name);
        }
        assert!(ledger.placements().all(|p| p.quantity >= 0));
    }

    #[test]
    fn fills_warehouse_up_to_capacity() {
        let mut ledger = Ledger::new();
        let w = ledger.create_warehouse(warehouse("W", 100)).unwrap();
        let i = ledger.create_item(item("bolt")).unwrap();

        ledger.supply_items(i, w, 90).unwrap();
        let err = ledger.supply_items(i, w, 20).unwrap_err();
        assert_eq!(err.to_string(), "warehouse is full: 110 > 100");
        ledger.supply_items(i, w, 10).unwrap();

        assert_eq!(ledger.stored_in(w), 100);
        assert_eq!(ledger.item(i).unwrap().quantity, 100);
        assert_invariants(&ledger);
    }

    #[test]
    fn item_total_overflow_is_rejected_before_any_write() {
        let mut ledger = Ledger::new();
        let a = ledger.create_warehouse(warehouse("A", i64::MAX)).unwrap();
        let b = ledger.create_warehouse(warehouse("B", i64::MAX)).unwrap();
        let i = ledger.create_item(item("bolt")).unwrap();
        ledger.supply_items(i, a, i64::MAX).unwrap();
        let before = ledger.clone();

        let err = ledger.supply_items(i, b, 1).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(ledger, before);
        assert!(ledger.items_in_warehouse(b).is_empty());
        assert_invariants(&ledger);
    }

    #[test]
    fn duplicate_names_conflict() {
        let mut ledger = Ledger::new();
        let a = ledger.create_item(item("bolt")).unwrap();
        let b = ledger.create_item(item("nut")).unwrap();
        assert!(matches!(ledger.create_item(item("bolt")), Err(LedgerError::Conflict(_))));
        assert!(matches!(ledger.update_item(b, item("bolt")), Err(LedgerError::Conflict(_))));
        // Keeping its own name is not a conflict.
        ledger.update_item(a, item("bolt")).unwrap();
    }

    #[test]
    fn update_keeps_quantity_and_guards_capacity() {
        let mut ledger = Ledger::new();
        let w = ledger.create_warehouse(warehouse("W", 50)).unwrap();
        let i = ledger.create_item(item("bolt")).unwrap();
        ledger.supply_items(i, w, 40).unwrap();

        ledger
            .update_item(i, ItemDraft::new("bolt m8", "", "").unwrap())
            .unwrap();
        assert_eq!(ledger.item(i).unwrap().quantity, 40);

        let err = ledger.update_warehouse(w, warehouse("W", 30)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::validation("capacity cannot be lower than stored quantity: 30 < 40")
        );
        ledger.update_warehouse(w, warehouse("W2", 40)).unwrap();
        assert_eq!(ledger.warehouse(w).unwrap().capacity, 40);
    }

    #[test]
    fn failed_transfer_leaves_state_untouched() {
        let mut ledger = Ledger::new();
        let src = ledger.create_warehouse(warehouse("src", 100)).unwrap();
        let dst = ledger.create_warehouse(warehouse("dst", 10)).unwrap();
        let i = ledger.create_item(item("bolt")).unwrap();
        ledger.supply_items(i, src, 50).unwrap();
        let before = ledger.clone();

        let err = ledger.transfer_items(i, src, 20, dst).unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { requested: 20, capacity: 10 }));
        assert_eq!(ledger, before);

        ledger.transfer_items(i, src, 10, dst).unwrap();
        assert_eq!(ledger.stored_in(src), 40);
        assert_eq!(ledger.stored_in(dst), 10);
        assert_eq!(ledger.item(i).unwrap().quantity, 50);
        assert_invariants(&ledger);
    }

    #[test]
    fn zero_placement_keeps_blocking_warehouse_delete_after_item_is_removed() {
        let mut ledger = Ledger::new();
        let w = ledger.create_warehouse(warehouse("W", 10)).unwrap();
        let i = ledger.create_item(item("bolt")).unwrap();
        ledger.supply_items(i, w, 5).unwrap();
        assert_eq!(ledger.delete_item(i), Err(LedgerError::conflict("item is not empty")));

        ledger.consume_items(i, w, 5).unwrap();
        assert_eq!(ledger.items_in_warehouse(w)[0].quantity, 0);
        assert_eq!(
            ledger.delete_warehouse(w),
            Err(LedgerError::conflict("warehouse is not empty"))
        );

        ledger.delete_item(i).unwrap();
        assert_eq!(ledger.item(i), Err(LedgerError::not_found("item")));
        // The retired item is hidden from the views, but its row is not gone.
        assert!(ledger.items_in_warehouse(w).is_empty());
        assert_eq!(ledger.placements().count(), 1);
        assert_eq!(
            ledger.delete_warehouse(w),
            Err(LedgerError::conflict("warehouse is not empty"))
        );

        // The name is free again for a new item.
        let again = ledger.create_item(item("bolt")).unwrap();
        assert_ne!(again, i);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Supply(usize, usize, i64),
        Consume(usize, usize, i64),
        Transfer(usize, usize, i64, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0usize..3, -5i64..60).prop_map(|(i, w, q)| Op::Supply(i, w, q)),
            (0usize..3, 0usize..3, -5i64..60).prop_map(|(i, w, q)| Op::Consume(i, w, q)),
            (0usize..3, 0usize..3, 1i64..60, 0usize..3).prop_map(|(i, s, q, d)| Op::Transfer(i, s, q, d)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: invariants hold after any sequence, and failures change nothing.
        #[test]
        fn invariants_hold_for_any_operation_sequence(ops in proptest::collection::vec(op(), 1..60)) {
            let mut ledger = Ledger::new();
            let items: Vec<_> = ["a", "b", "c"].iter().map(|n| ledger.create_item(item(n)).unwrap()).collect();
            let whs: Vec<_> = [("x", 50), ("y", 80), ("z", 120)]
                .iter()
                .map(|(n, c)| ledger.create_warehouse(warehouse(n, *c)).unwrap())
                .collect();

            for op in ops {
                let before = ledger.clone();
                let result = match op {
                    Op::Supply(i, w, q) => ledger.supply_items(items[i], whs[w], q),
                    Op::Consume(i, w, q) => ledger.consume_items(items[i], whs[w], q),
                    Op::Transfer(i, s, q, d) => ledger.transfer_items(items[i], whs[s], q, whs[d]),
                };
                if result.is_err() {
                    prop_assert_eq!(&ledger, &before);
                }
                assert_invariants(&ledger);
            }
        }

        /// Property: supply followed by the same consume restores the state.
        #[test]
        fn supply_then_consume_round_trips(seed in 0i64..40, quantity in 1i64..60) {
            let mut ledger = Ledger::new();
            let w = ledger.create_warehouse(warehouse("W", 100)).unwrap();
            let i = ledger.create_item(item("bolt")).unwrap();
            if seed > 0 {
                ledger.supply_items(i, w, seed).unwrap();
            }
            let before = ledger.clone();

            ledger.supply_items(i, w, quantity).unwrap();
            ledger.consume_items(i, w, quantity).unwrap();
            prop_assert_eq!(ledger.item(i).unwrap(), before.item(i).unwrap());
            prop_assert_eq!(ledger.stored_in(w), before.stored_in(w));
        }
    }
}
