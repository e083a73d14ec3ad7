//! In-memory tenant stores for tests/dev.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use depot_core::{ItemId, LedgerError, LedgerResult, StoreId, WarehouseId};
use depot_inventory::{
    InventoryStore, Item, ItemDraft, Ledger, PlacementView, StoreFactory, Warehouse, WarehouseDraft,
};

/// A [`Ledger`] behind a mutex.
///
/// Every operation runs inside one critical section, so the check and the
/// write of a mutation can never interleave with another caller.
#[derive(Debug)]
pub struct InMemoryInventoryStore {
    ledger: Mutex<Ledger>,
    open: AtomicBool,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::new()),
            open: AtomicBool::new(true),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> LedgerResult<T>) -> LedgerResult<T> {
        if !self.is_open() {
            return Err(LedgerError::storage("store is closed"));
        }
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| LedgerError::storage("ledger lock poisoned"))?;
        f(&mut ledger)
    }
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matching<T: Clone>(rows: impl Iterator<Item = T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    rows.filter(|r| keep(r)).collect()
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_item(&self, name: &str, category: &str, description: &str) -> LedgerResult<ItemId> {
        let draft = ItemDraft::new(name, category, description)?;
        self.with_ledger(|l| l.create_item(draft))
    }

    async fn create_warehouse(&self, name: &str, position: &str, capacity: i64) -> LedgerResult<WarehouseId> {
        let draft = WarehouseDraft::new(name, position, capacity)?;
        self.with_ledger(|l| l.create_warehouse(draft))
    }

    async fn update_item(&self, id: ItemId, name: &str, category: &str, description: &str) -> LedgerResult<()> {
        let draft = ItemDraft::new(name, category, description)?;
        self.with_ledger(|l| l.update_item(id, draft))
    }

    async fn update_warehouse(&self, id: WarehouseId, name: &str, position: &str, capacity: i64) -> LedgerResult<()> {
        let draft = WarehouseDraft::new(name, position, capacity)?;
        self.with_ledger(|l| l.update_warehouse(id, draft))
    }

    async fn delete_item(&self, id: ItemId) -> LedgerResult<()> {
        self.with_ledger(|l| l.delete_item(id))
    }

    async fn delete_warehouse(&self, id: WarehouseId) -> LedgerResult<()> {
        self.with_ledger(|l| l.delete_warehouse(id))
    }

    async fn supply_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        self.with_ledger(|l| l.supply_items(item, warehouse, quantity))?;
        debug!(item_id = %item, warehouse_id = %warehouse, quantity, "items supplied");
        Ok(())
    }

    async fn consume_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        self.with_ledger(|l| l.consume_items(item, warehouse, quantity))?;
        debug!(item_id = %item, warehouse_id = %warehouse, quantity, "items consumed");
        Ok(())
    }

    async fn transfer_items(
        &self,
        item: ItemId,
        source: WarehouseId,
        quantity: i64,
        destination: WarehouseId,
    ) -> LedgerResult<()> {
        self.with_ledger(|l| l.transfer_items(item, source, quantity, destination))?;
        debug!(item_id = %item, source = %source, destination = %destination, quantity, "items transferred");
        Ok(())
    }

    async fn find_item_by_id(&self, id: ItemId) -> LedgerResult<Item> {
        self.with_ledger(|l| l.item(id).cloned())
    }

    async fn find_warehouse_by_id(&self, id: WarehouseId) -> LedgerResult<Warehouse> {
        self.with_ledger(|l| l.warehouse(id).cloned())
    }

    async fn find_item_by_name(&self, name: &str) -> LedgerResult<Vec<Item>> {
        self.with_ledger(|l| Ok(matching(l.items().cloned(), |i| i.name == name)))
    }

    async fn find_warehouse_by_name(&self, name: &str) -> LedgerResult<Vec<Warehouse>> {
        self.with_ledger(|l| Ok(matching(l.warehouses().cloned(), |w| w.name == name)))
    }

    async fn find_warehouses_by_position(&self, position: &str) -> LedgerResult<Vec<Warehouse>> {
        self.with_ledger(|l| Ok(matching(l.warehouses().cloned(), |w| w.position == position)))
    }

    async fn find_items_by_category(&self, category: &str) -> LedgerResult<Vec<Item>> {
        self.with_ledger(|l| Ok(matching(l.items().cloned(), |i| i.category == category)))
    }

    async fn find_items_by_keyword(&self, keyword: &str) -> LedgerResult<Vec<Item>> {
        self.with_ledger(|l| Ok(matching(l.items().cloned(), |i| i.matches_keyword(keyword))))
    }

    async fn find_items_in_warehouse(&self, warehouse: WarehouseId) -> LedgerResult<Vec<PlacementView>> {
        self.with_ledger(|l| Ok(l.items_in_warehouse(warehouse)))
    }

    async fn find_warehouses_for_item(&self, item: ItemId) -> LedgerResult<Vec<PlacementView>> {
        self.with_ledger(|l| Ok(l.warehouses_for_item(item)))
    }

    async fn list_all_items(&self) -> LedgerResult<Vec<Item>> {
        self.with_ledger(|l| Ok(l.items().cloned().collect()))
    }

    async fn list_all_warehouses(&self) -> LedgerResult<Vec<Warehouse>> {
        self.with_ledger(|l| Ok(l.warehouses().cloned().collect()))
    }

    async fn close(&self) -> LedgerResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out one [`InMemoryInventoryStore`] per store id.
///
/// Stores outlive close/reopen cycles, so a tenant finds its data again after
/// logging back in within the same process.
#[derive(Debug, Default)]
pub struct InMemoryStoreFactory {
    stores: Mutex<HashMap<StoreId, Arc<InMemoryInventoryStore>>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store behind `store_id`, if it was ever opened.
    pub fn store(&self, store_id: &StoreId) -> Option<Arc<InMemoryInventoryStore>> {
        self.stores.lock().ok()?.get(store_id).cloned()
    }
}

#[async_trait]
impl StoreFactory for InMemoryStoreFactory {
    async fn open(&self, store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>> {
        super::ensure_safe_store_id(store_id)?;
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| LedgerError::storage("store registry lock poisoned"))?;
        let store = stores
            .entry(store_id.clone())
            .or_insert_with(|| Arc::new(InMemoryInventoryStore::new()))
            .clone();
        store.reopen();
        debug!(store_id = %store_id, "in-memory store opened");
        Ok(store)
    }
}
