#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use depot_auth::{CredentialDirectory, InMemoryCredentialStore};
use depot_core::{ItemId, LedgerError, LedgerResult, StoreId, WarehouseId};
use depot_infra::{InMemoryInventoryStore, InMemoryStoreFactory};
use depot_inventory::{InventoryStore, Item, PlacementView, StoreFactory, Warehouse};
use depot_session::{RouterConfig, SessionRouter};

pub fn directory() -> Arc<CredentialDirectory> {
    Arc::new(CredentialDirectory::load(InMemoryCredentialStore::new()).unwrap())
}

pub fn memory_router(config: RouterConfig) -> SessionRouter {
    depot_observability::init_for_tests();
    SessionRouter::new(directory(), Arc::new(InMemoryStoreFactory::new()), config)
}

/// A factory that can never open a store.
#[derive(Debug)]
pub struct BrokenFactory;

#[async_trait]
impl StoreFactory for BrokenFactory {
    async fn open(&self, store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>> {
        Err(LedgerError::storage(format!("cannot open {store_id}")))
    }
}

/// In-memory stores, except that opening `held` parks until `release` fires.
#[derive(Debug)]
pub struct GatedFactory {
    inner: InMemoryStoreFactory,
    held: StoreId,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedFactory {
    pub fn new(held: StoreId) -> Self {
        Self {
            inner: InMemoryStoreFactory::new(),
            held,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl StoreFactory for GatedFactory {
    async fn open(&self, store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>> {
        if *store_id == self.held {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.open(store_id).await
    }
}

/// Hands out in-memory stores whose `close` always fails.
#[derive(Debug, Default)]
pub struct StickyFactory;

#[async_trait]
impl StoreFactory for StickyFactory {
    async fn open(&self, _store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>> {
        Ok(Arc::new(StickyStore(InMemoryInventoryStore::new())))
    }
}

#[derive(Debug)]
pub struct StickyStore(InMemoryInventoryStore);

#[async_trait]
impl InventoryStore for StickyStore {
    async fn create_item(&self, name: &str, category: &str, description: &str) -> LedgerResult<ItemId> {
        self.0.create_item(name, category, description).await
    }
    async fn create_warehouse(&self, name: &str, position: &str, capacity: i64) -> LedgerResult<WarehouseId> {
        self.0.create_warehouse(name, position, capacity).await
    }
    async fn update_item(&self, id: ItemId, name: &str, category: &str, description: &str) -> LedgerResult<()> {
        self.0.update_item(id, name, category, description).await
    }
    async fn update_warehouse(&self, id: WarehouseId, name: &str, position: &str, capacity: i64) -> LedgerResult<()> {
        self.0.update_warehouse(id, name, position, capacity).await
    }
    async fn delete_item(&self, id: ItemId) -> LedgerResult<()> {
        self.0.delete_item(id).await
    }
    async fn delete_warehouse(&self, id: WarehouseId) -> LedgerResult<()> {
        self.0.delete_warehouse(id).await
    }
    async fn supply_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        self.0.supply_items(item, warehouse, quantity).await
    }
    async fn consume_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        self.0.consume_items(item, warehouse, quantity).await
    }
    async fn transfer_items(
        &self,
        item: ItemId,
        source: WarehouseId,
        quantity: i64,
        destination: WarehouseId,
    ) -> LedgerResult<()> {
        self.0.transfer_items(item, source, quantity, destination).await
    }
    async fn find_item_by_id(&self, id: ItemId) -> LedgerResult<Item> {
        self.0.find_item_by_id(id).await
    }
    async fn find_warehouse_by_id(&self, id: WarehouseId) -> LedgerResult<Warehouse> {
        self.0.find_warehouse_by_id(id).await
    }
    async fn find_item_by_name(&self, name: &str) -> LedgerResult<Vec<Item>> {
        self.0.find_item_by_name(name).await
    }
    async fn find_warehouse_by_name(&self, name: &str) -> LedgerResult<Vec<Warehouse>> {
        self.0.find_warehouse_by_name(name).await
    }
    async fn find_warehouses_by_position(&self, position: &str) -> LedgerResult<Vec<Warehouse>> {
        self.0.find_warehouses_by_position(position).await
    }
    async fn find_items_by_category(&self, category: &str) -> LedgerResult<Vec<Item>> {
        self.0.find_items_by_category(category).await
    }
    async fn find_items_by_keyword(&self, keyword: &str) -> LedgerResult<Vec<Item>> {
        self.0.find_items_by_keyword(keyword).await
    }
    async fn find_items_in_warehouse(&self, warehouse: WarehouseId) -> LedgerResult<Vec<PlacementView>> {
        self.0.find_items_in_warehouse(warehouse).await
    }
    async fn find_warehouses_for_item(&self, item: ItemId) -> LedgerResult<Vec<PlacementView>> {
        self.0.find_warehouses_for_item(item).await
    }
    async fn list_all_items(&self) -> LedgerResult<Vec<Item>> {
        self.0.list_all_items().await
    }
    async fn list_all_warehouses(&self) -> LedgerResult<Vec<Warehouse>> {
        self.0.list_all_warehouses().await
    }
    async fn close(&self) -> LedgerResult<()> {
        Err(LedgerError::storage("disk went away"))
    }
}
