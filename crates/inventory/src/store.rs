//! Storage ports.
//!
//! The session layer only ever talks to a tenant's ledger through
//! [`InventoryStore`], and only obtains one through a [`StoreFactory`]. How a
//! backend maps these operations onto tables is its own business.

use std::sync::Arc;

use async_trait::async_trait;

use depot_core::{ItemId, LedgerResult, StoreId, WarehouseId};

use crate::{Item, PlacementView, Warehouse};

/// One tenant's inventory ledger.
///
/// Implementations must run each mutating operation (read current state,
/// check, write) as one atomic, serialized unit: two concurrent supplies to
/// the same warehouse must never both pass the capacity check.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create_item(&self, name: &str, category: &str, description: &str) -> LedgerResult<ItemId>;

    async fn create_warehouse(&self, name: &str, position: &str, capacity: i64) -> LedgerResult<WarehouseId>;

    /// Rename/re-describe an item. Its quantity is not touched.
    async fn update_item(&self, id: ItemId, name: &str, category: &str, description: &str) -> LedgerResult<()>;

    /// Fails with `Validation` if `capacity` is below what the warehouse holds.
    async fn update_warehouse(&self, id: WarehouseId, name: &str, position: &str, capacity: i64) -> LedgerResult<()>;

    /// Only an item with zero aggregate quantity can be deleted.
    async fn delete_item(&self, id: ItemId) -> LedgerResult<()>;

    /// Only a warehouse without any placement row can be deleted.
    async fn delete_warehouse(&self, id: WarehouseId) -> LedgerResult<()>;

    async fn supply_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()>;

    async fn consume_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()>;

    /// Consume from `source` then supply to `destination`; all or nothing.
    async fn transfer_items(
        &self,
        item: ItemId,
        source: WarehouseId,
        quantity: i64,
        destination: WarehouseId,
    ) -> LedgerResult<()>;

    async fn find_item_by_id(&self, id: ItemId) -> LedgerResult<Item>;

    async fn find_warehouse_by_id(&self, id: WarehouseId) -> LedgerResult<Warehouse>;

    async fn find_item_by_name(&self, name: &str) -> LedgerResult<Vec<Item>>;

    async fn find_warehouse_by_name(&self, name: &str) -> LedgerResult<Vec<Warehouse>>;

    async fn find_warehouses_by_position(&self, position: &str) -> LedgerResult<Vec<Warehouse>>;

    async fn find_items_by_category(&self, category: &str) -> LedgerResult<Vec<Item>>;

    /// Items whose description contains `keyword` (case-sensitive).
    async fn find_items_by_keyword(&self, keyword: &str) -> LedgerResult<Vec<Item>>;

    async fn find_items_in_warehouse(&self, warehouse: WarehouseId) -> LedgerResult<Vec<PlacementView>>;

    async fn find_warehouses_for_item(&self, item: ItemId) -> LedgerResult<Vec<PlacementView>>;

    async fn list_all_items(&self) -> LedgerResult<Vec<Item>>;

    async fn list_all_warehouses(&self) -> LedgerResult<Vec<Warehouse>>;

    /// Release the backing resources. Later calls fail with a storage error.
    async fn close(&self) -> LedgerResult<()>;
}

/// Opens (creating and initializing if needed) the store behind a store id.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn open(&self, store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>>;
}

#[async_trait]
impl<F> StoreFactory for Arc<F>
where
    F: StoreFactory + ?Sized,
{
    async fn open(&self, store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>> {
        (**self).open(store_id).await
    }
}
