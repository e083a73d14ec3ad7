//! SQLite-backed tenant stores.
//!
//! One database file per store id. The pool holds a single connection, so
//! every transaction on a store runs serialized; each mutation reads, checks
//! and writes inside one transaction and commits once.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use depot_core::{ItemId, LedgerError, LedgerResult, StoreId, WarehouseId};
use depot_inventory::{
    rules, InventoryStore, Item, ItemDraft, PlacementView, StoreFactory, Warehouse, WarehouseDraft,
};

use super::schema;

const ITEM_COLUMNS: &str = "id, name, category, description, quantity";
const WAREHOUSE_COLUMNS: &str = "id, name, position, capacity";
const PLACEMENT_VIEW: &str = r#"
    SELECT
        p.quantity    AS quantity,
        i.id          AS item_id,
        i.name        AS item_name,
        i.description AS item_description,
        i.category    AS item_category,
        w.id          AS warehouse_id,
        w.name        AS warehouse_name,
        w.position    AS warehouse_position,
        w.capacity    AS warehouse_capacity
    FROM placements p
    JOIN items i ON i.id = p.item_id AND i.deleted = 0
    JOIN warehouses w ON w.id = p.warehouse_id
"#;

/// Escape `LIKE` wildcards so the keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn db_error(err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::PoolClosed => LedgerError::storage("store is closed"),
        other => LedgerError::storage(other),
    }
}

#[derive(Debug)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
    store_id: StoreId,
}

impl SqliteInventoryStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path, store_id: StoreId) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        Self::connect(options, store_id).await
    }

    /// A private in-memory database, gone once the store is closed.
    pub async fn in_memory(store_id: StoreId) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_error)?
            .foreign_keys(true);
        Self::connect(options, store_id).await
    }

    async fn connect(options: SqliteConnectOptions, store_id: StoreId) -> LedgerResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error)?;
        schema::apply(&pool).await.map_err(db_error)?;
        Ok(Self { pool, store_id })
    }

    pub fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    /// Items matching `filter` (a clause and its single text argument), by id.
    async fn items_where(&self, filter: Option<(&str, &str)>) -> LedgerResult<Vec<Item>> {
        let rows = match filter {
            Some((clause, arg)) => {
                let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE deleted = 0 AND ({clause}) ORDER BY id");
                sqlx::query(&sql).bind(arg).fetch_all(&self.pool).await
            }
            None => {
                let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE deleted = 0 ORDER BY id");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(db_error)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn warehouses_where(&self, filter: Option<(&str, &str)>) -> LedgerResult<Vec<Warehouse>> {
        let rows = match filter {
            Some((clause, arg)) => {
                let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE {clause} ORDER BY id");
                sqlx::query(&sql).bind(arg).fetch_all(&self.pool).await
            }
            None => {
                let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses ORDER BY id");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(db_error)?;
        rows.iter().map(warehouse_from_row).collect()
    }

    async fn placement_views(&self, clause: &str, id: i64) -> LedgerResult<Vec<PlacementView>> {
        let sql = format!("{PLACEMENT_VIEW} WHERE {clause} ORDER BY i.id, w.id");
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(placement_view_from_row).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn item_from_row(row: &SqliteRow) -> LedgerResult<Item> {
    Ok(Item {
        id: ItemId::new(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        category: row.try_get("category").map_err(db_error)?,
        description: row.try_get("description").map_err(db_error)?,
        quantity: row.try_get("quantity").map_err(db_error)?,
    })
}

fn warehouse_from_row(row: &SqliteRow) -> LedgerResult<Warehouse> {
    Ok(Warehouse {
        id: WarehouseId::new(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        position: row.try_get("position").map_err(db_error)?,
        capacity: row.try_get("capacity").map_err(db_error)?,
    })
}

fn placement_view_from_row(row: &SqliteRow) -> LedgerResult<PlacementView> {
    Ok(PlacementView {
        item_id: ItemId::new(row.try_get("item_id").map_err(db_error)?),
        item_name: row.try_get("item_name").map_err(db_error)?,
        item_description: row.try_get("item_description").map_err(db_error)?,
        item_category: row.try_get("item_category").map_err(db_error)?,
        quantity: row.try_get("quantity").map_err(db_error)?,
        warehouse_id: WarehouseId::new(row.try_get("warehouse_id").map_err(db_error)?),
        warehouse_name: row.try_get("warehouse_name").map_err(db_error)?,
        warehouse_position: row.try_get("warehouse_position").map_err(db_error)?,
        warehouse_capacity: row.try_get("warehouse_capacity").map_err(db_error)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction steps (run on an open transaction's connection)
// ─────────────────────────────────────────────────────────────────────────────

async fn fetch_item(conn: &mut SqliteConnection, id: ItemId) -> LedgerResult<Item> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1 AND deleted = 0");
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    match row {
        Some(row) => item_from_row(&row),
        None => Err(LedgerError::not_found("item")),
    }
}

async fn fetch_warehouse(conn: &mut SqliteConnection, id: WarehouseId) -> LedgerResult<Warehouse> {
    let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    match row {
        Some(row) => warehouse_from_row(&row),
        None => Err(LedgerError::not_found("warehouse")),
    }
}

/// Whether another live row of `table` (other than `except`) already uses `name`.
async fn name_taken(conn: &mut SqliteConnection, table: &str, name: &str, except: Option<i64>) -> LedgerResult<bool> {
    let live = if table == "items" { " AND deleted = 0" } else { "" };
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE name = ?1 AND id != ?2{live}");
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(name)
        .bind(except.unwrap_or(-1))
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(count > 0)
}

async fn stored_in(conn: &mut SqliteConnection, warehouse: WarehouseId) -> LedgerResult<i64> {
    sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM placements WHERE warehouse_id = ?1")
        .bind(warehouse.get())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)
}

async fn placement_quantity(conn: &mut SqliteConnection, item: ItemId, warehouse: WarehouseId) -> LedgerResult<Option<i64>> {
    sqlx::query_scalar("SELECT quantity FROM placements WHERE item_id = ?1 AND warehouse_id = ?2")
        .bind(item.get())
        .bind(warehouse.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
}

async fn adjust_item_quantity(conn: &mut SqliteConnection, item: ItemId, delta: i64) -> LedgerResult<()> {
    sqlx::query("UPDATE items SET quantity = quantity + ?1 WHERE id = ?2")
        .bind(delta)
        .bind(item.get())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

async fn supply_in(conn: &mut SqliteConnection, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
    rules::ensure_positive_quantity(quantity)?;
    let item_quantity = fetch_item(conn, item).await?.quantity;
    let capacity = fetch_warehouse(conn, warehouse).await?.capacity;
    let stored = stored_in(conn, warehouse).await?;
    rules::check_supply(stored, quantity, capacity)?;
    let held = placement_quantity(conn, item, warehouse).await?.unwrap_or(0);
    rules::add_quantity(held, quantity)?;
    rules::add_quantity(item_quantity, quantity)?;

    sqlx::query(
        r#"
        INSERT INTO placements (item_id, warehouse_id, quantity)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (item_id, warehouse_id)
        DO UPDATE SET quantity = quantity + excluded.quantity
        "#,
    )
    .bind(item.get())
    .bind(warehouse.get())
    .bind(quantity)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    adjust_item_quantity(conn, item, quantity).await
}

async fn consume_in(conn: &mut SqliteConnection, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
    rules::ensure_positive_quantity(quantity)?;
    let item_quantity = fetch_item(conn, item).await?.quantity;
    fetch_warehouse(conn, warehouse).await?;
    let held = placement_quantity(conn, item, warehouse).await?;
    rules::check_consume(item_quantity, held, quantity)?;

    sqlx::query("UPDATE placements SET quantity = quantity - ?1 WHERE item_id = ?2 AND warehouse_id = ?3")
        .bind(quantity)
        .bind(item.get())
        .bind(warehouse.get())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    adjust_item_quantity(conn, item, -quantity).await
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    async fn create_item(&self, name: &str, category: &str, description: &str) -> LedgerResult<ItemId> {
        let draft = ItemDraft::new(name, category, description)?;
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if name_taken(&mut tx, "items", &draft.name, None).await? {
            return Err(LedgerError::conflict("item name already exists"));
        }
        let result = sqlx::query("INSERT INTO items (name, category, description, quantity) VALUES (?1, ?2, ?3, 0)")
            .bind(&draft.name)
            .bind(&draft.category)
            .bind(&draft.description)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(ItemId::new(result.last_insert_rowid()))
    }

    async fn create_warehouse(&self, name: &str, position: &str, capacity: i64) -> LedgerResult<WarehouseId> {
        let draft = WarehouseDraft::new(name, position, capacity)?;
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        if name_taken(&mut tx, "warehouses", &draft.name, None).await? {
            return Err(LedgerError::conflict("warehouse name already exists"));
        }
        let result = sqlx::query("INSERT INTO warehouses (name, position, capacity) VALUES (?1, ?2, ?3)")
            .bind(&draft.name)
            .bind(&draft.position)
            .bind(draft.capacity)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(WarehouseId::new(result.last_insert_rowid()))
    }

    async fn update_item(&self, id: ItemId, name: &str, category: &str, description: &str) -> LedgerResult<()> {
        let draft = ItemDraft::new(name, category, description)?;
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        fetch_item(&mut tx, id).await?;
        if name_taken(&mut tx, "items", &draft.name, Some(id.get())).await? {
            return Err(LedgerError::conflict("item name already exists"));
        }
        sqlx::query("UPDATE items SET name = ?1, category = ?2, description = ?3 WHERE id = ?4")
            .bind(&draft.name)
            .bind(&draft.category)
            .bind(&draft.description)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn update_warehouse(&self, id: WarehouseId, name: &str, position: &str, capacity: i64) -> LedgerResult<()> {
        let draft = WarehouseDraft::new(name, position, capacity)?;
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        fetch_warehouse(&mut tx, id).await?;
        if name_taken(&mut tx, "warehouses", &draft.name, Some(id.get())).await? {
            return Err(LedgerError::conflict("warehouse name already exists"));
        }
        rules::check_capacity_change(draft.capacity, stored_in(&mut tx, id).await?)?;
        sqlx::query("UPDATE warehouses SET name = ?1, position = ?2, capacity = ?3 WHERE id = ?4")
            .bind(&draft.name)
            .bind(&draft.position)
            .bind(draft.capacity)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn delete_item(&self, id: ItemId) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        rules::check_item_removable(fetch_item(&mut tx, id).await?.quantity)?;
        // Soft delete: the item's zero placement rows stay and still count as
        // warehouse contents.
        sqlx::query("UPDATE items SET deleted = 1 WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn delete_warehouse(&self, id: WarehouseId) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        fetch_warehouse(&mut tx, id).await?;
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM placements WHERE warehouse_id = ?1")
            .bind(id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;
        rules::check_warehouse_removable(rows as usize)?;
        sqlx::query("DELETE FROM warehouses WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn supply_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        supply_in(&mut tx, item, warehouse, quantity).await?;
        tx.commit().await.map_err(db_error)?;
        debug!(store_id = %self.store_id, item_id = %item, warehouse_id = %warehouse, quantity, "items supplied");
        Ok(())
    }

    async fn consume_items(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        consume_in(&mut tx, item, warehouse, quantity).await?;
        tx.commit().await.map_err(db_error)?;
        debug!(store_id = %self.store_id, item_id = %item, warehouse_id = %warehouse, quantity, "items consumed");
        Ok(())
    }

    async fn transfer_items(
        &self,
        item: ItemId,
        source: WarehouseId,
        quantity: i64,
        destination: WarehouseId,
    ) -> LedgerResult<()> {
        // Dropping the transaction on any error rolls back the consume leg.
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        consume_in(&mut tx, item, source, quantity).await?;
        supply_in(&mut tx, item, destination, quantity).await?;
        tx.commit().await.map_err(db_error)?;
        debug!(
            store_id = %self.store_id,
            item_id = %item,
            source = %source,
            destination = %destination,
            quantity,
            "items transferred"
        );
        Ok(())
    }

    async fn find_item_by_id(&self, id: ItemId) -> LedgerResult<Item> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_item(&mut conn, id).await
    }

    async fn find_warehouse_by_id(&self, id: WarehouseId) -> LedgerResult<Warehouse> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_warehouse(&mut conn, id).await
    }

    async fn find_item_by_name(&self, name: &str) -> LedgerResult<Vec<Item>> {
        self.items_where(Some(("name = ?1", name))).await
    }

    async fn find_warehouse_by_name(&self, name: &str) -> LedgerResult<Vec<Warehouse>> {
        self.warehouses_where(Some(("name = ?1", name))).await
    }

    async fn find_warehouses_by_position(&self, position: &str) -> LedgerResult<Vec<Warehouse>> {
        self.warehouses_where(Some(("position = ?1", position))).await
    }

    async fn find_items_by_category(&self, category: &str) -> LedgerResult<Vec<Item>> {
        self.items_where(Some(("category = ?1", category))).await
    }

    async fn find_items_by_keyword(&self, keyword: &str) -> LedgerResult<Vec<Item>> {
        let pattern = format!("%{}%", escape_like(keyword));
        self.items_where(Some((r"description LIKE ?1 ESCAPE '\'", pattern.as_str()))).await
    }

    async fn find_items_in_warehouse(&self, warehouse: WarehouseId) -> LedgerResult<Vec<PlacementView>> {
        self.placement_views("p.warehouse_id = ?1", warehouse.get()).await
    }

    async fn find_warehouses_for_item(&self, item: ItemId) -> LedgerResult<Vec<PlacementView>> {
        self.placement_views("p.item_id = ?1", item.get()).await
    }

    async fn list_all_items(&self) -> LedgerResult<Vec<Item>> {
        self.items_where(None).await
    }

    async fn list_all_warehouses(&self) -> LedgerResult<Vec<Warehouse>> {
        self.warehouses_where(None).await
    }

    async fn close(&self) -> LedgerResult<()> {
        self.pool.close().await;
        info!(store_id = %self.store_id, "sqlite store closed");
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Location {
    Directory(PathBuf),
    Memory,
}

/// Opens `<data_dir>/<store_id>.db`, creating the file and schema on first use.
#[derive(Debug, Clone)]
pub struct SqliteStoreFactory {
    location: Location,
}

impl SqliteStoreFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Directory(data_dir.into()),
        }
    }

    /// Every open yields a fresh private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
        }
    }

    /// Database file backing `store_id` (none for in-memory factories).
    pub fn path_for(&self, store_id: &StoreId) -> Option<PathBuf> {
        match &self.location {
            Location::Directory(dir) => Some(dir.join(format!("{store_id}.db"))),
            Location::Memory => None,
        }
    }
}

#[async_trait]
impl StoreFactory for SqliteStoreFactory {
    async fn open(&self, store_id: &StoreId) -> LedgerResult<Arc<dyn InventoryStore>> {
        super::ensure_safe_store_id(store_id)?;
        let store = match &self.location {
            Location::Directory(dir) => {
                tokio::fs::create_dir_all(dir).await.map_err(LedgerError::storage)?;
                let path = dir.join(format!("{store_id}.db"));
                SqliteInventoryStore::open(&path, store_id.clone()).await?
            }
            Location::Memory => SqliteInventoryStore::in_memory(store_id.clone()).await?,
        };
        info!(store_id = %store_id, "sqlite store opened");
        Ok(Arc::new(store))
    }
}
