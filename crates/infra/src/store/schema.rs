//! Table layout of a tenant store.

use sqlx::SqlitePool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL,
        category    TEXT    NOT NULL,
        description TEXT    NOT NULL,
        quantity    INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        deleted     INTEGER NOT NULL DEFAULT 0 CHECK (deleted IN (0, 1))
    )
    "#,
    // Retired items keep their row (placements still point at it) but free their name.
    "CREATE UNIQUE INDEX IF NOT EXISTS items_live_name ON items (name) WHERE deleted = 0",
    r#"
    CREATE TABLE IF NOT EXISTS warehouses (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        name     TEXT    NOT NULL UNIQUE,
        position TEXT    NOT NULL,
        capacity INTEGER NOT NULL CHECK (capacity > 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS placements (
        item_id      INTEGER NOT NULL REFERENCES items (id),
        warehouse_id INTEGER NOT NULL REFERENCES warehouses (id),
        quantity     INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        PRIMARY KEY (item_id, warehouse_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS placements_by_warehouse ON placements (warehouse_id)",
];

/// Idempotent: safe to run on every open.
pub(crate) async fn apply(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
