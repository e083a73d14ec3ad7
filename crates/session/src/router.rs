//! The session router.
//!
//! Owns the table of live sessions (one per alias) and forwards every ledger
//! call to the store bound to the caller's session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use depot_auth::{verify_password, Account, CredentialDirectory};
use depot_core::{AccountId, ItemId, LedgerError, LedgerResult, WarehouseId};
use depot_inventory::{InventoryStore, Item, PlacementView, StoreFactory, Warehouse};

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// How long a session lives after login or its last refresh.
    pub session_ttl: Duration,
}

impl RouterConfig {
    pub fn new(session_ttl: Duration) -> Self {
        Self { session_ttl }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

/// A logout that failed during a sweep. The session is gone either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub alias: String,
    pub error: LedgerError,
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<String>,
    pub failures: Vec<SweepFailure>,
}

struct Session {
    account: Account,
    store: Arc<dyn InventoryStore>,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionTable {
    by_alias: HashMap<String, Session>,
    by_account: HashMap<AccountId, String>,
    /// Bumped whenever the table is drained, so a login that was opening its
    /// store meanwhile knows not to insert.
    generation: u64,
}

impl SessionTable {
    fn insert(&mut self, alias: String, session: Session) {
        self.by_account.insert(session.account.id, alias.clone());
        self.by_alias.insert(alias, session);
    }

    fn remove(&mut self, alias: &str) -> Option<Session> {
        let session = self.by_alias.remove(alias)?;
        self.by_account.remove(&session.account.id);
        Some(session)
    }

    fn for_account(&self, account: AccountId) -> Option<&Session> {
        let alias = self.by_account.get(&account)?;
        self.by_alias.get(alias)
    }

    fn drain(&mut self) -> Vec<(String, Session)> {
        self.generation += 1;
        self.by_account.clear();
        self.by_alias.drain().collect()
    }
}

/// Aliases whose login is past verification and opening its store.
///
/// Kept outside the session table so the table lock is free during the open.
/// A reservation is released on drop, including when the login future is
/// cancelled.
#[derive(Default)]
struct Pending(std::sync::Mutex<HashSet<String>>);

impl Pending {
    fn reserve(&self, alias: &str) -> LedgerResult<Reservation<'_>> {
        let mut pending = self
            .0
            .lock()
            .map_err(|_| LedgerError::storage("pending login lock poisoned"))?;
        if !pending.insert(alias.to_string()) {
            return Err(active_session());
        }
        Ok(Reservation {
            pending: self,
            alias: alias.to_string(),
        })
    }

    fn contains(&self, alias: &str) -> bool {
        self.0.lock().map(|p| p.contains(alias)).unwrap_or(true)
    }
}

struct Reservation<'a> {
    pending: &'a Pending,
    alias: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.0.lock() {
            pending.remove(&self.alias);
        }
    }
}

fn active_session() -> LedgerError {
    LedgerError::conflict("user's active session found, log out first")
}

pub struct SessionRouter {
    directory: Arc<CredentialDirectory>,
    factory: Arc<dyn StoreFactory>,
    session_ttl: chrono::Duration,
    sessions: Mutex<SessionTable>,
    pending: Pending,
}

impl std::fmt::Debug for SessionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRouter")
            .field("directory", &self.directory)
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl SessionRouter {
    pub fn new(
        directory: Arc<CredentialDirectory>,
        factory: Arc<dyn StoreFactory>,
        config: RouterConfig,
    ) -> Self {
        // Anything beyond chrono's range is "never expires" for practical purposes.
        let session_ttl = chrono::Duration::from_std(config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        Self {
            directory,
            factory,
            session_ttl,
            sessions: Mutex::new(SessionTable::default()),
            pending: Pending::default(),
        }
    }

    pub fn directory(&self) -> &CredentialDirectory {
        &self.directory
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.session_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accounts & sessions
    // ─────────────────────────────────────────────────────────────────────

    pub async fn register(&self, alias: &str, password: &str) -> LedgerResult<AccountId> {
        Ok(self.directory.register(alias, password)?.id)
    }

    /// Verify credentials, open the account's store and start a session.
    ///
    /// The alias is reserved before the store is opened and the table lock is
    /// released for the open, so other tenants are never held up by it. At
    /// most one of two concurrent logins for an alias can succeed, and a
    /// failed store open leaves no session behind.
    pub async fn login(&self, alias: &str, password: &str) -> LedgerResult<AccountId> {
        let (account, reservation, generation) = {
            let sessions = self.sessions.lock().await;
            if sessions.by_alias.contains_key(alias) {
                return Err(active_session());
            }
            let account = self.directory.verify(alias, password)?;
            let reservation = self.pending.reserve(alias)?;
            (account, reservation, sessions.generation)
        };

        let store = self.factory.open(&account.store_id).await?;

        let mut sessions = self.sessions.lock().await;
        drop(reservation);
        if sessions.generation != generation {
            drop(sessions);
            // The table was reset or shut down while the store was opening.
            store.close().await?;
            return Err(LedgerError::conflict("sessions were reset during login"));
        }

        let id = account.id;
        info!(alias = %alias, account_id = %id, store_id = %account.store_id, "logged in");
        sessions.insert(
            alias.to_string(),
            Session {
                account,
                store,
                expires_at: self.expiry_from(Utc::now()),
            },
        );
        Ok(id)
    }

    /// End the session and release its store.
    ///
    /// The session is removed even when closing the store fails; the close
    /// error is still returned.
    pub async fn logout(&self, alias: &str) -> LedgerResult<()> {
        let session = self
            .sessions
            .lock()
            .await
            .remove(alias)
            .ok_or(LedgerError::NotLoggedIn)?;
        info!(alias = %alias, account_id = %session.account.id, "logged out");
        session.store.close().await
    }

    pub async fn change_password(&self, alias: &str, old_password: &str, new_password: &str) -> LedgerResult<()> {
        let mut sessions = self.sessions.lock().await;
        // No live session for the alias reads the same as a wrong old password.
        let session = sessions
            .by_alias
            .get_mut(alias)
            .ok_or(LedgerError::InvalidCredentials)?;
        if !verify_password(old_password, &session.account.password_hash) {
            return Err(LedgerError::InvalidCredentials);
        }
        session.account = self.directory.set_password(session.account.id, new_password)?;
        info!(alias = %alias, account_id = %session.account.id, "password changed");
        Ok(())
    }

    pub async fn is_logged_in(&self, alias: &str) -> bool {
        self.sessions.lock().await.by_alias.contains_key(alias)
    }

    /// Whether a login for `alias` is currently opening its store.
    pub fn is_logging_in(&self, alias: &str) -> bool {
        self.pending.contains(alias)
    }

    /// Push the session's expiry out to a full TTL from now.
    pub async fn refresh_session(&self, alias: &str) -> LedgerResult<()> {
        let expires_at = self.expiry_from(Utc::now());
        let mut sessions = self.sessions.lock().await;
        let session = sessions.by_alias.get_mut(alias).ok_or(LedgerError::NotLoggedIn)?;
        session.expires_at = expires_at;
        Ok(())
    }

    pub async fn session_expiry(&self, alias: &str) -> Option<DateTime<Utc>> {
        self.sessions.lock().await.by_alias.get(alias).map(|s| s.expires_at)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.by_alias.len()
    }

    /// Log everyone out and forget every account.
    pub async fn reset_accounts(&self) -> LedgerResult<()> {
        let mut sessions = self.sessions.lock().await;
        let closed = close_all(sessions.drain()).await;
        self.directory.reset()?;
        drop(sessions);
        info!("all accounts reset");
        closed
    }

    /// Log out every live session. Returns the first close failure, if any.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        let drained = self.sessions.lock().await.drain();
        info!(sessions = drained.len(), "router shutting down");
        close_all(drained).await
    }

    /// Log out every session whose expiry is at or before `now`.
    ///
    /// Expired sessions are taken out of the table under one lock, so a
    /// concurrent logout of the same alias sees either the session or nothing.
    /// Close failures are reported, never propagated.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> SweepReport {
        let expired: Vec<(String, Session)> = {
            let mut sessions = self.sessions.lock().await;
            let aliases: Vec<String> = sessions
                .by_alias
                .iter()
                .filter(|(_, s)| s.expires_at <= now)
                .map(|(alias, _)| alias.clone())
                .collect();
            aliases
                .into_iter()
                .filter_map(|alias| sessions.remove(&alias).map(|s| (alias, s)))
                .collect()
        };

        let mut report = SweepReport::default();
        for (alias, session) in expired {
            info!(alias = %alias, account_id = %session.account.id, "session expired");
            if let Err(error) = session.store.close().await {
                report.failures.push(SweepFailure {
                    alias: alias.clone(),
                    error,
                });
            }
            report.evicted.push(alias);
        }
        report
    }

    async fn store_for(&self, account: AccountId) -> LedgerResult<Arc<dyn InventoryStore>> {
        self.sessions
            .lock()
            .await
            .for_account(account)
            .map(|s| Arc::clone(&s.store))
            .ok_or(LedgerError::NotLoggedIn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ledger passthroughs
    // ─────────────────────────────────────────────────────────────────────

    pub async fn find_item_by_id(&self, account: AccountId, id: ItemId) -> LedgerResult<Item> {
        self.store_for(account).await?.find_item_by_id(id).await
    }

    pub async fn find_warehouse_by_id(&self, account: AccountId, id: WarehouseId) -> LedgerResult<Warehouse> {
        self.store_for(account).await?.find_warehouse_by_id(id).await
    }

    pub async fn find_items_by_keyword(&self, account: AccountId, keyword: &str) -> LedgerResult<Vec<Item>> {
        self.store_for(account).await?.find_items_by_keyword(keyword).await
    }

    pub async fn find_item_by_name(&self, account: AccountId, name: &str) -> LedgerResult<Vec<Item>> {
        self.store_for(account).await?.find_item_by_name(name).await
    }

    pub async fn find_warehouse_by_name(&self, account: AccountId, name: &str) -> LedgerResult<Vec<Warehouse>> {
        self.store_for(account).await?.find_warehouse_by_name(name).await
    }

    pub async fn find_warehouses_by_position(&self, account: AccountId, position: &str) -> LedgerResult<Vec<Warehouse>> {
        self.store_for(account).await?.find_warehouses_by_position(position).await
    }

    pub async fn find_items_by_category(&self, account: AccountId, category: &str) -> LedgerResult<Vec<Item>> {
        self.store_for(account).await?.find_items_by_category(category).await
    }

    pub async fn find_items_in_warehouse(
        &self,
        account: AccountId,
        warehouse: WarehouseId,
    ) -> LedgerResult<Vec<PlacementView>> {
        self.store_for(account).await?.find_items_in_warehouse(warehouse).await
    }

    pub async fn find_warehouses_for_item(&self, account: AccountId, item: ItemId) -> LedgerResult<Vec<PlacementView>> {
        self.store_for(account).await?.find_warehouses_for_item(item).await
    }

    pub async fn create_item(
        &self,
        account: AccountId,
        name: &str,
        category: &str,
        description: &str,
    ) -> LedgerResult<ItemId> {
        self.store_for(account).await?.create_item(name, category, description).await
    }

    pub async fn create_warehouse(
        &self,
        account: AccountId,
        name: &str,
        position: &str,
        capacity: i64,
    ) -> LedgerResult<WarehouseId> {
        self.store_for(account).await?.create_warehouse(name, position, capacity).await
    }

    pub async fn update_item(
        &self,
        account: AccountId,
        id: ItemId,
        name: &str,
        category: &str,
        description: &str,
    ) -> LedgerResult<()> {
        self.store_for(account).await?.update_item(id, name, category, description).await
    }

    pub async fn update_warehouse(
        &self,
        account: AccountId,
        id: WarehouseId,
        name: &str,
        position: &str,
        capacity: i64,
    ) -> LedgerResult<()> {
        self.store_for(account).await?.update_warehouse(id, name, position, capacity).await
    }

    pub async fn delete_item(&self, account: AccountId, id: ItemId) -> LedgerResult<()> {
        self.store_for(account).await?.delete_item(id).await
    }

    pub async fn delete_warehouse(&self, account: AccountId, id: WarehouseId) -> LedgerResult<()> {
        self.store_for(account).await?.delete_warehouse(id).await
    }

    pub async fn supply_items(
        &self,
        account: AccountId,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> LedgerResult<()> {
        self.store_for(account).await?.supply_items(item, warehouse, quantity).await
    }

    pub async fn consume_items(
        &self,
        account: AccountId,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> LedgerResult<()> {
        self.store_for(account).await?.consume_items(item, warehouse, quantity).await
    }

    pub async fn transfer_items(
        &self,
        account: AccountId,
        item: ItemId,
        source: WarehouseId,
        quantity: i64,
        destination: WarehouseId,
    ) -> LedgerResult<()> {
        self.store_for(account)
            .await?
            .transfer_items(item, source, quantity, destination)
            .await
    }

    pub async fn list_all_items(&self, account: AccountId) -> LedgerResult<Vec<Item>> {
        self.store_for(account).await?.list_all_items().await
    }

    pub async fn list_all_warehouses(&self, account: AccountId) -> LedgerResult<Vec<Warehouse>> {
        self.store_for(account).await?.list_all_warehouses().await
    }
}

async fn close_all(sessions: Vec<(String, Session)>) -> LedgerResult<()> {
    let mut first_error = None;
    for (alias, session) in sessions {
        debug!(alias = %alias, store_id = %session.account.store_id, "closing session store");
        if let Err(err) = session.store.close().await {
            warn!(alias = %alias, error = %err, "failed to close session store");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
