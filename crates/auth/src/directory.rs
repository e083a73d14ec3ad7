//! Credential directory: the durable list of registered accounts.
//!
//! Every mutation rewrites the whole list through the [`CredentialStore`]
//! first and only then updates the in-memory copy, so a failed write leaves
//! both sides unchanged.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use depot_core::{AccountId, LedgerError, LedgerResult, StoreId};

use crate::password::{hash_password, validate_password, verify_password};
use crate::Account;

/// Durable backing of the credential list. The whole list is the unit of
/// read and write.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> LedgerResult<Vec<Account>>;
    fn save(&self, accounts: &[Account]) -> LedgerResult<()>;
}

impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    fn load(&self) -> LedgerResult<Vec<Account>> {
        (**self).load()
    }

    fn save(&self, accounts: &[Account]) -> LedgerResult<()> {
        (**self).save(accounts)
    }
}

/// In-memory credential store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Vec<Account>>,
    saves: AtomicUsize,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            inner: RwLock::new(accounts),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of whole-list writes so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> LedgerResult<Vec<Account>> {
        let accounts = self
            .inner
            .read()
            .map_err(|_| LedgerError::storage("credential store lock poisoned"))?;
        Ok(accounts.clone())
    }

    fn save(&self, accounts: &[Account]) -> LedgerResult<()> {
        let mut stored = self
            .inner
            .write()
            .map_err(|_| LedgerError::storage("credential store lock poisoned"))?;
        *stored = accounts.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct CredentialDirectory {
    store: Box<dyn CredentialStore>,
    accounts: RwLock<Vec<Account>>,
}

impl core::fmt::Debug for CredentialDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialDirectory")
            .field("accounts", &self.len().ok())
            .finish_non_exhaustive()
    }
}

impl CredentialDirectory {
    /// Load the current list from `store`.
    pub fn load(store: impl CredentialStore + 'static) -> LedgerResult<Self> {
        let accounts = store.load()?;
        Ok(Self {
            store: Box::new(store),
            accounts: RwLock::new(accounts),
        })
    }

    /// Register a new account with the next sequential id and its derived store.
    pub fn register(&self, alias: &str, password: &str) -> LedgerResult<Account> {
        if alias.trim().is_empty() {
            return Err(LedgerError::validation("alias cannot be empty"));
        }
        let mut accounts = self.write()?;
        if accounts.iter().any(|a| a.alias == alias) {
            return Err(LedgerError::conflict("alias already exists"));
        }
        validate_password("password", password)?;

        let id = AccountId::new(accounts.len() as u64);
        let account = Account {
            id,
            alias: alias.to_string(),
            password_hash: hash_password(password),
            store_id: StoreId::for_account(id),
        };

        let mut next = accounts.clone();
        next.push(account.clone());
        self.store.save(&next)?;
        *accounts = next;

        info!(alias = %account.alias, account_id = %id, store_id = %account.store_id, "account registered");
        Ok(account)
    }

    /// Match alias and password against the stored digest.
    pub fn verify(&self, alias: &str, password: &str) -> LedgerResult<Account> {
        self.read()?
            .iter()
            .find(|a| a.alias == alias && verify_password(password, &a.password_hash))
            .cloned()
            .ok_or(LedgerError::InvalidCredentials)
    }

    /// Replace the password of `id`, returning the updated account.
    pub fn set_password(&self, id: AccountId, new_password: &str) -> LedgerResult<Account> {
        validate_password("new password", new_password)?;
        let mut accounts = self.write()?;
        let index = accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or(LedgerError::not_found("account"))?;

        let mut next = accounts.clone();
        next[index].password_hash = hash_password(new_password);
        self.store.save(&next)?;
        *accounts = next;

        info!(account_id = %id, "password changed");
        Ok(accounts[index].clone())
    }

    /// Administrative bulk reset: forget every account.
    pub fn reset(&self) -> LedgerResult<()> {
        let mut accounts = self.write()?;
        self.store.save(&[])?;
        accounts.clear();
        info!("credential directory reset");
        Ok(())
    }

    pub fn find_by_alias(&self, alias: &str) -> LedgerResult<Option<Account>> {
        Ok(self.read()?.iter().find(|a| a.alias == alias).cloned())
    }

    pub fn accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.read()?.clone())
    }

    pub fn len(&self) -> LedgerResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Vec<Account>>> {
        self.accounts
            .read()
            .map_err(|_| LedgerError::storage("credential directory lock poisoned"))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Vec<Account>>> {
        self.accounts
            .write()
            .map_err(|_| LedgerError::storage("credential directory lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnlyStore;

    impl CredentialStore for ReadOnlyStore {
        fn load(&self) -> LedgerResult<Vec<Account>> {
            Ok(vec![])
        }

        fn save(&self, _accounts: &[Account]) -> LedgerResult<()> {
            Err(LedgerError::storage("read-only"))
        }
    }

    fn directory() -> (Arc<InMemoryCredentialStore>, CredentialDirectory) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let directory = CredentialDirectory::load(store.clone()).unwrap();
        (store, directory)
    }

    #[test]
    fn register_assigns_sequential_ids_and_stores() {
        let (store, directory) = directory();
        let bob = directory.register("bob", "longpassword").unwrap();
        let amy = directory.register("amy", "otherpassword").unwrap();

        assert_eq!((bob.id, bob.store_id.as_str()), (AccountId::new(0), "usr0"));
        assert_eq!((amy.id, amy.store_id.as_str()), (AccountId::new(1), "usr1"));
        assert_eq!(store.load().unwrap().len(), 2);
        assert_eq!(store.saves(), 2);
    }

    #[test]
    fn duplicate_alias_is_checked_before_password_length() {
        let (_, directory) = directory();
        directory.register("bob", "longpassword").unwrap();

        let err = directory.register("bob", "short").unwrap_err();
        assert_eq!(err, LedgerError::conflict("alias already exists"));

        let err = directory.register("carl", "short").unwrap_err();
        assert_eq!(err.to_string(), "password must be at least 8 characters long");
        assert_eq!(directory.len(), Ok(1));
    }

    #[test]
    fn verify_requires_matching_digest() {
        let (_, directory) = directory();
        directory.register("bob", "longpassword").unwrap();

        assert_eq!(directory.verify("bob", "longpassword").unwrap().alias, "bob");
        assert_eq!(
            directory.verify("bob", "wrongpassword"),
            Err(LedgerError::InvalidCredentials)
        );
        assert_eq!(
            directory.verify("nobody", "longpassword"),
            Err(LedgerError::InvalidCredentials)
        );
    }

    #[test]
    fn failed_write_leaves_directory_unchanged() {
        let directory = CredentialDirectory::load(ReadOnlyStore).unwrap();
        let err = directory.register("bob", "longpassword").unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert_eq!(directory.is_empty(), Ok(true));
    }

    #[test]
    fn set_password_and_reset_persist_whole_list() {
        let (store, directory) = directory();
        let bob = directory.register("bob", "longpassword").unwrap();

        directory.set_password(bob.id, "evenlongerpassword").unwrap();
        assert!(directory.verify("bob", "evenlongerpassword").is_ok());
        assert_eq!(
            store.load().unwrap()[0].password_hash,
            hash_password("evenlongerpassword")
        );

        directory.reset().unwrap();
        assert_eq!(directory.is_empty(), Ok(true));
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.saves(), 3);
    }

    #[test]
    fn poisoned_lock_is_a_storage_error_everywhere() {
        let directory = Arc::new(CredentialDirectory::load(InMemoryCredentialStore::new()).unwrap());
        let poisoner = Arc::clone(&directory);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.accounts.write().unwrap();
            panic!("poison the directory lock");
        })
        .join();

        assert_eq!(directory.len().unwrap_err().kind(), "storage");
        assert_eq!(directory.is_empty().unwrap_err().kind(), "storage");
        assert_eq!(directory.accounts().unwrap_err().kind(), "storage");
    }

    #[test]
    fn loads_existing_accounts() {
        let existing = Account {
            id: AccountId::new(0),
            alias: "bob".to_string(),
            password_hash: hash_password("longpassword"),
            store_id: StoreId::new("usr0"),
        };
        let directory =
            CredentialDirectory::load(InMemoryCredentialStore::with_accounts(vec![existing])).unwrap();
        let next = directory.register("amy", "longpassword").unwrap();
        assert_eq!(next.store_id.as_str(), "usr1");
        assert!(directory.find_by_alias("bob").unwrap().is_some());
    }
}
