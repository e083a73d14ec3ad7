use serde::{Deserialize, Serialize};

use depot_core::{AccountId, Entity, StoreId};

/// A registered account.
///
/// This is also the on-disk record of the credential list:
/// `{"id": 0, "alias": "bob", "passwordHash": "…", "storeId": "usr0"}`.
///
/// # Invariants
/// - `alias` is unique across the directory.
/// - `store_id` is fixed at registration and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub alias: String,
    pub password_hash: String,
    pub store_id: StoreId,
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.alias
    }
}
