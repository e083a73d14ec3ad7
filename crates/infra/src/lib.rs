//! Infrastructure: tenant store backends, credential persistence, config.

pub mod config;
pub mod credentials;
pub mod store;

pub use config::DepotConfig;
pub use credentials::JsonFileCredentialStore;
pub use store::{InMemoryInventoryStore, InMemoryStoreFactory, SqliteInventoryStore, SqliteStoreFactory};
