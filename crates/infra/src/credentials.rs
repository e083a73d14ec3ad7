//! JSON file persistence for the credential directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use depot_auth::{Account, CredentialStore};
use depot_core::{LedgerError, LedgerResult};

/// Stores the whole account list as one pretty-printed JSON array.
///
/// Saves go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct JsonFileCredentialStore {
    path: PathBuf,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> anyhow::Result<Vec<Account>> {
        if !self.path.exists() {
            self.write(&[])?;
            info!(path = %self.path.display(), "created empty credentials file");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write(&self, accounts: &[Account]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(accounts).context("encoding accounts")?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl CredentialStore for JsonFileCredentialStore {
    fn load(&self) -> LedgerResult<Vec<Account>> {
        let accounts = self.read().map_err(|e| LedgerError::storage(format!("{e:#}")))?;
        debug!(path = %self.path.display(), accounts = accounts.len(), "credentials loaded");
        Ok(accounts)
    }

    fn save(&self, accounts: &[Account]) -> LedgerResult<()> {
        self.write(accounts)
            .map_err(|e| LedgerError::storage(format!("{e:#}")))
    }
}
