use anyhow::{Context, Result};
use keyring::Entry;

use super::storage::{SessionStorage, StoredSession};

const SERVICE_NAME: &str = "oh-sansi";

/// Default keychain account holding the session record
pub const DEFAULT_ACCOUNT: &str = "session";

/// Session kept in the OS keychain as a single JSON secret.
pub struct KeyringStorage {
    account: String,
}

impl KeyringStorage {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(DEFAULT_ACCOUNT)
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        let secret = match self.entry()?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(e).context("Failed to retrieve session from keychain"),
        };
        let record = serde_json::from_str(&secret).context("Failed to parse keychain session")?;
        Ok(Some(record))
    }

    fn store(&self, record: &StoredSession) -> Result<()> {
        let secret = serde_json::to_string(record)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
