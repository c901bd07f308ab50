use anyhow::{Context, Result};
use keyring::Entry;

use super::store::SessionStorage;

const SERVICE_NAME: &str = "brainctl";

/// Keyring account used when none is configured
const DEFAULT_ACCOUNT: &str = "session";

/// Session record kept in the OS keychain instead of a plain file.
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
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(contents) => Ok(Some(contents)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn save(&self, contents: &str) -> Result<()> {
        self.entry()?
            .set_password(contents)
            .context("Failed to store session in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
