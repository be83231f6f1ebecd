use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "wardendesk";

/// Bearer token for the admin API, kept in the OS keychain per warden.
pub struct CredentialStore {
    entry: Entry,
}

impl CredentialStore {
    pub fn for_warden(warden_id: &str) -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, warden_id).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    /// The stored token, or `None` if this warden never signed in here.
    pub fn get_token(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    pub fn delete_token(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
