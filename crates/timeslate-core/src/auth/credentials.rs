use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "timeslate";

/// OS keychain storage for account secrets.
///
/// Holds the service-account password used for unattended session renewal,
/// plus any user password the app chooses to remember between runs.
pub struct CredentialStore;

impl CredentialStore {
    /// Store a password for an account name in the OS keychain
    pub fn store(account: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an account name from the OS keychain
    pub fn get_password(account: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password for an account name
    pub fn delete(account: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    /// Check whether a password is stored for an account name
    pub fn has_credentials(account: &str) -> bool {
        if let Ok(entry) = Entry::new(SERVICE_NAME, account) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }
}
