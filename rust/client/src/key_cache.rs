use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::ClientError;
use crate::prompt::PasswordPrompt;
use crate::vault::{self, SigningKey};

/// Holds the unlocked signing key for the life of the process.
///
/// Constructed once by the binary and handed to whoever needs it; the
/// backend keeps it behind an `Arc` in its state.
#[derive(Default)]
pub struct KeyCache {
    key: Mutex<Option<SigningKey>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SigningKey> {
        self.lock().clone()
    }

    pub fn set(&self, key: SigningKey) {
        *self.lock() = Some(key);
    }

    pub fn is_unlocked(&self) -> bool {
        self.lock().is_some()
    }

    /// Returns the cached key, or prompts for the password and decrypts
    /// `path`. The whole sequence holds the lock, so concurrent callers
    /// prompt at most once between them.
    pub fn unlock(
        &self,
        path: &Path,
        prompt: &dyn PasswordPrompt,
    ) -> Result<SigningKey, ClientError> {
        let mut slot = self.lock();
        if let Some(key) = slot.as_ref() {
            debug!("signing key served from cache");
            return Ok(key.clone());
        }
        let password = prompt.read_password("Key file password: ")?;
        let key = vault::decrypt(path, &password)?;
        *slot = Some(key.clone());
        Ok(key)
    }

    fn lock(&self) -> MutexGuard<'_, Option<SigningKey>> {
        // A panic while holding the guard cannot leave a half-written key.
        self.key.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}
