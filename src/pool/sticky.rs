use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::{Connection, ConnectionProvider};
use crate::error::StealthDbError;

use super::lease::ConnectionLease;

/// How a [`StickyProvider`] hands out connections.
#[derive(Debug, Clone)]
pub enum ProviderMode {
    /// Every acquire opens a fresh connection
    Direct,
    /// Every acquire shares the leased connection
    Leased(Arc<ConnectionLease>),
}

/// Provider that can switch at runtime between fresh and sticky connections.
pub struct StickyProvider {
    provider: Arc<dyn ConnectionProvider>,
    mode: Mutex<ProviderMode>,
}

impl std::fmt::Debug for StickyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickyProvider")
            .field("mode", &*self.mode())
            .finish_non_exhaustive()
    }
}

impl StickyProvider {
    #[must_use]
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            mode: Mutex::new(ProviderMode::Direct),
        }
    }

    fn mode(&self) -> MutexGuard<'_, ProviderMode> {
        match self.mode.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Obtain a connection according to the current mode.
    ///
    /// # Errors
    /// Returns the provider's failure to open a connection, or the lease's
    /// initialization failure.
    pub fn acquire(&self) -> Result<Box<dyn Connection>, StealthDbError> {
        let mode = self.mode().clone();
        match mode {
            ProviderMode::Direct => self.provider.connect(),
            ProviderMode::Leased(lease) => Ok(Box::new(lease.acquire()?)),
        }
    }

    /// Switch between fresh connections (`false`) and one kept-alive
    /// connection (`true`).
    ///
    /// Turning keep-alive off closes the leased connection before returning.
    ///
    /// # Errors
    /// Returns [`StealthDbError::IllegalState`] if the requested mode is
    /// already active, or the failure closing the leased connection.
    pub fn set_keep_alive(&self, keep_alive: bool) -> Result<(), StealthDbError> {
        let mut mode = self.mode();
        match (&*mode, keep_alive) {
            (ProviderMode::Leased(_), true) => Err(StealthDbError::IllegalState(
                "connection keep-alive is already enabled".into(),
            )),
            (ProviderMode::Direct, false) => Err(StealthDbError::IllegalState(
                "connection keep-alive is already disabled".into(),
            )),
            (ProviderMode::Direct, true) => {
                *mode = ProviderMode::Leased(Arc::new(ConnectionLease::new(Arc::clone(
                    &self.provider,
                ))));
                tracing::debug!("connection keep-alive enabled");
                Ok(())
            }
            (ProviderMode::Leased(lease), false) => {
                let lease = Arc::clone(lease);
                *mode = ProviderMode::Direct;
                lease.dispose()?;
                tracing::debug!("connection keep-alive disabled");
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn is_kept_alive(&self) -> bool {
        matches!(*self.mode(), ProviderMode::Leased(_))
    }

    /// Close the kept-alive connection, if any, and fall back to fresh
    /// connections.
    ///
    /// Returns `true` if a kept-alive connection was open and is now closed.
    ///
    /// # Errors
    /// Returns the failure closing the leased connection.
    pub fn dispose(&self) -> Result<bool, StealthDbError> {
        let mut mode = self.mode();
        match std::mem::replace(&mut *mode, ProviderMode::Direct) {
            ProviderMode::Direct => Ok(false),
            ProviderMode::Leased(lease) => lease.dispose(),
        }
    }
}

impl ConnectionProvider for StickyProvider {
    fn connect(&self) -> Result<Box<dyn Connection>, StealthDbError> {
        self.acquire()
    }
}
