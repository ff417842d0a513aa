//! Process-wide driver initialization.
//!
//! Drivers that need one-time setup register it here under a name. The
//! first registration runs the setup; later ones for the same name are
//! no-ops until the driver is deregistered.

use std::collections::HashSet;
use std::sync::{LazyLock, Mutex, MutexGuard};

use crate::error::StealthDbError;

static REGISTERED: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

fn registry() -> MutexGuard<'static, HashSet<String>> {
    match REGISTERED.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Run `init` for driver `name` unless it already ran successfully.
///
/// Returns `true` if `init` ran. Registrations are serialized, so concurrent
/// callers never run the same setup twice.
///
/// # Errors
/// Returns the setup failure; the driver stays unregistered and a later call
/// tries again.
pub fn register_driver(
    name: &str,
    init: impl FnOnce() -> Result<(), StealthDbError>,
) -> Result<bool, StealthDbError> {
    let mut registered = registry();
    if registered.contains(name) {
        return Ok(false);
    }
    init()?;
    registered.insert(name.to_string());
    tracing::debug!(driver = name, "driver registered");
    Ok(true)
}

#[must_use]
pub fn is_registered(name: &str) -> bool {
    registry().contains(name)
}

/// Forget driver `name` so the next registration runs its setup again.
///
/// Returns `true` if the driver was registered.
pub fn deregister_driver(name: &str) -> bool {
    let removed = registry().remove(name);
    if removed {
        tracing::debug!(driver = name, "driver deregistered");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_runs_once_per_registration() {
        let mut runs = 0;
        assert!(register_driver("unit-once", || {
            runs += 1;
            Ok(())
        })
        .unwrap());
        assert!(!register_driver("unit-once", || {
            runs += 1;
            Ok(())
        })
        .unwrap());
        assert_eq!(runs, 1);
        assert!(is_registered("unit-once"));
        assert!(deregister_driver("unit-once"));
        assert!(!deregister_driver("unit-once"));
    }

    #[test]
    fn failed_setup_is_retried() {
        let failed = register_driver("unit-retry", || {
            Err(StealthDbError::ConfigError("driver missing".into()))
        });
        assert!(failed.is_err());
        assert!(!is_registered("unit-retry"));
        assert!(register_driver("unit-retry", || Ok(())).unwrap());
    }
}
