use std::sync::Arc;

use stealth_sql::pool::ProviderMode;
use stealth_sql::prelude::*;
use stealth_sql::test_utils::{ConnectionProperties, MemoryProvider, MemoryScript};

fn setup() -> (Arc<MemoryProvider>, StickyProvider) {
    let provider = Arc::new(MemoryProvider::new(MemoryScript::new()));
    let sticky = StickyProvider::new(provider.clone());
    (provider, sticky)
}

#[test]
fn direct_mode_opens_fresh_connections() -> Result<(), StealthDbError> {
    let (provider, sticky) = setup();
    assert!(!sticky.is_kept_alive());
    for _ in 0..3 {
        sticky.acquire()?.close()?;
    }
    assert_eq!(provider.stats().opened(), 3);
    assert_eq!(provider.stats().open_now(), 0);
    Ok(())
}

#[test]
fn keep_alive_reuses_one_connection() -> Result<(), StealthDbError> {
    let (provider, sticky) = setup();
    sticky.set_keep_alive(true)?;
    assert!(sticky.is_kept_alive());
    for _ in 0..3 {
        let mut conn = sticky.acquire()?;
        conn.set_auto_commit(false)?;
        conn.close()?;
    }
    assert_eq!(provider.stats().opened(), 1);
    assert_eq!(provider.stats().open_now(), 1);
    assert!(provider.last_probe().expect("connection opened").properties().auto_commit);
    Ok(())
}

#[test]
fn redundant_toggles_are_illegal() -> Result<(), StealthDbError> {
    let (_provider, sticky) = setup();
    assert!(matches!(
        sticky.set_keep_alive(false),
        Err(StealthDbError::IllegalState(_))
    ));
    sticky.set_keep_alive(true)?;
    assert!(matches!(
        sticky.set_keep_alive(true),
        Err(StealthDbError::IllegalState(_))
    ));
    Ok(())
}

#[test]
fn toggling_never_leaves_two_leases_open() -> Result<(), StealthDbError> {
    let (provider, sticky) = setup();

    sticky.set_keep_alive(true)?;
    let mut conn = sticky.acquire()?;
    conn.set_isolation(IsolationLevel::Serializable)?;
    conn.set_catalog(Some("archive".into()))?;
    conn.close()?;
    let first = provider.last_probe().expect("first lease opened");
    assert_eq!(first.properties(), ConnectionProperties::default());

    sticky.set_keep_alive(false)?;
    assert!(first.is_closed());

    sticky.set_keep_alive(true)?;
    sticky.acquire()?.close()?;

    assert_eq!(provider.stats().opened(), 2);
    assert_eq!(provider.stats().max_open(), 1);
    Ok(())
}

#[test]
fn dispose_falls_back_to_direct_mode() -> Result<(), StealthDbError> {
    let (provider, sticky) = setup();
    assert!(!sticky.dispose()?);

    sticky.set_keep_alive(true)?;
    sticky.acquire()?.close()?;
    assert!(sticky.dispose()?);
    assert!(!sticky.is_kept_alive());
    assert_eq!(provider.stats().open_now(), 0);
    Ok(())
}

#[test]
fn keep_alive_lease_is_a_tagged_mode() -> Result<(), StealthDbError> {
    let (_provider, sticky) = setup();
    sticky.set_keep_alive(true)?;
    let rendered = format!("{sticky:?}");
    assert!(rendered.contains("Leased"));
    let mode = ProviderMode::Direct;
    assert!(matches!(mode, ProviderMode::Direct));
    Ok(())
}
