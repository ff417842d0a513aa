use std::sync::Arc;

use stealth_sql::prelude::*;
use stealth_sql::test_utils::{
    ConnectionProperties, MemoryConnection, MemoryProbe, MemoryProvider, MemoryScript,
};

fn connection() -> (Box<dyn Connection>, MemoryProbe) {
    let conn = MemoryConnection::new(MemoryScript::new().update("delete from carts", 3));
    let probe = conn.probe();
    let conn: Box<dyn Connection> = Box::new(conn);
    (conn, probe)
}

fn calls(probe: &MemoryProbe) -> Vec<String> {
    probe.calls()
}

#[test]
fn incomplete_scope_rolls_back() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let mut tran = TransactionScope::begin(conn)?;
    assert!(!tran.auto_commit()?);
    assert_eq!(execute_on(&mut tran, "delete from carts")?, 3);
    assert_eq!(tran.close()?, TxOutcome::RolledBack);
    assert_eq!(
        calls(&probe),
        vec!["set auto-commit", "update delete from carts", "rollback", "close"]
    );
    assert!(probe.is_closed());
    Ok(())
}

#[test]
fn complete_scope_commits() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let options = TransactionOptions::new().with_isolation(IsolationLevel::Serializable);
    let mut tran = TransactionScope::begin_with(conn, options)?;
    execute_on(&mut tran, "delete from carts")?;
    tran.complete();
    assert!(tran.is_complete());
    let outcome = tran.close()?;
    assert!(outcome.is_committed());
    assert_eq!(
        calls(&probe),
        vec![
            "set isolation",
            "set auto-commit",
            "update delete from carts",
            "commit",
            "close"
        ]
    );
    assert_eq!(probe.properties().isolation, IsolationLevel::Serializable);
    Ok(())
}

#[test]
fn completion_can_be_withdrawn() -> Result<(), StealthDbError> {
    let (conn, _probe) = connection();
    let mut tran = TransactionScope::begin(conn)?;
    tran.complete();
    tran.set_complete(false);
    assert_eq!(tran.close()?, TxOutcome::RolledBack);
    Ok(())
}

#[test]
fn scopes_do_not_nest() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let outer = TransactionScope::begin(conn)?;
    let nested = TransactionScope::begin(Box::new(outer));
    assert!(matches!(nested, Err(StealthDbError::IllegalState(_))));
    assert!(probe.is_closed());
    assert!(calls(&probe).contains(&"rollback".to_string()));
    Ok(())
}

#[test]
fn connections_without_transactions_are_rejected() {
    let properties = ConnectionProperties {
        isolation: IsolationLevel::None,
        ..ConnectionProperties::default()
    };
    let conn = MemoryConnection::new(MemoryScript::new().properties(properties));
    let probe = conn.probe();
    let err = TransactionScope::begin(Box::new(conn)).unwrap_err();
    assert!(matches!(
        &err,
        StealthDbError::ExecutionError(msg) if msg == "Transactions not supported."
    ));
    assert!(probe.is_closed());
}

#[test]
fn failed_begin_keeps_unreleased_connection_open() {
    let (conn, probe) = connection();
    probe.update(|state| state.failing_setters.push("auto-commit"));
    let options = TransactionOptions::new().with_release_inner(false);
    assert!(matches!(
        TransactionScope::begin_with(conn, options),
        Err(StealthDbError::Driver(_))
    ));
    assert!(!probe.is_closed());
}

#[test]
fn failed_begin_chains_close_failure() {
    let (conn, probe) = connection();
    probe.update(|state| {
        state.failing_setters.push("auto-commit");
        state.fail_close = true;
    });
    let err = TransactionScope::begin(conn).unwrap_err();
    assert!(matches!(err, StealthDbError::Chained { .. }));
    assert!(matches!(err.primary(), StealthDbError::Driver(_)));
}

#[test]
fn auto_commit_cannot_be_enabled_inside_a_scope() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let mut tran = TransactionScope::begin(conn)?;
    assert!(matches!(
        tran.set_auto_commit(true),
        Err(StealthDbError::IllegalState(_))
    ));
    tran.set_auto_commit(false)?;
    assert_eq!(
        calls(&probe).iter().filter(|c| *c == "set auto-commit").count(),
        1
    );
    Ok(())
}

#[test]
fn commit_and_close_failures_are_chained() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let mut tran = TransactionScope::begin(conn)?;
    tran.complete();
    probe.update(|state| {
        state.fail_commit = true;
        state.fail_close = true;
    });
    let err = tran.close().unwrap_err();
    match &err {
        StealthDbError::Chained { .. } => {
            assert!(err.primary().to_string().contains("commit failed"));
            let secondary = err.secondary().map(ToString::to_string).unwrap_or_default();
            assert!(secondary.contains("close failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn ending_twice_reports_already_closed() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let mut tran = TransactionScope::begin(conn)?;
    tran.complete();
    assert_eq!(tran.close()?, TxOutcome::Committed);
    assert_eq!(tran.close()?, TxOutcome::AlreadyClosed);
    assert!(matches!(
        tran.create_statement(),
        Err(StealthDbError::IllegalState(_))
    ));
    assert_eq!(calls(&probe).iter().filter(|c| *c == "commit").count(), 1);
    Ok(())
}

#[test]
fn inner_closed_underneath_reports_already_closed() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let mut tran = TransactionScope::begin(conn)?;
    probe.update(|state| state.closed = true);
    assert_eq!(tran.close()?, TxOutcome::AlreadyClosed);
    assert!(!calls(&probe).contains(&"rollback".to_string()));
    Ok(())
}

#[test]
fn dropping_an_open_scope_rolls_back() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    {
        let mut tran = TransactionScope::begin(conn)?;
        execute_on(&mut tran, "delete from carts")?;
    }
    let calls = calls(&probe);
    assert_eq!(&calls[calls.len() - 2..], ["rollback", "close"]);
    Ok(())
}

#[test]
fn unreleased_inner_connection_is_handed_back() -> Result<(), StealthDbError> {
    let (conn, probe) = connection();
    let options = TransactionOptions::new().with_release_inner(false);
    let mut tran = TransactionScope::begin_with(conn, options)?;
    tran.complete();
    let (outcome, inner) = tran.close_and_take()?;
    assert_eq!(outcome, TxOutcome::Committed);
    let mut inner = inner.expect("inner connection handed back");
    assert!(!inner.is_closed()?);
    assert!(!probe.is_closed());
    inner.close()?;
    assert!(probe.is_closed());
    Ok(())
}

#[test]
fn scope_over_a_lease_restores_auto_commit() -> Result<(), StealthDbError> {
    let provider = Arc::new(MemoryProvider::new(MemoryScript::new()));
    let lease = ConnectionLease::new(provider.clone());
    let mut tran = TransactionScope::begin(Box::new(lease.acquire()?))?;
    execute_on(&mut tran, "update stock set qty = qty - 1")?;
    tran.complete();
    assert_eq!(tran.close()?, TxOutcome::Committed);

    let probe = provider.last_probe().expect("connection opened");
    assert!(!probe.is_closed());
    assert!(probe.properties().auto_commit);
    assert_eq!(
        probe.calls(),
        vec![
            "set auto-commit",
            "update update stock set qty = qty - 1",
            "commit",
            "set auto-commit"
        ]
    );
    Ok(())
}
