use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::connection::{ClientInfo, Connection, ConnectionProvider, Statement, TypeMap};
use crate::cursor::RowCursor;
use crate::error::StealthDbError;
use crate::types::{Holdability, IsolationLevel};

/// Lifecycle of a [`ConnectionLease`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeaseState {
    Uninitialized = 0,
    Initializing = 1,
    Initialized = 2,
    Disposed = 3,
}

impl LeaseState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LeaseState::Uninitialized,
            1 => LeaseState::Initializing,
            2 => LeaseState::Initialized,
            _ => LeaseState::Disposed,
        }
    }
}

/// Values a connection property had before the lease first changed it.
///
/// Only the first change of each property is recorded, so restoring always
/// goes back to the value seen when the handle was handed out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySnapshot {
    isolation: Option<IsolationLevel>,
    holdability: Option<Holdability>,
    auto_commit: Option<bool>,
    client_info: Option<ClientInfo>,
    read_only: Option<bool>,
    catalog: Option<Option<String>>,
    type_map: Option<TypeMap>,
    schema: Option<Option<String>>,
}

impl PropertySnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Put every recorded property back on `conn` and forget the recording.
    ///
    /// All properties are attempted even if one fails; the first failure is
    /// returned.
    fn restore(&mut self, conn: &mut dyn Connection) -> Result<(), StealthDbError> {
        let snapshot = std::mem::take(self);
        let mut first_error = None;
        if let Some(level) = snapshot.isolation {
            note(&mut first_error, "isolation", conn.set_isolation(level));
        }
        if let Some(holdability) = snapshot.holdability {
            note(&mut first_error, "holdability", conn.set_holdability(holdability));
        }
        if let Some(auto_commit) = snapshot.auto_commit {
            note(&mut first_error, "auto-commit", conn.set_auto_commit(auto_commit));
        }
        if let Some(info) = snapshot.client_info {
            note(&mut first_error, "client info", conn.set_client_info(info));
        }
        if let Some(read_only) = snapshot.read_only {
            note(&mut first_error, "read-only", conn.set_read_only(read_only));
        }
        if let Some(catalog) = snapshot.catalog {
            note(&mut first_error, "catalog", conn.set_catalog(catalog));
        }
        if let Some(map) = snapshot.type_map {
            note(&mut first_error, "type map", conn.set_type_map(map));
        }
        if let Some(schema) = snapshot.schema {
            note(&mut first_error, "schema", conn.set_schema(schema));
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn note(
    first_error: &mut Option<StealthDbError>,
    property: &str,
    result: Result<(), StealthDbError>,
) {
    if let Err(err) = result {
        tracing::warn!(property, error = %err, "failed to restore leased connection property");
        first_error.get_or_insert(err);
    }
}

struct LeaseInner {
    conn: Box<dyn Connection>,
    snapshot: PropertySnapshot,
    disposed: bool,
    closed_at_adoption: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn disposed_error() -> StealthDbError {
    StealthDbError::IllegalState("connection lease has been disposed".into())
}

/// Lazily opened connection that is reused instead of closed.
///
/// The first [`acquire`](Self::acquire) opens the real connection; concurrent
/// first callers share that single open. Handles returned by `acquire` record
/// the prior value of every property they change and put it back when they
/// are closed. Only [`dispose`](Self::dispose) closes the real connection.
pub struct ConnectionLease {
    provider: Arc<dyn ConnectionProvider>,
    state: AtomicU8,
    shared: OnceLock<Arc<Mutex<LeaseInner>>>,
    init_gate: Mutex<()>,
}

impl fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionLease {
    #[must_use]
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            state: AtomicU8::new(LeaseState::Uninitialized as u8),
            shared: OnceLock::new(),
            init_gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> LeaseState {
        LeaseState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LeaseState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Hand out a handle to the shared connection, opening it on first use.
    ///
    /// # Errors
    /// Returns [`StealthDbError::IllegalState`] once the lease is disposed and
    /// [`StealthDbError::ResourceInit`] if opening the connection fails. A
    /// failed open is not remembered; the next call tries again.
    pub fn acquire(&self) -> Result<LeasedConnection, StealthDbError> {
        if self.state() == LeaseState::Disposed {
            return Err(disposed_error());
        }
        if let Some(shared) = self.shared.get() {
            return Ok(LeasedConnection::new(Arc::clone(shared)));
        }

        let _gate = lock(&self.init_gate);
        if self.state() == LeaseState::Disposed {
            return Err(disposed_error());
        }
        if let Some(shared) = self.shared.get() {
            return Ok(LeasedConnection::new(Arc::clone(shared)));
        }

        self.set_state(LeaseState::Initializing);
        let conn = match self.provider.connect() {
            Ok(conn) => conn,
            Err(err) => {
                self.set_state(LeaseState::Uninitialized);
                tracing::warn!(error = %err, "failed to open leased connection");
                return Err(StealthDbError::ResourceInit(Box::new(err)));
            }
        };
        let closed_at_adoption = match conn.is_closed() {
            Ok(closed) => closed,
            Err(err) => {
                tracing::warn!(error = %err, "failed to check leased connection at adoption; treating it as open");
                false
            }
        };
        let shared = self.shared.get_or_init(|| {
            Arc::new(Mutex::new(LeaseInner {
                conn,
                snapshot: PropertySnapshot::default(),
                disposed: false,
                closed_at_adoption,
            }))
        });
        self.set_state(LeaseState::Initialized);
        tracing::debug!("leased connection opened");
        Ok(LeasedConnection::new(Arc::clone(shared)))
    }

    /// Close the real connection and retire the lease.
    ///
    /// Returns `true` if a connection had been opened and is now closed.
    /// Disposing again, or disposing a lease that never opened, returns
    /// `false` and does nothing.
    ///
    /// # Errors
    /// Returns the driver failure closing the connection; the lease is
    /// disposed regardless.
    pub fn dispose(&self) -> Result<bool, StealthDbError> {
        let _gate = lock(&self.init_gate);
        let previous = LeaseState::from_u8(
            self.state
                .swap(LeaseState::Disposed as u8, Ordering::AcqRel),
        );
        if previous != LeaseState::Initialized {
            return Ok(false);
        }
        let Some(shared) = self.shared.get() else {
            return Ok(false);
        };
        let mut inner = lock(shared);
        inner.disposed = true;
        if inner.closed_at_adoption {
            tracing::debug!("leased connection was closed before adoption");
            return Ok(true);
        }
        inner.conn.close()?;
        tracing::debug!("leased connection disposed");
        Ok(true)
    }
}

/// Handle to a leased connection.
///
/// `close` restores the recorded properties and leaves the real connection
/// open for the next handle.
pub struct LeasedConnection {
    shared: Arc<Mutex<LeaseInner>>,
}

impl fmt::Debug for LeasedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedConnection").finish_non_exhaustive()
    }
}

impl LeasedConnection {
    fn new(shared: Arc<Mutex<LeaseInner>>) -> Self {
        Self { shared }
    }

    fn with<R>(
        &self,
        op: impl FnOnce(&mut LeaseInner) -> Result<R, StealthDbError>,
    ) -> Result<R, StealthDbError> {
        let mut inner = lock(&self.shared);
        if inner.disposed {
            return Err(disposed_error());
        }
        op(&mut inner)
    }

    /// Properties recorded since the last close.
    #[must_use]
    pub fn snapshot(&self) -> PropertySnapshot {
        lock(&self.shared).snapshot.clone()
    }
}

struct LeasedStatement {
    shared: Arc<Mutex<LeaseInner>>,
    inner: Box<dyn Statement>,
}

impl LeasedStatement {
    fn ensure_live(&self) -> Result<(), StealthDbError> {
        if lock(&self.shared).disposed {
            Err(disposed_error())
        } else {
            Ok(())
        }
    }
}

impl Statement for LeasedStatement {
    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn RowCursor + '_>, StealthDbError> {
        self.ensure_live()?;
        self.inner.execute_query(sql)
    }

    fn execute_update(&mut self, sql: &str) -> Result<i64, StealthDbError> {
        self.ensure_live()?;
        self.inner.execute_update(sql)
    }
}

impl Connection for LeasedConnection {
    fn create_statement(&mut self) -> Result<Box<dyn Statement>, StealthDbError> {
        let inner = self.with(|inner| inner.conn.create_statement())?;
        Ok(Box::new(LeasedStatement {
            shared: Arc::clone(&self.shared),
            inner,
        }))
    }

    fn auto_commit(&self) -> Result<bool, StealthDbError> {
        self.with(|inner| inner.conn.auto_commit())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.auto_commit.is_none() {
                inner.snapshot.auto_commit = Some(inner.conn.auto_commit()?);
            }
            inner.conn.set_auto_commit(auto_commit)
        })
    }

    fn commit(&mut self) -> Result<(), StealthDbError> {
        self.with(|inner| inner.conn.commit())
    }

    fn rollback(&mut self) -> Result<(), StealthDbError> {
        self.with(|inner| inner.conn.rollback())
    }

    fn close(&mut self) -> Result<(), StealthDbError> {
        self.with(|inner| {
            let LeaseInner { conn, snapshot, .. } = inner;
            snapshot.restore(conn.as_mut())
        })
    }

    fn is_closed(&self) -> Result<bool, StealthDbError> {
        let inner = lock(&self.shared);
        if inner.disposed {
            return Ok(true);
        }
        inner.conn.is_closed()
    }

    fn isolation(&self) -> Result<IsolationLevel, StealthDbError> {
        self.with(|inner| inner.conn.isolation())
    }

    fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.isolation.is_none() {
                inner.snapshot.isolation = Some(inner.conn.isolation()?);
            }
            inner.conn.set_isolation(level)
        })
    }

    fn holdability(&self) -> Result<Holdability, StealthDbError> {
        self.with(|inner| inner.conn.holdability())
    }

    fn set_holdability(&mut self, holdability: Holdability) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.holdability.is_none() {
                inner.snapshot.holdability = Some(inner.conn.holdability()?);
            }
            inner.conn.set_holdability(holdability)
        })
    }

    fn read_only(&self) -> Result<bool, StealthDbError> {
        self.with(|inner| inner.conn.read_only())
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.read_only.is_none() {
                inner.snapshot.read_only = Some(inner.conn.read_only()?);
            }
            inner.conn.set_read_only(read_only)
        })
    }

    fn catalog(&self) -> Result<Option<String>, StealthDbError> {
        self.with(|inner| inner.conn.catalog())
    }

    fn set_catalog(&mut self, catalog: Option<String>) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.catalog.is_none() {
                inner.snapshot.catalog = Some(inner.conn.catalog()?);
            }
            inner.conn.set_catalog(catalog)
        })
    }

    fn schema(&self) -> Result<Option<String>, StealthDbError> {
        self.with(|inner| inner.conn.schema())
    }

    fn set_schema(&mut self, schema: Option<String>) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.schema.is_none() {
                inner.snapshot.schema = Some(inner.conn.schema()?);
            }
            inner.conn.set_schema(schema)
        })
    }

    fn client_info(&self) -> Result<ClientInfo, StealthDbError> {
        self.with(|inner| inner.conn.client_info())
    }

    fn set_client_info(&mut self, info: ClientInfo) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.client_info.is_none() {
                inner.snapshot.client_info = Some(inner.conn.client_info()?);
            }
            inner.conn.set_client_info(info)
        })
    }

    fn set_client_info_entry(&mut self, name: &str, value: &str) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.client_info.is_none() {
                inner.snapshot.client_info = Some(inner.conn.client_info()?);
            }
            inner.conn.set_client_info_entry(name, value)
        })
    }

    fn type_map(&self) -> Result<TypeMap, StealthDbError> {
        self.with(|inner| inner.conn.type_map())
    }

    fn set_type_map(&mut self, map: TypeMap) -> Result<(), StealthDbError> {
        self.with(|inner| {
            if inner.snapshot.type_map.is_none() {
                inner.snapshot.type_map = Some(inner.conn.type_map()?);
            }
            inner.conn.set_type_map(map)
        })
    }

    fn in_scoped_transaction(&self) -> bool {
        lock(&self.shared).conn.in_scoped_transaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryConnection, MemoryScript};

    /// Hands out one prepared connection.
    struct Handoff(Mutex<Option<MemoryConnection>>);

    impl ConnectionProvider for Handoff {
        fn connect(&self) -> Result<Box<dyn Connection>, StealthDbError> {
            match lock(&self.0).take() {
                Some(conn) => Ok(Box::new(conn)),
                None => Err(StealthDbError::IllegalState("connection already handed out".into())),
            }
        }
    }

    #[test]
    fn unknown_status_at_adoption_is_treated_as_open() -> Result<(), StealthDbError> {
        let conn = MemoryConnection::new(MemoryScript::new());
        let probe = conn.probe();
        probe.update(|state| state.fail_is_closed = true);
        let lease = ConnectionLease::new(Arc::new(Handoff(Mutex::new(Some(conn)))));

        lease.acquire()?;
        assert_eq!(lease.state(), LeaseState::Initialized);

        probe.update(|state| state.fail_is_closed = false);
        assert!(lease.dispose()?);
        assert!(probe.is_closed());
        Ok(())
    }
}
