use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::connection::{ClientInfo, Connection, ConnectionProvider, Statement, TypeMap};
use crate::cursor::RowCursor;
use crate::error::{DriverError, StealthDbError};
use crate::types::{Holdability, IsolationLevel};

use super::cursor::MemoryCursor;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mutable properties of an in-memory connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProperties {
    pub auto_commit: bool,
    pub isolation: IsolationLevel,
    pub holdability: Holdability,
    pub read_only: bool,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub client_info: ClientInfo,
    pub type_map: TypeMap,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            auto_commit: true,
            isolation: IsolationLevel::ReadCommitted,
            holdability: Holdability::HoldCursorsOverCommit,
            read_only: false,
            catalog: Some("main".into()),
            schema: Some("public".into()),
            client_info: HashMap::new(),
            type_map: HashMap::new(),
        }
    }
}

/// What a scripted connection answers.
#[derive(Debug, Clone, Default)]
pub struct MemoryScript {
    pub properties: ConnectionProperties,
    queries: HashMap<String, MemoryCursor>,
    updates: HashMap<String, Result<i64, DriverError>>,
}

impl MemoryScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, sql: &str, cursor: MemoryCursor) -> Self {
        self.queries.insert(sql.to_string(), cursor);
        self
    }

    /// Row count returned by `sql`; unscripted updates report one row.
    #[must_use]
    pub fn update(mut self, sql: &str, count: i64) -> Self {
        self.updates.insert(sql.to_string(), Ok(count));
        self
    }

    #[must_use]
    pub fn failing_update(mut self, sql: &str, err: DriverError) -> Self {
        self.updates.insert(sql.to_string(), Err(err));
        self
    }

    #[must_use]
    pub fn properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Observable state of one in-memory connection.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub properties: ConnectionProperties,
    pub closed: bool,
    /// Every call that changed state or ran SQL, in order
    pub calls: Vec<String>,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_close: bool,
    pub fail_is_closed: bool,
    /// Setters of these properties fail
    pub failing_setters: Vec<&'static str>,
}

/// Open/close counters shared by a provider and its connections.
#[derive(Debug, Default)]
pub struct ProviderStats {
    opened: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
}

impl ProviderStats {
    fn on_open(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
    }

    fn on_close(&self) {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }

    /// Connections opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Connections currently open.
    #[must_use]
    pub fn open_now(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }

    /// Most connections ever open at the same time.
    #[must_use]
    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

/// Test-side view of a connection that has been handed to the crate.
#[derive(Debug, Clone)]
pub struct MemoryProbe {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryProbe {
    #[must_use]
    pub fn state(&self) -> MemoryState {
        lock(&self.state).clone()
    }

    #[must_use]
    pub fn properties(&self) -> ConnectionProperties {
        lock(&self.state).properties.clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn update(&self, op: impl FnOnce(&mut MemoryState)) {
        op(&mut lock(&self.state));
    }
}

/// Connection backed by a [`MemoryScript`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    script: Arc<MemoryScript>,
    stats: Option<Arc<ProviderStats>>,
}

impl MemoryConnection {
    #[must_use]
    pub fn new(script: MemoryScript) -> Self {
        Self::with_stats(Arc::new(script), None)
    }

    fn with_stats(script: Arc<MemoryScript>, stats: Option<Arc<ProviderStats>>) -> Self {
        let state = MemoryState {
            properties: script.properties.clone(),
            ..MemoryState::default()
        };
        if let Some(stats) = &stats {
            stats.on_open();
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            script,
            stats,
        }
    }

    #[must_use]
    pub fn probe(&self) -> MemoryProbe {
        MemoryProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn read<R>(&self, op: impl FnOnce(&MemoryState) -> R) -> Result<R, StealthDbError> {
        let state = lock(&self.state);
        if state.closed {
            return Err(DriverError::new("connection is closed").with_sql_state("08003").into());
        }
        Ok(op(&state))
    }

    fn set(
        &mut self,
        property: &'static str,
        op: impl FnOnce(&mut ConnectionProperties),
    ) -> Result<(), StealthDbError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(DriverError::new("connection is closed").with_sql_state("08003").into());
        }
        if state.failing_setters.contains(&property) {
            return Err(DriverError::new(format!("cannot change {property}")).into());
        }
        op(&mut state.properties);
        state.calls.push(format!("set {property}"));
        Ok(())
    }
}

struct MemoryStatement {
    state: Arc<Mutex<MemoryState>>,
    script: Arc<MemoryScript>,
}

impl Statement for MemoryStatement {
    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn RowCursor + '_>, StealthDbError> {
        lock(&self.state).calls.push(format!("query {sql}"));
        let cursor = self.script.queries.get(sql).cloned().ok_or_else(|| {
            DriverError::new(format!("no such table for query: {sql}"))
                .with_vendor_code(1146)
                .with_sql_state("42S02")
        })?;
        Ok(Box::new(cursor))
    }

    fn execute_update(&mut self, sql: &str) -> Result<i64, StealthDbError> {
        lock(&self.state).calls.push(format!("update {sql}"));
        match self.script.updates.get(sql) {
            Some(Ok(count)) => Ok(*count),
            Some(Err(err)) => Err(err.clone().into()),
            None => Ok(1),
        }
    }
}

impl Connection for MemoryConnection {
    fn create_statement(&mut self) -> Result<Box<dyn Statement>, StealthDbError> {
        self.read(|_| ())?;
        Ok(Box::new(MemoryStatement {
            state: Arc::clone(&self.state),
            script: Arc::clone(&self.script),
        }))
    }

    fn auto_commit(&self) -> Result<bool, StealthDbError> {
        self.read(|state| state.properties.auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), StealthDbError> {
        self.set("auto-commit", |props| props.auto_commit = auto_commit)
    }

    fn commit(&mut self) -> Result<(), StealthDbError> {
        let mut state = lock(&self.state);
        state.calls.push("commit".into());
        if state.fail_commit {
            return Err(DriverError::new("commit failed").with_sql_state("40001").into());
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StealthDbError> {
        let mut state = lock(&self.state);
        state.calls.push("rollback".into());
        if state.fail_rollback {
            return Err(DriverError::new("rollback failed").into());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StealthDbError> {
        let mut state = lock(&self.state);
        state.calls.push("close".into());
        if state.fail_close {
            return Err(DriverError::new("close failed").into());
        }
        if !state.closed {
            state.closed = true;
            if let Some(stats) = &self.stats {
                stats.on_close();
            }
        }
        Ok(())
    }

    fn is_closed(&self) -> Result<bool, StealthDbError> {
        let state = lock(&self.state);
        if state.fail_is_closed {
            return Err(DriverError::new("connection status unavailable").into());
        }
        Ok(state.closed)
    }

    fn isolation(&self) -> Result<IsolationLevel, StealthDbError> {
        self.read(|state| state.properties.isolation)
    }

    fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), StealthDbError> {
        self.set("isolation", |props| props.isolation = level)
    }

    fn holdability(&self) -> Result<Holdability, StealthDbError> {
        self.read(|state| state.properties.holdability)
    }

    fn set_holdability(&mut self, holdability: Holdability) -> Result<(), StealthDbError> {
        self.set("holdability", |props| props.holdability = holdability)
    }

    fn read_only(&self) -> Result<bool, StealthDbError> {
        self.read(|state| state.properties.read_only)
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), StealthDbError> {
        self.set("read-only", |props| props.read_only = read_only)
    }

    fn catalog(&self) -> Result<Option<String>, StealthDbError> {
        self.read(|state| state.properties.catalog.clone())
    }

    fn set_catalog(&mut self, catalog: Option<String>) -> Result<(), StealthDbError> {
        self.set("catalog", |props| props.catalog = catalog)
    }

    fn schema(&self) -> Result<Option<String>, StealthDbError> {
        self.read(|state| state.properties.schema.clone())
    }

    fn set_schema(&mut self, schema: Option<String>) -> Result<(), StealthDbError> {
        self.set("schema", |props| props.schema = schema)
    }

    fn client_info(&self) -> Result<ClientInfo, StealthDbError> {
        self.read(|state| state.properties.client_info.clone())
    }

    fn set_client_info(&mut self, info: ClientInfo) -> Result<(), StealthDbError> {
        self.set("client info", |props| props.client_info = info)
    }

    fn set_client_info_entry(&mut self, name: &str, value: &str) -> Result<(), StealthDbError> {
        self.set("client info", |props| {
            props.client_info.insert(name.to_string(), value.to_string());
        })
    }

    fn type_map(&self) -> Result<TypeMap, StealthDbError> {
        self.read(|state| state.properties.type_map.clone())
    }

    fn set_type_map(&mut self, map: TypeMap) -> Result<(), StealthDbError> {
        self.set("type map", |props| props.type_map = map)
    }
}

/// Provider that hands out [`MemoryConnection`]s built from one script.
#[derive(Debug)]
pub struct MemoryProvider {
    script: Arc<MemoryScript>,
    stats: Arc<ProviderStats>,
    probes: Mutex<Vec<MemoryProbe>>,
    failures: Mutex<Vec<DriverError>>,
    open_delay: Option<Duration>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new(script: MemoryScript) -> Self {
        Self {
            script: Arc::new(script),
            stats: Arc::new(ProviderStats::default()),
            probes: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            open_delay: None,
        }
    }

    /// Sleep this long inside every open, widening race windows in tests.
    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Make the next open fail with `err`. Queued failures are used in order.
    pub fn fail_next_open(&self, err: DriverError) {
        lock(&self.failures).push(err);
    }

    #[must_use]
    pub fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    /// Probes of every connection opened so far, oldest first.
    #[must_use]
    pub fn probes(&self) -> Vec<MemoryProbe> {
        lock(&self.probes).clone()
    }

    /// Probe of the most recently opened connection.
    #[must_use]
    pub fn last_probe(&self) -> Option<MemoryProbe> {
        lock(&self.probes).last().cloned()
    }
}

impl ConnectionProvider for MemoryProvider {
    fn connect(&self) -> Result<Box<dyn Connection>, StealthDbError> {
        if let Some(delay) = self.open_delay {
            thread::sleep(delay);
        }
        {
            let mut failures = lock(&self.failures);
            if !failures.is_empty() {
                return Err(failures.remove(0).into());
            }
        }
        let conn = MemoryConnection::with_stats(Arc::clone(&self.script), Some(Arc::clone(&self.stats)));
        lock(&self.probes).push(conn.probe());
        Ok(Box::new(conn))
    }
}
