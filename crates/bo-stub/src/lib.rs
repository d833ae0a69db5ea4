// SPDX-License-Identifier: BUSL-1.1
//! # bo-stub — Scripted In-Memory Database
//!
//! [`StubDatabase`] implements [`ConnectionSource`] without a server. Tests
//! (and the CLI's `--stub` mode) register a handler per routine; each handler
//! receives the bound [`Invocation`] and answers with a [`StubResponse`]
//! carrying a return value, output values and cursors.
//!
//! Besides answering calls the stub keeps books on everything the engine
//! does to it:
//!
//! - every executed call is recorded ([`StubDatabase::calls`]),
//! - every lease is counted on acquire and on drop ([`LeaseStats`]),
//! - explicit cursor closes are counted,
//! - faults can be injected at any [`Stage`] of the call sequence.
//!
//! All clones share the same state.

mod connection;
mod response;

pub use connection::StubConnection;
pub use response::{StubCursor, StubResponse};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bo_core::{
    CallForm, ConnectionSource, DriverError, ParameterDescriptor, RoutineConnection, RoutineName,
    Value,
};
use parking_lot::{Mutex, RwLock};

/// Routine handler: bound invocation in, scripted response out.
pub type Handler = Arc<dyn Fn(&Invocation) -> Result<StubResponse, DriverError> + Send + Sync>;

/// A call as the stub saw it at execute time.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Routine that was executed.
    pub routine: RoutineName,
    /// Function or procedure.
    pub form: CallForm,
    /// Input descriptors with their values, already coerced to declared type.
    pub inputs: Vec<(ParameterDescriptor, Value)>,
    /// Registered output descriptors.
    pub outputs: Vec<ParameterDescriptor>,
}

impl Invocation {
    /// Bound value of the named input (case-insensitive).
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs
            .iter()
            .find(|(p, _)| p.name().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Point in the call sequence where a fault can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Leasing a connection.
    Acquire,
    /// Binding an input.
    Bind,
    /// Executing the routine.
    Execute,
    /// Fetching a cursor batch.
    Fetch,
    /// Closing a cursor.
    Close,
    /// Reading a return value or output.
    Output,
    /// Committing the call.
    Finish,
}

/// Lease and cursor accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseStats {
    /// Connections handed out.
    pub acquired: usize,
    /// Connections handed back (dropped).
    pub released: usize,
    /// Calls that reached `finish` successfully.
    pub finished: usize,
    /// Cursors closed explicitly by the caller.
    pub cursors_closed: usize,
}

impl LeaseStats {
    /// Leases currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.acquired.saturating_sub(self.released)
    }
}

#[derive(Debug)]
struct Fault {
    stage: Stage,
    error: DriverError,
    remaining: Option<usize>,
}

#[derive(Default)]
struct Inner {
    handlers: RwLock<HashMap<String, Handler>>,
    calls: Mutex<Vec<Invocation>>,
    faults: Mutex<Vec<Fault>>,
    latency: Mutex<Option<Duration>>,
    commit_latency: Mutex<Option<Duration>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    finished: AtomicUsize,
    cursors_closed: AtomicUsize,
}

impl Inner {
    /// Fire the first armed fault for `stage`, if any.
    fn check(&self, stage: Stage) -> Result<(), DriverError> {
        let mut faults = self.faults.lock();
        let Some(index) = faults.iter().position(|f| f.stage == stage) else {
            return Ok(());
        };
        let error = faults[index].error.clone();
        if let Some(remaining) = faults[index].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.remove(index);
            }
        }
        tracing::debug!(?stage, %error, "stub fault fired");
        Err(error)
    }

    fn handler(&self, routine: &RoutineName) -> Option<Handler> {
        self.handlers
            .read()
            .get(&routine.permission_key())
            .cloned()
    }
}

/// Scripted in-memory database. Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct StubDatabase {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StubDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubDatabase")
            .field("routines", &self.inner.handlers.read().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl StubDatabase {
    /// An empty database with no routines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `PACKAGE.PROCEDURE`.
    ///
    /// Routine lookup is case-insensitive.
    pub fn on<F>(&self, routine: &str, handler: F) -> &Self
    where
        F: Fn(&Invocation) -> Result<StubResponse, DriverError> + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .write()
            .insert(routine.trim().to_ascii_uppercase(), Arc::new(handler));
        self
    }

    /// Register a handler that always answers with `response`.
    pub fn on_static(&self, routine: &str, response: StubResponse) -> &Self {
        self.on(routine, move |_| Ok(response.clone()))
    }

    /// Arm a fault that fires on every visit to `stage` until cleared.
    pub fn inject(&self, stage: Stage, error: DriverError) {
        self.inner.faults.lock().push(Fault {
            stage,
            error,
            remaining: None,
        });
    }

    /// Arm a fault that fires on the next `times` visits to `stage`.
    pub fn inject_times(&self, stage: Stage, error: DriverError, times: usize) {
        if times == 0 {
            return;
        }
        self.inner.faults.lock().push(Fault {
            stage,
            error,
            remaining: Some(times),
        });
    }

    /// Disarm every fault.
    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
    }

    /// Delay every execution by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock() = latency;
    }

    /// Delay every commit by `latency`. The routine has already answered
    /// when the delay starts.
    pub fn set_commit_latency(&self, latency: Option<Duration>) {
        *self.inner.commit_latency.lock() = latency;
    }

    /// Every executed call, oldest first.
    pub fn calls(&self) -> Vec<Invocation> {
        self.inner.calls.lock().clone()
    }

    /// Number of executions of `PACKAGE.PROCEDURE` (case-insensitive).
    pub fn call_count(&self, routine: &str) -> usize {
        let key = routine.trim().to_ascii_uppercase();
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|c| c.routine.permission_key() == key)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    /// Lease and cursor accounting so far.
    pub fn stats(&self) -> LeaseStats {
        LeaseStats {
            acquired: self.inner.acquired.load(Ordering::SeqCst),
            released: self.inner.released.load(Ordering::SeqCst),
            finished: self.inner.finished.load(Ordering::SeqCst),
            cursors_closed: self.inner.cursors_closed.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ConnectionSource for StubDatabase {
    async fn acquire(&self) -> Result<Box<dyn RoutineConnection>, DriverError> {
        self.inner.check(Stage::Acquire)?;
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubConnection::new(Arc::clone(&self.inner))))
    }
}
