//! The future engine: resolution state and the waiter queue.
//!
//! A [`Deferred`] stands in for a result that is not yet available. Forcing
//! it from inside an execution context either returns the resolved value
//! immediately or enqueues the context and suspends it; resolving it wakes
//! every queued context in arrival order, synchronously, before the
//! resolving call returns.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{trace, warn};

use crate::error::{AccessError, TomorrowError};
use crate::fiber::{self, Fiber};
use crate::handler::Handler;
use crate::proxy::{DirectDelegate, FailedDelegate, Handle};
use crate::value::Value;

struct State {
    resolved: Option<Result<Value, TomorrowError>>,
    waiters: Vec<Fiber>,
}

pub(crate) struct Inner {
    state: Mutex<State>,
    handle: Arc<Handle>,
}

/// A deferred value: created unresolved, bound to a virtualization handle,
/// resolved (or rejected) exactly once.
///
/// Cloning shares the same engine; the delegation handler behind the handle
/// holds only a non-owning back-reference.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<Inner>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) enum Forced {
    Ready(Result<Value, TomorrowError>),
    Enqueued,
}

impl Inner {
    /// Returns the resolved result, or enqueues the current context for a
    /// later [`fiber::suspend`]. The caller suspends after releasing its
    /// strong reference so that dropping the engine can still wake it.
    pub(crate) fn enqueue(&self) -> Result<Forced, TomorrowError> {
        let mut state = lock(&self.state);
        if let Some(result) = &state.resolved {
            return Ok(Forced::Ready(result.clone()));
        }
        let Some(current) = fiber::current() else {
            return Err(AccessError::OutsideContext.into());
        };
        trace!("forcing an unresolved future; enqueueing context");
        state.waiters.push(current);
        Ok(Forced::Enqueued)
    }

    pub(crate) fn complete(&self, result: Result<Value, TomorrowError>) {
        // Bare primitives are boxed so every subsequent operation has a
        // well-defined object target; objects pass through untouched.
        let result = result.map(Value::boxed);
        let waiters = {
            let mut state = lock(&self.state);
            if state.resolved.is_some() {
                warn!("resolve on an already-resolved future ignored");
                return;
            }
            state.resolved = Some(result.clone());
            mem::take(&mut state.waiters)
        };

        // Rebind the handle before waking anyone: a resumed context must
        // observe the future as fully resolved, and later accesses take the
        // direct path without ever reaching the forcing handler.
        match &result {
            Ok(value) => self
                .handle
                .rebind(Arc::new(DirectDelegate::new(value.clone()))),
            Err(error) => self
                .handle
                .rebind(Arc::new(FailedDelegate::new(error.clone()))),
        }

        trace!(waiters = waiters.len(), "future resolved; waking waiters");
        for waiter in waiters {
            waiter.resume(result.clone());
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let waiters = mem::take(&mut lock(&self.state).waiters);
        if waiters.is_empty() {
            return;
        }
        warn!(
            waiters = waiters.len(),
            "future dropped before resolution; waking waiters with an error"
        );
        for waiter in waiters {
            waiter.resume_detached(Err(AccessError::Dropped.into()));
        }
    }
}

/// Forces the engine behind `inner`: returns the resolved value, or suspends
/// the current context until resolution.
pub(crate) fn force(inner: Arc<Inner>) -> Result<Value, TomorrowError> {
    match inner.enqueue()? {
        Forced::Ready(result) => result,
        Forced::Enqueued => {
            // Release the strong reference before suspending; the engine's
            // destructor must be able to run and wake this very waiter.
            drop(inner);
            fiber::suspend()
        }
    }
}

impl Deferred {
    /// Creates an unresolved deferred bound to a fresh delegation handler.
    pub fn new() -> Deferred {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| Inner {
            state: Mutex::new(State {
                resolved: None,
                waiters: Vec::new(),
            }),
            handle: Handle::new(Arc::new(Handler::new(weak.clone()))),
        });
        Deferred { inner }
    }

    /// The virtualization handle standing in for the eventual value.
    pub fn handle(&self) -> Value {
        Value::Handle(self.inner.handle.clone())
    }

    /// Blocks the calling execution context until the value is available,
    /// then returns it. Resolved deferreds return immediately from any
    /// thread; unresolved ones require a context to suspend.
    pub fn force(&self) -> Result<Value, TomorrowError> {
        force(Arc::clone(&self.inner))
    }

    /// Resolves with `value`, waking every queued waiter in arrival order
    /// before returning. A second resolution is ignored with a warning.
    pub fn resolve(&self, value: impl Into<Value>) {
        self.inner.complete(Ok(value.into()));
    }

    /// Records `error` as the outcome: queued waiters wake with it, and
    /// every later force or handle operation reports it.
    pub fn reject(&self, error: TomorrowError) {
        self.inner.complete(Err(error));
    }
}

impl Default for Deferred {
    fn default() -> Deferred {
        Deferred::new()
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved = lock(&self.inner.state).resolved.is_some();
        f.debug_struct("Deferred").field("resolved", &resolved).finish()
    }
}
