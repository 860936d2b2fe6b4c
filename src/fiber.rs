//! Cooperative execution contexts backed by parked OS threads.
//!
//! Each context is an OS thread that only ever runs while some other party
//! is blocked handing control to it: [`Fiber::resume`] delivers a payload
//! and blocks until the context suspends, finishes, or panics; [`suspend`]
//! signals the current resumer and blocks for the next resume. The result
//! is strictly cooperative scheduling without a native coroutine primitive:
//! one context active at a time, any number suspended.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use tracing::trace;

use crate::error::TomorrowError;
use crate::value::Value;

/// The payload a suspended context receives when it is resumed.
pub(crate) type Resumption = Result<Value, TomorrowError>;

enum Exit {
    Suspended,
    Finished,
    Panicked(Box<dyn Any + Send>),
}

struct Packet {
    payload: Resumption,
    exit_tx: SyncSender<Exit>,
}

struct Inner {
    resume_tx: SyncSender<Packet>,
}

/// A handle to a cooperative execution context; consumed from waiter queues
/// to deliver a resolved value.
#[derive(Clone)]
pub(crate) struct Fiber {
    inner: Arc<Inner>,
}

struct Context {
    handle: Fiber,
    resume_rx: Receiver<Packet>,
    // Whoever resumed us last; told about our next suspension or exit.
    exit_tx: Option<SyncSender<Exit>>,
}

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

impl Fiber {
    /// Creates the context without running it; the body starts on the first
    /// `resume`.
    pub(crate) fn spawn<F>(body: F) -> Fiber
    where
        F: FnOnce() + Send + 'static,
    {
        // Capacity one on both channels so neither side ever blocks while
        // the other is still between rendezvous points.
        let (resume_tx, resume_rx) = sync_channel(1);
        let fiber = Fiber {
            inner: Arc::new(Inner { resume_tx }),
        };
        let handle = fiber.clone();

        let spawned = thread::Builder::new()
            .name("tomorrow-context".to_string())
            .spawn(move || {
                let first = match resume_rx.recv() {
                    Ok(packet) => packet,
                    // Every handle dropped before the context ever ran.
                    Err(_) => return,
                };
                CURRENT.with(|current| {
                    *current.borrow_mut() = Some(Context {
                        handle,
                        resume_rx,
                        exit_tx: Some(first.exit_tx),
                    });
                });

                let outcome = panic::catch_unwind(AssertUnwindSafe(body));

                let exit_tx = CURRENT
                    .with(|current| current.borrow_mut().take())
                    .and_then(|context| context.exit_tx);
                if let Some(exit_tx) = exit_tx {
                    let _ = exit_tx.send(match outcome {
                        Ok(()) => Exit::Finished,
                        Err(payload) => Exit::Panicked(payload),
                    });
                }
            });
        if let Err(error) = spawned {
            panic!("failed to spawn execution context: {error}");
        }
        fiber
    }

    /// Hands control to the context with `payload` as the return value of
    /// its pending [`suspend`], blocking until it suspends again, finishes,
    /// or panics. Panics from the context propagate to this caller.
    pub(crate) fn resume(&self, payload: Resumption) {
        let (exit_tx, exit_rx) = sync_channel(1);
        if self
            .inner
            .resume_tx
            .send(Packet { payload, exit_tx })
            .is_err()
        {
            // Context already finished; nothing left to run.
            return;
        }
        match exit_rx.recv() {
            Ok(Exit::Suspended) => trace!("resumed context suspended again"),
            Ok(Exit::Finished) | Err(_) => trace!("resumed context finished"),
            Ok(Exit::Panicked(payload)) => panic::resume_unwind(payload),
        }
    }

    /// Like `resume` but does not wait for the context to yield back. Used
    /// when waking waiters from a destructor, where blocking could deadlock
    /// against the very context being woken.
    pub(crate) fn resume_detached(&self, payload: Resumption) {
        let (exit_tx, _exit_rx) = sync_channel(1);
        let _ = self.inner.resume_tx.send(Packet { payload, exit_tx });
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber").finish()
    }
}

/// The handle of the context this call runs inside, if any.
pub(crate) fn current() -> Option<Fiber> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|context| context.handle.clone())
    })
}

/// Yields control from inside a running context; returns whatever payload a
/// matching resume later supplies.
///
/// # Panics
///
/// Panics when called outside a context, or when every handle to this
/// context is dropped while it is suspended.
pub(crate) fn suspend() -> Resumption {
    CURRENT.with(|current| {
        let mut slot = current.borrow_mut();
        let context = slot
            .as_mut()
            .expect("suspend called outside an execution context");
        let exit_tx = context
            .exit_tx
            .take()
            .expect("suspending context has no resumer");
        trace!("context suspending");
        let _ = exit_tx.send(Exit::Suspended);
        let packet = context
            .resume_rx
            .recv()
            .expect("execution context abandoned while suspended");
        context.exit_tx = Some(packet.exit_tx);
        trace!("context resumed");
        packet.payload
    })
}

/// Starts a fresh cooperative execution context running `body`, returning
/// once the body completes or first suspends.
///
/// Panics inside `body` before its first suspension propagate to this
/// caller; panics after a suspension propagate to whoever performed the
/// resumption.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc::channel;
///
/// let (tx, rx) = channel();
/// tomorrow::begin(move || {
///     tx.send(1 + 2).unwrap();
/// });
/// assert_eq!(rx.recv().unwrap(), 3);
/// ```
pub fn begin<F>(body: F)
where
    F: FnOnce() + Send + 'static,
{
    let fiber = Fiber::spawn(body);
    fiber.resume(Ok(Value::Null));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn resume_payload_is_returned_from_suspend() {
        let (tx, rx) = channel();
        let fiber = Fiber::spawn(move || {
            let payload = suspend();
            tx.send(payload).unwrap();
        });
        fiber.resume(Ok(Value::Null));
        fiber.resume(Ok(Value::Int(7)));
        assert_eq!(rx.recv().unwrap().unwrap(), Value::Int(7));
    }

    #[test]
    fn begin_runs_the_body_to_completion() {
        let (tx, rx) = channel();
        begin(move || tx.send("done").unwrap());
        assert_eq!(rx.recv().unwrap(), "done");
    }

    #[test]
    #[should_panic(expected = "kaboom")]
    fn begin_propagates_body_panics() {
        begin(|| panic!("kaboom"));
    }

    #[test]
    fn current_is_none_outside_a_context() {
        assert!(current().is_none());
    }

    #[test]
    fn resuming_a_finished_context_is_a_no_op() {
        let (tx, rx) = channel();
        let fiber = Fiber::spawn(move || tx.send(()).unwrap());
        fiber.resume(Ok(Value::Null));
        rx.recv().unwrap();
        fiber.resume(Ok(Value::Null));
    }
}
