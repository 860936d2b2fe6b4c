//! The wrap adapter: callback-style operations in, lazy values out.
//!
//! [`wrap`] turns an operation that reports through an error-first completion
//! callback into one that returns a virtualized handle immediately. The
//! caller touches the handle whenever it likes; the touch suspends its
//! context until the callback has fired.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::deferred::Deferred;
use crate::error::{self, TomorrowError};
use crate::value::{NativeFn, Object, Value};

/// Builds the error raised for an asynchronous failure, from the reported
/// message and the call-site stack snapshot. The Rust rendition of handing
/// `wrap` an error subtype.
pub type ErrorFactory = Arc<dyn Fn(&str, Vec<String>) -> TomorrowError + Send + Sync>;

type Operation = dyn Fn(Vec<Value>) -> Result<(), Box<dyn StdError + Send + Sync>> + Send + Sync;

/// A wrapped callback-style operation. Created by [`wrap`].
pub struct Wrapper {
    operation: Box<Operation>,
    inject_index: isize,
    error: Option<ErrorFactory>,
}

/// Wraps a callback-accepting operation into one returning a future's handle.
///
/// `inject_index` is where the synthesized completion callback is inserted
/// into the caller's argument list; negative values count from the end, so
/// `-1` appends it in the conventional trailing position. The operation is
/// expected to return promptly and invoke the callback later as
/// `complete(error, result)`.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc::channel;
/// use std::thread;
/// use tomorrow::{begin, wrap, Value};
///
/// let read = wrap(
///     |args: Vec<Value>| {
///         let complete = args[1].clone();
///         thread::spawn(move || {
///             complete.call(&[Value::Null, Value::from("data")]).unwrap();
///         });
///         Ok(())
///     },
///     -1,
/// );
///
/// let (tx, rx) = channel();
/// begin(move || {
///     // Looks synchronous; suspends this context until the callback fires.
///     let file = read.call(vec![Value::from("a.txt")]).unwrap();
///     tx.send(file.get("length").unwrap()).unwrap();
/// });
/// assert_eq!(rx.recv().unwrap(), Value::from(4i64));
/// ```
pub fn wrap<F>(operation: F, inject_index: isize) -> Wrapper
where
    F: Fn(Vec<Value>) -> Result<(), Box<dyn StdError + Send + Sync>> + Send + Sync + 'static,
{
    Wrapper {
        operation: Box::new(operation),
        inject_index,
        error: None,
    }
}

impl Wrapper {
    /// Installs a factory for the error raised on asynchronous failure,
    /// replacing the default [`TomorrowError`] construction.
    pub fn with_error<F>(mut self, factory: F) -> Wrapper
    where
        F: Fn(&str, Vec<String>) -> TomorrowError + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(factory));
        self
    }

    /// Invokes the wrapped operation and returns the future's handle
    /// immediately.
    ///
    /// The call-site stack is snapshotted here: by the time an asynchronous
    /// failure surfaces, this frame has long since unwound. If the operation
    /// itself fails before returning, the failure is normalized and returned
    /// from this call directly, never deferred to a later force.
    pub fn call(&self, mut args: Vec<Value>) -> Result<Value, TomorrowError> {
        let site = error::capture_stack();
        let deferred = Deferred::new();
        let handle = deferred.handle();

        let position = splice_position(self.inject_index, args.len());
        args.insert(position, self.completion(deferred, site.clone()));

        trace!(argc = args.len(), "invoking wrapped operation");
        if let Err(cause) = (self.operation)(args) {
            let message = match cause.downcast_ref::<TomorrowError>() {
                Some(prior) => prior.message().to_string(),
                None => cause.to_string(),
            };
            trace!(%message, "wrapped operation failed synchronously");
            return Err(TomorrowError::new(message, Some(Arc::from(cause)), Some(site)));
        }

        Ok(handle)
    }

    /// The synthesized `complete(error, result)` callback.
    fn completion(&self, deferred: Deferred, site: Vec<String>) -> Value {
        let factory = self.error.clone();
        let complete: NativeFn = Arc::new(move |_receiver, args: &[Value]| {
            let error = args.first().cloned().unwrap_or(Value::Null);
            let result = args.get(1).cloned().unwrap_or(Value::Null);
            if error.truthy() {
                let message = failure_message(&error);
                let raised = match &factory {
                    Some(make) => make(&message, site.clone()),
                    None => TomorrowError::new(message, None, Some(site.clone())),
                };
                deferred.reject(raised);
            } else {
                deferred.resolve(result);
            }
            Ok(Value::Null)
        });
        Value::Object(Object::callable(complete))
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("inject_index", &self.inject_index)
            .finish()
    }
}

// Negative indexes are statically positioned from the end of the augmented
// argument list, clamped into the valid insertion range.
fn splice_position(index: isize, len: usize) -> usize {
    let len = len as isize;
    let at = if index < 0 { len + 1 + index } else { index };
    at.clamp(0, len) as usize
}

fn failure_message(error: &Value) -> String {
    match error {
        Value::Str(text) => text.clone(),
        Value::Object(object) => match object.get("message") {
            Value::Str(text) => text,
            Value::Null => String::from("unknown asynchronous failure"),
            other => other.text(),
        },
        other => other.text(),
    }
}
