//! Transparent lazy futures for callback-style asynchronous operations.
//!
//! Code written against error-first completion callbacks can be consumed as
//! if the operation had already finished: [`wrap`] turns such an operation
//! into one that returns an ordinary-looking value immediately, and any
//! subsequent operation on that value (property access, call, enumeration,
//! mutation) blocks the calling execution context until the real result
//! arrives, then proceeds as if the value had been there all along.
//!
//! Three pieces cooperate:
//!
//! - [`Deferred`], the future engine: a resolution slot plus a FIFO queue of
//!   suspended contexts, woken synchronously by the resolving call.
//! - A delegation layer behind each [`Handle`]: every operation forces the
//!   future, then forwards to the resolved value. Resolution rebinds the
//!   handle straight to the value, so the forcing path is only exercised by
//!   accesses that race it.
//! - [`TomorrowError`], which reconstructs a usable stack trace from
//!   fragments captured on both sides of each suspension boundary, since an
//!   ordinary capture does not survive one.
//!
//! Execution contexts are strictly cooperative: [`begin`] launches one, and
//! exactly one is active at any instant. There is no cancellation and no
//! timeout; a future whose callback never fires blocks its waiters until the
//! engine is dropped.
//!
//! # Examples
//!
//! ```
//! use std::sync::mpsc::channel;
//! use std::thread;
//! use tomorrow::{begin, wrap, Value};
//!
//! // A callback-style operation, reporting through `complete(error, data)`.
//! let fetch = wrap(
//!     |args: Vec<Value>| {
//!         let complete = args[1].clone();
//!         thread::spawn(move || {
//!             complete.call(&[Value::Null, Value::from("response")]).unwrap();
//!         });
//!         Ok(())
//!     },
//!     -1,
//! );
//!
//! let (tx, rx) = channel();
//! begin(move || {
//!     let body = fetch.call(vec![Value::from("example.org")]).unwrap();
//!     // Suspends here until the callback has fired, then proceeds.
//!     tx.send(body.get("length").unwrap()).unwrap();
//! });
//! assert_eq!(rx.recv().unwrap(), Value::from(8i64));
//! ```

#![warn(missing_docs)]

mod deferred;
mod error;
mod fiber;
mod handler;
mod proxy;
mod value;
mod wrap;

pub use crate::deferred::Deferred;
pub use crate::error::{set_debug, AccessError, TomorrowError};
pub use crate::fiber::begin;
pub use crate::proxy::{Delegate, Handle};
pub use crate::value::{attributes_of, NativeFn, Object, PropertyAttributes, Value};
pub use crate::wrap::{wrap, ErrorFactory, Wrapper};
