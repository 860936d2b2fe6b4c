//! The object-virtualization primitive.
//!
//! A [`Handle`] is a value whose operations are intercepted and redirected to
//! a [`Delegate`]. The delegate sits behind a single mutable indirection
//! cell and is overwritten exactly once, at resolution: before that it is
//! the forcing delegation handler, afterwards a `DirectDelegate` that hits
//! the resolved object with no forcing in between.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TomorrowError;
use crate::value::{PropertyAttributes, Value};

/// The virtualized operation set.
///
/// Implementors receive every operation performed on a [`Handle`] bound to
/// them. Calls may suspend the calling execution context.
pub trait Delegate: Send + Sync {
    /// Property read.
    fn get(&self, property: &str) -> Result<Value, TomorrowError>;
    /// Property write; returns the assigned value.
    fn set(&self, property: &str, value: Value) -> Result<Value, TomorrowError>;
    /// Property removal; `true` when the property was present.
    fn delete(&self, property: &str) -> Result<bool, TomorrowError>;
    /// Invocation of the virtualized value as a callable.
    fn call(&self, args: &[Value]) -> Result<Value, TomorrowError>;
    /// Property-attribute introspection.
    fn query(&self, property: &str) -> Result<Option<PropertyAttributes>, TomorrowError>;
    /// Own enumerable property names.
    fn enumerate(&self) -> Result<Vec<String>, TomorrowError>;
    /// Indexed read.
    fn index_get(&self, index: usize) -> Result<Value, TomorrowError>;
    /// Indexed write; returns the assigned value.
    fn index_set(&self, index: usize, value: Value) -> Result<Value, TomorrowError>;
    /// Indexed removal; `true` when a value was present.
    fn index_delete(&self, index: usize) -> Result<bool, TomorrowError>;
    /// Element-attribute introspection.
    fn index_query(&self, index: usize) -> Result<Option<PropertyAttributes>, TomorrowError>;
    /// Occupied element indexes.
    fn index_enumerate(&self) -> Result<Vec<usize>, TomorrowError>;
}

/// A value whose operations are redirected to a swappable [`Delegate`].
pub struct Handle {
    delegate: Mutex<Arc<dyn Delegate>>,
}

impl Handle {
    pub(crate) fn new(delegate: Arc<dyn Delegate>) -> Arc<Handle> {
        Arc::new(Handle {
            delegate: Mutex::new(delegate),
        })
    }

    /// Swaps which delegate backs this handle. Called exactly once per
    /// handle, at resolution.
    pub(crate) fn rebind(&self, delegate: Arc<dyn Delegate>) {
        *self
            .delegate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delegate;
    }

    // The delegate is cloned out and the lock released before dispatch: the
    // dispatched operation may suspend this context, and resolution needs
    // the cell to rebind.
    fn delegate(&self) -> Arc<dyn Delegate> {
        self.delegate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Property read through the current delegate.
    pub fn get(&self, property: &str) -> Result<Value, TomorrowError> {
        self.delegate().get(property)
    }

    /// Property write through the current delegate.
    pub fn set(&self, property: &str, value: Value) -> Result<Value, TomorrowError> {
        self.delegate().set(property, value)
    }

    /// Property removal through the current delegate.
    pub fn delete(&self, property: &str) -> Result<bool, TomorrowError> {
        self.delegate().delete(property)
    }

    /// Invocation through the current delegate.
    pub fn call(&self, args: &[Value]) -> Result<Value, TomorrowError> {
        self.delegate().call(args)
    }

    /// Attribute introspection through the current delegate.
    pub fn query(&self, property: &str) -> Result<Option<PropertyAttributes>, TomorrowError> {
        self.delegate().query(property)
    }

    /// Enumeration through the current delegate.
    pub fn enumerate(&self) -> Result<Vec<String>, TomorrowError> {
        self.delegate().enumerate()
    }

    /// Indexed read through the current delegate.
    pub fn index_get(&self, index: usize) -> Result<Value, TomorrowError> {
        self.delegate().index_get(index)
    }

    /// Indexed write through the current delegate.
    pub fn index_set(&self, index: usize, value: Value) -> Result<Value, TomorrowError> {
        self.delegate().index_set(index, value)
    }

    /// Indexed removal through the current delegate.
    pub fn index_delete(&self, index: usize) -> Result<bool, TomorrowError> {
        self.delegate().index_delete(index)
    }

    /// Element-attribute introspection through the current delegate.
    pub fn index_query(&self, index: usize) -> Result<Option<PropertyAttributes>, TomorrowError> {
        self.delegate().index_query(index)
    }

    /// Occupied element indexes through the current delegate.
    pub fn index_enumerate(&self) -> Result<Vec<usize>, TomorrowError> {
        self.delegate().index_enumerate()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").finish()
    }
}

/// The post-resolution fast path: forwards every operation straight to the
/// resolved value.
pub(crate) struct DirectDelegate {
    target: Value,
}

impl DirectDelegate {
    pub(crate) fn new(target: Value) -> DirectDelegate {
        DirectDelegate { target }
    }
}

impl Delegate for DirectDelegate {
    fn get(&self, property: &str) -> Result<Value, TomorrowError> {
        self.target.get(property)
    }

    fn set(&self, property: &str, value: Value) -> Result<Value, TomorrowError> {
        self.target.set(property, value)
    }

    fn delete(&self, property: &str) -> Result<bool, TomorrowError> {
        self.target.delete(property)
    }

    fn call(&self, args: &[Value]) -> Result<Value, TomorrowError> {
        self.target.call_with(self.target.clone(), args)
    }

    fn query(&self, property: &str) -> Result<Option<PropertyAttributes>, TomorrowError> {
        self.target.query(property)
    }

    fn enumerate(&self) -> Result<Vec<String>, TomorrowError> {
        self.target.enumerate()
    }

    fn index_get(&self, index: usize) -> Result<Value, TomorrowError> {
        self.target.index_get(index)
    }

    fn index_set(&self, index: usize, value: Value) -> Result<Value, TomorrowError> {
        self.target.index_set(index, value)
    }

    fn index_delete(&self, index: usize) -> Result<bool, TomorrowError> {
        self.target.index_delete(index)
    }

    fn index_query(&self, index: usize) -> Result<Option<PropertyAttributes>, TomorrowError> {
        self.target.index_query(index)
    }

    fn index_enumerate(&self) -> Result<Vec<usize>, TomorrowError> {
        self.target.index_enumerate()
    }
}

/// Backs the handle of a rejected future: every operation reports the
/// recorded failure.
pub(crate) struct FailedDelegate {
    error: TomorrowError,
}

impl FailedDelegate {
    pub(crate) fn new(error: TomorrowError) -> FailedDelegate {
        FailedDelegate { error }
    }
}

impl Delegate for FailedDelegate {
    fn get(&self, _property: &str) -> Result<Value, TomorrowError> {
        Err(self.error.clone())
    }

    fn set(&self, _property: &str, _value: Value) -> Result<Value, TomorrowError> {
        Err(self.error.clone())
    }

    fn delete(&self, _property: &str) -> Result<bool, TomorrowError> {
        Err(self.error.clone())
    }

    fn call(&self, _args: &[Value]) -> Result<Value, TomorrowError> {
        Err(self.error.clone())
    }

    fn query(&self, _property: &str) -> Result<Option<PropertyAttributes>, TomorrowError> {
        Err(self.error.clone())
    }

    fn enumerate(&self) -> Result<Vec<String>, TomorrowError> {
        Err(self.error.clone())
    }

    fn index_get(&self, _index: usize) -> Result<Value, TomorrowError> {
        Err(self.error.clone())
    }

    fn index_set(&self, _index: usize, _value: Value) -> Result<Value, TomorrowError> {
        Err(self.error.clone())
    }

    fn index_delete(&self, _index: usize) -> Result<bool, TomorrowError> {
        Err(self.error.clone())
    }

    fn index_query(&self, _index: usize) -> Result<Option<PropertyAttributes>, TomorrowError> {
        Err(self.error.clone())
    }

    fn index_enumerate(&self) -> Result<Vec<usize>, TomorrowError> {
        Err(self.error.clone())
    }
}
