//! The delegation handler: force, then forward.
//!
//! Backs a handle only while its future is unresolved; resolution rebinds
//! the handle straight to the value, so this path is exercised just for
//! accesses that race the resolution.

use std::sync::Weak;

use crate::deferred::{self, Inner};
use crate::error::{AccessError, TomorrowError};
use crate::proxy::Delegate;
use crate::value::{PropertyAttributes, Value};

pub(crate) struct Handler {
    deferred: Weak<Inner>,
}

impl Handler {
    pub(crate) fn new(deferred: Weak<Inner>) -> Handler {
        Handler { deferred }
    }

    fn force(&self) -> Result<Value, TomorrowError> {
        let inner = self.deferred.upgrade().ok_or(AccessError::Dropped)?;
        deferred::force(inner)
    }
}

impl Delegate for Handler {
    fn get(&self, property: &str) -> Result<Value, TomorrowError> {
        self.force()?.get(property)
    }

    fn set(&self, property: &str, value: Value) -> Result<Value, TomorrowError> {
        self.force()?.set(property, value)
    }

    fn delete(&self, property: &str) -> Result<bool, TomorrowError> {
        self.force()?.delete(property)
    }

    fn call(&self, args: &[Value]) -> Result<Value, TomorrowError> {
        // The forced value is the receiver, not the handle, so state bound
        // to the real object stays reachable.
        let target = self.force()?;
        target.call_with(target.clone(), args)
    }

    fn query(&self, property: &str) -> Result<Option<PropertyAttributes>, TomorrowError> {
        self.force()?.query(property)
    }

    fn enumerate(&self) -> Result<Vec<String>, TomorrowError> {
        self.force()?.enumerate()
    }

    fn index_get(&self, index: usize) -> Result<Value, TomorrowError> {
        self.force()?.index_get(index)
    }

    fn index_set(&self, index: usize, value: Value) -> Result<Value, TomorrowError> {
        self.force()?.index_set(index, value)
    }

    fn index_delete(&self, index: usize) -> Result<bool, TomorrowError> {
        self.force()?.index_delete(index)
    }

    fn index_query(&self, index: usize) -> Result<Option<PropertyAttributes>, TomorrowError> {
        self.force()?.index_query(index)
    }

    fn index_enumerate(&self) -> Result<Vec<usize>, TomorrowError> {
        self.force()?.index_enumerate()
    }
}
