//! A small dynamic value model.
//!
//! Wrapped operations traffic in [`Value`]s: primitives, shared mutable
//! [`Object`]s, and virtualized [`Handle`](crate::Handle)s. The operation set
//! on `Value` (property access, call, enumeration, indexed access) is the
//! seam the delegation layer forwards through, so an operation applied to a
//! handle before resolution and the same operation applied to the resolved
//! object afterwards go through identical code.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AccessError, TomorrowError};
use crate::proxy::Handle;

/// The call behavior of a callable [`Object`]: `(receiver, args) -> result`.
pub type NativeFn = Arc<dyn Fn(Value, &[Value]) -> Result<Value, TomorrowError> + Send + Sync>;

/// Attribute flags of a single property, as reported by host introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAttributes {
    /// The property's value can be replaced.
    pub writable: bool,
    /// The property shows up in enumeration.
    pub enumerable: bool,
    /// The property can be deleted or have its attributes changed.
    pub configurable: bool,
}

impl PropertyAttributes {
    /// Attributes of an ordinary data property.
    pub const DATA: PropertyAttributes = PropertyAttributes {
        writable: true,
        enumerable: true,
        configurable: true,
    };

    /// Attributes of a built-in such as `length` on a boxed string.
    pub const BUILTIN: PropertyAttributes = PropertyAttributes {
        writable: false,
        enumerable: false,
        configurable: false,
    };
}

/// Reports the attribute flags of `property` on `object`, or `None` when the
/// property is absent.
pub fn attributes_of(object: &Object, property: &str) -> Option<PropertyAttributes> {
    let data = lock(&object.inner);
    if data.properties.iter().any(|(name, _)| name == property) {
        return Some(PropertyAttributes::DATA);
    }
    if builtin(&data, property).is_some() {
        return Some(PropertyAttributes::BUILTIN);
    }
    None
}

/// A dynamically typed value.
#[derive(Clone)]
pub enum Value {
    /// The absent value; falsy.
    Null,
    /// A boolean primitive.
    Bool(bool),
    /// An integer primitive.
    Int(i64),
    /// A floating-point primitive.
    Float(f64),
    /// A string primitive.
    Str(String),
    /// A shared mutable object.
    Object(Object),
    /// A virtualized handle whose operations are redirected to a delegate.
    Handle(Arc<Handle>),
}

impl Value {
    /// `false` only for `Null`, `false`, `0`, `0.0`, and the empty string.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Handle(_) => true,
        }
    }

    /// The value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Handle(_) => "handle",
        }
    }

    /// Boxes a bare primitive into an object wrapper so that every subsequent
    /// operation has a well-defined object target. Objects and handles pass
    /// through untouched, never double-wrapped.
    pub(crate) fn boxed(self) -> Value {
        match self {
            Value::Object(_) | Value::Handle(_) => self,
            primitive => Value::Object(Object::boxing(primitive)),
        }
    }

    pub(crate) fn text(&self) -> String {
        match self {
            Value::Null => String::from("null"),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Object(_) => String::from("[object]"),
            Value::Handle(_) => String::from("[handle]"),
        }
    }

    /// Borrows the underlying object, if this is one.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn expect_object(&self) -> Result<&Object, TomorrowError> {
        self.as_object()
            .ok_or_else(|| AccessError::NotAnObject(self.type_name()).into())
    }

    /// Reads `property`, suspending first when this is an unresolved handle.
    pub fn get(&self, property: &str) -> Result<Value, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.get(property),
            other => Ok(other.expect_object()?.get(property)),
        }
    }

    /// Assigns `property` and returns the assigned value.
    pub fn set(&self, property: &str, value: Value) -> Result<Value, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.set(property, value),
            other => {
                other.expect_object()?.set(property, value.clone());
                Ok(value)
            }
        }
    }

    /// Removes `property`; `true` when it was present.
    pub fn delete(&self, property: &str) -> Result<bool, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.delete(property),
            other => Ok(other.expect_object()?.delete(property)),
        }
    }

    /// Invokes the value as a callable with itself as receiver.
    pub fn call(&self, args: &[Value]) -> Result<Value, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.call(args),
            other => other.call_with(other.clone(), args),
        }
    }

    /// Invokes the value as a callable with an explicit receiver.
    pub fn call_with(&self, receiver: Value, args: &[Value]) -> Result<Value, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.call(args),
            other => {
                let native = other
                    .expect_object()?
                    .native()
                    .ok_or(AccessError::NotCallable)?;
                native(receiver, args)
            }
        }
    }

    /// Reports `property`'s attribute flags, or `None` when absent.
    pub fn query(&self, property: &str) -> Result<Option<PropertyAttributes>, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.query(property),
            other => Ok(attributes_of(other.expect_object()?, property)),
        }
    }

    /// The value's own enumerable property names, in insertion order.
    pub fn enumerate(&self) -> Result<Vec<String>, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.enumerate(),
            other => Ok(other.expect_object()?.keys()),
        }
    }

    /// Reads the element at `index`; `Null` when out of range.
    pub fn index_get(&self, index: usize) -> Result<Value, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.index_get(index),
            other => Ok(other.expect_object()?.index_get(index)),
        }
    }

    /// Writes the element at `index`, growing the element store as needed,
    /// and returns the assigned value.
    pub fn index_set(&self, index: usize, value: Value) -> Result<Value, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.index_set(index, value),
            other => {
                other.expect_object()?.index_set(index, value.clone());
                Ok(value)
            }
        }
    }

    /// Clears the element at `index`, leaving a hole; `true` when a value was
    /// present.
    pub fn index_delete(&self, index: usize) -> Result<bool, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.index_delete(index),
            other => Ok(other.expect_object()?.index_delete(index)),
        }
    }

    /// Attribute flags of the element at `index`, or `None` for holes and
    /// out-of-range indexes.
    pub fn index_query(&self, index: usize) -> Result<Option<PropertyAttributes>, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.index_query(index),
            other => Ok(other.expect_object()?.index_query(index)),
        }
    }

    /// The occupied element indexes, in ascending order.
    pub fn index_enumerate(&self) -> Result<Vec<usize>, TomorrowError> {
        match self {
            Value::Handle(handle) => handle.index_enumerate(),
            other => Ok(other.expect_object()?.index_keys()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            (Value::Handle(a), Value::Handle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(object) => object.fmt(f),
            Value::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Value {
        Value::Object(object)
    }
}

/// A shared mutable object: an insertion-ordered property table, an element
/// vector for integer-indexed access, optional call behavior, and an optional
/// boxed primitive.
#[derive(Clone)]
pub struct Object {
    inner: Arc<Mutex<ObjectData>>,
}

#[derive(Default)]
struct ObjectData {
    properties: Vec<(String, Value)>,
    elements: Vec<Value>,
    callable: Option<NativeFn>,
    primitive: Option<Value>,
}

fn lock(inner: &Arc<Mutex<ObjectData>>) -> MutexGuard<'_, ObjectData> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Object {
    /// Creates an empty object.
    pub fn new() -> Object {
        Object {
            inner: Arc::new(Mutex::new(ObjectData::default())),
        }
    }

    /// Creates a callable object with the given call behavior.
    pub fn callable(call: NativeFn) -> Object {
        let object = Object::new();
        lock(&object.inner).callable = Some(call);
        object
    }

    /// Creates an object wrapper around a bare primitive.
    pub(crate) fn boxing(primitive: Value) -> Object {
        let object = Object::new();
        lock(&object.inner).primitive = Some(primitive);
        object
    }

    /// Reads a property; `Null` when absent. Boxed primitives additionally
    /// answer `length` (strings) and `valueOf`.
    pub fn get(&self, property: &str) -> Value {
        let data = lock(&self.inner);
        if let Some((_, value)) = data.properties.iter().find(|(name, _)| name == property) {
            return value.clone();
        }
        builtin(&data, property).unwrap_or(Value::Null)
    }

    /// Assigns a property, keeping first-assignment order for enumeration.
    pub fn set(&self, property: &str, value: Value) {
        let mut data = lock(&self.inner);
        match data.properties.iter_mut().find(|(name, _)| name == property) {
            Some((_, slot)) => *slot = value,
            None => data.properties.push((property.to_string(), value)),
        }
    }

    /// Removes a property; `true` when it was present.
    pub fn delete(&self, property: &str) -> bool {
        let mut data = lock(&self.inner);
        let before = data.properties.len();
        data.properties.retain(|(name, _)| name != property);
        data.properties.len() != before
    }

    /// The own enumerable property names, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.inner)
            .properties
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The boxed primitive, when this object is a primitive wrapper.
    pub fn primitive(&self) -> Option<Value> {
        lock(&self.inner).primitive.clone()
    }

    pub(crate) fn native(&self) -> Option<NativeFn> {
        lock(&self.inner).callable.clone()
    }

    /// Reads the element at `index`; `Null` for holes and out-of-range
    /// indexes.
    pub fn index_get(&self, index: usize) -> Value {
        lock(&self.inner)
            .elements
            .get(index)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Writes the element at `index`, filling any gap with holes.
    pub fn index_set(&self, index: usize, value: Value) {
        let mut data = lock(&self.inner);
        if index >= data.elements.len() {
            data.elements.resize(index + 1, Value::Null);
        }
        data.elements[index] = value;
    }

    /// Clears the element at `index`, leaving a hole rather than shifting
    /// later elements; `true` when a value was present.
    pub fn index_delete(&self, index: usize) -> bool {
        let mut data = lock(&self.inner);
        match data.elements.get_mut(index) {
            Some(slot) if !matches!(slot, Value::Null) => {
                *slot = Value::Null;
                true
            }
            _ => false,
        }
    }

    /// Attribute flags of the element at `index`; holes report `None`.
    pub fn index_query(&self, index: usize) -> Option<PropertyAttributes> {
        let data = lock(&self.inner);
        match data.elements.get(index) {
            Some(Value::Null) | None => None,
            Some(_) => Some(PropertyAttributes::DATA),
        }
    }

    /// The occupied element indexes, in ascending order.
    pub fn index_keys(&self) -> Vec<usize> {
        lock(&self.inner)
            .elements
            .iter()
            .enumerate()
            .filter(|(_, value)| !matches!(value, Value::Null))
            .map(|(index, _)| index)
            .collect()
    }
}

impl Default for Object {
    fn default() -> Object {
        Object::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:p})", Arc::as_ptr(&self.inner))
    }
}

fn builtin(data: &ObjectData, property: &str) -> Option<Value> {
    let primitive = data.primitive.as_ref()?;
    match property {
        "length" => match primitive {
            Value::Str(s) => Some(Value::Int(s.chars().count() as i64)),
            _ => None,
        },
        "valueOf" => {
            let primitive = primitive.clone();
            Some(Value::Object(Object::callable(Arc::new(move |_, _| {
                Ok(primitive.clone())
            }))))
        }
        _ => None,
    }
}
