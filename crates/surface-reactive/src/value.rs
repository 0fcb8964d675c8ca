#![forbid(unsafe_code)]

//! Dynamic object model observed by the reactive engine.
//!
//! [`Value`] is the unit of data flowing through observers. Composite data
//! lives in [`Object`]s: shared, identity-bearing handles to either a record
//! (named properties) or an array (positional values plus `length`).
//!
//! # Write interception
//!
//! There is exactly one write path, [`Object::set`] (and the array mutators
//! built on the same machinery). A write compares old and new values with
//! [`Value::same`], stores the new value only on change, and then notifies the
//! object's [`Reactor`] if the key is tracked. Keys become tracked when a
//! binding instruments them through [`Reactor::make_reactive`] or when a path
//! reactor is registered on the object.
//!
//! # Hidden slot
//!
//! Every object carries its own `Reactor` and `Metadata` (both optional).
//! Their lifetime is the object's lifetime: nothing else owns them strongly
//! except short-lived handles returned to callers.
//!
//! # Invariants
//!
//! 1. Setting a value identical (per [`Value::same`]) to the current one is a
//!    no-op: nothing is stored and nobody is notified.
//! 2. No `RefCell` borrow of an object is held while getters, setters or
//!    listeners run.
//! 3. Array notifications are positional: after a mutation every tracked index
//!    whose value changed is notified in ascending order, then `length`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};

use crate::error::{ReactiveError, Result};
use crate::key::{PropertyKey, parse_index};
use crate::metadata::Metadata;
use crate::reactor::Reactor;

/// Getter of an accessor property.
pub type Getter = Rc<dyn Fn(&Object) -> Value>;

/// Setter of an accessor property.
pub type Setter = Rc<dyn Fn(&Object, Value) -> Result<()>>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
}

impl Value {
    /// Identity comparison with `Object.is` semantics: `NaN` equals `NaN`,
    /// `+0` and `-0` differ, objects compare by pointer.
    #[must_use]
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => {
                (x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits()
            }
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    /// Resolve `key` on this value. Non-objects yield `Undefined`, except the
    /// `length` of a string.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(object) => object.get(key),
            Value::String(s) if key == "length" => Value::Number(s.chars().count() as f64),
            _ => Value::Undefined,
        }
    }

    /// The object behind this value, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Name of the value's type as shown in error messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(_) => "boolean".to_owned(),
            Value::Number(_) => "number".to_owned(),
            Value::String(_) => "string".to_owned(),
            Value::Object(object) => object.type_name(),
        }
    }

    /// Snapshot as JSON. `Undefined` and non-finite numbers become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut ancestors = AHashSet::new();
        self.to_json_guarded(&mut ancestors)
    }

    fn deep_copy_with(&self, copies: &mut AHashMap<ObjectId, Object>) -> Value {
        match self {
            Value::Object(object) => Value::Object(object.deep_copy_with(copies)),
            other => other.clone(),
        }
    }

    fn to_json_guarded(&self, ancestors: &mut AHashSet<ObjectId>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(object) => object.to_json_guarded(ancestors),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Value::same(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(object) => fmt::Debug::fmt(object, f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<&Object> for Value {
    fn from(value: &Object) -> Self {
        Value::Object(value.clone())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Object::array(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => {
                Value::Object(Object::from_entries(map.into_iter().map(|(k, v)| (k, Value::from(v)))))
            }
        }
    }
}

/// Getter plus optional setter backing an accessor property.
#[derive(Clone)]
pub struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

impl Accessor {
    /// A read-only accessor.
    pub fn getter(get: impl Fn(&Object) -> Value + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: None,
        }
    }

    /// Attach a setter.
    #[must_use]
    pub fn with_setter(mut self, set: impl Fn(&Object, Value) -> Result<()> + 'static) -> Self {
        self.set = Some(Rc::new(set));
        self
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

#[derive(Clone)]
enum Property {
    Data(Value),
    Accessor(Accessor),
}

enum Slots {
    Record(BTreeMap<PropertyKey, Property>),
    List(Vec<Value>),
}

struct ObjectData {
    class: Option<Rc<str>>,
    slots: Slots,
    declared: AHashSet<PropertyKey>,
    reactor: Option<Reactor>,
    metadata: Option<Rc<Metadata>>,
}

/// Stable identity of an [`Object`] while it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Shared handle to a record or an array.
///
/// Cloning an `Object` creates a new handle to the **same** object.
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

/// Non-owning handle to an [`Object`].
#[derive(Clone, Default)]
pub struct WeakObject(Weak<RefCell<ObjectData>>);

impl WeakObject {
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(object) => write!(f, "WeakObject({object:?})"),
            None => f.write_str("WeakObject(<dropped>)"),
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    fn from_slots(class: Option<Rc<str>>, slots: Slots) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            class,
            slots,
            declared: AHashSet::new(),
            reactor: None,
            metadata: None,
        })))
    }

    /// An empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::from_slots(None, Slots::Record(BTreeMap::new()))
    }

    /// An empty record reporting `class` as its type name.
    #[must_use]
    pub fn with_class(class: impl AsRef<str>) -> Self {
        Self::from_slots(Some(Rc::from(class.as_ref())), Slots::Record(BTreeMap::new()))
    }

    /// A record populated from key/value pairs.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        let record = entries
            .into_iter()
            .map(|(k, v)| (k.into(), Property::Data(v.into())))
            .collect();
        Self::from_slots(None, Slots::Record(record))
    }

    /// An array holding `items`.
    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::from_slots(None, Slots::List(items.into_iter().map(Into::into).collect()))
    }

    /// Build an object graph from JSON. Non-object JSON is wrapped in a
    /// single-element array so the result is always an object.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Object(object) => object,
            other => Self::array([other]),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0) as *const () as usize)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    /// A structural copy of the graph reachable from this object.
    ///
    /// Copies keep class, properties and declared keys but carry no reactor
    /// or metadata. Accessors are shared; references that are shared or
    /// cyclic in the source are shared or cyclic in the copy.
    #[must_use]
    pub fn deep_copy(&self) -> Object {
        self.deep_copy_with(&mut AHashMap::new())
    }

    fn deep_copy_with(&self, copies: &mut AHashMap<ObjectId, Object>) -> Object {
        if let Some(copy) = copies.get(&self.id()) {
            return copy.clone();
        }
        let (class, declared, slots) = {
            let data = self.0.borrow();
            let slots = match &data.slots {
                Slots::Record(record) => Slots::Record(record.clone()),
                Slots::List(items) => Slots::List(items.clone()),
            };
            (data.class.clone(), data.declared.clone(), slots)
        };
        let empty = match &slots {
            Slots::Record(_) => Slots::Record(BTreeMap::new()),
            Slots::List(_) => Slots::List(Vec::new()),
        };
        let copy = Self::from_slots(class, empty);
        copy.0.borrow_mut().declared = declared;
        copies.insert(self.id(), copy.clone());

        let slots = match slots {
            Slots::Record(record) => Slots::Record(
                record
                    .into_iter()
                    .map(|(key, property)| {
                        let property = match property {
                            Property::Data(value) => Property::Data(value.deep_copy_with(copies)),
                            accessor @ Property::Accessor(_) => accessor,
                        };
                        (key, property)
                    })
                    .collect(),
            ),
            Slots::List(items) => {
                Slots::List(items.iter().map(|v| v.deep_copy_with(copies)).collect())
            }
        };
        copy.0.borrow_mut().slots = slots;
        copy
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().slots, Slots::List(_))
    }

    /// Class name for classed records, otherwise `Object` or `Array`.
    #[must_use]
    pub fn type_name(&self) -> String {
        let data = self.0.borrow();
        match (&data.class, &data.slots) {
            (Some(class), _) => class.to_string(),
            (None, Slots::Record(_)) => "Object".to_owned(),
            (None, Slots::List(_)) => "Array".to_owned(),
        }
    }

    /// Array length, or `None` for records.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match &self.0.borrow().slots {
            Slots::List(items) => Some(items.len()),
            Slots::Record(_) => None,
        }
    }

    /// Whether the object has no own properties (records) or no items (arrays).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0.borrow().slots {
            Slots::List(items) => items.is_empty(),
            Slots::Record(record) => record.is_empty(),
        }
    }

    /// Whether `key` is an own property (for arrays: an in-bounds index or
    /// `length`).
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        match &self.0.borrow().slots {
            Slots::Record(record) => record.contains_key(key),
            Slots::List(items) => {
                key == "length" || parse_index(key).is_some_and(|i| i < items.len())
            }
        }
    }

    /// Whether `key` was declared observable ahead of existing.
    #[must_use]
    pub fn declares(&self, key: &str) -> bool {
        self.0.borrow().declared.contains(key)
    }

    /// Declare `key` observable even while it does not exist.
    pub fn declare(&self, key: impl Into<PropertyKey>) {
        self.0.borrow_mut().declared.insert(key.into());
    }

    /// Own keys: record keys in sorted order, or array indices.
    #[must_use]
    pub fn keys(&self) -> Vec<PropertyKey> {
        match &self.0.borrow().slots {
            Slots::Record(record) => record.keys().cloned().collect(),
            Slots::List(items) => (0..items.len()).map(PropertyKey::from).collect(),
        }
    }

    /// Array items, or `None` for records.
    #[must_use]
    pub fn items(&self) -> Option<Vec<Value>> {
        match &self.0.borrow().slots {
            Slots::List(items) => Some(items.clone()),
            Slots::Record(_) => None,
        }
    }

    /// Read `key`. Missing keys yield `Undefined`; accessors run their getter.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        let getter = {
            let data = self.0.borrow();
            match &data.slots {
                Slots::List(items) => {
                    if key == "length" {
                        return Value::Number(items.len() as f64);
                    }
                    return parse_index(key)
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or_default();
                }
                Slots::Record(record) => match record.get(key) {
                    Some(Property::Data(value)) => return value.clone(),
                    Some(Property::Accessor(accessor)) => Rc::clone(&accessor.get),
                    None => return Value::Undefined,
                },
            }
        };
        getter(self)
    }

    /// Write `key`, notifying the object's reactor when the key is tracked and
    /// the value actually changed.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let existing = {
            let data = self.0.borrow();
            match &data.slots {
                Slots::List(_) => None,
                Slots::Record(record) => Some(record.get(&key).cloned()),
            }
        };

        let Some(existing) = existing else {
            return self.set_list_entry(&key, value);
        };

        match existing {
            Some(Property::Accessor(accessor)) => {
                let Some(setter) = accessor.set else {
                    return Err(ReactiveError::ReadOnly {
                        key: key.to_string(),
                    });
                };
                let before = (accessor.get)(self);
                setter(self, value)?;
                let after = (accessor.get)(self);
                if Value::same(&before, &after) {
                    return Ok(());
                }
            }
            Some(Property::Data(old)) => {
                if Value::same(&old, &value) {
                    return Ok(());
                }
                self.write_record(&key, value);
            }
            None => {
                let changed = !value.is_undefined();
                self.write_record(&key, value);
                if !changed {
                    return Ok(());
                }
            }
        }

        self.notify_tracked(&key)
    }

    /// Install an accessor property on a record.
    pub fn define_accessor(&self, key: impl Into<PropertyKey>, accessor: Accessor) -> Result<()> {
        let key = key.into();
        let mut data = self.0.borrow_mut();
        match &mut data.slots {
            Slots::Record(record) => {
                record.insert(key, Property::Accessor(accessor));
                Ok(())
            }
            Slots::List(_) => Err(ReactiveError::InvalidIndex {
                key: key.to_string(),
            }),
        }
    }

    /// Remove `key` from a record, notifying watchers with `Undefined`.
    pub fn remove(&self, key: &str) -> Result<Value> {
        let removed = {
            let mut data = self.0.borrow_mut();
            match &mut data.slots {
                Slots::Record(record) => record.remove(key),
                Slots::List(_) => {
                    return Err(ReactiveError::InvalidIndex {
                        key: key.to_owned(),
                    });
                }
            }
        };
        match removed {
            Some(Property::Data(value)) => {
                if !value.is_undefined() {
                    self.notify_tracked(&PropertyKey::from(key))?;
                }
                Ok(value)
            }
            Some(Property::Accessor(_)) => {
                self.notify_tracked(&PropertyKey::from(key))?;
                Ok(Value::Undefined)
            }
            None => Ok(Value::Undefined),
        }
    }

    // -----------------------------------------------------------------------
    // Array mutators
    // -----------------------------------------------------------------------

    /// Append `value`, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        self.mutate_list(|items| {
            items.push(value);
            items.len()
        })
    }

    /// Remove and return the last item (`Undefined` when empty).
    pub fn pop(&self) -> Result<Value> {
        self.mutate_list(|items| items.pop().unwrap_or_default())
    }

    /// Remove and return the first item (`Undefined` when empty).
    pub fn shift(&self) -> Result<Value> {
        self.mutate_list(|items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
    }

    /// Prepend `values`, returning the new length.
    pub fn unshift<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.mutate_list(|items| {
            drop(items.splice(0..0, values));
            items.len()
        })
    }

    /// Remove `delete_count` items at `start` and insert `insert` in their
    /// place. Out-of-range arguments are clamped. Returns the removed items.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        insert: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        let insert: Vec<Value> = insert.into_iter().map(Into::into).collect();
        self.mutate_list(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, insert).collect()
        })
    }

    fn set_list_entry(&self, key: &PropertyKey, value: Value) -> Result<()> {
        if key.as_str() == "length" {
            let length = value
                .as_f64()
                .filter(|n| {
                    n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX)
                })
                .ok_or_else(|| ReactiveError::InvalidIndex {
                    key: key.to_string(),
                })?;
            return self.mutate_list(|items| items.resize(length as usize, Value::Undefined));
        }
        let invalid = || ReactiveError::InvalidIndex {
            key: key.to_string(),
        };
        let index = key.as_index().ok_or_else(invalid)?;
        let min_len = index.checked_add(1).ok_or_else(invalid)?;
        self.mutate_list(|items| {
            if items.len() < min_len {
                items.resize(min_len, Value::Undefined);
            }
            items[index] = value;
        })
    }

    /// Apply `f` to the array items, then notify every tracked key whose value
    /// changed position-wise.
    fn mutate_list<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let reactor = self.reactor();
        let watched: Vec<(PropertyKey, Value)> = match &reactor {
            Some(reactor) => positional_order(reactor.tracked_keys())
                .into_iter()
                .map(|key| {
                    let value = self.get(key.as_str());
                    (key, value)
                })
                .collect(),
            None => Vec::new(),
        };

        let out = {
            let mut data = self.0.borrow_mut();
            match &mut data.slots {
                Slots::List(items) => f(items),
                Slots::Record(_) => return Err(ReactiveError::NotAnArray),
            }
        };

        if let Some(reactor) = reactor {
            for (key, before) in watched {
                let after = self.get(key.as_str());
                if !Value::same(&before, &after) {
                    reactor.notify(self, &key)?;
                }
            }
        }
        Ok(out)
    }

    fn write_record(&self, key: &PropertyKey, value: Value) {
        if let Slots::Record(record) = &mut self.0.borrow_mut().slots {
            record.insert(key.clone(), Property::Data(value));
        }
    }

    fn notify_tracked(&self, key: &PropertyKey) -> Result<()> {
        match self.reactor() {
            Some(reactor) if reactor.is_tracked(key.as_str()) => reactor.notify(self, key),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Hidden slot
    // -----------------------------------------------------------------------

    pub(crate) fn reactor(&self) -> Option<Reactor> {
        self.0.borrow().reactor.clone()
    }

    pub(crate) fn set_reactor(&self, reactor: Option<Reactor>) {
        self.0.borrow_mut().reactor = reactor;
    }

    pub(crate) fn take_reactor(&self) -> Option<Reactor> {
        self.0.borrow_mut().reactor.take()
    }

    pub(crate) fn metadata(&self) -> Option<Rc<Metadata>> {
        self.0.borrow().metadata.clone()
    }

    pub(crate) fn set_metadata(&self, metadata: Option<Rc<Metadata>>) {
        self.0.borrow_mut().metadata = metadata;
    }

    pub(crate) fn take_metadata(&self) -> Option<Rc<Metadata>> {
        self.0.borrow_mut().metadata.take()
    }

    // -----------------------------------------------------------------------
    // JSON
    // -----------------------------------------------------------------------

    /// Snapshot as JSON. Accessors are evaluated; cycles become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut ancestors = AHashSet::new();
        self.to_json_guarded(&mut ancestors)
    }

    fn to_json_guarded(&self, ancestors: &mut AHashSet<ObjectId>) -> serde_json::Value {
        if !ancestors.insert(self.id()) {
            return serde_json::Value::Null;
        }
        let json = match self.items() {
            Some(items) => serde_json::Value::Array(
                items.iter().map(|v| v.to_json_guarded(ancestors)).collect(),
            ),
            None => serde_json::Value::Object(
                self.keys()
                    .into_iter()
                    .map(|key| {
                        let value = self.get(key.as_str()).to_json_guarded(ancestors);
                        (key.to_string(), value)
                    })
                    .collect(),
            ),
        };
        ancestors.remove(&self.id());
        json
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Object");
        s.field("id", &self.id());
        if let Ok(data) = self.0.try_borrow() {
            match (&data.class, &data.slots) {
                (Some(class), _) => s.field("class", class),
                (None, Slots::Record(record)) => s.field("keys", &record.len()),
                (None, Slots::List(items)) => s.field("len", &items.len()),
            };
        }
        s.finish()
    }
}

/// Indices ascending first, then named keys (`length` last among them).
fn positional_order(mut keys: Vec<PropertyKey>) -> Vec<PropertyKey> {
    keys.sort_by(|a, b| match (a.as_index(), b.as_index()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    keys
}
