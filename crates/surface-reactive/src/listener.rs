#![forbid(unsafe_code)]

//! Listeners: the receiving end of an [`Observer`](crate::Observer).
//!
//! Any `Fn(&Value)` closure is a listener. Fallible callbacks are wrapped in
//! [`TryListener`]; [`PropertyListener`] writes every value it receives into a
//! property of another object and is the building block of two-way binding.

use std::cell::RefCell;
use std::fmt;

use crate::error::Result;
use crate::key::PropertyKey;
use crate::value::{Object, Value, WeakObject};

/// Callback invoked with the new value of an observed slot.
///
/// An error aborts the notification it was raised in and propagates to the
/// code that performed the write.
pub trait Listener {
    fn notify(&self, value: &Value) -> Result<()>;
}

impl<F> Listener for F
where
    F: Fn(&Value),
{
    fn notify(&self, value: &Value) -> Result<()> {
        self(value);
        Ok(())
    }
}

/// Adapter for closures that can fail.
///
/// ```
/// use surface_reactive::{ReactiveError, TryListener, Value};
/// use surface_reactive::Listener;
///
/// let guard = TryListener(|v: &Value| match v.as_f64() {
///     Some(n) if n < 0.0 => Err(ReactiveError::listener("negative")),
///     _ => Ok(()),
/// });
/// assert!(guard.notify(&Value::from(1)).is_ok());
/// assert!(guard.notify(&Value::from(-1)).is_err());
/// ```
pub struct TryListener<F>(pub F);

impl<F> Listener for TryListener<F>
where
    F: Fn(&Value) -> Result<()>,
{
    fn notify(&self, value: &Value) -> Result<()> {
        (self.0)(value)
    }
}

impl<F> fmt::Debug for TryListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryListener").finish_non_exhaustive()
    }
}

/// Writes received values into `target[key]`.
///
/// The target is held weakly and may be absent; in both cases notifications
/// are dropped silently. [`update`](Self::update) repoints the listener when
/// the object owning the bound property is replaced.
pub struct PropertyListener {
    target: RefCell<Option<WeakObject>>,
    key: PropertyKey,
}

impl PropertyListener {
    #[must_use]
    pub fn new(target: Option<&Object>, key: impl Into<PropertyKey>) -> Self {
        Self {
            target: RefCell::new(target.map(Object::downgrade)),
            key: key.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The current target, if it is set and still alive.
    #[must_use]
    pub fn target(&self) -> Option<Object> {
        self.target.borrow().as_ref().and_then(WeakObject::upgrade)
    }

    /// Repoint the listener at `target`.
    pub fn update(&self, target: Option<&Object>) {
        *self.target.borrow_mut() = target.map(Object::downgrade);
    }
}

impl Listener for PropertyListener {
    fn notify(&self, value: &Value) -> Result<()> {
        match self.target() {
            Some(target) => target.set(self.key.clone(), value.clone()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for PropertyListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyListener")
            .field("key", &self.key)
            .field("target", &self.target().map(|t| t.id()))
            .finish()
    }
}
