#![forbid(unsafe_code)]

//! The public entry points: observe a path, bind two paths, notify, dispose.
//!
//! # Path walk
//!
//! Observing `a.b.value` on `target` walks the path left to right. Every
//! non-terminal key is instrumented on the object currently reached, and the
//! reactor reached so far gets a *dependency* under that key, hosted on the
//! object found there. The terminal key yields the [`Observer`] listeners are
//! attached to. Because listeners hang off the dependency chain rather than
//! off concrete objects, replacing `target.a` or `target.a.b` later re-targets
//! them without walking the path again.
//!
//! # Resolution
//!
//! [`Resolution::Strict`] requires every key to exist (or be declared) on an
//! object; a missing key or a non-object intermediate fails with
//! [`ReactiveError::KeyNotFound`] naming the key that could not be read.
//! [`Resolution::Loose`] accepts both, yields `Undefined`, and goes live as
//! soon as the chain can be resolved.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use surface_reactive::{Object, ObserveOptions, Reactive, Value};
//!
//! let target = Object::from_json(serde_json::json!({ "a": { "b": { "value": 0 } } }));
//! let seen = Rc::new(RefCell::new(Value::Undefined));
//! let s = Rc::clone(&seen);
//!
//! Reactive::observe_with(
//!     &target,
//!     "a.b.value",
//!     move |v: &Value| *s.borrow_mut() = v.clone(),
//!     ObserveOptions::default(),
//! )?;
//! assert_eq!(*seen.borrow(), Value::from(0));
//!
//! target.get("a").as_object().unwrap().set("b", Object::from_entries([("value", 2)]))?;
//! assert_eq!(*seen.borrow(), Value::from(2));
//! # Ok::<(), surface_reactive::ReactiveError>(())
//! ```

use std::rc::Rc;

use tracing::debug;

use crate::error::{ReactiveError, Result};
use crate::key::{IntoKeyPath, KeyPath, PropertyKey};
use crate::listener::{Listener, PropertyListener};
use crate::metadata::Metadata;
use crate::observer::Observer;
use crate::reactor::Reactor;
use crate::subscription::{ListenerSubscription, PropertySubscription};
use crate::value::{Object, Value};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How a path walk treats missing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Missing keys and non-object intermediates are errors.
    #[default]
    Strict,
    /// Missing keys resolve to `Undefined` until they appear.
    Loose,
}

/// Per-call options of [`Reactive::observe_with`].
///
/// The default is eager (the listener is called once immediately) and
/// strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObserveOptions {
    lazy: bool,
    resolution: Resolution,
}

impl ObserveOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lazy: false,
            resolution: Resolution::Strict,
        }
    }

    /// Skip the initial listener call.
    #[must_use]
    pub const fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Call the listener once with the current value (default).
    #[must_use]
    pub const fn eager(mut self) -> Self {
        self.lazy = false;
        self
    }

    #[must_use]
    pub const fn loose(mut self) -> Self {
        self.resolution = Resolution::Loose;
        self
    }

    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.resolution = Resolution::Strict;
        self
    }

    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.lazy
    }

    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// What an observe call wired up.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Reactor owning the terminal observer.
    pub reactor: Reactor,
    /// Observer of the terminal key.
    pub observer: Observer,
    /// The listener's subscription, when one was supplied.
    pub subscription: Option<ListenerSubscription>,
}

// ---------------------------------------------------------------------------
// Reactive
// ---------------------------------------------------------------------------

/// Facade over the reactor graph.
#[derive(Debug, Clone, Copy)]
pub struct Reactive;

impl Reactive {
    /// Wire `path` on `target` strictly, without a listener.
    pub fn observe(target: &Object, path: impl IntoKeyPath) -> Result<Observation> {
        let path = path.into_key_path()?;
        let (reactor, observer) = observe_path(target, &path, Resolution::Strict)?;
        Metadata::ensure(target);
        Ok(Observation {
            reactor,
            observer,
            subscription: None,
        })
    }

    /// Wire `path` on `target` and subscribe `listener` to its terminal key.
    ///
    /// Unless `options` is lazy, the listener is called once right away with
    /// the current value of the path.
    pub fn observe_with(
        target: &Object,
        path: impl IntoKeyPath,
        listener: impl Listener + 'static,
        options: ObserveOptions,
    ) -> Result<Observation> {
        Self::observe_shared(target, path, Rc::new(listener), options)
    }

    /// Same as [`observe_with`](Self::observe_with) for a listener the caller
    /// keeps a handle to.
    pub fn observe_shared(
        target: &Object,
        path: impl IntoKeyPath,
        listener: Rc<dyn Listener>,
        options: ObserveOptions,
    ) -> Result<Observation> {
        let path = path.into_key_path()?;
        let (reactor, observer) = observe_path(target, &path, options.resolution())?;
        let subscription = observer.subscribe(Rc::clone(&listener));
        Metadata::ensure(target);

        if !options.is_lazy() {
            listener.notify(&resolve_keys(target, path.iter()))?;
        }

        Ok(Observation {
            reactor,
            observer,
            subscription: Some(subscription),
        })
    }

    /// Bind `left_path` on `left` and `right_path` on `right` to each other.
    ///
    /// Both paths are resolved strictly. Right is set to left's current value
    /// first. The returned subscriptions tear down the left-to-right and the
    /// right-to-left direction respectively.
    pub fn observe_two_way(
        left: &Object,
        left_path: impl IntoKeyPath,
        right: &Object,
        right_path: impl IntoKeyPath,
    ) -> Result<(PropertySubscription, PropertySubscription)> {
        let left_path = left_path.into_key_path()?;
        let right_path = right_path.into_key_path()?;
        check_strict(left, &left_path)?;
        check_strict(right, &right_path)?;

        let (left_reactor, left_observer) = observe_path(left, &left_path, Resolution::Strict)?;
        let (right_reactor, right_observer) =
            observe_path(right, &right_path, Resolution::Strict)?;
        Metadata::ensure(left);
        Metadata::ensure(right);

        let left_key = left_path.terminal();
        let right_key = right_path.terminal();
        let left_container = resolve_keys(left, left_path.parents());
        let right_container = resolve_keys(right, right_path.parents());

        let to_right = Rc::new(PropertyListener::new(
            right_container.as_object(),
            right_key.clone(),
        ));
        let to_left = Rc::new(PropertyListener::new(
            left_container.as_object(),
            left_key.clone(),
        ));

        let left_subscription = PropertySubscription::new(Rc::clone(&to_right), left_observer);
        let right_subscription = PropertySubscription::new(Rc::clone(&to_left), right_observer);

        // Each writer follows the container on its own side.
        right_reactor.add_subscription(right_key, &left_subscription);
        left_reactor.add_subscription(left_key, &right_subscription);

        to_right.notify(&resolve_keys(left, left_path.iter()))?;

        debug!(
            left = %left_path,
            right = %right_path,
            "two-way binding established"
        );
        Ok((left_subscription, right_subscription))
    }

    /// Propagate a change of `target[key]` that bypassed [`Object::set`].
    pub fn notify(target: &Object, key: impl Into<PropertyKey>) -> Result<()> {
        let reactor = target.reactor().ok_or(ReactiveError::NotReactive)?;
        reactor.notify(target, &key.into())
    }

    /// Tear down `target`'s reactive state.
    ///
    /// Metadata disposables run newest first, then the reactor is disposed
    /// and removed from the object. The first disposable failure is returned
    /// after teardown completes.
    pub fn dispose(target: &Object) -> Result<()> {
        let result = match target.take_metadata() {
            Some(metadata) => metadata.dispose(),
            None => Ok(()),
        };
        if let Some(reactor) = target.take_reactor() {
            debug!(object = ?target.id(), reactor = %reactor.id(), "reactive state disposed");
            reactor.dispose();
        }
        result
    }

    /// The reactor attached to `target`, if it has been observed.
    #[must_use]
    pub fn get_reactor(target: &Object) -> Option<Reactor> {
        target.reactor()
    }

    /// Loose lookup of `path` on `target`.
    pub fn resolve(target: &Object, path: impl IntoKeyPath) -> Result<Value> {
        let path = path.into_key_path()?;
        Ok(resolve_keys(target, path.iter()))
    }
}

// ---------------------------------------------------------------------------
// Path walk
// ---------------------------------------------------------------------------

fn resolve_keys<'a>(target: &Object, keys: impl IntoIterator<Item = &'a PropertyKey>) -> Value {
    keys.into_iter()
        .fold(Value::Object(target.clone()), |value, key| {
            value.get(key.as_str())
        })
}

fn instrument(current: &Value, key: &PropertyKey, resolution: Resolution) -> Result<()> {
    match (current, resolution) {
        (Value::Object(object), Resolution::Strict) => {
            Reactor::make_reactive(object, key).map(drop)
        }
        (Value::Object(object), Resolution::Loose) => {
            Reactor::get_or_attach(object).track(key);
            Ok(())
        }
        (other, Resolution::Strict) => Err(ReactiveError::key_not_found(
            key.as_str(),
            other.type_name(),
        )),
        (_, Resolution::Loose) => Ok(()),
    }
}

/// Walk `path` without wiring anything, failing on the first key a strict
/// observation could not instrument.
fn check_strict(target: &Object, path: &KeyPath) -> Result<()> {
    let mut current = Value::Object(target.clone());
    for key in path.iter() {
        match &current {
            Value::Object(object) if object.has(key.as_str()) || object.declares(key.as_str()) => {}
            other => {
                return Err(ReactiveError::key_not_found(key.as_str(), other.type_name()));
            }
        }
        current = current.get(key.as_str());
    }
    Ok(())
}

/// Wire `path` on `target`, returning the reactor that owns the terminal key
/// and its observer. A strict path that does not resolve leaves the graph
/// untouched.
pub(crate) fn observe_path(
    target: &Object,
    path: &KeyPath,
    resolution: Resolution,
) -> Result<(Reactor, Observer)> {
    if resolution == Resolution::Strict {
        check_strict(target, path)?;
    }
    let mut current = Value::Object(target.clone());
    let mut reactor = Reactor::get_or_attach(target);

    for key in path.parents() {
        instrument(&current, key, resolution)?;
        let value = current.get(key.as_str());
        let dependency = reactor.dependency(key);
        dependency.rehost(&value);
        current = value;
        reactor = dependency;
    }

    let terminal = path.terminal();
    instrument(&current, terminal, resolution)?;
    let observer = reactor.observer(terminal);
    Ok((reactor, observer))
}
