#![forbid(unsafe_code)]

//! Reactor: the structural node of the dependency graph.
//!
//! # Design
//!
//! Two kinds of reactor share one type:
//!
//! - **Object reactors** live in the hidden slot of an observed [`Object`].
//!   They track which keys of that object are instrumented and are the entry
//!   point of every notification: [`Object::set`] calls
//!   [`notify`](Reactor::notify) on them.
//! - **Path reactors** are the *dependencies* of another reactor: the reactor
//!   stored under key `k` in `parent.dependencies` stands for "whatever object
//!   currently sits at `parent[k]`". A path reactor is *registered* on the
//!   object reactor of that object (its host), which lists it among its
//!   registries and forwards every notification to it.
//!
//! Replacing the object at `parent[k]` re-hosts the path reactor: it is
//! unregistered from the old object (so the detached object stops reaching
//! its listeners), registered on the new one (instrumenting whatever keys the
//! path watches), and notified with the new object as a whole value. Because
//! listeners sit on the path reactor's observers, they survive the swap.
//!
//! One object reachable through several containers simply hosts several path
//! reactors.
//!
//! # Invariants
//!
//! 1. A path reactor has at most one host; its host lists it exactly once.
//! 2. Tracking a key twice is a no-op.
//! 3. Registries are held weakly and pruned lazily; the strong owner of a
//!    path reactor is its parent's `dependencies` map.
//! 4. An identical `(reactor, key)` notification frame is never re-entered
//!    while it is on the stack.
//! 5. No `RefCell` borrow is held while listeners run.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use tracing::trace;

use crate::error::{ReactiveError, Result};
use crate::key::PropertyKey;
use crate::listener::PropertyListener;
use crate::observer::Observer;
use crate::subscription::PropertySubscription;
use crate::value::{Object, Value};

// ─── Reactor ID generation ───────────────────────────────────────────────────

static NEXT_REACTOR_ID: AtomicU64 = AtomicU64::new(1);

fn next_reactor_id() -> ReactorId {
    ReactorId(NEXT_REACTOR_ID.fetch_add(1, Ordering::Relaxed))
}

/// Process-unique reactor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactorId(u64);

impl ReactorId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

// ─── Re-entrancy stack ───────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
struct Frame {
    reactor: ReactorId,
    /// `None` for whole-value notifications.
    key: Option<PropertyKey>,
}

thread_local! {
    static NOTIFY_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pops its frame on drop, so early returns through `?` keep the stack sound.
struct NotifyGuard;

impl NotifyGuard {
    fn enter(reactor: ReactorId, key: Option<&PropertyKey>) -> Option<Self> {
        let frame = Frame {
            reactor,
            key: key.cloned(),
        };
        NOTIFY_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&frame) {
                None
            } else {
                stack.push(frame);
                Some(NotifyGuard)
            }
        })
    }
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        NOTIFY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Depth of the notification stack on this thread.
#[must_use]
pub fn notify_depth() -> usize {
    NOTIFY_STACK.with(|stack| stack.borrow().len())
}

// ─── Reactor ─────────────────────────────────────────────────────────────────

struct ReactorInner {
    id: ReactorId,
    observers: BTreeMap<PropertyKey, Observer>,
    dependencies: BTreeMap<PropertyKey, Reactor>,
    subscriptions: BTreeMap<PropertyKey, Vec<PropertySubscription>>,
    registries: Vec<WeakReactor>,
    tracked_keys: AHashSet<PropertyKey>,
    host: Option<WeakReactor>,
}

impl ReactorInner {
    /// Every key this reactor needs instrumented on the object hosting it.
    fn watched_keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = self
            .observers
            .keys()
            .chain(self.dependencies.keys())
            .chain(self.subscriptions.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn live_registries(&mut self) -> Vec<Reactor> {
        self.registries.retain(WeakReactor::is_alive);
        self.registries.iter().filter_map(WeakReactor::upgrade).collect()
    }
}

/// Graph node attached to one object instance (or standing for one path
/// continuation). Cloning creates a new handle to the **same** node.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<RefCell<ReactorInner>>,
}

#[derive(Clone)]
struct WeakReactor(Weak<RefCell<ReactorInner>>);

impl WeakReactor {
    fn upgrade(&self) -> Option<Reactor> {
        self.0.upgrade().map(|inner| Reactor { inner })
    }

    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    fn points_to(&self, reactor: &Reactor) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&reactor.inner))
    }
}

impl Reactor {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ReactorInner {
                id: next_reactor_id(),
                observers: BTreeMap::new(),
                dependencies: BTreeMap::new(),
                subscriptions: BTreeMap::new(),
                registries: Vec::new(),
                tracked_keys: AHashSet::new(),
                host: None,
            })),
        }
    }

    fn downgrade(&self) -> WeakReactor {
        WeakReactor(Rc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn id(&self) -> ReactorId {
        self.inner.borrow().id
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Reactor) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The reactor attached to `target`, if any.
    #[must_use]
    pub fn of(target: &Object) -> Option<Reactor> {
        target.reactor()
    }

    /// The reactor attached to `target`, attaching a fresh one if needed.
    pub(crate) fn get_or_attach(target: &Object) -> Reactor {
        if let Some(reactor) = target.reactor() {
            return reactor;
        }
        let reactor = Reactor::new();
        trace!(reactor = %reactor.id(), object = ?target.id(), "reactor attached");
        target.set_reactor(Some(reactor.clone()));
        reactor
    }

    /// Instrument `target[key]` so writes notify, returning `target`'s reactor.
    ///
    /// Fails when `key` neither exists on `target` nor was declared on it.
    pub fn make_reactive(target: &Object, key: &PropertyKey) -> Result<Reactor> {
        if !target.has(key.as_str()) && !target.declares(key.as_str()) {
            return Err(ReactiveError::key_not_found(key.as_str(), target.type_name()));
        }
        let reactor = Self::get_or_attach(target);
        reactor.track(key);
        Ok(reactor)
    }

    pub(crate) fn track(&self, key: &PropertyKey) {
        self.inner.borrow_mut().tracked_keys.insert(key.clone());
    }

    #[must_use]
    pub fn is_tracked(&self, key: &str) -> bool {
        self.inner.borrow().tracked_keys.contains(key)
    }

    #[must_use]
    pub fn tracked_keys(&self) -> Vec<PropertyKey> {
        self.inner.borrow().tracked_keys.iter().cloned().collect()
    }

    /// Observer for `key`, created on first request.
    #[must_use]
    pub fn observer(&self, key: &PropertyKey) -> Observer {
        self.inner
            .borrow_mut()
            .observers
            .entry(key.clone())
            .or_default()
            .clone()
    }

    #[must_use]
    pub fn get_observer(&self, key: &str) -> Option<Observer> {
        self.inner.borrow().observers.get(key).cloned()
    }

    /// Keys with an observer, in key order.
    #[must_use]
    pub fn observed_keys(&self) -> Vec<PropertyKey> {
        self.inner.borrow().observers.keys().cloned().collect()
    }

    /// Dependency (path reactor) under `key`, created on first request.
    #[must_use]
    pub fn dependency(&self, key: &PropertyKey) -> Reactor {
        self.inner
            .borrow_mut()
            .dependencies
            .entry(key.clone())
            .or_insert_with(Reactor::new)
            .clone()
    }

    #[must_use]
    pub fn get_dependency(&self, key: &str) -> Option<Reactor> {
        self.inner.borrow().dependencies.get(key).cloned()
    }

    #[must_use]
    pub fn dependency_keys(&self) -> Vec<PropertyKey> {
        self.inner.borrow().dependencies.keys().cloned().collect()
    }

    /// Number of live path reactors registered on this reactor.
    #[must_use]
    pub fn registry_count(&self) -> usize {
        self.inner.borrow_mut().live_registries().len()
    }

    /// The object reactor currently hosting this path reactor.
    #[must_use]
    pub fn host(&self) -> Option<Reactor> {
        self.inner.borrow().host.as_ref().and_then(WeakReactor::upgrade)
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.borrow().subscriptions.values().map(Vec::len).sum()
    }

    /// Keep `subscription`'s listener pointed at whichever object owns `key`.
    /// The entry is removed again when the subscription is unsubscribed.
    pub(crate) fn add_subscription(&self, key: &PropertyKey, subscription: &PropertySubscription) {
        self.inner
            .borrow_mut()
            .subscriptions
            .entry(key.clone())
            .or_default()
            .push(subscription.clone());

        let reactor = self.downgrade();
        let key = key.clone();
        let listener = Rc::clone(subscription.listener());
        subscription.on_unsubscribe(move || {
            if let Some(reactor) = reactor.upgrade() {
                reactor.remove_subscription(&key, &listener);
            }
        });
    }

    fn remove_subscription(&self, key: &PropertyKey, listener: &Rc<PropertyListener>) {
        let mut inner = self.inner.borrow_mut();
        if let Some(subscriptions) = inner.subscriptions.get_mut(key) {
            subscriptions.retain(|s| !Rc::ptr_eq(s.listener(), listener));
            if subscriptions.is_empty() {
                inner.subscriptions.remove(key);
            }
        }
    }

    fn has_registry(&self, registry: &Reactor) -> bool {
        self.inner
            .borrow()
            .registries
            .iter()
            .any(|w| w.points_to(registry))
    }

    // ── Graph maintenance ───────────────────────────────────────────────────

    /// Register the path reactor `registry` on this reactor, which must be the
    /// reactor of `target`.
    ///
    /// Every key the registry watches becomes tracked on `target`, and nested
    /// dependencies are registered on the objects found under their keys.
    pub(crate) fn register(&self, target: &Object, registry: &Reactor) {
        let (keys, nested) = {
            let inner = registry.inner.borrow();
            let nested: Vec<(PropertyKey, Reactor)> = inner
                .dependencies
                .iter()
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect();
            (inner.watched_keys(), nested)
        };

        {
            let mut inner = self.inner.borrow_mut();
            inner.tracked_keys.extend(keys);
            inner.registries.retain(WeakReactor::is_alive);
            if !inner.registries.iter().any(|w| w.points_to(registry)) {
                inner.registries.push(registry.downgrade());
            }
        }
        registry.inner.borrow_mut().host = Some(self.downgrade());
        trace!(host = %self.id(), registry = %registry.id(), "registry attached");

        for (key, dependency) in nested {
            if let Value::Object(child) = target.get(key.as_str()) {
                Reactor::get_or_attach(&child).register(&child, &dependency);
            }
        }
    }

    /// Remove `registry` from this reactor and detach its whole nested subtree
    /// from the objects hosting it.
    pub(crate) fn unregister(&self, registry: &Reactor) {
        self.inner
            .borrow_mut()
            .registries
            .retain(|w| w.is_alive() && !w.points_to(registry));
        let nested: Vec<Reactor> = {
            let mut inner = registry.inner.borrow_mut();
            inner.host = None;
            inner.dependencies.values().cloned().collect()
        };
        trace!(host = %self.id(), registry = %registry.id(), "registry detached");
        for dependency in nested {
            dependency.detach();
        }
    }

    /// Detach this path reactor (and its subtree) from its host.
    pub(crate) fn detach(&self) {
        match self.host() {
            Some(host) => host.unregister(self),
            None => {
                let nested: Vec<Reactor> = {
                    let mut inner = self.inner.borrow_mut();
                    inner.host = None;
                    inner.dependencies.values().cloned().collect()
                };
                for dependency in nested {
                    dependency.detach();
                }
            }
        }
    }

    /// Host this path reactor on `value` if it is an object, detaching it from
    /// any previous host first. Re-hosting on the current host is a no-op.
    pub(crate) fn rehost(&self, value: &Value) {
        if let Value::Object(object) = value {
            if let (Some(current), Some(host)) = (object.reactor(), self.host()) {
                if current.ptr_eq(&host) {
                    return;
                }
            }
            self.detach();
            Reactor::get_or_attach(object).register(object, self);
        } else {
            self.detach();
        }
    }

    /// Re-route the dependency under a key whose value was replaced.
    fn update(&self, dependency: &Reactor, value: &Value) -> Result<()> {
        trace!(reactor = %self.id(), dependency = %dependency.id(), "dependency re-routed");
        dependency.rehost(value);
        dependency.notify_value(value)
    }

    // ── Notification ────────────────────────────────────────────────────────

    /// Propagate a change of `target[key]`.
    ///
    /// In order: subscriptions under `key` are repointed at `target`; the
    /// dependency under `key` (if any) is re-routed to the new value; every
    /// registry is notified with the same `(target, key)`; finally the
    /// observer for `key` fires with the current value.
    pub fn notify(&self, target: &Object, key: &PropertyKey) -> Result<()> {
        let Some(_guard) = NotifyGuard::enter(self.id(), Some(key)) else {
            trace!(reactor = %self.id(), %key, "re-entrant notify skipped");
            return Ok(());
        };

        let value = target.get(key.as_str());
        let (subscriptions, dependency, registries, observer) = {
            let mut inner = self.inner.borrow_mut();
            (
                inner.subscriptions.get(key).cloned().unwrap_or_default(),
                inner.dependencies.get(key).cloned(),
                inner.live_registries(),
                inner.observers.get(key).cloned(),
            )
        };

        for subscription in &subscriptions {
            subscription.update(Some(target));
        }

        if let Some(dependency) = dependency {
            self.update(&dependency, &value)?;
        }

        for registry in registries {
            // A dependency update above may have moved this registry elsewhere.
            if self.has_registry(&registry) {
                registry.notify(target, key)?;
            }
        }

        if let Some(observer) = observer {
            observer.notify(&value)?;
        }
        Ok(())
    }

    /// Propagate the replacement of the whole object this reactor stands for.
    ///
    /// Registries are notified first. For an object value every subscription
    /// is repointed at it, every observer fires with the matching property and
    /// every dependency is notified with its sub-value; anything else reaches
    /// observers and dependencies as `Undefined`.
    pub fn notify_value(&self, value: &Value) -> Result<()> {
        let Some(_guard) = NotifyGuard::enter(self.id(), None) else {
            trace!(reactor = %self.id(), "re-entrant value notify skipped");
            return Ok(());
        };

        let (registries, subscriptions, observers, dependencies) = {
            let mut inner = self.inner.borrow_mut();
            let registries = inner.live_registries();
            let subscriptions: Vec<PropertySubscription> =
                inner.subscriptions.values().flatten().cloned().collect();
            let observers: Vec<(PropertyKey, Observer)> = inner
                .observers
                .iter()
                .map(|(k, o)| (k.clone(), o.clone()))
                .collect();
            let dependencies: Vec<(PropertyKey, Reactor)> = inner
                .dependencies
                .iter()
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect();
            (registries, subscriptions, observers, dependencies)
        };

        for registry in registries {
            registry.notify_value(value)?;
        }

        let owner = value.as_object();
        for subscription in &subscriptions {
            subscription.update(owner);
        }

        for (key, observer) in observers {
            observer.notify(&value.get(key.as_str()))?;
        }

        for (key, dependency) in dependencies {
            dependency.notify_value(&value.get(key.as_str()))?;
        }
        Ok(())
    }

    /// Tear down this reactor: observers, subscriptions and tracked keys are
    /// dropped, dependency subtrees detached, and path reactors hosted here
    /// orphaned.
    pub(crate) fn dispose(&self) {
        let (dependencies, registries) = {
            let mut inner = self.inner.borrow_mut();
            inner.observers.clear();
            inner.subscriptions.clear();
            inner.tracked_keys.clear();
            let registries = inner.live_registries();
            inner.registries.clear();
            (std::mem::take(&mut inner.dependencies), registries)
        };
        for dependency in dependencies.values() {
            dependency.detach();
        }
        for registry in registries {
            registry.inner.borrow_mut().host = None;
        }
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Reactor")
                .field("id", &inner.id)
                .field("observers", &inner.observers.keys().collect::<Vec<_>>())
                .field("dependencies", &inner.dependencies.keys().collect::<Vec<_>>())
                .field("registries", &inner.registries.len())
                .field("hosted", &inner.host.is_some())
                .finish(),
            Err(_) => f.debug_struct("Reactor").finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, impl Fn(&Value) + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, move |_: &Value| c.set(c.get() + 1))
    }

    #[test]
    fn make_reactive_requires_existing_key() {
        let object = Object::new();
        let err = Reactor::make_reactive(&object, &PropertyKey::from("nope")).unwrap_err();
        assert_eq!(err, ReactiveError::key_not_found("nope", "Object"));
        assert!(Reactor::of(&object).is_none());
    }

    #[test]
    fn make_reactive_accepts_declared_keys() {
        let object = Object::new();
        object.declare("later");
        let reactor = Reactor::make_reactive(&object, &PropertyKey::from("later")).unwrap();
        assert!(reactor.is_tracked("later"));
    }

    #[test]
    fn make_reactive_is_idempotent() {
        let object = Object::from_entries([("value", 1)]);
        let key = PropertyKey::from("value");
        let first = Reactor::make_reactive(&object, &key).unwrap();
        let second = Reactor::make_reactive(&object, &key).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.tracked_keys(), vec![key]);
    }

    #[test]
    fn same_value_write_notifies_once() {
        let object = Object::from_entries([("value", 0)]);
        let key = PropertyKey::from("value");
        let reactor = Reactor::make_reactive(&object, &key).unwrap();
        let (count, listener) = counter();
        let _sub = reactor.observer(&key).subscribe(Rc::new(listener));

        object.set("value", 1).unwrap();
        object.set("value", 1).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn untracked_keys_do_not_notify() {
        let object = Object::from_entries([("a", 0), ("b", 0)]);
        let reactor = Reactor::make_reactive(&object, &PropertyKey::from("a")).unwrap();
        let (count, listener) = counter();
        let _sub = reactor.observer(&PropertyKey::from("b")).subscribe(Rc::new(listener));

        object.set("b", 1).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn register_tracks_watched_keys_and_links_host() {
        let object = Object::from_entries([("x", 1)]);
        let host = Reactor::get_or_attach(&object);
        let path = Reactor::new();
        let _ = path.observer(&PropertyKey::from("x"));

        host.register(&object, &path);
        assert!(host.is_tracked("x"));
        assert_eq!(host.registry_count(), 1);
        assert!(path.host().unwrap().ptr_eq(&host));

        // Registering twice keeps one backlink.
        host.register(&object, &path);
        assert_eq!(host.registry_count(), 1);

        path.detach();
        assert_eq!(host.registry_count(), 0);
        assert!(path.host().is_none());
    }

    #[test]
    fn registries_are_weak() {
        let object = Object::from_entries([("x", 1)]);
        let host = Reactor::get_or_attach(&object);
        {
            let path = Reactor::new();
            host.register(&object, &path);
            assert_eq!(host.registry_count(), 1);
        }
        assert_eq!(host.registry_count(), 0);
    }

    #[test]
    fn notify_value_fans_out_sub_values() {
        let path = Reactor::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = path
            .observer(&PropertyKey::from("value"))
            .subscribe(Rc::new(move |v: &Value| s.borrow_mut().push(v.clone())));

        path.notify_value(&Value::Object(Object::from_entries([("value", 7)])))
            .unwrap();
        path.notify_value(&Value::Null).unwrap();

        assert_eq!(*seen.borrow(), vec![Value::from(7), Value::Undefined]);
    }

    #[test]
    fn guard_blocks_identical_frames_only() {
        let key = PropertyKey::from("a");
        let other = PropertyKey::from("b");
        let id = next_reactor_id();

        let outer = NotifyGuard::enter(id, Some(&key));
        assert!(outer.is_some());
        assert!(NotifyGuard::enter(id, Some(&key)).is_none());
        {
            let inner = NotifyGuard::enter(id, Some(&other));
            assert!(inner.is_some());
            assert_eq!(notify_depth(), 2);
        }
        assert_eq!(notify_depth(), 1);
        drop(outer);
        assert_eq!(notify_depth(), 0);
    }

    #[test]
    fn dispose_clears_everything() {
        let object = Object::from_entries([("a", Value::Object(Object::from_entries([("b", 1)])))]);
        let reactor = Reactor::make_reactive(&object, &PropertyKey::from("a")).unwrap();
        let dependency = reactor.dependency(&PropertyKey::from("a"));
        dependency.rehost(&object.get("a"));
        assert!(dependency.host().is_some());

        reactor.dispose();
        assert!(reactor.observed_keys().is_empty());
        assert!(reactor.dependency_keys().is_empty());
        assert!(!reactor.is_tracked("a"));
        assert!(dependency.host().is_none());
    }

    #[test]
    fn debug_lists_keys() {
        let reactor = Reactor::new();
        let _ = reactor.observer(&PropertyKey::from("value"));
        let dbg = format!("{reactor:?}");
        assert!(dbg.contains("Reactor"));
        assert!(dbg.contains("value"));
    }
}
