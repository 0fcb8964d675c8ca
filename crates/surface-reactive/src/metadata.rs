#![forbid(unsafe_code)]

//! Per-instance reactive metadata.
//!
//! Stored in the hidden slot of an object next to its reactor. Holds the root
//! reactor, the computed-property declarations materialised for the instance
//! and every disposable created on its behalf. Created on the first
//! `Reactive::observe*` call against the instance (or when a schema
//! materialises it) and torn down by `Reactive::dispose`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::key::{KeyPath, PropertyKey};
use crate::reactor::Reactor;
use crate::subscription::Disposable;
use crate::value::Object;

pub struct Metadata {
    reactor: Reactor,
    computed: RefCell<BTreeMap<PropertyKey, Vec<KeyPath>>>,
    disposables: RefCell<Vec<Box<dyn Disposable>>>,
}

impl Metadata {
    /// Metadata of `target`, creating it (and the root reactor) if needed.
    pub(crate) fn ensure(target: &Object) -> Rc<Metadata> {
        if let Some(metadata) = target.metadata() {
            return metadata;
        }
        let metadata = Rc::new(Metadata {
            reactor: Reactor::get_or_attach(target),
            computed: RefCell::new(BTreeMap::new()),
            disposables: RefCell::new(Vec::new()),
        });
        target.set_metadata(Some(Rc::clone(&metadata)));
        metadata
    }

    /// Metadata of `target`, if any was created.
    #[must_use]
    pub fn of(target: &Object) -> Option<Rc<Metadata>> {
        target.metadata()
    }

    #[must_use]
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Keep `disposable` alive until the instance is disposed.
    pub fn add_disposable(&self, disposable: impl Disposable + 'static) {
        self.disposables.borrow_mut().push(Box::new(disposable));
    }

    #[must_use]
    pub fn disposable_count(&self) -> usize {
        self.disposables.borrow().len()
    }

    /// Record that `property` is computed from `dependencies`.
    pub fn declare_computed(&self, property: impl Into<PropertyKey>, dependencies: Vec<KeyPath>) {
        self.computed
            .borrow_mut()
            .entry(property.into())
            .or_default()
            .extend(dependencies);
    }

    /// Dependency paths declared for `property`.
    #[must_use]
    pub fn computed(&self, property: &str) -> Vec<KeyPath> {
        self.computed
            .borrow()
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    /// Every computed property, in key order.
    #[must_use]
    pub fn computed_properties(&self) -> Vec<PropertyKey> {
        self.computed.borrow().keys().cloned().collect()
    }

    /// Release every disposable, newest first.
    ///
    /// Keeps going past failures and returns the first one.
    pub fn dispose(&self) -> Result<()> {
        let disposables = std::mem::take(&mut *self.disposables.borrow_mut());
        self.computed.borrow_mut().clear();

        let mut first_error = None;
        for disposable in disposables.into_iter().rev() {
            if let Err(err) = disposable.dispose() {
                debug!(error = %err, "disposable failed during metadata teardown");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("reactor", &self.reactor.id())
            .field("computed", &self.computed_properties())
            .field("disposables", &self.disposable_count())
            .finish()
    }
}
