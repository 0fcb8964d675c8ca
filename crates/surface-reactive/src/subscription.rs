#![forbid(unsafe_code)]

//! Subscription handles.
//!
//! [`ListenerSubscription`] is what [`Observer::subscribe`] hands back.
//! [`PropertySubscription`] couples a [`PropertyListener`] with the observer
//! feeding it and is what keeps a two-way binding pointed at the right object
//! when containers along its path are replaced.
//!
//! Unsubscribing is strict: a second call fails with
//! [`ReactiveError::ListenerNotSubscribed`](crate::ReactiveError), so owners
//! must track subscription lifetime themselves, typically with a
//! [`SubscriptionScope`](crate::SubscriptionScope).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::listener::{Listener, PropertyListener};
use crate::observer::Observer;
use crate::value::Object;

/// A live link between a listener and an observer.
pub trait Subscription {
    fn unsubscribe(&self) -> Result<()>;
}

/// Something that releases resources when its owner is torn down.
pub trait Disposable {
    fn dispose(&self) -> Result<()>;
}

impl<T: Subscription> Disposable for T {
    fn dispose(&self) -> Result<()> {
        self.unsubscribe()
    }
}

// ---------------------------------------------------------------------------
// ListenerSubscription
// ---------------------------------------------------------------------------

/// Handle returned by [`Observer::subscribe`].
#[derive(Clone)]
pub struct ListenerSubscription {
    observer: Observer,
    listener: Rc<dyn Listener>,
}

impl ListenerSubscription {
    pub(crate) fn new(observer: Observer, listener: Rc<dyn Listener>) -> Self {
        Self { observer, listener }
    }

    #[must_use]
    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    #[must_use]
    pub fn listener(&self) -> &Rc<dyn Listener> {
        &self.listener
    }
}

impl Subscription for ListenerSubscription {
    fn unsubscribe(&self) -> Result<()> {
        self.observer.unsubscribe(&self.listener)
    }
}

impl fmt::Debug for ListenerSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSubscription")
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PropertySubscription
// ---------------------------------------------------------------------------

type Action = Box<dyn FnOnce()>;

struct PropertySubscriptionInner {
    listener: Rc<PropertyListener>,
    observer: Observer,
    on_unsubscribe: RefCell<Vec<Action>>,
}

/// A [`PropertyListener`] subscribed to an observer, plus the teardown
/// actions that run when the subscription ends.
///
/// Cloning creates a new handle to the **same** subscription.
#[derive(Clone)]
pub struct PropertySubscription {
    inner: Rc<PropertySubscriptionInner>,
}

impl PropertySubscription {
    /// Subscribe `listener` to `observer`.
    #[must_use]
    pub fn new(listener: Rc<PropertyListener>, observer: Observer) -> Self {
        let _ = observer.subscribe(Rc::clone(&listener) as Rc<dyn Listener>);
        Self {
            inner: Rc::new(PropertySubscriptionInner {
                listener,
                observer,
                on_unsubscribe: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn listener(&self) -> &Rc<PropertyListener> {
        &self.inner.listener
    }

    #[must_use]
    pub fn observer(&self) -> &Observer {
        &self.inner.observer
    }

    /// Repoint the listener at a new owner of the bound property.
    pub fn update(&self, target: Option<&Object>) {
        self.inner.listener.update(target);
    }

    /// Register an action to run once, on unsubscribe.
    pub fn on_unsubscribe(&self, action: impl FnOnce() + 'static) {
        self.inner.on_unsubscribe.borrow_mut().push(Box::new(action));
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &PropertySubscription) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Subscription for PropertySubscription {
    fn unsubscribe(&self) -> Result<()> {
        let listener: Rc<dyn Listener> = Rc::clone(&self.inner.listener) as Rc<dyn Listener>;
        self.inner.observer.unsubscribe(&listener)?;
        let actions = std::mem::take(&mut *self.inner.on_unsubscribe.borrow_mut());
        for action in actions {
            action();
        }
        Ok(())
    }
}

impl fmt::Debug for PropertySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySubscription")
            .field("listener", &self.inner.listener)
            .field("observer", &self.inner.observer)
            .field(
                "on_unsubscribe",
                &self.inner.on_unsubscribe.try_borrow().map_or(0, |a| a.len()),
            )
            .finish()
    }
}
