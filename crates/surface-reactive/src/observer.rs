#![forbid(unsafe_code)]

//! Observer: fan-out notifier for one property slot.
//!
//! # Invariants
//!
//! 1. A listener is held at most once; identity is the `Rc` allocation.
//! 2. Listeners run in subscription order.
//! 3. Notification iterates a snapshot, so listeners may subscribe or
//!    unsubscribe (themselves included) while it runs.
//!
//! # Failure Modes
//!
//! - Unsubscribing a listener that is not held fails with
//!   [`ReactiveError::ListenerNotSubscribed`].
//! - A failing listener stops the remaining ones; the error reaches the caller
//!   of [`Observer::notify`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};
use crate::listener::Listener;
use crate::subscription::ListenerSubscription;
use crate::value::Value;

fn same_listener(a: &Rc<dyn Listener>, b: &Rc<dyn Listener>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

#[derive(Default)]
struct ObserverInner {
    listeners: Vec<Rc<dyn Listener>>,
}

/// Shared handle to the listener set of one slot.
///
/// Cloning creates a new handle to the **same** observer.
#[derive(Clone, Default)]
pub struct Observer {
    inner: Rc<RefCell<ObserverInner>>,
}

impl Observer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `listener`, returning a handle that removes it again. Subscribing a
    /// listener that is already held does not add it twice.
    pub fn subscribe(&self, listener: Rc<dyn Listener>) -> ListenerSubscription {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.listeners.iter().any(|l| same_listener(l, &listener)) {
                inner.listeners.push(Rc::clone(&listener));
            }
        }
        ListenerSubscription::new(self.clone(), listener)
    }

    /// Remove `listener`.
    pub fn unsubscribe(&self, listener: &Rc<dyn Listener>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let position = inner
            .listeners
            .iter()
            .position(|l| same_listener(l, listener))
            .ok_or(ReactiveError::ListenerNotSubscribed)?;
        inner.listeners.remove(position);
        Ok(())
    }

    #[must_use]
    pub fn is_subscribed(&self, listener: &Rc<dyn Listener>) -> bool {
        self.inner
            .borrow()
            .listeners
            .iter()
            .any(|l| same_listener(l, listener))
    }

    /// Call every listener with `value`.
    pub fn notify(&self, value: &Value) -> Result<()> {
        let listeners = self.inner.borrow().listeners.clone();
        for listener in listeners {
            listener.notify(value)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().listeners.is_empty()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("listeners", &self.len())
            .finish()
    }
}
