#![forbid(unsafe_code)]

//! Lifecycle management for groups of subscriptions.

use tracing::debug;

use crate::error::Result;
use crate::key::IntoKeyPath;
use crate::listener::Listener;
use crate::reactive::{ObserveOptions, Reactive};
use crate::subscription::Disposable;
use crate::value::Object;

/// Collects the subscriptions of a logical owner (e.g. a component).
///
/// # Usage
///
/// ```
/// use surface_reactive::{Object, ObserveOptions, SubscriptionScope, Value};
///
/// let model = Object::from_entries([("title", "draft")]);
/// let view = Object::from_entries([("text", "")]);
///
/// let mut scope = SubscriptionScope::new();
/// scope.observe(&model, "title", |v: &Value| println!("title: {v:?}"), ObserveOptions::new())?;
/// scope.bind_two_way(&model, "title", &view, "text")?;
/// assert_eq!(view.get("text"), Value::from("draft"));
///
/// scope.dispose()?;
/// model.set("title", "final")?;
/// assert_eq!(view.get("text"), Value::from("draft"));
/// # Ok::<(), surface_reactive::ReactiveError>(())
/// ```
///
/// # Invariants
///
/// 1. Disposables are released in reverse registration order.
/// 2. `dispose()` empties the scope; the scope can be reused afterwards.
/// 3. Dropping the scope releases whatever it still holds. Failures during
///    drop are logged, not raised.
#[derive(Default)]
pub struct SubscriptionScope {
    held: Vec<Box<dyn Disposable>>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self { held: Vec::new() }
    }

    /// Keep `disposable` until the scope is disposed or dropped.
    pub fn hold(&mut self, disposable: impl Disposable + 'static) -> &mut Self {
        self.held.push(Box::new(disposable));
        self
    }

    /// Observe `path` on `target` and hold the listener's subscription.
    pub fn observe(
        &mut self,
        target: &Object,
        path: impl IntoKeyPath,
        listener: impl Listener + 'static,
        options: ObserveOptions,
    ) -> Result<&mut Self> {
        let observation = Reactive::observe_with(target, path, listener, options)?;
        if let Some(subscription) = observation.subscription {
            self.hold(subscription);
        }
        Ok(self)
    }

    /// Bind two paths both ways and hold both directions.
    pub fn bind_two_way(
        &mut self,
        left: &Object,
        left_path: impl IntoKeyPath,
        right: &Object,
        right_path: impl IntoKeyPath,
    ) -> Result<&mut Self> {
        let (left_to_right, right_to_left) =
            Reactive::observe_two_way(left, left_path, right, right_path)?;
        self.hold(left_to_right);
        self.hold(right_to_left);
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Release everything held, newest first, returning the first failure.
    pub fn dispose(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(disposable) = self.held.pop() {
            if let Err(err) = disposable.dispose() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        let held = self.held.len();
        if let Err(err) = self.dispose() {
            debug!(error = %err, held, "subscription scope released with errors");
        }
    }
}

impl std::fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("held", &self.held.len())
            .finish()
    }
}
