#![forbid(unsafe_code)]

//! Reactive: dependency-tracked observation of dynamic object graphs.
//!
//! Observed data lives in [`Object`]s. Observing a property path attaches a
//! [`Reactor`] to every object along it and links those reactors so that
//! replacing an intermediate object re-targets listeners automatically. Two
//! paths can be bound both ways; arrays propagate mutations positionally.
//!
//! Everything is single-threaded and synchronous: listeners run inline on the
//! call stack of the write that triggered them.
//!
//! ```
//! use surface_reactive::{Object, Reactive, Value};
//!
//! let state = Object::from_json(serde_json::json!({ "user": { "name": "ada" } }));
//! let label = Object::from_entries([("text", "")]);
//!
//! let (_l2r, _r2l) = Reactive::observe_two_way(&state, "user.name", &label, "text")?;
//! assert_eq!(label.get("text"), Value::from("ada"));
//!
//! state.set("user", Object::from_entries([("name", "grace")]))?;
//! assert_eq!(label.get("text"), Value::from("grace"));
//!
//! label.set("text", "hopper")?;
//! assert_eq!(Reactive::resolve(&state, "user.name")?, Value::from("hopper"));
//! # Ok::<(), surface_reactive::ReactiveError>(())
//! ```

pub mod error;
pub mod key;
pub mod listener;
pub mod metadata;
pub mod observer;
pub mod reactive;
pub mod reactor;
pub mod schema;
pub mod scope;
pub mod subscription;
pub mod value;

pub use error::{ReactiveError, Result};
pub use key::{IntoKeyPath, KeyPath, PropertyKey};
pub use listener::{Listener, PropertyListener, TryListener};
pub use metadata::Metadata;
pub use observer::Observer;
pub use reactive::{Observation, ObserveOptions, Reactive, Resolution};
pub use reactor::{Reactor, ReactorId};
pub use schema::{Schema, SchemaBuilder};
pub use scope::SubscriptionScope;
pub use subscription::{Disposable, ListenerSubscription, PropertySubscription, Subscription};
pub use value::{Accessor, Object, ObjectId, Value, WeakObject};
