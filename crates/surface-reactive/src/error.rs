#![forbid(unsafe_code)]

//! Error type shared by every reactive operation.
//!
//! All failures are programmer errors surfaced synchronously at the call that
//! caused them (a binding typo, a double unsubscribe, a write to a read-only
//! accessor). Nothing in the propagation path swallows an error: a failing
//! listener aborts the notification it runs in and the error bubbles up to
//! whoever performed the write.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors raised by the reactive engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A key required by a strict path walk is missing on the target.
    #[error("Key \"{key}\" does not exist on type {type_name}")]
    KeyNotFound { key: String, type_name: String },

    /// `Observer::unsubscribe` was called with a listener it does not hold.
    #[error("Listerner not subscribed")]
    ListenerNotSubscribed,

    /// `Reactive::notify` was called on an object without a reactor.
    #[error("Target is not reactive")]
    NotReactive,

    /// Write to an accessor property that has no setter.
    #[error("Property \"{key}\" is read-only")]
    ReadOnly { key: String },

    /// Write of a non-index key (or an invalid length) on an array.
    #[error("\"{key}\" is not a valid array index")]
    InvalidIndex { key: String },

    /// Array operation applied to a record object.
    #[error("Target is not an array")]
    NotAnArray,

    /// A textual key path could not be parsed.
    #[error("Invalid path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Failure reported by a user listener.
    #[error("Listener failed: {0}")]
    Listener(String),
}

impl ReactiveError {
    /// Build a [`ReactiveError::KeyNotFound`].
    #[must_use]
    pub fn key_not_found(key: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::KeyNotFound {
            key: key.into(),
            type_name: type_name.into(),
        }
    }

    /// Build a [`ReactiveError::Listener`] from any message.
    #[must_use]
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }
}
