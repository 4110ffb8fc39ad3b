//! Diagnostic observers for resolution events.
//!
//! The injector itself logs through `tracing`. Observers are an additional
//! hook for code that wants to react to resolutions, e.g. to collect timings
//! or to build a startup report.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::Key;

/// Observer trait for resolution events.
///
/// Observers are called synchronously while the injector holds its lock.
/// Keep implementations lightweight and never resolve from inside them.
/// Registering another observer from a callback is allowed; it starts
/// receiving events with the next resolution.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{create_token, DiObserver, Injector, Key};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     resolved: Mutex<Vec<&'static str>>,
/// }
///
/// impl DiObserver for Recorder {
///     fn resolving(&self, _key: &Key) {}
///
///     fn resolved(&self, key: &Key, _duration: Duration) {
///         self.resolved.lock().unwrap().push(key.description());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let injector = Injector::new();
/// injector.add_observer(recorder.clone());
///
/// let answer = create_token::<u32>("ANSWER");
/// injector.provide_value(&answer, 42).unwrap();
/// injector.inject(&answer).unwrap();
///
/// assert_eq!(*recorder.resolved.lock().unwrap(), vec!["ANSWER"]);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called when a key misses the cache and resolution starts.
    fn resolving(&self, key: &Key);

    /// Called when a key was produced and cached.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called when resolution of a key failed.
    fn failed(&self, key: &Key, error: &DiError) {
        let _ = (key, error);
    }

    /// Called when a constructor or factory panicked.
    ///
    /// The panic is turned into an `Instantiation` error afterwards.
    fn factory_panic(&self, key: &Key, message: &str) {
        let _ = (key, message);
    }
}

/// Container for registered observers.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    /// Returns true if any observers are registered.
    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.failed(key, error);
        }
    }

    pub(crate) fn factory_panic(&self, key: &Key, message: &str) {
        for observer in &self.observers {
            observer.factory_panic(key, message);
        }
    }
}

/// Built-in observer that forwards events to `tracing` at info level.
///
/// The injector already emits debug/trace events; this observer is for
/// deployments that want resolutions visible at the default log level.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "ferrous-inject".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, key: &Key) {
        tracing::info!(observer = %self.prefix, key = %key, "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::info!(
            observer = %self.prefix,
            key = %key,
            elapsed_us = duration.as_micros() as u64,
            "resolved"
        );
    }

    fn failed(&self, key: &Key, error: &DiError) {
        tracing::warn!(observer = %self.prefix, key = %key, error = %error, "resolution failed");
    }

    fn factory_panic(&self, key: &Key, message: &str) {
        tracing::error!(observer = %self.prefix, key = %key, panic = message, "constructor panicked");
    }
}
