//! Error types for the injector.

use std::sync::Arc;

use thiserror::Error;

use crate::key::Key;

/// Boxed error returned by constructors and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency injection errors
///
/// Every failure of `provide()` or `inject()` surfaces as one of these
/// variants. Nothing is retried or swallowed inside the engine, and nothing is
/// cached on failure, so correcting the registration and calling `inject()`
/// again is enough to recover.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{create_token, DiError, Injector};
///
/// let db = create_token::<String>("DB");
/// let injector = Injector::new();
///
/// match injector.inject(&db) {
///     Err(DiError::NoProvider { key, injector }) => {
///         assert_eq!(key.description(), "DB");
///         assert_eq!(injector, "root");
///     }
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Malformed or self-contradictory provider registration, raised by `provide()`
    #[error("Invalid provider for {key}: {reason}")]
    Configuration { key: String, reason: String },
    /// A token (or constructor-less class key) has no binding
    #[error("No provider for {key} in injector '{injector}'")]
    NoProvider { key: Key, injector: String },
    /// A key transitively depends on itself; the chain starts and ends with the same key
    #[error("Circular dependency: {}", join_chain(.chain))]
    Circular { chain: Vec<Key> },
    /// A constructor or factory failed (or panicked)
    #[error("Failed to instantiate {key}: {source}")]
    Instantiation {
        key: Key,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A constructor asked for more arguments than it declared
    #[error("Missing constructor argument #{index} ({expected})")]
    MissingArgument { index: usize, expected: &'static str },
    /// The key is bound to an async factory that has not completed yet
    #[error("{0} has an async provider; resolve it with inject_async first")]
    AsyncRequired(Key),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// An injector setting could not be parsed
    #[error("Invalid setting {setting}: {reason}")]
    InvalidSetting { setting: String, reason: String },
}

impl DiError {
    /// Returns true when this is a `NoProvider` error for exactly `key`.
    pub fn is_no_provider_for(&self, key: &Key) -> bool {
        matches!(self, DiError::NoProvider { key: missing, .. } if missing == key)
    }

    /// Descriptions of the keys in a circular chain, empty for other variants.
    pub fn chain_descriptions(&self) -> Vec<&'static str> {
        match self {
            DiError::Circular { chain } => chain.iter().map(Key::description).collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn configuration(key: &Key, reason: impl Into<String>) -> Self {
        DiError::Configuration {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

fn join_chain(chain: &[Key]) -> String {
    chain
        .iter()
        .map(Key::description)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Payload of a constructor or factory that panicked.
#[derive(Debug, Error)]
#[error("constructor panicked: {message}")]
pub struct ConstructionPanic {
    pub message: String,
}

/// Result type for injector operations
pub type DiResult<T> = Result<T, DiError>;
