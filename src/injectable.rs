//! Explicit dependency declarations for classes.
//!
//! There is no runtime reflection to discover what a constructor needs, so
//! every class states its ordered dependency keys up front. The injector
//! resolves those keys in order and hands the results to `construct` as
//! positional [`Args`].

use std::sync::Arc;

use crate::error::{BoxError, DiError, DiResult};
use crate::key::Key;
use crate::registration::{unwrap_instance, AnyArc};

/// Result of a constructor or factory.
pub type ConstructResult<T> = Result<T, BoxError>;

/// A class that the injector can build.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{create_token, Args, ConstructResult, Injectable, Injector, Key, Token};
/// use once_cell::sync::Lazy;
/// use std::sync::Arc;
///
/// static DB_URL: Lazy<Token<String>> = Lazy::new(|| create_token("DB_URL"));
///
/// struct Repo {
///     url: Arc<String>,
/// }
///
/// impl Injectable for Repo {
///     fn dependencies() -> Vec<Key> {
///         vec![DB_URL.key()]
///     }
///
///     fn construct(args: &mut Args) -> ConstructResult<Self> {
///         Ok(Repo { url: args.take::<String>()? })
///     }
/// }
///
/// let injector = Injector::new();
/// injector.provide_value(&*DB_URL, "postgres://localhost".to_string()).unwrap();
///
/// let repo = injector.inject_class::<Repo>().unwrap();
/// assert_eq!(repo.url.as_str(), "postgres://localhost");
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Ordered keys whose instances `construct` receives.
    fn dependencies() -> Vec<Key> {
        Vec::new()
    }

    /// Builds the instance from the resolved dependencies.
    fn construct(args: &mut Args) -> ConstructResult<Self>;
}

/// Positional cursor over resolved dependencies.
pub struct Args {
    keys: Vec<Key>,
    values: std::vec::IntoIter<AnyArc>,
    taken: usize,
}

impl Args {
    pub(crate) fn new(keys: Vec<Key>, values: Vec<AnyArc>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self {
            keys,
            values: values.into_iter(),
            taken: 0,
        }
    }

    /// Arguments for a constructor without dependencies.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Takes the next argument.
    ///
    /// Fails with `TypeMismatch` when the resolved instance is not a `T`, and
    /// with `MissingArgument` when every declared dependency was consumed.
    pub fn take<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        let index = self.taken;
        let value = self.values.next().ok_or(DiError::MissingArgument {
            index,
            expected: std::any::type_name::<T>(),
        })?;
        self.taken += 1;
        unwrap_instance::<T>(&value)
    }

    /// Key the next call to [`take`](Self::take) will read.
    pub fn peek_key(&self) -> Option<&Key> {
        self.keys.get(self.taken)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("keys", &self.keys)
            .field("taken", &self.taken)
            .finish()
    }
}
