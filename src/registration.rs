//! Binding storage: the per-injector provider map and multi-token contributions.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::injectable::{Args, ConstructResult};
use crate::key::Key;

// Type-erased Arc for storage. Always holds an `Arc<T>` for the key's output type.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type ErasedFactory = Arc<dyn Fn(&mut Args) -> ConstructResult<AnyArc> + Send + Sync>;

#[cfg(feature = "async")]
pub(crate) type ErasedAsyncFactory =
    Arc<dyn Fn(Args) -> crate::internal::BoxFuture<'static, ConstructResult<AnyArc>> + Send + Sync>;

#[inline]
pub(crate) fn wrap_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

#[inline]
pub(crate) fn unwrap_instance<T: ?Sized + Send + Sync + 'static>(any: &AnyArc) -> DiResult<Arc<T>> {
    any.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
}

/// How a binding produces its value.
#[derive(Clone)]
pub(crate) enum Strategy {
    /// Fixed pre-built value
    Value(AnyArc),
    /// Construct a class after resolving its declared dependencies
    Class {
        class: &'static str,
        dependencies: fn() -> Vec<Key>,
        construct: ErasedFactory,
    },
    /// Call a factory positionally with resolved dependencies
    Factory { deps: Vec<Key>, factory: ErasedFactory },
    #[cfg(feature = "async")]
    AsyncFactory {
        deps: Vec<Key>,
        factory: ErasedAsyncFactory,
    },
}

impl Strategy {
    /// Declared dependency keys, in constructor order.
    pub(crate) fn dependencies(&self) -> Vec<Key> {
        match self {
            Strategy::Value(_) => Vec::new(),
            Strategy::Class { dependencies, .. } => dependencies(),
            Strategy::Factory { deps, .. } => deps.clone(),
            #[cfg(feature = "async")]
            Strategy::AsyncFactory { deps, .. } => deps.clone(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Strategy::Value(_) => "value",
            Strategy::Class { .. } => "class",
            Strategy::Factory { .. } => "factory",
            #[cfg(feature = "async")]
            Strategy::AsyncFactory { .. } => "async-factory",
        }
    }
}

/// Bindings of one injector.
#[derive(Default)]
pub(crate) struct Registry {
    /// Ordinary keys: last registration wins
    providers: HashMap<Key, Strategy>,
    /// Multi keys: append-only, in registration order
    contributions: HashMap<Key, Vec<Strategy>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a binding, returning the one it replaced.
    pub(crate) fn insert(&mut self, key: Key, strategy: Strategy) -> Option<Strategy> {
        self.providers.insert(key, strategy)
    }

    /// Appends a contribution, returning the new number of items.
    pub(crate) fn append(&mut self, key: Key, strategy: Strategy) -> usize {
        let items = self.contributions.entry(key).or_default();
        items.push(strategy);
        items.len()
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<&Strategy> {
        self.providers.get(key)
    }

    pub(crate) fn contributions(&self, key: &Key) -> &[Strategy] {
        self.contributions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.providers.contains_key(key) || self.contributions.contains_key(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Strategy)> {
        self.providers.iter()
    }

    pub(crate) fn iter_contributions(&self) -> impl Iterator<Item = (&Key, &[Strategy])> {
        self.contributions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub(crate) fn len(&self) -> usize {
        self.providers.len() + self.contributions.len()
    }
}
