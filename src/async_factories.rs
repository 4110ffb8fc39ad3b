//! Async factory support.
//!
//! Some values can only be produced asynchronously: connection pools,
//! network handshakes, remote configuration. A key bound with
//! [`Binder::use_async_factory`](crate::Binder::use_async_factory) is resolved
//! with [`Injector::inject_async`]; once it has completed, plain `inject()`
//! returns the cached instance as well.
//!
//! Every async key is initialised at most once per injector, even when
//! several tasks ask for it concurrently. A panicking async factory is
//! handled like a panicking constructor: with `catch_panics` on it becomes an
//! `Instantiation` error, otherwise it unwinds into the awaiting task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::{DiError, DiResult};
use crate::injectable::{Args, ConstructResult, Injectable};
use crate::injector::{instantiation_error, Injector};
use crate::internal::BoxFuture;
use crate::key::{class_key, InjectionKey, Key};
use crate::registration::{unwrap_instance, wrap_instance, AnyArc, ErasedAsyncFactory, Strategy};

/// Trait for factories that create values asynchronously.
///
/// Closures of the shape `Fn(Args) -> impl Future<Output = ConstructResult<Arc<T>>>`
/// implement it automatically.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{create_token, Args, AsyncFactory, ConstructResult, Injector, Provider};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct Pool {
///     url: String,
/// }
///
/// struct PoolFactory {
///     url: String,
/// }
///
/// #[async_trait]
/// impl AsyncFactory<Pool> for PoolFactory {
///     async fn create(&self, _args: Args) -> ConstructResult<Arc<Pool>> {
///         tokio::time::sleep(std::time::Duration::from_millis(5)).await;
///         Ok(Arc::new(Pool { url: self.url.clone() }))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let pool = create_token::<Pool>("POOL");
/// let injector = Injector::new();
/// injector
///     .provide(Provider::token(&pool).use_async_factory(vec![], PoolFactory {
///         url: "postgres://localhost".to_string(),
///     }))
///     .unwrap();
///
/// assert!(injector.inject(&pool).is_err());
/// let first = injector.inject_async(&pool).await.unwrap();
/// assert_eq!(first.url, "postgres://localhost");
/// assert!(Arc::ptr_eq(&first, &injector.inject(&pool).unwrap()));
/// # }
/// ```
#[async_trait]
pub trait AsyncFactory<T: ?Sized + Send + Sync + 'static>: Send + Sync {
    /// Creates the value from its resolved dependencies.
    async fn create(&self, args: Args) -> ConstructResult<Arc<T>>;
}

#[async_trait]
impl<T, F, Fut> AsyncFactory<T> for F
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ConstructResult<Arc<T>>> + Send,
{
    async fn create(&self, args: Args) -> ConstructResult<Arc<T>> {
        self(args).await
    }
}

/// Erases a typed async factory for storage in the registry.
pub(crate) fn erase<T, F>(factory: F) -> ErasedAsyncFactory
where
    T: ?Sized + Send + Sync + 'static,
    F: AsyncFactory<T> + 'static,
{
    let factory = Arc::new(factory);
    Arc::new(move |args: Args| {
        let factory = factory.clone();
        Box::pin(async move { factory.create(args).await.map(wrap_instance) })
            as BoxFuture<'static, ConstructResult<AnyArc>>
    })
}

/// What async resolution has to do for one key.
enum Plan {
    /// Resolve these dependencies, then defer to synchronous resolution
    Sync(Vec<Key>),
    /// Resolve these dependencies and await the factory
    Async(Vec<Key>, ErasedAsyncFactory),
}

impl Injector {
    /// Resolves a key, awaiting any async factories on the way.
    ///
    /// Synchronous bindings that depend on async-bound keys work too: their
    /// dependencies are resolved first, then the binding is built as usual.
    pub async fn inject_async<K: InjectionKey + ?Sized>(&self, key: &K) -> DiResult<Arc<K::Output>> {
        let instance = self.resolve_async(key.key(), Vec::new()).await?;
        unwrap_instance::<K::Output>(&instance)
    }

    /// Async counterpart of [`inject_class`](Injector::inject_class).
    pub async fn inject_class_async<C: Injectable>(&self) -> DiResult<Arc<C>> {
        let instance = self.resolve_async(class_key::<C>(), Vec::new()).await?;
        unwrap_instance::<C>(&instance)
    }

    fn resolve_async(&self, key: Key, path: Vec<Key>) -> BoxFuture<'_, DiResult<AnyArc>> {
        Box::pin(async move {
            if let Some(instance) = self.cached(&key) {
                return Ok(instance);
            }
            if let Some(pos) = path.iter().position(|k| *k == key) {
                let mut chain = path[pos..].to_vec();
                chain.push(key);
                return Err(DiError::Circular { chain });
            }
            if path.len() >= self.config().max_depth {
                return Err(DiError::DepthExceeded(path.len()));
            }

            let mut path = path;
            path.push(key);

            match self.plan(&key) {
                Plan::Sync(deps) => {
                    for dep in deps {
                        self.resolve_async(dep, path.clone()).await?;
                    }
                    self.resolve_key(key)
                }
                Plan::Async(deps, factory) => {
                    let slot = self.async_slots.lock().entry(key).or_default().clone();
                    let instance = slot
                        .get_or_try_init(|| async {
                            let started = Instant::now();
                            let mut values = Vec::with_capacity(deps.len());
                            for dep in &deps {
                                values.push(self.resolve_async(*dep, path.clone()).await?);
                            }
                            let pending = factory(Args::new(deps.clone(), values));
                            let outcome = if self.config().catch_panics {
                                match AssertUnwindSafe(pending).catch_unwind().await {
                                    Ok(outcome) => outcome,
                                    Err(payload) => Err(self.construction_panicked(key, payload)),
                                }
                            } else {
                                pending.await
                            };
                            let created = outcome.map_err(|source| instantiation_error(key, source));
                            match &created {
                                Ok(_) => tracing::debug!(
                                    injector = %self.name(),
                                    key = %key,
                                    elapsed_us = started.elapsed().as_micros() as u64,
                                    "async factory completed"
                                ),
                                Err(error) => tracing::warn!(
                                    injector = %self.name(),
                                    key = %key,
                                    error = %error,
                                    "async factory failed"
                                ),
                            }
                            created
                        })
                        .await?
                        .clone();
                    Ok(self.store_instance(key, instance))
                }
            }
        })
    }

    fn plan(&self, key: &Key) -> Plan {
        let implicit_classes = self.config().implicit_classes;
        self.with_registry(|registry| match registry.get(key) {
            Some(Strategy::AsyncFactory { deps, factory }) => Plan::Async(deps.clone(), factory.clone()),
            Some(strategy) => Plan::Sync(strategy.dependencies()),
            None if key.is_multi() => Plan::Sync(
                registry
                    .contributions(key)
                    .iter()
                    .flat_map(Strategy::dependencies)
                    .collect(),
            ),
            None => Plan::Sync(
                key.class_vtable()
                    .filter(|_| implicit_classes)
                    .map(|vtable| (vtable.dependencies)())
                    .unwrap_or_default(),
            ),
        })
    }
}
