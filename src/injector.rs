//! The injector: bindings, the resolution engine and the instance cache.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{ReentrantMutex, RwLock};

use crate::config::InjectorConfig;
use crate::error::{BoxError, ConstructionPanic, DiError, DiResult};
use crate::injectable::{Args, ConstructResult, Injectable};
use crate::internal::{panic_message, ResolvingFrame, ResolvingStack};
use crate::key::{class_key, Collector, InjectionKey, Key, MultiToken, Token};
use crate::observer::{DiObserver, Observers};
use crate::provider::Provider;
use crate::registration::{unwrap_instance, AnyArc, Registry, Strategy};

/// Container holding provider bindings and the resolved-instance cache for
/// one dependency graph.
///
/// Every key behaves as a singleton within its injector: the first
/// successful `inject()` constructs the instance, every later call returns
/// the same `Arc`. Failures are never cached.
///
/// Resolution of a key runs as one critical section under a per-injector
/// reentrant lock, so concurrent first access from several threads still
/// constructs exactly one instance.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{create_token, Args, ConstructResult, Injectable, Injector, Key, Token};
/// use once_cell::sync::Lazy;
/// use std::sync::Arc;
///
/// struct Connection(&'static str);
///
/// static DB: Lazy<Token<Connection>> = Lazy::new(|| create_token("DB"));
///
/// struct Repo {
///     db: Arc<Connection>,
/// }
///
/// impl Injectable for Repo {
///     fn dependencies() -> Vec<Key> {
///         vec![DB.key()]
///     }
///
///     fn construct(args: &mut Args) -> ConstructResult<Self> {
///         Ok(Repo { db: args.take()? })
///     }
/// }
///
/// let injector = Injector::new();
/// assert!(injector.inject_class::<Repo>().is_err());
///
/// injector.provide_value(&*DB, Connection("fake")).unwrap();
/// let first = injector.inject_class::<Repo>().unwrap();
/// let second = injector.inject_class::<Repo>().unwrap();
///
/// assert_eq!(first.db.0, "fake");
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
pub struct Injector {
    config: InjectorConfig,
    pub(crate) state: ReentrantMutex<InjectorState>,
    observers: RwLock<Observers>,
    #[cfg(feature = "async")]
    pub(crate) async_slots: parking_lot::Mutex<HashMap<Key, Arc<tokio::sync::OnceCell<AnyArc>>>>,
}

/// Mutable injector state, only touched while the injector lock is held.
///
/// Each part sits in its own `RefCell` so that a borrow never has to live
/// across a call into user code.
pub(crate) struct InjectorState {
    pub(crate) registry: RefCell<Registry>,
    pub(crate) instances: RefCell<HashMap<Key, AnyArc>>,
    pub(crate) resolving: RefCell<ResolvingStack>,
}

impl Injector {
    /// Creates an injector named `root` with default settings.
    pub fn new() -> Self {
        Self::with_config(InjectorConfig::default())
    }

    /// Creates an injector with default settings and the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(InjectorConfig::default().with_name(name))
    }

    pub fn with_config(config: InjectorConfig) -> Self {
        Self {
            config,
            state: ReentrantMutex::new(InjectorState {
                registry: RefCell::new(Registry::new()),
                instances: RefCell::new(HashMap::new()),
                resolving: RefCell::new(ResolvingStack::default()),
            }),
            observers: RwLock::new(Observers::new()),
            #[cfg(feature = "async")]
            async_slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    pub fn add_observer(&self, observer: Arc<dyn DiObserver>) {
        self.observers.write().add(observer);
    }

    // ----- Registration -----

    /// Registers a binding.
    ///
    /// Ordinary keys: the new binding replaces the previous one. Multi keys:
    /// the binding is appended as one more item of the collected list.
    /// A malformed provider fails here with `DiError::Configuration`.
    pub fn provide(&self, provider: impl Into<Provider>) -> DiResult<()> {
        let (key, strategy) = provider.into().into_binding()?;
        let state = self.state.lock();

        if key.is_multi() {
            let items = state.registry.borrow_mut().append(key, strategy);
            if state.instances.borrow().contains_key(&key) {
                tracing::debug!(
                    injector = %self.name(),
                    key = %key,
                    items,
                    "contribution arrived after first resolution and is not reflected"
                );
            } else {
                tracing::debug!(injector = %self.name(), key = %key, items, "contributed");
            }
        } else {
            let kind = strategy.kind();
            let replaced = state.registry.borrow_mut().insert(key, strategy).is_some();
            if state.instances.borrow().contains_key(&key) {
                tracing::debug!(
                    injector = %self.name(),
                    key = %key,
                    kind,
                    "binding changed after resolution; cached instance kept"
                );
            } else {
                tracing::debug!(injector = %self.name(), key = %key, kind, replaced, "provided");
            }
        }
        Ok(())
    }

    /// Binds a token to a fixed value.
    pub fn provide_value<T: Send + Sync + 'static>(&self, token: &Token<T>, value: T) -> DiResult<()> {
        self.provide(Provider::token(token).use_value(value))
    }

    /// Binds a token to a factory with explicit dependencies.
    pub fn provide_factory<T, F>(&self, token: &Token<T>, deps: Vec<Key>, factory: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Args) -> ConstructResult<T> + Send + Sync + 'static,
    {
        self.provide(Provider::token(token).use_factory(deps, factory))
    }

    /// Registers a class as its own provider.
    pub fn provide_class<C: Injectable>(&self) -> DiResult<()> {
        self.provide(Provider::from_class::<C>())
    }

    /// Appends a value to a multi token.
    pub fn contribute<T: Send + Sync + 'static>(&self, token: &MultiToken<T>, value: T) -> DiResult<()> {
        self.provide(Provider::multi(token).use_value(value))
    }

    /// Appends a shared value (e.g. a trait object) to a multi token.
    pub fn contribute_shared<T: ?Sized + Send + Sync + 'static>(
        &self,
        token: &MultiToken<T>,
        value: Arc<T>,
    ) -> DiResult<()> {
        self.provide(Provider::multi(token).use_shared(value))
    }

    /// Appends a factory-produced item to a multi token.
    pub fn contribute_factory<T, F>(&self, token: &MultiToken<T>, deps: Vec<Key>, factory: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Args) -> ConstructResult<T> + Send + Sync + 'static,
    {
        self.provide(Provider::multi(token).use_factory(deps, factory))
    }

    // ----- Resolution -----

    /// Resolves a key, constructing and caching its instance on first use.
    pub fn inject<K: InjectionKey + ?Sized>(&self, key: &K) -> DiResult<Arc<K::Output>> {
        let instance = self.resolve_key(key.key())?;
        unwrap_instance::<K::Output>(&instance)
    }

    /// Resolves a class key.
    pub fn inject_class<C: Injectable>(&self) -> DiResult<Arc<C>> {
        let instance = self.resolve_key(class_key::<C>())?;
        unwrap_instance::<C>(&instance)
    }

    /// Like [`inject`](Self::inject), but a missing binding for `key` itself
    /// yields `Ok(None)`. Missing bindings further down the graph still fail.
    pub fn try_inject<K: InjectionKey + ?Sized>(&self, key: &K) -> DiResult<Option<Arc<K::Output>>> {
        let requested = key.key();
        match self.inject(key) {
            Ok(instance) => Ok(Some(instance)),
            Err(error) if error.is_no_provider_for(&requested) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// True when a binding (or at least one contribution) exists for `key`.
    pub fn is_bound(&self, key: &Key) -> bool {
        self.state.lock().registry.borrow().contains_key(key)
    }

    /// True when `key` has a cached instance.
    pub fn is_resolved(&self, key: &Key) -> bool {
        self.state.lock().instances.borrow().contains_key(key)
    }

    /// Number of contributions registered so far, including late ones.
    pub fn contribution_count<T: ?Sized + Send + Sync + 'static>(&self, token: &MultiToken<T>) -> usize {
        self.state.lock().registry.borrow().contributions(&token.key()).len()
    }

    pub(crate) fn resolve_key(&self, key: Key) -> DiResult<AnyArc> {
        let state = self.state.lock();
        let resolved = self.resolve(&state, key);
        if let Err(error) = &resolved {
            if state.resolving.borrow().depth() == 0 {
                tracing::warn!(injector = %self.name(), key = %key, error = %error, "injection failed");
            }
        }
        resolved
    }

    fn resolve(&self, state: &InjectorState, key: Key) -> DiResult<AnyArc> {
        let cached = state.instances.borrow().get(&key).cloned();
        if let Some(instance) = cached {
            tracing::trace!(injector = %self.name(), key = %key, "cache hit");
            return Ok(instance);
        }

        let _frame = ResolvingFrame::enter(&state.resolving, key, self.config.max_depth)?;

        let observers = self.observers();
        let observe = observers.has_observers();
        if observe {
            observers.resolving(&key);
        }
        let started = Instant::now();

        let produced = self.produce(state, key);
        match &produced {
            Ok(instance) => {
                state.instances.borrow_mut().insert(key, instance.clone());
                tracing::debug!(
                    injector = %self.name(),
                    key = %key,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "resolved"
                );
                if observe {
                    observers.resolved(&key, started.elapsed());
                }
            }
            Err(error) => {
                tracing::debug!(injector = %self.name(), key = %key, error = %error, "resolution failed");
                if observe {
                    observers.failed(&key, error);
                }
            }
        }
        produced
    }

    fn produce(&self, state: &InjectorState, key: Key) -> DiResult<AnyArc> {
        let binding = state.registry.borrow().get(&key).cloned();
        match binding {
            Some(Strategy::Value(value)) => Ok(value),
            Some(Strategy::Class { dependencies, construct, .. }) => {
                self.build(state, key, dependencies(), &*construct)
            }
            Some(Strategy::Factory { deps, factory }) => self.build(state, key, deps, &*factory),
            #[cfg(feature = "async")]
            Some(Strategy::AsyncFactory { .. }) => Err(DiError::AsyncRequired(key)),
            None => {
                if let Some(collect) = key.collector() {
                    return self.collect(state, key, collect);
                }
                match key.class_vtable() {
                    Some(vtable) if self.config.implicit_classes => {
                        tracing::trace!(injector = %self.name(), key = %key, "implicit class construction");
                        self.build(state, key, (vtable.dependencies)(), &vtable.construct)
                    }
                    _ => Err(DiError::NoProvider {
                        key,
                        injector: self.name().to_string(),
                    }),
                }
            }
        }
    }

    /// Snapshots the contributions of a multi key into its resolved list.
    fn collect(&self, state: &InjectorState, key: Key, collect: Collector) -> DiResult<AnyArc> {
        let entries: Vec<Strategy> = state.registry.borrow().contributions(&key).to_vec();
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let item = match entry {
                Strategy::Value(value) => value,
                Strategy::Factory { deps, factory } => self.build(state, key, deps, &*factory)?,
                other => {
                    return Err(DiError::configuration(
                        &key,
                        format!("unexpected {} contribution", other.kind()),
                    ))
                }
            };
            items.push(item);
        }
        tracing::debug!(injector = %self.name(), key = %key, items = items.len(), "collected contributions");
        collect(items)
    }

    fn build(
        &self,
        state: &InjectorState,
        key: Key,
        deps: Vec<Key>,
        construct: &dyn Fn(&mut Args) -> ConstructResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        let values = deps
            .iter()
            .map(|dep| self.resolve(state, *dep))
            .collect::<DiResult<Vec<_>>>()?;
        let mut args = Args::new(deps, values);
        self.instantiate(key, construct, &mut args)
    }

    fn instantiate(
        &self,
        key: Key,
        construct: &dyn Fn(&mut Args) -> ConstructResult<AnyArc>,
        args: &mut Args,
    ) -> DiResult<AnyArc> {
        let outcome = if self.config.catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| construct(args))) {
                Ok(outcome) => outcome,
                Err(payload) => Err(self.construction_panicked(key, payload)),
            }
        } else {
            construct(args)
        };
        outcome.map_err(|source| instantiation_error(key, source))
    }

    /// Reports a caught constructor panic and turns it into the error cause.
    pub(crate) fn construction_panicked(&self, key: Key, payload: Box<dyn Any + Send>) -> BoxError {
        let message = panic_message(payload.as_ref());
        tracing::error!(injector = %self.name(), key = %key, panic = %message, "constructor panicked");
        self.observers().factory_panic(&key, &message);
        Box::new(ConstructionPanic { message })
    }

    /// Snapshot of the registered observers.
    ///
    /// Observers are called on the snapshot, outside the observer lock, so
    /// one may register further observers from inside a callback.
    fn observers(&self) -> Observers {
        self.observers.read().clone()
    }

    // ----- Crate-internal access for async resolution and validation -----

    pub(crate) fn cached(&self, key: &Key) -> Option<AnyArc> {
        self.state.lock().instances.borrow().get(key).cloned()
    }

    /// Caches `instance` unless another one won the race; returns the cached one.
    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn store_instance(&self, key: Key, instance: AnyArc) -> AnyArc {
        let state = self.state.lock();
        let mut instances = state.instances.borrow_mut();
        instances.entry(key).or_insert(instance).clone()
    }

    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let state = self.state.lock();
        let registry = state.registry.borrow();
        f(&registry)
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let state = self.state.lock();
        let registry = state.registry.borrow();
        let instances = state.instances.borrow();

        let mut bindings: Vec<String> = registry
            .iter()
            .map(|(k, s)| format!("  {:?}: {} (resolved: {})\n", k, s.kind(), instances.contains_key(k)))
            .collect();
        bindings.sort();
        let mut multi: Vec<String> = registry
            .iter_contributions()
            .map(|(k, items)| format!("  {:?}: {} items (resolved: {})\n", k, items.len(), instances.contains_key(k)))
            .collect();
        multi.sort();

        let mut s = format!("=== Injector '{}' ===\n", self.name());
        s.push_str("Bindings:\n");
        bindings.iter().for_each(|line| s.push_str(line));
        s.push_str("Multi Tokens:\n");
        multi.iter().for_each(|line| s.push_str(line));
        s
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("Injector");
        out.field("name", &self.config.name);
        if let Some(state) = self.state.try_lock() {
            if let (Ok(registry), Ok(instances)) = (state.registry.try_borrow(), state.instances.try_borrow()) {
                out.field("bindings", &registry.len());
                out.field("instances", &instances.len());
            }
        }
        out.finish()
    }
}

/// Wraps a constructor failure, letting resolution errors from nested
/// injection pass through unchanged.
pub(crate) fn instantiation_error(key: Key, source: BoxError) -> DiError {
    match source.downcast::<DiError>() {
        Ok(inner) => match *inner {
            error @ (DiError::TypeMismatch(_) | DiError::MissingArgument { .. }) => DiError::Instantiation {
                key,
                source: Arc::new(error),
            },
            error => error,
        },
        Err(source) => DiError::Instantiation {
            key,
            source: Arc::from(source),
        },
    }
}
