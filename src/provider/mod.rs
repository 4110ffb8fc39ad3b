//! Provider declarations: what a key is bound to.
//!
//! A [`Provider`] pairs a key with exactly one strategy for producing its
//! value: a fixed value, a class to construct, or a factory with explicit
//! dependencies. Providers are built through a typed [`Binder`] and checked
//! when they are handed to `provide()`.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::injectable::{Args, ConstructResult, Injectable};
use crate::key::{class_key, type_key, Key, MultiToken, Token};
use crate::registration::{wrap_instance, Strategy};

/// A key together with the strategies chosen for it.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{create_token, Injector, Provider};
///
/// let port = create_token::<u16>("PORT");
/// let injector = Injector::new();
///
/// injector.provide(Provider::token(&port).use_value(8080)).unwrap();
/// assert_eq!(*injector.inject(&port).unwrap(), 8080);
///
/// // No strategy at all is rejected at registration time.
/// assert!(injector.provide(Provider::token(&port)).is_err());
/// ```
pub struct Provider {
    key: Key,
    strategies: Vec<Strategy>,
}

impl Provider {
    /// Starts a binding for a token.
    pub fn token<T: ?Sized + Send + Sync + 'static>(token: &Token<T>) -> Binder<T> {
        Binder::new(token.key())
    }

    /// Starts a binding for a class key.
    pub fn class<C: Injectable>() -> Binder<C> {
        Binder::new(class_key::<C>())
    }

    /// Starts a binding for a type key (see [`Type`](crate::Type)).
    pub fn of_type<T: ?Sized + Send + Sync + 'static>() -> Binder<T> {
        Binder::new(type_key::<T>())
    }

    /// Starts one contribution to a multi token.
    pub fn multi<T: ?Sized + Send + Sync + 'static>(token: &MultiToken<T>) -> Binder<T> {
        Binder::new(token.key())
    }

    /// Bare-class sugar for `Provider::class::<C>().use_class()`.
    pub fn from_class<C: Injectable>() -> Provider {
        Provider::class::<C>().use_class().into()
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Checks the shape and splits the provider into its key and strategy.
    pub(crate) fn into_binding(self) -> DiResult<(Key, Strategy)> {
        let Provider { key, mut strategies } = self;

        if strategies.len() > 1 {
            return Err(DiError::configuration(
                &key,
                format!(
                    "exactly one of use_value, use_class or use_factory is allowed, got {}",
                    strategies.len()
                ),
            ));
        }
        let strategy = strategies.pop().ok_or_else(|| {
            DiError::configuration(&key, "no strategy given; call use_value, use_class or use_factory")
        })?;

        if key.is_multi() && !matches!(strategy, Strategy::Value(_) | Strategy::Factory { .. }) {
            return Err(DiError::configuration(
                &key,
                format!("multi tokens accept values and factories only, got a {} binding", strategy.kind()),
            ));
        }

        Ok((key, strategy))
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("strategies", &self.strategies.iter().map(Strategy::kind).collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder for a [`Provider`].
///
/// Every `use_*` call records a strategy; `provide()` later insists on
/// exactly one.
pub struct Binder<T: ?Sized> {
    key: Key,
    strategies: Vec<Strategy>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Binder<T> {
    fn new(key: Key) -> Self {
        Self {
            key,
            strategies: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn with(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Binds an already shared value (works for unsized `T` such as `dyn Trait`).
    pub fn use_shared(self, value: Arc<T>) -> Self {
        self.with(Strategy::Value(wrap_instance(value)))
    }

    /// Binds a class whose instance is converted to `T` by `cast`.
    ///
    /// Typically used to put an implementation behind a trait-object token:
    /// `use_class_as::<PgRepo>(|repo| repo)`.
    pub fn use_class_as<C: Injectable>(self, cast: fn(Arc<C>) -> Arc<T>) -> Self {
        self.with(Strategy::Class {
            class: std::any::type_name::<C>(),
            dependencies: C::dependencies,
            construct: Arc::new(move |args: &mut Args| {
                let instance = C::construct(args)?;
                Ok(wrap_instance(cast(Arc::new(instance))))
            }),
        })
    }

    /// Binds a factory returning a shared value.
    pub fn use_shared_factory<F>(self, deps: Vec<Key>, factory: F) -> Self
    where
        F: Fn(&mut Args) -> ConstructResult<Arc<T>> + Send + Sync + 'static,
    {
        self.with(Strategy::Factory {
            deps,
            factory: Arc::new(move |args: &mut Args| factory(args).map(wrap_instance)),
        })
    }

    /// Binds an async factory; resolve the key with `inject_async`.
    #[cfg(feature = "async")]
    pub fn use_async_factory<F>(self, deps: Vec<Key>, factory: F) -> Self
    where
        F: crate::async_factories::AsyncFactory<T> + 'static,
    {
        self.with(Strategy::AsyncFactory {
            deps,
            factory: crate::async_factories::erase::<T, F>(factory),
        })
    }
}

impl<T: Send + Sync + 'static> Binder<T> {
    /// Binds a fixed value.
    pub fn use_value(self, value: T) -> Self {
        self.use_shared(Arc::new(value))
    }

    /// Binds a factory called positionally with its resolved `deps`.
    pub fn use_factory<F>(self, deps: Vec<Key>, factory: F) -> Self
    where
        F: Fn(&mut Args) -> ConstructResult<T> + Send + Sync + 'static,
    {
        self.use_shared_factory(deps, move |args| factory(args).map(Arc::new))
    }
}

impl<C: Injectable> Binder<C> {
    /// Binds the key to construction of `C` itself.
    pub fn use_class(self) -> Self {
        self.use_class_as::<C>(|instance| instance)
    }
}

impl<T: ?Sized> From<Binder<T>> for Provider {
    fn from(binder: Binder<T>) -> Self {
        Provider {
            key: binder.key,
            strategies: binder.strategies,
        }
    }
}
