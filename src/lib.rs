//! # ferrous-inject
//!
//! Token- and class-keyed dependency injection with explicit dependency
//! declarations.
//!
//! ## Features
//!
//! - **Identity keys**: opaque tokens compared by identity, never by
//!   description, and classes used directly as their own key
//! - **Three provider strategies**: fixed values, classes and factories with
//!   explicit dependency lists
//! - **Singleton per injector**: each key is constructed at most once, even
//!   under concurrent first access
//! - **Circular dependency detection**: cycles fail with the full key chain
//! - **Multi tokens**: many contributions collected into one ordered list
//! - **Global registry**: a process-wide injector that modules register into
//!   at link time
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_inject::{create_token, Args, ConstructResult, DiError, Injectable, Injector, Key, Token};
//! use once_cell::sync::Lazy;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Connection {
//!     dsn: String,
//! }
//!
//! static DB: Lazy<Token<Connection>> = Lazy::new(|| create_token("DB"));
//!
//! struct Repo {
//!     db: Arc<Connection>,
//! }
//!
//! impl Injectable for Repo {
//!     fn dependencies() -> Vec<Key> {
//!         vec![DB.key()]
//!     }
//!
//!     fn construct(args: &mut Args) -> ConstructResult<Self> {
//!         Ok(Repo { db: args.take()? })
//!     }
//! }
//!
//! let injector = Injector::new();
//!
//! // Nothing bound yet: the error names the missing token.
//! let error = injector.inject(&*DB).unwrap_err();
//! assert!(matches!(error, DiError::NoProvider { .. }));
//! assert!(error.to_string().contains("DB"));
//!
//! injector
//!     .provide_value(&*DB, Connection { dsn: "postgres://localhost".to_string() })
//!     .unwrap();
//!
//! let repo = injector.inject_class::<Repo>().unwrap();
//! assert_eq!(repo.db.dsn, "postgres://localhost");
//! assert!(Arc::ptr_eq(&repo, &injector.inject_class::<Repo>().unwrap()));
//! assert!(Arc::ptr_eq(&repo.db, &injector.inject(&*DB).unwrap()));
//! ```
//!
//! ## Trait Objects
//!
//! ```rust
//! use ferrous_inject::{create_token, Args, ConstructResult, Injectable, Injector, Provider};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! impl Injectable for English {
//!     fn construct(_: &mut Args) -> ConstructResult<Self> {
//!         Ok(English)
//!     }
//! }
//!
//! let greeter = create_token::<dyn Greeter>("GREETER");
//! let injector = Injector::new();
//! injector
//!     .provide(Provider::token(&greeter).use_class_as::<English>(|english| english))
//!     .unwrap();
//!
//! assert_eq!(injector.inject(&greeter).unwrap().greet(), "hello");
//! ```
//!
//! ## Multi Tokens
//!
//! ```rust
//! use ferrous_inject::{create_multi_token, Injector};
//!
//! let plugins = create_multi_token::<&'static str>("PLUGINS");
//! let injector = Injector::new();
//! injector.contribute(&plugins, "auth").unwrap();
//! injector.contribute(&plugins, "audit").unwrap();
//!
//! let all = injector.inject(&plugins).unwrap();
//! assert_eq!(all.iter().map(|p| **p).collect::<Vec<_>>(), vec!["auth", "audit"]);
//! ```

pub mod config;
pub mod error;
pub mod global;
pub mod injectable;
pub mod injector;
pub mod key;
pub mod observer;
pub mod provider;
pub mod validation;

#[cfg(feature = "async")]
pub mod async_factories;
#[cfg(feature = "graph-export")]
pub mod graph_export;

// Internal modules
mod internal;
mod registration;

// Re-export core types
pub use config::{ConfigSource, EnvironmentConfigSource, InjectorConfig, MapConfigSource};
pub use error::{BoxError, ConstructionPanic, DiError, DiResult};
pub use global::{
    global, global_registration_errors, install_global, reset_global, ModuleRegistration, RegistrationFailure,
    MODULE_REGISTRATIONS,
};
pub use injectable::{Args, ConstructResult, Injectable};
pub use injector::Injector;
pub use key::{class_key, create_multi_token, create_token, type_key, Class, InjectionKey, Key, MultiToken, Token, Type};
pub use observer::{DiObserver, LoggingObserver};
pub use provider::{Binder, Provider};
pub use validation::{MissingDependency, ValidationReport};

#[cfg(feature = "async")]
pub use async_factories::AsyncFactory;
#[cfg(feature = "graph-export")]
pub use graph_export::{DependencyGraph, GraphEdge, GraphNode};

#[doc(hidden)]
pub use linkme;
