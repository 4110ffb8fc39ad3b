//! The process-wide injector and module self-registration.
//!
//! Most applications want one injector they can reach from anywhere. The
//! global injector is created on first access; at that point every
//! [`ModuleRegistration`] linked into the binary is applied to it, so modules
//! can bind their own tokens without a central wiring function.
//!
//! Registrations are collected at link time through a `linkme` distributed
//! slice. Use [`register_module!`](crate::register_module) to add one.

use std::sync::Arc;

use linkme::distributed_slice;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::injectable::Injectable;
use crate::injector::Injector;
use crate::key::{InjectionKey, MultiToken, Token};
use crate::provider::Provider;

/// Name of the injector built by [`global()`].
pub const GLOBAL_INJECTOR_NAME: &str = "global";

/// A module's registration hook, applied to every fresh global injector.
pub struct ModuleRegistration {
    pub name: &'static str,
    /// Binds the module's providers. Must not call [`global()`] itself.
    pub register: fn(&Injector) -> DiResult<()>,
}

/// Every registration linked into the binary, in link order.
#[distributed_slice]
pub static MODULE_REGISTRATIONS: [ModuleRegistration] = [..];

/// A registration hook that returned an error.
#[derive(Debug, Clone)]
pub struct RegistrationFailure {
    pub module: &'static str,
    pub error: DiError,
}

struct GlobalState {
    injector: Arc<Injector>,
    failures: Vec<RegistrationFailure>,
}

static GLOBAL: Lazy<RwLock<GlobalState>> = Lazy::new(|| RwLock::new(build_global()));

fn build_global() -> GlobalState {
    let injector = Arc::new(Injector::named(GLOBAL_INJECTOR_NAME));
    let failures = apply_registrations(&injector);
    GlobalState { injector, failures }
}

fn apply_registrations(injector: &Injector) -> Vec<RegistrationFailure> {
    let mut failures = Vec::new();
    for module in MODULE_REGISTRATIONS {
        match (module.register)(injector) {
            Ok(()) => tracing::debug!(module = module.name, "module registered"),
            Err(error) => {
                tracing::error!(module = module.name, error = %error, "module registration failed");
                failures.push(RegistrationFailure {
                    module: module.name,
                    error,
                });
            }
        }
    }
    failures
}

/// The process-wide injector.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{create_token, global};
///
/// let greeting = create_token::<String>("GREETING");
/// global::provide_value(&greeting, "hello".to_string()).unwrap();
///
/// assert_eq!(global::inject(&greeting).unwrap().as_str(), "hello");
/// assert_eq!(global::global().name(), "global");
/// ```
pub fn global() -> Arc<Injector> {
    GLOBAL.read().injector.clone()
}

pub fn inject<K: InjectionKey + ?Sized>(key: &K) -> DiResult<Arc<K::Output>> {
    global().inject(key)
}

pub fn inject_class<C: Injectable>() -> DiResult<Arc<C>> {
    global().inject_class::<C>()
}

pub fn try_inject<K: InjectionKey + ?Sized>(key: &K) -> DiResult<Option<Arc<K::Output>>> {
    global().try_inject(key)
}

#[cfg(feature = "async")]
pub async fn inject_async<K: InjectionKey + ?Sized>(key: &K) -> DiResult<Arc<K::Output>> {
    global().inject_async(key).await
}

pub fn provide(provider: impl Into<Provider>) -> DiResult<()> {
    global().provide(provider)
}

pub fn provide_value<T: Send + Sync + 'static>(token: &Token<T>, value: T) -> DiResult<()> {
    global().provide_value(token, value)
}

pub fn contribute<T: Send + Sync + 'static>(token: &MultiToken<T>, value: T) -> DiResult<()> {
    global().contribute(token, value)
}

/// Replaces the global injector with a fresh one and re-applies every
/// module registration. Previously handed out `Arc<Injector>`s keep working
/// against the old instance.
pub fn reset_global() {
    let fresh = build_global();
    *GLOBAL.write() = fresh;
    tracing::debug!("global injector reset");
}

/// Swaps in a caller-built injector and returns the previous one.
///
/// Module registrations are not applied to `injector`.
pub fn install_global(injector: Arc<Injector>) -> Arc<Injector> {
    let mut state = GLOBAL.write();
    state.failures.clear();
    std::mem::replace(&mut state.injector, injector)
}

/// Failures reported by registration hooks while building the current
/// global injector.
pub fn global_registration_errors() -> Vec<RegistrationFailure> {
    GLOBAL.read().failures.clone()
}

/// Registers a hook that binds providers on every fresh global injector.
///
/// ```ignore
/// use ferrous_inject::{create_token, register_module, Token};
/// use once_cell::sync::Lazy;
///
/// static PORT: Lazy<Token<u16>> = Lazy::new(|| create_token("PORT"));
///
/// register_module!(NETWORK, |injector| injector.provide_value(&*PORT, 8080));
/// ```
#[macro_export]
macro_rules! register_module {
    ($name:ident, $register:expr) => {
        #[$crate::linkme::distributed_slice($crate::MODULE_REGISTRATIONS)]
        #[linkme(crate = $crate::linkme)]
        static $name: $crate::ModuleRegistration = $crate::ModuleRegistration {
            name: stringify!($name),
            register: $register,
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::create_token;
    use serial_test::serial;

    static LIB_MODULE_TOKEN: Lazy<Token<&'static str>> = Lazy::new(|| create_token("LIB_MODULE"));

    #[distributed_slice(MODULE_REGISTRATIONS)]
    static LIB_MODULE: ModuleRegistration = ModuleRegistration {
        name: "lib_module",
        register: |injector| injector.provide_value(&*LIB_MODULE_TOKEN, "registered"),
    };

    #[test]
    #[serial]
    fn registrations_apply_to_fresh_global() {
        reset_global();
        assert_eq!(*inject(&*LIB_MODULE_TOKEN).unwrap(), "registered");
        assert!(MODULE_REGISTRATIONS.iter().any(|m| m.name == "lib_module"));
    }

    #[test]
    #[serial]
    fn reset_discards_instances_and_bindings() {
        reset_global();
        let token = create_token::<u32>("EPHEMERAL");
        provide_value(&token, 1).unwrap();
        let before = global();
        assert_eq!(*inject(&token).unwrap(), 1);

        reset_global();
        assert!(try_inject(&token).unwrap().is_none());
        assert!(!Arc::ptr_eq(&before, &global()));
        assert_eq!(*before.inject(&token).unwrap(), 1);
    }

    #[test]
    #[serial]
    fn install_swaps_injector() {
        let custom = Arc::new(Injector::named("custom"));
        let previous = install_global(custom.clone());
        assert!(Arc::ptr_eq(&global(), &custom));
        assert!(global_registration_errors().is_empty());

        install_global(previous);
        reset_global();
        assert_eq!(global().name(), GLOBAL_INJECTOR_NAME);
    }
}
