//! Injection keys: opaque tokens and classes used as their own key.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DiResult;
use crate::injectable::{Args, ConstructResult, Injectable};
use crate::registration::{unwrap_instance, wrap_instance, AnyArc};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Builds the resolved list of a multi token out of its type-erased items.
pub(crate) type Collector = fn(Vec<AnyArc>) -> DiResult<AnyArc>;

/// Constructor metadata of an [`Injectable`] type, erased to fn pointers.
#[derive(Clone, Copy)]
pub(crate) struct ClassVtable {
    pub(crate) dependencies: fn() -> Vec<Key>,
    pub(crate) construct: fn(&mut Args) -> ConstructResult<AnyArc>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Identity {
    Token(u64),
    Type(TypeId),
}

#[derive(Clone, Copy)]
enum KeyKind {
    Token,
    Multi(Collector),
    Class(ClassVtable),
}

/// Identity under which a binding is registered and an instance cached.
///
/// A key is either a token created with [`create_token`] /
/// [`create_multi_token`], compared by a process-unique id, or a class key
/// created with [`class_key`], compared by `TypeId`. The description is for
/// error messages only and never takes part in equality.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::create_token;
///
/// let a = create_token::<u32>("PORT");
/// let b = create_token::<u32>("PORT");
///
/// assert_ne!(a.key(), b.key());
/// assert_eq!(a.key(), a.key());
/// assert_eq!(a.key().description(), b.key().description());
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    identity: Identity,
    name: &'static str,
    kind: KeyKind,
}

impl Key {
    /// Human-readable description (token description or type name).
    pub fn description(&self) -> &'static str {
        self.name
    }

    /// True for keys created by [`create_token`] or [`create_multi_token`].
    pub fn is_token(&self) -> bool {
        matches!(self.identity, Identity::Token(_))
    }

    /// True for collect-mode tokens.
    pub fn is_multi(&self) -> bool {
        matches!(self.kind, KeyKind::Multi(_))
    }

    /// True for class keys.
    pub fn is_class(&self) -> bool {
        matches!(self.identity, Identity::Type(_))
    }

    pub(crate) fn collector(&self) -> Option<Collector> {
        match self.kind {
            KeyKind::Multi(collect) => Some(collect),
            _ => None,
        }
    }

    pub(crate) fn class_vtable(&self) -> Option<ClassVtable> {
        match self.kind {
            KeyKind::Class(vtable) => Some(vtable),
            _ => None,
        }
    }

    fn next_token(name: &'static str, kind: KeyKind) -> Self {
        Key {
            identity: Identity::Token(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            kind,
        }
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.identity, self.kind) {
            (Identity::Token(id), KeyKind::Multi(_)) => write!(f, "MultiToken({}#{})", self.name, id),
            (Identity::Token(id), _) => write!(f, "Token({}#{})", self.name, id),
            (Identity::Type(_), _) => write!(f, "Class({})", self.name),
        }
    }
}

/// Typed key usable with `inject`.
///
/// `Output` is what a successful resolution hands back (inside an `Arc`).
pub trait InjectionKey {
    type Output: ?Sized + Send + Sync + 'static;

    fn key(&self) -> Key;
}

/// Opaque, type-tagged injection key.
///
/// Tokens carry no value; they stand in for an identity when no class is
/// available, e.g. for configuration values or trait objects.
pub struct Token<T: ?Sized> {
    key: Key,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Token<T> {
    /// Creates a fresh token; two calls never return equal tokens.
    pub fn new(description: &'static str) -> Self {
        Self {
            key: Key::next_token(description, KeyKind::Token),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn description(&self) -> &'static str {
        self.key.name
    }
}

impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Token<T> {}

impl<T: ?Sized> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.key, f)
    }
}

impl<T: ?Sized + Send + Sync + 'static> InjectionKey for Token<T> {
    type Output = T;

    fn key(&self) -> Key {
        self.key
    }
}

/// Collect-mode token: every `provide()` against it appends one item.
///
/// Resolving it yields the items in registration order as `Vec<Arc<T>>`.
pub struct MultiToken<T: ?Sized> {
    key: Key,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> MultiToken<T> {
    pub fn new(description: &'static str) -> Self {
        Self {
            key: Key::next_token(description, KeyKind::Multi(collect_items::<T>)),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn description(&self) -> &'static str {
        self.key.name
    }
}

impl<T: ?Sized> Clone for MultiToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for MultiToken<T> {}

impl<T: ?Sized> fmt::Debug for MultiToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.key, f)
    }
}

impl<T: ?Sized + Send + Sync + 'static> InjectionKey for MultiToken<T> {
    type Output = Vec<Arc<T>>;

    fn key(&self) -> Key {
        self.key
    }
}

/// A class used directly as its own key.
pub struct Class<C>(PhantomData<fn() -> C>);

impl<C: Injectable> Class<C> {
    pub fn new() -> Self {
        Class(PhantomData)
    }
}

impl<C: Injectable> Default for Class<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Injectable> InjectionKey for Class<C> {
    type Output = C;

    fn key(&self) -> Key {
        class_key::<C>()
    }
}

/// A type used as its own key without a constructor.
///
/// Unlike [`Class`], an unbound `Type<T>` is never constructed implicitly;
/// bind it with `Provider::of_type::<T>()`. `T` may be unsized, which makes
/// this the natural key for a trait object.
pub struct Type<T: ?Sized>(PhantomData<fn() -> Arc<T>>);

impl<T: ?Sized + Send + Sync + 'static> Type<T> {
    pub fn new() -> Self {
        Type(PhantomData)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Type<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Send + Sync + 'static> InjectionKey for Type<T> {
    type Output = T;

    fn key(&self) -> Key {
        type_key::<T>()
    }
}

impl<K, F> InjectionKey for once_cell::sync::Lazy<K, F>
where
    K: InjectionKey,
    F: FnOnce() -> K,
{
    type Output = K::Output;

    fn key(&self) -> Key {
        (**self).key()
    }
}

/// Creates a new token. Equality is by identity, never by description.
pub fn create_token<T: ?Sized + Send + Sync + 'static>(description: &'static str) -> Token<T> {
    Token::new(description)
}

/// Creates a new collect-mode token.
pub fn create_multi_token<T: ?Sized + Send + Sync + 'static>(
    description: &'static str,
) -> MultiToken<T> {
    MultiToken::new(description)
}

/// Key of an injectable class. Unbound class keys are constructed implicitly.
#[inline]
pub fn class_key<C: Injectable>() -> Key {
    Key {
        identity: Identity::Type(TypeId::of::<C>()),
        name: std::any::type_name::<C>(),
        kind: KeyKind::Class(ClassVtable {
            dependencies: C::dependencies,
            construct: construct_erased::<C>,
        }),
    }
}

/// Key of any type, compared by `TypeId`, with no implicit constructor.
#[inline]
pub fn type_key<T: ?Sized + 'static>() -> Key {
    Key {
        identity: Identity::Type(TypeId::of::<T>()),
        name: std::any::type_name::<T>(),
        kind: KeyKind::Token,
    }
}

fn construct_erased<C: Injectable>(args: &mut Args) -> ConstructResult<AnyArc> {
    C::construct(args).map(|instance| wrap_instance(Arc::new(instance)))
}

fn collect_items<T: ?Sized + Send + Sync + 'static>(items: Vec<AnyArc>) -> DiResult<AnyArc> {
    let mut collected: Vec<Arc<T>> = Vec::with_capacity(items.len());
    for item in &items {
        collected.push(unwrap_instance::<T>(item)?);
    }
    Ok(wrap_instance(Arc::new(collected)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Plain;

    impl Injectable for Plain {
        fn construct(_: &mut Args) -> ConstructResult<Self> {
            Ok(Plain)
        }
    }

    #[test]
    fn tokens_with_same_description_are_distinct() {
        let a = create_token::<u8>("SAME");
        let b = create_token::<u8>("SAME");
        assert_ne!(a.key(), b.key());

        let mut set = HashSet::new();
        set.insert(a.key());
        set.insert(b.key());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn class_keys_compare_by_type() {
        assert_eq!(class_key::<Plain>(), class_key::<Plain>());
        assert_eq!(Class::<Plain>::new().key(), class_key::<Plain>());
        assert!(class_key::<Plain>().is_class());
        assert!(class_key::<Plain>().class_vtable().is_some());
    }

    #[test]
    fn type_keys_share_identity_but_not_constructor() {
        trait Shape: Send + Sync {}
        assert_eq!(type_key::<Plain>(), class_key::<Plain>());
        assert!(type_key::<Plain>().class_vtable().is_none());
        assert!(type_key::<dyn Shape>().is_class());
        assert_eq!(Type::<dyn Shape>::new().key(), type_key::<dyn Shape>());
    }

    #[test]
    fn multi_flag_is_fixed_at_creation() {
        let single = create_token::<u8>("ONE");
        let multi = create_multi_token::<u8>("MANY");
        assert!(!single.key().is_multi());
        assert!(multi.key().is_multi());
        assert!(multi.key().is_token());
        assert!(multi.key().collector().is_some());
    }

    #[test]
    fn debug_output_names_kind_and_description() {
        let token = create_token::<u8>("DB");
        let debug = format!("{:?}", token.key());
        assert!(debug.starts_with("Token(DB#"));
        assert_eq!(token.key().to_string(), "DB");
        assert!(format!("{:?}", class_key::<Plain>()).starts_with("Class("));
    }

    #[test]
    fn collector_keeps_item_order() {
        let items: Vec<AnyArc> = vec![
            wrap_instance(Arc::new(1u8)),
            wrap_instance(Arc::new(2u8)),
            wrap_instance(Arc::new(3u8)),
        ];
        let collected = collect_items::<u8>(items).unwrap();
        let list = unwrap_instance::<Vec<Arc<u8>>>(&collected).unwrap();
        let values: Vec<u8> = list.iter().map(|v| **v).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
