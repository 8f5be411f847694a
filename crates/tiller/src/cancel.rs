//! Cancellation tokens.
//!
//! A [`CancelToken`] groups effects so they can be cancelled together. Any
//! `Hash + Eq + Debug` value can be a token; the concrete type is part of the
//! identity, so two unrelated unit structs never collide.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased key used to group cancellable effects.
///
/// ```ignore
/// #[derive(Debug, Hash, PartialEq, Eq)]
/// struct SearchRequest;
///
/// Effect::future(fetch(query)).cancellable(SearchRequest)
/// ```
#[derive(Clone)]
pub struct CancelToken {
    key: Arc<dyn TokenKey>,
}

impl CancelToken {
    /// Wrap a key. Wrapping an existing token returns it unchanged.
    pub fn new<K>(key: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        if let Some(token) = (&key as &dyn Any).downcast_ref::<CancelToken>() {
            return token.clone();
        }
        Self { key: Arc::new(key) }
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        self.key.eq_key(other.key.as_ref())
    }
}

impl Eq for CancelToken {}

impl Hash for CancelToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash_key(state);
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelToken").field(&self.key.debug()).finish()
    }
}

trait TokenKey: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn eq_key(&self, other: &dyn TokenKey) -> bool;
    fn hash_key(&self, state: &mut dyn Hasher);
    fn debug(&self) -> &dyn fmt::Debug;
}

impl<K> TokenKey for K
where
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_key(&self, other: &dyn TokenKey) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .is_some_and(|other| self == other)
    }

    fn hash_key(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<K>().hash(&mut state);
        self.hash(&mut state);
    }

    fn debug(&self) -> &dyn fmt::Debug {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Hash, PartialEq, Eq)]
    struct First;

    #[derive(Debug, Hash, PartialEq, Eq)]
    struct Second;

    #[test]
    fn equal_keys_of_same_type_are_equal() {
        assert_eq!(CancelToken::new("search"), CancelToken::new("search"));
        assert_eq!(CancelToken::new(First), CancelToken::new(First));
    }

    #[test]
    fn unit_structs_of_different_types_never_collide() {
        assert_ne!(CancelToken::new(First), CancelToken::new(Second));

        let mut set = HashSet::new();
        set.insert(CancelToken::new(First));
        set.insert(CancelToken::new(Second));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn same_value_different_type_is_distinct() {
        assert_ne!(CancelToken::new(1u32), CancelToken::new(1u64));
    }

    #[test]
    fn wrapping_a_token_is_a_noop() {
        let token = CancelToken::new(First);
        let rewrapped = CancelToken::new(token.clone());
        assert_eq!(token, rewrapped);
    }

    #[test]
    fn debug_shows_inner_key() {
        assert_eq!(format!("{:?}", CancelToken::new(First)), "CancelToken(First)");
    }
}
