//! Per-call attribute store shared by every interceptor of one chain invocation.
//!
//! A [`Context`] is created when a logical call starts, survives every redirect hop and retry
//! attempt of that call and is dropped once the call resolves. Attributes are addressed through
//! typed [`AttrKey`]s, so a value is always read back with the type it was stored with.
//!
//! Counters maintained by the interceptors are replaced through [`Context::reset`] (remove, then
//! set) instead of being updated in place.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A typed name for a [`Context`] attribute.
pub struct AttrKey<T> {
    name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> AttrKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self { name, _phantom: PhantomData }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttrKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttrKey<T> {}

impl<T> fmt::Debug for AttrKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttrKey").field(&self.name).finish()
    }
}

/// Attribute keys understood by the execution core.
pub mod names {
    use super::AttrKey;

    /// Redirect limit of the call, `0` disables redirect following
    pub const MAX_REDIRECTS: AttrKey<u32> = AttrKey::new("$max.redirects");

    /// Redirects followed so far
    pub const REDIRECTED_COUNT: AttrKey<u32> = AttrKey::new("$redirected.count");

    /// Retry limit of the call, `0` disables retrying
    pub const MAX_RETRIES: AttrKey<u32> = AttrKey::new("$max.retries");

    /// Retries performed so far
    pub const RETRIED_COUNT: AttrKey<u32> = AttrKey::new("$retried.count");

    /// Hold back the request body until the peer answers `100 Continue`
    pub const EXPECT_CONTINUE_ENABLED: AttrKey<bool> = AttrKey::new("$expect.continue.enabled");
}

#[derive(Default)]
pub struct Context {
    attrs: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the attribute, `None` when it is absent.
    pub fn get<T>(&self, key: &AttrKey<T>) -> Option<T>
    where
        T: Any + Clone,
    {
        self.attrs.get(key.name).and_then(|value| value.downcast_ref::<T>()).cloned()
    }

    pub fn get_or<T>(&self, key: &AttrKey<T>, default: T) -> T
    where
        T: Any + Clone,
    {
        self.get(key).unwrap_or(default)
    }

    /// Stores the attribute, returning the previous value if there was one of the same type.
    pub fn set<T>(&mut self, key: &AttrKey<T>, value: T) -> Option<T>
    where
        T: Any + Send + Sync,
    {
        self.attrs
            .insert(key.name, Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    pub fn remove<T>(&mut self, key: &AttrKey<T>) -> Option<T>
    where
        T: Any + Send + Sync,
    {
        self.attrs.remove(key.name).and_then(|previous| previous.downcast::<T>().ok()).map(|previous| *previous)
    }

    /// Replaces the attribute: the old entry is removed before the new one is stored.
    pub fn reset<T>(&mut self, key: &AttrKey<T>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.remove(key);
        self.set(key, value);
    }

    pub fn contains<T>(&self, key: &AttrKey<T>) -> bool {
        self.attrs.contains_key(key.name)
    }

    pub fn clear(&mut self) {
        self.attrs.clear();
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("attrs", &self.attrs.keys().collect::<Vec<_>>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::names::*;
    use super::*;

    const TRACE_ID: AttrKey<String> = AttrKey::new("trace.id");

    #[test]
    fn get_with_default() {
        let mut ctx = Context::new();
        assert_eq!(ctx.get_or(&MAX_REDIRECTS, 0), 0);
        assert_eq!(ctx.get(&MAX_REDIRECTS), None);

        ctx.set(&MAX_REDIRECTS, 5);
        assert_eq!(ctx.get_or(&MAX_REDIRECTS, 0), 5);
        assert!(ctx.contains(&MAX_REDIRECTS));
    }

    #[test]
    fn set_returns_previous() {
        let mut ctx = Context::new();
        assert_eq!(ctx.set(&TRACE_ID, "a".to_string()), None);
        assert_eq!(ctx.set(&TRACE_ID, "b".to_string()), Some("a".to_string()));
        assert_eq!(ctx.get(&TRACE_ID).as_deref(), Some("b"));
    }

    #[test]
    fn reset_and_remove() {
        let mut ctx = Context::new();
        ctx.reset(&RETRIED_COUNT, 1);
        ctx.reset(&RETRIED_COUNT, 2);
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(2));
        assert_eq!(ctx.len(), 1);

        assert_eq!(ctx.remove(&RETRIED_COUNT), Some(2));
        assert!(!ctx.contains(&RETRIED_COUNT));
        assert_eq!(ctx.remove(&RETRIED_COUNT), None);
    }

    #[test]
    fn mismatched_type_reads_as_absent() {
        const SAME_NAME: AttrKey<bool> = AttrKey::new("$max.redirects");

        let mut ctx = Context::new();
        ctx.set(&MAX_REDIRECTS, 3);
        assert_eq!(ctx.get(&SAME_NAME), None);
        assert!(ctx.get_or(&SAME_NAME, true));
    }

    #[test]
    fn clear_drops_everything() {
        let mut ctx = Context::new();
        ctx.set(&MAX_RETRIES, 2);
        ctx.set(&EXPECT_CONTINUE_ENABLED, true);
        ctx.clear();
        assert!(ctx.is_empty());
    }
}
