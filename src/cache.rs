//! Per-session memo of resolved values.

use std::collections::HashMap;

use tracing::debug;

use crate::errors::Result;
use crate::store::Id;

/// `(scope-name, field, instance)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: String,
    pub field: String,
    pub instance: Id,
}

impl CacheKey {
    pub fn new(scope: impl Into<String>, field: impl Into<String>, instance: Id) -> Self {
        Self { scope: scope.into(), field: field.into(), instance }
    }
}

/// Owned by one engine instance; dropped with it.
#[derive(Debug, Default)]
pub struct LookupCache {
    values: HashMap<CacheKey, String>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or run `compute` and remember its result.
    ///
    /// `None` and empty results are handed back but not stored, so the next call
    /// with the same key looks them up again. Errors are never stored either.
    pub fn get_or_compute<F>(&mut self, key: CacheKey, compute: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Result<Option<String>>,
    {
        if let Some(v) = self.values.get(&key) {
            debug!(scope = %key.scope, field = %key.field, instance = key.instance, "cache hit");
            return Ok(Some(v.clone()));
        }
        let value = compute()?;
        debug!(scope = %key.scope, field = %key.field, instance = key.instance, "cache miss");
        match &value {
            Some(v) if !v.is_empty() => {
                self.values.insert(key, v.clone());
            }
            _ => {}
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FilterError;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[test]
    fn computes_once_per_key() {
        let mut cache = LookupCache::new();
        let runs = Cell::new(0);
        let key = CacheKey::new("user", "EMAIL", 2);
        for _ in 0..3 {
            let v = cache
                .get_or_compute(key.clone(), || {
                    runs.set(runs.get() + 1);
                    Ok(Some("a@b.com".to_string()))
                })
                .unwrap();
            assert_eq!(v.as_deref(), Some("a@b.com"));
        }
        assert_eq!(runs.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_instances_are_distinct_keys() {
        let mut cache = LookupCache::new();
        cache.get_or_compute(CacheKey::new("user", "EMAIL", 1), || Ok(Some("one".into()))).unwrap();
        let v = cache.get_or_compute(CacheKey::new("user", "EMAIL", 2), || Ok(Some("two".into()))).unwrap();
        assert_eq!(v.as_deref(), Some("two"));
        assert_eq!(cache.len(), 2);
    }

    // Empty values are indistinguishable from "never looked up" and get recomputed.
    #[test]
    fn empty_values_are_recomputed() {
        let mut cache = LookupCache::new();
        let runs = Cell::new(0);
        for _ in 0..2 {
            cache
                .get_or_compute(CacheKey::new("user", "PHONE1", 2), || {
                    runs.set(runs.get() + 1);
                    Ok(Some(String::new()))
                })
                .unwrap();
            cache
                .get_or_compute(CacheKey::new("metadata:course", "credits", 5), || {
                    runs.set(runs.get() + 1);
                    Ok(None)
                })
                .unwrap();
        }
        assert_eq!(runs.get(), 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache = LookupCache::new();
        let key = CacheKey::new("course", "FULLNAME", 5);
        let err = cache.get_or_compute(key.clone(), || Err(FilterError::DataAccess("down".into())));
        assert!(err.is_err());
        let v = cache.get_or_compute(key, || Ok(Some("Physics".into()))).unwrap();
        assert_eq!(v.as_deref(), Some("Physics"));
    }
}
