//! Short-TTL cache for rendered HTML fragments.
//!
//! The index feed is the only cached render. The cache is an explicit
//! abstraction rather than a framework layer: handlers call
//! [`PageCache::get_or_populate`] with a key and TTL, and invalidation is
//! an explicit call. Nothing in the normal write path invalidates the
//! entry, so a fresh post stays off the cached index until the entry
//! expires or is cleared.

use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    body: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct PageCache {
    entries: HashMap<String, CacheEntry>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached body for `key`, or run `populate`, store its
    /// output for `ttl`, and return it. A failed populate stores nothing.
    pub fn get_or_populate<F, E>(
        &mut self,
        key: &str,
        ttl: Duration,
        populate: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.body.clone());
            }
        }

        let body = populate()?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                body: body.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(body)
    }

    /// Drop one entry. The next request repopulates it.
    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn second_lookup_skips_populate() {
        let mut cache = PageCache::new();
        let mut calls = 0;

        let first = cache
            .get_or_populate::<_, ()>("index:p1", TTL, || {
                calls += 1;
                Ok("rendered".to_string())
            })
            .unwrap();
        let second = cache
            .get_or_populate::<_, ()>("index:p1", TTL, || {
                calls += 1;
                Ok("rendered again".to_string())
            })
            .unwrap();

        assert_eq!(first, "rendered");
        assert_eq!(second, "rendered");
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let mut cache = PageCache::new();

        cache
            .get_or_populate::<_, ()>("k", Duration::ZERO, || Ok("one".to_string()))
            .unwrap();
        let second = cache
            .get_or_populate::<_, ()>("k", Duration::ZERO, || Ok("two".to_string()))
            .unwrap();

        assert_eq!(second, "two");
    }

    #[test]
    fn invalidate_forces_repopulate() {
        let mut cache = PageCache::new();

        cache
            .get_or_populate::<_, ()>("k", TTL, || Ok("stale".to_string()))
            .unwrap();
        cache.invalidate("k");
        let fresh = cache
            .get_or_populate::<_, ()>("k", TTL, || Ok("fresh".to_string()))
            .unwrap();

        assert_eq!(fresh, "fresh");
    }

    #[test]
    fn clear_drops_all_keys() {
        let mut cache = PageCache::new();
        cache
            .get_or_populate::<_, ()>("a", TTL, || Ok("a1".to_string()))
            .unwrap();
        cache
            .get_or_populate::<_, ()>("b", TTL, || Ok("b1".to_string()))
            .unwrap();

        cache.clear();

        let a = cache
            .get_or_populate::<_, ()>("a", TTL, || Ok("a2".to_string()))
            .unwrap();
        let b = cache
            .get_or_populate::<_, ()>("b", TTL, || Ok("b2".to_string()))
            .unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("a2", "b2"));
    }

    #[test]
    fn keys_are_independent() {
        let mut cache = PageCache::new();
        cache
            .get_or_populate::<_, ()>("index:p1", TTL, || Ok("page one".to_string()))
            .unwrap();
        let p2 = cache
            .get_or_populate::<_, ()>("index:p2", TTL, || Ok("page two".to_string()))
            .unwrap();
        assert_eq!(p2, "page two");
    }

    #[test]
    fn failed_populate_is_not_cached() {
        let mut cache = PageCache::new();

        let err: Result<String, &str> = cache.get_or_populate("k", TTL, || Err("render failed"));
        assert_eq!(err, Err("render failed"));

        let ok = cache
            .get_or_populate::<_, &str>("k", TTL, || Ok("recovered".to_string()))
            .unwrap();
        assert_eq!(ok, "recovered");
    }
}
