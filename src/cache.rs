use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Identifies one rendered page: the route, the requested page number and the
/// viewer the page was rendered for (navigation differs per viewer).
///
/// The page is stored parsed; values that are not integers all render page 1
/// and share the `None` slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub route: String,
    pub page: Option<i64>,
    pub viewer: Option<String>,
}

impl CacheKey {
    pub fn new(route: impl Into<String>, page: Option<&str>, viewer: Option<&str>) -> Self {
        Self {
            route: route.into(),
            page: page.and_then(|p| p.trim().parse::<i64>().ok()),
            viewer: viewer.map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPage {
    body: String,
    expires_at: Instant,
}

/// Time-bounded store of rendered HTML pages.
///
/// Entries are served unchanged until they expire or are invalidated, so a
/// cached feed is a snapshot: posts removed from the database stay visible
/// until the entry goes away.
///
/// Every invalidation bumps a generation counter. A page rendered before an
/// invalidation carries the old generation and is refused on insert.
pub struct PageCache {
    ttl: Duration,
    generation: u64,
    pages: HashMap<CacheKey, CachedPage>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: 0,
            pages: HashMap::new(),
        }
    }

    /// Current generation; read it on a miss and hand it back to `insert`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Return the cached body for `key` if it is still fresh.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        let now = Instant::now();
        match self.pages.get(key) {
            Some(page) if now < page.expires_at => Some(page.body.clone()),
            Some(_) => {
                self.pages.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `body` unless the cache was invalidated since `generation` was
    /// read. Returns whether the page was stored.
    pub fn insert(&mut self, key: CacheKey, body: String, generation: u64) -> bool {
        if generation != self.generation {
            tracing::debug!("Dropping page rendered before invalidation: {:?}", key);
            return false;
        }

        self.clear_stale();
        self.pages.insert(
            key,
            CachedPage {
                body,
                expires_at: Instant::now() + self.ttl,
            },
        );
        true
    }

    /// Drop every cached page of one route. Returns how many were removed.
    pub fn invalidate_route(&mut self, route: &str) -> usize {
        self.generation += 1;
        let before = self.pages.len();
        self.pages.retain(|key, _| key.route != route);
        let removed = before - self.pages.len();
        if removed > 0 {
            tracing::debug!("Invalidated {} cached pages for {}", removed, route);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.pages.retain(|_, page| now < page.expires_at);
    }
}
