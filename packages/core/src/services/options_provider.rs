//! Remote Options Provider
//!
//! Fields whose option list lives on a server declare an `optionsEndpoint`,
//! optionally with `{{param}}` placeholders filled from current field values:
//!
//! ```json
//! { "name": "city", "type": "select", "dependsOn": "state",
//!   "optionsEndpoint": "/api/cities?state={{state}}" }
//! ```
//!
//! The transport is an external collaborator behind [`OptionsProvider`].
//! [`CachedOptionsProvider`] adds a time-based cache keyed by the whole
//! resolved request (method, endpoint and parent values); callers cannot tell
//! a cache hit from a fresh fetch.
//!
//! # Cache Invalidation
//!
//! - **Time-based**: entries expire after the TTL (default 300 seconds)
//! - **Explicit**: `invalidate()` drops every entry
//! - Failed fetches are never cached

use crate::models::{value_key, FormValues, OptionItem};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).unwrap())
}

/// A fully resolved options fetch
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsRequest {
    /// Endpoint with every placeholder substituted
    pub endpoint: String,
    /// Values substituted into the endpoint, by field name
    pub params: BTreeMap<String, Value>,
    pub method: String,
}

impl OptionsRequest {
    /// Identity of the request for caching
    ///
    /// Parent values travel in `params` even when the endpoint has no
    /// placeholder for them, so the endpoint alone does not identify a list.
    pub fn cache_key(&self) -> String {
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        format!("{} {} {}", self.method, self.endpoint, params)
    }
}

/// Fetches option lists from a remote source
#[async_trait]
pub trait OptionsProvider: Send + Sync {
    async fn fetch_options(&self, request: &OptionsRequest) -> anyhow::Result<Vec<OptionItem>>;
}

/// Substitute `{{param}}` placeholders from `values`
///
/// Returns `None` when any placeholder names a field without a usable value,
/// in which case no fetch should happen.
pub fn resolve_endpoint(template: &str, values: &FormValues) -> Option<(String, BTreeMap<String, Value>)> {
    let placeholder = placeholder_regex();
    let mut params = BTreeMap::new();
    let mut resolved = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder.captures_iter(template) {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        let value = values.get(name)?;
        let key = value_key(value)?;

        resolved.push_str(&template[last..whole.start()]);
        resolved.push_str(&key);
        last = whole.end();
        params.insert(name.to_string(), value.clone());
    }
    resolved.push_str(&template[last..]);

    Some((resolved, params))
}

/// Names referenced by `{{param}}` placeholders, in order of appearance
pub fn endpoint_params(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

struct CacheEntry {
    fetched_at: Instant,
    options: Vec<OptionItem>,
}

/// TTL cache in front of another provider
pub struct CachedOptionsProvider {
    inner: Arc<dyn OptionsProvider>,

    /// Map: request cache key → options
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Entry lifetime (defaults to 300 seconds)
    cache_ttl: Duration,
}

impl CachedOptionsProvider {
    pub fn new(inner: Arc<dyn OptionsProvider>) -> Self {
        Self::with_ttl(inner, Duration::from_secs(300))
    }

    /// Create a cache with custom TTL
    pub fn with_ttl(inner: Arc<dyn OptionsProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl: ttl,
        }
    }

    /// Drop every cached entry
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    /// Number of entries, including expired ones not yet replaced
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl OptionsProvider for CachedOptionsProvider {
    async fn fetch_options(&self, request: &OptionsRequest) -> anyhow::Result<Vec<OptionItem>> {
        let key = request.cache_key();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.options.clone());
                }
            }
        }

        let options = self.inner.fetch_options(request).await?;

        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                options: options.clone(),
            },
        );
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OptionsProvider for CountingProvider {
        async fn fetch_options(&self, request: &OptionsRequest) -> anyhow::Result<Vec<OptionItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(vec![OptionItem::new(request.endpoint.clone(), "Only")])
        }
    }

    fn request(endpoint: &str) -> OptionsRequest {
        OptionsRequest {
            endpoint: endpoint.to_string(),
            params: BTreeMap::new(),
            method: "GET".to_string(),
        }
    }

    #[test]
    fn test_resolve_endpoint() {
        let values: FormValues =
            serde_json::from_value(json!({"country": "usa", "state": "ca", "empty": ""})).unwrap();

        let (url, params) =
            resolve_endpoint("/api/cities?country={{country}}&state={{ state }}", &values).unwrap();
        assert_eq!(url, "/api/cities?country=usa&state=ca");
        assert_eq!(params["state"], json!("ca"));

        assert!(resolve_endpoint("/api/x?e={{empty}}", &values).is_none());
        assert!(resolve_endpoint("/api/x?m={{missing}}", &values).is_none());
        assert_eq!(
            resolve_endpoint("/api/static", &values).unwrap().0,
            "/api/static"
        );
    }

    #[test]
    fn test_endpoint_params() {
        assert_eq!(
            endpoint_params("/a/{{country}}/b?s={{state}}"),
            vec!["country".to_string(), "state".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_and_expiry() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cached = CachedOptionsProvider::with_ttl(inner.clone(), Duration::from_secs(60));

        let first = cached.fetch_options(&request("/api/a")).await.unwrap();
        let second = cached.fetch_options(&request("/api/a")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cached.fetch_options(&request("/api/a")).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        cached.invalidate().await;
        assert!(cached.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_distinguishes_params_and_method() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cached = CachedOptionsProvider::new(inner.clone());

        let mut ny = request("/api/cities");
        ny.params.insert("state".to_string(), json!("ny"));
        let mut ca = request("/api/cities");
        ca.params.insert("state".to_string(), json!("ca"));
        let mut ny_post = ny.clone();
        ny_post.method = "POST".to_string();

        cached.fetch_options(&ny).await.unwrap();
        cached.fetch_options(&ca).await.unwrap();
        cached.fetch_options(&ny_post).await.unwrap();
        cached.fetch_options(&ny).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.len().await, 3);
        assert_ne!(ny.cache_key(), ca.cache_key());
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cached = CachedOptionsProvider::new(inner.clone());

        assert!(cached.fetch_options(&request("/api/a")).await.is_err());
        assert!(cached.fetch_options(&request("/api/a")).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.len().await, 0);
    }
}
