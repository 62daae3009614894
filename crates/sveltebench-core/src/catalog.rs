//! Model listings per provider, cached with an explicit expiry.

use crate::config::ApiKey;
use crate::error::{BenchError, Result};
use crate::providers::{AuthStyle, Provider};
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

// ============================================================================
// CACHE
// ============================================================================

/// Outcome of a cache lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum CacheLookup<'a, V> {
    Hit(&'a V),
    /// Present, but older than the TTL.
    Expired(&'a V),
    Miss,
}

/// Key-value cache where every entry expires `ttl` after insertion.
///
/// Time is passed in by the caller so expiry is deterministic in tests.
#[derive(Debug)]
pub struct ExpiringCache<V> {
    ttl: Duration,
    entries: HashMap<String, (V, Instant)>,
}

impl<V> ExpiringCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self, key: &str, now: Instant) -> CacheLookup<'_, V> {
        match self.entries.get(key) {
            Some((value, expires_at)) if now < *expires_at => CacheLookup::Hit(value),
            Some((value, _)) => CacheLookup::Expired(value),
            None => CacheLookup::Miss,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V, now: Instant) {
        self.entries.insert(key.into(), (value, now + self.ttl));
    }
}

// ============================================================================
// SOURCES
// ============================================================================

#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn fetch(&self, provider: &Provider, key: &ApiKey) -> Result<Vec<Model>>;
}

/// Lists models through a provider's OpenAI-style `GET /models` endpoint.
pub struct HttpModelSource {
    client: Client,
}

impl HttpModelSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("failed to build client: {e}"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ModelSource for HttpModelSource {
    async fn fetch(&self, provider: &Provider, key: &ApiKey) -> Result<Vec<Model>> {
        let url = provider
            .models_url
            .ok_or_else(|| BenchError::UnsupportedProvider(provider.id.to_string()))?;

        let req = self.client.get(url);
        let req = match provider.auth {
            AuthStyle::Bearer => req.bearer_auth(key.expose()),
            AuthStyle::Anthropic => req
                .header("x-api-key", key.expose())
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(anyhow!("{} returned status {status}", provider.display_name).into());
        }
        let body = resp.bytes().await?;
        let models = parse_model_list(&body)?;
        debug!(provider = provider.id, count = models.len(), "fetched models");
        Ok(models)
    }
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default, alias = "display_name")]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse a `{"data": [{"id": ...}, ...]}` listing, sorted by id.
pub fn parse_model_list(body: &[u8]) -> Result<Vec<Model>> {
    let list: ModelList =
        serde_json::from_slice(body).map_err(|e| anyhow!("unexpected model listing: {e}"))?;
    let mut models: Vec<Model> = list
        .data
        .into_iter()
        .map(|entry| Model {
            name: entry
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| entry.id.clone()),
            id: entry.id,
            description: entry.description.filter(|d| !d.trim().is_empty()),
        })
        .collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(models)
}

// ============================================================================
// CATALOG
// ============================================================================

/// Model source plus a per-provider cache.
pub struct ModelCatalog<S> {
    source: S,
    cache: ExpiringCache<Vec<Model>>,
}

impl<S: ModelSource> ModelCatalog<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            cache: ExpiringCache::new(ttl),
        }
    }

    /// Models for `provider`, fetched at most once per TTL.
    pub async fn models(&mut self, provider: &Provider, key: &ApiKey) -> Result<Vec<Model>> {
        let now = Instant::now();
        match self.cache.lookup(provider.id, now) {
            CacheLookup::Hit(models) => return Ok(models.clone()),
            CacheLookup::Expired(_) => debug!(provider = provider.id, "model cache expired"),
            CacheLookup::Miss => {}
        }
        let models = self.source.fetch(provider, key).await?;
        self.cache.insert(provider.id, models.clone(), Instant::now());
        Ok(models)
    }
}

/// Case-insensitive substring filter over id and name.
pub fn filter_models<'a>(models: &'a [Model], query: &str) -> Vec<&'a Model> {
    let query = query.trim().to_lowercase();
    models
        .iter()
        .filter(|m| {
            query.is_empty()
                || m.id.to_lowercase().contains(&query)
                || m.name.to_lowercase().contains(&query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::lookup;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn cache_reports_hit_expired_and_miss() {
        let start = Instant::now();
        let mut cache = ExpiringCache::new(Duration::from_secs(300));
        assert_eq!(cache.lookup("openai", start), CacheLookup::Miss);

        cache.insert("openai", 1, start);
        assert_eq!(
            cache.lookup("openai", start + Duration::from_secs(299)),
            CacheLookup::Hit(&1)
        );
        assert_eq!(
            cache.lookup("openai", start + Duration::from_secs(300)),
            CacheLookup::Expired(&1)
        );
        assert_eq!(cache.lookup("groq", start), CacheLookup::Miss);

        // Refreshing an expired entry restarts its TTL.
        let later = start + Duration::from_secs(400);
        cache.insert("openai", 2, later);
        assert_eq!(cache.lookup("openai", later), CacheLookup::Hit(&2));
    }

    #[test]
    fn parses_openai_and_anthropic_listings() {
        let openai = br#"{"object":"list","data":[{"id":"gpt-4o","created":1},{"id":"gpt-4o-mini","created":2}]}"#;
        let models = parse_model_list(openai).unwrap();
        assert_eq!(models[0].id, "gpt-4o");
        assert_eq!(models[0].name, "gpt-4o");

        let anthropic = br#"{"data":[{"id":"claude-sonnet-4","display_name":"Claude Sonnet 4","type":"model"}],"has_more":false}"#;
        let models = parse_model_list(anthropic).unwrap();
        assert_eq!(models[0].name, "Claude Sonnet 4");

        assert!(parse_model_list(b"<html>").is_err());
    }

    #[test]
    fn filter_matches_id_or_name() {
        let models = vec![
            Model {
                id: "gpt-4o".into(),
                name: "GPT-4o".into(),
                description: None,
            },
            Model {
                id: "o1-mini".into(),
                name: "o1 mini".into(),
                description: None,
            },
        ];
        assert_eq!(filter_models(&models, "GPT").len(), 1);
        assert_eq!(filter_models(&models, " mini").len(), 1);
        assert_eq!(filter_models(&models, "").len(), 2);
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ModelSource for CountingSource {
        async fn fetch(&self, _provider: &Provider, _key: &ApiKey) -> Result<Vec<Model>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Model {
                id: "m".into(),
                name: "m".into(),
                description: None,
            }])
        }
    }

    #[tokio::test]
    async fn catalog_fetches_once_per_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut catalog = ModelCatalog::new(
            CountingSource {
                calls: calls.clone(),
            },
            Duration::from_secs(300),
        );
        let openai = lookup("openai").unwrap();
        let groq = lookup("groq").unwrap();
        let key = ApiKey::new("k");

        catalog.models(openai, &key).await.unwrap();
        catalog.models(openai, &key).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        catalog.models(groq, &key).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut catalog = ModelCatalog::new(
            CountingSource {
                calls: calls.clone(),
            },
            Duration::ZERO,
        );
        let openai = lookup("openai").unwrap();
        let key = ApiKey::new("k");
        catalog.models(openai, &key).await.unwrap();
        catalog.models(openai, &key).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn providers_without_listing_are_unsupported() {
        let source = HttpModelSource::new().unwrap();
        let err = source
            .fetch(lookup("google").unwrap(), &ApiKey::new("k"))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedProvider(ref p) if p == "google"));
    }
}
