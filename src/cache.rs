use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::recommendation::Recommender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCacheKey {
    pub prompt_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResponse {
    model: String,
    text: String,
}

pub struct ResponseCache {
    cache_dir: PathBuf,
}

impl ResponseCache {
    pub async fn new() -> Result<Self> {
        Self::in_dir(get_cache_directory()?).await
    }

    pub async fn in_dir(cache_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .context("Failed to create cache directory")?;

        Ok(Self { cache_dir })
    }

    pub async fn get(&self, key: &ResponseCacheKey) -> Option<String> {
        match cacache::read(&self.cache_dir, &key.prompt_hash).await {
            Ok(data) => serde_json::from_slice::<CachedResponse>(&data)
                .ok()
                .map(|cached| {
                    debug!(model = %cached.model, "Using cached response");
                    cached.text
                }),
            Err(_) => None,
        }
    }

    pub async fn insert(&self, key: ResponseCacheKey, model: &str, text: &str) {
        let value = CachedResponse {
            model: model.to_owned(),
            text: text.to_owned(),
        };
        let serialized = match serde_json::to_vec(&value) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!("Failed to serialize cached response: {error}");
                return;
            }
        };
        if let Err(error) = cacache::write(&self.cache_dir, &key.prompt_hash, serialized).await {
            warn!("Failed to write cached response: {error}");
        }
    }
}

fn get_cache_directory() -> Result<PathBuf> {
    let cache_base = dirs::cache_dir().context("Failed to determine cache directory")?;
    Ok(cache_base.join(env!("CARGO_CRATE_NAME")))
}

pub fn compute_prompt_hash(scope: &str, prompt: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update([0]);
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serves repeated prompts from the on-disk cache. Only successful
/// completions are stored. `scope` identifies the request settings the
/// replies were produced with.
pub struct CachedRecommender<R> {
    inner: R,
    cache: ResponseCache,
    scope: String,
}

impl<R: Recommender> CachedRecommender<R> {
    pub fn new(inner: R, cache: ResponseCache, scope: String) -> Self {
        Self {
            inner,
            cache,
            scope,
        }
    }
}

#[async_trait]
impl<R: Recommender> Recommender for CachedRecommender<R> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let key = ResponseCacheKey {
            prompt_hash: compute_prompt_hash(&self.scope, prompt),
        };

        if let Some(text) = self.cache.get(&key).await {
            return Ok(text);
        }

        let text = self.inner.complete(prompt).await?;
        self.cache.insert(key, self.inner.model(), &text).await;
        Ok(text)
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::recommendation::testing::Scripted;

    async fn cached(
        inner: Scripted,
        dir: &tempfile::TempDir,
        config: &Config,
    ) -> CachedRecommender<Scripted> {
        let cache = ResponseCache::in_dir(dir.path().to_path_buf()).await.unwrap();
        CachedRecommender::new(inner, cache, config.cache_scope())
    }

    #[test]
    fn hash_depends_on_scope_and_prompt() {
        let hash = compute_prompt_hash("llama3-8b-8192", "I like sci-fi");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_prompt_hash("llama3-8b-8192", "I like sci-fi"));
        assert_ne!(hash, compute_prompt_hash("llama3-70b-8192", "I like sci-fi"));
        assert_ne!(hash, compute_prompt_hash("llama3-8b-8192", "I like noir"));
    }

    #[tokio::test]
    async fn repeated_prompt_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let recommender = cached(Scripted::replying("Try Alien"), &dir, &Config::default()).await;

        assert_eq!(recommender.complete("horror").await.unwrap(), "Try Alien");
        assert_eq!(recommender.complete("horror").await.unwrap(), "Try Alien");
        assert_eq!(recommender.inner.calls(), 1);

        recommender.complete("comedy").await.unwrap();
        assert_eq!(recommender.inner.calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let recommender = cached(Scripted::failing(), &dir, &Config::default()).await;

        assert!(recommender.complete("horror").await.is_err());
        assert!(recommender.complete("horror").await.is_err());
        assert_eq!(recommender.inner.calls(), 2);
    }

    #[tokio::test]
    async fn changed_request_settings_miss_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let warm = cached(Scripted::replying("Try Alien"), &dir, &config).await;
        warm.complete("horror").await.unwrap();

        let hotter = Config {
            temperature: Some(1.2),
            ..config.clone()
        };
        let elsewhere = Config {
            base_url: "http://localhost:8080/v1".to_owned(),
            ..config.clone()
        };
        let shorter = Config {
            max_tokens: Some(64),
            ..config.clone()
        };
        for changed in [hotter, elsewhere, shorter] {
            let recommender = cached(Scripted::replying("Try The Thing"), &dir, &changed).await;
            assert_eq!(recommender.complete("horror").await.unwrap(), "Try The Thing");
            assert_eq!(recommender.inner.calls(), 1);
        }

        let same = cached(Scripted::replying("unused"), &dir, &config).await;
        assert_eq!(same.complete("horror").await.unwrap(), "Try Alien");
        assert_eq!(same.inner.calls(), 0);
    }

    #[tokio::test]
    async fn unwritable_cache_still_returns_reply() {
        let dir = tempfile::tempdir().unwrap();
        let recommender = cached(Scripted::replying("Try Alien"), &dir, &Config::default()).await;
        let blocker = dir.path().join("content-v2");
        tokio::fs::remove_dir_all(&blocker).await.ok();
        tokio::fs::write(&blocker, b"not a directory").await.unwrap();

        assert_eq!(recommender.complete("horror").await.unwrap(), "Try Alien");
        assert_eq!(recommender.complete("horror").await.unwrap(), "Try Alien");
        assert_eq!(recommender.inner.calls(), 2);
    }
}
