//! Two-tier response cache: install-time manifest plus runtime fills.
//!
//! ### Install
//! Every manifest URL must answer with a 2xx before anything is stored; the
//! batch is written in one transaction.
//!
//! ### Fetch
//! Cache first across all caches. On a miss the network answers; a 200 from
//! the shell's own origin is copied into the runtime cache on a spawned task
//! while the response goes straight back to the page.
//!
//! ### Offline
//! Documents fall back to the cached offline document, images to an inline
//! SVG placeholder; anything else propagates the network error.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::try_join_all;
use reqwest::Method;
use serde::Serialize;

use noor_core::{AppConfig, CachedResponse, Error, Store};

use crate::fetch::{Destination, Network, Request, Response, ResponseType, resolve};

/// Background sync tag that refreshes the prayer table.
pub const PRAYER_TIMES_SYNC: &str = "prayer-times-sync";

const PLACEHOLDER_SVG: &str = concat!(
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200">"#,
    r##"<rect width="200" height="200" fill="#f0f0f0"/>"##,
    r##"<text x="50%" y="50%" text-anchor="middle" dy=".3em" fill="#999">صورة غير متاحة</text></svg>"##,
);

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Network,
    Fallback,
    /// Not intercepted: passed straight to the network.
    Bypass,
}

#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
    /// Cache that answered, for [`Source::Cache`] and cached fallbacks.
    pub cache: Option<String>,
}

/// Static and dynamic caches over the store.
#[derive(Clone)]
pub struct CacheManager {
    store: Store,
    network: Arc<dyn Network>,
    origin: url::Url,
    static_cache: String,
    dynamic_cache: String,
    precache: Vec<String>,
    offline_document: String,
    sync_url: String,
}

impl CacheManager {
    pub fn new(store: Store, network: Arc<dyn Network>, config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            store,
            network,
            origin,
            static_cache: config.static_cache.clone(),
            dynamic_cache: config.dynamic_cache.clone(),
            precache: config.precache_urls.clone(),
            offline_document: config.offline_document.clone(),
            sync_url: config.sync_url.clone(),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn origin(&self) -> &url::Url {
        &self.origin
    }

    pub fn static_cache(&self) -> &str {
        &self.static_cache
    }

    pub fn dynamic_cache(&self) -> &str {
        &self.dynamic_cache
    }

    /// Resolve a page-relative or absolute URL to its cache key form.
    pub fn resolve(&self, input: &str) -> Result<url::Url, Error> {
        resolve(&self.origin, input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))
    }

    /// Fetch the whole manifest and store it in the static cache.
    ///
    /// All or nothing: the first failed or non-2xx response aborts the
    /// install and the static cache is left untouched.
    pub async fn install(&self) -> Result<usize, Error> {
        let urls = self
            .precache
            .iter()
            .map(|u| self.resolve(u))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::PrecacheFailed(e.to_string()))?;

        tracing::info!(cache = %self.static_cache, count = urls.len(), "caching static files");

        let fetches = urls.into_iter().map(|url| {
            let network = Arc::clone(&self.network);
            async move {
                let request = Request::get(url.clone(), Destination::Empty);
                let response = network
                    .fetch(&request)
                    .await
                    .map_err(|e| Error::PrecacheFailed(e.to_string()))?;
                if !response.ok() {
                    return Err(Error::PrecacheFailed(format!("{url}: status {}", response.status)));
                }
                Ok::<_, Error>(response.to_cached(url.as_str()))
            }
        });

        let entries = try_join_all(fetches).await?;
        let count = entries.len();
        self.store.put_all_responses(&self.static_cache, entries).await?;

        tracing::info!(cache = %self.static_cache, count, "static files cached");
        Ok(count)
    }

    /// Delete every cache except the current static and dynamic ones.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.cache_names().await? {
            if name != self.static_cache && name != self.dynamic_cache {
                tracing::info!(cache = %name, "deleting old cache");
                self.store.delete_cache(&name).await?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Answer a page request.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Served, Error> {
        if request.method != Method::GET || !matches!(request.url.scheme(), "http" | "https") {
            return self.bypass(request).await;
        }

        let mut keyed = request.url.clone();
        keyed.set_fragment(None);
        let key = keyed.as_str();

        if let Some((cache, entry)) = self.store.match_any(key).await? {
            tracing::debug!(url = key, cache = %cache, "cache hit");
            return Ok(Served {
                response: Response::from_cached(request.url.clone(), entry),
                source: Source::Cache,
                cache: Some(cache),
            });
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && response.response_type == ResponseType::Basic {
                    self.spawn_dynamic_put(response.to_cached(key));
                } else {
                    tracing::debug!(url = key, status = response.status, "not caching response");
                }
                Ok(Served { response, source: Source::Network, cache: None })
            }
            Err(e) => self.offline_fallback(request, e).await,
        }
    }

    /// Send a request straight to the network, skipping both caches.
    pub async fn bypass(&self, request: &Request) -> Result<Served, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Served { response, source: Source::Bypass, cache: None })
    }

    fn spawn_dynamic_put(&self, entry: CachedResponse) {
        let store = self.store.clone();
        let cache = self.dynamic_cache.clone();
        tokio::spawn(async move {
            if let Err(e) = store.put_response(&cache, &entry).await {
                tracing::warn!(url = %entry.url, error = %e, "failed to cache response");
            }
        });
    }

    async fn offline_fallback(&self, request: &Request, err: Error) -> Result<Served, Error> {
        match request.destination {
            Destination::Document => {
                let document = self.resolve(&self.offline_document)?;
                match self.store.match_any(document.as_str()).await? {
                    Some((cache, entry)) => {
                        tracing::warn!(url = %request.url, "offline; serving cached document");
                        Ok(Served {
                            response: Response::from_cached(document, entry),
                            source: Source::Fallback,
                            cache: Some(cache),
                        })
                    }
                    None => Err(err),
                }
            }
            Destination::Image => {
                tracing::warn!(url = %request.url, "offline; serving image placeholder");
                Ok(Served {
                    response: Response {
                        url: request.url.clone(),
                        status: 200,
                        response_type: ResponseType::Default,
                        content_type: Some("image/svg+xml".into()),
                        headers: Vec::new(),
                        body: Bytes::from_static(PLACEHOLDER_SVG.as_bytes()),
                    },
                    source: Source::Fallback,
                    cache: None,
                })
            }
            _ => Err(err),
        }
    }

    /// Delete every cache. Returns how many existed.
    pub async fn clear(&self) -> Result<u64, Error> {
        let count = self.store.delete_all_caches().await?;
        tracing::info!(count, "all caches cleared");
        Ok(count)
    }

    /// Handle a background sync event. Returns whether anything was stored.
    ///
    /// Network trouble is logged rather than returned; the platform retries
    /// syncs on its own.
    pub async fn sync(&self, tag: &str) -> Result<bool, Error> {
        if tag != PRAYER_TIMES_SYNC {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(false);
        }

        let url = self.resolve(&self.sync_url)?;
        let request = Request::get(url.clone(), Destination::Empty);
        match self.network.fetch(&request).await {
            Ok(response) if response.ok() => {
                let mut entry = response.to_cached(url.as_str());
                entry.content_type.get_or_insert_with(|| "application/json".into());
                self.store.put_response(&self.dynamic_cache, &entry).await?;
                tracing::info!(url = %url, "prayer times synced");
                Ok(true)
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = response.status, "prayer times sync failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "prayer times sync failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, StubNetwork};
    use std::time::Duration;

    const ORIGIN: &str = "http://localhost:8080";

    fn config() -> AppConfig {
        AppConfig {
            precache_urls: vec!["/".into(), "/index.html".into(), "/assets/js/app.js".into()],
            ..AppConfig::default()
        }
    }

    fn online() -> StubNetwork {
        StubNetwork::default()
            .with(&format!("{ORIGIN}/"), Reply::ok("<html>root</html>"))
            .with(&format!("{ORIGIN}/index.html"), Reply::ok("<html>index</html>"))
            .with(&format!("{ORIGIN}/assets/js/app.js"), Reply::ok("app()"))
    }

    async fn manager(network: Arc<StubNetwork>, config: &AppConfig) -> CacheManager {
        let store = Store::open_in_memory().await.unwrap();
        CacheManager::new(store, network, config).unwrap()
    }

    fn get(path: &str, destination: Destination) -> Request {
        Request::get(url::Url::parse(&format!("{ORIGIN}{path}")).unwrap(), destination)
    }

    async fn wait_for_entry(store: &Store, cache: &str, url: &str) -> Option<CachedResponse> {
        for _ in 0..200 {
            if let Some(entry) = store.match_in(cache, url).await.unwrap() {
                return Some(entry);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_install_caches_manifest() {
        let manager = manager(Arc::new(online()), &config()).await;

        assert_eq!(manager.install().await.unwrap(), 3);

        let keys = manager.store().cache_keys("static-v1").await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&format!("{ORIGIN}/index.html")));
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let network = online().with(&format!("{ORIGIN}/assets/js/app.js"), Reply::status(404));
        let manager = manager(Arc::new(network), &config()).await;

        let result = manager.install().await;

        assert!(matches!(result, Err(Error::PrecacheFailed(_))));
        assert!(!manager.store().has_cache("static-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_fails_on_unreachable_entry() {
        let network = online().with(&format!("{ORIGIN}/"), Reply::Fail);
        let manager = manager(Arc::new(network), &config()).await;
        assert!(matches!(manager.install().await, Err(Error::PrecacheFailed(_))));
    }

    #[tokio::test]
    async fn test_manifest_served_from_static_cache() {
        let network = Arc::new(online());
        let manager = manager(network.clone(), &config()).await;
        manager.install().await.unwrap();

        network.set(&format!("{ORIGIN}/index.html"), Reply::ok("<html>changed</html>"));
        let served = manager.handle_fetch(&get("/index.html", Destination::Document)).await.unwrap();

        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.cache.as_deref(), Some("static-v1"));
        assert_eq!(served.response.body, Bytes::from_static(b"<html>index</html>"));
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_caches() {
        let network = Arc::new(online());
        let old = AppConfig { static_cache: "static-v0".into(), dynamic_cache: "dynamic-v0".into(), ..config() };
        let old_manager = manager(network.clone(), &old).await;
        old_manager.install().await.unwrap();
        old_manager
            .store()
            .put_response("dynamic-v0", &CachedResponse::new(format!("{ORIGIN}/x"), 200, None, b"x".to_vec()))
            .await
            .unwrap();

        let manager = CacheManager::new(old_manager.store().clone(), network, &config()).unwrap();
        manager.install().await.unwrap();
        let mut deleted = manager.activate().await.unwrap();
        deleted.sort();

        assert_eq!(deleted, vec!["dynamic-v0", "static-v0"]);
        assert_eq!(manager.store().cache_names().await.unwrap(), vec!["static-v1"]);
        assert_eq!(manager.store().cache_keys("static-v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_miss_fills_dynamic_cache() {
        let network = Arc::new(online().with(&format!("{ORIGIN}/api/azkar.json"), Reply::ok("[]")));
        let manager = manager(network.clone(), &config()).await;

        let served = manager.handle_fetch(&get("/api/azkar.json", Destination::Empty)).await.unwrap();
        assert_eq!(served.source, Source::Network);

        let key = format!("{ORIGIN}/api/azkar.json");
        let entry = wait_for_entry(manager.store(), "dynamic-v1", &key).await.expect("entry cached");
        assert_eq!(entry.body, b"[]");

        network.go_offline();
        let again = manager.handle_fetch(&get("/api/azkar.json", Destination::Empty)).await.unwrap();
        assert_eq!(again.source, Source::Cache);
        assert_eq!(network.calls().iter().filter(|u| **u == key).count(), 1);
    }

    #[tokio::test]
    async fn test_non_ok_and_cross_origin_not_cached() {
        let network = Arc::new(
            online()
                .with(&format!("{ORIGIN}/missing"), Reply::status(404))
                .with(&format!("{ORIGIN}/redirected"), Reply::cross_origin("cdn")),
        );
        let manager = manager(network, &config()).await;

        let missing = manager.handle_fetch(&get("/missing", Destination::Empty)).await.unwrap();
        assert_eq!(missing.response.status, 404);
        let cors = manager.handle_fetch(&get("/redirected", Destination::Empty)).await.unwrap();
        assert_eq!(cors.response.response_type, ResponseType::Cors);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!manager.store().has_cache("dynamic-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let network = Arc::new(online());
        let manager = manager(network.clone(), &config()).await;
        manager.install().await.unwrap();

        let mut request = get("/index.html", Destination::Document);
        request.method = Method::POST;
        let served = manager.handle_fetch(&request).await.unwrap();

        assert_eq!(served.source, Source::Bypass);
        assert_eq!(network.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_non_http_scheme_bypasses_cache() {
        let key = "ftp://localhost:8080/index.html";
        let network = Arc::new(online().with(key, Reply::ok("from network")));
        let manager = manager(network.clone(), &config()).await;
        manager
            .store()
            .put_response("static-v1", &CachedResponse::new(key, 200, None, b"from cache".to_vec()))
            .await
            .unwrap();

        let request = Request::get(url::Url::parse(key).unwrap(), Destination::Document);
        let served = manager.handle_fetch(&request).await.unwrap();

        assert_eq!(served.source, Source::Bypass);
        assert_eq!(served.response.body, Bytes::from_static(b"from network"));

        // Bypassed requests get no offline fallback either.
        network.go_offline();
        assert!(matches!(manager.handle_fetch(&request).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_dynamic_put_does_not_delay_response() {
        let path = std::env::temp_dir().join(format!("noor-dynamic-put-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let store = Store::open(&path).await.unwrap();
        let key = format!("{ORIGIN}/api/azkar.json");
        let network = Arc::new(online().with(&key, Reply::ok("[]")));
        let manager = CacheManager::new(store, network, &config()).unwrap();

        // Another connection holds the write lock, so the cache fill must wait.
        let blocker = tokio_rusqlite::Connection::open(&path).await.unwrap();
        blocker.call(|conn| conn.execute_batch("BEGIN IMMEDIATE")).await.unwrap();

        let served = tokio::time::timeout(
            Duration::from_secs(2),
            manager.handle_fetch(&get("/api/azkar.json", Destination::Empty)),
        )
        .await
        .expect("response waited for the cache write")
        .unwrap();
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.response.body, Bytes::from_static(b"[]"));

        blocker.call(|conn| conn.execute_batch("COMMIT")).await.unwrap();
        assert!(wait_for_entry(manager.store(), "dynamic-v1", &key).await.is_some());

        drop(blocker);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_offline_document_fallback() {
        let network = Arc::new(online());
        let manager = manager(network.clone(), &config()).await;
        manager.install().await.unwrap();
        network.go_offline();

        let served = manager.handle_fetch(&get("/quran", Destination::Document)).await.unwrap();

        assert_eq!(served.source, Source::Fallback);
        assert_eq!(served.response.body, Bytes::from_static(b"<html>index</html>"));
    }

    #[tokio::test]
    async fn test_offline_document_without_cache_errors() {
        let manager = manager(Arc::new(StubNetwork::default()), &config()).await;
        let result = manager.handle_fetch(&get("/quran", Destination::Document)).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_offline_image_placeholder() {
        let manager = manager(Arc::new(StubNetwork::default()), &config()).await;

        let served = manager.handle_fetch(&get("/assets/images/kaaba.png", Destination::Image)).await.unwrap();

        assert_eq!(served.source, Source::Fallback);
        assert_eq!(served.response.content_type.as_deref(), Some("image/svg+xml"));
        assert!(String::from_utf8_lossy(&served.response.body).contains("صورة غير متاحة"));
    }

    #[tokio::test]
    async fn test_offline_script_propagates() {
        let manager = manager(Arc::new(StubNetwork::default()), &config()).await;
        let result = manager.handle_fetch(&get("/assets/js/extra.js", Destination::Script)).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_clear_deletes_everything() {
        let manager = manager(Arc::new(online()), &config()).await;
        manager.install().await.unwrap();

        assert_eq!(manager.clear().await.unwrap(), 1);
        assert!(manager.store().cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_prayer_times() {
        let network = online().with(&format!("{ORIGIN}/api/prayer-times"), Reply::ok("{\"fajr\":\"05:30\"}"));
        let manager = manager(Arc::new(network), &config()).await;

        assert!(manager.sync(PRAYER_TIMES_SYNC).await.unwrap());
        assert!(!manager.sync("other-sync").await.unwrap());

        let entry = manager
            .store()
            .match_in("dynamic-v1", &format!("{ORIGIN}/api/prayer-times"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.body, b"{\"fajr\":\"05:30\"}");
    }

    #[tokio::test]
    async fn test_sync_failure_is_not_an_error() {
        let manager = manager(Arc::new(StubNetwork::default()), &config()).await;
        assert!(!manager.sync(PRAYER_TIMES_SYNC).await.unwrap());
    }
}
