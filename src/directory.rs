// src/directory.rs
use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use arc_swap::ArcSwapOption;
use log::{error, info, warn};
use tokio::sync::Mutex;
use crate::config::Config;
use crate::error::ProxyError;
use crate::models::directory::{DirectoryEntry, DirectorySnapshot, ServerListResponse};
use crate::storage::snapshot;
use crate::utils::now_millis;

/// Time-boxed cache over the bulk server listing.
///
/// Readers use the installed snapshot without locking while it is fresh. Once it
/// expires, the first caller through `fetch_lock` downloads a new listing and swaps it
/// in; callers queued behind it find the new snapshot on their re-check.
pub struct DirectoryCache {
    client: reqwest::Client,
    url: String,
    token: String,
    filter: String,
    ttl: Duration,
    cache_file: PathBuf,
    current: ArcSwapOption<DirectorySnapshot>,
    fetch_lock: Mutex<()>,
}

impl DirectoryCache {
    pub fn new(config: &Config) -> Result<Self, ProxyError> {
        let token = config
            .directory_api_token
            .clone()
            .ok_or_else(|| ProxyError::configuration("DIRECTORY_API_TOKEN must be specified"))?;

        if config.directory_cache_time_secs == 0 {
            return Err(ProxyError::configuration("DIRECTORY_CACHE_TIME_SECS must be positive"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.directory_timeout())
            .build()?;

        Ok(Self {
            client,
            url: config.directory_url.clone(),
            token,
            filter: config.directory_filter.clone(),
            ttl: config.directory_cache_time(),
            cache_file: config.directory_cache_file.clone(),
            current: ArcSwapOption::empty(),
            fetch_lock: Mutex::new(()),
        })
    }

    /// Installs the persisted snapshot, if any, keeping its original fetch time.
    pub async fn load_persisted(&self) {
        match snapshot::load(&self.cache_file).await {
            Ok(Some(loaded)) => {
                info!(
                    "Loaded {} directory entries from {} (fetched at {})",
                    loaded.len(),
                    self.cache_file.display(),
                    loaded.fetched_at
                );
                self.install(loaded);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring directory cache file {}: {}", self.cache_file.display(), e),
        }
    }

    pub fn install(&self, snapshot: DirectorySnapshot) {
        self.current.store(Some(Arc::new(snapshot)));
    }

    pub fn current(&self) -> Option<Arc<DirectorySnapshot>> {
        self.current.load_full()
    }

    pub async fn lookup(&self, address: SocketAddrV4) -> Result<Option<DirectoryEntry>, ProxyError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.get(&address.to_string()).cloned())
    }

    fn fresh(&self) -> Option<Arc<DirectorySnapshot>> {
        self.current.load_full().filter(|s| !s.is_expired(self.ttl))
    }

    async fn snapshot(&self) -> Result<Arc<DirectorySnapshot>, ProxyError> {
        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        let _guard = self.fetch_lock.lock().await;

        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        let servers = self.fetch().await?;
        let fetched = Arc::new(DirectorySnapshot::from_entries(servers, now_millis()));
        info!("Fetched {} servers from the directory", fetched.len());
        self.current.store(Some(fetched.clone()));

        if let Err(e) = snapshot::save(&self.cache_file, &fetched).await {
            error!("Failed to save directory cache to {}: {}", self.cache_file.display(), e);
        }

        Ok(fetched)
    }

    async fn fetch(&self) -> Result<Vec<DirectoryEntry>, ProxyError> {
        let body = self.client
            .get(&self.url)
            .query(&[
                ("key", self.token.as_str()),
                ("filter", self.filter.as_str()),
                ("limit", "9999999"),
            ])
            .send().await?
            .error_for_status()?
            .text().await?;

        let listing: ServerListResponse = serde_json::from_str(&body)?;
        Ok(listing.response.servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LISTING: &str = r#"{"response":{"servers":[
        {"addr":"203.0.113.10:28016","gameport":28015,"name":"Stevious 2x","map":"Procedural Map","gametype":"mp250,cp200,qp9,born1700000000,EU,monthly"}
    ]}}"#;

    /// Minimal HTTP endpoint that counts how many listings it served.
    async fn fake_directory(status: &'static str, delay: Duration) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        LISTING.len(),
                        LISTING
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (format!("http://{}/IGameServersService/GetServerList/v1/", addr), hits)
    }

    fn config(url: String, name: &str, ttl_secs: u64) -> Config {
        Config {
            directory_api_token: Some("test-token".to_string()),
            directory_url: url,
            directory_cache_time_secs: ttl_secs,
            directory_timeout_secs: 5,
            directory_cache_file: std::env::temp_dir()
                .join(format!("rqproxy-directory-{}-{}.json", name, std::process::id())),
            ..Config::default()
        }
    }

    fn game_addr() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 10), 28015)
    }

    #[test]
    fn test_token_is_required() {
        let config = Config { directory_api_token: None, ..Config::default() };
        assert!(matches!(DirectoryCache::new(&config), Err(ProxyError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_lookups_within_ttl_fetch_once() {
        let (url, hits) = fake_directory("200 OK", Duration::ZERO).await;
        let cache = DirectoryCache::new(&config(url, "within-ttl", 300)).unwrap();

        let entry = cache.lookup(game_addr()).await.unwrap().unwrap();
        assert_eq!(entry.name, "Stevious 2x");
        // Query port differs from the advertised game port.
        let miss = cache.lookup(SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 10), 28016)).await.unwrap();
        assert!(miss.is_none());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_file(&cache.cache_file);
    }

    #[tokio::test]
    async fn test_expired_snapshot_fetches_exactly_once_more() {
        let (url, hits) = fake_directory("200 OK", Duration::ZERO).await;
        let cache = DirectoryCache::new(&config(url, "expired", 1)).unwrap();

        cache.lookup(game_addr()).await.unwrap();
        cache.lookup(game_addr()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        cache.lookup(game_addr()).await.unwrap();
        cache.lookup(game_addr()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        let _ = std::fs::remove_file(&cache.cache_file);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_collapse_into_one_fetch() {
        let (url, hits) = fake_directory("200 OK", Duration::from_millis(150)).await;
        let cache = Arc::new(DirectoryCache::new(&config(url, "concurrent", 300)).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.lookup(game_addr()).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_file(&cache.cache_file);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_and_retried() {
        let (url, hits) = fake_directory("500 Internal Server Error", Duration::ZERO).await;
        let cache = DirectoryCache::new(&config(url, "failure", 300)).unwrap();

        assert!(matches!(cache.lookup(game_addr()).await, Err(ProxyError::Transport(_))));
        assert!(cache.current().is_none());
        assert!(cache.lookup(game_addr()).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persisted_snapshot_is_reused() {
        let (url, hits) = fake_directory("200 OK", Duration::ZERO).await;
        let config = config(url, "persisted", 300);

        let first = DirectoryCache::new(&config).unwrap();
        first.lookup(game_addr()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let second = DirectoryCache::new(&config).unwrap();
        second.load_persisted().await;
        assert!(second.lookup(game_addr()).await.unwrap().is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_file(&config.directory_cache_file);
    }
}
