// src/server.rs
use std::sync::Arc;
use log::{debug, error, warn};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use crate::allowlist::AllowList;
use crate::config::Config;
use crate::directory::DirectoryCache;
use crate::error::ProxyError;
use crate::handlers::connection::handle_connection;
use crate::scheduler::{RefreshScheduler, Upstream};
use crate::source_query::SourceQueryClient;
use crate::storage::memory::RecordCache;

/// Process-wide exclusive section around batch work and eviction.
///
/// Only one client batch is refreshed and answered at a time; refreshes inside
/// that batch still run concurrently. This caps throughput across connections.
#[derive(Default)]
pub struct BatchGuard {
    lock: Mutex<()>,
}

impl BatchGuard {
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }

    pub async fn enter(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

pub struct ProxyState {
    pub config: Config,
    pub allow_list: AllowList,
    pub records: RecordCache,
    pub directory: Option<Arc<DirectoryCache>>,
    pub scheduler: RefreshScheduler,
    pub batch_guard: BatchGuard,
}

impl ProxyState {
    pub fn new(config: Config) -> Result<Self, ProxyError> {
        config.validate()?;

        let allow_list = AllowList::from_entries(&config.ip_whitelist)?;

        let directory = match config.directory_api_token {
            Some(_) => Some(Arc::new(DirectoryCache::new(&config)?)),
            None => None,
        };

        let upstream = Upstream {
            source: SourceQueryClient::new(config.query_timeout()),
            directory: directory.clone(),
            tag_whitelist: config.custom_tags_whitelist.clone(),
        };
        let scheduler = RefreshScheduler::new(
            upstream,
            config.refresh_threshold(),
            config.update_burst_limit,
        );

        Ok(Self {
            config,
            allow_list,
            records: RecordCache::new(),
            directory,
            scheduler,
            batch_guard: BatchGuard::new(),
        })
    }
}

/// Accepts clients forever. Peers outside the allow-list are dropped unread.
pub async fn serve(listener: TcpListener, state: Arc<ProxyState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Incoming connection: {}", e);
                continue;
            }
        };

        if !state.allow_list.contains(peer.ip()) {
            warn!("Not found in whitelist: {}", peer.ip());
            drop(stream);
            continue;
        }

        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, state).await;
        });
    }
}

/// Evicts records nobody has refreshed for a full cache period.
pub fn spawn_sweeper(state: Arc<ProxyState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ttl = state.config.server_cache_time();
        loop {
            tokio::time::sleep(ttl).await;

            let _section = state.batch_guard.enter().await;
            let removed = state.records.sweep(ttl);
            if removed > 0 {
                debug!("Evicted {} cached servers, {} left", removed, state.records.len());
            }
        }
    })
}
