// src/scheduler.rs
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, error, warn};
use tokio::sync::Semaphore;
use crate::directory::DirectoryCache;
use crate::error::ProxyError;
use crate::models::server::{RawQueryResult, ServerRecord};
use crate::source_query::SourceQueryClient;

/// Where refreshed data comes from and how it is applied.
pub struct Upstream {
    pub source: SourceQueryClient,
    pub directory: Option<Arc<DirectoryCache>>,
    pub tag_whitelist: Vec<String>,
}

impl Upstream {
    /// Refreshes one record. Failures leave it untouched.
    pub async fn refresh(&self, record: &ServerRecord) -> bool {
        match self.resolve(record).await {
            Ok(raw) => {
                record.apply(&raw, &self.tag_whitelist);
                true
            }
            Err(e) => {
                error!("Query | {} | {}", record.address(), e);
                false
            }
        }
    }

    async fn resolve(&self, record: &ServerRecord) -> Result<RawQueryResult, ProxyError> {
        let address = record.address();

        if let Some(directory) = &self.directory {
            match directory.lookup(address).await {
                Ok(Some(entry)) => return Ok(entry.to_raw()),
                Ok(None) => debug!("Directory | {} | not listed, querying directly", address),
                Err(e) => warn!("Directory | {} | {}", address, e),
            }
        }

        self.source.query(address).await
    }
}

/// Refreshes the stale part of a batch with at most `burst_limit` queries in flight.
#[derive(Clone)]
pub struct RefreshScheduler {
    upstream: Arc<Upstream>,
    threshold: Duration,
    burst_limit: usize,
}

impl RefreshScheduler {
    pub fn new(upstream: Upstream, threshold: Duration, burst_limit: usize) -> Self {
        Self {
            upstream: Arc::new(upstream),
            threshold,
            burst_limit: burst_limit.max(1),
        }
    }

    /// Returns once every dispatched refresh has finished, successful or not.
    /// The return value is the number of records that were refreshed.
    pub async fn refresh_batch(&self, batch: &[Arc<ServerRecord>]) -> usize {
        let now = Instant::now();
        let gate = Arc::new(Semaphore::new(self.burst_limit));
        let mut tasks = Vec::new();

        for record in batch {
            if !record.is_stale(self.threshold, now) {
                continue;
            }

            let permit = match gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let upstream = self.upstream.clone();
            let record = record.clone();

            tasks.push(tokio::spawn(async move {
                let refreshed = upstream.refresh(&record).await;
                drop(permit);
                refreshed
            }));
        }

        let dispatched = tasks.len();
        let mut refreshed = 0;
        for task in tasks {
            match task.await {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(e) => error!("Refresh task failed: {}", e),
            }
        }

        debug!("Refreshed {}/{} stale records ({} in batch)", refreshed, dispatched, batch.len());
        refreshed
    }
}
