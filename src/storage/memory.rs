// src/storage/memory.rs
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use crate::models::server::ServerRecord;

/// Every server any client has asked about, keyed by `ip:port`.
#[derive(Default)]
pub struct RecordCache {
    records: DashMap<SocketAddrV4, Arc<ServerRecord>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, address: SocketAddrV4) -> Arc<ServerRecord> {
        self.records
            .entry(address)
            .or_insert_with(|| Arc::new(ServerRecord::new(address)))
            .value()
            .clone()
    }

    pub fn get(&self, address: SocketAddrV4) -> Option<Arc<ServerRecord>> {
        self.records.get(&address).map(|r| r.value().clone())
    }

    /// Drops records not refreshed within `ttl`. Returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        self.sweep_at(ttl, Instant::now())
    }

    pub fn sweep_at(&self, ttl: Duration, now: Instant) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_stale(ttl, now));
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::RawQueryResult;
    use std::net::Ipv4Addr;

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 1), port)
    }

    fn raw() -> RawQueryResult {
        RawQueryResult {
            hostname: "Server".to_string(),
            map: "Procedural Map".to_string(),
            tags: vec!["mp10".to_string()],
        }
    }

    #[test]
    fn test_get_or_create_returns_same_record() {
        let cache = RecordCache::new();
        let first = cache.get_or_create(addr(28015));
        let second = cache.get_or_create(addr(28015));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.snapshot().hostname, "");
        assert!(first.snapshot().updated_at.is_none());
    }

    #[test]
    fn test_sweep_drops_only_old_records() {
        let cache = RecordCache::new();
        let ttl = Duration::from_secs(60);

        let old = cache.get_or_create(addr(1));
        old.apply(&raw(), &[]);
        let never_updated = cache.get_or_create(addr(2));
        drop(never_updated);

        let later = Instant::now() + Duration::from_secs(90);
        let fresh = cache.get_or_create(addr(3));
        fresh.replace(crate::models::server::ServerState {
            updated_at: Some(later - Duration::from_secs(10)),
            ..fresh.snapshot()
        });

        assert_eq!(cache.sweep_at(ttl, later), 2);
        assert!(cache.get(addr(1)).is_none());
        assert!(cache.get(addr(2)).is_none());
        assert!(cache.get(addr(3)).is_some());
    }

    #[test]
    fn test_lookup_never_removes() {
        let cache = RecordCache::new();
        cache.get_or_create(addr(7));
        assert!(cache.get(addr(7)).is_some());
        assert!(cache.get(addr(7)).is_some());
        assert_eq!(cache.len(), 1);
    }
}
