// src/models/server.rs
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};
use parking_lot::RwLock;

/// Hostname, map and raw tags as reported by one of the upstream sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQueryResult {
    pub hostname: String,
    pub map: String,
    pub tags: Vec<String>,
}

/// The mutable half of a record. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    pub hostname: String,
    pub map: String,
    pub players: u16,
    pub max_players: u16,
    pub queue: u16,
    pub wipe_timestamp: u64,
    pub custom_tags: String,
    pub updated_at: Option<Instant>,
}

impl ServerState {
    /// Builds the state for a successful refresh.
    ///
    /// Counters come from the `mp`/`cp`/`qp`/`born` tag prefixes. They fall back to
    /// zero when absent or unparseable and saturate when too large. Tags matching
    /// `whitelist` (ignoring case) are kept in their original order and casing,
    /// duplicates included.
    pub fn from_raw(raw: &RawQueryResult, whitelist: &[String], now: Instant) -> Self {
        let mut state = Self {
            hostname: raw.hostname.clone(),
            map: raw.map.clone(),
            updated_at: Some(now),
            ..Self::default()
        };

        for tag in &raw.tags {
            if let Some(value) = tag.strip_prefix("mp") {
                state.max_players = parse_counter(value, u16::MAX as u64) as u16;
            } else if let Some(value) = tag.strip_prefix("cp") {
                state.players = parse_counter(value, u16::MAX as u64) as u16;
            } else if let Some(value) = tag.strip_prefix("qp") {
                state.queue = parse_counter(value, u16::MAX as u64) as u16;
            } else if let Some(value) = tag.strip_prefix("born") {
                state.wipe_timestamp = parse_counter(value, u64::MAX);
            }
        }

        state.custom_tags = raw.tags
            .iter()
            .filter(|tag| whitelist.iter().any(|allowed| allowed.eq_ignore_ascii_case(tag)))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");

        state
    }

    /// Never-updated state counts as infinitely old.
    pub fn is_older_than(&self, max_age: Duration, now: Instant) -> bool {
        match self.updated_at {
            Some(at) => now.saturating_duration_since(at) > max_age,
            None => true,
        }
    }
}

/// Plain decimal digits only. Values past `max` saturate to `max`; anything else is 0.
fn parse_counter(value: &str, max: u64) -> u64 {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    value.parse::<u64>().map_or(max, |n| n.min(max))
}

#[derive(Debug)]
pub struct ServerRecord {
    address: SocketAddrV4,
    state: RwLock<ServerState>,
}

impl ServerRecord {
    pub fn new(address: SocketAddrV4) -> Self {
        Self {
            address,
            state: RwLock::new(ServerState::default()),
        }
    }

    pub fn address(&self) -> SocketAddrV4 {
        self.address
    }

    pub fn snapshot(&self) -> ServerState {
        self.state.read().clone()
    }

    pub fn is_stale(&self, threshold: Duration, now: Instant) -> bool {
        self.state.read().is_older_than(threshold, now)
    }

    pub fn replace(&self, state: ServerState) {
        *self.state.write() = state;
    }

    pub fn apply(&self, raw: &RawQueryResult, whitelist: &[String]) {
        self.replace(ServerState::from_raw(raw, whitelist, Instant::now()));
    }
}
