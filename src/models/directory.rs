// src/models/directory.rs
use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::models::server::RawQueryResult;
use crate::utils::{address_key, now_millis};

/// One server as advertised by the directory listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryEntry {
    pub addr: String,
    #[serde(rename = "gameport")]
    pub game_port: u16,
    #[serde(rename = "steamid")]
    pub steam_id: String,
    pub name: String,
    #[serde(rename = "appid")]
    pub app_id: u32,
    #[serde(rename = "gamedir")]
    pub game_dir: String,
    pub version: String,
    pub product: String,
    pub region: i32,
    pub players: u32,
    pub max_players: u32,
    pub bots: u32,
    pub map: String,
    pub secure: bool,
    pub dedicated: bool,
    pub os: String,
    /// Comma-separated tag string, same convention as the UDP keywords.
    #[serde(rename = "gametype")]
    pub tags: String,
}

impl DirectoryEntry {
    /// Key the entry is stored under: listing host with the advertised game port.
    pub fn key(&self) -> String {
        address_key(&self.addr, self.game_port)
    }

    pub fn to_raw(&self) -> RawQueryResult {
        RawQueryResult {
            hostname: self.name.clone(),
            map: self.map.clone(),
            tags: self.tags.split(',').map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerListResponse {
    #[serde(default)]
    pub response: ServerList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerList {
    #[serde(default)]
    pub servers: Vec<DirectoryEntry>,
}

/// An immutable view of the listing at `fetched_at` (Unix milliseconds).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub entries: HashMap<String, DirectoryEntry>,
    pub fetched_at: u64,
}

impl DirectorySnapshot {
    pub fn from_entries(servers: Vec<DirectoryEntry>, fetched_at: u64) -> Self {
        let entries = servers
            .into_iter()
            .map(|entry| (entry.key(), entry))
            .collect();
        Self { entries, fetched_at }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.saturating_add(ttl.as_millis() as u64) <= now_millis()
    }

    pub fn get(&self, address: &str) -> Option<&DirectoryEntry> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
