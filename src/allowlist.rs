// src/allowlist.rs
use std::net::IpAddr;
use std::str::FromStr;
use ipnetwork::IpNetwork;
use crate::error::ProxyError;

/// Networks allowed to open client connections.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    networks: Vec<IpNetwork>,
}

impl AllowList {
    /// Accepts plain addresses (`10.0.0.1`) as well as CIDR networks (`10.0.0.0/8`).
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, ProxyError> {
        let mut networks = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref().trim();
            let network = IpNetwork::from_str(entry).map_err(|e| {
                ProxyError::configuration(format!("Invalid IP_WHITELIST entry '{}': {}", entry, e))
            })?;
            networks.push(network);
        }
        Ok(Self { networks })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            // IPv4 peers may show up as v4-mapped addresses on dual-stack listeners.
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            IpAddr::V4(_) => ip,
        };
        self.networks.iter().any(|network| network.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
