// src/utils.rs
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Builds the `ip:port` key used by the directory listing, swapping in another port.
pub fn address_key(addr: &str, port: u16) -> String {
    let host = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr);
    format!("{}:{}", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_key_replaces_port() {
        assert_eq!(address_key("1.2.3.4:27015", 28015), "1.2.3.4:28015");
        assert_eq!(address_key("1.2.3.4", 28015), "1.2.3.4:28015");
    }
}
