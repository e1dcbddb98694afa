// src/error.rs
use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    /// Socket, HTTP or timeout failure while talking to a peer.
    Transport(String),
    /// Bytes on the wire did not match the expected layout.
    Protocol(String),
    EmptyHostname,
    EmptyMap,
    NoTags,
    /// Missing or invalid setting.
    Configuration(String),
}

impl ProxyError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyHostname | Self::EmptyMap | Self::NoTags)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Self::EmptyHostname => write!(f, "Hostname is empty"),
            Self::EmptyMap => write!(f, "Map is empty"),
            Self::NoTags => write!(f, "Tags are empty"),
            Self::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ProxyError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Transport("timed out".to_string())
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_variants() {
        assert!(ProxyError::EmptyHostname.is_validation());
        assert!(ProxyError::EmptyMap.is_validation());
        assert!(ProxyError::NoTags.is_validation());
        assert!(!ProxyError::protocol("bad").is_validation());
    }

    #[test]
    fn test_io_error_is_transport() {
        let err: ProxyError = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(err, ProxyError::Transport(_)));
    }
}
