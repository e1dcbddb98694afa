// src/source_query.rs
use std::net::SocketAddrV4;
use std::time::Duration;
use log::debug;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use crate::codec::source::{decode_info_reply, encode_info_request, InfoReply};
use crate::error::ProxyError;
use crate::models::server::RawQueryResult;

const MAX_DATAGRAM: usize = 4096;

/// Queries game servers directly over UDP.
#[derive(Debug, Clone)]
pub struct SourceQueryClient {
    timeout: Duration,
}

impl SourceQueryClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// One round trip normally, two when the server asks for a challenge first.
    /// A second challenge in the same exchange is a protocol error.
    pub async fn query(&self, address: SocketAddrV4) -> Result<RawQueryResult, ProxyError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        timeout(self.timeout, socket.connect(address)).await??;

        let mut challenge = None;
        let mut buffer = [0u8; MAX_DATAGRAM];

        loop {
            socket.send(&encode_info_request(challenge)).await?;
            let len = timeout(self.timeout, socket.recv(&mut buffer)).await??;

            match decode_info_reply(&buffer[..len])? {
                InfoReply::Info(raw) => return Ok(raw),
                InfoReply::Challenge(_) if challenge.is_some() => {
                    return Err(ProxyError::protocol("challenge received twice"));
                }
                InfoReply::Challenge(value) => {
                    debug!("Challenge from {}: {:02X?}", address, value);
                    challenge = Some(value);
                }
            }
        }
    }
}
