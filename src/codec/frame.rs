// src/codec/frame.rs
//! Binary frames exchanged with proxy clients over TCP.
//!
//! Request:  `0xFF` | version u16 | mode u8 | count u16 | count x (ipv4 [4] + port u16)
//! Response: per address, in request order, the same 6 address bytes followed by the
//! version-specific payload written by [`encode_entry`]. Integers are big-endian.

use std::net::{Ipv4Addr, SocketAddrV4};
use byteorder::{BigEndian, ByteOrder};
use tokio::io::{AsyncRead, AsyncReadExt};
use crate::error::ProxyError;
use crate::models::server::ServerState;

pub const FRAME_MARKER: u8 = 0xFF;
pub const MODE_ADDRESS_LIST: u8 = 0;
pub const HEADER_LEN: usize = 6;
pub const ADDRESS_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl TryFrom<u16> for ProtocolVersion {
    type Error = ProxyError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(ProxyError::protocol(format!("unsupported version {} (min: 1, max: 2)", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub version: ProtocolVersion,
    pub count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub version: ProtocolVersion,
    pub addresses: Vec<SocketAddrV4>,
}

pub fn decode_header(buf: &[u8; HEADER_LEN]) -> Result<RequestHeader, ProxyError> {
    if buf[0] != FRAME_MARKER {
        return Err(ProxyError::protocol(format!("first byte 0x{:X}", buf[0])));
    }

    let version = ProtocolVersion::try_from(BigEndian::read_u16(&buf[1..3]))?;

    if buf[3] != MODE_ADDRESS_LIST {
        return Err(ProxyError::protocol(format!("unsupported mode {}", buf[3])));
    }

    Ok(RequestHeader {
        version,
        count: BigEndian::read_u16(&buf[4..6]),
    })
}

pub fn decode_address(buf: &[u8; ADDRESS_LEN]) -> SocketAddrV4 {
    SocketAddrV4::new(
        Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]),
        BigEndian::read_u16(&buf[4..6]),
    )
}

pub fn encode_address(out: &mut Vec<u8>, address: SocketAddrV4) {
    out.extend_from_slice(&address.ip().octets());
    out.extend_from_slice(&address.port().to_be_bytes());
}

/// Reads one complete request. The header is validated before any address is read.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<ClientRequest, ProxyError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let header = decode_header(&header)?;

    let mut addresses = Vec::with_capacity(header.count as usize);
    let mut buf = [0u8; ADDRESS_LEN];
    for _ in 0..header.count {
        reader.read_exact(&mut buf).await?;
        addresses.push(decode_address(&buf));
    }

    Ok(ClientRequest {
        version: header.version,
        addresses,
    })
}

pub fn encode_request(version: u16, addresses: &[SocketAddrV4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + addresses.len() * ADDRESS_LEN);
    out.push(FRAME_MARKER);
    out.extend_from_slice(&version.to_be_bytes());
    out.push(MODE_ADDRESS_LIST);
    out.extend_from_slice(&(addresses.len() as u16).to_be_bytes());
    for address in addresses {
        encode_address(&mut out, *address);
    }
    out
}

/// Writes one response entry: the address followed by the payload for `version`.
pub fn encode_entry(out: &mut Vec<u8>, address: SocketAddrV4, state: &ServerState, version: ProtocolVersion) {
    encode_address(out, address);
    put_cstring(out, &state.hostname);
    put_cstring(out, &state.map);
    out.extend_from_slice(&state.players.to_be_bytes());
    out.extend_from_slice(&state.max_players.to_be_bytes());
    out.extend_from_slice(&state.wipe_timestamp.to_be_bytes());

    if version == ProtocolVersion::V2 {
        out.extend_from_slice(&state.queue.to_be_bytes());
        put_cstring(out, &state.custom_tags);
    }
}

fn put_cstring(out: &mut Vec<u8>, value: &str) {
    // An embedded NUL would end the string early on the client side.
    out.extend(value.bytes().filter(|&b| b != 0));
    out.push(0);
}
