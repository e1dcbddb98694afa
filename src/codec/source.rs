// src/codec/source.rs
//! A2S_INFO request/response handling for the UDP game-query protocol.

use std::io::{Cursor, Read};
use byteorder::ReadBytesExt;
use crate::error::ProxyError;
use crate::models::server::RawQueryResult;

pub const PACKET_HEADER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
pub const CHALLENGE_RESPONSE: u8 = 0x41;
const INFO_QUERY: &[u8] = b"TSource Engine Query\0";

const EDF_GAME_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SPECTATOR: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// What a single datagram from the game server turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoReply {
    Challenge([u8; 4]),
    Info(RawQueryResult),
}

pub fn encode_info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(PACKET_HEADER.len() + INFO_QUERY.len() + 4);
    packet.extend_from_slice(&PACKET_HEADER);
    packet.extend_from_slice(INFO_QUERY);
    if let Some(challenge) = challenge {
        packet.extend_from_slice(&challenge);
    }
    packet
}

/// Parses one reply datagram and validates the info payload.
pub fn decode_info_reply(datagram: &[u8]) -> Result<InfoReply, ProxyError> {
    let mut cursor = Cursor::new(datagram);

    skip(&mut cursor, PACKET_HEADER.len(), "header")?;

    let kind = cursor.read_u8().map_err(|_| truncated("response type"))?;
    if kind == CHALLENGE_RESPONSE {
        let mut challenge = [0u8; 4];
        cursor.read_exact(&mut challenge).map_err(|_| truncated("challenge"))?;
        return Ok(InfoReply::Challenge(challenge));
    }

    skip(&mut cursor, 1, "protocol")?;
    let hostname = read_cstring(&mut cursor, "name")?;
    let map = read_cstring(&mut cursor, "map")?;
    read_cstring(&mut cursor, "folder")?;
    read_cstring(&mut cursor, "game")?;
    // app id(2) + players + max players + bots + dedicated + os + password + secure
    skip(&mut cursor, 9, "server flags")?;
    read_cstring(&mut cursor, "version")?;

    // Servers that stop right after the version string have no tags to offer.
    let edf = cursor.read_u8().unwrap_or(0);
    let mut tags = Vec::new();

    if edf & EDF_GAME_PORT != 0 {
        skip(&mut cursor, 2, "game port")?;
    }
    if edf & EDF_STEAM_ID != 0 {
        skip(&mut cursor, 8, "steam id")?;
    }
    if edf & EDF_SPECTATOR != 0 {
        skip(&mut cursor, 2, "spectator port")?;
        read_cstring(&mut cursor, "spectator name")?;
    }
    if edf & EDF_KEYWORDS != 0 {
        let keywords = read_cstring(&mut cursor, "keywords")?.to_lowercase();
        tags = keywords.split(',').map(str::to_string).collect();
    }
    if edf & EDF_GAME_ID != 0 {
        // Last field and nothing in it is kept, so a short tail is tolerated.
        let _ = skip(&mut cursor, 8, "game id");
    }

    if hostname.is_empty() {
        return Err(ProxyError::EmptyHostname);
    }
    if map.is_empty() {
        return Err(ProxyError::EmptyMap);
    }
    if tags.is_empty() {
        return Err(ProxyError::NoTags);
    }

    Ok(InfoReply::Info(RawQueryResult { hostname, map, tags }))
}

fn truncated(field: &str) -> ProxyError {
    ProxyError::protocol(format!("datagram truncated at {}", field))
}

fn skip(cursor: &mut Cursor<&[u8]>, len: usize, field: &str) -> Result<(), ProxyError> {
    let pos = cursor.position() as usize;
    if cursor.get_ref().len() < pos + len {
        return Err(truncated(field));
    }
    cursor.set_position((pos + len) as u64);
    Ok(())
}

/// Reads a NUL-terminated string and moves past the terminator.
fn read_cstring(cursor: &mut Cursor<&[u8]>, field: &str) -> Result<String, ProxyError> {
    let pos = cursor.position() as usize;
    let rest = cursor.get_ref().get(pos..).unwrap_or(&[]);
    let end = rest.iter().position(|&b| b == 0).ok_or_else(|| truncated(field))?;
    let value = String::from_utf8_lossy(&rest[..end]).into_owned();
    cursor.set_position((pos + end + 1) as u64);
    Ok(value)
}
