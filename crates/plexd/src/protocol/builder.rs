// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery packet builders.
//!
//! Each builder emits a complete packet (header + body). Strings longer than
//! `u16::MAX` bytes are truncated at the length prefix.

use super::{
    AnnounceInfo, MessageKind, OwnerId, QueryInfo, ReplyInfo, RevokeInfo, MAGIC, PROTOCOL_VERSION,
};

/// Append the common header.
fn put_header(buf: &mut Vec<u8>, kind: MessageKind, origin: &OwnerId, sequence: u32) {
    buf.extend_from_slice(MAGIC);
    buf.push(PROTOCOL_VERSION);
    buf.push(kind.code());
    buf.extend_from_slice(&origin.as_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());
}

/// Append a u16-length-prefixed UTF-8 string.
fn put_str(buf: &mut Vec<u8>, s: &str) {
    let len = u16::try_from(s.len()).unwrap_or(u16::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&s.as_bytes()[..len as usize]);
}

/// Build an ANNOUNCE packet.
#[must_use]
pub fn build_announce(info: &AnnounceInfo) -> Vec<u8> {
    crate::trace_fn!("protocol::build_announce");
    let mut buf = Vec::with_capacity(128);
    put_header(&mut buf, MessageKind::Announce, &info.origin, info.sequence);

    buf.extend_from_slice(&info.owner.as_bytes());
    buf.push(info.method.code());
    put_str(&mut buf, &info.endpoint);
    buf.extend_from_slice(&info.lease_ms.to_le_bytes());
    buf.extend_from_slice(&info.age_ms.to_le_bytes());

    let count = u16::try_from(info.capabilities.len()).unwrap_or(u16::MAX);
    buf.extend_from_slice(&count.to_le_bytes());
    for capability in info.capabilities.iter().take(count as usize) {
        put_str(&mut buf, capability.as_str());
    }
    buf
}

/// Build a REVOKE packet.
#[must_use]
pub fn build_revoke(info: &RevokeInfo) -> Vec<u8> {
    crate::trace_fn!("protocol::build_revoke");
    let mut buf = Vec::with_capacity(64);
    put_header(&mut buf, MessageKind::Revoke, &info.origin, info.sequence);

    buf.extend_from_slice(&info.owner.as_bytes());
    buf.push(info.method.code());
    put_str(&mut buf, &info.endpoint);
    buf
}

/// Build a QUERY packet.
#[must_use]
pub fn build_query(info: &QueryInfo) -> Vec<u8> {
    crate::trace_fn!("protocol::build_query");
    let mut buf = Vec::with_capacity(64);
    put_header(&mut buf, MessageKind::Query, &info.origin, info.sequence);

    buf.extend_from_slice(&info.query_id.to_le_bytes());
    put_str(&mut buf, info.capability.as_str());
    buf
}

/// Build a REPLY packet.
#[must_use]
pub fn build_reply(info: &ReplyInfo) -> Vec<u8> {
    crate::trace_fn!("protocol::build_reply");
    let mut buf = Vec::with_capacity(128);
    put_header(&mut buf, MessageKind::Reply, &info.origin, info.sequence);

    buf.extend_from_slice(&info.query_id.to_le_bytes());

    let count = u16::try_from(info.records.len()).unwrap_or(u16::MAX);
    buf.extend_from_slice(&count.to_le_bytes());
    for record in info.records.iter().take(count as usize) {
        buf.extend_from_slice(&record.owner.as_bytes());
        buf.push(record.method.code());
        put_str(&mut buf, &record.endpoint);
        buf.extend_from_slice(&record.distance.to_le_bytes());
        buf.extend_from_slice(&record.age_ms.to_le_bytes());
    }
    buf
}
