// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery packet parsers.
//!
//! Every parser returns `Option` and rejects short buffers, bad magic,
//! unknown versions/kinds/method codes and truncated strings. A single
//! malformed packet must never take down the responder loop.

use super::{
    AnnounceInfo, Capability, Header, MessageKind, OwnerId, PublishMethod, QueryInfo, ReplyInfo,
    ReplyRecord, RevokeInfo, HEADER_LEN, MAGIC, MAX_CAPABILITIES, MAX_ENDPOINT_LEN,
    MAX_REPLY_RECORDS, PROTOCOL_VERSION,
};

/// Parse and validate the common header.
///
/// Returns `None` on short input, wrong magic, unknown version or kind.
#[must_use]
pub fn parse_header(packet: &[u8]) -> Option<Header> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    if &packet[0..4] != MAGIC {
        return None;
    }
    if packet[4] != PROTOCOL_VERSION {
        return None;
    }
    let kind = MessageKind::from_code(packet[5])?;

    let mut origin = [0u8; 16];
    origin.copy_from_slice(&packet[6..22]);

    let sequence = u32::from_le_bytes(packet[22..26].try_into().ok()?);

    Some(Header {
        kind,
        origin: OwnerId::from_bytes(origin),
        sequence,
    })
}

fn read_u16(buf: &[u8], offset: &mut usize) -> Option<u16> {
    let bytes = buf.get(*offset..*offset + 2)?;
    *offset += 2;
    Some(u16::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u32(buf: &[u8], offset: &mut usize) -> Option<u32> {
    let bytes = buf.get(*offset..*offset + 4)?;
    *offset += 4;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u64(buf: &[u8], offset: &mut usize) -> Option<u64> {
    let bytes = buf.get(*offset..*offset + 8)?;
    *offset += 8;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

fn read_owner(buf: &[u8], offset: &mut usize) -> Option<OwnerId> {
    let bytes = buf.get(*offset..*offset + 16)?;
    *offset += 16;
    let mut id = [0u8; 16];
    id.copy_from_slice(bytes);
    Some(OwnerId::from_bytes(id))
}

fn read_method(buf: &[u8], offset: &mut usize) -> Option<PublishMethod> {
    let code = *buf.get(*offset)?;
    *offset += 1;
    PublishMethod::from_code(code)
}

/// Read a u16-length-prefixed UTF-8 string, bounded by `max_len`.
fn read_string(buf: &[u8], offset: &mut usize, max_len: usize) -> Option<String> {
    let len = read_u16(buf, offset)? as usize;
    if len > max_len {
        return None;
    }
    let bytes = buf.get(*offset..*offset + len)?;
    *offset += len;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Parse an ANNOUNCE packet.
#[must_use]
pub fn parse_announce(packet: &[u8]) -> Option<AnnounceInfo> {
    let header = parse_header(packet)?;
    if header.kind != MessageKind::Announce {
        return None;
    }

    let mut offset = HEADER_LEN;
    let owner = read_owner(packet, &mut offset)?;
    let method = read_method(packet, &mut offset)?;
    let endpoint = read_string(packet, &mut offset, MAX_ENDPOINT_LEN)?;
    let lease_ms = read_u64(packet, &mut offset)?;
    let age_ms = read_u64(packet, &mut offset)?;

    let count = read_u16(packet, &mut offset)? as usize;
    if count > MAX_CAPABILITIES {
        return None;
    }
    let mut capabilities = Vec::with_capacity(count);
    for _ in 0..count {
        capabilities.push(Capability::from(read_string(
            packet,
            &mut offset,
            MAX_ENDPOINT_LEN,
        )?));
    }

    Some(AnnounceInfo {
        origin: header.origin,
        sequence: header.sequence,
        owner,
        method,
        endpoint,
        lease_ms,
        age_ms,
        capabilities,
    })
}

/// Parse a REVOKE packet.
#[must_use]
pub fn parse_revoke(packet: &[u8]) -> Option<RevokeInfo> {
    let header = parse_header(packet)?;
    if header.kind != MessageKind::Revoke {
        return None;
    }

    let mut offset = HEADER_LEN;
    let owner = read_owner(packet, &mut offset)?;
    let method = read_method(packet, &mut offset)?;
    let endpoint = read_string(packet, &mut offset, MAX_ENDPOINT_LEN)?;

    Some(RevokeInfo {
        origin: header.origin,
        sequence: header.sequence,
        owner,
        method,
        endpoint,
    })
}

/// Parse a QUERY packet.
#[must_use]
pub fn parse_query(packet: &[u8]) -> Option<QueryInfo> {
    let header = parse_header(packet)?;
    if header.kind != MessageKind::Query {
        return None;
    }

    let mut offset = HEADER_LEN;
    let query_id = read_u64(packet, &mut offset)?;
    let capability = read_string(packet, &mut offset, MAX_ENDPOINT_LEN)?;
    if capability.is_empty() {
        return None;
    }

    Some(QueryInfo {
        origin: header.origin,
        sequence: header.sequence,
        query_id,
        capability: Capability::from(capability),
    })
}

/// Parse a REPLY packet.
#[must_use]
pub fn parse_reply(packet: &[u8]) -> Option<ReplyInfo> {
    let header = parse_header(packet)?;
    if header.kind != MessageKind::Reply {
        return None;
    }

    let mut offset = HEADER_LEN;
    let query_id = read_u64(packet, &mut offset)?;

    let count = read_u16(packet, &mut offset)? as usize;
    if count > MAX_REPLY_RECORDS {
        return None;
    }
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let owner = read_owner(packet, &mut offset)?;
        let method = read_method(packet, &mut offset)?;
        let endpoint = read_string(packet, &mut offset, MAX_ENDPOINT_LEN)?;
        let distance = read_u32(packet, &mut offset)?;
        let age_ms = read_u64(packet, &mut offset)?;
        records.push(ReplyRecord {
            owner,
            method,
            endpoint,
            distance,
            age_ms,
        });
    }

    Some(ReplyInfo {
        origin: header.origin,
        sequence: header.sequence,
        query_id,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::super::{build_announce, build_query, build_reply, build_revoke};
    use super::*;

    fn announce_fixture() -> AnnounceInfo {
        AnnounceInfo {
            origin: OwnerId::from_bytes([0x11; 16]),
            sequence: 7,
            owner: OwnerId::from_bytes([0x22; 16]),
            method: PublishMethod::TcpRpc,
            endpoint: "tcp://host:9000".to_string(),
            lease_ms: 30_000,
            age_ms: 1_234,
            capabilities: vec![
                Capability::new("com.example.Codec"),
                Capability::new("com.example.Sink"),
            ],
        }
    }

    #[test]
    fn test_announce_roundtrip() {
        let info = announce_fixture();
        let packet = build_announce(&info);
        let parsed = parse_announce(&packet).expect("well-formed announce parses");
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_revoke_roundtrip() {
        let info = RevokeInfo {
            origin: OwnerId::from_bytes([0x11; 16]),
            sequence: 8,
            owner: OwnerId::from_bytes([0x22; 16]),
            method: PublishMethod::SharedMem,
            endpoint: "shm://segment-4".to_string(),
        };
        let packet = build_revoke(&info);
        assert_eq!(parse_revoke(&packet).expect("parses"), info);
    }

    #[test]
    fn test_query_roundtrip() {
        let info = QueryInfo {
            origin: OwnerId::from_bytes([0x33; 16]),
            sequence: 1,
            query_id: 42,
            capability: Capability::new("com.example.Codec"),
        };
        let packet = build_query(&info);
        assert_eq!(parse_query(&packet).expect("parses"), info);
    }

    #[test]
    fn test_reply_roundtrip() {
        let info = ReplyInfo {
            origin: OwnerId::from_bytes([0x44; 16]),
            sequence: 3,
            query_id: 42,
            records: vec![
                ReplyRecord {
                    owner: OwnerId::from_bytes([0x22; 16]),
                    method: PublishMethod::TcpRpc,
                    endpoint: "tcp://host:9000".to_string(),
                    distance: 0,
                    age_ms: 500,
                },
                ReplyRecord {
                    owner: OwnerId::from_bytes([0x55; 16]),
                    method: PublishMethod::UdpRpc,
                    endpoint: "udp://host:9001".to_string(),
                    distance: 1,
                    age_ms: 9_000,
                },
            ],
        };
        let packet = build_reply(&info);
        assert_eq!(parse_reply(&packet).expect("parses"), info);
    }

    #[test]
    fn test_empty_reply_roundtrip() {
        let info = ReplyInfo {
            origin: OwnerId::from_bytes([0x44; 16]),
            sequence: 4,
            query_id: 1,
            records: vec![],
        };
        let packet = build_reply(&info);
        assert_eq!(parse_reply(&packet).expect("parses"), info);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut packet = build_query(&QueryInfo {
            origin: OwnerId::zero(),
            sequence: 0,
            query_id: 1,
            capability: Capability::new("cap"),
        });
        packet[0] = b'X';
        assert!(parse_header(&packet).is_none());
        assert!(parse_query(&packet).is_none());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut packet = build_announce(&announce_fixture());
        packet[4] = PROTOCOL_VERSION + 1;
        assert!(parse_announce(&packet).is_none());
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut packet = build_announce(&announce_fixture());
        packet[5] = 0x7F;
        assert!(parse_header(&packet).is_none());
    }

    #[test]
    fn test_rejects_unknown_method_code() {
        let info = announce_fixture();
        let mut packet = build_announce(&info);
        // Method code sits right after header + owner id.
        packet[HEADER_LEN + 16] = 0xEE;
        assert!(parse_announce(&packet).is_none());
    }

    #[test]
    fn test_rejects_kind_mismatch() {
        let packet = build_announce(&announce_fixture());
        assert!(parse_revoke(&packet).is_none());
        assert!(parse_query(&packet).is_none());
        assert!(parse_reply(&packet).is_none());
    }

    #[test]
    fn test_rejects_every_truncation() {
        let packet = build_announce(&announce_fixture());
        for cut in 0..packet.len() {
            assert!(
                parse_announce(&packet[..cut]).is_none(),
                "truncated at {} should not parse",
                cut
            );
        }

        let packet = build_reply(&ReplyInfo {
            origin: OwnerId::from_bytes([0x44; 16]),
            sequence: 3,
            query_id: 42,
            records: vec![ReplyRecord {
                owner: OwnerId::from_bytes([0x22; 16]),
                method: PublishMethod::TcpRpc,
                endpoint: "tcp://host:9000".to_string(),
                distance: 0,
                age_ms: 500,
            }],
        });
        for cut in 0..packet.len() {
            assert!(parse_reply(&packet[..cut]).is_none());
        }
    }

    #[test]
    fn test_rejects_lying_length_prefix() {
        let mut packet = build_query(&QueryInfo {
            origin: OwnerId::zero(),
            sequence: 0,
            query_id: 1,
            capability: Capability::new("cap"),
        });
        // Claim a far longer capability string than the packet holds.
        let len_offset = HEADER_LEN + 8;
        packet[len_offset] = 0xFF;
        packet[len_offset + 1] = 0x00;
        assert!(parse_query(&packet).is_none());
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut packet = build_query(&QueryInfo {
            origin: OwnerId::zero(),
            sequence: 0,
            query_id: 1,
            capability: Capability::new("cap"),
        });
        let text_offset = HEADER_LEN + 8 + 2;
        packet[text_offset] = 0xFF;
        assert!(parse_query(&packet).is_none());
    }

    #[test]
    fn test_rejects_empty_query_capability() {
        let packet = build_query(&QueryInfo {
            origin: OwnerId::zero(),
            sequence: 0,
            query_id: 1,
            capability: Capability::new(""),
        });
        assert!(parse_query(&packet).is_none());
    }

    #[test]
    fn test_garbage_never_panics() {
        let mut noise = Vec::new();
        for i in 0..512u32 {
            noise.push((i.wrapping_mul(2_654_435_761) >> 24) as u8);
            let _ = parse_header(&noise);
            let _ = parse_announce(&noise);
            let _ = parse_revoke(&noise);
            let _ = parse_query(&noise);
            let _ = parse_reply(&noise);
        }
    }
}
