//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, LazyLock as Lazy};

use bytes::Bytes;
use ospfd_core::packet::auth::{AuthCtx, AuthMethod};
use ospfd_core::packet::error::DecodeError;
use ospfd_core::packet::lsa::*;
use ospfd_core::packet::*;

//
// Helper functions.
//

fn test_encode_packet(
    bytes_expected: &[u8],
    auth: &Option<AuthMethod>,
    packet: &Packet,
) {
    let bytes_actual = packet.encode(auth.as_ref());
    assert_eq!(bytes_expected, bytes_actual.as_ref());
}

fn test_decode_packet(
    bytes: &[u8],
    auth: &Option<AuthMethod>,
    packet_expected: &Packet,
) {
    let mut buf = Bytes::copy_from_slice(bytes);
    let packet_actual = Packet::decode(&mut buf, auth.as_ref()).unwrap();
    assert_eq!(*packet_expected, packet_actual);
}

fn test_encode_lsa(bytes_expected: &[u8], lsa: &Lsa) {
    assert_eq!(bytes_expected, lsa.raw.as_ref());
}

fn test_decode_lsa(bytes: &[u8], lsa_expected: &Lsa) {
    let mut bytes = Bytes::copy_from_slice(bytes);
    let lsa_actual = Lsa::decode(&mut bytes).unwrap();
    assert_eq!(*lsa_expected, lsa_actual);
}

fn addr(s: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(s).unwrap()
}

fn md5_auth(seqno: u32) -> AuthMethod {
    AuthMethod::Cryptographic(AuthCtx::new(
        "HOLO".to_owned(),
        1,
        Arc::new(AtomicU32::new(seqno)),
    ))
}

//
// Test packets.
//

static HELLO1: Lazy<(Vec<u8>, Option<AuthMethod>, Packet)> = Lazy::new(|| {
    (
        vec![
            0x02, 0x01, 0x00, 0x30, 0x02, 0x02, 0x02, 0x02, 0x00, 0x00, 0x00,
            0x01, 0xf6, 0x9e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0xff, 0xff, 0xff, 0x00, 0x00, 0x03, 0x02, 0x01, 0x00,
            0x00, 0x00, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x01, 0x01, 0x01,
        ],
        None,
        Packet::Hello(Hello {
            hdr: PacketHdr {
                pkt_type: PacketType::Hello,
                router_id: addr("2.2.2.2"),
                area_id: addr("0.0.0.1"),
                auth_seqno: None,
            },
            network_mask: addr("255.255.255.0"),
            hello_interval: 3,
            options: Options::E,
            priority: 1,
            dead_interval: 36,
            dr: None,
            bdr: None,
            neighbors: [addr("1.1.1.1")].into(),
        }),
    )
});

static HELLO1_MD5: Lazy<(Vec<u8>, Option<AuthMethod>, Packet)> =
    Lazy::new(|| {
        (
            vec![
                0x02, 0x01, 0x00, 0x34, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x01, 0x10,
                0x32, 0x45, 0xd0, 0x14, 0xff, 0xff, 0xff, 0x00, 0x00, 0x03,
                0x02, 0x01, 0x00, 0x00, 0x00, 0x0c, 0x0a, 0x00, 0x01, 0x03,
                0x0a, 0x00, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x03, 0x03,
                0x03, 0x03, 0x9d, 0xd5, 0xa8, 0x03, 0x86, 0xee, 0x71, 0x67,
                0x44, 0x1a, 0x37, 0xa9, 0x04, 0x27, 0xfc, 0xc7,
            ],
            Some(md5_auth(843436052)),
            Packet::Hello(Hello {
                hdr: PacketHdr {
                    pkt_type: PacketType::Hello,
                    router_id: addr("1.1.1.1"),
                    area_id: addr("0.0.0.0"),
                    auth_seqno: Some(843436052),
                },
                network_mask: addr("255.255.255.0"),
                hello_interval: 3,
                options: Options::E,
                priority: 1,
                dead_interval: 12,
                dr: Some(addr("10.0.1.3").into()),
                bdr: Some(addr("10.0.1.2").into()),
                neighbors: [addr("2.2.2.2"), addr("3.3.3.3")].into(),
            }),
        )
    });

static DBDESC1: Lazy<(Vec<u8>, Option<AuthMethod>, Packet)> = Lazy::new(|| {
    (
        vec![
            0x02, 0x02, 0x00, 0x48, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00,
            0x01, 0xd8, 0x9e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x05, 0xdc, 0x42, 0x00, 0x4e, 0xb8, 0x8f, 0x2e, 0x00,
            0x03, 0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
            0x80, 0x00, 0x00, 0x02, 0x48, 0xd6, 0x00, 0x30, 0x00, 0x03, 0x02,
            0x05, 0xac, 0x10, 0x01, 0x00, 0x01, 0x01, 0x01, 0x01, 0x80, 0x00,
            0x00, 0x01, 0xfc, 0xff, 0x00, 0x24,
        ],
        None,
        Packet::DbDesc(DbDesc {
            hdr: PacketHdr {
                pkt_type: PacketType::DbDesc,
                router_id: addr("1.1.1.1"),
                area_id: addr("0.0.0.1"),
                auth_seqno: None,
            },
            mtu: 1500,
            options: Options::E | Options::O,
            dd_flags: DbDescFlags::empty(),
            dd_seq_no: 1320718126,
            lsa_hdrs: vec![
                LsaHdr {
                    age: 3,
                    options: Options::E,
                    lsa_type: LsaTypeCode::Router.into(),
                    lsa_id: addr("1.1.1.1"),
                    adv_rtr: addr("1.1.1.1"),
                    seq_no: 0x80000002,
                    cksum: 0x48d6,
                    length: 48,
                },
                LsaHdr {
                    age: 3,
                    options: Options::E,
                    lsa_type: LsaTypeCode::AsExternal.into(),
                    lsa_id: addr("172.16.1.0"),
                    adv_rtr: addr("1.1.1.1"),
                    seq_no: 0x80000001,
                    cksum: 0xfcff,
                    length: 36,
                },
            ],
        }),
    )
});

static LSREQUEST1: Lazy<(Vec<u8>, Option<AuthMethod>, Packet)> =
    Lazy::new(|| {
        (
            vec![
                0x02, 0x03, 0x00, 0x30, 0x02, 0x02, 0x02, 0x02, 0x00, 0x00,
                0x00, 0x01, 0x46, 0xab, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x01,
                0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x05,
                0xac, 0x10, 0x01, 0x00, 0x01, 0x01, 0x01, 0x01,
            ],
            None,
            Packet::LsRequest(LsRequest {
                hdr: PacketHdr {
                    pkt_type: PacketType::LsRequest,
                    router_id: addr("2.2.2.2"),
                    area_id: addr("0.0.0.1"),
                    auth_seqno: None,
                },
                entries: vec![
                    LsaKey {
                        lsa_type: LsaTypeCode::Router.into(),
                        adv_rtr: addr("1.1.1.1"),
                        lsa_id: addr("1.1.1.1"),
                    },
                    LsaKey {
                        lsa_type: LsaTypeCode::AsExternal.into(),
                        adv_rtr: addr("1.1.1.1"),
                        lsa_id: addr("172.16.1.0"),
                    },
                ],
            }),
        )
    });

static LSUPDATE1: Lazy<(Vec<u8>, Option<AuthMethod>, Packet)> =
    Lazy::new(|| {
        (
            vec![
                0x02, 0x04, 0x00, 0x78, 0x02, 0x02, 0x02, 0x02, 0x00, 0x00,
                0x00, 0x01, 0x40, 0xa1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x31,
                0x02, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
                0x80, 0x00, 0x00, 0x02, 0x37, 0xf4, 0x00, 0x24, 0x01, 0x00,
                0x00, 0x01, 0x0a, 0x00, 0x01, 0x00, 0xff, 0xff, 0xff, 0x00,
                0x03, 0x00, 0x00, 0x0a, 0x00, 0x31, 0x02, 0x03, 0x02, 0x02,
                0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x80, 0x00, 0x00, 0x01,
                0xd2, 0x7a, 0x00, 0x1c, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x31, 0x02, 0x03, 0x0a, 0x00, 0x02, 0x00,
                0x02, 0x02, 0x02, 0x02, 0x80, 0x00, 0x00, 0x01, 0xfa, 0x44,
                0x00, 0x1c, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x0a,
            ],
            None,
            Packet::LsUpdate(LsUpdate {
                hdr: PacketHdr {
                    pkt_type: PacketType::LsUpdate,
                    router_id: addr("2.2.2.2"),
                    area_id: addr("0.0.0.1"),
                    auth_seqno: None,
                },
                lsas: vec![
                    Lsa::new(
                        49,
                        Options::E,
                        addr("2.2.2.2"),
                        addr("2.2.2.2"),
                        0x80000002,
                        LsaBody::Router(LsaRouter {
                            flags: LsaRouterFlags::B,
                            links: vec![LsaRouterLink {
                                link_type: LsaRouterLinkType::StubNetwork,
                                link_id: addr("10.0.1.0"),
                                link_data: addr("255.255.255.0"),
                                metric: 10,
                            }],
                        }),
                    ),
                    Lsa::new(
                        49,
                        Options::E,
                        addr("2.2.2.2"),
                        addr("2.2.2.2"),
                        0x80000001,
                        LsaBody::SummaryNetwork(LsaSummary {
                            mask: addr("255.255.255.255"),
                            metric: 0,
                        }),
                    ),
                    Lsa::new(
                        49,
                        Options::E,
                        addr("10.0.2.0"),
                        addr("2.2.2.2"),
                        0x80000001,
                        LsaBody::SummaryNetwork(LsaSummary {
                            mask: addr("255.255.255.0"),
                            metric: 10,
                        }),
                    ),
                ],
            }),
        )
    });

static LSACK1: Lazy<(Vec<u8>, Option<AuthMethod>, Packet)> = Lazy::new(|| {
    (
        vec![
            0x02, 0x05, 0x00, 0x54, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00,
            0x01, 0xa0, 0x2e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x03, 0x03, 0x03, 0x03, 0x02,
            0x02, 0x02, 0x02, 0x80, 0x00, 0x00, 0x01, 0x09, 0x36, 0x00, 0x1c,
            0x00, 0x01, 0x02, 0x03, 0x0a, 0x00, 0x03, 0x00, 0x02, 0x02, 0x02,
            0x02, 0x80, 0x00, 0x00, 0x01, 0x54, 0xdf, 0x00, 0x1c, 0x00, 0x01,
            0x02, 0x03, 0x0a, 0x00, 0x04, 0x00, 0x02, 0x02, 0x02, 0x02, 0x80,
            0x00, 0x00, 0x01, 0x49, 0xe9, 0x00, 0x1c,
        ],
        None,
        Packet::LsAck(LsAck {
            hdr: PacketHdr {
                pkt_type: PacketType::LsAck,
                router_id: addr("1.1.1.1"),
                area_id: addr("0.0.0.1"),
                auth_seqno: None,
            },
            lsa_hdrs: vec![
                LsaHdr {
                    age: 1,
                    options: Options::E,
                    lsa_type: LsaTypeCode::SummaryNetwork.into(),
                    lsa_id: addr("3.3.3.3"),
                    adv_rtr: addr("2.2.2.2"),
                    seq_no: 0x80000001,
                    cksum: 0x0936,
                    length: 28,
                },
                LsaHdr {
                    age: 1,
                    options: Options::E,
                    lsa_type: LsaTypeCode::SummaryNetwork.into(),
                    lsa_id: addr("10.0.3.0"),
                    adv_rtr: addr("2.2.2.2"),
                    seq_no: 0x80000001,
                    cksum: 0x54df,
                    length: 28,
                },
                LsaHdr {
                    age: 1,
                    options: Options::E,
                    lsa_type: LsaTypeCode::SummaryNetwork.into(),
                    lsa_id: addr("10.0.4.0"),
                    adv_rtr: addr("2.2.2.2"),
                    seq_no: 0x80000001,
                    cksum: 0x49e9,
                    length: 28,
                },
            ],
        }),
    )
});

//
// Test LSAs.
//

static LSA1: Lazy<(Vec<u8>, Lsa)> = Lazy::new(|| {
    (
        vec![
            0x00, 0x31, 0x02, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
            0x02, 0x80, 0x00, 0x00, 0x02, 0x37, 0xf4, 0x00, 0x24, 0x01, 0x00,
            0x00, 0x01, 0x0a, 0x00, 0x01, 0x00, 0xff, 0xff, 0xff, 0x00, 0x03,
            0x00, 0x00, 0x0a,
        ],
        Lsa::new(
            49,
            Options::E,
            addr("2.2.2.2"),
            addr("2.2.2.2"),
            0x80000002,
            LsaBody::Router(LsaRouter {
                flags: LsaRouterFlags::B,
                links: vec![LsaRouterLink {
                    link_type: LsaRouterLinkType::StubNetwork,
                    link_id: addr("10.0.1.0"),
                    link_data: addr("255.255.255.0"),
                    metric: 10,
                }],
            }),
        ),
    )
});

static LSA2: Lazy<(Vec<u8>, Lsa)> = Lazy::new(|| {
    (
        vec![
            0x0e, 0x10, 0x02, 0x05, 0xac, 0x10, 0x01, 0x00, 0x01, 0x01, 0x01,
            0x01, 0x80, 0x00, 0x00, 0x01, 0x98, 0x6e, 0x00, 0x24, 0xff, 0xff,
            0xff, 0x00, 0x80, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
        ],
        Lsa::new(
            3600,
            Options::E,
            addr("172.16.1.0"),
            addr("1.1.1.1"),
            0x80000001,
            LsaBody::AsExternal(LsaExternal {
                mask: addr("255.255.255.0"),
                flags: LsaExternalFlags::E,
                metric: 10,
                fwd_addr: None,
                tag: 0,
            }),
        ),
    )
});

//
// Tests.
//

#[test]
fn test_encode_hello1() {
    let (ref bytes, ref auth, ref hello) = *HELLO1;
    test_encode_packet(bytes, auth, hello);
}

#[test]
fn test_decode_hello1() {
    let (ref bytes, ref auth, ref hello) = *HELLO1;
    test_decode_packet(bytes, auth, hello);
}

#[test]
fn test_encode_hello1_md5() {
    let (ref bytes, ref auth, ref hello) = *HELLO1_MD5;
    test_encode_packet(bytes, auth, hello);
}

#[test]
fn test_decode_hello1_md5() {
    let (ref bytes, ref auth, ref hello) = *HELLO1_MD5;
    test_decode_packet(bytes, auth, hello);
}

#[test]
fn test_decode_hello1_md5_bad_digest() {
    let (ref bytes, ref auth, _) = *HELLO1_MD5;
    let mut bytes = bytes.clone();
    *bytes.last_mut().unwrap() ^= 0xff;
    let mut buf = Bytes::copy_from_slice(&bytes);
    assert_eq!(
        Packet::decode(&mut buf, auth.as_ref()),
        Err(DecodeError::AuthError)
    );
}

#[test]
fn test_decode_hello1_auth_type_mismatch() {
    // Null-authenticated packet received on an MD5-protected interface.
    let (ref bytes, _, _) = *HELLO1;
    let auth = md5_auth(843436052);
    let mut buf = Bytes::copy_from_slice(bytes);
    assert_eq!(
        Packet::decode(&mut buf, Some(&auth)),
        Err(DecodeError::AuthTypeMismatch)
    );
}

#[test]
fn test_decode_packet_bad_checksum() {
    let (ref bytes, _, _) = *HELLO1;
    let mut bytes = bytes.clone();
    bytes[30] ^= 0xff;
    let mut buf = Bytes::copy_from_slice(&bytes);
    assert_eq!(
        Packet::decode(&mut buf, None),
        Err(DecodeError::InvalidChecksum)
    );
}

#[test]
fn test_decode_packet_truncated() {
    let (ref bytes, _, _) = *LSUPDATE1;
    // Declared length larger than the wire length.
    let mut buf = Bytes::copy_from_slice(&bytes[..44]);
    assert!(matches!(
        Packet::decode(&mut buf, None),
        Err(DecodeError::InvalidChecksum | DecodeError::InvalidLength(_))
    ));
}

#[test]
fn test_encode_dbdesc1() {
    let (ref bytes, ref auth, ref dbdesc) = *DBDESC1;
    test_encode_packet(bytes, auth, dbdesc);
}

#[test]
fn test_decode_dbdesc1() {
    let (ref bytes, ref auth, ref dbdesc) = *DBDESC1;
    test_decode_packet(bytes, auth, dbdesc);
}

#[test]
fn test_encode_lsrequest1() {
    let (ref bytes, ref auth, ref request) = *LSREQUEST1;
    test_encode_packet(bytes, auth, request);
}

#[test]
fn test_decode_lsrequest1() {
    let (ref bytes, ref auth, ref request) = *LSREQUEST1;
    test_decode_packet(bytes, auth, request);
}

#[test]
fn test_encode_lsupdate1() {
    let (ref bytes, ref auth, ref lsupdate) = *LSUPDATE1;
    test_encode_packet(bytes, auth, lsupdate);
}

#[test]
fn test_decode_lsupdate1() {
    let (ref bytes, ref auth, ref lsupdate) = *LSUPDATE1;
    test_decode_packet(bytes, auth, lsupdate);
}

#[test]
fn test_encode_lsack1() {
    let (ref bytes, ref auth, ref lsack) = *LSACK1;
    test_encode_packet(bytes, auth, lsack);
}

#[test]
fn test_decode_lsack1() {
    let (ref bytes, ref auth, ref lsack) = *LSACK1;
    test_decode_packet(bytes, auth, lsack);
}

#[test]
fn test_encode_lsa1() {
    let (ref bytes, ref lsa) = *LSA1;
    test_encode_lsa(bytes, lsa);
}

#[test]
fn test_decode_lsa1() {
    let (ref bytes, ref lsa) = *LSA1;
    test_decode_lsa(bytes, lsa);
}

#[test]
fn test_encode_lsa2() {
    let (ref bytes, ref lsa) = *LSA2;
    test_encode_lsa(bytes, lsa);
}

#[test]
fn test_decode_lsa2() {
    let (ref bytes, ref lsa) = *LSA2;
    test_decode_lsa(bytes, lsa);
}

//
// Validator tests.
//

#[test]
fn test_examine_lsa_truncated_router() {
    // Router-LSA header claiming two 12-byte link blocks (28 bytes of body)
    // inside a 20-byte buffer.
    let (ref bytes, _) = *LSA1;
    let mut bytes = bytes.clone();
    bytes[19] = 20 + 4 + 24;
    bytes[23] = 2;
    bytes.truncate(20);

    let mut buf = Bytes::copy_from_slice(&bytes);
    assert!(matches!(
        Lsa::decode(&mut buf),
        Err(DecodeError::InvalidLsaLength(_))
    ));
}

#[test]
fn test_examine_lsa_router_link_count_mismatch() {
    // One link block on the wire, two declared.
    let (ref bytes, _) = *LSA1;
    let mut bytes = bytes.clone();
    bytes[23] = 2;

    let mut buf = Bytes::copy_from_slice(&bytes);
    assert_eq!(
        Lsa::decode(&mut buf),
        Err(DecodeError::InvalidRouterLinkCount {
            declared: 2,
            found: 1
        })
    );
}

#[test]
fn test_examine_lsa_minimum_sizes() {
    // For every LSA type, a declared length one byte short of the type's
    // minimum must be rejected.
    for (lsa_type, min_body) in [
        (LsaTypeCode::Router, 4),
        (LsaTypeCode::Network, 8),
        (LsaTypeCode::SummaryNetwork, 8),
        (LsaTypeCode::SummaryRouter, 8),
        (LsaTypeCode::AsExternal, 16),
        (LsaTypeCode::NssaExternal, 16),
    ] {
        let hdr = LsaHdr {
            age: 1,
            options: Options::E,
            lsa_type: lsa_type.into(),
            lsa_id: addr("1.1.1.1"),
            adv_rtr: addr("1.1.1.1"),
            seq_no: 0x80000001,
            cksum: 0,
            length: 20 + min_body - 1,
        };
        assert!(
            examine_lsa(&hdr, None).is_err(),
            "type {:?} accepted a truncated length",
            lsa_type
        );
    }
}

#[test]
fn test_examine_lsa_external_stride() {
    // AS-external bodies grow in 12-byte TOS blocks past the 16-byte base.
    let mut hdr = LsaHdr {
        age: 1,
        options: Options::E,
        lsa_type: LsaTypeCode::AsExternal.into(),
        lsa_id: addr("172.16.1.0"),
        adv_rtr: addr("1.1.1.1"),
        seq_no: 0x80000001,
        cksum: 0,
        length: 20 + 16 + 12,
    };
    assert!(examine_lsa(&hdr, None).is_ok());
    hdr.length = 20 + 16 + 8;
    assert!(examine_lsa(&hdr, None).is_err());
}

#[test]
fn test_examine_lsa_sequence_count_mismatch() {
    // A Link State Update declaring N LSAs but containing N±1 is rejected.
    let (ref bytes, _, _) = *LSUPDATE1;
    let lsas = Bytes::copy_from_slice(&bytes[28..]);

    assert!(examine_lsa_sequence(&lsas, false, Some(3)).is_ok());
    assert_eq!(
        examine_lsa_sequence(&lsas, false, Some(2)),
        Err(DecodeError::InvalidLsaCount {
            declared: 2,
            found: 3
        })
    );
    assert_eq!(
        examine_lsa_sequence(&lsas, false, Some(4)),
        Err(DecodeError::InvalidLsaCount {
            declared: 4,
            found: 3
        })
    );
}

#[test]
fn test_examine_lsa_sequence_truncated() {
    // An LSA whose declared length overruns the buffer is rejected.
    let (ref bytes, _, _) = *LSUPDATE1;
    let lsas = Bytes::copy_from_slice(&bytes[28..bytes.len() - 4]);
    assert!(examine_lsa_sequence(&lsas, false, Some(3)).is_err());

    // Header sequences must be a whole number of 20-byte headers.
    let (ref bytes, _, _) = *LSACK1;
    let hdrs = Bytes::copy_from_slice(&bytes[24..bytes.len() - 4]);
    assert!(examine_lsa_sequence(&hdrs, true, None).is_err());
}

#[test]
fn test_lsa_checksum_round_trip() {
    let (_, ref lsa) = *LSA1;
    // The encoded checksum must validate to zero over the fletched region.
    assert_eq!(
        ospfd_core::checksum::fletcher_checksum_validate(
            &lsa.raw[2..lsa.hdr.length as usize]
        ),
        0
    );
    // And match the golden vector value.
    assert_eq!(lsa.hdr.cksum, 0x37f4);
}
