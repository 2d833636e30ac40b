//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod auth;
pub mod error;
pub mod lsa;

use std::cell::{RefCell, RefMut};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::atomic;

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use internet_checksum::Checksum;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use ospfd_utils::bytes::{BytesExt, BytesMutExt, TLS_BUF};
use ospfd_utils::ip::Ipv4AddrExt;
use serde::{Deserialize, Serialize};

use crate::neighbor::NeighborNetId;
use crate::packet::auth::{AuthMethod, MD5_DIGEST_LENGTH};
use crate::packet::error::{DecodeError, DecodeResult};
use crate::packet::lsa::{
    Lsa, LsaHdr, LsaKey, LsaType, examine_lsa_sequence,
};

// OSPFv2 Options field.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-1
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct Options: u8 {
        const E = 0x02;
        const MC = 0x04;
        const NP = 0x08;
        const DC = 0x20;
        const O = 0x40;
    }
}

// Database Description flags.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct DbDescFlags: u8 {
        const MS = 0x01;
        const M = 0x02;
        const I = 0x04;
    }
}

// OSPF Packet Type.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-3
#[derive(Clone, Copy, Debug, Eq, Hash, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketType {
    Hello = 0x01,
    DbDesc = 0x02,
    LsRequest = 0x03,
    LsUpdate = 0x04,
    LsAck = 0x05,
}

// OSPFv2 authentication type.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AuthType {
    Null = 0x00,
    Simple = 0x01,
    Cryptographic = 0x02,
}

// OSPF packet.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Packet {
    Hello(Hello),
    DbDesc(DbDesc),
    LsRequest(LsRequest),
    LsUpdate(LsUpdate),
    LsAck(LsAck),
}

//
// OSPFv2 packet header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Version #   |     Type      |         Packet length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          Router ID                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           Area ID                             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           Checksum            |             AuType            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Authentication                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Authentication                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PacketHdr {
    pub pkt_type: PacketType,
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    // Decoded authentication sequence number.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_seqno: Option<u32>,
}

#[derive(Debug)]
pub enum PacketHdrAuth {
    Null,
    Simple([u8; 8]),
    Cryptographic {
        key_id: u8,
        auth_len: u8,
        seqno: u32,
    },
}

//
// OSPFv2 Hello packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                        Network Mask                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         HelloInterval         |    Options    |    Rtr Pri    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     RouterDeadInterval                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                      Designated Router                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                   Backup Designated Router                    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          Neighbor                             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Hello {
    pub hdr: PacketHdr,
    pub network_mask: Ipv4Addr,
    pub hello_interval: u16,
    pub options: Options,
    pub priority: u8,
    pub dead_interval: u32,
    pub dr: Option<NeighborNetId>,
    pub bdr: Option<NeighborNetId>,
    pub neighbors: BTreeSet<Ipv4Addr>,
}

//
// OSPFv2 Database Description packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Interface MTU         |    Options    |0|0|0|0|0|I|M|MS
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     DD sequence number                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +-                      An LSA Header                          -+
// |                              ...                              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DbDesc {
    pub hdr: PacketHdr,
    pub mtu: u16,
    pub options: Options,
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
    pub lsa_hdrs: Vec<LsaHdr>,
}

//
// OSPFv2 Link State Request packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          LS type                              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Link State ID                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     Advertising Router                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsRequest {
    pub hdr: PacketHdr,
    pub entries: Vec<LsaKey>,
}

//
// OSPFv2 Link State Update packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                            # LSAs                             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                             LSAs                              |
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsUpdate {
    pub hdr: PacketHdr,
    pub lsas: Vec<Lsa>,
}

//
// OSPFv2 Link State Acknowledgment packet.
//
// Encoding format (packet body): a sequence of LSA headers.
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsAck {
    pub hdr: PacketHdr,
    pub lsa_hdrs: Vec<LsaHdr>,
}

// ===== impl Packet =====

impl Packet {
    // Decodes OSPF packet from a bytes buffer.
    //
    // The wire-level size and alignment rules are enforced here, before any
    // body field is interpreted; malformed input is rejected, never
    // repaired.
    pub fn decode(
        buf: &mut Bytes,
        auth: Option<&AuthMethod>,
    ) -> DecodeResult<Self> {
        if buf.remaining() < PacketHdr::LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.len() as u16));
        }

        // Verify if the packet checksum is correct. With cryptographic
        // authentication the checksum field carries no checksum and the
        // message digest protects the packet instead.
        if !matches!(auth, Some(AuthMethod::Cryptographic(..))) {
            PacketHdr::verify_cksum(buf.as_ref())?;
        }

        // Create a zero-copy duplicate of the original packet buffer.
        let buf_orig = buf.clone();

        // Decode the packet header.
        let (mut hdr, pkt_len, hdr_auth) = PacketHdr::decode(buf)?;
        if pkt_len as usize > buf_orig.len() {
            return Err(DecodeError::InvalidLength(pkt_len));
        }
        let mut buf =
            buf.slice(..pkt_len as usize - PacketHdr::LENGTH as usize);

        // Validate the packet authentication.
        if let Some(auth_seqno) =
            decode_auth_validate(buf_orig.as_ref(), pkt_len, hdr_auth, auth)?
        {
            hdr.auth_seqno = Some(auth_seqno);
        }

        // Decode the packet body.
        let packet = match hdr.pkt_type {
            PacketType::Hello => Packet::Hello(Hello::decode(hdr, &mut buf)?),
            PacketType::DbDesc => {
                Packet::DbDesc(DbDesc::decode(hdr, &mut buf)?)
            }
            PacketType::LsRequest => {
                Packet::LsRequest(LsRequest::decode(hdr, &mut buf)?)
            }
            PacketType::LsUpdate => {
                Packet::LsUpdate(LsUpdate::decode(hdr, &mut buf)?)
            }
            PacketType::LsAck => Packet::LsAck(LsAck::decode(hdr, &mut buf)?),
        };

        Ok(packet)
    }

    // Encodes OSPF packet into a bytes buffer.
    pub fn encode(&self, auth: Option<&AuthMethod>) -> Bytes {
        match self {
            Packet::Hello(pkt) => pkt.encode(auth),
            Packet::DbDesc(pkt) => pkt.encode(auth),
            Packet::LsRequest(pkt) => pkt.encode(auth),
            Packet::LsUpdate(pkt) => pkt.encode(auth),
            Packet::LsAck(pkt) => pkt.encode(auth),
        }
    }

    // Returns a reference to the packet header.
    pub fn hdr(&self) -> &PacketHdr {
        match self {
            Packet::Hello(pkt) => &pkt.hdr,
            Packet::DbDesc(pkt) => &pkt.hdr,
            Packet::LsRequest(pkt) => &pkt.hdr,
            Packet::LsUpdate(pkt) => &pkt.hdr,
            Packet::LsAck(pkt) => &pkt.hdr,
        }
    }
}

// ===== impl PacketHdr =====

impl PacketHdr {
    pub const VERSION: u8 = 2;
    pub const LENGTH: u16 = 24;
    pub const CKSUM_RANGE: std::ops::Range<usize> = 12..14;
    pub const AUTH_RANGE: std::ops::Range<usize> = 16..24;

    pub fn decode(buf: &mut Bytes) -> DecodeResult<(Self, u16, PacketHdrAuth)> {
        // Parse version.
        let version = buf.get_u8();
        if version != Self::VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        // Parse packet type.
        let pkt_type = buf.get_u8();
        let pkt_type = match PacketType::from_u8(pkt_type) {
            Some(pkt_type) => pkt_type,
            None => return Err(DecodeError::UnknownPacketType(pkt_type)),
        };

        // Parse and validate message length.
        let pkt_len = buf.get_u16();
        if pkt_len < Self::LENGTH {
            return Err(DecodeError::InvalidLength(pkt_len));
        }

        // Parse Router-ID.
        let router_id = buf.get_ipv4();
        if !router_id.is_usable() {
            return Err(DecodeError::InvalidRouterId(router_id));
        }

        // Parse Area ID.
        let area_id = buf.get_ipv4();

        // Parse checksum (already verified).
        let _cksum = buf.get_u16();

        // Parse authentication data.
        let au_type = buf.get_u16();
        let auth = match AuthType::from_u16(au_type) {
            Some(AuthType::Null) => {
                let _ = buf.get_u64();
                PacketHdrAuth::Null
            }
            Some(AuthType::Simple) => {
                let mut password = [0; 8];
                buf.copy_to_slice(&mut password);
                PacketHdrAuth::Simple(password)
            }
            Some(AuthType::Cryptographic) => {
                let _ = buf.get_u16();
                let key_id = buf.get_u8();
                let auth_len = buf.get_u8();
                let seqno = buf.get_u32();
                PacketHdrAuth::Cryptographic {
                    key_id,
                    auth_len,
                    seqno,
                }
            }
            _ => {
                return Err(DecodeError::UnsupportedAuthType(au_type));
            }
        };

        Ok((
            PacketHdr {
                pkt_type,
                router_id,
                area_id,
                auth_seqno: None,
            },
            pkt_len,
            auth,
        ))
    }

    fn encode(&self, buf: &mut BytesMut, auth: Option<&AuthMethod>) {
        buf.put_u8(Self::VERSION);
        buf.put_u8(self.pkt_type as u8);
        // The length will be initialized later.
        buf.put_u16(0);
        buf.put_ipv4(&self.router_id);
        buf.put_ipv4(&self.area_id);
        // The checksum will be computed later.
        buf.put_u16(0);
        // Authentication.
        match auth {
            Some(AuthMethod::Simple(..)) => {
                // The password is inserted after the checksum is computed.
                buf.put_u16(AuthType::Simple as u16);
                buf.put_u64(0);
            }
            Some(AuthMethod::Cryptographic(auth)) => {
                buf.put_u16(AuthType::Cryptographic as u16);
                buf.put_u16(0);
                buf.put_u8(auth.key_id as u8);
                buf.put_u8(MD5_DIGEST_LENGTH);
                // RFC 2328 does not include provisions for handling sequence
                // number overflows.
                buf.put_u32(
                    auth.seqno.fetch_add(1, atomic::Ordering::Relaxed),
                );
            }
            None => {
                buf.put_u16(AuthType::Null as u16);
                buf.put_u64(0);
            }
        }
    }

    fn update_cksum(buf: &mut BytesMut) {
        let mut cksum = Checksum::new();
        cksum.add_bytes(buf);
        buf[Self::CKSUM_RANGE].copy_from_slice(&cksum.checksum());
    }

    fn verify_cksum(data: &[u8]) -> DecodeResult<()> {
        // The 64-bit authentication field is excluded from the checksum.
        let mut cksum = Checksum::new();
        cksum.add_bytes(&data[0..Self::AUTH_RANGE.start]);
        cksum.add_bytes(&data[Self::AUTH_RANGE.end..]);
        if cksum.checksum() != [0; 2] {
            return Err(DecodeError::InvalidChecksum);
        }

        Ok(())
    }

    pub(crate) fn generate(
        pkt_type: PacketType,
        router_id: Ipv4Addr,
        area_id: Ipv4Addr,
    ) -> Self {
        PacketHdr {
            pkt_type,
            router_id,
            area_id,
            auth_seqno: None,
        }
    }
}

// ===== impl Hello =====

impl Hello {
    pub const BASE_LENGTH: u16 = 20;

    fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::BASE_LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.len() as u16));
        }

        let network_mask = buf.get_ipv4();
        let hello_interval = buf.get_u16();
        // Ignore unknown options.
        let options = Options::from_bits_truncate(buf.get_u8());
        let priority = buf.get_u8();
        let dead_interval = buf.get_u32();
        let dr = buf.get_opt_ipv4();
        let bdr = buf.get_opt_ipv4();

        // Parse list of neighbors.
        let mut neighbors = BTreeSet::new();
        let nbrs_cnt = buf.remaining() / 4;
        for _ in 0..nbrs_cnt {
            let nbr = buf.get_ipv4();
            neighbors.insert(nbr);
        }

        Ok(Hello {
            hdr,
            network_mask,
            hello_interval,
            options,
            priority,
            dead_interval,
            dr: dr.map(NeighborNetId::from),
            bdr: bdr.map(NeighborNetId::from),
            neighbors,
        })
    }

    fn encode(&self, auth: Option<&AuthMethod>) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = packet_encode_start(buf, &self.hdr, auth);

            buf.put_ipv4(&self.network_mask);
            buf.put_u16(self.hello_interval);
            buf.put_u8(self.options.bits());
            buf.put_u8(self.priority);
            buf.put_u32(self.dead_interval);
            buf.put_ipv4(
                &self
                    .dr
                    .map(|addr| addr.get())
                    .unwrap_or(Ipv4Addr::UNSPECIFIED),
            );
            buf.put_ipv4(
                &self
                    .bdr
                    .map(|addr| addr.get())
                    .unwrap_or(Ipv4Addr::UNSPECIFIED),
            );
            for nbr in &self.neighbors {
                buf.put_ipv4(nbr);
            }

            packet_encode_end(buf, auth)
        })
    }
}

// ===== impl DbDesc =====

impl DbDesc {
    pub const BASE_LENGTH: u16 = 8;

    fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::BASE_LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.len() as u16));
        }

        let mtu = buf.get_u16();
        let options = Options::from_bits_truncate(buf.get_u8());
        let dd_flags = DbDescFlags::from_bits_truncate(buf.get_u8());
        let dd_seq_no = buf.get_u32();

        // Examine and parse the list of LSA headers.
        examine_lsa_sequence(&buf.clone(), true, None)?;
        let mut lsa_hdrs = vec![];
        let lsa_hdrs_cnt = buf.remaining() / LsaHdr::LENGTH as usize;
        for _ in 0..lsa_hdrs_cnt {
            let lsa_hdr = LsaHdr::decode(buf)?;
            lsa_hdrs.push(lsa_hdr);
        }

        Ok(DbDesc {
            hdr,
            mtu,
            options,
            dd_flags,
            dd_seq_no,
            lsa_hdrs,
        })
    }

    fn encode(&self, auth: Option<&AuthMethod>) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = packet_encode_start(buf, &self.hdr, auth);

            buf.put_u16(self.mtu);
            buf.put_u8(self.options.bits());
            buf.put_u8(self.dd_flags.bits());
            buf.put_u32(self.dd_seq_no);
            for lsa_hdr in &self.lsa_hdrs {
                lsa_hdr.encode(&mut buf);
            }

            packet_encode_end(buf, auth)
        })
    }

    pub(crate) fn generate(
        hdr: PacketHdr,
        options: Options,
        mtu: u16,
        dd_flags: DbDescFlags,
        dd_seq_no: u32,
        lsa_hdrs: Vec<LsaHdr>,
    ) -> Packet {
        Packet::DbDesc(DbDesc {
            hdr,
            options,
            mtu,
            dd_flags,
            dd_seq_no,
            lsa_hdrs,
        })
    }
}

// ===== impl LsRequest =====

impl LsRequest {
    pub const ENTRY_LENGTH: u16 = 12;

    fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() % Self::ENTRY_LENGTH as usize != 0 {
            return Err(DecodeError::InvalidLength(buf.len() as u16));
        }

        // Parse list of LSA global IDs.
        let mut entries = vec![];
        let entries_cnt = buf.remaining() / Self::ENTRY_LENGTH as usize;
        for _ in 0..entries_cnt {
            let lsa_type = LsaType(buf.get_u32() as u8);
            let lsa_id = buf.get_ipv4();
            let adv_rtr = buf.get_ipv4();
            let entry = LsaKey {
                lsa_type,
                adv_rtr,
                lsa_id,
            };
            entries.push(entry);
        }

        Ok(LsRequest { hdr, entries })
    }

    fn encode(&self, auth: Option<&AuthMethod>) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = packet_encode_start(buf, &self.hdr, auth);

            for entry in &self.entries {
                buf.put_u32(entry.lsa_type.0 as u32);
                buf.put_ipv4(&entry.lsa_id);
                buf.put_ipv4(&entry.adv_rtr);
            }

            packet_encode_end(buf, auth)
        })
    }

    pub(crate) fn generate(hdr: PacketHdr, entries: Vec<LsaKey>) -> Packet {
        Packet::LsRequest(LsRequest { hdr, entries })
    }
}

// ===== impl LsUpdate =====

impl LsUpdate {
    pub const BASE_LENGTH: u16 = 4;

    fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::BASE_LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.len() as u16));
        }

        // Examine the concatenation of LSAs before decoding any of them,
        // checking each declared length against the remaining buffer and the
        // total count against the declared count.
        let lsas_cnt = buf.get_u32();
        examine_lsa_sequence(&buf.clone(), false, Some(lsas_cnt))?;

        // Parse list of LSAs.
        let mut lsas = vec![];
        for _ in 0..lsas_cnt {
            let lsa = Lsa::decode(buf)?;
            lsas.push(lsa);
        }

        Ok(LsUpdate { hdr, lsas })
    }

    fn encode(&self, auth: Option<&AuthMethod>) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = packet_encode_start(buf, &self.hdr, auth);

            buf.put_u32(self.lsas.len() as u32);
            for lsa in &self.lsas {
                buf.put_slice(&lsa.raw);
            }

            packet_encode_end(buf, auth)
        })
    }

    pub(crate) fn generate(hdr: PacketHdr, lsas: Vec<Lsa>) -> Packet {
        Packet::LsUpdate(LsUpdate { hdr, lsas })
    }
}

// ===== impl LsAck =====

impl LsAck {
    fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        // Examine and parse the list of LSA headers.
        examine_lsa_sequence(&buf.clone(), true, None)?;
        let mut lsa_hdrs = vec![];
        let lsa_hdrs_cnt = buf.remaining() / LsaHdr::LENGTH as usize;
        for _ in 0..lsa_hdrs_cnt {
            let lsa_hdr = LsaHdr::decode(buf)?;
            lsa_hdrs.push(lsa_hdr);
        }

        Ok(LsAck { hdr, lsa_hdrs })
    }

    fn encode(&self, auth: Option<&AuthMethod>) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = packet_encode_start(buf, &self.hdr, auth);

            for lsa_hdr in &self.lsa_hdrs {
                lsa_hdr.encode(&mut buf);
            }

            packet_encode_end(buf, auth)
        })
    }

    pub(crate) fn generate(hdr: PacketHdr, lsa_hdrs: Vec<LsaHdr>) -> Packet {
        Packet::LsAck(LsAck { hdr, lsa_hdrs })
    }
}

// ===== helper functions =====

fn packet_encode_start<'a>(
    buf: &'a RefCell<BytesMut>,
    hdr: &PacketHdr,
    auth: Option<&AuthMethod>,
) -> RefMut<'a, BytesMut> {
    let mut buf = buf.borrow_mut();
    buf.clear();
    hdr.encode(&mut buf, auth);
    buf
}

fn packet_encode_end(
    mut buf: RefMut<'_, BytesMut>,
    auth: Option<&AuthMethod>,
) -> Bytes {
    // Initialize packet length.
    let pkt_len = buf.len() as u16;
    buf[2..4].copy_from_slice(&pkt_len.to_be_bytes());

    // Calculate the packet checksum or append the authentication trailer.
    match auth {
        Some(AuthMethod::Simple(password)) => {
            // The checksum is computed as if the authentication field were
            // zero, then the password is inserted.
            PacketHdr::update_cksum(&mut buf);
            buf[PacketHdr::AUTH_RANGE].copy_from_slice(password);
        }
        Some(AuthMethod::Cryptographic(auth)) => {
            let digest = auth::message_digest(&buf, &auth.key);
            buf.put_slice(&digest);
        }
        None => {
            PacketHdr::update_cksum(&mut buf);
        }
    }

    buf.clone().freeze()
}

fn decode_auth_validate(
    data: &[u8],
    pkt_len: u16,
    hdr_auth: PacketHdrAuth,
    auth: Option<&AuthMethod>,
) -> DecodeResult<Option<u32>> {
    match (auth, hdr_auth) {
        // No authentication.
        (None, PacketHdrAuth::Null) => Ok(None),
        // Handle simple-password authentication.
        (Some(AuthMethod::Simple(password)), PacketHdrAuth::Simple(rcvd)) => {
            if *password != rcvd {
                return Err(DecodeError::AuthError);
            }
            Ok(None)
        }
        // Handle cryptographic authentication.
        (
            Some(AuthMethod::Cryptographic(auth)),
            PacketHdrAuth::Cryptographic {
                key_id,
                auth_len,
                seqno,
            },
        ) => {
            // Sanity checks.
            if auth_len != MD5_DIGEST_LENGTH {
                return Err(DecodeError::AuthError);
            }
            if auth.key_id != key_id as u32 {
                return Err(DecodeError::AuthError);
            }

            // The message digest trailer sits past the declared packet
            // length and is not counted in it.
            let trailer_end = pkt_len as usize + auth_len as usize;
            if trailer_end > data.len() {
                return Err(DecodeError::InvalidLength(pkt_len));
            }
            let auth_trailer = &data[pkt_len as usize..trailer_end];

            // Compute and check the message digest.
            let digest =
                auth::message_digest(&data[..pkt_len as usize], &auth.key);
            if *auth_trailer != digest {
                return Err(DecodeError::AuthError);
            }

            // Authentication succeeded.
            Ok(Some(seqno))
        }
        // Discard the packet if its authentication type doesn't match the
        // interface's configured authentication type.
        _ => Err(DecodeError::AuthTypeMismatch),
    }
}
