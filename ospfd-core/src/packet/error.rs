//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// OSPFv2 decode errors.
//
// Malformed input is always rejected at this layer; it is never repaired.
#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    InvalidVersion(u8),
    UnknownPacketType(u8),
    InvalidLength(u16),
    InvalidChecksum,
    InvalidRouterId(Ipv4Addr),
    UnsupportedAuthType(u16),
    AuthTypeMismatch,
    AuthError,
    InvalidLsaLength(u16),
    InvalidLsaCount { declared: u32, found: u32 },
    InvalidRouterLinkCount { declared: u16, found: u16 },
    UnknownRouterLinkType(u8),
}

// OSPF LSA validation errors.
//
// Errors that prevent the LSA from being parsed correctly (e.g. invalid LSA
// length) cause the entire LS Update packet to be dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaValidationError {
    InvalidChecksum,
    InvalidLsaAge,
    InvalidLsaSeqNo,
    RouterLsaIdMismatch,
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidVersion(version) => {
                write!(f, "invalid packet version: {}", version)
            }
            DecodeError::UnknownPacketType(pkt_type) => {
                write!(f, "unknown packet type: {}", pkt_type)
            }
            DecodeError::InvalidLength(pkt_len) => {
                write!(f, "invalid packet length: {}", pkt_len)
            }
            DecodeError::InvalidChecksum => {
                write!(f, "invalid checksum")
            }
            DecodeError::InvalidRouterId(router_id) => {
                write!(f, "invalid router-id: {}", router_id)
            }
            DecodeError::UnsupportedAuthType(au_type) => {
                write!(f, "unsupported authentication type: {}", au_type)
            }
            DecodeError::AuthTypeMismatch => {
                write!(f, "authentication type mismatch")
            }
            DecodeError::AuthError => {
                write!(f, "authentication failed")
            }
            DecodeError::InvalidLsaLength(lsa_len) => {
                write!(f, "invalid LSA length: {}", lsa_len)
            }
            DecodeError::InvalidLsaCount { declared, found } => {
                write!(
                    f,
                    "LSA count mismatch (declared {}, found {})",
                    declared, found
                )
            }
            DecodeError::InvalidRouterLinkCount { declared, found } => {
                write!(
                    f,
                    "router link count mismatch (declared {}, found {})",
                    declared, found
                )
            }
            DecodeError::UnknownRouterLinkType(link_type) => {
                write!(f, "unknown link type: {}", link_type)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

// ===== impl LsaValidationError =====

impl std::fmt::Display for LsaValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LsaValidationError::InvalidChecksum => {
                write!(f, "invalid LSA checksum")
            }
            LsaValidationError::InvalidLsaAge => {
                write!(f, "invalid LSA age")
            }
            LsaValidationError::InvalidLsaSeqNo => {
                write!(f, "invalid LSA sequence number")
            }
            LsaValidationError::RouterLsaIdMismatch => {
                write!(
                    f,
                    "Router-LSA's advertising router and LSA-ID are not equal"
                )
            }
        }
    }
}

impl std::error::Error for LsaValidationError {}
