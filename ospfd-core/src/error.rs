//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use tracing::{warn, warn_span};

use crate::collections::{AreaId, InterfaceId, LsaEntryId, NeighborId};
use crate::neighbor::nsm;
use crate::packet::error::DecodeError;
use crate::packet::lsa::{LsaKey, LsaType};

// OSPF errors.
//
// Nothing in this core is permitted to terminate the process: every
// malformed-input path is a recoverable, logged rejection, and protocol
// violations are signaled to the external neighbor state machine.
#[derive(Debug)]
pub enum Error {
    // Inter-task communication
    AreaIdNotFound(AreaId),
    InterfaceIdNotFound(InterfaceId),
    NeighborIdNotFound(NeighborId),
    LsaEntryIdNotFound(LsaEntryId),
    // Packet input
    InterfaceDown(String),
    PacketDecodeError(DecodeError),
    PacketAuthError(Ipv4Addr, DecodeError),
    UnknownNeighbor(Ipv4Addr, Ipv4Addr),
    MtuMismatch(Ipv4Addr, u16),
    DbDescReject(Ipv4Addr, nsm::State),
    LsaUnknownType(LsaType),
    // Packet output
    OversizedLsa(LsaKey, u16),
    // Other
    NsmUnexpectedEvent(Ipv4Addr, nsm::State, nsm::Event),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::AreaIdNotFound(area_id) => {
                warn!(?area_id, "{}", self);
            }
            Error::InterfaceIdNotFound(iface_id) => {
                warn!(?iface_id, "{}", self);
            }
            Error::NeighborIdNotFound(nbr_id) => {
                warn!(?nbr_id, "{}", self);
            }
            Error::LsaEntryIdNotFound(lse_id) => {
                warn!(?lse_id, "{}", self);
            }
            Error::InterfaceDown(ifname) => {
                warn!(%ifname, "{}", self);
            }
            Error::PacketDecodeError(error) => {
                warn!(%error, "{}", self);
            }
            Error::PacketAuthError(source, error) => {
                warn!(%source, %error, "{}", self);
            }
            Error::UnknownNeighbor(source, router_id) => {
                warn!(%source, %router_id, "{}", self);
            }
            Error::MtuMismatch(source, mtu) => {
                warn!(%source, %mtu, "{}", self);
            }
            Error::DbDescReject(router_id, state) => {
                warn_span!("neighbor", %router_id).in_scope(|| {
                    warn!(?state, "{}", self);
                })
            }
            Error::LsaUnknownType(lsa_type) => {
                warn!(%lsa_type, "{}", self);
            }
            Error::OversizedLsa(lsa_key, length) => {
                warn!(?lsa_key, %length, "{}", self);
            }
            Error::NsmUnexpectedEvent(router_id, state, event) => {
                warn_span!("neighbor", %router_id).in_scope(|| {
                    warn_span!("fsm").in_scope(|| {
                        warn!(?state, ?event, "{}", self);
                    })
                })
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AreaIdNotFound(..) => {
                write!(f, "area ID not found")
            }
            Error::InterfaceIdNotFound(..) => {
                write!(f, "interface ID not found")
            }
            Error::NeighborIdNotFound(..) => {
                write!(f, "neighbor ID not found")
            }
            Error::LsaEntryIdNotFound(..) => {
                write!(f, "LSA entry ID not found")
            }
            Error::InterfaceDown(..) => {
                write!(f, "packet received on inactive interface")
            }
            Error::PacketDecodeError(..) => {
                write!(f, "failed to decode packet")
            }
            Error::PacketAuthError(..) => {
                write!(f, "packet authentication failed")
            }
            Error::UnknownNeighbor(..) => {
                write!(f, "unknown neighbor")
            }
            Error::MtuMismatch(..) => {
                write!(f, "MTU mismatch")
            }
            Error::DbDescReject(..) => {
                write!(f, "database description packet rejected")
            }
            Error::LsaUnknownType(..) => {
                write!(f, "discarding LSA due to unknown type")
            }
            Error::OversizedLsa(..) => {
                write!(f, "LSA too large to fit in a lone packet")
            }
            Error::NsmUnexpectedEvent(..) => {
                write!(f, "unexpected event")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PacketDecodeError(error)
            | Error::PacketAuthError(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Error {
        Error::PacketDecodeError(error)
    }
}
