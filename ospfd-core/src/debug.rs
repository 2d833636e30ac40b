//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::neighbor::nsm;
use crate::packet::Packet;
use crate::packet::error::LsaValidationError;
use crate::packet::lsa::LsaHdr;

// OSPF debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instances
    InstanceCreate,
    // Interfaces
    InterfaceCreate(&'a str),
    InterfaceDelete(&'a str),
    // Neighbors
    NeighborCreate(Ipv4Addr),
    NeighborDelete(Ipv4Addr),
    NsmEvent(Ipv4Addr, &'a nsm::State, &'a nsm::Event),
    NsmTransition(Ipv4Addr, &'a nsm::State, &'a nsm::State),
    // Network
    PacketRx(&'a str, &'a Ipv4Addr, &'a Packet),
    PacketTx(&'a str, &'a Packet),
    PacketRxIgnore(Ipv4Addr, &'a nsm::State),
    // Flooding
    QuestionableAck(Ipv4Addr, &'a LsaHdr),
    LsaDiscard(Ipv4Addr, &'a LsaHdr, &'a LsaValidationError),
    LsaMinArrivalDiscard(Ipv4Addr, &'a LsaHdr),
    LsaSelfOriginated(Ipv4Addr, &'a LsaHdr),
    // LSDB maintenance
    LsaInstall(&'a LsaHdr),
    LsaOriginate(&'a LsaHdr),
    LsaOriginateMinInterval(&'a LsaHdr),
    LsaFlush(&'a LsaHdr, LsaFlushReason),
    LsaRefresh(&'a LsaHdr),
    LsaMaxAgeRemove(&'a LsaHdr),
}

// Reason why a SeqNoMismatch event was generated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum SeqNoMismatchReason {
    InconsistentFlags,
    InconsistentOptions,
    InconsistentSeqNo,
    UnexpectedDbDesc,
    InvalidLsaType,
}

// Reason why an LSA is being flushed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaFlushReason {
    Expiry,
    PrematureAging,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate => {
                debug!("{}", self);
            }
            Debug::InterfaceCreate(name) | Debug::InterfaceDelete(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::NeighborCreate(router_id)
            | Debug::NeighborDelete(router_id) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::NsmEvent(router_id, state, event) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?state, ?event, "{}", self);
                    });
                });
            }
            Debug::NsmTransition(router_id, old_state, new_state) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?old_state, ?new_state, "{}", self);
                    });
                });
            }
            Debug::PacketRx(ifname, src, packet) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        debug!(%ifname, %src, ?packet, "{}", self);
                    });
                });
            }
            Debug::PacketTx(ifname, packet) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        debug!(%ifname, ?packet, "{}", self);
                    });
                });
            }
            Debug::PacketRxIgnore(router_id, state) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?state, "{}", self);
                });
            }
            Debug::QuestionableAck(router_id, lsa_hdr)
            | Debug::LsaMinArrivalDiscard(router_id, lsa_hdr)
            | Debug::LsaSelfOriginated(router_id, lsa_hdr) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?lsa_hdr, "{}", self);
                });
            }
            Debug::LsaDiscard(router_id, lsa_hdr, error) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?lsa_hdr, %error, "{}", self);
                });
            }
            Debug::LsaInstall(lsa_hdr)
            | Debug::LsaOriginate(lsa_hdr)
            | Debug::LsaOriginateMinInterval(lsa_hdr)
            | Debug::LsaRefresh(lsa_hdr)
            | Debug::LsaMaxAgeRemove(lsa_hdr) => {
                debug!(?lsa_hdr, "{}", self);
            }
            Debug::LsaFlush(lsa_hdr, reason) => {
                debug!(?lsa_hdr, ?reason, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::InterfaceDelete(..) => {
                write!(f, "interface deleted")
            }
            Debug::NeighborCreate(..) => {
                write!(f, "neighbor created")
            }
            Debug::NeighborDelete(..) => {
                write!(f, "neighbor deleted")
            }
            Debug::NsmEvent(..) => {
                write!(f, "neighbor FSM event")
            }
            Debug::NsmTransition(..) => {
                write!(f, "neighbor FSM state transition")
            }
            Debug::PacketRx(..) => {
                write!(f, "packet received")
            }
            Debug::PacketTx(..) => {
                write!(f, "packet sent")
            }
            Debug::PacketRxIgnore(..) => {
                write!(f, "packet ignored")
            }
            Debug::QuestionableAck(..) => {
                write!(f, "questionable acknowledgment")
            }
            Debug::LsaDiscard(..) => {
                write!(f, "discarding LSA")
            }
            Debug::LsaMinArrivalDiscard(..) => {
                write!(f, "discarding LSA received within MinLSArrival")
            }
            Debug::LsaSelfOriginated(..) => {
                write!(f, "received self-originated LSA")
            }
            Debug::LsaInstall(..) => {
                write!(f, "installing LSA")
            }
            Debug::LsaOriginate(..) => {
                write!(f, "originating LSA")
            }
            Debug::LsaOriginateMinInterval(..) => {
                write!(f, "postponing LSA origination due to MinLSInterval")
            }
            Debug::LsaFlush(..) => {
                write!(f, "flushing LSA")
            }
            Debug::LsaRefresh(..) => {
                write!(f, "refreshing LSA")
            }
            Debug::LsaMaxAgeRemove(..) => {
                write!(f, "removing MaxAge LSA")
            }
        }
    }
}
