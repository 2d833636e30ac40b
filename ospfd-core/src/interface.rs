//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::collections::{InterfaceId, Lsdb, Neighbors};
use crate::debug::Debug;
use crate::instance::InstanceUpView;
use crate::interface::ism::State;
use crate::neighbor::NeighborNetId;
use crate::network::{NetTxPacketMsg, SendDestination};
use crate::packet::auth::{AuthMethod, MD5_DIGEST_LENGTH};
use crate::packet::lsa::{Lsa, LsaHdr, LsaKey};
use crate::tasks::{self, TimerKind};

#[derive(Debug)]
pub struct Interface {
    pub id: InterfaceId,
    pub name: String,
    pub system: InterfaceSys,
    pub config: InterfaceCfg,
    pub state: InterfaceState,
}

#[derive(Debug, Default)]
pub struct InterfaceSys {
    // Interface ifindex.
    pub ifindex: Option<u32>,
    // Interface MTU.
    pub mtu: Option<u16>,
    // Primary address.
    pub primary_addr: Option<Ipv4Network>,
}

#[derive(Debug)]
pub struct InterfaceCfg {
    pub if_type: InterfaceType,
    pub mtu_ignore: bool,
    pub transmit_delay: u16,
    pub retransmit_interval: u16,
    pub dead_interval: u16,
}

#[derive(Debug)]
pub struct InterfaceState {
    // ISM state, driven by the external interface state machine.
    pub ism_state: State,
    // Source address used when sending packets.
    pub src_addr: Option<std::net::Ipv4Addr>,
    // The network DR/BDR.
    pub dr: Option<NeighborNetId>,
    pub bdr: Option<NeighborNetId>,
    // List of neighbors attached to this interface.
    pub neighbors: Neighbors,
    // List of LSAs enqueued for transmission.
    pub ls_update_list: BTreeMap<LsaKey, Arc<Lsa>>,
    // List of pending delayed Acks.
    pub ls_ack_list: BTreeMap<LsaKey, LsaHdr>,
    // Statistics.
    pub event_count: u32,
    pub discontinuity_time: DateTime<Utc>,
    // LSDB of link-scope (type-9 opaque) LSAs.
    pub lsdb: Lsdb,
    // Authentication data.
    pub auth: Option<AuthMethod>,
    // Timers.
    pub tasks: InterfaceTasks,
}

#[derive(Debug, Default)]
pub struct InterfaceTasks {
    // LS Update transmission timer.
    pub ls_update_timer: Option<tasks::TimerToken>,
    // Delayed Ack timer.
    pub ls_delayed_ack: Option<tasks::TimerToken>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum InterfaceType {
    Broadcast,
    NonBroadcast,
    PointToMultipoint,
    PointToPoint,
}

// Interface state machine.
//
// The ISM itself (DR election included) is an external collaborator; only
// the state enum is needed here, to drive flooding and acknowledgment
// decisions.
pub mod ism {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Loopback,
        Waiting,
        PointToPoint,
        DrOther,
        Backup,
        Dr,
    }
}

// ===== impl Interface =====

impl Interface {
    const IPV4_HDR_SIZE: u16 = 20;

    pub(crate) fn new(id: InterfaceId, name: String) -> Interface {
        Debug::InterfaceCreate(&name).log();

        Interface {
            id,
            name,
            system: Default::default(),
            config: Default::default(),
            state: InterfaceState {
                ism_state: Default::default(),
                src_addr: None,
                dr: None,
                bdr: None,
                neighbors: Default::default(),
                ls_update_list: Default::default(),
                ls_ack_list: Default::default(),
                event_count: 0,
                discontinuity_time: Utc::now(),
                lsdb: Default::default(),
                auth: None,
                tasks: Default::default(),
            },
        }
    }

    pub fn is_broadcast_or_nbma(&self) -> bool {
        matches!(
            self.config.if_type,
            InterfaceType::Broadcast | InterfaceType::NonBroadcast
        )
    }

    // Returns whether this router is the Designated Router on the attached
    // network.
    pub fn is_dr(&self) -> bool {
        self.state.ism_state == ism::State::Dr
    }

    // Maximum packet payload available for OSPF, derived from the interface
    // MTU, reserving room for the message digest when cryptographic
    // authentication is enabled.
    pub(crate) fn max_packet_size(&self) -> u16 {
        let mut max = self.system.mtu.unwrap() - Self::IPV4_HDR_SIZE;

        if let Some(AuthMethod::Cryptographic(..)) = &self.state.auth {
            max -= MD5_DIGEST_LENGTH as u16;
        }

        max
    }

    pub(crate) fn enqueue_ls_update(
        &mut self,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
        lsa_key: LsaKey,
        lsa: Arc<Lsa>,
    ) {
        self.state.ls_update_list.insert(lsa_key, lsa);

        // Start LS Update timeout if necessary.
        if self.state.tasks.ls_update_timer.is_none() {
            let token = instance.tx.timers.schedule(
                tasks::LS_UPDATE_SEND_DELAY,
                TimerKind::LsUpdateSend {
                    area_id: area.id,
                    iface_id: self.id,
                },
            );
            self.state.tasks.ls_update_timer = Some(token);
        }
    }

    pub(crate) fn enqueue_delayed_ack(
        &mut self,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
        lsa_hdr: &LsaHdr,
    ) {
        self.state.ls_ack_list.insert(lsa_hdr.key(), *lsa_hdr);

        // Start delayed LS Ack timeout if necessary.
        if self.state.tasks.ls_delayed_ack.is_none() {
            let token = instance.tx.timers.schedule(
                tasks::DELAYED_ACK_TIMEOUT,
                TimerKind::DelayedAck {
                    area_id: area.id,
                    iface_id: self.id,
                },
            );
            self.state.tasks.ls_delayed_ack = Some(token);
        }
    }

    pub(crate) fn send_packet(
        &self,
        instance: &mut InstanceUpView<'_>,
        packet: crate::packet::Packet,
        dst: SendDestination,
    ) {
        Debug::PacketTx(&self.name, &packet).log();

        let msg = NetTxPacketMsg {
            packet,
            src: self.state.src_addr.unwrap(),
            dst,
        };
        instance.tx.net.push_back(msg);
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        Debug::InterfaceDelete(&self.name).log();
    }
}

// ===== impl InterfaceCfg =====

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            if_type: InterfaceType::Broadcast,
            mtu_ignore: false,
            transmit_delay: 1,
            retransmit_interval: 5,
            dead_interval: 40,
        }
    }
}
