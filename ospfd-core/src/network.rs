//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use derive_new::new;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::packet::Packet;

// Useful type definition(s).
pub type PacketDestAddrs = SmallVec<[Ipv4Addr; 4]>;

// OSPF multicast destinations.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MulticastAddr {
    AllSpfRtrs,
    AllDrRtrs,
}

// Destination of an outgoing packet, handed to the socket layer together
// with the packet itself.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct SendDestination {
    pub ifindex: u32,
    pub addrs: PacketDestAddrs,
}

// Packet enqueued for network transmission. The socket layer is an external
// collaborator draining these from the instance output queue.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct NetTxPacketMsg {
    pub packet: Packet,
    pub src: Ipv4Addr,
    pub dst: SendDestination,
}

// ===== impl MulticastAddr =====

impl MulticastAddr {
    pub fn addr(&self) -> Ipv4Addr {
        match self {
            MulticastAddr::AllSpfRtrs => Ipv4Addr::new(224, 0, 0, 5),
            MulticastAddr::AllDrRtrs => Ipv4Addr::new(224, 0, 0, 6),
        }
    }
}
