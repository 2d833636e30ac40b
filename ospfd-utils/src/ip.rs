//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

// Extension methods for Ipv4Addr.
pub trait Ipv4AddrExt {
    const LENGTH: usize;

    // Returns true if this is an usable address.
    fn is_usable(&self) -> bool;

    // Converts this IPv4 address into a host prefix network.
    fn to_host_prefix(&self) -> Ipv4Network;
}

// ===== impl Ipv4Addr =====

impl Ipv4AddrExt for Ipv4Addr {
    const LENGTH: usize = 4;

    fn is_usable(&self) -> bool {
        !(self.is_loopback() || self.is_multicast() || self.is_unspecified())
    }

    fn to_host_prefix(&self) -> Ipv4Network {
        Ipv4Network::new(*self, 32).unwrap()
    }
}
