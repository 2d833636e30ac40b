//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

thread_local!(
    pub static TLS_BUF: RefCell<BytesMut> =
        RefCell::new(BytesMut::with_capacity(4096))
);

// Extension methods for Bytes.
pub trait BytesExt {
    /// Gets an unsigned 24 bit integer from `self` in the big-endian byte
    /// order.
    ///
    /// The current position is advanced by 3.
    fn get_u24(&mut self) -> u32;

    /// Gets an IPv4 addr from `self` in big-endian byte order.
    ///
    /// The current position is advanced by 4.
    fn get_ipv4(&mut self) -> Ipv4Addr;

    /// Gets an optional IPv4 addr from `self` in big-endian byte order.
    ///
    /// The current position is advanced by 4.
    fn get_opt_ipv4(&mut self) -> Option<Ipv4Addr>;
}

// Extension methods for BytesMut.
pub trait BytesMutExt {
    /// Writes an unsigned 24 bit integer to `self` in big-endian byte order.
    ///
    /// The current position is advanced by 3.
    ///
    /// # Panics
    ///
    /// This function panics if there is not enough remaining capacity in
    /// `self`.
    fn put_u24(&mut self, n: u32);

    /// Writes an IPv4 addr to `self` in big-endian byte order.
    ///
    /// The current position is advanced by 4.
    ///
    /// # Panics
    ///
    /// This function panics if there is not enough remaining capacity in
    /// `self`.
    fn put_ipv4(&mut self, addr: &Ipv4Addr);
}

// ===== impl Bytes =====

impl BytesExt for Bytes {
    fn get_u24(&mut self) -> u32 {
        let mut n = [0; 4];
        self.copy_to_slice(&mut n[1..=3]);
        u32::from_be_bytes(n)
    }

    fn get_ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.get_u32())
    }

    fn get_opt_ipv4(&mut self) -> Option<Ipv4Addr> {
        let addr = Ipv4Addr::from(self.get_u32());
        if addr.is_unspecified() { None } else { Some(addr) }
    }
}

// ===== impl BytesMut =====

impl BytesMutExt for BytesMut {
    fn put_u24(&mut self, n: u32) {
        let n = n.to_be_bytes();
        self.put_slice(&n[1..=3]);
    }

    fn put_ipv4(&mut self, addr: &Ipv4Addr) {
        self.put_slice(&addr.octets());
    }
}
