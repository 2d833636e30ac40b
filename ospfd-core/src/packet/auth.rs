//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use derive_new::new;
use serde::{Deserialize, Serialize};

// Length of the keyed-MD5 message digest appended after the packet.
pub const MD5_DIGEST_LENGTH: u8 = 16;

// Interface authentication configuration.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum AuthMethod {
    // 64-bit clear password carried in the packet header.
    Simple([u8; 8]),
    // Keyed-MD5 digest trailer (RFC 2328, appendix D.3).
    Cryptographic(AuthCtx),
}

#[derive(Clone, Debug, new)]
#[derive(Deserialize, Serialize)]
pub struct AuthCtx {
    // Authentication key.
    pub key: String,
    // Authentication key ID.
    pub key_id: u32,
    // Non-decreasing sequence number (only used for encoding packets).
    pub seqno: Arc<AtomicU32>,
}

// ===== global functions =====

// Computes the keyed-MD5 digest of the packet: MD5 over the packet bytes
// followed by the key padded to 16 bytes.
pub(crate) fn message_digest(data: &[u8], auth_key: &str) -> [u8; 16] {
    use md5::{Digest, Md5};

    // The authentication key needs to be 16-bytes long.
    let mut auth_key = auth_key.as_bytes().to_vec();
    auth_key.resize(16, 0);

    let mut ctx = Md5::new();
    ctx.update(data);
    ctx.update(&auth_key);
    ctx.finalize().into()
}

// ===== impl AuthMethod =====

impl AuthMethod {
    // Builds a simple-password context from a configured password,
    // truncating or zero-padding to the 64-bit authentication field.
    pub fn simple_from_str(password: &str) -> AuthMethod {
        let mut data = [0; 8];
        let len = password.len().min(8);
        data[..len].copy_from_slice(&password.as_bytes()[..len]);
        AuthMethod::Simple(data)
    }
}
