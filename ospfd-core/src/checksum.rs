//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use internet_checksum::Checksum;

// Chunk size that keeps the Fletcher accumulators from overflowing between
// modular reductions (RFC 1008 section 7).
const MODX: usize = 4102;

// Standard 16-bit ones-complement checksum (RFC 1071). An odd trailing byte
// is treated as the high-order byte of a zero-padded word.
pub fn ip_checksum(data: &[u8]) -> u16 {
    let mut cksum = Checksum::new();
    cksum.add_bytes(data);
    u16::from_be_bytes(cksum.checksum())
}

// Runs the Fletcher accumulators over the buffer, reducing mod 255 once per
// chunk of at most MODX bytes.
fn fletcher_accumulate(data: &[u8]) -> (i32, i32) {
    let mut c0: i32 = 0;
    let mut c1: i32 = 0;

    for chunk in data.chunks(MODX) {
        for byte in chunk {
            c0 += *byte as i32;
            c1 += c0;
        }
        c0 %= 255;
        c1 %= 255;
    }

    (c0, c1)
}

// Computes the two Fletcher check bytes and writes them at
// `checksum_offset`, such that running the accumulators over the resulting
// buffer yields zero. Returns the check bytes as a big-endian word.
//
// The derivation follows RFC 1008 / RFC 905 annex B:
//   x = ((len - offset - 1) * c0 - c1) mod 255, normalized to (0, 255]
//   y = 510 - c0 - x, normalized to [1, 255]
pub fn fletcher_checksum(data: &mut [u8], checksum_offset: usize) -> u16 {
    // The check bytes must not influence the accumulators.
    data[checksum_offset] = 0;
    data[checksum_offset + 1] = 0;

    let (c0, c1) = fletcher_accumulate(data);

    let mul = (data.len() - checksum_offset - 1) as i32;
    let mut x = (mul * c0 - c1) % 255;
    if x <= 0 {
        x += 255;
    }
    let mut y = 510 - c0 - x;
    if y > 255 {
        y -= 255;
    }

    data[checksum_offset] = x as u8;
    data[checksum_offset + 1] = y as u8;
    ((x as u16) << 8) | y as u16
}

// Validation pass: returns the raw `(c1 << 8) | c0` word, which is zero for
// a buffer carrying correct check bytes.
pub fn fletcher_checksum_validate(data: &[u8]) -> u16 {
    let (c0, c1) = fletcher_accumulate(data);
    ((c1 as u16) << 8) | c0 as u16
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_checksum_odd_length() {
        // Odd trailing byte is the high byte of a zero-padded word.
        let even = ip_checksum(&[0x12, 0x34, 0xab, 0x00]);
        let odd = ip_checksum(&[0x12, 0x34, 0xab]);
        assert_eq!(even, odd);
    }

    #[test]
    fn ip_checksum_verifies_to_zero() {
        let mut data = vec![0x45, 0x00, 0x00, 0x1c, 0xc2, 0x9a, 0x00, 0x00];
        let cksum = ip_checksum(&data);
        data[6..8].copy_from_slice(&cksum.to_be_bytes());
        assert_eq!(ip_checksum(&data), 0);
    }

    #[test]
    fn fletcher_known_check_bytes() {
        // Hand-derived reference: bytes 1..=4 followed by the check-byte
        // pair at offset 4 give c0=10, c1=40, x=225, y=20.
        let mut data = [1, 2, 3, 4, 0xff, 0xff];
        let cksum = fletcher_checksum(&mut data, 4);
        assert_eq!(data[4], 225);
        assert_eq!(data[5], 20);
        assert_eq!(cksum, (225 << 8) | 20);
        assert_eq!(fletcher_checksum_validate(&data), 0);
    }

    #[test]
    fn fletcher_round_trip() {
        for len in [3usize, 20, 64, 255, 256, 1500] {
            let mut data: Vec<u8> =
                (0..len).map(|i| (i * 31 % 251) as u8).collect();
            for offset in [0, 1, len / 2, len - 2] {
                fletcher_checksum(&mut data, offset);
                assert_eq!(
                    fletcher_checksum_validate(&data),
                    0,
                    "len={} offset={}",
                    len,
                    offset
                );
            }
        }
    }

    #[test]
    fn fletcher_chunking_boundary() {
        // For a buffer of N bytes all equal to one, the accumulators have the
        // closed forms c0 = N mod 255 and c1 = N*(N+1)/2 mod 255. N = 5000
        // crosses the MODX reduction boundary.
        let data = vec![1u8; 5000];
        let c0 = 5000u32 % 255;
        let c1 = (5000u64 * 5001 / 2 % 255) as u32;
        assert_eq!(
            fletcher_checksum_validate(&data),
            ((c1 << 8) | c0) as u16
        );
        assert_eq!(fletcher_checksum_validate(&data), 0x699b);

        // The insertion pass must also survive the boundary.
        let mut data = vec![1u8; 5000];
        fletcher_checksum(&mut data, 2500);
        assert_eq!(fletcher_checksum_validate(&data), 0);
    }

    #[test]
    fn fletcher_normalization_edges() {
        // All-zero buffers exercise the x <= 0 normalization branch.
        let mut data = vec![0u8; 32];
        fletcher_checksum(&mut data, 16);
        assert_eq!(fletcher_checksum_validate(&data), 0);
        assert_ne!(data[16], 0);
        assert_ne!(data[17], 0);
    }
}
