//! Portable SHA-1
//!
//! Software implementation used when the CPU has no SHA instructions.
//! Produces output bit-identical to the accelerated engine.

use super::types::{Sha1Digest, BLOCK_LEN, DIGEST_LEN};
use super::{EngineKind, HashEngine, HashState};

const INITIAL_STATE: [u32; 5] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476, 0xc3d2_e1f0];

const ROUND_CONSTANTS: [u32; 4] = [0x5a82_7999, 0x6ed9_eba1, 0x8f1b_bcdc, 0xca62_c1d6];

/// Portable engine
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableEngine;

impl HashEngine for PortableEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Portable
    }

    fn init(&self) -> Box<dyn HashState> {
        Box::new(PortableState::new())
    }
}

/// Incremental context.
///
/// The message length is tracked in bits as two 32-bit halves so the carry
/// into the high word is explicit.
#[derive(Clone)]
pub struct PortableState {
    h: [u32; 5],
    block: [u8; BLOCK_LEN],
    block_bytes: usize,
    length_low: u32,
    length_high: u32,
}

impl PortableState {
    pub fn new() -> Self {
        Self {
            h: INITIAL_STATE,
            block: [0u8; BLOCK_LEN],
            block_bytes: 0,
            length_low: 0,
            length_high: 0,
        }
    }

    fn add_length(&mut self, len: usize) {
        let len = len as u64;
        // Bits contributed to the low word wrap; everything above is carried.
        let bits_low = (len << 3) as u32;
        let (low, carry) = self.length_low.overflowing_add(bits_low);
        self.length_low = low;
        self.length_high = self
            .length_high
            .wrapping_add((len >> 29) as u32)
            .wrapping_add(carry as u32);
    }

    fn compress(h: &mut [u32; 5], block: &[u8; BLOCK_LEN]) {
        let mut w = [0u32; 80];
        for (i, word) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = *h;

        for (i, wi) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | (!b & d), ROUND_CONSTANTS[0]),
                20..=39 => (b ^ c ^ d, ROUND_CONSTANTS[1]),
                40..=59 => ((b & c) | (b & d) | (c & d), ROUND_CONSTANTS[2]),
                _ => (b ^ c ^ d, ROUND_CONSTANTS[3]),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(*wi);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        h[0] = h[0].wrapping_add(a);
        h[1] = h[1].wrapping_add(b);
        h[2] = h[2].wrapping_add(c);
        h[3] = h[3].wrapping_add(d);
        h[4] = h[4].wrapping_add(e);
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.add_length(data.len());

        while !data.is_empty() {
            let take = (BLOCK_LEN - self.block_bytes).min(data.len());
            self.block[self.block_bytes..self.block_bytes + take].copy_from_slice(&data[..take]);
            self.block_bytes += take;
            data = &data[take..];

            if self.block_bytes == BLOCK_LEN {
                Self::compress(&mut self.h, &self.block);
                self.block_bytes = 0;
            }
        }
    }

    pub fn finalize(mut self) -> Sha1Digest {
        self.block[self.block_bytes] = 0x80;
        self.block_bytes += 1;

        // Marker landed past the length field: pad out and spend one more block.
        if self.block_bytes > BLOCK_LEN - 8 {
            self.block[self.block_bytes..].fill(0);
            Self::compress(&mut self.h, &self.block);
            self.block_bytes = 0;
        }

        self.block[self.block_bytes..BLOCK_LEN - 8].fill(0);
        self.block[56..60].copy_from_slice(&self.length_high.to_be_bytes());
        self.block[60..64].copy_from_slice(&self.length_low.to_be_bytes());
        Self::compress(&mut self.h, &self.block);

        let mut out = [0u8; DIGEST_LEN];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.h.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        Sha1Digest::from_bytes(out)
    }
}

impl Default for PortableState {
    fn default() -> Self {
        Self::new()
    }
}

impl HashState for PortableState {
    fn update(&mut self, chunk: &[u8]) {
        PortableState::update(self, chunk);
    }

    fn finalize(self: Box<Self>) -> Sha1Digest {
        PortableState::finalize(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let digest = PortableEngine.digest(b"");
        assert_eq!(digest.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_abc() {
        let digest = PortableEngine.digest(b"abc");
        assert_eq!(digest.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_two_block_message() {
        let digest = PortableEngine.digest(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq");
        assert_eq!(digest.to_hex(), "84983e441c3bd26ebaae4aa1f95129e5e54670f1");
    }

    #[test]
    fn test_million_a() {
        let mut state = PortableState::new();
        let chunk = [b'a'; 1000];
        for _ in 0..1000 {
            state.update(&chunk);
        }
        assert_eq!(state.finalize().to_hex(), "34aa973cd4c4daa4f61eeb2bdbad27316534016f");
    }

    #[test]
    fn test_length_carry_into_high_word() {
        let mut state = PortableState::new();
        state.length_low = u32::MAX - 7;
        state.add_length(1);
        assert_eq!(state.length_low, 0);
        assert_eq!(state.length_high, 1);
    }
}
