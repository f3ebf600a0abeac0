use super::{read_u32_le, StreamingHash};

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// MurmurHash3, x86 32-bit variant, in streaming form.
///
/// Input is mixed in 4-byte blocks; up to three trailing bytes are buffered
/// until the next update or absorbed as the tail at finalization.
#[derive(Clone, Debug)]
pub struct Murmur3 {
    h1: u32,
    tail: [u8; 4],
    tail_len: usize,
    total_len: u64,
}

#[inline]
fn mix_k1(mut k1: u32) -> u32 {
    k1 = k1.wrapping_mul(C1);
    k1 = k1.rotate_left(15);
    k1.wrapping_mul(C2)
}

#[inline]
fn mix_block(mut h1: u32, k1: u32) -> u32 {
    h1 ^= mix_k1(k1);
    h1 = h1.rotate_left(13);
    h1.wrapping_mul(5).wrapping_add(0xe654_6b64)
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

impl StreamingHash for Murmur3 {
    fn with_seed(seed: u32) -> Self {
        Self {
            h1: seed,
            tail: [0; 4],
            tail_len: 0,
            total_len: 0,
        }
    }

    fn update(&mut self, mut bytes: &[u8]) {
        self.total_len += bytes.len() as u64;

        if self.tail_len > 0 {
            let take = (4 - self.tail_len).min(bytes.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&bytes[..take]);
            self.tail_len += take;
            bytes = &bytes[take..];

            if self.tail_len < 4 {
                return;
            }
            self.h1 = mix_block(self.h1, read_u32_le(&self.tail));
            self.tail_len = 0;
        }

        let mut blocks = bytes.chunks_exact(4);
        for block in &mut blocks {
            self.h1 = mix_block(self.h1, read_u32_le(block));
        }

        let rest = blocks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }

    fn finish32(&self) -> u32 {
        let mut h1 = self.h1;

        if self.tail_len > 0 {
            let mut k1 = 0u32;
            for (i, byte) in self.tail[..self.tail_len].iter().enumerate() {
                k1 ^= u32::from(*byte) << (8 * i);
            }
            h1 ^= mix_k1(k1);
        }

        // The reference algorithm only mixes in the low 32 bits of the length.
        h1 ^= self.total_len as u32;
        fmix32(h1)
    }
}

#[cfg(test)]
mod tests {
    use super::Murmur3;
    use crate::hash::StreamingHash;

    #[test]
    fn reference_vectors() {
        assert_eq!(Murmur3::hash_bytes(0, b""), 0);
        assert_eq!(Murmur3::hash_bytes(1, b""), 0x514e_28b7);
        assert_eq!(Murmur3::hash_bytes(0, b"hello"), 0x248b_fa47);
        assert_eq!(
            Murmur3::hash_bytes(0, b"The quick brown fox jumps over the lazy dog"),
            0x2e4f_f723
        );
    }

    #[test]
    fn tail_is_carried_across_updates() {
        let mut state = Murmur3::with_seed(0);
        state.update(b"he");
        state.update(b"l");
        state.update(b"lo");
        assert_eq!(state.finish32(), 0x248b_fa47);
    }
}
