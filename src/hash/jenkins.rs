use super::{read_u32_le, StreamingHash};

const BLOCK: usize = 12;
const GOLDEN: u32 = 0xdead_beef;

/// Bob Jenkins' block hash (lookup3 mixing) in streaming form.
///
/// Input is mixed in 12-byte blocks through three 32-bit registers. The most
/// recent block is always held back in the buffer so that the final one can
/// be run through the stronger finalization mix, which is what keeps the
/// result independent of how the input was chunked.
#[derive(Clone, Debug)]
pub struct Jenkins {
    a: u32,
    b: u32,
    c: u32,
    buffer: [u8; BLOCK],
    buffered: usize,
    total_len: u64,
}

#[inline]
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

#[inline]
fn final_mix(mut a: u32, mut b: u32, mut c: u32) -> u32 {
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c.wrapping_sub(b.rotate_left(24))
}

impl Jenkins {
    #[inline]
    fn absorb(&mut self, block: &[u8]) {
        self.a = self.a.wrapping_add(read_u32_le(block));
        self.b = self.b.wrapping_add(read_u32_le(&block[4..]));
        self.c = self.c.wrapping_add(read_u32_le(&block[8..]));
        mix(&mut self.a, &mut self.b, &mut self.c);
    }
}

impl StreamingHash for Jenkins {
    fn with_seed(seed: u32) -> Self {
        let init = GOLDEN.wrapping_add(seed);
        Self {
            a: init,
            b: init,
            c: init,
            buffer: [0; BLOCK],
            buffered: 0,
            total_len: 0,
        }
    }

    fn update(&mut self, mut bytes: &[u8]) {
        self.total_len += bytes.len() as u64;

        while !bytes.is_empty() {
            if self.buffered == BLOCK {
                let block = self.buffer;
                self.absorb(&block);
                self.buffered = 0;
            }

            if self.buffered == 0 {
                // Strictly more than one block left: the current one cannot be
                // the last.
                while bytes.len() > BLOCK {
                    self.absorb(&bytes[..BLOCK]);
                    bytes = &bytes[BLOCK..];
                }
            }

            let take = (BLOCK - self.buffered).min(bytes.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&bytes[..take]);
            self.buffered += take;
            bytes = &bytes[take..];
        }
    }

    fn finish32(&self) -> u32 {
        if self.total_len == 0 {
            return self.c;
        }

        let mut last = [0u8; BLOCK];
        last[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);

        let a = self.a.wrapping_add(read_u32_le(&last));
        let b = self.b.wrapping_add(read_u32_le(&last[4..]));
        let c = self.c.wrapping_add(read_u32_le(&last[8..])) ^ (self.total_len as u32);
        final_mix(a, b, c)
    }
}

/// Jenkins' one-at-a-time hash.
///
/// Cheap and byte-oriented, which makes it a good fit for short string keys
/// that are filtered byte by byte before hashing.
#[derive(Clone, Debug)]
pub struct OneAtATime {
    hash: u32,
}

impl StreamingHash for OneAtATime {
    fn with_seed(seed: u32) -> Self {
        Self { hash: seed }
    }

    fn update(&mut self, bytes: &[u8]) {
        let mut hash = self.hash;
        for byte in bytes {
            hash = hash.wrapping_add(u32::from(*byte));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        self.hash = hash;
    }

    fn finish32(&self) -> u32 {
        let mut hash = self.hash;
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash.wrapping_add(hash << 15)
    }
}
