//! Streaming 32-bit hash functions.
//!
//! Every algorithm in this module implements the [`StreamingHash`] contract:
//! a state is created from a seed, fed any number of byte slices with
//! [`update`][StreamingHash::update], and finalized into a 32-bit value. Feeding
//! the same bytes in different chunkings always yields the same hash, so
//! callers can hash keys incrementally (for example, after passing every byte
//! through a case-folding filter).
//!
//! The hashes are deterministic and do not depend on the endianness of the
//! host. They are not keyed against HashDoS attacks; pick a random seed if the
//! keys come from an untrusted source.

pub(crate) mod jenkins;
pub(crate) mod murmur3;
pub(crate) mod xxhash32;

pub use jenkins::{Jenkins, OneAtATime};
pub use murmur3::Murmur3;
pub use xxhash32::XxHash32;

use std::{
    fmt,
    hash::{BuildHasher, Hasher},
    marker::PhantomData,
};

/// The init/update/finalize contract shared by all hash strategies.
pub trait StreamingHash: Clone {
    /// Creates a fresh hashing state for the given seed.
    fn with_seed(seed: u32) -> Self;

    /// Absorbs `bytes` into the state. May be called any number of times.
    fn update(&mut self, bytes: &[u8]);

    /// Returns the hash of all bytes absorbed so far.
    ///
    /// The state is not consumed, so more bytes can still be appended
    /// afterwards.
    fn finish32(&self) -> u32;

    /// Hashes `bytes` in one call.
    fn hash_bytes(seed: u32, bytes: &[u8]) -> u32 {
        let mut state = Self::with_seed(seed);
        state.update(bytes);
        state.finish32()
    }
}

/// Adapts a [`StreamingHash`] to [`std::hash::Hasher`].
///
/// Integers are written in little-endian byte order regardless of the host,
/// so a key hashes to the same value on every platform.
#[derive(Clone)]
pub struct StreamHasher<H> {
    state: H,
}

impl<H: StreamingHash> StreamHasher<H> {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            state: H::with_seed(seed),
        }
    }

    pub fn finish32(&self) -> u32 {
        self.state.finish32()
    }
}

impl<H: StreamingHash> Hasher for StreamHasher<H> {
    fn finish(&self) -> u64 {
        u64::from(self.state.finish32())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
    }

    fn write_u8(&mut self, i: u8) {
        self.state.update(&[i]);
    }

    fn write_u16(&mut self, i: u16) {
        self.state.update(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.state.update(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.state.update(&i.to_le_bytes());
    }

    fn write_u128(&mut self, i: u128) {
        self.state.update(&i.to_le_bytes());
    }

    // `usize` is widened so that 32-bit and 64-bit hosts agree.
    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    fn write_i8(&mut self, i: i8) {
        self.write_u8(i as u8);
    }

    fn write_i16(&mut self, i: i16) {
        self.write_u16(i as u16);
    }

    fn write_i32(&mut self, i: i32) {
        self.write_u32(i as u32);
    }

    fn write_i64(&mut self, i: i64) {
        self.write_u64(i as u64);
    }

    fn write_i128(&mut self, i: i128) {
        self.write_u128(i as u128);
    }

    fn write_isize(&mut self, i: isize) {
        self.write_u64(i as u64);
    }
}

/// A [`BuildHasher`] producing seeded [`StreamHasher`]s.
///
/// This makes every streaming hash usable with `std::collections::HashMap`
/// as well as with the tables of this crate.
pub struct BuildStreamHasher<H> {
    seed: u32,
    _hash: PhantomData<fn() -> H>,
}

impl<H> BuildStreamHasher<H> {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            _hash: PhantomData,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl<H> Default for BuildStreamHasher<H> {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl<H> Clone for BuildStreamHasher<H> {
    fn clone(&self) -> Self {
        Self::with_seed(self.seed)
    }
}

impl<H> fmt::Debug for BuildStreamHasher<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildStreamHasher")
            .field("seed", &self.seed)
            .finish()
    }
}

impl<H: StreamingHash> BuildHasher for BuildStreamHasher<H> {
    type Hasher = StreamHasher<H>;

    fn build_hasher(&self) -> Self::Hasher {
        StreamHasher::with_seed(self.seed)
    }
}

// Reads a little-endian u32 from the first four bytes of `bytes`.
#[inline]
pub(crate) fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::{BuildStreamHasher, Jenkins, Murmur3, OneAtATime, StreamingHash, XxHash32};

    use std::{
        collections::HashMap,
        hash::{BuildHasher, Hash, Hasher},
    };

    const TEXT: &[u8] = b"The quick brown fox jumps over the lazy dog, twice over.";

    fn chunked<H: StreamingHash>(seed: u32, chunk: usize) -> u32 {
        let mut state = H::with_seed(seed);
        for part in TEXT.chunks(chunk) {
            state.update(part);
        }
        state.finish32()
    }

    fn assert_streaming_is_stable<H: StreamingHash>() {
        let whole = H::hash_bytes(7, TEXT);
        for chunk in 1..=TEXT.len() {
            assert_eq!(chunked::<H>(7, chunk), whole, "chunk size {chunk}");
        }
        // Empty updates are no-ops.
        let mut state = H::with_seed(7);
        state.update(&[]);
        state.update(TEXT);
        state.update(&[]);
        assert_eq!(state.finish32(), whole);
    }

    #[test]
    fn chunking_does_not_change_the_hash() {
        assert_streaming_is_stable::<Murmur3>();
        assert_streaming_is_stable::<Jenkins>();
        assert_streaming_is_stable::<OneAtATime>();
        assert_streaming_is_stable::<XxHash32>();
    }

    #[test]
    fn seeds_change_the_hash() {
        assert_ne!(Murmur3::hash_bytes(0, TEXT), Murmur3::hash_bytes(1, TEXT));
        assert_ne!(Jenkins::hash_bytes(0, TEXT), Jenkins::hash_bytes(1, TEXT));
        assert_ne!(XxHash32::hash_bytes(0, TEXT), XxHash32::hash_bytes(1, TEXT));
    }

    #[test]
    fn std_hasher_is_endianness_stable() {
        let build = BuildStreamHasher::<XxHash32>::default();

        let mut by_int = build.build_hasher();
        0x0102_0304_u32.hash(&mut by_int);

        let mut by_bytes = build.build_hasher();
        by_bytes.write(&[0x04, 0x03, 0x02, 0x01]);

        assert_eq!(by_int.finish(), by_bytes.finish());
    }

    #[test]
    fn drives_std_hash_map() {
        let mut map = HashMap::with_hasher(BuildStreamHasher::<Murmur3>::with_seed(42));
        for i in 0..100 {
            map.insert(i, i * 2);
        }
        assert_eq!(map.len(), 100);
        assert_eq!(map.get(&21), Some(&42));
    }
}
