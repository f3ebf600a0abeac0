//! The binding contract between a record type and a table.
//!
//! A table stores records of any type implementing [`Record`], and hashes and
//! compares their keys through a [`KeyOps`] value supplied at construction
//! time. The ops value plays the role of the auxiliary data handed to the hash
//! function and the comparator, so it can carry seeds, filters or any other
//! configuration.

use crate::hash::{BuildStreamHasher, OneAtATime, StreamingHash, XxHash32};

use std::{
    fmt,
    hash::{BuildHasher, Hash},
};

/// A value that can be stored in a table.
///
/// `key` must keep returning an equal key (under the table's [`KeyOps`]) for
/// as long as the record is stored.
pub trait Record {
    type Key: ?Sized;

    fn key(&self) -> &Self::Key;
}

/// Key/value pairs are records keyed by their first element.
impl<K, V> Record for (K, V) {
    type Key = K;

    fn key(&self) -> &K {
        &self.0
    }
}

/// Hash function and equality comparator for keys of type `K`.
///
/// It is required that equal keys hash to equal values:
///
/// ```text
/// key_eq(k1, k2) -> hash(k1) == hash(k2)
/// ```
pub trait KeyOps<K: ?Sized> {
    /// Hashes a key. Must be a pure function of the key.
    fn hash(&self, key: &K) -> u32;

    /// Returns `true` when the keys are equal. Ordering is never needed.
    fn key_eq(&self, a: &K, b: &K) -> bool;
}

/// Hashes any `Hash + Eq` key with a seeded [`StreamingHash`], comparing with
/// `Eq`.
pub struct HashOps<H = XxHash32> {
    build_hasher: BuildStreamHasher<H>,
}

impl<H> HashOps<H> {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u32) -> Self {
        Self {
            build_hasher: BuildStreamHasher::with_seed(seed),
        }
    }
}

impl<H> Default for HashOps<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for HashOps<H> {
    fn clone(&self) -> Self {
        Self {
            build_hasher: self.build_hasher.clone(),
        }
    }
}

impl<H> fmt::Debug for HashOps<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashOps")
            .field("seed", &self.build_hasher.seed())
            .finish()
    }
}

impl<K, H> KeyOps<K> for HashOps<H>
where
    K: Hash + Eq + ?Sized,
    H: StreamingHash,
{
    fn hash(&self, key: &K) -> u32 {
        let mut hasher = self.build_hasher.build_hasher();
        key.hash(&mut hasher);
        hasher.finish32()
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// A byte filter applied to string keys before hashing and comparing.
pub type ByteFilter = fn(u8) -> u8;

/// Ops for string-like keys with an optional per-byte filter.
///
/// The filter is applied to every byte both when hashing and when comparing,
/// so for example [`StrOps::case_insensitive`] treats `"Key"` and `"KEY"` as
/// the same key. Filtered bytes are streamed into the hash in small chunks
/// without allocating.
#[derive(Clone)]
pub struct StrOps<H = OneAtATime> {
    seed: u32,
    filter: Option<ByteFilter>,
    _hash: std::marker::PhantomData<fn() -> H>,
}

impl<H> StrOps<H> {
    pub fn new() -> Self {
        Self {
            seed: 0,
            filter: None,
            _hash: std::marker::PhantomData,
        }
    }

    pub fn with_filter(filter: ByteFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::new()
        }
    }

    /// ASCII case-insensitive keys.
    pub fn case_insensitive() -> Self {
        Self::with_filter(|b| b.to_ascii_lowercase())
    }

    pub fn seed(self, seed: u32) -> Self {
        Self { seed, ..self }
    }
}

impl<H> Default for StrOps<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for StrOps<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrOps")
            .field("seed", &self.seed)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<K, H> KeyOps<K> for StrOps<H>
where
    K: AsRef<[u8]> + ?Sized,
    H: StreamingHash,
{
    fn hash(&self, key: &K) -> u32 {
        const CHUNK: usize = 32;

        let bytes = key.as_ref();
        let mut state = H::with_seed(self.seed);

        match self.filter {
            None => state.update(bytes),
            Some(filter) => {
                let mut buf = [0u8; CHUNK];
                for chunk in bytes.chunks(CHUNK) {
                    for (dst, src) in buf.iter_mut().zip(chunk) {
                        *dst = filter(*src);
                    }
                    state.update(&buf[..chunk.len()]);
                }
            }
        }

        state.finish32()
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        let (a, b) = (a.as_ref(), b.as_ref());
        match self.filter {
            None => a == b,
            Some(filter) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| filter(*x) == filter(*y))
            }
        }
    }
}

/// Integer keys that can be used as their own hash.
pub trait IdentityHash: Eq {
    fn identity_hash(&self) -> u32;
}

macro_rules! impl_identity_hash {
    ($($t:ty),*) => {
        $(
            impl IdentityHash for $t {
                #[inline]
                fn identity_hash(&self) -> u32 {
                    // Truncation is intended: the low bits select the bucket.
                    *self as u32
                }
            }
        )*
    };
}

impl_identity_hash!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Uses an integer key's value as its hash.
///
/// Fast and fully predictable, which is handy for benchmarks and for tests
/// that need to control bucket placement. Poorly distributed key sets will
/// produce long chains.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityOps;

impl<K: IdentityHash> KeyOps<K> for IdentityOps {
    fn hash(&self, key: &K) -> u32 {
        key.identity_hash()
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Ops built from a pair of closures.
#[derive(Clone)]
pub struct FnOps<H, E> {
    hash: H,
    eq: E,
}

impl<H, E> FnOps<H, E> {
    pub fn new(hash: H, eq: E) -> Self {
        Self { hash, eq }
    }
}

impl<K, H, E> KeyOps<K> for FnOps<H, E>
where
    K: ?Sized,
    H: Fn(&K) -> u32,
    E: Fn(&K, &K) -> bool,
{
    fn hash(&self, key: &K) -> u32 {
        (self.hash)(key)
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        (self.eq)(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::{FnOps, HashOps, IdentityOps, KeyOps, Record, StrOps};
    use crate::hash::{Murmur3, OneAtATime, StreamingHash};

    #[test]
    fn pairs_are_keyed_by_first_element() {
        let record = ("alice", 42);
        assert_eq!(*record.key(), "alice");
    }

    #[test]
    fn hash_ops_agree_with_equality() {
        let ops = HashOps::<Murmur3>::with_seed(9);
        let a = String::from("some key");
        let b = String::from("some key");
        assert!(KeyOps::<String>::key_eq(&ops, &a, &b));
        assert_eq!(KeyOps::<String>::hash(&ops, &a), KeyOps::<String>::hash(&ops, &b));
    }

    #[test]
    fn str_ops_without_filter_hash_raw_bytes() {
        let ops = StrOps::<OneAtATime>::new();
        assert_eq!(KeyOps::<str>::hash(&ops, "a"), OneAtATime::hash_bytes(0, b"a"));
        assert!(!KeyOps::<str>::key_eq(&ops, "a", "A"));
    }

    #[test]
    fn case_insensitive_str_ops() {
        let ops = StrOps::<OneAtATime>::case_insensitive();
        let long_upper = "THE QUICK BROWN FOX JUMPS OVER THE LAZY DOG AND KEEPS RUNNING";
        let long_lower = long_upper.to_ascii_lowercase();

        assert!(KeyOps::<str>::key_eq(&ops, "Key", "kEY"));
        assert!(!KeyOps::<str>::key_eq(&ops, "Key", "Keys"));
        assert_eq!(
            KeyOps::<str>::hash(&ops, long_upper),
            KeyOps::<str>::hash(&ops, long_lower.as_str())
        );
        assert_eq!(
            KeyOps::<str>::hash(&ops, long_upper),
            OneAtATime::hash_bytes(0, long_lower.as_bytes())
        );
    }

    #[test]
    fn identity_ops() {
        assert_eq!(KeyOps::<i32>::hash(&IdentityOps, &17), 17);
        assert_eq!(KeyOps::<i32>::hash(&IdentityOps, &-1), u32::MAX);
    }

    #[test]
    fn closure_ops() {
        let ops = FnOps::new(|k: &u64| (*k % 7) as u32, |a: &u64, b: &u64| a == b);
        assert_eq!(KeyOps::<u64>::hash(&ops, &15), 1);
        assert!(KeyOps::<u64>::key_eq(&ops, &3, &3));
    }
}
