use std::sync::atomic::{AtomicU64, Ordering};

/// The largest supported filter, `2^32` bits (512 MiB).
pub const MAX_BLOOM_BITS: u8 = 32;

/// A single-hash bloom filter over record hash values.
///
/// The filter is a bit vector of `2^nbits` bits. Adding a hash value sets bit
/// `hv mod 2^nbits`; testing reports whether that bit is set. A negative test
/// proves that no record with that hash was ever added, which lets a table
/// reject lookups for absent keys without touching its buckets. A positive
/// test proves nothing and must be followed by a real lookup.
///
/// Bits are never cleared, so removing records only makes the filter less
/// selective. Bits are set atomically, which makes the filter safe to update
/// while the table is shared.
pub(crate) struct BloomFilter {
    nbits: u8,
    mask: u64,
    words: Box<[AtomicU64]>,
}

impl BloomFilter {
    /// Creates an empty filter of `2^nbits` bits.
    ///
    /// # Panics
    ///
    /// Panics if `nbits` is 0 or larger than [`MAX_BLOOM_BITS`].
    pub(crate) fn new(nbits: u8) -> Self {
        assert!(
            (1..=MAX_BLOOM_BITS).contains(&nbits),
            "bloom filter size must be between 2^1 and 2^{MAX_BLOOM_BITS} bits, got 2^{nbits}"
        );

        let bit_len = 1u64 << nbits;
        let word_len = ((bit_len + 63) / 64) as usize;
        let words = std::iter::repeat_with(AtomicU64::default)
            .take(word_len)
            .collect();

        Self {
            nbits,
            mask: bit_len - 1,
            words,
        }
    }

    #[inline]
    fn locate(&self, hv: u32) -> (usize, u64) {
        let bit = u64::from(hv) & self.mask;
        ((bit >> 6) as usize, 1 << (bit & 63))
    }

    pub(crate) fn add(&self, hv: u32) {
        let (word, bit) = self.locate(hv);
        self.words[word].fetch_or(bit, Ordering::Release);
    }

    pub(crate) fn test(&self, hv: u32) -> bool {
        let (word, bit) = self.locate(hv);
        self.words[word].load(Ordering::Acquire) & bit != 0
    }

    /// Number of set bits.
    pub(crate) fn count_ones(&self) -> u64 {
        self.words
            .iter()
            .map(|w| u64::from(w.load(Ordering::Relaxed).count_ones()))
            .sum()
    }

    pub(crate) fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("nbits", &self.nbits)
            .field("set_bits", &self.count_ones())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::BloomFilter;

    #[test]
    fn added_hashes_always_test_positive() {
        let bloom = BloomFilter::new(10);
        let hashes: Vec<u32> = (0..200u32).map(|i| i.wrapping_mul(2_654_435_761)).collect();

        for hv in &hashes {
            bloom.add(*hv);
        }
        for hv in &hashes {
            assert!(bloom.test(*hv));
        }
    }

    #[test]
    fn bit_index_is_hash_modulo_size() {
        let bloom = BloomFilter::new(4);
        bloom.add(3);
        // 19 mod 16 == 3
        assert!(bloom.test(19));
        assert!(!bloom.test(4));
        assert_eq!(bloom.count_ones(), 1);

        bloom.clear();
        assert!(!bloom.test(3));
    }

    #[test]
    fn small_filters_use_one_word() {
        let bloom = BloomFilter::new(1);
        bloom.add(0);
        bloom.add(1);
        assert_eq!(bloom.count_ones(), 2);
        assert!(bloom.test(2));
    }

    #[test]
    #[should_panic(expected = "bloom filter size")]
    fn rejects_zero_bits() {
        BloomFilter::new(0);
    }
}
