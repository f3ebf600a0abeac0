use crate::{
    alloc::AllocStrategy,
    bloom::{BloomFilter, MAX_BLOOM_BITS},
    chained::ChainedTable,
    closed::{array_len_for, ClosedTable, ConcurrentClosedTable},
    common::{constants::DEFAULT_INITIAL_BUCKETS, is_valid_array_len},
    lock::LockStrategy,
    notification::{notifier::RemovalNotifier, RemovalCause, RemovalListener},
};

use std::{fmt, marker::PhantomData, sync::Arc};

/// Builds a [`ChainedTable`][chained], [`ClosedTable`][closed] or
/// [`ConcurrentClosedTable`][concurrent] with various configuration knobs.
///
/// The kind of table is chosen by the type the builder was created for, for
/// example with `ChainedTable::builder()`.
///
/// [chained]: crate::ChainedTable
/// [closed]: crate::ClosedTable
/// [concurrent]: crate::ConcurrentClosedTable
///
/// # Examples
///
/// ```rust
/// use hashtab::{ChainedTable, IdentityOps, RemovalCause, RwLocks};
///
/// type Table = ChainedTable<(u64, String), IdentityOps, RwLocks>;
///
/// let table = Table::builder()
///     // Start with 1,024 buckets.
///     .initial_buckets(1024)
///     // Reject lookups for absent keys with a 2^16-bit bloom filter.
///     .bloom_filter(16)
///     .name("sessions")
///     .removal_listener(|(id, _), cause| {
///         if cause == RemovalCause::Filtered {
///             println!("session {id} expired");
///         }
///     })
///     .build(IdentityOps);
///
/// table.insert((7, "alice".into())).unwrap();
/// assert_eq!(table.num_buckets(), 1024);
/// ```
///
#[must_use]
pub struct TableBuilder<T, C> {
    initial_buckets: Option<usize>,
    capacity: Option<usize>,
    bloom_bits: Option<u8>,
    name: Option<String>,
    removal_listener: Option<RemovalListener<T>>,
    table_type: PhantomData<C>,
}

impl<T, C> Default for TableBuilder<T, C> {
    fn default() -> Self {
        Self {
            initial_buckets: None,
            capacity: None,
            bloom_bits: None,
            name: None,
            removal_listener: None,
            table_type: PhantomData,
        }
    }
}

impl<T, C> TableBuilder<T, C> {
    /// Sets the number of buckets (or slots) allocated by the first insert.
    /// Defaults to 32.
    pub fn initial_buckets(self, initial_buckets: usize) -> Self {
        Self {
            initial_buckets: Some(initial_buckets),
            ..self
        }
    }

    /// Attaches a bloom filter of `2^nbits` bits, consulted before every
    /// lookup.
    pub fn bloom_filter(self, nbits: u8) -> Self {
        Self {
            bloom_bits: Some(nbits),
            ..self
        }
    }

    /// Sets the name of the table. The name is shown in log messages.
    pub fn name(self, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..self
        }
    }

    /// Sets the removal listener, which is called with every record the table
    /// discards: deleted, filtered out, cleared, or still stored when the
    /// table is dropped.
    ///
    /// A listener that panics is disabled, and further records are dropped
    /// without notification.
    pub fn removal_listener(
        self,
        listener: impl Fn(T, RemovalCause) + Send + Sync + 'static,
    ) -> Self {
        Self {
            removal_listener: Some(Arc::new(listener)),
            ..self
        }
    }

    // Checks the configuration and resolves the first array length.
    fn validate(&self) -> (usize, Option<BloomFilter>) {
        let initial_buckets = match (self.initial_buckets, self.capacity) {
            (Some(n), _) => {
                assert!(
                    is_valid_array_len(n),
                    "initial_buckets must be a power of two no smaller than 2, got {n}"
                );
                n
            }
            (None, Some(capacity)) => array_len_for(capacity),
            (None, None) => DEFAULT_INITIAL_BUCKETS,
        };

        if let Some(nbits) = self.bloom_bits {
            assert!(
                (1..=MAX_BLOOM_BITS).contains(&nbits),
                "bloom filter size must be between 2^1 and 2^{MAX_BLOOM_BITS} bits, got 2^{nbits}"
            );
        }

        (initial_buckets, self.bloom_bits.map(BloomFilter::new))
    }

    fn into_parts(self) -> (usize, Option<BloomFilter>, RemovalNotifier<T>, Option<String>) {
        let (initial_buckets, bloom) = self.validate();
        let notifier = RemovalNotifier::new(self.removal_listener, self.name.clone());
        (initial_buckets, bloom, notifier, self.name)
    }
}

impl<T, O, L, A> TableBuilder<T, ChainedTable<T, O, L, A>>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    /// Builds a `ChainedTable` with a default-constructed allocation strategy.
    ///
    /// # Panics
    ///
    /// Panics if `initial_buckets` is not a power of two no smaller than 2, or
    /// if the bloom filter size is outside `1..=32` bits.
    pub fn build(self, ops: O) -> ChainedTable<T, O, L, A>
    where
        A: Default,
    {
        self.build_with_alloc(ops, A::default())
    }

    /// Builds a `ChainedTable` that allocates its bucket arrays with `alloc`.
    ///
    /// # Panics
    ///
    /// See [`build`](Self::build).
    pub fn build_with_alloc(self, ops: O, alloc: A) -> ChainedTable<T, O, L, A> {
        let (initial_buckets, bloom, notifier, name) = self.into_parts();
        ChainedTable::with_everything(ops, alloc, initial_buckets, bloom, notifier, name)
    }
}

impl<T, O, A> TableBuilder<T, ClosedTable<T, O, A>>
where
    A: AllocStrategy,
{
    /// Sizes the first slot array to hold `capacity` records without
    /// rehashing. Ignored if `initial_buckets` is set.
    pub fn capacity(self, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..self
        }
    }

    /// Builds a `ClosedTable` with a default-constructed allocation strategy.
    ///
    /// # Panics
    ///
    /// Panics if `initial_buckets` is not a power of two no smaller than 2, or
    /// if the bloom filter size is outside `1..=32` bits.
    pub fn build(self, ops: O) -> ClosedTable<T, O, A>
    where
        A: Default,
    {
        self.build_with_alloc(ops, A::default())
    }

    /// Builds a `ClosedTable` that allocates its slot arrays with `alloc`.
    ///
    /// # Panics
    ///
    /// See [`build`](Self::build).
    pub fn build_with_alloc(self, ops: O, alloc: A) -> ClosedTable<T, O, A> {
        let (initial_buckets, bloom, notifier, name) = self.into_parts();
        ClosedTable::with_everything(ops, alloc, initial_buckets, bloom, notifier, name)
    }
}

impl<T, O, L, A> TableBuilder<T, ConcurrentClosedTable<T, O, L, A>>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    /// Sizes the first slot array to hold `capacity` records without
    /// rehashing. Ignored if `initial_buckets` is set.
    pub fn capacity(self, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..self
        }
    }

    /// Builds a `ConcurrentClosedTable` with a default-constructed allocation
    /// strategy.
    ///
    /// # Panics
    ///
    /// Panics if `initial_buckets` is not a power of two no smaller than 2, or
    /// if the bloom filter size is outside `1..=32` bits.
    pub fn build(self, ops: O) -> ConcurrentClosedTable<T, O, L, A>
    where
        A: Default,
    {
        self.build_with_alloc(ops, A::default())
    }

    /// Builds a `ConcurrentClosedTable` that allocates its slot arrays with
    /// `alloc`.
    ///
    /// # Panics
    ///
    /// See [`build`](Self::build).
    pub fn build_with_alloc(self, ops: O, alloc: A) -> ConcurrentClosedTable<T, O, L, A> {
        let (initial_buckets, bloom, notifier, name) = self.into_parts();
        ConcurrentClosedTable::from_table(ClosedTable::with_everything(
            ops,
            alloc,
            initial_buckets,
            bloom,
            notifier,
            name,
        ))
    }
}

impl<T, C> fmt::Debug for TableBuilder<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableBuilder")
            .field("initial_buckets", &self.initial_buckets)
            .field("capacity", &self.capacity)
            .field("bloom_bits", &self.bloom_bits)
            .field("name", &self.name)
            .field("removal_listener", &self.removal_listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ChainedTable, ClosedTable, ConcurrentClosedTable, IdentityOps};

    type Chained = ChainedTable<(u32, u32), IdentityOps>;
    type Closed = ClosedTable<(u32, u32), IdentityOps>;

    #[test]
    fn build_chained_table() {
        let table = Chained::builder()
            .initial_buckets(128)
            .bloom_filter(10)
            .name("numbers")
            .build(IdentityOps);

        assert_eq!(table.name(), Some("numbers"));
        assert_eq!(table.num_buckets(), 0);
        table.insert((1, 1)).unwrap();
        assert_eq!(table.num_buckets(), 128);
        assert_eq!(table.stats().bloom_bits_set(), Some(1));
    }

    #[test]
    fn build_closed_tables() {
        let mut table = Closed::builder().capacity(100).build(IdentityOps);
        table.insert((1, 1)).unwrap();
        assert_eq!(table.num_buckets(), 256);

        let table = ConcurrentClosedTable::<(u32, u32), IdentityOps>::builder()
            .initial_buckets(8)
            .build(IdentityOps);
        table.insert((1, 1)).unwrap();
        assert_eq!(table.num_buckets(), 8);
    }

    #[test]
    #[should_panic(expected = "initial_buckets must be a power of two")]
    fn rejects_odd_bucket_counts() {
        let _ = Chained::builder().initial_buckets(48).build(IdentityOps);
    }

    #[test]
    #[should_panic(expected = "bloom filter size")]
    fn rejects_oversized_bloom_filters() {
        let _ = Closed::builder().bloom_filter(33).build(IdentityOps);
    }
}
