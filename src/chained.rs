//! A separate-chaining hash table with two-tier locking.

mod bucket;
mod iter;

pub use iter::Iter;

use self::bucket::{drain_buckets, Bucket, BucketArray, Entry};
use crate::{
    alloc::{AllocStrategy, SystemAlloc},
    bloom::BloomFilter,
    builder::TableBuilder,
    common::constants::{DEFAULT_INITIAL_BUCKETS, MAX_INEFFECTIVE_EXPANDS},
    error::TableError,
    lock::{LockStrategy, SingleThreaded},
    notification::{notifier::RemovalNotifier, RemovalCause},
    ops::{KeyOps, Record},
    stats::{GrowthState, TableStats},
};

use std::{
    borrow::Borrow,
    fmt,
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
};

use crossbeam_utils::CachePadded;
use parking_lot::lock_api::RwLock;

/// A hash table that resolves collisions by chaining records in per-bucket
/// linked lists.
///
/// # Locking
///
/// Every operation takes the table-wide lock, shared for inserts, lookups and
/// removals and exclusive for resizes, traversals that evict, and `clear`.
/// Chains are guarded by per-bucket locks. Both lock types are selected by the
/// `L` parameter: with the default [`SingleThreaded`] strategy the table is not
/// `Sync`, while [`RwLocks`][crate::RwLocks] or
/// [`BucketMutexes`][crate::BucketMutexes] make it shareable between threads
/// (wrap it in an `Arc`).
///
/// # Growth
///
/// The bucket array is allocated on the first insert. An insert that makes a
/// chain reach `(expand_mult + 1) * 10` records requests a resize, which
/// doubles the array after the locks have been released. Concurrent requests
/// are coalesced: only the first one to take the exclusive lock resizes, the
/// others see that the generation counter has moved and return.
///
/// When two consecutive resizes leave more than half of the records in
/// over-long chains (typically because many keys share one hash), automatic
/// growth is disabled for the table. [`expand`](Self::expand) still resizes on
/// demand, and [`clear`](Self::clear) re-enables growth.
///
/// # Example
///
/// ```rust
/// use hashtab::{ChainedTable, HashOps};
///
/// let table = ChainedTable::new(HashOps::<hashtab::XxHash32>::new());
///
/// table.insert(("apple".to_string(), 3)).unwrap();
/// table.insert(("pear".to_string(), 5)).unwrap();
///
/// assert_eq!(table.get_and("apple", |(_, v)| *v), Some(3));
/// assert!(table.delete("pear"));
/// assert_eq!(table.len(), 1);
/// ```
pub struct ChainedTable<T, O, L = SingleThreaded, A = SystemAlloc>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    ops: O,
    alloc: A,
    state: RwLock<L::TableLock, BucketArray<L::BucketLock, T>>,
    num_items: CachePadded<AtomicUsize>,
    generation: CachePadded<AtomicUsize>,
    growth: AtomicU8,
    initial_buckets: usize,
    bloom: Option<BloomFilter>,
    notifier: RemovalNotifier<T>,
    name: Option<String>,
}

impl<T, O> ChainedTable<T, O>
where
    T: Record,
    O: KeyOps<T::Key>,
{
    /// Creates a single-threaded table using the system allocator.
    pub fn new(ops: O) -> Self {
        Self::with_alloc(ops, SystemAlloc)
    }
}

impl<T, O, L, A> ChainedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    /// Returns a builder for a table of this type.
    pub fn builder() -> TableBuilder<T, Self> {
        TableBuilder::default()
    }

    pub(crate) fn with_everything(
        ops: O,
        alloc: A,
        initial_buckets: usize,
        bloom: Option<BloomFilter>,
        notifier: RemovalNotifier<T>,
        name: Option<String>,
    ) -> Self {
        Self {
            ops,
            alloc,
            state: RwLock::new(BucketArray::default()),
            num_items: CachePadded::new(AtomicUsize::new(0)),
            generation: CachePadded::new(AtomicUsize::new(0)),
            growth: AtomicU8::new(GrowthState::Idle.to_u8()),
            initial_buckets,
            bloom,
            notifier,
            name,
        }
    }

    /// Creates a table with the given allocation strategy. The lock strategy
    /// is taken from the table's type.
    pub fn with_alloc(ops: O, alloc: A) -> Self {
        Self::with_everything(
            ops,
            alloc,
            DEFAULT_INITIAL_BUCKETS,
            None,
            RemovalNotifier::new(None, None),
            None,
        )
    }

    /// Returns the table's name, if one was set with the builder.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.num_items.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buckets; zero until the first insert.
    pub fn num_buckets(&self) -> usize {
        self.state.read().num_buckets()
    }

    /// Number of completed resizes.
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::Acquire)
    }

    pub fn growth_state(&self) -> GrowthState {
        GrowthState::from_u8(self.growth.load(Ordering::Acquire))
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn alloc_strategy(&self) -> &A {
        &self.alloc
    }

    /// Takes a snapshot of the table's counters. Scans every chain to find
    /// the longest one.
    pub fn stats(&self) -> TableStats {
        let state = self.state.read();
        let longest_chain = state
            .buckets
            .iter()
            .map(|b| b.read().entries)
            .max()
            .unwrap_or_default();

        let mut stats = TableStats::default();
        stats
            .set_layout(state.num_buckets(), state.log2_num_buckets)
            .set_item_counts(self.len(), 0)
            .set_chain_quality(
                state.ideal_chain_maxlen,
                state.nonideal_items,
                longest_chain,
            )
            .set_growth(self.generation(), self.growth_state(), state.ineff_expands)
            .set_bloom_bits_set(self.bloom.as_ref().map(BloomFilter::count_ones));
        stats
    }

    /// Calls `f` with every record, bucket by bucket, and within a bucket
    /// from the most recently inserted record.
    ///
    /// Concurrent inserts and removals may proceed in buckets that are not
    /// being visited, but resizes wait until the traversal is done. `f` must
    /// not insert into or remove from this table.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.fold((), |(), record| f(record))
    }

    /// Folds every record into an accumulator, in the order of
    /// [`for_each`](Self::for_each).
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        let state = self.state.read();
        let mut acc = init;
        for bucket in state.buckets.iter() {
            let chain = bucket.read();
            for record in chain.iter() {
                acc = f(acc, record);
            }
        }
        acc
    }

    /// Keeps only the records for which `keep` returns `true`.
    ///
    /// Evicted records are passed to the removal listener with
    /// [`RemovalCause::Filtered`] once the table is unlocked, or dropped if
    /// there is no listener. Returns the number of evicted records.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut evicted = Vec::new();
        {
            let mut state = self.state.write();
            for bucket in state.buckets.iter_mut() {
                bucket.chain_mut().retain(&mut keep, &mut evicted);
            }
            self.num_items.fetch_sub(evicted.len(), Ordering::AcqRel);
        }

        let count = evicted.len();
        self.notifier.notify_all(evicted, RemovalCause::Filtered);
        count
    }

    /// Returns a lazy iterator over the records.
    ///
    /// The exclusive borrow of the table replaces locking.
    pub fn iter(&mut self) -> Iter<'_, T, L> {
        let len = *self.num_items.get_mut();
        Iter::new(&mut self.state.get_mut().buckets, len)
    }

    /// Removes every record and releases the bucket array.
    ///
    /// The removed records are passed to the removal listener with
    /// [`RemovalCause::Cleared`]. The table returns to its initial state: the
    /// next insert allocates a fresh array, the bloom filter is emptied, and
    /// automatic growth is enabled again. The generation counter keeps
    /// counting.
    pub fn clear(&self) {
        let mut buckets = {
            let mut state = self.state.write();
            let buckets = state.take();
            self.num_items.store(0, Ordering::Release);
            self.set_growth(GrowthState::Idle);
            if let Some(bloom) = &self.bloom {
                bloom.clear();
            }
            buckets
        };

        let records = drain_buckets(&mut buckets);
        self.alloc.free_array(buckets);
        self.notifier.notify_all(records, RemovalCause::Cleared);
    }

    fn set_growth(&self, growth: GrowthState) {
        self.growth.store(growth.to_u8(), Ordering::Release);
    }

    /// Moves `Idle` to `Requested`. Disabled or suspended growth is left
    /// alone.
    fn request_growth(&self) {
        let _ = self.growth.compare_exchange(
            GrowthState::Idle.to_u8(),
            GrowthState::Requested.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Allocates the first bucket array unless another thread already did.
    fn allocate_buckets(&self) -> Result<(), TableError> {
        let mut state = self.state.write();
        if state.is_allocated() {
            return Ok(());
        }
        let buckets = self
            .alloc
            .alloc_array(self.initial_buckets, Bucket::new)?;
        state.install(buckets);
        Ok(())
    }

    /// Doubles the bucket array if the table is still at generation
    /// `observed`. Returns `Ok(false)` if another thread resized first, or if
    /// the resize is no longer wanted.
    fn resize(&self, observed: usize, manual: bool) -> Result<bool, TableError> {
        let mut state = self.state.write();

        if self.generation.load(Ordering::Acquire) != observed || !state.is_allocated() {
            return Ok(false);
        }
        let growth = self.growth_state();
        if !manual && growth != GrowthState::Requested {
            return Ok(false);
        }

        let old_len = state.num_buckets();
        let new_buckets = old_len
            .checked_mul(2)
            .ok_or(TableError::AllocFailed { bytes: usize::MAX })
            .and_then(|new_len| self.alloc.alloc_array(new_len, Bucket::new));
        let new_buckets = match new_buckets {
            Ok(buckets) => buckets,
            Err(e) => {
                if growth != GrowthState::Disabled {
                    self.set_growth(GrowthState::Suspended);
                }
                #[cfg(feature = "logging")]
                log::warn!(
                    "{}Could not grow the table beyond {} buckets: {}",
                    crate::common::name_prefix(self.name()),
                    old_len,
                    e
                );
                return Err(e);
            }
        };

        // Inserts and removals update the item count under the shared lock,
        // so it is exact here.
        let items = self.num_items.load(Ordering::Acquire);
        let (old_buckets, outcome) = state.rehash(new_buckets, items);
        self.alloc.free_array(old_buckets);

        if outcome.nonideal_items > items / 2 {
            state.ineff_expands += 1;
        } else {
            state.ineff_expands = 0;
        }

        let next_growth = if growth == GrowthState::Disabled
            || state.ineff_expands > MAX_INEFFECTIVE_EXPANDS
        {
            GrowthState::Disabled
        } else {
            GrowthState::Idle
        };

        #[cfg(feature = "logging")]
        {
            if next_growth == GrowthState::Disabled && growth != GrowthState::Disabled {
                log::warn!(
                    "{}Disabled automatic growth after {} ineffective resizes \
                     ({} of {} items in chains longer than {})",
                    crate::common::name_prefix(self.name()),
                    state.ineff_expands,
                    outcome.nonideal_items,
                    items,
                    outcome.ideal_chain_maxlen
                );
            }
        }

        self.set_growth(next_growth);
        self.generation.fetch_add(1, Ordering::AcqRel);

        #[cfg(feature = "logging")]
        log::debug!(
            "{}Resized from {} to {} buckets (generation {}, {} items, {} in over-long chains)",
            crate::common::name_prefix(self.name()),
            old_len,
            state.num_buckets(),
            self.generation(),
            items,
            outcome.nonideal_items
        );

        Ok(true)
    }
}

impl<T, O, L, A> ChainedTable<T, O, L, A>
where
    T: Record,
    O: KeyOps<T::Key>,
    L: LockStrategy,
    A: AllocStrategy,
{
    /// Inserts a record.
    ///
    /// Records with equal keys are not replaced: the new record is linked in
    /// front of the chain, so lookups find it first, and a later
    /// [`remove`](Self::remove) uncovers the older one.
    ///
    /// # Errors
    ///
    /// - [`TableError::AllocFailed`] when the first bucket array cannot be
    ///   allocated. The record is dropped.
    /// - [`TableError::GrowthFailed`] when the record was stored but the
    ///   resize it triggered could not allocate. Automatic growth is suspended
    ///   until [`expand`](Self::expand) succeeds.
    pub fn insert(&self, record: T) -> Result<(), TableError> {
        let hv = self.ops.hash(record.key());
        let mut entry = Some(Entry::new(record, hv));

        let observed = loop {
            let state = self.state.read();
            let Some(bucket) = state.bucket(hv) else {
                drop(state);
                self.allocate_buckets()?;
                continue;
            };

            // The bloom bit must be visible before the record is.
            if let Some(bloom) = &self.bloom {
                bloom.add(hv);
            }

            let mut chain = bucket.write();
            if let Some(entry) = entry.take() {
                chain.push_front(entry);
            }
            let overloaded = chain.is_overloaded();
            drop(chain);

            self.num_items.fetch_add(1, Ordering::AcqRel);
            if overloaded {
                self.request_growth();
            }
            break self.generation.load(Ordering::Acquire);
        };

        if self.growth_state() == GrowthState::Requested {
            self.resize(observed, false)
                .map_err(|e| TableError::GrowthFailed { bytes: e.bytes() })?;
        }
        Ok(())
    }

    /// Calls `with_record` on the most recently inserted record whose key
    /// equals `key`, returning its result.
    ///
    /// The bucket stays locked while `with_record` runs; it must not modify
    /// this table.
    pub fn get_and<Q, F, R>(&self, key: &Q, with_record: F) -> Option<R>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
        F: FnOnce(&T) -> R,
    {
        let hv = KeyOps::<Q>::hash(&self.ops, key);
        if !self.may_contain(hv) {
            return None;
        }

        let state = self.state.read();
        let chain = state.bucket(hv)?.read();
        let found = chain
            .find(hv, |r| {
                KeyOps::<Q>::key_eq(&self.ops, Borrow::borrow(r.key()), key)
            })
            .map(with_record);
        found
    }

    /// Returns a clone of the record whose key equals `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<T>
    where
        T: Clone,
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        self.get_and(key, T::clone)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        self.get_and(key, |_| ()).is_some()
    }

    /// Unlinks the record whose key equals `key` and returns it to the
    /// caller. The removal listener is not called.
    pub fn remove<Q>(&self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        let hv = KeyOps::<Q>::hash(&self.ops, key);
        if !self.may_contain(hv) {
            return None;
        }

        let removed = {
            let state = self.state.read();
            let mut chain = state.bucket(hv)?.write();
            let removed = chain.unlink(hv, |r| {
                KeyOps::<Q>::key_eq(&self.ops, Borrow::borrow(r.key()), key)
            })?;
            self.num_items.fetch_sub(1, Ordering::AcqRel);
            removed
        };
        Some(removed.record)
    }

    /// Removes the record whose key equals `key` and passes it to the removal
    /// listener with [`RemovalCause::Explicit`]. Returns `true` if a record
    /// was removed.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        match self.remove(key) {
            Some(record) => {
                self.notifier.notify(record, RemovalCause::Explicit);
                true
            }
            None => false,
        }
    }

    /// Doubles the bucket array now, regardless of chain lengths.
    ///
    /// This works even when automatic growth is disabled, and lifts a
    /// suspension caused by an earlier allocation failure. An unallocated
    /// table gets its first array instead.
    ///
    /// # Errors
    ///
    /// [`TableError::AllocFailed`] if the new array cannot be allocated.
    pub fn expand(&self) -> Result<(), TableError> {
        if !self.state.read().is_allocated() {
            return self.allocate_buckets();
        }
        let observed = self.generation();
        self.resize(observed, true).map(|_| ())
    }

    fn may_contain(&self, hv: u32) -> bool {
        self.bloom.as_ref().map_or(true, |bloom| bloom.test(hv))
    }
}

impl<T, O, L, A> Drop for ChainedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    fn drop(&mut self) {
        let mut buckets = self.state.get_mut().take();
        if self.notifier.has_listener() {
            let records = drain_buckets(&mut buckets);
            self.alloc.free_array(buckets);
            self.notifier.notify_all(records, RemovalCause::Dropped);
        } else {
            self.alloc.free_array(buckets);
        }
    }
}

impl<'a, T, O, L, A> IntoIterator for &'a mut ChainedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, L>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, O, L, A> fmt::Debug for ChainedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedTable")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}
