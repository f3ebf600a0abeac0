//! An open-addressing hash table with inline records and quadratic probing.

mod concurrent;
mod iter;
mod slot;

pub use self::{concurrent::ConcurrentClosedTable, iter::Iter};

use self::slot::{find_insert_slot, find_slot, place, InsertSlot, Slot};
use crate::{
    alloc::{AllocStrategy, SystemAlloc},
    bloom::BloomFilter,
    builder::TableBuilder,
    common::constants::{CLOSED_LOAD_DENOMINATOR, CLOSED_LOAD_NUMERATOR, DEFAULT_INITIAL_BUCKETS},
    error::TableError,
    notification::{notifier::RemovalNotifier, RemovalCause},
    ops::{KeyOps, Record},
    stats::{GrowthState, TableStats},
};

use std::{borrow::Borrow, fmt, mem};

/// The number of occupied slots (live records plus tombstones) at which an
/// array of `len` slots must be rehashed.
pub(crate) fn upper_bound(len: usize) -> usize {
    // Widened so that huge arrays do not overflow.
    (len as u128 * CLOSED_LOAD_NUMERATOR as u128 / CLOSED_LOAD_DENOMINATOR as u128) as usize
}

/// A hash table that stores records inline in a power-of-two array of slots
/// and resolves collisions with triangular (quadratic) probing.
///
/// Unlike [`ChainedTable`][crate::ChainedTable], a closed table holds at most
/// one record per key: inserting a record whose key is already present
/// replaces it and returns the old one. Deleted records leave tombstones that
/// keep probe sequences intact; they are reclaimed by the next rehash.
///
/// The table is rehashed before an insert once the occupied slots reach 77%
/// of the array. If tombstones outnumber live records at that point, the array
/// is rebuilt at the same size; otherwise it doubles.
///
/// `ClosedTable` takes `&mut self` for every modification and is not
/// internally synchronized. Use [`ConcurrentClosedTable`] to share one between
/// threads.
///
/// # Example
///
/// ```rust
/// use hashtab::{ClosedTable, StrOps};
///
/// let mut table = ClosedTable::new(StrOps::<hashtab::OneAtATime>::case_insensitive());
///
/// assert_eq!(table.insert(("Content-Type", "text/plain")).unwrap(), None);
/// let old = table.insert(("content-type", "text/html")).unwrap();
/// assert_eq!(old, Some(("Content-Type", "text/plain")));
///
/// assert_eq!(table.get("CONTENT-TYPE"), Some(("content-type", "text/html")));
/// assert_eq!(table.len(), 1);
/// ```
pub struct ClosedTable<T, O, A = SystemAlloc>
where
    A: AllocStrategy,
{
    ops: O,
    alloc: A,
    slots: Box<[Slot<T>]>,
    len: usize,
    occupied: usize,
    upper_bound: usize,
    generation: usize,
    initial_buckets: usize,
    bloom: Option<BloomFilter>,
    notifier: RemovalNotifier<T>,
    name: Option<String>,
}

impl<T, O> ClosedTable<T, O>
where
    T: Record,
    O: KeyOps<T::Key>,
{
    pub fn new(ops: O) -> Self {
        Self::with_alloc(ops, SystemAlloc)
    }

    /// Creates a table whose first array holds `capacity` records without
    /// rehashing. The array is still allocated lazily.
    pub fn with_capacity(ops: O, capacity: usize) -> Self {
        let mut table = Self::new(ops);
        table.initial_buckets = array_len_for(capacity);
        table
    }
}

/// Smallest array length that holds `capacity` records below the load limit.
pub(crate) fn array_len_for(capacity: usize) -> usize {
    let mut len = DEFAULT_INITIAL_BUCKETS;
    while upper_bound(len) < capacity {
        len = match len.checked_mul(2) {
            Some(len) => len,
            None => break,
        };
    }
    len
}

impl<T, O, A> ClosedTable<T, O, A>
where
    A: AllocStrategy,
{
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
            slots: Box::default(),
            len: 0,
            occupied: 0,
            upper_bound: 0,
            generation: 0,
            initial_buckets,
            bloom,
            notifier,
            name,
        }
    }

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

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots; zero until the first insert.
    pub fn num_buckets(&self) -> usize {
        self.slots.len()
    }

    /// Number of deleted slots awaiting the next rehash.
    pub fn tombstones(&self) -> usize {
        self.occupied - self.len
    }

    /// Number of completed rehashes, including same-size compactions.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn stats(&self) -> TableStats {
        let num_buckets = self.slots.len();
        let log2_num_buckets = if num_buckets == 0 {
            0
        } else {
            num_buckets.trailing_zeros()
        };

        let mut stats = TableStats::default();
        stats
            .set_layout(num_buckets, log2_num_buckets)
            .set_item_counts(self.len, self.tombstones())
            .set_growth(self.generation, GrowthState::Idle, 0)
            .set_bloom_bits_set(self.bloom.as_ref().map(BloomFilter::count_ones));
        stats
    }

    /// Returns an iterator over the records in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.slots, self.len)
    }

    pub fn for_each(&self, f: impl FnMut(&T)) {
        self.iter().for_each(f)
    }

    pub fn fold<B, F>(&self, init: B, f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        self.iter().fold(init, f)
    }

    /// Keeps only the records for which `keep` returns `true`. Evicted
    /// records are tombstoned and passed to the removal listener with
    /// [`RemovalCause::Filtered`]. Returns the number of evicted records.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut evicted = Vec::new();
        self.retain_into(keep, &mut evicted);
        let count = evicted.len();
        self.notifier.notify_all(evicted, RemovalCause::Filtered);
        count
    }

    pub(crate) fn retain_into<F>(&mut self, mut keep: F, evicted: &mut Vec<T>)
    where
        F: FnMut(&T) -> bool,
    {
        for slot in self.slots.iter_mut() {
            if slot.record().map_or(true, &mut keep) {
                continue;
            }
            if let Some((_, record)) = slot.replace(Slot::Tombstone) {
                evicted.push(record);
                self.len -= 1;
            }
        }
    }

    /// Removes every record and releases the array. The records are passed
    /// to the removal listener with [`RemovalCause::Cleared`].
    pub fn clear(&mut self) {
        let records = self.drain_all();
        self.notifier.notify_all(records, RemovalCause::Cleared);
    }

    /// Empties the table, returning it to its unallocated state.
    pub(crate) fn drain_all(&mut self) -> Vec<T> {
        let mut slots = mem::take(&mut self.slots);
        let records = slots
            .iter_mut()
            .filter_map(|slot| slot.replace(Slot::Empty))
            .map(|(_, record)| record)
            .collect();
        self.alloc.free_array(slots);

        self.len = 0;
        self.occupied = 0;
        self.upper_bound = 0;
        if let Some(bloom) = &self.bloom {
            bloom.clear();
        }
        records
    }

    /// Doubles the array now. An unallocated table gets its first array
    /// instead.
    ///
    /// # Errors
    ///
    /// [`TableError::AllocFailed`] if the new array cannot be allocated. The
    /// table is unchanged.
    pub fn expand(&mut self) -> Result<(), TableError> {
        let new_len = if self.slots.is_empty() {
            self.initial_buckets
        } else {
            self.slots
                .len()
                .checked_mul(2)
                .ok_or(TableError::AllocFailed { bytes: usize::MAX })?
        };
        self.resize_to(new_len)
    }

    /// Rehashes before an insert: compacts at the same size when tombstones
    /// outnumber live records, and doubles otherwise.
    fn make_room(&mut self) -> Result<(), TableError> {
        if self.slots.is_empty() {
            return self.resize_to(self.initial_buckets);
        }
        if self.tombstones() > self.len {
            return self.resize_to(self.slots.len());
        }
        self.expand()
    }

    fn resize_to(&mut self, new_len: usize) -> Result<(), TableError> {
        debug_assert!(new_len.is_power_of_two() && new_len > self.len);

        let mut new_slots = match self.alloc.alloc_array(new_len, Slot::default) {
            Ok(slots) => slots,
            Err(e) => {
                #[cfg(feature = "logging")]
                log::warn!(
                    "{}Could not rehash into {} slots: {}",
                    crate::common::name_prefix(self.name()),
                    new_len,
                    e
                );
                return Err(e);
            }
        };

        for slot in self.slots.iter_mut() {
            if let Some((hv, record)) = slot.replace(Slot::Empty) {
                if place(&mut new_slots, hv, record).is_err() {
                    panic!(
                        "closed table invariant violated: no free slot while rehashing into \
                         {new_len} slots"
                    );
                }
            }
        }

        let old_slots = mem::replace(&mut self.slots, new_slots);
        let old_len = old_slots.len();
        if old_len > 0 {
            self.generation += 1;
        }
        self.alloc.free_array(old_slots);

        #[cfg(feature = "logging")]
        log::debug!(
            "{}Rehashed from {} to {} slots (generation {}, {} records, {} tombstones dropped)",
            crate::common::name_prefix(self.name()),
            old_len,
            new_len,
            self.generation,
            self.len,
            self.occupied - self.len
        );

        self.occupied = self.len;
        self.upper_bound = upper_bound(new_len);
        Ok(())
    }
}

impl<T, O, A> ClosedTable<T, O, A>
where
    T: Record,
    O: KeyOps<T::Key>,
    A: AllocStrategy,
{
    /// Inserts a record, returning the record it replaced, if any.
    ///
    /// # Errors
    ///
    /// [`TableError::AllocFailed`] if the table had to rehash and the new
    /// array could not be allocated. The record is dropped and the table is
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the probe sequence holds no usable slot, which the load limit
    /// rules out.
    pub fn insert(&mut self, record: T) -> Result<Option<T>, TableError> {
        let hv = self.ops.hash(record.key());
        if self.occupied >= self.upper_bound {
            // Replacing a stored record needs no room.
            let existing = find_slot(&self.slots, hv, |r| {
                self.ops.key_eq(r.key(), record.key())
            });
            if let Some(index) = existing {
                let old = self.slots[index].replace(Slot::Occupied { hv, record });
                return Ok(old.map(|(_, record)| record));
            }
            self.make_room()?;
        }

        let found = find_insert_slot(&self.slots, hv, |r| {
            self.ops.key_eq(r.key(), record.key())
        });

        if let Some(bloom) = &self.bloom {
            bloom.add(hv);
        }

        match found {
            Some(InsertSlot::Existing(index)) => {
                let old = self.slots[index].replace(Slot::Occupied { hv, record });
                Ok(old.map(|(_, record)| record))
            }
            Some(InsertSlot::Vacant {
                index,
                reuses_tombstone,
            }) => {
                self.slots[index] = Slot::Occupied { hv, record };
                self.len += 1;
                if !reuses_tombstone {
                    self.occupied += 1;
                }
                Ok(None)
            }
            None => panic!(
                "closed table invariant violated: probe sequence exhausted ({} slots, {} occupied)",
                self.slots.len(),
                self.occupied
            ),
        }
    }

    fn find_index<Q>(&self, key: &Q) -> Option<usize>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        let hv = KeyOps::<Q>::hash(&self.ops, key);
        if let Some(bloom) = &self.bloom {
            if !bloom.test(hv) {
                return None;
            }
        }
        find_slot(&self.slots, hv, |r| {
            KeyOps::<Q>::key_eq(&self.ops, Borrow::borrow(r.key()), key)
        })
    }

    /// Calls `with_record` on the record whose key equals `key`.
    pub fn get_and<Q, F, R>(&self, key: &Q, with_record: F) -> Option<R>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
        F: FnOnce(&T) -> R,
    {
        let index = self.find_index(key)?;
        self.slots[index].record().map(with_record)
    }

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
        self.find_index(key).is_some()
    }

    /// Tombstones the slot of the record whose key equals `key` and returns
    /// the record to the caller. The removal listener is not called.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        let index = self.find_index(key)?;
        let (_, record) = self.slots[index].replace(Slot::Tombstone)?;
        self.len -= 1;
        Some(record)
    }

    /// Removes the record whose key equals `key` and passes it to the removal
    /// listener with [`RemovalCause::Explicit`].
    pub fn delete<Q>(&mut self, key: &Q) -> bool
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
}

impl<T, O, A> Drop for ClosedTable<T, O, A>
where
    A: AllocStrategy,
{
    fn drop(&mut self) {
        let records = self.drain_all();
        self.notifier.notify_all(records, RemovalCause::Dropped);
    }
}

impl<'a, T, O, A> IntoIterator for &'a ClosedTable<T, O, A>
where
    A: AllocStrategy,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, O, A> fmt::Debug for ClosedTable<T, O, A>
where
    T: fmt::Debug,
    A: AllocStrategy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
