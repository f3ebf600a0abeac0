use crate::common::constants::BUCKET_CAPACITY_THRESHOLD;

use std::mem;

use parking_lot::lock_api::{RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Link<T> = Option<Box<Entry<T>>>;

/// A stored record, its cached hash and the link to the next entry of the
/// same chain.
pub(crate) struct Entry<T> {
    pub(crate) record: T,
    pub(crate) hv: u32,
    next: Link<T>,
}

impl<T> Entry<T> {
    pub(crate) fn new(record: T, hv: u32) -> Box<Self> {
        Box::new(Self {
            record,
            hv,
            next: None,
        })
    }
}

/// A singly linked list of entries. The chain owns its head, and every entry
/// owns its successor.
pub(crate) struct Chain<T> {
    head: Link<T>,
    pub(crate) entries: usize,
    /// Skew factor set by the last resize for buckets that were already
    /// longer than the ideal chain length. It raises the length at which this
    /// bucket asks for another resize.
    pub(crate) expand_mult: usize,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self {
            head: None,
            entries: 0,
            expand_mult: 0,
        }
    }
}

impl<T> Chain<T> {
    /// Links `entry` in front of the chain.
    pub(crate) fn push_front(&mut self, mut entry: Box<Entry<T>>) {
        entry.next = self.head.take();
        self.head = Some(entry);
        self.entries += 1;
    }

    pub(crate) fn pop_front(&mut self) -> Option<Box<Entry<T>>> {
        let mut entry = self.head.take()?;
        self.head = entry.next.take();
        self.entries -= 1;
        Some(entry)
    }

    /// Reverses the order of the entries in place.
    pub(crate) fn reverse(&mut self) {
        let mut reversed: Link<T> = None;
        let mut next = self.head.take();
        while let Some(mut entry) = next {
            next = entry.next.take();
            entry.next = reversed;
            reversed = Some(entry);
        }
        self.head = reversed;
    }

    /// Returns `true` when the chain has grown long enough to ask for a
    /// resize.
    pub(crate) fn is_overloaded(&self) -> bool {
        self.entries >= (self.expand_mult + 1) * BUCKET_CAPACITY_THRESHOLD
    }

    /// Returns the first (most recently inserted) record with hash `hv` that
    /// satisfies `eq`.
    pub(crate) fn find(&self, hv: u32, mut eq: impl FnMut(&T) -> bool) -> Option<&T> {
        self.iter_entries()
            .find(|e| e.hv == hv && eq(&e.record))
            .map(|e| &e.record)
    }

    /// Unlinks and returns the first entry with hash `hv` that satisfies `eq`.
    pub(crate) fn unlink(
        &mut self,
        hv: u32,
        mut eq: impl FnMut(&T) -> bool,
    ) -> Option<Box<Entry<T>>> {
        let mut link = &mut self.head;
        loop {
            let matched = match link.as_deref() {
                None => return None,
                Some(entry) => entry.hv == hv && eq(&entry.record),
            };

            if matched {
                let mut entry = link.take()?;
                *link = entry.next.take();
                self.entries -= 1;
                return Some(entry);
            }

            link = &mut link.as_mut()?.next;
        }
    }

    /// Removes every record for which `keep` returns `false`, pushing them
    /// onto `evicted`. Returns the number of removed records.
    pub(crate) fn retain(
        &mut self,
        mut keep: impl FnMut(&T) -> bool,
        evicted: &mut Vec<T>,
    ) -> usize {
        let mut removed = 0;
        let mut link = &mut self.head;

        loop {
            let keep_this = match link.as_deref() {
                None => break,
                Some(entry) => keep(&entry.record),
            };

            if keep_this {
                match link {
                    Some(entry) => link = &mut entry.next,
                    None => break,
                }
            } else if let Some(mut entry) = link.take() {
                *link = entry.next.take();
                evicted.push(entry.record);
                removed += 1;
            }
        }

        self.entries -= removed;
        removed
    }

    /// Unlinks every entry, returning the records in chain order.
    pub(crate) fn drain_into(&mut self, records: &mut Vec<T>) {
        while let Some(entry) = self.pop_front() {
            records.push(entry.record);
        }
        self.expand_mult = 0;
    }

    pub(crate) fn iter(&self) -> ChainIter<'_, T> {
        ChainIter {
            next: self.head.as_deref(),
        }
    }

    fn iter_entries(&self) -> impl Iterator<Item = &Entry<T>> {
        std::iter::successors(self.head.as_deref(), |e| e.next.as_deref())
    }
}

// Drops the chain iteratively; the default recursive drop of a long chain
// could overflow the stack.
impl<T> Drop for Chain<T> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(mut entry) = next {
            next = entry.next.take();
        }
    }
}

/// Iterates the records of one chain, most recently inserted first.
pub(crate) struct ChainIter<'a, T> {
    next: Option<&'a Entry<T>>,
}

impl<'a, T> Iterator for ChainIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.next?;
        self.next = entry.next.as_deref();
        Some(&entry.record)
    }
}

/// One slot of the bucket array: a chain behind its own lock.
pub(crate) struct Bucket<BL, T> {
    chain: RwLock<BL, Chain<T>>,
}

impl<BL: RawRwLock, T> Bucket<BL, T> {
    pub(crate) fn new() -> Self {
        Self {
            chain: RwLock::new(Chain::default()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BL, Chain<T>> {
        self.chain.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, BL, Chain<T>> {
        self.chain.write()
    }

    /// Accesses the chain without locking. Requires exclusive access to the
    /// whole array.
    pub(crate) fn chain_mut(&mut self) -> &mut Chain<T> {
        self.chain.get_mut()
    }
}

/// Chain-quality statistics computed by a resize.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RehashOutcome {
    pub(crate) ideal_chain_maxlen: usize,
    pub(crate) nonideal_items: usize,
}

/// The bucket array of a chained table plus the statistics of the last
/// resize. It lives behind the table-wide resize lock.
pub(crate) struct BucketArray<BL, T> {
    /// Empty until the first insert allocates it.
    pub(crate) buckets: Box<[Bucket<BL, T>]>,
    pub(crate) log2_num_buckets: u32,
    pub(crate) ideal_chain_maxlen: usize,
    pub(crate) nonideal_items: usize,
    pub(crate) ineff_expands: u32,
}

impl<BL, T> Default for BucketArray<BL, T> {
    fn default() -> Self {
        Self {
            buckets: Box::default(),
            log2_num_buckets: 0,
            ideal_chain_maxlen: 0,
            nonideal_items: 0,
            ineff_expands: 0,
        }
    }
}

impl<BL: RawRwLock, T> BucketArray<BL, T> {
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    pub(crate) fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the bucket for hash `hv`, or `None` before the first
    /// allocation.
    #[inline]
    pub(crate) fn bucket(&self, hv: u32) -> Option<&Bucket<BL, T>> {
        if self.buckets.is_empty() {
            return None;
        }
        let mask = self.buckets.len() - 1;
        self.buckets.get(hv as usize & mask)
    }

    /// Installs the first bucket array.
    pub(crate) fn install(&mut self, buckets: Box<[Bucket<BL, T>]>) {
        debug_assert!(buckets.len().is_power_of_two());
        self.log2_num_buckets = buckets.len().trailing_zeros();
        self.buckets = buckets;
    }

    /// Moves every entry into `new_buckets` using its cached hash, installs
    /// the new array and returns the old one, which is left empty.
    ///
    /// `items` is the number of stored records. Buckets that end up longer
    /// than the ideal chain length get their `expand_mult` raised so that
    /// uniformly hot buckets do not immediately ask for another resize.
    pub(crate) fn rehash(
        &mut self,
        mut new_buckets: Box<[Bucket<BL, T>]>,
        items: usize,
    ) -> (Box<[Bucket<BL, T>]>, RehashOutcome) {
        let new_len = new_buckets.len();
        debug_assert!(new_len.is_power_of_two());
        let mask = new_len - 1;

        // ceil(items / new_len), never zero so that it can divide.
        let ideal_chain_maxlen = ((items + mask) >> new_len.trailing_zeros()).max(1);
        let mut nonideal_items = 0;

        for bucket in self.buckets.iter_mut() {
            let chain = bucket.chain_mut();
            // Oldest first, so that pushing to the front keeps newer records
            // ahead of older ones with the same hash.
            chain.reverse();
            while let Some(entry) = chain.pop_front() {
                let target = new_buckets[entry.hv as usize & mask].chain_mut();
                target.push_front(entry);
                if target.entries > ideal_chain_maxlen {
                    nonideal_items += 1;
                    target.expand_mult = target.entries / ideal_chain_maxlen;
                }
            }
        }

        self.log2_num_buckets = new_len.trailing_zeros();
        self.ideal_chain_maxlen = ideal_chain_maxlen;
        self.nonideal_items = nonideal_items;

        let old = mem::replace(&mut self.buckets, new_buckets);
        (
            old,
            RehashOutcome {
                ideal_chain_maxlen,
                nonideal_items,
            },
        )
    }

    /// Detaches the bucket array and resets the statistics, returning the
    /// table to its unallocated state.
    pub(crate) fn take(&mut self) -> Box<[Bucket<BL, T>]> {
        mem::take(self).buckets
    }
}

/// Unlinks every record of `buckets`.
pub(crate) fn drain_buckets<BL: RawRwLock, T>(buckets: &mut [Bucket<BL, T>]) -> Vec<T> {
    let mut records = Vec::new();
    for bucket in buckets {
        bucket.chain_mut().drain_into(&mut records);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::{Bucket, BucketArray, Chain, Entry};
    use crate::lock::NoLock;

    fn chain_of(values: &[u32]) -> Chain<u32> {
        let mut chain = Chain::default();
        for v in values {
            chain.push_front(Entry::new(*v, *v % 4));
        }
        chain
    }

    #[test]
    fn chains_are_lifo() {
        let chain = chain_of(&[1, 2, 3]);
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(chain.entries, 3);
    }

    #[test]
    fn find_checks_hash_and_predicate() {
        let chain = chain_of(&[1, 5, 2]);
        // 1 and 5 share hash 1; the most recent one wins.
        assert_eq!(chain.find(1, |_| true), Some(&5));
        assert_eq!(chain.find(1, |v| *v == 1), Some(&1));
        assert_eq!(chain.find(3, |_| true), None);
    }

    #[test]
    fn unlink_head_middle_and_tail() {
        let mut chain = chain_of(&[1, 2, 3, 4]);

        assert_eq!(chain.unlink(4 % 4, |v| *v == 4).map(|e| e.record), Some(4));
        assert_eq!(chain.unlink(2, |v| *v == 2).map(|e| e.record), Some(2));
        assert_eq!(chain.unlink(1, |v| *v == 1).map(|e| e.record), Some(1));
        assert!(chain.unlink(1, |v| *v == 1).is_none());

        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(chain.entries, 1);
    }

    #[test]
    fn retain_evicts_rejected_records() {
        let mut chain = chain_of(&[1, 2, 3, 4, 5, 6]);
        let mut evicted = Vec::new();

        assert_eq!(chain.retain(|v| v % 2 == 0, &mut evicted), 3);
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![6, 4, 2]);
        assert_eq!(evicted, vec![5, 3, 1]);
        assert_eq!(chain.entries, 3);
    }

    #[test]
    fn reverse_in_place() {
        let mut chain = chain_of(&[1, 2, 3]);
        chain.reverse();
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(chain.entries, 3);

        let mut empty = Chain::<u32>::default();
        empty.reverse();
        assert_eq!(empty.iter().count(), 0);
    }

    #[test]
    fn overload_threshold_scales_with_expand_mult() {
        let mut chain = chain_of(&[0; 9]);
        assert!(!chain.is_overloaded());
        chain.push_front(Entry::new(0, 0));
        assert!(chain.is_overloaded());

        chain.expand_mult = 1;
        assert!(!chain.is_overloaded());
    }

    #[test]
    fn long_chains_drop_without_recursion() {
        let mut chain = Chain::default();
        for v in 0..200_000u32 {
            chain.push_front(Entry::new(v, 0));
        }
        drop(chain);
    }

    #[test]
    fn rehash_splits_chains_and_tracks_skew() {
        let mut array = BucketArray::<NoLock, u32>::default();
        array.install((0..2).map(|_| Bucket::new()).collect());

        // Hashes 0..8 spread evenly over 4 buckets after the resize, while
        // eight records with hash 4 all land in bucket 0.
        for hv in 0..8u32 {
            array.bucket(hv).unwrap().write().push_front(Entry::new(hv, hv));
        }
        for i in 0..8u32 {
            array.bucket(4).unwrap().write().push_front(Entry::new(100 + i, 4));
        }

        let new_buckets = (0..4).map(|_| Bucket::new()).collect();
        let (old, outcome) = array.rehash(new_buckets, 16);

        assert_eq!(old.len(), 2);
        assert_eq!(array.num_buckets(), 4);
        assert_eq!(array.log2_num_buckets, 2);
        assert_eq!(outcome.ideal_chain_maxlen, 4);

        let lens: Vec<usize> = array.buckets.iter().map(|b| b.read().entries).collect();
        assert_eq!(lens, vec![10, 2, 2, 2]);
        // Bucket 0 went past the ideal length on its 5th..10th entries.
        assert_eq!(outcome.nonideal_items, 6);
        assert_eq!(array.buckets[0].read().expand_mult, 10 / 4);

        // Each bucket keeps its records newest first.
        let bucket0: Vec<u32> = array.buckets[0].read().iter().copied().collect();
        assert_eq!(bucket0, vec![107, 106, 105, 104, 103, 102, 101, 100, 4, 0]);
        let bucket1: Vec<u32> = array.buckets[1].read().iter().copied().collect();
        assert_eq!(bucket1, vec![5, 1]);
    }
}
