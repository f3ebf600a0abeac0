use super::bucket::{Bucket, ChainIter};
use crate::lock::LockStrategy;

use std::slice;

/// A lazy iterator over the records of a [`ChainedTable`][crate::ChainedTable].
///
/// Created by [`ChainedTable::iter`][crate::ChainedTable::iter]. It holds the
/// table mutably borrowed, so no lock is taken while iterating. Records are
/// visited bucket by bucket, and within a bucket from the most recently
/// inserted one.
pub struct Iter<'a, T, L: LockStrategy> {
    buckets: slice::IterMut<'a, Bucket<L::BucketLock, T>>,
    chain: Option<ChainIter<'a, T>>,
    remaining: usize,
}

impl<'a, T, L: LockStrategy> Iter<'a, T, L> {
    pub(crate) fn new(buckets: &'a mut [Bucket<L::BucketLock, T>], len: usize) -> Self {
        Self {
            buckets: buckets.iter_mut(),
            chain: None,
            remaining: len,
        }
    }
}

impl<'a, T, L: LockStrategy> Iterator for Iter<'a, T, L> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.chain.as_mut().and_then(Iterator::next) {
                self.remaining = self.remaining.saturating_sub(1);
                return Some(record);
            }
            let bucket = self.buckets.next()?;
            let chain: &'a _ = bucket.chain_mut();
            self.chain = Some(chain.iter());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T, L: LockStrategy> ExactSizeIterator for Iter<'a, T, L> {}

impl<'a, T, L: LockStrategy> std::iter::FusedIterator for Iter<'a, T, L> {}
