use super::ClosedTable;
use crate::{
    alloc::{AllocStrategy, SystemAlloc},
    builder::TableBuilder,
    error::TableError,
    lock::{LockStrategy, RwLocks},
    notification::{notifier::RemovalNotifier, RemovalCause},
    ops::{KeyOps, Record},
    stats::TableStats,
};

use std::{borrow::Borrow, fmt};

use parking_lot::lock_api::RwLock;

/// A [`ClosedTable`] behind one table-wide read-write lock.
///
/// Lookups and traversals share the lock; inserts, removals and rehashes take
/// it exclusively. The removal listener runs after the lock is released. Only
/// the `L::TableLock` type of the lock strategy is used.
pub struct ConcurrentClosedTable<T, O, L = RwLocks, A = SystemAlloc>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    inner: RwLock<L::TableLock, ClosedTable<T, O, A>>,
    notifier: RemovalNotifier<T>,
}

impl<T, O> ConcurrentClosedTable<T, O>
where
    T: Record,
    O: KeyOps<T::Key>,
{
    pub fn new(ops: O) -> Self {
        Self::with_alloc(ops, SystemAlloc)
    }
}

impl<T, O, L, A> ConcurrentClosedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    pub fn builder() -> TableBuilder<T, Self> {
        TableBuilder::default()
    }

    /// Wraps `table`. Its removal listener, if any, is taken over by the
    /// wrapper.
    pub(crate) fn from_table(mut table: ClosedTable<T, O, A>) -> Self {
        let notifier = std::mem::replace(&mut table.notifier, RemovalNotifier::new(None, None));
        Self {
            inner: RwLock::new(table),
            notifier,
        }
    }

    pub fn with_alloc(ops: O, alloc: A) -> Self {
        Self::from_table(ClosedTable::with_alloc(ops, alloc))
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.inner.read().num_buckets()
    }

    pub fn generation(&self) -> usize {
        self.inner.read().generation()
    }

    pub fn stats(&self) -> TableStats {
        self.inner.read().stats()
    }

    /// Calls `f` with every record while holding the lock shared. `f` must
    /// not modify this table.
    pub fn for_each(&self, f: impl FnMut(&T)) {
        self.inner.read().for_each(f)
    }

    pub fn fold<B, F>(&self, init: B, f: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        self.inner.read().fold(init, f)
    }

    /// Keeps only the records for which `keep` returns `true`, passing the
    /// others to the removal listener with [`RemovalCause::Filtered`].
    pub fn retain<F>(&self, keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut evicted = Vec::new();
        self.inner.write().retain_into(keep, &mut evicted);
        let count = evicted.len();
        self.notifier.notify_all(evicted, RemovalCause::Filtered);
        count
    }

    pub fn clear(&self) {
        let records = self.inner.write().drain_all();
        self.notifier.notify_all(records, RemovalCause::Cleared);
    }

    /// Doubles the slot array now.
    pub fn expand(&self) -> Result<(), TableError> {
        self.inner.write().expand()
    }
}

impl<T, O, L, A> ConcurrentClosedTable<T, O, L, A>
where
    T: Record,
    O: KeyOps<T::Key>,
    L: LockStrategy,
    A: AllocStrategy,
{
    /// Inserts a record, returning the one it replaced.
    pub fn insert(&self, record: T) -> Result<Option<T>, TableError> {
        self.inner.write().insert(record)
    }

    /// Calls `with_record` on the record whose key equals `key` while the
    /// lock is held shared.
    pub fn get_and<Q, F, R>(&self, key: &Q, with_record: F) -> Option<R>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
        F: FnOnce(&T) -> R,
    {
        self.inner.read().get_and(key, with_record)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<T>
    where
        T: Clone,
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        self.inner.read().get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        self.inner.read().contains_key(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        self.inner.write().remove(key)
    }

    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        O: KeyOps<Q>,
        Q: ?Sized,
    {
        let removed = self.inner.write().remove(key);
        match removed {
            Some(record) => {
                self.notifier.notify(record, RemovalCause::Explicit);
                true
            }
            None => false,
        }
    }
}

impl<T, O, L, A> Drop for ConcurrentClosedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    fn drop(&mut self) {
        let records = self.inner.get_mut().drain_all();
        self.notifier.notify_all(records, RemovalCause::Dropped);
    }
}

impl<T, O, L, A> fmt::Debug for ConcurrentClosedTable<T, O, L, A>
where
    L: LockStrategy,
    A: AllocStrategy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentClosedTable")
            .field("stats", &self.stats())
            .finish()
    }
}
