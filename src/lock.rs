//! Lock strategies.
//!
//! A chained table uses two tiers of locks: one table-wide lock, held shared
//! by every insert, lookup and removal and exclusively by a resize, and one
//! lock per bucket, held while a single chain is read or modified. A
//! [`LockStrategy`] names the raw lock type used for each tier. Locks are
//! created with the table (or with each bucket array) and destroyed with it.
//!
//! Raw locks are expressed with the [`lock_api`] traits re-exported by
//! `parking_lot`, so any `lock_api::RawRwLock` implementation can be plugged
//! in.
//!
//! [`lock_api`]: https://docs.rs/lock_api

use std::cell::Cell;

use parking_lot::lock_api::{GuardNoSend, RawMutex as RawMutexApi, RawRwLock};

/// Selects the raw lock types of a table.
pub trait LockStrategy {
    /// The table-wide resize lock.
    type TableLock: RawRwLock;

    /// The lock embedded in every bucket.
    type BucketLock: RawRwLock;
}

/// No locking at all.
///
/// Tables built with this strategy are not `Sync`, so they cannot be shared
/// between threads. This is the default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreaded;

impl LockStrategy for SingleThreaded {
    type TableLock = NoLock;
    type BucketLock = NoLock;
}

/// `parking_lot` read-write locks for both tiers.
///
/// Lookups on the same bucket proceed in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct RwLocks;

impl LockStrategy for RwLocks {
    type TableLock = parking_lot::RawRwLock;
    type BucketLock = parking_lot::RawRwLock;
}

/// A read-write table lock with plain mutexes for the buckets.
///
/// Bucket mutexes are smaller and cheaper to acquire than read-write locks,
/// at the price of serializing lookups that land in the same bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketMutexes;

impl LockStrategy for BucketMutexes {
    type TableLock = parking_lot::RawRwLock;
    type BucketLock = RawMutexLock;
}

/// A lock that never blocks, for tables confined to one thread.
///
/// It still tracks its state like a `RefCell` does, and panics on an acquire
/// that a real lock would have blocked on (for example, when a visitor
/// closure tries to insert into the table it is iterating). `NoLock` is not
/// `Sync`.
#[derive(Debug)]
pub struct NoLock {
    // > 0: number of shared holders, -1: held exclusively.
    state: Cell<isize>,
}

const EXCLUSIVE: isize = -1;

unsafe impl RawRwLock for NoLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = NoLock {
        state: Cell::new(0),
    };

    type GuardMarker = GuardNoSend;

    fn lock_shared(&self) {
        if !self.try_lock_shared() {
            panic!("single-threaded table is already locked exclusively");
        }
    }

    fn try_lock_shared(&self) -> bool {
        let state = self.state.get();
        if state == EXCLUSIVE {
            return false;
        }
        self.state.set(state + 1);
        true
    }

    unsafe fn unlock_shared(&self) {
        let state = self.state.get();
        debug_assert!(state > 0);
        self.state.set(state - 1);
    }

    fn lock_exclusive(&self) {
        if !self.try_lock_exclusive() {
            panic!("single-threaded table is already locked");
        }
    }

    fn try_lock_exclusive(&self) -> bool {
        if self.state.get() != 0 {
            return false;
        }
        self.state.set(EXCLUSIVE);
        true
    }

    unsafe fn unlock_exclusive(&self) {
        debug_assert_eq!(self.state.get(), EXCLUSIVE);
        self.state.set(0);
    }

    fn is_locked(&self) -> bool {
        self.state.get() != 0
    }
}

/// A `parking_lot` mutex presented through the read-write lock interface.
///
/// Shared acquisitions are exclusive.
pub struct RawMutexLock(parking_lot::RawMutex);

unsafe impl RawRwLock for RawMutexLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawMutexLock(<parking_lot::RawMutex as RawMutexApi>::INIT);

    type GuardMarker = <parking_lot::RawMutex as RawMutexApi>::GuardMarker;

    fn lock_shared(&self) {
        self.0.lock();
    }

    fn try_lock_shared(&self) -> bool {
        self.0.try_lock()
    }

    unsafe fn unlock_shared(&self) {
        self.0.unlock();
    }

    fn lock_exclusive(&self) {
        self.0.lock();
    }

    fn try_lock_exclusive(&self) -> bool {
        self.0.try_lock()
    }

    unsafe fn unlock_exclusive(&self) {
        self.0.unlock();
    }

    fn is_locked(&self) -> bool {
        self.0.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::{NoLock, RawMutexLock};

    use parking_lot::lock_api::RwLock;

    #[test]
    fn no_lock_allows_nested_readers() {
        let lock = RwLock::<NoLock, _>::new(5);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1 + *r2, 10);
        assert!(lock.try_write().is_none());
        drop((r1, r2));
        *lock.write() += 1;
        assert_eq!(*lock.read(), 6);
    }

    #[test]
    #[should_panic(expected = "already locked")]
    fn no_lock_panics_instead_of_deadlocking() {
        let lock = RwLock::<NoLock, _>::new(());
        let _reader = lock.read();
        let _writer = lock.write();
    }

    #[test]
    fn mutex_lock_is_exclusive_for_readers() {
        let lock = RwLock::<RawMutexLock, _>::new(0);
        let reader = lock.read();
        assert!(lock.try_read().is_none());
        drop(reader);
        assert!(lock.try_read().is_some());
    }
}
