//! Allocation strategies for backing arrays.
//!
//! Tables allocate their bucket and slot arrays through an [`AllocStrategy`],
//! and hand every array back to the same strategy when it is replaced by a
//! resize or when the table is dropped. Allocation is fallible: a strategy
//! reports failure with [`TableError::AllocFailed`] instead of aborting the
//! process.

use crate::error::TableError;

use std::{
    mem,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Allocates and frees the backing arrays of a table.
pub trait AllocStrategy {
    /// Allocates an array of `len` cells, each initialized by `init`.
    fn alloc_array<C>(&self, len: usize, init: impl FnMut() -> C) -> Result<Box<[C]>, TableError>;

    /// Releases an array previously returned by `alloc_array`.
    fn free_array<C>(&self, array: Box<[C]>);
}

/// Size in bytes of an array of `len` cells of type `C`.
pub(crate) fn array_bytes<C>(len: usize) -> usize {
    len.saturating_mul(mem::size_of::<C>())
}

// Fills a fallibly reserved vector.
fn try_alloc<C>(len: usize, init: impl FnMut() -> C) -> Result<Box<[C]>, TableError> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| TableError::AllocFailed {
            bytes: array_bytes::<C>(len),
        })?;
    cells.extend(std::iter::repeat_with(init).take(len));
    Ok(cells.into_boxed_slice())
}

/// The platform allocator. This is the default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAlloc;

impl AllocStrategy for SystemAlloc {
    fn alloc_array<C>(&self, len: usize, init: impl FnMut() -> C) -> Result<Box<[C]>, TableError> {
        try_alloc(len, init)
    }

    fn free_array<C>(&self, array: Box<[C]>) {
        drop(array);
    }
}

/// The platform allocator with a byte budget.
///
/// Allocations that would push the bytes in use over the limit fail with
/// [`TableError::AllocFailed`]. The budget covers backing arrays only; records
/// stored in chained tables are allocated separately.
#[derive(Debug)]
pub struct BoundedAlloc {
    limit: usize,
    in_use: AtomicUsize,
}

impl BoundedAlloc {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: AtomicUsize::default(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently held by arrays allocated from this strategy.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    fn reserve(&self, bytes: usize) -> Result<(), TableError> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            let next = current
                .checked_add(bytes)
                .filter(|next| *next <= self.limit)
                .ok_or(TableError::AllocFailed { bytes })?;

            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

impl AllocStrategy for BoundedAlloc {
    fn alloc_array<C>(&self, len: usize, init: impl FnMut() -> C) -> Result<Box<[C]>, TableError> {
        let bytes = array_bytes::<C>(len);
        self.reserve(bytes)?;
        try_alloc(len, init).map_err(|e| {
            self.in_use.fetch_sub(bytes, Ordering::AcqRel);
            e
        })
    }

    fn free_array<C>(&self, array: Box<[C]>) {
        let bytes = array_bytes::<C>(array.len());
        drop(array);
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Shares one strategy between several tables.
impl<A: AllocStrategy> AllocStrategy for Arc<A> {
    fn alloc_array<C>(&self, len: usize, init: impl FnMut() -> C) -> Result<Box<[C]>, TableError> {
        (**self).alloc_array(len, init)
    }

    fn free_array<C>(&self, array: Box<[C]>) {
        (**self).free_array(array)
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocStrategy, BoundedAlloc, SystemAlloc};
    use crate::error::TableError;

    #[test]
    fn system_alloc_initializes_every_cell() {
        let mut next = 0;
        let array = SystemAlloc
            .alloc_array(8, || {
                next += 1;
                next
            })
            .unwrap();
        assert_eq!(&*array, &[1, 2, 3, 4, 5, 6, 7, 8]);
        SystemAlloc.free_array(array);
    }

    #[test]
    fn system_alloc_reports_impossible_sizes() {
        let result = SystemAlloc.alloc_array(usize::MAX / 2, || 0u64);
        assert!(matches!(result, Err(TableError::AllocFailed { .. })));
    }

    #[test]
    fn bounded_alloc_tracks_and_limits_usage() {
        let alloc = BoundedAlloc::new(64);

        let a = alloc.alloc_array(4, || 0u64).unwrap();
        assert_eq!(alloc.in_use(), 32);

        let b = alloc.alloc_array(4, || 0u64).unwrap();
        assert_eq!(alloc.in_use(), 64);

        assert_eq!(
            alloc.alloc_array(1, || 0u64),
            Err(TableError::AllocFailed { bytes: 8 })
        );
        assert_eq!(alloc.in_use(), 64);

        alloc.free_array(a);
        alloc.free_array(b);
        assert_eq!(alloc.in_use(), 0);
    }
}
