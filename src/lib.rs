#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! Generic hash tables with pluggable hashing, locking and allocation.
//!
//! `hashtab` provides two table backends that store records of any type
//! implementing [`Record`]:
//!
//! - [`ChainedTable`]: separate chaining with a table-wide resize lock and one
//!   lock per bucket. Buckets are doubled when a chain gets too long, and
//!   concurrent resize requests are coalesced with a generation counter.
//!   Automatic growth switches itself off when resizing stops shortening the
//!   chains.
//! - [`ClosedTable`]: open addressing with records stored inline and
//!   triangular probing, rehashed at a 77% load factor.
//!   [`ConcurrentClosedTable`] puts one behind a read-write lock.
//!
//! Keys are hashed and compared through a [`KeyOps`] value chosen at
//! construction time. Ready-made ops cover `Hash + Eq` keys ([`HashOps`]),
//! string keys with an optional byte filter ([`StrOps`]), and integer keys
//! hashed by value ([`IdentityOps`]). The crate also ships streaming
//! implementations of Murmur3 ([`Murmur3`]), Jenkins lookup3 ([`Jenkins`]) and
//! one-at-a-time ([`OneAtATime`]), and xxHash32 ([`XxHash32`]).
//!
//! Tables can carry an optional bloom filter that rejects lookups for absent
//! keys, and a removal listener that receives every record the table
//! discards.
//!
//! # Example
//!
//! ```rust
//! use hashtab::{ChainedTable, IdentityOps, RwLocks};
//!
//! use std::sync::Arc;
//! use std::thread;
//!
//! type Table = ChainedTable<(u32, String), IdentityOps, RwLocks>;
//!
//! let table = Arc::new(Table::builder().bloom_filter(12).build(IdentityOps));
//!
//! let handles: Vec<_> = (0..4u32)
//!     .map(|t| {
//!         let table = Arc::clone(&table);
//!         thread::spawn(move || {
//!             for i in 0..250 {
//!                 let key = t * 1000 + i;
//!                 table.insert((key, format!("value {key}"))).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(table.len(), 1000);
//! assert_eq!(
//!     table.get_and(&3042, |(_, v)| v.clone()),
//!     Some("value 3042".to_string())
//! );
//!
//! // Drop every record with an odd key.
//! assert_eq!(table.retain(|(k, _)| k % 2 == 0), 500);
//! ```
//!
//! # Crate features
//!
//! - `logging`: emits resize and listener events through the [`log`] crate.
//!   Log lines are prefixed with the table's name, if it has one.
//!
//! [`log`]: https://docs.rs/log

pub(crate) mod alloc;
pub(crate) mod bloom;
pub(crate) mod builder;
pub(crate) mod chained;
pub(crate) mod closed;
pub(crate) mod common;
pub(crate) mod error;
pub mod hash;
pub(crate) mod lock;
pub mod notification;
pub(crate) mod ops;
pub(crate) mod stats;

pub use crate::{
    alloc::{AllocStrategy, BoundedAlloc, SystemAlloc},
    bloom::MAX_BLOOM_BITS,
    builder::TableBuilder,
    chained::{ChainedTable, Iter as ChainedIter},
    closed::{ClosedTable, ConcurrentClosedTable, Iter as ClosedIter},
    error::TableError,
    hash::{
        BuildStreamHasher, Jenkins, Murmur3, OneAtATime, StreamHasher, StreamingHash, XxHash32,
    },
    lock::{BucketMutexes, LockStrategy, NoLock, RawMutexLock, RwLocks, SingleThreaded},
    notification::{RemovalCause, RemovalListener},
    ops::{ByteFilter, FnOps, HashOps, IdentityHash, IdentityOps, KeyOps, Record, StrOps},
    stats::{GrowthState, TableStats},
};
