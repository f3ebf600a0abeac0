//! Removal notifications.

pub(crate) mod notifier;

use std::sync::Arc;

/// A free callback invoked with every record a table discards.
///
/// The listener is called exactly once per discarded record, after the table
/// has released its locks, so it may safely use the table again.
pub type RemovalListener<T> = Arc<dyn Fn(T, RemovalCause) + Send + Sync + 'static>;

/// Indicates the reason why a record was removed from a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalCause {
    /// The record was deleted by `delete`.
    Explicit,
    /// The record was evicted by `retain` because the predicate rejected it.
    Filtered,
    /// The record was discarded by `clear`.
    Cleared,
    /// The record was still stored when the table was dropped.
    Dropped,
}

impl RemovalCause {
    pub fn name(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Filtered => "filtered",
            Self::Cleared => "cleared",
            Self::Dropped => "dropped",
        }
    }
}
