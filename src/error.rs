/// The error type for operations that allocate a table's backing array.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The backing array could not be allocated. The table is unchanged and
    /// the record passed to the failed operation was not stored.
    #[error("failed to allocate a backing array of {bytes} bytes")]
    AllocFailed {
        /// Size of the requested allocation.
        bytes: usize,
    },

    /// The record was stored, but the resize it triggered could not allocate
    /// the larger array.
    ///
    /// The table keeps working on its current array. Automatic growth stays
    /// suspended until a call to [`ChainedTable::expand`] succeeds.
    ///
    /// [`ChainedTable::expand`]: crate::ChainedTable::expand
    #[error(
        "record stored, but growing the table failed to allocate {bytes} bytes; \
    automatic growth is suspended until the table is expanded explicitly"
    )]
    GrowthFailed {
        /// Size of the requested allocation.
        bytes: usize,
    },
}

impl TableError {
    /// Returns the size of the allocation that failed.
    pub fn bytes(&self) -> usize {
        match self {
            Self::AllocFailed { bytes } | Self::GrowthFailed { bytes } => *bytes,
        }
    }
}
