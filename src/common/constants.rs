/// Number of buckets (chained) or slots (closed) allocated by the first
/// insert.
pub(crate) const DEFAULT_INITIAL_BUCKETS: usize = 32;

/// A chained bucket asks for growth when its chain reaches
/// `(expand_mult + 1) * BUCKET_CAPACITY_THRESHOLD` entries.
pub(crate) const BUCKET_CAPACITY_THRESHOLD: usize = 10;

/// Two consecutive resizes that leave more than half of the records in
/// over-long chains disable automatic growth.
pub(crate) const MAX_INEFFECTIVE_EXPANDS: u32 = 1;

// Closed tables grow once occupied slots (live and tombstoned) reach 77% of
// the slots.
pub(crate) const CLOSED_LOAD_NUMERATOR: usize = 77;
pub(crate) const CLOSED_LOAD_DENOMINATOR: usize = 100;
