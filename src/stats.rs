//! Table statistics.

/// The automatic growth state of a table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GrowthState {
    /// No resize is pending.
    #[default]
    Idle,
    /// A bucket or the load factor asked for a resize that has not completed
    /// yet.
    Requested,
    /// Automatic growth was switched off after consecutive resizes failed to
    /// shorten the chains. Only an explicit `expand` or a `clear` resizes the
    /// table from now on.
    Disabled,
    /// The last resize could not allocate its new array. Automatic growth
    /// resumes after an explicit `expand` succeeds or the table is cleared.
    Suspended,
}

impl GrowthState {
    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Requested => 1,
            Self::Disabled => 2,
            Self::Suspended => 3,
        }
    }

    pub(crate) const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Requested,
            2 => Self::Disabled,
            3 => Self::Suspended,
            _ => Self::Idle,
        }
    }

    /// Returns `true` unless automatic growth is disabled or suspended.
    pub fn can_grow(self) -> bool {
        matches!(self, Self::Idle | Self::Requested)
    }
}

/// A point-in-time snapshot of a table's layout and counters.
///
/// Values that do not apply to a backend are left at zero: closed tables have
/// no chains, and chained tables have no tombstones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    num_buckets: usize,
    log2_num_buckets: u32,
    num_items: usize,
    tombstones: usize,
    generation: usize,
    ideal_chain_maxlen: usize,
    nonideal_items: usize,
    longest_chain: usize,
    ineff_expands: u32,
    growth: GrowthState,
    bloom_bits_set: Option<u64>,
}

impl TableStats {
    pub(crate) fn set_layout(&mut self, num_buckets: usize, log2_num_buckets: u32) -> &mut Self {
        self.num_buckets = num_buckets;
        self.log2_num_buckets = log2_num_buckets;
        self
    }

    pub(crate) fn set_item_counts(&mut self, num_items: usize, tombstones: usize) -> &mut Self {
        self.num_items = num_items;
        self.tombstones = tombstones;
        self
    }

    pub(crate) fn set_chain_quality(
        &mut self,
        ideal_chain_maxlen: usize,
        nonideal_items: usize,
        longest_chain: usize,
    ) -> &mut Self {
        self.ideal_chain_maxlen = ideal_chain_maxlen;
        self.nonideal_items = nonideal_items;
        self.longest_chain = longest_chain;
        self
    }

    pub(crate) fn set_growth(
        &mut self,
        generation: usize,
        growth: GrowthState,
        ineff_expands: u32,
    ) -> &mut Self {
        self.generation = generation;
        self.growth = growth;
        self.ineff_expands = ineff_expands;
        self
    }

    pub(crate) fn set_bloom_bits_set(&mut self, bits: Option<u64>) -> &mut Self {
        self.bloom_bits_set = bits;
        self
    }

    /// Size of the backing array; zero before the first insert.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    pub fn log2_num_buckets(&self) -> u32 {
        self.log2_num_buckets
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Deleted slots not yet reclaimed by a resize (closed tables).
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Number of completed resizes.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// The ideal chain length computed by the last resize (chained tables).
    pub fn ideal_chain_maxlen(&self) -> usize {
        self.ideal_chain_maxlen
    }

    /// Records that landed in over-long chains during the last resize
    /// (chained tables).
    pub fn nonideal_items(&self) -> usize {
        self.nonideal_items
    }

    pub fn longest_chain(&self) -> usize {
        self.longest_chain
    }

    /// Consecutive resizes that left more than half of the records in
    /// over-long chains.
    pub fn ineff_expands(&self) -> u32 {
        self.ineff_expands
    }

    pub fn growth(&self) -> GrowthState {
        self.growth
    }

    /// Set bits of the bloom filter, if the table has one.
    pub fn bloom_bits_set(&self) -> Option<u64> {
        self.bloom_bits_set
    }

    /// Live items per bucket.
    pub fn load_factor(&self) -> f64 {
        if self.num_buckets == 0 {
            0.0
        } else {
            self.num_items as f64 / self.num_buckets as f64
        }
    }
}
