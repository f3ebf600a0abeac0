use std::mem;

/// One cell of a closed table's array. Records are stored inline.
pub(crate) enum Slot<T> {
    Empty,
    /// A deleted record. Lookups probe past it; inserts may reuse it.
    Tombstone,
    Occupied { hv: u32, record: T },
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T> Slot<T> {
    pub(crate) fn record(&self) -> Option<&T> {
        match self {
            Self::Occupied { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Replaces the slot with `replacement`, returning the record it held.
    pub(crate) fn replace(&mut self, replacement: Self) -> Option<(u32, T)> {
        match mem::replace(self, replacement) {
            Self::Occupied { hv, record } => Some((hv, record)),
            _ => None,
        }
    }
}

/// The triangular probe sequence `hv + (i² + i) / 2` for `i` in `0..len`,
/// masked to the array. For a power-of-two `len` it visits every slot exactly
/// once.
pub(crate) fn probe_seq(hv: u32, len: usize) -> impl Iterator<Item = usize> {
    debug_assert!(len.is_power_of_two());
    let mask = len - 1;
    let start = hv as usize & mask;
    (0..len).scan(start, move |idx, step| {
        let current = *idx;
        *idx = (*idx + step + 1) & mask;
        Some(current)
    })
}

/// Where a record with a given key goes.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertSlot {
    /// A slot holding a record with an equal key.
    Existing(usize),
    /// The first reusable slot on the probe sequence. `reuses_tombstone`
    /// tells whether it already counts as occupied.
    Vacant { index: usize, reuses_tombstone: bool },
}

/// Finds the slot for a record with hash `hv`. Returns `None` only when the
/// probe sequence holds neither a matching record nor a reusable slot.
pub(crate) fn find_insert_slot<T>(
    slots: &[Slot<T>],
    hv: u32,
    mut eq: impl FnMut(&T) -> bool,
) -> Option<InsertSlot> {
    let mut first_tombstone = None;

    for index in probe_seq(hv, slots.len()) {
        match &slots[index] {
            Slot::Empty => {
                return Some(match first_tombstone {
                    Some(index) => InsertSlot::Vacant {
                        index,
                        reuses_tombstone: true,
                    },
                    None => InsertSlot::Vacant {
                        index,
                        reuses_tombstone: false,
                    },
                })
            }
            Slot::Tombstone => {
                first_tombstone.get_or_insert(index);
            }
            Slot::Occupied { hv: h, record } => {
                if *h == hv && eq(record) {
                    return Some(InsertSlot::Existing(index));
                }
            }
        }
    }

    first_tombstone.map(|index| InsertSlot::Vacant {
        index,
        reuses_tombstone: true,
    })
}

/// Finds the occupied slot holding a record with hash `hv` that satisfies
/// `eq`. The search stops at the first empty slot.
pub(crate) fn find_slot<T>(
    slots: &[Slot<T>],
    hv: u32,
    mut eq: impl FnMut(&T) -> bool,
) -> Option<usize> {
    if slots.is_empty() {
        return None;
    }
    for index in probe_seq(hv, slots.len()) {
        match &slots[index] {
            Slot::Empty => return None,
            Slot::Tombstone => {}
            Slot::Occupied { hv: h, record } => {
                if *h == hv && eq(record) {
                    return Some(index);
                }
            }
        }
    }
    None
}

/// Places a record into a freshly allocated array that holds no tombstones
/// and no equal keys.
pub(crate) fn place<T>(slots: &mut [Slot<T>], hv: u32, record: T) -> Result<(), T> {
    for index in probe_seq(hv, slots.len()) {
        if let Slot::Empty = slots[index] {
            slots[index] = Slot::Occupied { hv, record };
            return Ok(());
        }
    }
    Err(record)
}

#[cfg(test)]
mod tests {
    use super::{find_insert_slot, find_slot, place, probe_seq, InsertSlot, Slot};

    #[test]
    fn probe_visits_every_slot_once() {
        for len in [1usize, 2, 8, 32, 1024] {
            for hv in [0u32, 5, 77, u32::MAX] {
                let mut seen: Vec<usize> = probe_seq(hv, len).collect();
                assert_eq!(seen.len(), len);
                seen.sort_unstable();
                seen.dedup();
                assert_eq!(seen.len(), len);
            }
        }
    }

    #[test]
    fn probe_steps_are_triangular() {
        let seq: Vec<usize> = probe_seq(3, 16).take(5).collect();
        // 3, 3+1, 3+3, 3+6, 3+10
        assert_eq!(seq, vec![3, 4, 6, 9, 13]);
    }

    #[test]
    fn insert_slot_prefers_the_first_tombstone() {
        let mut slots: Vec<Slot<u32>> = (0..8).map(|_| Slot::Empty).collect();
        slots[2] = Slot::Occupied { hv: 2, record: 10 };
        slots[3] = Slot::Tombstone;

        assert_eq!(
            find_insert_slot(&slots, 2, |r| *r == 99),
            Some(InsertSlot::Vacant {
                index: 3,
                reuses_tombstone: true
            })
        );
        assert_eq!(
            find_insert_slot(&slots, 2, |r| *r == 10),
            Some(InsertSlot::Existing(2))
        );
        assert_eq!(
            find_insert_slot(&slots, 6, |_| true),
            Some(InsertSlot::Vacant {
                index: 6,
                reuses_tombstone: false
            })
        );
    }

    #[test]
    fn lookups_skip_tombstones_and_stop_at_empty() {
        let mut slots: Vec<Slot<u32>> = (0..8).map(|_| Slot::Empty).collect();
        // hv 1 probes 1, 2, 4, 7, ...
        slots[1] = Slot::Tombstone;
        slots[2] = Slot::Occupied { hv: 1, record: 7 };
        assert_eq!(find_slot(&slots, 1, |r| *r == 7), Some(2));

        slots[2] = Slot::Empty;
        slots[4] = Slot::Occupied { hv: 1, record: 7 };
        assert_eq!(find_slot(&slots, 1, |r| *r == 7), None);
    }

    #[test]
    fn full_arrays_reject_placement() {
        let mut slots: Vec<Slot<u32>> = (0..2).map(|_| Slot::Empty).collect();
        assert!(place(&mut slots, 0, 1).is_ok());
        assert!(place(&mut slots, 0, 2).is_ok());
        assert_eq!(place(&mut slots, 0, 3), Err(3));
        assert_eq!(find_insert_slot(&slots, 0, |_| false), None);
    }
}
