//! Index bookkeeping of the circular storage.
use serde::{Deserialize, Serialize};

/// Maps logical indices of a replay memory to physical slots.
///
/// Logical index `0` is the oldest record. In bounded mode records are written
/// at `size` until the storage is full, after which writes are refused. In
/// wrapping mode records are written at `top`; once full, every write evicts
/// the record at `bottom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingIndex {
    capacity: usize,
    bottom: usize,
    top: usize,
    size: usize,
    wrap: bool,
}

impl RingIndex {
    /// Creates an empty index.
    pub fn new(capacity: usize, wrap: bool) -> Self {
        Self {
            capacity,
            bottom: 0,
            top: 0,
            size: 0,
            wrap,
        }
    }

    /// Restores an index from persisted cursors.
    ///
    /// Returns `None` unless the cursors describe a state [`RingIndex::advance`]
    /// can reach: `bottom` stays at `0` until the storage is full, and `top`
    /// is always `size` slots past `bottom`.
    pub fn from_parts(
        capacity: usize,
        bottom: usize,
        top: usize,
        size: usize,
        wrap: bool,
    ) -> Option<Self> {
        if size > capacity {
            return None;
        }
        if wrap {
            if capacity == 0 {
                if bottom != 0 || top != 0 {
                    return None;
                }
            } else if bottom >= capacity
                || top >= capacity
                || top != (bottom + size) % capacity
                || (size < capacity && bottom != 0)
            {
                return None;
            }
        }
        Some(Self {
            capacity,
            bottom,
            top,
            size,
            wrap,
        })
    }

    /// Capacity of the storage.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid records.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Physical slot of the oldest record (wrapping mode).
    pub fn bottom(&self) -> usize {
        self.bottom
    }

    /// Physical slot of the next write (wrapping mode).
    pub fn top(&self) -> usize {
        self.top
    }

    /// Returns `true` in wrapping mode.
    pub fn is_wrapping(&self) -> bool {
        self.wrap
    }

    /// Returns `true` if `size == capacity`.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Reserves the slot of the next record and advances the cursors.
    ///
    /// Returns `None` if a bounded storage is full or the capacity is zero.
    pub fn advance(&mut self) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }

        if !self.wrap {
            if self.is_full() {
                return None;
            }
            let slot = self.size;
            self.size += 1;
            return Some(slot);
        }

        let slot = self.top;
        if self.is_full() {
            self.bottom = (self.bottom + 1) % self.capacity;
        } else {
            self.size += 1;
        }
        self.top = (self.top + 1) % self.capacity;
        Some(slot)
    }

    /// Physical slot of a logical index below [`RingIndex::size`].
    ///
    /// Callers check the range first; the slot of an index at or beyond the
    /// size is meaningless.
    pub(crate) fn slot(&self, logical: usize) -> usize {
        debug_assert!(logical < self.size, "index {} out of range", logical);
        if self.wrap {
            (self.bottom + logical) % self.capacity
        } else {
            logical
        }
    }

    /// Resolves a logical index into a physical slot.
    ///
    /// In bounded mode the mapping is the identity and indices at or beyond
    /// the capacity are refused. In wrapping mode indices are offset from
    /// `bottom` and taken modulo the capacity.
    pub fn physical_slot(&self, logical: usize) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }
        if self.wrap {
            Some((self.bottom + logical) % self.capacity)
        } else if logical < self.capacity {
            Some(logical)
        } else {
            None
        }
    }

    /// Shrinks the capacity to the current size (bounded mode only).
    pub(crate) fn shrink_to_size(&mut self) {
        debug_assert!(!self.wrap);
        self.capacity = self.size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_refuses_when_full() {
        let mut ix = RingIndex::new(3, false);
        assert_eq!(ix.advance(), Some(0));
        assert_eq!(ix.advance(), Some(1));
        assert_eq!(ix.advance(), Some(2));
        assert_eq!(ix.advance(), None);
        assert_eq!(ix.size(), 3);
        assert_eq!(ix.physical_slot(2), Some(2));
        assert_eq!(ix.physical_slot(3), None);
    }

    #[test]
    fn test_wrapping_evicts_oldest() {
        let mut ix = RingIndex::new(3, true);
        for _ in 0..3 {
            ix.advance();
        }
        assert!(ix.is_full());
        assert_eq!((ix.bottom(), ix.top()), (0, 0));

        assert_eq!(ix.advance(), Some(0));
        assert_eq!((ix.bottom(), ix.top(), ix.size()), (1, 1, 3));
        assert_eq!(ix.physical_slot(0), Some(1));
        assert_eq!(ix.physical_slot(2), Some(0));
        assert_eq!(ix.physical_slot(4), Some(2));
    }

    #[test]
    fn test_zero_capacity() {
        let mut ix = RingIndex::new(0, true);
        assert_eq!(ix.advance(), None);
        assert_eq!(ix.physical_slot(0), None);
    }

    #[test]
    fn test_from_parts() {
        assert!(RingIndex::from_parts(4, 1, 1, 4, true).is_some());
        assert!(RingIndex::from_parts(4, 0, 3, 3, true).is_some());
        assert!(RingIndex::from_parts(0, 0, 0, 0, true).is_some());
        assert!(RingIndex::from_parts(4, 0, 0, 5, false).is_none());
        assert!(RingIndex::from_parts(4, 4, 0, 4, true).is_none());
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_cursors() {
        // top must be size slots past bottom.
        assert!(RingIndex::from_parts(8, 0, 3, 8, true).is_none());
        assert!(RingIndex::from_parts(4, 1, 2, 4, true).is_none());
        // bottom only moves once the storage is full.
        assert!(RingIndex::from_parts(8, 2, 5, 3, true).is_none());
        assert!(RingIndex::from_parts(0, 1, 0, 0, true).is_none());
    }

    #[test]
    fn test_from_parts_matches_advance() {
        let mut ix = RingIndex::new(5, true);
        for _ in 0..13 {
            ix.advance();
            let restored =
                RingIndex::from_parts(ix.capacity(), ix.bottom(), ix.top(), ix.size(), true);
            assert_eq!(restored.as_ref(), Some(&ix));
        }
    }

    #[test]
    fn test_slot() {
        let mut ix = RingIndex::new(3, true);
        for _ in 0..4 {
            ix.advance();
        }
        assert_eq!((0..3).map(|i| ix.slot(i)).collect::<Vec<_>>(), vec![1, 2, 0]);

        let mut ix = RingIndex::new(3, false);
        ix.advance();
        ix.advance();
        assert_eq!(ix.slot(1), 1);
    }
}
