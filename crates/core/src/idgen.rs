//! Monotonic ID generation

use std::sync::atomic::{self, AtomicU64};

/// Thread-safe monotonic ID generator
///
/// IDs are handed out in strictly increasing order, so sorting by ID
/// reproduces allocation order.
pub struct IdGenerator<T: Copy + Into<u64> + TryFrom<u64>> {
    next_id: AtomicU64,
    phantom: std::marker::PhantomData<T>,
}

impl<T: Copy + Into<u64> + TryFrom<u64>> IdGenerator<T> {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a generator whose first ID is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first),
            phantom: std::marker::PhantomData,
        }
    }

    /// Get the next available ID
    ///
    /// Values that do not fit `T` are skipped; returns `None` once the
    /// counter has run past the range of `T`.
    pub fn next_id(&self) -> Option<T> {
        let id = self.next_id.fetch_add(1, atomic::Ordering::Relaxed);
        T::try_from(id).ok()
    }
}

impl<T: Copy + Into<u64> + TryFrom<u64>> Default for IdGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TriggerId;

    #[test]
    fn test_id_generation() {
        let gen = IdGenerator::<u16>::new();
        let id1 = gen.next_id();
        let id2 = gen.next_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_ids_are_increasing() {
        let gen = IdGenerator::<TriggerId>::starting_at(5);
        let first = gen.next_id().unwrap();
        let second = gen.next_id().unwrap();
        assert_eq!(first, TriggerId::new(5));
        assert!(first < second);
    }

    #[test]
    fn test_exhausted_range() {
        let gen = IdGenerator::<u8>::starting_at(255);
        assert_eq!(gen.next_id(), Some(255));
        assert_eq!(gen.next_id(), None);
    }
}
