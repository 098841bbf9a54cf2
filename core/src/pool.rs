//! Reset-in-place containers for per-frame tables.
//!
//! A frame graph rebuilds its compile tables every frame. Dropping and
//! reallocating them each time shows up in profiles, so tables are *reset*
//! instead: their contents are cleared while `Vec` capacity (including the
//! capacity of nested per-entry lists) survives into the next frame.
//!
//! - [`Poolable`] describes a value that can be emptied without freeing.
//! - [`Pooled<T>`] tracks whether such a value currently holds live data.
//! - [`FrameTable<T>`] is an index-addressed table whose entries are reused
//!   slot by slot across frames.
//!
//! # Example
//!
//! ```
//! use redlilium_core::pool::{FrameTable, Poolable};
//!
//! #[derive(Debug, Default)]
//! struct Users {
//!     passes: Vec<u32>,
//! }
//!
//! impl Poolable for Users {
//!     fn new_empty() -> Self {
//!         Self::default()
//!     }
//!     fn reset(&mut self) {
//!         self.passes.clear();
//!     }
//! }
//!
//! let mut table = FrameTable::<Users>::new();
//! table.resize(2);
//! table[1].passes.extend_from_slice(&[3, 4, 5]);
//!
//! // Next frame: same slots, emptied, capacity kept.
//! table.resize(2);
//! assert!(table[1].passes.is_empty());
//! assert!(table[1].passes.capacity() >= 3);
//! ```

use std::ops::{Index, IndexMut};

/// A value that can be emptied while keeping its allocations.
pub trait Poolable {
    /// Create an empty instance.
    fn new_empty() -> Self;

    /// Clear the contents, keeping allocated capacity.
    ///
    /// Implementations call `Vec::clear()` rather than assigning a new `Vec`.
    fn reset(&mut self);
}

impl<T> Poolable for Vec<T> {
    fn new_empty() -> Self {
        Vec::new()
    }

    fn reset(&mut self) {
        self.clear();
    }
}

// ============================================================================
// Pooled
// ============================================================================

/// A poolable value tagged with whether it currently holds live data.
///
/// Unlike `Option<T>`, releasing keeps the value (and its capacity) around,
/// so the next [`activate`](Self::activate) is allocation-free.
#[derive(Debug)]
pub enum Pooled<T: Poolable> {
    /// Holds data for the current frame.
    Active(T),
    /// Emptied and waiting for reuse.
    Pooled(T),
}

impl<T: Poolable> Pooled<T> {
    /// Wrap a value that already holds live data.
    pub fn new(value: T) -> Self {
        Self::Active(value)
    }

    /// True when the value holds live data.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// True when the value has been released.
    pub fn is_pooled(&self) -> bool {
        matches!(self, Self::Pooled(_))
    }

    /// The live value, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Active(value) => Some(value),
            Self::Pooled(_) => None,
        }
    }

    /// The live value, mutably, if any.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Active(value) => Some(value),
            Self::Pooled(_) => None,
        }
    }

    /// Reset the value and mark it pooled. No-op when already pooled.
    pub fn release(&mut self) {
        if let Self::Active(value) = self {
            value.reset();
            self.swap_state();
        }
    }

    /// Mark the value active and hand it out for filling.
    ///
    /// A pooled value comes back empty; an active value is returned as is.
    pub fn activate(&mut self) -> &mut T {
        if self.is_pooled() {
            self.swap_state();
        }
        self.inner_mut()
    }

    /// The wrapped value regardless of state.
    pub fn inner(&self) -> &T {
        match self {
            Self::Active(value) | Self::Pooled(value) => value,
        }
    }

    /// The wrapped value, mutably, regardless of state.
    pub fn inner_mut(&mut self) -> &mut T {
        match self {
            Self::Active(value) | Self::Pooled(value) => value,
        }
    }

    // `T::new_empty()` is a placeholder only; for `Vec`-backed types it does
    // not allocate.
    fn swap_state(&mut self) {
        let placeholder = Self::Pooled(T::new_empty());
        *self = match std::mem::replace(self, placeholder) {
            Self::Active(value) => Self::Pooled(value),
            Self::Pooled(value) => Self::Active(value),
        };
    }
}

impl<T: Poolable> Default for Pooled<T> {
    fn default() -> Self {
        Self::Pooled(T::new_empty())
    }
}

// ============================================================================
// FrameTable
// ============================================================================

/// An index-addressed table whose entries are recycled across frames.
///
/// Entries past [`len`](Self::len) stay allocated so that growing the table
/// back to last frame's size reuses them instead of constructing new ones.
#[derive(Debug)]
pub struct FrameTable<T: Poolable> {
    entries: Vec<T>,
    len: usize,
}

impl<T: Poolable> FrameTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no entry is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of entries kept allocated, live or not.
    pub fn retained(&self) -> usize {
        self.entries.len()
    }

    /// Reset every live entry and make the table empty.
    pub fn clear(&mut self) {
        for entry in &mut self.entries[..self.len] {
            entry.reset();
        }
        self.len = 0;
    }

    /// Make exactly `len` entries live, all of them freshly reset.
    pub fn resize(&mut self, len: usize) {
        self.clear();
        while self.entries.len() < len {
            self.entries.push(T::new_empty());
        }
        self.len = len;
    }

    /// Append a reset entry and return it.
    pub fn push_empty(&mut self) -> &mut T {
        if self.len == self.entries.len() {
            self.entries.push(T::new_empty());
        }
        self.len += 1;
        &mut self.entries[self.len - 1]
    }

    /// Live entry at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Live entry at `index`, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Live entries as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.entries[..self.len]
    }

    /// Live entries as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.entries[..self.len]
    }

    /// Iterate over live entries.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Iterate mutably over live entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: Poolable> Default for FrameTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Poolable for FrameTable<T> {
    fn new_empty() -> Self {
        Self::new()
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl<T: Poolable> Index<usize> for FrameTable<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Poolable> IndexMut<usize> for FrameTable<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<'a, T: Poolable> IntoIterator for &'a FrameTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Users {
        passes: Vec<u32>,
        refcount: u32,
    }

    impl Poolable for Users {
        fn new_empty() -> Self {
            Self::default()
        }
        fn reset(&mut self) {
            self.passes.clear();
            self.refcount = 0;
        }
    }

    #[test]
    fn test_pooled_default_is_pooled() {
        let pooled = Pooled::<Users>::default();
        assert!(pooled.is_pooled());
        assert!(pooled.get().is_none());
    }

    #[test]
    fn test_pooled_release_keeps_capacity() {
        let mut pooled = Pooled::new(Users {
            passes: vec![1, 2, 3, 4],
            refcount: 2,
        });

        pooled.release();

        assert!(pooled.is_pooled());
        assert!(pooled.inner().passes.is_empty());
        assert_eq!(pooled.inner().refcount, 0);
        assert!(pooled.inner().passes.capacity() >= 4);
    }

    #[test]
    fn test_pooled_release_twice_is_noop() {
        let mut pooled = Pooled::<Users>::default();
        pooled.release();
        pooled.release();
        assert!(pooled.is_pooled());
    }

    #[test]
    fn test_pooled_activate_returns_empty_value() {
        let mut pooled = Pooled::new(Users {
            passes: vec![9; 16],
            refcount: 1,
        });
        pooled.release();
        let capacity = pooled.inner().passes.capacity();

        let users = pooled.activate();
        assert!(users.passes.is_empty());
        assert_eq!(users.passes.capacity(), capacity);
        users.passes.push(7);

        assert!(pooled.is_active());
        assert_eq!(pooled.get().map(|u| u.passes.clone()), Some(vec![7]));
    }

    #[test]
    fn test_pooled_activate_on_active_keeps_data() {
        let mut pooled = Pooled::new(Users {
            passes: vec![1],
            refcount: 0,
        });
        assert_eq!(pooled.activate().passes, vec![1]);
        pooled.get_mut().unwrap().refcount = 5;
        assert_eq!(pooled.get().unwrap().refcount, 5);
    }

    #[test]
    fn test_frame_table_resize_resets_entries() {
        let mut table = FrameTable::<Users>::new();
        table.resize(3);
        table[0].passes.push(1);
        table[2].refcount = 4;

        table.resize(3);
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|u| u.passes.is_empty() && u.refcount == 0));
    }

    #[test]
    fn test_frame_table_shrink_retains_entries() {
        let mut table = FrameTable::<Users>::new();
        table.resize(8);
        table[7].passes.extend_from_slice(&[1, 2, 3]);

        table.resize(2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.retained(), 8);
        assert!(table.get(7).is_none());

        // Growing again hands back the recycled slot, emptied.
        table.resize(8);
        assert!(table[7].passes.is_empty());
        assert!(table[7].passes.capacity() >= 3);
    }

    #[test]
    fn test_frame_table_push_empty_reuses_slots() {
        let mut table = FrameTable::<Vec<u32>>::new();
        table.push_empty().extend_from_slice(&[1, 2]);
        table.push_empty().push(3);
        assert_eq!(table.as_slice(), &[vec![1, 2], vec![3]]);

        table.clear();
        assert!(table.is_empty());
        let reused = table.push_empty();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 2);
        assert_eq!(table.retained(), 2);
    }

    #[test]
    fn test_frame_table_in_pooled() {
        let mut pooled = Pooled::<FrameTable<Users>>::default();
        pooled.activate().resize(4);
        assert_eq!(pooled.get().map(FrameTable::len), Some(4));

        pooled.release();
        assert!(pooled.inner().is_empty());
        assert_eq!(pooled.inner().retained(), 4);
    }
}
