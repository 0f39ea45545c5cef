// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity ring of chronologically ordered entries.
//!
//! # Layout
//!
//! Entries live in a boxed slice of `Option<T>` slots. The occupied range is
//! described by `head` (physical index of the oldest entry) and `len`. Logical
//! index `i` (0 = oldest) maps to physical slot `(head + i) % capacity`.
//!
//! # Insert
//!
//! While below capacity, `add` writes the slot just past the newest entry.
//! Once full, it overwrites the oldest slot and advances `head`: the
//! overwritten entry is dropped without notification.
//!
//! # Validity scans
//!
//! `iter_valid`, `iterate_valid` and `compact` locate the first valid entry
//! with a binary search. The predicate MUST be monotonic over oldest to
//! newest: once it holds for an entry it holds for every newer one (the TTL
//! check "not yet expired" has this shape). A non-monotonic predicate yields
//! an arbitrary split point.
//!
//! # Compaction
//!
//! Expired entries are always the oldest ones, so compaction releases the
//! `k` slots before the first valid index and advances `head` by `k`.
//! Surviving entries never move, whether or not the valid range wraps past
//! the end of the slice.

use std::fmt;
use std::iter::FusedIterator;

/// A fixed-capacity ring buffer that keeps entries in insertion order.
///
/// Capacity `0` disables the buffer: `add` is a no-op and it stays empty.
pub struct OrderedRingBuffer<T> {
    slots: Box<[Option<T>]>,
    /// Physical index of the oldest entry.
    head: usize,
    /// Number of occupied slots.
    len: usize,
}

impl<T> OrderedRingBuffer<T> {
    /// Creates an empty ring holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next `add` will overwrite the oldest entry.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends `item` as the newest entry, overwriting the oldest one when full.
    pub fn add(&mut self, item: T) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        if self.len < capacity {
            let index = self.physical(self.len);
            self.slots[index] = Some(item);
            self.len += 1;
        } else {
            self.slots[self.head] = Some(item);
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Returns the entry at logical index `index` (0 = oldest).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    /// Logical index of the first entry satisfying the monotonic predicate
    /// `is_valid`, or `len()` when none does.
    pub fn first_valid_index(&self, mut is_valid: impl FnMut(&T) -> bool) -> usize {
        let (mut low, mut high) = (0, self.len);
        while low < high {
            let mid = low + (high - low) / 2;
            if is_valid(self.at(mid)) {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        low
    }

    /// Iterates from the oldest to the newest entry.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            front: 0,
            back: self.len,
        }
    }

    /// Iterates from the first entry satisfying the monotonic predicate
    /// `is_valid` to the newest entry.
    pub fn iter_valid(&self, is_valid: impl FnMut(&T) -> bool) -> Iter<'_, T> {
        Iter {
            ring: self,
            front: self.first_valid_index(is_valid),
            back: self.len,
        }
    }

    /// Calls `visit` on every entry from the first one satisfying the
    /// monotonic predicate `is_valid` to the newest one, in order.
    pub fn iterate_valid(&self, is_valid: impl FnMut(&T) -> bool, visit: impl FnMut(&T)) {
        self.iter_valid(is_valid).for_each(visit);
    }

    /// Drops every entry older than the first one satisfying the monotonic
    /// predicate `is_valid`. Returns the number of dropped entries.
    pub fn compact(&mut self, is_valid: impl FnMut(&T) -> bool) -> usize {
        if self.len == 0 {
            return 0;
        }
        let expired = self.first_valid_index(is_valid);
        if expired == 0 {
            return 0;
        }
        for logical in 0..expired {
            let index = self.physical(logical);
            self.slots[index] = None;
        }
        self.len -= expired;
        self.head = if self.len == 0 {
            0
        } else {
            self.physical(expired)
        };
        expired
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }

    fn physical(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity()
    }

    fn at(&self, logical: usize) -> &T {
        let index = self.physical(logical);
        match &self.slots[index] {
            Some(item) => item,
            None => unreachable!(
                "ring slot {index} inside the occupied range is empty (head={}, len={})",
                self.head, self.len
            ),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedRingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("entries", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a OrderedRingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a logical range of an [`OrderedRingBuffer`].
pub struct Iter<'a, T> {
    ring: &'a OrderedRingBuffer<T>,
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.ring.at(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.ring.at(self.back))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::OrderedRingBuffer;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn dump(ring: &OrderedRingBuffer<i32>) -> Vec<i32> {
        ring.iter().copied().collect()
    }

    fn dump_valid(ring: &OrderedRingBuffer<i32>, is_valid: impl Fn(&i32) -> bool) -> Vec<i32> {
        let mut acc = Vec::new();
        ring.iterate_valid(is_valid, |n| acc.push(*n));
        acc
    }

    fn filled(capacity: usize, items: impl IntoIterator<Item = i32>) -> OrderedRingBuffer<i32> {
        let mut ring = OrderedRingBuffer::new(capacity);
        for item in items {
            ring.add(item);
        }
        ring
    }

    #[test]
    fn overwrites_oldest_once_full() {
        let mut ring = filled(5, 1..=10);
        assert_eq!(ring.len(), 5);
        assert!(ring.is_full());
        assert_eq!(dump(&ring), vec![6, 7, 8, 9, 10]);

        ring.add(11);
        assert_eq!(dump(&ring), vec![7, 8, 9, 10, 11]);
        assert_eq!(dump_valid(&ring, |n| *n >= 9), vec![9, 10, 11]);
        assert_eq!(dump_valid(&ring, |n| *n >= 0), vec![7, 8, 9, 10, 11]);
        assert_eq!(dump_valid(&ring, |n| *n >= 11), vec![11]);
        assert!(dump_valid(&ring, |n| *n > 11).is_empty());
    }

    #[test]
    fn zero_capacity_stays_empty() {
        let mut ring = OrderedRingBuffer::new(0);
        ring.add(123);
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert!(dump(&ring).is_empty());
        assert!(dump_valid(&ring, |_| true).is_empty());
        assert_eq!(ring.compact(|_| false), 0);
        assert_eq!(ring.first_valid_index(|_| true), 0);
    }

    #[test]
    fn keeps_last_values_after_many_wraps() {
        let mut ring = OrderedRingBuffer::new(100);
        for n in 0..100_000 {
            ring.add(n);
        }
        let values = dump(&ring);
        assert_eq!(values, (99_900..100_000).collect::<Vec<_>>());
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn compact_keeps_valid_suffix() {
        let mut ring = filled(100, 1..=102);
        assert_eq!(ring.compact(|n| *n > 95), 93);
        assert_eq!(dump(&ring), vec![96, 97, 98, 99, 100, 101, 102]);

        assert_eq!(ring.compact(|_| true), 0);
        assert_eq!(ring.len(), 7, "always valid shouldn't clear anything");
        assert_eq!(ring.compact(|_| false), 7);
        assert_eq!(ring.len(), 0, "nothing valid should empty the ring");
        assert_eq!(ring.compact(|_| true), 0, "compacting an empty ring is a no-op");
        assert!(ring.is_empty());
    }

    #[test]
    fn compact_across_wrap_point() {
        // Physical layout after 7 adds: [6, 7, 3, 4, 5] with head at 2.
        let mut ring = filled(5, 1..=7);
        assert!(ring.is_full());
        assert_eq!(ring.compact(|n| *n >= 5), 2);
        assert_eq!(dump(&ring), vec![5, 6, 7]);

        // Appending after a wrapped compaction keeps the order intact.
        for n in 8..=11 {
            ring.add(n);
        }
        assert_eq!(dump(&ring), vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn compact_full_ring_without_wrap() {
        let mut ring = filled(5, 1..=5);
        assert!(ring.is_full());
        assert_eq!(ring.compact(|n| *n >= 2), 1);
        assert_eq!(dump(&ring), vec![2, 3, 4, 5]);
        ring.add(6);
        ring.add(7);
        assert_eq!(dump(&ring), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn compact_partially_filled_ring() {
        let mut ring = filled(5, 1..=3);
        assert_eq!(ring.compact(|n| *n >= 3), 2);
        assert_eq!(dump(&ring), vec![3]);
        ring.add(4);
        assert_eq!(ring.get(0), Some(&3));
        assert_eq!(ring.get(1), Some(&4));
        assert_eq!(ring.get(2), None);
    }

    #[test]
    fn iterator_is_exact_and_reversible() {
        let ring = filled(4, 1..=6);
        let iter = ring.iter_valid(|n| *n >= 4);
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.rev().copied().collect::<Vec<_>>(), vec![6, 5, 4]);
        assert_eq!((&ring).into_iter().count(), 4);
    }

    #[test]
    fn clear_resets_positions() {
        let mut ring = filled(3, 1..=5);
        ring.clear();
        assert!(ring.is_empty());
        ring.add(9);
        assert_eq!(dump(&ring), vec![9]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        CompactOlderThan(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => Just(Op::Add),
            1 => any::<u8>().prop_map(Op::CompactOlderThan),
        ]
    }

    proptest! {
        // The ring behaves like a bounded deque fed with increasing values and
        // trimmed from the front by monotonic thresholds.
        #[test]
        fn matches_bounded_deque_model(
            capacity in 0usize..12,
            ops in proptest::collection::vec(op(), 0..200),
        ) {
            let mut ring = OrderedRingBuffer::new(capacity);
            let mut model: VecDeque<u32> = VecDeque::new();
            let mut next = 0u32;
            for op in ops {
                match op {
                    Op::Add => {
                        ring.add(next);
                        if capacity > 0 {
                            if model.len() == capacity {
                                let _ = model.pop_front();
                            }
                            model.push_back(next);
                        }
                        next += 1;
                    }
                    Op::CompactOlderThan(back) => {
                        let threshold = next.saturating_sub(u32::from(back) % 16);
                        let before = model.len();
                        model.retain(|v| *v >= threshold);
                        let removed = ring.compact(|v| *v >= threshold);
                        prop_assert_eq!(removed, before - model.len());
                    }
                }
                prop_assert_eq!(ring.len(), model.len());
                prop_assert!(ring.iter().copied().eq(model.iter().copied()));
            }
        }
    }
}
