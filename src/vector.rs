//! Persistent (immutable) vector with three-region buffering.
//!
//! This module provides [`PersistentVector`], an immutable sparse sequence
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentVector` partitions its slots across three contiguous buffers:
//!
//! - A *prefix* holding up to 32 slots before the body
//! - An unbounded *body*
//! - A *suffix* holding up to 32 slots after the body
//!
//! Logical index `i` resolves left to right: prefix slots first, then body
//! slots, then suffix slots. An edit copies only the buffer it touches and
//! shares the other two with the source vector, so prepends and appends
//! copy at most [`EDGE_CAPACITY`] slots. When an edit would grow an edge
//! buffer past its capacity, every slot is rebuilt into a fresh body with
//! empty edges, keeping the edge bounds intact for all reachable vectors.
//!
//! # Missing Values
//!
//! Positions are *slots* that either hold a value or are empty. Writing past
//! the end ([`PersistentVector::assoc`], [`PersistentVector::update`],
//! [`PersistentVector::insert`]) pads the gap with empty slots. Reads
//! normalize empty slots to `None`, and iteration yields `Option<&T>` so
//! empty slots stay visible to slot-level consumers.
//!
//! # Examples
//!
//! ```rust
//! use triptych::PersistentVector;
//!
//! let vector = PersistentVector::from(vec![1, 2, 3]);
//! let extended = vector.assoc(5, 9);
//!
//! assert_eq!(extended.len(), 6);
//! assert_eq!(extended.get(2), Some(&3));
//! assert_eq!(extended.get(3), None); // gap slot
//! assert_eq!(extended.get(5), Some(&9));
//!
//! // Structural sharing: the original vector is preserved
//! assert_eq!(vector.len(), 3);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::Sum;
use std::ops::{Add, Index};
use std::slice;

use smallvec::SmallVec;

use crate::ReferenceCounter;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of slots in each edge buffer (prefix and suffix).
///
/// An edit that would grow an edge buffer past this bound rebuilds every
/// slot into the body instead, leaving both edges empty.
pub const EDGE_CAPACITY: usize = 32;

// =============================================================================
// Buffer Definition and Helpers
// =============================================================================

/// A reference-counted run of slots shared between vector versions.
type Buffer<T> = ReferenceCounter<[Option<T>]>;

/// Creates an empty shared buffer.
fn empty_buffer<T>() -> Buffer<T> {
    ReferenceCounter::from(Vec::new())
}

/// Applies `function` to every present slot of one buffer, keeping empty
/// slots in place. `start` is the logical index of the buffer's first slot.
fn map_buffer<T, B, F>(buffer: &[Option<T>], start: usize, function: &mut F) -> Vec<Option<B>>
where
    F: FnMut(usize, &T) -> B,
{
    buffer
        .iter()
        .enumerate()
        .map(|(offset, slot)| slot.as_ref().map(|value| function(start + offset, value)))
        .collect()
}

/// Keeps the present slots of one buffer that satisfy `predicate`, dropping
/// empty slots entirely. `start` is the logical index of the buffer's first
/// slot.
fn filter_buffer<T: Clone, P>(buffer: &[Option<T>], start: usize, predicate: &mut P) -> Vec<Option<T>>
where
    P: FnMut(usize, &T) -> bool,
{
    buffer
        .iter()
        .enumerate()
        .filter_map(|(offset, slot)| {
            let value = slot.as_ref()?;
            if predicate(start + offset, value) {
                Some(Some(value.clone()))
            } else {
                None
            }
        })
        .collect()
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector backed by three contiguous slot buffers.
///
/// `PersistentVector` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns. Every
/// operation returns a new vector; the source is never modified.
///
/// # Time Complexity
///
/// | Operation                  | Complexity                                  |
/// |----------------------------|---------------------------------------------|
/// | `new`                      | O(1)                                        |
/// | `get`                      | O(1)                                        |
/// | `len` / `is_empty`         | O(1)                                        |
/// | `push_front` / `push_back` | O(32) edge copy, O(N) when the edge spills  |
/// | `update` / `assoc`         | O(B) where B is the touched buffer length   |
/// | `insert` / `dissoc`        | O(B) for an edge, O(N) for the body         |
/// | `append`                   | O(N + M)                                    |
/// | `iter`                     | O(1) to create, O(N) to iterate             |
///
/// # Examples
///
/// ```rust
/// use triptych::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// assert_eq!(vector.len(), 100);
/// assert_eq!(vector.get(50), Some(&50));
/// ```
pub struct PersistentVector<T> {
    /// Bounded edge buffer before the body (at most `EDGE_CAPACITY` slots)
    prefix: Buffer<T>,
    /// Unbounded middle buffer
    body: Buffer<T>,
    /// Bounded edge buffer after the body (at most `EDGE_CAPACITY` slots)
    suffix: Buffer<T>,
}

// The default (Rc) build is single-threaded; the arc feature swaps in Arc.
#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentVector<i32>: Send, Sync);
#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentVector<String>: Send, Sync);

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentVector<i32>: Send, Sync);
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentVector<String>: Send, Sync);

// =============================================================================
// Construction and Queries
// =============================================================================

impl<T> PersistentVector<T> {
    /// Creates a new empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::from_shared_buffers(empty_buffer(), empty_buffer(), empty_buffer())
    }

    /// Creates a vector containing a single value, stored in the body.
    ///
    /// # Arguments
    ///
    /// * `element` - The value to store in the vector
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::singleton(42);
    /// assert_eq!(vector.len(), 1);
    /// assert_eq!(vector.get(0), Some(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::from_shared_buffers(
            empty_buffer(),
            ReferenceCounter::from(vec![Some(element)]),
            empty_buffer(),
        )
    }

    /// Creates a vector from slots, preserving empty slots.
    ///
    /// All slots land in the body; both edge buffers start empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from_slots(vec![Some(1), None, Some(3)]);
    /// assert_eq!(vector.len(), 3);
    /// assert_eq!(vector.get(1), None);
    /// assert_eq!(vector.get(2), Some(&3));
    /// ```
    pub fn from_slots<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
    {
        let body: Vec<Option<T>> = slots.into_iter().collect();
        Self::from_shared_buffers(empty_buffer(), ReferenceCounter::from(body), empty_buffer())
    }

    /// Creates a vector from explicit prefix, body, and suffix buffers.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` or `suffix` holds more than [`EDGE_CAPACITY`] slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from_buffers(
    ///     vec![Some(1)],
    ///     vec![Some(2), None],
    ///     vec![Some(4)],
    /// );
    /// assert_eq!(vector.len(), 4);
    /// assert_eq!(vector.get(2), None);
    /// assert_eq!(vector.get(3), Some(&4));
    /// ```
    #[must_use]
    pub fn from_buffers(
        prefix: Vec<Option<T>>,
        body: Vec<Option<T>>,
        suffix: Vec<Option<T>>,
    ) -> Self {
        assert!(
            prefix.len() <= EDGE_CAPACITY,
            "prefix buffer holds {} slots, which exceeds the edge capacity of {EDGE_CAPACITY}",
            prefix.len()
        );
        assert!(
            suffix.len() <= EDGE_CAPACITY,
            "suffix buffer holds {} slots, which exceeds the edge capacity of {EDGE_CAPACITY}",
            suffix.len()
        );
        Self::from_shared_buffers(
            ReferenceCounter::from(prefix),
            ReferenceCounter::from(body),
            ReferenceCounter::from(suffix),
        )
    }

    /// Returns the number of slots in the vector, counting empty slots.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(4, 5);
    /// assert_eq!(vector.len(), 5);
    /// ```
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefix.len() + self.body.len() + self.suffix.len()
    }

    /// Returns `true` if the vector contains no slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let empty: PersistentVector<i32> = PersistentVector::new();
    /// assert!(empty.is_empty());
    ///
    /// let non_empty = PersistentVector::singleton(1);
    /// assert!(!non_empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `index` falls within the vector's bounds.
    ///
    /// An empty slot within bounds still counts as contained; only the
    /// vector's length decides membership.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(4, 5);
    /// assert!(vector.contains_index(3)); // empty slot, but within bounds
    /// assert!(!vector.contains_index(5));
    /// ```
    #[inline]
    #[must_use]
    pub fn contains_index(&self, index: usize) -> bool {
        index < self.len()
    }

    /// Returns a reference to the value at `index`.
    ///
    /// Returns `None` both for indices outside the bounds and for empty
    /// slots within them; callers that need to tell the two apart can pair
    /// this with [`contains_index`](Self::contains_index).
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(4, 5);
    /// assert_eq!(vector.get(0), Some(&1));
    /// assert_eq!(vector.get(2), None); // empty slot
    /// assert_eq!(vector.get(9), None); // out of bounds
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        let prefix_length = self.prefix.len();
        if index < prefix_length {
            return self.prefix[index].as_ref();
        }
        let body_end = prefix_length + self.body.len();
        if index < body_end {
            return self.body[index - prefix_length].as_ref();
        }
        self.suffix.get(index - body_end).and_then(|slot| slot.as_ref())
    }

    /// Returns a reference to the value in the first slot.
    ///
    /// A leading empty slot yields `None`, the same as an empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]);
    /// assert_eq!(vector.first(), Some(&1));
    ///
    /// let gappy: PersistentVector<i32> = PersistentVector::new().assoc(1, 9);
    /// assert_eq!(gappy.first(), None); // slot 0 is empty
    /// ```
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns a reference to the value in the last slot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]);
    /// assert_eq!(vector.last(), Some(&3));
    ///
    /// let empty: PersistentVector<i32> = PersistentVector::new();
    /// assert_eq!(empty.last(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Returns an iterator over the slots of the vector.
    ///
    /// The iterator yields `Option<&T>` so empty slots remain visible.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(3, 4);
    /// let slots: Vec<Option<&i32>> = vector.iter().collect();
    /// assert_eq!(slots, vec![Some(&1), Some(&2), None, Some(&4)]);
    /// ```
    #[inline]
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator::new(self)
    }

    /// Returns a reference to the first value satisfying `predicate`.
    ///
    /// Empty slots are skipped; the predicate only ever sees present values
    /// together with their logical index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 8, 3]);
    /// assert_eq!(vector.find(|_, value| value % 2 == 0), Some(&8));
    /// assert_eq!(vector.find(|index, _| index == 2), Some(&3));
    /// assert_eq!(vector.find(|_, value| *value > 10), None);
    /// ```
    pub fn find<P>(&self, mut predicate: P) -> Option<&T>
    where
        P: FnMut(usize, &T) -> bool,
    {
        for (index, slot) in self.iter().enumerate() {
            if let Some(value) = slot {
                if predicate(index, value) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Returns the index of the first value satisfying `predicate`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![10, 25, 30]);
    /// assert_eq!(vector.find_index(|_, value| value % 5 == 0 && *value > 10), Some(1));
    /// assert_eq!(vector.find_index(|_, value| *value > 99), None);
    /// ```
    pub fn find_index<P>(&self, mut predicate: P) -> Option<usize>
    where
        P: FnMut(usize, &T) -> bool,
    {
        for (index, slot) in self.iter().enumerate() {
            if let Some(value) = slot {
                if predicate(index, value) {
                    return Some(index);
                }
            }
        }
        None
    }

    /// Folds every slot into an accumulator, visiting empty slots as `None`.
    ///
    /// # Arguments
    ///
    /// * `initial` - The starting accumulator value
    /// * `function` - Combining function; receives the accumulator, the
    ///   logical index, and the slot at that index
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(3, 4);
    /// let sum = vector.fold(0, |accumulator, _, slot| {
    ///     accumulator + slot.copied().unwrap_or(0)
    /// });
    /// assert_eq!(sum, 7);
    /// ```
    pub fn fold<B, F>(&self, initial: B, mut function: F) -> B
    where
        F: FnMut(B, usize, Option<&T>) -> B,
    {
        let mut accumulator = initial;
        for (index, slot) in self.iter().enumerate() {
            accumulator = function(accumulator, index, slot);
        }
        accumulator
    }

    /// Calls `function` on every slot in order, passing empty slots as `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(3, 4);
    /// let mut seen = Vec::new();
    /// vector.for_each(|index, slot| seen.push((index, slot.copied())));
    /// assert_eq!(seen, vec![(0, Some(1)), (1, Some(2)), (2, None), (3, Some(4))]);
    /// ```
    pub fn for_each<F>(&self, mut function: F)
    where
        F: FnMut(usize, Option<&T>),
    {
        for (index, slot) in self.iter().enumerate() {
            function(index, slot);
        }
    }

    /// Transforms every present value with `function`, keeping empty slots
    /// empty.
    ///
    /// The result has the same length and the same buffer partitioning as
    /// the source.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]).assoc(4, 5);
    /// let doubled = vector.map(|_, value| value * 2);
    /// assert_eq!(doubled.len(), 5);
    /// assert_eq!(doubled.get(0), Some(&2));
    /// assert_eq!(doubled.get(3), None);
    /// assert_eq!(doubled.get(4), Some(&10));
    /// ```
    #[must_use]
    pub fn map<B, F>(&self, mut function: F) -> PersistentVector<B>
    where
        F: FnMut(usize, &T) -> B,
    {
        let prefix_length = self.prefix.len();
        let body_end = prefix_length + self.body.len();
        let prefix = map_buffer(&self.prefix, 0, &mut function);
        let body = map_buffer(&self.body, prefix_length, &mut function);
        let suffix = map_buffer(&self.suffix, body_end, &mut function);
        PersistentVector::from_shared_buffers(
            ReferenceCounter::from(prefix),
            ReferenceCounter::from(body),
            ReferenceCounter::from(suffix),
        )
    }

    /// Asserts the structural invariants of this vector.
    ///
    /// Checks that both edge buffers respect [`EDGE_CAPACITY`] and that
    /// iteration agrees with the reported length. Intended for tests and
    /// debugging.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    pub fn check_invariants(&self) {
        assert!(self.prefix.len() <= EDGE_CAPACITY);
        assert!(self.suffix.len() <= EDGE_CAPACITY);
        assert_eq!(self.iter().size_hint(), (self.len(), Some(self.len())));
        assert_eq!(self.iter().count(), self.len());
    }

    /// Assembles a vector from already-shared buffers.
    ///
    /// Every construction path funnels through here so the edge bounds are
    /// checked in one place.
    fn from_shared_buffers(prefix: Buffer<T>, body: Buffer<T>, suffix: Buffer<T>) -> Self {
        debug_assert!(prefix.len() <= EDGE_CAPACITY);
        debug_assert!(suffix.len() <= EDGE_CAPACITY);
        Self {
            prefix,
            body,
            suffix,
        }
    }
}

// =============================================================================
// Persistent Update Operations
// =============================================================================

impl<T: Clone> PersistentVector<T> {
    /// Creates a vector by cloning the values of a slice into the body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from_slice(&[1, 2, 3]);
    /// assert_eq!(vector.len(), 3);
    /// assert_eq!(vector.get(2), Some(&3));
    /// ```
    pub fn from_slice(values: &[T]) -> Self {
        Self::from_slots(values.iter().cloned().map(Some))
    }

    /// Returns a new vector with `element` prepended.
    ///
    /// Copies only the prefix while it has room; a full prefix triggers a
    /// rebuild of every slot into the body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![2, 3]).push_front(1);
    /// assert_eq!(vector.len(), 3);
    /// assert_eq!(vector.get(0), Some(&1));
    /// assert_eq!(vector.get(1), Some(&2));
    /// ```
    #[must_use]
    pub fn push_front(&self, element: T) -> Self {
        if self.is_empty() {
            return Self::singleton(element);
        }
        if self.prefix.len() < EDGE_CAPACITY {
            let mut new_prefix = Vec::with_capacity(self.prefix.len() + 1);
            new_prefix.push(Some(element));
            new_prefix.extend(self.prefix.iter().cloned());
            return Self::from_shared_buffers(
                ReferenceCounter::from(new_prefix),
                self.body.clone(),
                self.suffix.clone(),
            );
        }
        // Prefix is full: rebucket every slot into the body
        let mut slots = Vec::with_capacity(self.len() + 1);
        slots.push(Some(element));
        self.clone_slots_into(&mut slots);
        Self::from_slots(slots)
    }

    /// Returns a new vector with `element` appended.
    ///
    /// Copies only the suffix while it has room; a full suffix triggers a
    /// rebuild of every slot into the body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).push_back(3);
    /// assert_eq!(vector.len(), 3);
    /// assert_eq!(vector.last(), Some(&3));
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        if self.is_empty() {
            return Self::singleton(element);
        }
        if self.suffix.len() < EDGE_CAPACITY {
            let mut new_suffix = self.suffix.to_vec();
            new_suffix.push(Some(element));
            return Self::from_shared_buffers(
                self.prefix.clone(),
                self.body.clone(),
                ReferenceCounter::from(new_suffix),
            );
        }
        // Suffix is full: rebucket every slot into the body
        let mut slots = Vec::with_capacity(self.len() + 1);
        self.clone_slots_into(&mut slots);
        slots.push(Some(element));
        Self::from_slots(slots)
    }

    /// Returns a new vector with every value of `elements` appended in order.
    ///
    /// On an empty vector this builds a fresh body from the values. When the
    /// values fit into the suffix's remaining room they extend it; otherwise
    /// every slot is rebuilt into the body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::new().push_back_many(1..=33);
    /// assert_eq!(vector.len(), 33);
    /// assert_eq!(vector.get(0), Some(&1));
    /// assert_eq!(vector.get(32), Some(&33));
    /// ```
    #[must_use]
    pub fn push_back_many<I>(&self, elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let incoming: Vec<Option<T>> = elements.into_iter().map(Some).collect();
        if incoming.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return Self::from_slots(incoming);
        }
        if self.suffix.len() + incoming.len() <= EDGE_CAPACITY {
            let mut new_suffix = self.suffix.to_vec();
            new_suffix.extend(incoming);
            return Self::from_shared_buffers(
                self.prefix.clone(),
                self.body.clone(),
                ReferenceCounter::from(new_suffix),
            );
        }
        let mut slots = Vec::with_capacity(self.len() + incoming.len());
        self.clone_slots_into(&mut slots);
        slots.extend(incoming);
        Self::from_slots(slots)
    }

    /// Returns a new vector with `element` inserted before the slot at
    /// `index`, shifting later slots one position to the right.
    ///
    /// An index beyond the end pads the gap with empty slots and places the
    /// value at exactly `index`. Inserting into an edge buffer copies only
    /// that buffer; an edge pushed past its capacity triggers a rebuild of
    /// every slot into the body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 4]);
    /// let inserted = vector.insert(2, 3);
    /// assert_eq!(inserted.to_vec(), vec![Some(1), Some(2), Some(3), Some(4)]);
    ///
    /// let extended = vector.insert(5, 9);
    /// assert_eq!(extended.len(), 6);
    /// assert_eq!(extended.get(4), None);
    /// assert_eq!(extended.get(5), Some(&9));
    /// ```
    #[must_use]
    pub fn insert(&self, index: usize, element: T) -> Self {
        let prefix_length = self.prefix.len();
        let body_end = prefix_length + self.body.len();

        if index <= prefix_length {
            let mut new_prefix = self.prefix.to_vec();
            new_prefix.insert(index, Some(element));
            if new_prefix.len() <= EDGE_CAPACITY {
                return Self::from_shared_buffers(
                    ReferenceCounter::from(new_prefix),
                    self.body.clone(),
                    self.suffix.clone(),
                );
            }
            let mut slots = Vec::with_capacity(self.len() + 1);
            slots.extend(new_prefix);
            slots.extend(self.body.iter().cloned());
            slots.extend(self.suffix.iter().cloned());
            return Self::from_slots(slots);
        }

        if index < body_end {
            let mut new_body = self.body.to_vec();
            new_body.insert(index - prefix_length, Some(element));
            return Self::from_shared_buffers(
                self.prefix.clone(),
                ReferenceCounter::from(new_body),
                self.suffix.clone(),
            );
        }

        let local = index - body_end;
        let mut new_suffix = self.suffix.to_vec();
        if local <= new_suffix.len() {
            new_suffix.insert(local, Some(element));
        } else {
            // Writing past the end: pad the gap with empty slots
            new_suffix.resize_with(local, || None);
            new_suffix.push(Some(element));
        }
        if new_suffix.len() <= EDGE_CAPACITY {
            return Self::from_shared_buffers(
                self.prefix.clone(),
                self.body.clone(),
                ReferenceCounter::from(new_suffix),
            );
        }
        let mut slots = Vec::with_capacity(prefix_length + self.body.len() + new_suffix.len());
        slots.extend(self.prefix.iter().cloned());
        slots.extend(self.body.iter().cloned());
        slots.extend(new_suffix);
        Self::from_slots(slots)
    }

    /// Returns a new vector with the slot at `index` replaced by the result
    /// of `function`.
    ///
    /// The function receives the current slot: `Some(&value)` when a value
    /// is present, `None` for an empty slot or an index beyond the end. An
    /// index beyond the end pads the gap with empty slots, growing the
    /// vector to `index + 1` slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]);
    ///
    /// let incremented = vector.update(1, |slot| slot.copied().unwrap_or(0) + 1);
    /// assert_eq!(incremented.get(1), Some(&3));
    ///
    /// let extended = vector.update(5, |slot| slot.copied().unwrap_or(0) + 1);
    /// assert_eq!(extended.len(), 6);
    /// assert_eq!(extended.get(3), None);
    /// assert_eq!(extended.get(5), Some(&1));
    /// ```
    #[must_use]
    pub fn update<F>(&self, index: usize, function: F) -> Self
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let prefix_length = self.prefix.len();
        let body_end = prefix_length + self.body.len();

        if index < prefix_length {
            let mut new_prefix = self.prefix.to_vec();
            let updated = function(new_prefix[index].as_ref());
            new_prefix[index] = Some(updated);
            return Self::from_shared_buffers(
                ReferenceCounter::from(new_prefix),
                self.body.clone(),
                self.suffix.clone(),
            );
        }

        if index < body_end {
            let local = index - prefix_length;
            let mut new_body = self.body.to_vec();
            let updated = function(new_body[local].as_ref());
            new_body[local] = Some(updated);
            return Self::from_shared_buffers(
                self.prefix.clone(),
                ReferenceCounter::from(new_body),
                self.suffix.clone(),
            );
        }

        let local = index - body_end;
        if local < self.suffix.len() {
            let mut new_suffix = self.suffix.to_vec();
            let updated = function(new_suffix[local].as_ref());
            new_suffix[local] = Some(updated);
            return Self::from_shared_buffers(
                self.prefix.clone(),
                self.body.clone(),
                ReferenceCounter::from(new_suffix),
            );
        }

        // Beyond the end: the slot does not exist yet
        let filled = function(None);
        if local < EDGE_CAPACITY {
            let mut new_suffix = self.suffix.to_vec();
            new_suffix.resize_with(local, || None);
            new_suffix.push(Some(filled));
            return Self::from_shared_buffers(
                self.prefix.clone(),
                self.body.clone(),
                ReferenceCounter::from(new_suffix),
            );
        }
        let mut slots = Vec::with_capacity(index + 1);
        self.clone_slots_into(&mut slots);
        slots.resize_with(index, || None);
        slots.push(Some(filled));
        Self::from_slots(slots)
    }

    /// Returns a new vector with `element` stored at `index`.
    ///
    /// An index beyond the end pads the gap with empty slots, so the
    /// resulting vector always has at least `index + 1` slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]);
    ///
    /// let replaced = vector.assoc(1, 9);
    /// assert_eq!(replaced.get(1), Some(&9));
    ///
    /// let extended = vector.assoc(5, 9);
    /// assert_eq!(extended.len(), 6);
    /// assert_eq!(extended.get(4), None);
    /// assert_eq!(extended.get(5), Some(&9));
    /// ```
    #[must_use]
    pub fn assoc(&self, index: usize, element: T) -> Self {
        self.update(index, move |_| element)
    }

    /// Returns a new vector with the slot at `index` replaced by the result
    /// of `function`, or this vector unchanged when `index` is out of
    /// bounds.
    ///
    /// Within bounds the function still receives `None` for an empty slot,
    /// matching [`update`](Self::update).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]);
    ///
    /// let updated = vector.update_if_exists(1, |slot| slot.copied().unwrap_or(0) * 10);
    /// assert_eq!(updated.get(1), Some(&20));
    ///
    /// let unchanged = vector.update_if_exists(9, |slot| slot.copied().unwrap_or(0));
    /// assert_eq!(unchanged.len(), 3);
    /// assert_eq!(unchanged, vector);
    /// ```
    #[must_use]
    pub fn update_if_exists<F>(&self, index: usize, function: F) -> Self
    where
        F: FnOnce(Option<&T>) -> T,
    {
        if self.contains_index(index) {
            self.update(index, function)
        } else {
            self.clone()
        }
    }

    /// Returns a new vector with the slot at `index` removed, shifting later
    /// slots one position to the left.
    ///
    /// Removing from an edge buffer copies only that buffer; removing from
    /// the body copies only the body. An index out of bounds returns this
    /// vector unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3]);
    ///
    /// let removed = vector.dissoc(1);
    /// assert_eq!(removed.to_vec(), vec![Some(1), Some(3)]);
    ///
    /// let unchanged = vector.dissoc(10);
    /// assert_eq!(unchanged, vector);
    /// ```
    #[must_use]
    pub fn dissoc(&self, index: usize) -> Self {
        if !self.contains_index(index) {
            return self.clone();
        }
        let prefix_length = self.prefix.len();
        let body_end = prefix_length + self.body.len();

        if index < prefix_length {
            let mut new_prefix = self.prefix.to_vec();
            new_prefix.remove(index);
            return Self::from_shared_buffers(
                ReferenceCounter::from(new_prefix),
                self.body.clone(),
                self.suffix.clone(),
            );
        }

        if index < body_end {
            let mut new_body = self.body.to_vec();
            new_body.remove(index - prefix_length);
            return Self::from_shared_buffers(
                self.prefix.clone(),
                ReferenceCounter::from(new_body),
                self.suffix.clone(),
            );
        }

        let mut new_suffix = self.suffix.to_vec();
        new_suffix.remove(index - body_end);
        Self::from_shared_buffers(
            self.prefix.clone(),
            self.body.clone(),
            ReferenceCounter::from(new_suffix),
        )
    }

    /// Returns a new vector holding every slot of `self` followed by every
    /// slot of `other`.
    ///
    /// The combined slots are rebuilt into a fresh body with empty edges.
    /// Joining with an empty vector on either side shares the non-empty
    /// side's buffers instead of copying.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let left = PersistentVector::from(vec![1, 2]);
    /// let right = PersistentVector::from(vec![3]);
    /// let joined = left.append(&right);
    /// assert_eq!(joined.to_vec(), vec![Some(1), Some(2), Some(3)]);
    /// ```
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut slots = Vec::with_capacity(self.len() + other.len());
        self.clone_slots_into(&mut slots);
        other.clone_slots_into(&mut slots);
        Self::from_slots(slots)
    }

    /// Returns a new vector keeping only the present values that satisfy
    /// `predicate`.
    ///
    /// Empty slots are dropped, so the result is dense. Surviving values
    /// stay in their original buffer. When nothing is dropped the source
    /// buffers are shared instead of copied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2, 3, 4]).assoc(6, 9);
    /// let even = vector.filter(|_, value| value % 2 == 0);
    /// assert_eq!(even.to_vec(), vec![Some(2), Some(4)]);
    /// ```
    #[must_use]
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(usize, &T) -> bool,
    {
        let prefix_length = self.prefix.len();
        let body_end = prefix_length + self.body.len();
        let prefix = filter_buffer(&self.prefix, 0, &mut predicate);
        let body = filter_buffer(&self.body, prefix_length, &mut predicate);
        let suffix = filter_buffer(&self.suffix, body_end, &mut predicate);

        // Nothing dropped: share all three buffers with the source
        if prefix.len() == prefix_length
            && body.len() == self.body.len()
            && suffix.len() == self.suffix.len()
        {
            return self.clone();
        }

        Self::from_shared_buffers(
            ReferenceCounter::from(prefix),
            ReferenceCounter::from(body),
            ReferenceCounter::from(suffix),
        )
    }

    /// Copies every slot into a `Vec`, preserving empty slots as `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let vector = PersistentVector::from(vec![1, 2]).assoc(3, 4);
    /// assert_eq!(vector.to_vec(), vec![Some(1), Some(2), None, Some(4)]);
    /// ```
    #[must_use]
    pub fn to_vec(&self) -> Vec<Option<T>> {
        let mut slots = Vec::with_capacity(self.len());
        self.clone_slots_into(&mut slots);
        slots
    }

    /// Clones every slot of this vector onto the end of `target` in logical
    /// order.
    fn clone_slots_into(&self, target: &mut Vec<Option<T>>) {
        target.extend(self.prefix.iter().cloned());
        target.extend(self.body.iter().cloned());
        target.extend(self.suffix.iter().cloned());
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the slots of a [`PersistentVector`].
///
/// Yields `Option<&T>` for each slot in logical order, so empty slots stay
/// visible. Walks the prefix, body, and suffix buffers in turn; the pending
/// buffers wait in inline storage, so creating the iterator does not
/// allocate.
pub struct PersistentVectorIterator<'a, T> {
    /// Slot cursor within the buffer currently being walked
    current: slice::Iter<'a, Option<T>>,
    /// Buffers not yet walked, innermost last (popped in order: body, suffix)
    pending: SmallVec<[&'a [Option<T>]; 2]>,
    /// Number of slots not yet yielded (for `ExactSizeIterator`)
    remaining: usize,
}

impl<'a, T> PersistentVectorIterator<'a, T> {
    /// Creates a new iterator positioned at the vector's first slot.
    fn new(vector: &'a PersistentVector<T>) -> Self {
        let mut pending: SmallVec<[&'a [Option<T>]; 2]> = SmallVec::new();
        pending.push(&vector.suffix);
        pending.push(&vector.body);
        Self {
            current: vector.prefix.iter(),
            pending,
            remaining: vector.len(),
        }
    }
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = Option<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.current.next() {
                self.remaining -= 1;
                return Some(slot.as_ref());
            }
            let next_buffer = self.pending.pop()?;
            self.current = next_buffer.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

/// An owning iterator over the slots of a [`PersistentVector`].
///
/// Yields `Option<T>` for each slot in logical order. Slots are cloned out
/// of the shared buffers as they are returned.
pub struct PersistentVectorIntoIterator<T> {
    /// Buffer currently being walked
    current: Buffer<T>,
    /// Slot position within the current buffer
    position: usize,
    /// Buffers not yet walked, innermost last (popped in order: body, suffix)
    pending: SmallVec<[Buffer<T>; 2]>,
    /// Number of slots not yet yielded (for `ExactSizeIterator`)
    remaining: usize,
}

impl<T: Clone> PersistentVectorIntoIterator<T> {
    /// Creates a new owning iterator positioned at the vector's first slot.
    fn new(vector: PersistentVector<T>) -> Self {
        let remaining = vector.len();
        let PersistentVector {
            prefix,
            body,
            suffix,
        } = vector;
        let mut pending: SmallVec<[Buffer<T>; 2]> = SmallVec::new();
        pending.push(suffix);
        pending.push(body);
        Self {
            current: prefix,
            position: 0,
            pending,
            remaining,
        }
    }
}

impl<T: Clone> Iterator for PersistentVectorIntoIterator<T> {
    type Item = Option<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.position < self.current.len() {
                let slot = self.current[self.position].clone();
                self.position += 1;
                self.remaining -= 1;
                return Some(slot);
            }
            self.current = self.pending.pop()?;
            self.position = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone> ExactSizeIterator for PersistentVectorIntoIterator<T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for PersistentVector<T> {
    /// Clones the vector by sharing all three buffers.
    ///
    /// This only bumps three reference counts; no slots are copied.
    #[inline]
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            body: self.body.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

impl<T> Default for PersistentVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_slots(iter.into_iter().map(Some))
    }
}

impl<T> From<Vec<T>> for PersistentVector<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_slots(values.into_iter().map(Some))
    }
}

impl<T: Clone> From<&[T]> for PersistentVector<T> {
    fn from(values: &[T]) -> Self {
        Self::from_slice(values)
    }
}

impl<T: Clone> Extend<T> for PersistentVector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterator: I) {
        let extended = self.push_back_many(iterator);
        *self = extended;
    }
}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type Item = Option<T>;
    type IntoIter = PersistentVectorIntoIterator<T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        PersistentVectorIntoIterator::new(self)
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = Option<&'a T>;
    type IntoIter = PersistentVectorIterator<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Compares two vectors slot by slot.
///
/// Equality ignores how slots are distributed across the three buffers, so
/// a vector built by appends compares equal to one built in a single pass
/// when their slots agree. Vectors that share all three buffers are
/// recognized as equal without comparing slots.
impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        if ReferenceCounter::ptr_eq(&self.prefix, &other.prefix)
            && ReferenceCounter::ptr_eq(&self.body, &other.body)
            && ReferenceCounter::ptr_eq(&self.suffix, &other.suffix)
        {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|(left, right)| left == right)
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

/// Compares two vectors lexicographically by slot.
///
/// Empty slots order before present values (`None < Some`).
impl<T: PartialOrd> PartialOrd for PersistentVector<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord> Ord for PersistentVector<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

/// Computes a hash value for this vector.
///
/// The hash covers the length and then every slot in logical order, so it
/// does not depend on how slots are distributed across the three buffers.
/// Equal vectors produce equal hash values.
impl<T: Hash> Hash for PersistentVector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the length first to distinguish vectors of different lengths
        self.len().hash(state);
        // Hash each slot in order so empty slots participate
        for slot in self {
            slot.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

/// Formats the vector as a bracketed slot list, rendering empty slots as `_`.
///
/// # Examples
///
/// ```rust
/// use triptych::PersistentVector;
///
/// let vector = PersistentVector::from(vec![1, 2]).assoc(3, 4);
/// assert_eq!(vector.to_string(), "[1, 2, _, 4]");
/// ```
impl<T: fmt::Display> fmt::Display for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        let mut first = true;
        for slot in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            match slot {
                Some(value) => write!(formatter, "{value}")?,
                None => write!(formatter, "_")?,
            }
        }
        write!(formatter, "]")
    }
}

/// Returns a reference to the value at `index`.
///
/// # Panics
///
/// Panics if `index` is out of bounds or the slot at `index` is empty. Use
/// [`PersistentVector::get`] for a non-panicking lookup.
impl<T> Index<usize> for PersistentVector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(value) => value,
            None => panic!(
                "PersistentVector::index: no value at index {index} (length {})",
                self.len()
            ),
        }
    }
}

impl<T: Clone> Add for PersistentVector<T> {
    type Output = Self;

    /// Concatenates two vectors, equivalent to [`PersistentVector::append`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triptych::PersistentVector;
    ///
    /// let left = PersistentVector::from(vec![1]);
    /// let right = PersistentVector::from(vec![2]);
    /// assert_eq!((left + right).to_vec(), vec![Some(1), Some(2)]);
    /// ```
    fn add(self, other: Self) -> Self {
        self.append(&other)
    }
}

impl<T: Clone> Sum for PersistentVector<T> {
    fn sum<I: Iterator<Item = Self>>(iterator: I) -> Self {
        iterator.fold(Self::new(), |accumulated, vector| accumulated.append(&vector))
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentVector<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for slot in self {
            seq.serialize_element(&slot)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentVectorVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<T> PersistentVectorVisitor<T> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentVectorVisitor<T>
where
    T: serde::Deserialize<'de>,
{
    type Value = PersistentVector<T>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence of optional values")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        const MAX_PREALLOCATE: usize = 4096;
        let capacity = seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATE);
        let mut slots: Vec<Option<T>> = Vec::with_capacity(capacity);
        while let Some(slot) = seq.next_element()? {
            slots.push(slot);
        }
        Ok(PersistentVector::from_slots(slots))
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentVectorVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Thread Safety Tests (arc feature only)
// =============================================================================

#[cfg(all(test, feature = "arc"))]
mod multithread_tests {
    use super::*;
    use rstest::rstest;
    use std::thread;

    #[rstest]
    fn test_vector_shared_across_threads() {
        let vector: PersistentVector<i32> = (0..10000).collect();

        let vector1 = vector.clone();
        let vector2 = vector;

        let handle1 = thread::spawn(move || {
            vector1.iter().filter_map(|slot| slot.copied()).sum::<i32>()
        });

        let handle2 = thread::spawn(move || {
            vector2.iter().filter_map(|slot| slot.copied()).sum::<i32>()
        });

        let sum1 = handle1.join().unwrap();
        let sum2 = handle2.join().unwrap();

        assert_eq!(sum1, sum2);
        assert_eq!(sum1, (0..10000).sum::<i32>());
    }

    #[rstest]
    fn test_vector_edited_concurrently() {
        let vector: PersistentVector<i32> = (0..100).collect();

        let vector1 = vector.clone();
        let vector2 = vector.clone();

        let handle1 = thread::spawn(move || vector1.assoc(0, -1));
        let handle2 = thread::spawn(move || vector2.push_back(100));

        let edited1 = handle1.join().unwrap();
        let edited2 = handle2.join().unwrap();

        assert_eq!(vector.len(), 100);
        assert_eq!(edited1.get(0), Some(&-1));
        assert_eq!(edited2.len(), 101);
    }
}
