//! # triptych
//!
//! A persistent (immutable) indexed sequence built from three contiguous
//! buffers: a bounded prefix, an unbounded body, and a bounded suffix.
//!
//! ## Overview
//!
//! [`PersistentVector`] never mutates in place. Every operation returns a
//! new vector, and unchanged buffers are shared between the old and new
//! versions through reference counting, so an edit copies at most one of
//! the three buffers (or, when an edge buffer overflows its 32-slot
//! capacity, rebuilds all slots into a fresh body).
//!
//! The vector is *sparse*: positions may hold a value or be empty. Writing
//! past the end fills the gap with empty slots, and reads normalize empty
//! slots to `None`:
//!
//! ```rust
//! use triptych::PersistentVector;
//!
//! let vector = PersistentVector::from(vec![1, 2, 3]).assoc(5, 9);
//! assert_eq!(vector.len(), 6);
//! assert_eq!(vector.get(2), Some(&3));
//! assert_eq!(vector.get(3), None); // gap slot
//! assert_eq!(vector.get(5), Some(&9));
//!
//! // Structural sharing: the original vector is preserved
//! let original = PersistentVector::from(vec![1, 2, 3]);
//! let updated = original.push_back(4);
//! assert_eq!(original.len(), 3); // Original unchanged
//! assert_eq!(updated.len(), 4);  // New version
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: Use `Arc` instead of `Rc` for shared buffers (thread-safe)
//! - `serde`: Serialization and deserialization support

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

pub mod vector;

pub use vector::EDGE_CAPACITY;
pub use vector::PersistentVector;
pub use vector::PersistentVectorIntoIterator;
pub use vector::PersistentVectorIterator;

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use triptych::prelude::*;
///
/// let vector = pvector![1, 2, 3];
/// assert_eq!(vector.len(), 3);
/// ```
pub mod prelude {
    pub use crate::pvector;
    pub use crate::vector::EDGE_CAPACITY;
    pub use crate::vector::PersistentVector;
    pub use crate::vector::PersistentVectorIntoIterator;
    pub use crate::vector::PersistentVectorIterator;
}

/// Constructs a [`PersistentVector`] from a list of values.
///
/// # Examples
///
/// ```rust
/// use triptych::{pvector, PersistentVector};
///
/// let empty: PersistentVector<i32> = pvector![];
/// assert!(empty.is_empty());
///
/// let vector = pvector![1, 2, 3];
/// assert_eq!(vector.get(0), Some(&1));
/// assert_eq!(vector.get(2), Some(&3));
/// ```
#[macro_export]
macro_rules! pvector {
    () => {
        $crate::PersistentVector::new()
    };

    ($($element:expr),+ $(,)?) => {
        $crate::PersistentVector::from(vec![$($element),+])
    };
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_clone() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(*reference_counter, *reference_counter_clone);
    }

    #[rstest]
    fn test_reference_counter_strong_count() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 2);
        drop(reference_counter_clone);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
    }
}
