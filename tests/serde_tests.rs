#![cfg(feature = "serde")]

//! Integration tests for serde support.
//!
//! These tests verify that vectors round-trip through JSON, that empty
//! slots appear as `null`, and that deserialization rejects non-sequence
//! input.

use rstest::rstest;
use triptych::PersistentVector;

// =============================================================================
// Round Trip Tests
// =============================================================================

#[rstest]
fn test_json_roundtrip() {
    let vector: PersistentVector<i32> = (1..=100).collect();
    let json = serde_json::to_string(&vector).unwrap();
    let restored: PersistentVector<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(vector, restored);
}

#[rstest]
fn test_json_roundtrip_with_holes() {
    let vector = PersistentVector::from(vec![1, 2]).assoc(4, 5);
    let json = serde_json::to_string(&vector).unwrap();
    let restored: PersistentVector<i32> = serde_json::from_str(&json).unwrap();

    assert_eq!(vector, restored);
    assert_eq!(restored.get(2), None);
    assert_eq!(restored.get(4), Some(&5));
}

#[rstest]
fn test_json_roundtrip_with_strings() {
    let vector: PersistentVector<String> = ["hello", "world", "rust"]
        .into_iter()
        .map(String::from)
        .collect();

    let json = serde_json::to_string(&vector).unwrap();
    let restored: PersistentVector<String> = serde_json::from_str(&json).unwrap();
    assert_eq!(vector, restored);
}

#[rstest]
fn test_roundtrip_ignores_internal_partitioning() {
    let mut vector = PersistentVector::new();
    for value in 0..50 {
        vector = vector.push_back(value);
    }
    vector = vector.push_front(-1);

    let json = serde_json::to_string(&vector).unwrap();
    let restored: PersistentVector<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(vector, restored);
}

// =============================================================================
// Wire Format Tests
// =============================================================================

#[rstest]
fn test_holes_serialize_as_null() {
    let vector = PersistentVector::from(vec![1, 2]).assoc(3, 4);
    assert_eq!(serde_json::to_string(&vector).unwrap(), "[1,2,null,4]");
}

#[rstest]
fn test_nulls_deserialize_as_holes() {
    let restored: PersistentVector<i32> = serde_json::from_str("[1,null,3]").unwrap();

    assert_eq!(restored.len(), 3);
    assert_eq!(restored.get(0), Some(&1));
    assert_eq!(restored.get(1), None);
    assert_eq!(restored.get(2), Some(&3));
}

#[rstest]
fn test_empty_vector() {
    let empty: PersistentVector<i32> = PersistentVector::new();
    assert_eq!(serde_json::to_string(&empty).unwrap(), "[]");

    let restored: PersistentVector<i32> = serde_json::from_str("[]").unwrap();
    assert!(restored.is_empty());
}

#[rstest]
fn test_singleton_vector() {
    let vector = PersistentVector::singleton(42);
    assert_eq!(serde_json::to_string(&vector).unwrap(), "[42]");
}

// =============================================================================
// Nested Structure Tests
// =============================================================================

#[rstest]
fn test_nested_vectors() {
    let inner1: PersistentVector<i32> = (1..=3).collect();
    let inner2: PersistentVector<i32> = (4..=6).collect();
    let outer: PersistentVector<PersistentVector<i32>> = vec![inner1, inner2].into_iter().collect();

    let json = serde_json::to_string(&outer).unwrap();
    let restored: PersistentVector<PersistentVector<i32>> = serde_json::from_str(&json).unwrap();

    assert_eq!(outer, restored);
}

#[rstest]
fn test_vector_inside_derived_struct() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Inventory {
        name: String,
        slots: PersistentVector<u32>,
    }

    let inventory = Inventory {
        name: "chest".to_string(),
        slots: PersistentVector::from(vec![3, 7]).assoc(4, 1),
    };

    let json = serde_json::to_string(&inventory).unwrap();
    assert_eq!(json, r#"{"name":"chest","slots":[3,7,null,null,1]}"#);

    let restored: Inventory = serde_json::from_str(&json).unwrap();
    assert_eq!(inventory, restored);
}

// =============================================================================
// Type Mismatch Error Tests (for expecting() coverage)
// =============================================================================

#[rstest]
fn test_string_input_is_rejected() {
    let json = r#""not an array""#;
    let result: Result<PersistentVector<i32>, _> = serde_json::from_str(json);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("a sequence"));
}

#[rstest]
fn test_object_input_is_rejected() {
    let json = r#"{"key": "value"}"#;
    let result: Result<PersistentVector<i32>, _> = serde_json::from_str(json);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("a sequence"));
}
