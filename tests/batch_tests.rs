//! Integrity tests for batched storage.
//!
//! Every attached component must keep resolving to its own last-written
//! values through any interleaving of adds and removes, and detached
//! records must own their values independently of the collection.

use std::collections::HashMap;

use cell_agent_sim::batch::{BatchedVector, Handle};
use cell_agent_sim::error::BatchError;
use proptest::prelude::*;

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn test_collection_capacity_follows_growth_rule() {
    let mut v = BatchedVector::new(4);
    let mut seen = Vec::new();
    for i in 0..9 {
        v.add_values(&[i as f64; 4]).unwrap();
        seen.push(v.capacity());
    }
    assert_eq!(seen, vec![1, 2, 4, 4, 8, 8, 8, 8, 16]);
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_stale_handle_is_rejected() {
    let mut v = BatchedVector::new(1);
    let a = v.add_values(&[1.0]).unwrap();
    let _b = v.add_values(&[2.0]).unwrap();
    v.remove(a).unwrap();
    // The freed index is reused under a new generation
    let c = v.add_values(&[3.0]).unwrap();
    assert!(matches!(v.get(a), Err(BatchError::StaleHandle { .. })));
    assert_eq!(v.get(c).unwrap(), &[3.0]);
}

#[test]
fn test_detached_record_is_private() {
    let mut v = BatchedVector::new(2);
    let a = v.add_values(&[1.0, 2.0]).unwrap();
    let b = v.add_values(&[3.0, 4.0]).unwrap();
    let mut detached = v.remove(a).unwrap();
    detached.values_mut()[0] = 100.0;
    assert_eq!(v.get(b).unwrap(), &[3.0, 4.0]);
    assert_eq!(v.as_slice(), &[3.0, 4.0]);
}

// ============================================================================
// Property: handles always address their own values
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(f64),
    /// Remove the n-th live handle (modulo count)
    Remove(usize),
    /// Overwrite the n-th live handle (modulo count)
    Write(usize, f64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-1e3..1e3f64).prop_map(Op::Add),
        (0..64usize).prop_map(Op::Remove),
        ((0..64usize), (-1e3..1e3f64)).prop_map(|(i, x)| Op::Write(i, x)),
    ]
}

proptest! {
    #[test]
    fn prop_handles_survive_interleaving(ops in prop::collection::vec(op(), 1..200)) {
        let mut v = BatchedVector::new(3);
        let mut model: HashMap<Handle, [f64; 3]> = HashMap::new();
        let mut live: Vec<Handle> = Vec::new();

        for op in ops {
            match op {
                Op::Add(x) => {
                    let values = [x, x + 1.0, x + 2.0];
                    let h = v.add_values(&values).unwrap();
                    prop_assert!(!model.contains_key(&h), "fresh handle aliases a live one");
                    model.insert(h, values);
                    live.push(h);
                }
                Op::Remove(i) if !live.is_empty() => {
                    let h = live.swap_remove(i % live.len());
                    let expected = model.remove(&h).unwrap();
                    let detached = v.remove(h).unwrap();
                    prop_assert_eq!(detached.values(), &expected[..]);
                    prop_assert!(v.get(h).is_err(), "removed handle still resolves");
                }
                Op::Write(i, x) if !live.is_empty() => {
                    let h = live[i % live.len()];
                    v.get_mut(h).unwrap()[1] = x;
                    model.get_mut(&h).unwrap()[1] = x;
                }
                _ => {}
            }

            prop_assert_eq!(v.len(), model.len());
            let mut slots: Vec<usize> = Vec::new();
            for (h, values) in &model {
                prop_assert_eq!(v.get(*h).unwrap(), &values[..]);
                slots.push(v.slot_of(*h).unwrap());
            }
            slots.sort_unstable();
            slots.dedup();
            prop_assert_eq!(slots.len(), model.len(), "two live components share a slot");
        }
    }
}
