//! Proptest strategies for configuration data.
//!
//! Trees generated here stay small (shallow nesting, short keys) so
//! shrinking produces readable counterexamples.

use proptest::prelude::*;

use convergent_core::{Dict, Scalar, Set, Value};

/// Any scalar: ints across the full range, short lowercase text,
/// short byte strings.
pub fn scalar() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        any::<i64>().prop_map(Scalar::Int),
        "[a-z]{0,8}".prop_map(Scalar::Text),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Scalar::Bytes),
    ]
}

/// A set of up to 5 scalars.
pub fn set() -> impl Strategy<Value = Set> {
    proptest::collection::btree_set(scalar(), 0..5)
}

/// A value tree up to 3 levels deep.
pub fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        scalar().prop_map(Value::Scalar),
        set().prop_map(Value::Set),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        proptest::collection::btree_map("[a-f]{1,3}", inner, 0..4).prop_map(Value::Dict)
    })
}

/// A top-level configuration dict.
pub fn dict() -> impl Strategy<Value = Dict> {
    proptest::collection::btree_map("[a-f]{1,3}", value(), 0..5)
}

/// A batch of 1 to 4 independent configuration dicts, as payload
/// sources for merge tests.
pub fn dict_batch() -> impl Strategy<Value = Vec<Dict>> {
    proptest::collection::vec(dict(), 1..4)
}
