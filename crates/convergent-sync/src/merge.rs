//! Deterministic merging of configuration trees.
//!
//! A merge combines any number of contributions (decoded payloads plus
//! the local state), each keyed by the content hash of its canonical
//! encoding. Contributions are sorted by hash and folded left to
//! right, so the result depends only on the set of contributions,
//! never on arrival order.
//!
//! At each node of the fold:
//! - Dict meets Dict: recursive per-key merge,
//! - Set meets Set: union,
//! - anything else (scalar conflicts, type mismatches): the side
//!   contributed under the greater hash replaces the other whole.
//!
//! No wall-clock input anywhere; two devices that have exchanged the
//! same messages compute byte-identical state.

use convergent_core::{ContentHash, Dict, Value};

/// One input to a merge: a configuration tree and the content hash it
/// arrived under.
#[derive(Clone, Debug)]
pub struct Contribution {
    pub hash: ContentHash,
    pub data: Dict,
}

impl Contribution {
    pub fn new(hash: ContentHash, data: Dict) -> Self {
        Self { hash, data }
    }
}

/// Merge a set of contributions into a single tree.
///
/// Duplicate hashes are collapsed first. An empty input produces an
/// empty dict.
pub fn merge_contributions(mut contributions: Vec<Contribution>) -> Dict {
    contributions.sort_by(|a, b| a.hash.cmp(&b.hash));
    contributions.dedup_by(|a, b| a.hash == b.hash);

    let mut iter = contributions.into_iter();
    let Some(first) = iter.next() else {
        return Dict::new();
    };
    // Left to right over ascending hashes; the right side of each step
    // carries the greater hash and wins conflicts.
    iter.fold(first.data, |acc, next| merge_dicts(&acc, &next.data))
}

/// Merge two dicts; `winner` carries the greater hash.
pub fn merge_dicts(loser: &Dict, winner: &Dict) -> Dict {
    let mut out = loser.clone();
    for (key, theirs) in winner {
        match out.get(key) {
            Some(ours) => {
                let merged = merge_values(ours, theirs);
                out.insert(key.clone(), merged);
            }
            None => {
                out.insert(key.clone(), theirs.clone());
            }
        }
    }
    out
}

fn merge_values(loser: &Value, winner: &Value) -> Value {
    match (loser, winner) {
        (Value::Dict(a), Value::Dict(b)) => Value::Dict(merge_dicts(a, b)),
        (Value::Set(a), Value::Set(b)) => Value::Set(a.union(b).cloned().collect()),
        // Scalar conflicts and type mismatches: greater hash wins whole.
        _ => winner.clone(),
    }
}
