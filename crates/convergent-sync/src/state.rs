//! Per-namespace document state machine.
//!
//! A [`ConfigDoc`] is the engine's view of one namespace: the current
//! converged tree plus the bookkeeping needed to know whether the
//! swarm has it (`Clean`) or a push is due (`Dirty`).
//!
//! The document keeps the decoded tree of every live contribution
//! (each unsuperseded envelope, plus the local edit when there is
//! one) and recomputes the merge over that full set on every batch.
//! The outcome is a function of the contribution set alone, so any
//! partitioning of the same envelopes into batches converges on the
//! same bytes. Merges are copy-then-swap: the merged tree is computed
//! in full before it replaces the document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use convergent_core::{canonical, ContentHash, CoreError, Dict, DictExt, FieldProxy, Scalar, Value};

use crate::error::{Result, SyncError};
use crate::merge::{merge_contributions, Contribution};

/// An independent unit of configuration: its name doubles as the
/// encryption domain for messages in it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Where a document stands relative to the swarm.
///
/// `Merging` is only ever observable from inside a merge; it is never
/// persisted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DocState {
    /// The swarm has this exact state; nothing to push.
    Clean,
    /// Local changes (edits or merge results) have not been pushed.
    Dirty,
    /// A merge batch is being applied.
    Merging,
}

/// Outcome of one merge batch.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Hashes whose payloads contributed to the new state.
    pub merged: Vec<ContentHash>,
    /// Hashes whose payloads failed to decode, with the cause.
    pub quarantined: Vec<(ContentHash, CoreError)>,
    /// Duplicates of already-merged hashes, dropped without effect.
    pub skipped: usize,
}

/// Payload and obsolete hashes for an outgoing push.
#[derive(Clone, Debug)]
pub struct PushData {
    /// Canonical encoding of the current tree.
    pub payload: Vec<u8>,
    /// Hashes this state supersedes; the relay may drop them.
    pub obsolete: Vec<ContentHash>,
}

/// One namespace's document.
///
/// Invariant: `data` is always `merge(live contributions + local)`.
/// A contribution is only forgotten once its content is covered by a
/// payload the swarm holds.
pub struct ConfigDoc {
    data: Dict,
    state: DocState,
    /// Hash of the envelope payload this state last agreed with.
    curr_hash: Option<ContentHash>,
    /// Live contributions: each unsuperseded envelope's decoded tree.
    contribs: BTreeMap<ContentHash, Dict>,
    /// The unpushed local edit, entering merges as its own
    /// contribution. `None` when the state is fully derived from
    /// `contribs`.
    local: Option<Dict>,
    /// Superseded envelope hashes, reported on the next push.
    obsolete: BTreeSet<ContentHash>,
    /// Envelope hashes already folded in; makes re-merge a no-op.
    seen: BTreeSet<ContentHash>,
    /// Canonical encoding the swarm is known to have.
    last_pushed: Vec<u8>,
}

impl ConfigDoc {
    /// A fresh, empty, clean document.
    pub fn new() -> Self {
        Self {
            data: Dict::new(),
            state: DocState::Clean,
            curr_hash: None,
            contribs: BTreeMap::new(),
            local: None,
            obsolete: BTreeSet::new(),
            seen: BTreeSet::new(),
            last_pushed: canonical::encode_dict(&Dict::new()),
        }
    }

    pub fn data(&self) -> &Dict {
        &self.data
    }

    pub fn state(&self) -> DocState {
        self.state
    }

    pub fn curr_hash(&self) -> Option<ContentHash> {
        self.curr_hash
    }

    /// Whether the swarm is missing local changes.
    pub fn needs_push(&self) -> bool {
        self.state != DocState::Clean
    }

    /// Apply a local edit through the shared field policies. The
    /// document becomes dirty iff the resulting encoding differs from
    /// what the swarm has; while dirty, the edited tree is a live
    /// contribution of its own.
    pub fn edit<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut FieldProxy<'_>) -> R,
    {
        let result = {
            let mut proxy = FieldProxy::new(&mut self.data);
            f(&mut proxy)
        };
        let encoding = canonical::encode_dict(&self.data);
        self.state = self.state_for(&encoding);
        self.local = if self.state == DocState::Clean {
            None
        } else {
            Some(self.data.clone())
        };
        result
    }

    /// Merge a batch of decoded envelope payloads, each keyed by its
    /// content hash.
    ///
    /// Hashes already merged (including our own confirmed pushes) are
    /// skipped. Payloads that fail to decode are quarantined and
    /// reported; they never abort the batch. New payloads join the
    /// live contribution set, and the whole set is re-merged, so the
    /// result does not depend on how envelopes are split into batches.
    pub fn merge(&mut self, batch: Vec<(ContentHash, Vec<u8>)>) -> MergeReport {
        self.state = DocState::Merging;
        let mut report = MergeReport::default();

        let mut fresh = false;
        for (hash, payload) in batch {
            if self.seen.contains(&hash) {
                report.skipped += 1;
                continue;
            }
            match canonical::decode_dict(&payload) {
                Ok(tree) => {
                    self.seen.insert(hash);
                    self.contribs.insert(hash, tree);
                    report.merged.push(hash);
                    fresh = true;
                }
                Err(err) => {
                    warn!(hash = %hash.to_hex(), %err, "quarantining undecodable payload");
                    report.quarantined.push((hash, err));
                }
            }
        }

        if !fresh {
            let encoding = canonical::encode_dict(&self.data);
            self.state = self.state_for(&encoding);
            return report;
        }

        let contributions: Vec<Contribution> = self
            .contribs
            .iter()
            .map(|(h, tree)| Contribution::new(*h, tree.clone()))
            .chain(self.local.as_ref().map(|tree| {
                let hash = ContentHash::hash(&canonical::encode_dict(tree));
                Contribution::new(hash, tree.clone())
            }))
            .collect();

        let merged = merge_contributions(contributions);
        let encoding = canonical::encode_dict(&merged);

        let new_curr = self
            .contribs
            .iter()
            .find(|&(_, tree)| canonical::encode_dict(tree) == encoding)
            .map(|(h, _)| *h);

        if let Some(nc) = new_curr {
            // The adopted payload covers every other live contribution
            // and the local edit; the swarm already has this state.
            self.last_pushed = encoding.clone();
            let superseded: Vec<ContentHash> =
                self.contribs.keys().copied().filter(|h| *h != nc).collect();
            for h in superseded {
                self.contribs.remove(&h);
                self.obsolete.insert(h);
            }
            self.local = None;
        }

        self.curr_hash = new_curr;
        self.data = merged;
        self.state = self.state_for(&encoding);
        debug!(
            merged = report.merged.len(),
            quarantined = report.quarantined.len(),
            skipped = report.skipped,
            live = self.contribs.len(),
            state = ?self.state,
            "merge complete"
        );
        report
    }

    /// The canonical payload and obsolete hashes for an outgoing push.
    /// The pushed payload supersedes every live contribution that does
    /// not already encode to it. The document stays dirty until
    /// [`ConfigDoc::confirm_pushed`].
    pub fn push(&self) -> PushData {
        let payload = canonical::encode_dict(&self.data);
        let obsolete = self
            .obsolete
            .iter()
            .copied()
            .chain(
                self.contribs
                    .iter()
                    .filter(|&(_, tree)| canonical::encode_dict(tree) != payload)
                    .map(|(h, _)| *h),
            )
            .collect();
        PushData { payload, obsolete }
    }

    /// Record that a push landed under `hash`. The confirmed payload
    /// becomes the sole live contribution, and the hashes reported
    /// obsolete with it are forgotten entirely: the relay dropped
    /// those messages, so they can never be fetched again. The
    /// document becomes clean unless it changed while the push was in
    /// flight (then nothing is forgotten and the next push retries).
    pub fn confirm_pushed(&mut self, hash: ContentHash, payload: Vec<u8>) -> Result<()> {
        let tree = canonical::decode_dict(&payload)?;
        let encoding = canonical::encode_dict(&self.data);
        if encoding == payload {
            for h in self.contribs.keys() {
                self.seen.remove(h);
            }
            for h in &self.obsolete {
                self.seen.remove(h);
            }
            self.contribs.clear();
            self.obsolete.clear();
            self.local = None;
        }
        self.contribs.insert(hash, tree);
        self.seen.insert(hash);
        self.curr_hash = Some(hash);
        self.last_pushed = payload;
        self.state = self.state_for(&encoding);
        Ok(())
    }

    fn state_for(&self, encoding: &[u8]) -> DocState {
        if encoding == self.last_pushed {
            DocState::Clean
        } else {
            DocState::Dirty
        }
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Serialize the full document state for the persistence boundary.
    pub fn dump(&self) -> Vec<u8> {
        let mut d = Dict::new();
        d.insert("data".into(), Value::Dict(self.data.clone()));
        if let Some(h) = self.curr_hash {
            d.insert("hash".into(), Value::from(h.as_bytes().to_vec()));
        }
        let mut live = Dict::new();
        for (h, tree) in &self.contribs {
            live.insert(h.to_hex(), Value::Dict(tree.clone()));
        }
        d.insert("live".into(), Value::Dict(live));
        if let Some(tree) = &self.local {
            d.insert("local".into(), Value::Dict(tree.clone()));
        }
        d.insert("old".into(), Value::Set(hash_set(&self.obsolete)));
        d.insert("pushed".into(), Value::from(self.last_pushed.clone()));
        d.insert("seen".into(), Value::Set(hash_set(&self.seen)));
        let state_tag = if self.state == DocState::Clean { 0 } else { 1 };
        d.insert("state".into(), Value::from(state_tag));
        canonical::encode_dict(&d)
    }

    /// Restore a document from a dump.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let d = canonical::decode_dict(bytes)
            .map_err(|e| SyncError::CorruptDump(e.to_string()))?;

        let data = d
            .dict_at("data")
            .ok_or_else(|| corrupt("missing data"))?
            .clone();
        let curr_hash = match d.get("hash") {
            Some(v) => Some(hash_from_bytes(
                v.as_bytes().ok_or_else(|| corrupt("hash is not bytes"))?,
            )?),
            None => None,
        };
        let live = d
            .dict_at("live")
            .ok_or_else(|| corrupt("missing live contributions"))?;
        let mut contribs = BTreeMap::new();
        for (key, value) in live {
            let hash = ContentHash::from_hex(key)
                .map_err(|_| corrupt("bad contribution hash"))?;
            let tree = value
                .as_dict()
                .ok_or_else(|| corrupt("contribution is not a dict"))?;
            contribs.insert(hash, tree.clone());
        }
        let local = match d.get("local") {
            Some(v) => Some(
                v.as_dict()
                    .ok_or_else(|| corrupt("local edit is not a dict"))?
                    .clone(),
            ),
            None => None,
        };
        let obsolete = read_hash_set(&d, "old")?;
        let seen = read_hash_set(&d, "seen")?;
        let last_pushed = d
            .bytes_at("pushed")
            .ok_or_else(|| corrupt("missing pushed encoding"))?
            .to_vec();
        let state = match d.int_at("state") {
            Some(0) => DocState::Clean,
            Some(1) => DocState::Dirty,
            _ => return Err(corrupt("bad state tag")),
        };

        Ok(Self {
            data,
            state,
            curr_hash,
            contribs,
            local,
            obsolete,
            seen,
            last_pushed,
        })
    }
}

impl Default for ConfigDoc {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_set(hashes: &BTreeSet<ContentHash>) -> convergent_core::Set {
    hashes
        .iter()
        .map(|h| Scalar::Bytes(h.as_bytes().to_vec()))
        .collect()
}

fn read_hash_set(d: &Dict, key: &str) -> Result<BTreeSet<ContentHash>> {
    let set = d
        .set_at(key)
        .ok_or_else(|| corrupt(&format!("missing {key} set")))?;
    set.iter()
        .map(|s| match s {
            Scalar::Bytes(b) => hash_from_bytes(b),
            _ => Err(corrupt(&format!("non-bytes member in {key} set"))),
        })
        .collect()
}

fn hash_from_bytes(b: &[u8]) -> Result<ContentHash> {
    let arr: [u8; 32] = b
        .try_into()
        .map_err(|_| corrupt("hash is not 32 bytes"))?;
    Ok(ContentHash::from_bytes(arr))
}

fn corrupt(msg: &str) -> SyncError {
    SyncError::CorruptDump(msg.to_owned())
}
