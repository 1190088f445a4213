//! The engine: unified API for Convergent.
//!
//! A [`SyncEngine`] brings together the document state machines, the
//! key ring, and the persistence boundary. Each namespace is an
//! independent unit of mutual exclusion: its document sits behind its
//! own async mutex, so operations on different namespaces run
//! concurrently while a merge and an edit on the same namespace never
//! interleave.
//!
//! All crypto context lives on the engine instance; there is no
//! process-wide state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use convergent_core::{
    canonical, encrypt, ContentHash, Dict, DictExt, Envelope, Keypair, MAX_MESSAGE_SIZE,
};
use convergent_store::Store;
use convergent_sync::{ConfigDoc, MergeReport, Namespace};

use crate::error::{EngineError, Result};

/// Outcome of ingesting a batch of raw messages for one namespace.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Per-envelope merge outcome.
    pub merge: MergeReport,
    /// Messages no ring key could open.
    pub undecryptable: usize,
    /// Envelopes whose hash or signature check failed.
    pub rejected: usize,
}

/// A sealed message ready to push, with what to tell the relay.
#[derive(Clone, Debug)]
pub struct PushMessage {
    /// The sealed envelope to hand to the transport.
    pub message: Vec<u8>,
    /// Content hash of the payload; feed back to
    /// [`SyncEngine::confirm_pushed`] once the relay accepts.
    pub hash: ContentHash,
    /// The canonical payload the hash covers.
    pub payload: Vec<u8>,
    /// Hashes this push supersedes; the relay may drop them.
    pub obsolete: Vec<ContentHash>,
}

/// The main engine struct.
///
/// Owns the device keypair, the ordered decryption key ring, the
/// storage backend, and one document per opened namespace.
pub struct SyncEngine<S: Store> {
    keypair: Keypair,
    store: Arc<S>,
    /// Ordered ring: sealing uses the first key, opening tries all.
    keys: RwLock<Vec<[u8; 32]>>,
    docs: Mutex<HashMap<Namespace, Arc<Mutex<ConfigDoc>>>>,
}

impl<S: Store> SyncEngine<S> {
    /// Create an engine over a storage backend.
    pub fn new(keypair: Keypair, store: S) -> Self {
        Self {
            keypair,
            store: Arc::new(store),
            keys: RwLock::new(Vec::new()),
            docs: Mutex::new(HashMap::new()),
        }
    }

    /// The device's public key.
    pub fn public_key(&self) -> convergent_core::Ed25519PublicKey {
        self.keypair.public_key()
    }

    // ─────────────────────────────────────────────────────────────────
    // Key ring
    // ─────────────────────────────────────────────────────────────────

    /// Add a key to the ring. A high-priority key goes to the front
    /// and becomes the sealing key; a low-priority key goes to the
    /// back and is only tried when opening. Re-adding an existing key
    /// moves it.
    pub fn add_key(&self, key: [u8; 32], high_priority: bool) {
        let mut keys = self.keys.write().expect("key ring lock poisoned");
        keys.retain(|k| *k != key);
        if high_priority {
            keys.insert(0, key);
        } else {
            keys.push(key);
        }
    }

    /// Remove a key from the ring. Returns whether it was present.
    pub fn remove_key(&self, key: &[u8; 32]) -> bool {
        let mut keys = self.keys.write().expect("key ring lock poisoned");
        let before = keys.len();
        keys.retain(|k| k != key);
        keys.len() != before
    }

    /// Drop all keys.
    pub fn clear_keys(&self) {
        self.keys.write().expect("key ring lock poisoned").clear();
    }

    fn ring(&self) -> Result<Vec<[u8; 32]>> {
        let keys = self.keys.read().expect("key ring lock poisoned").clone();
        if keys.is_empty() {
            return Err(EngineError::NoKeys);
        }
        Ok(keys)
    }

    // ─────────────────────────────────────────────────────────────────
    // Namespace lifecycle
    // ─────────────────────────────────────────────────────────────────

    /// Open a namespace: restore its document from the store, or start
    /// an empty one. Opening an already open namespace is a no-op.
    pub async fn open(&self, namespace: &Namespace) -> Result<()> {
        let mut docs = self.docs.lock().await;
        if docs.contains_key(namespace) {
            return Ok(());
        }
        let doc = match self.store.load(namespace.as_str()).await? {
            Some(dump) => ConfigDoc::load(&dump)?,
            None => ConfigDoc::new(),
        };
        debug!(%namespace, "namespace opened");
        docs.insert(namespace.clone(), Arc::new(Mutex::new(doc)));
        Ok(())
    }

    /// Close a namespace, persisting its final state.
    pub async fn close(&self, namespace: &Namespace) -> Result<()> {
        let doc = {
            let mut docs = self.docs.lock().await;
            docs.remove(namespace)
                .ok_or_else(|| EngineError::UnknownNamespace(namespace.to_string()))?
        };
        let dump = doc.lock().await.dump();
        self.store.save(namespace.as_str(), &dump).await?;
        Ok(())
    }

    /// Namespaces currently open on this engine.
    pub async fn namespaces(&self) -> Vec<Namespace> {
        let docs = self.docs.lock().await;
        let mut names: Vec<Namespace> = docs.keys().cloned().collect();
        names.sort();
        names
    }

    async fn doc(&self, namespace: &Namespace) -> Result<Arc<Mutex<ConfigDoc>>> {
        let docs = self.docs.lock().await;
        docs.get(namespace)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNamespace(namespace.to_string()))
    }

    async fn persist(&self, namespace: &Namespace, doc: &ConfigDoc) -> Result<()> {
        self.store.save(namespace.as_str(), &doc.dump()).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Document access
    // ─────────────────────────────────────────────────────────────────

    /// Apply a local edit through the shared field policies, then
    /// persist the document.
    pub async fn edit<F, R>(&self, namespace: &Namespace, f: F) -> Result<R>
    where
        F: FnOnce(&mut convergent_core::FieldProxy<'_>) -> R,
    {
        let doc = self.doc(namespace).await?;
        let mut doc = doc.lock().await;
        let result = doc.edit(f);
        self.persist(namespace, &doc).await?;
        Ok(result)
    }

    /// Read from the current tree.
    pub async fn read<F, R>(&self, namespace: &Namespace, f: F) -> Result<R>
    where
        F: FnOnce(&Dict) -> R,
    {
        let doc = self.doc(namespace).await?;
        let doc = doc.lock().await;
        Ok(f(doc.data()))
    }

    /// The integer at `key`, if present with that type.
    pub async fn int_at(&self, namespace: &Namespace, key: &str) -> Result<Option<i64>> {
        self.read(namespace, |d| d.int_at(key)).await
    }

    /// The text at `key`, if present with that type.
    pub async fn text_at(&self, namespace: &Namespace, key: &str) -> Result<Option<String>> {
        self.read(namespace, |d| d.text_at(key).map(str::to_owned))
            .await
    }

    /// Whether the flag at `key` is set.
    pub async fn flag_at(&self, namespace: &Namespace, key: &str) -> Result<bool> {
        self.read(namespace, |d| d.int_at(key) == Some(1)).await
    }

    // ─────────────────────────────────────────────────────────────────
    // Sync flow
    // ─────────────────────────────────────────────────────────────────

    /// Ingest raw messages fetched for a namespace: open each with the
    /// key ring, verify the envelope, and merge the surviving
    /// payloads. Undecryptable and unverifiable messages are counted
    /// and dropped; they never abort the batch.
    pub async fn ingest(
        &self,
        namespace: &Namespace,
        messages: Vec<Vec<u8>>,
    ) -> Result<IngestReport> {
        let keys = self.ring()?;
        let mut report = IngestReport::default();
        let mut batch: Vec<(ContentHash, Vec<u8>)> = Vec::new();

        for message in &messages {
            let Some(wire) = open_with_ring(&keys, namespace.as_str(), message) else {
                warn!(%namespace, "message not decryptable with any ring key");
                report.undecryptable += 1;
                continue;
            };
            let envelope = match Envelope::decode(&wire) {
                Ok(env) => env,
                Err(err) => {
                    warn!(%namespace, %err, "rejecting undecodable envelope");
                    report.rejected += 1;
                    continue;
                }
            };
            if let Err(err) = envelope.verify() {
                warn!(%namespace, %err, "rejecting envelope with bad hash or signature");
                report.rejected += 1;
                continue;
            }
            batch.push((*envelope.hash(), envelope.payload().to_vec()));
        }

        let doc = self.doc(namespace).await?;
        let mut doc = doc.lock().await;
        report.merge = doc.merge(batch);
        self.persist(namespace, &doc).await?;
        Ok(report)
    }

    /// Whether the namespace has local state the swarm is missing.
    pub async fn needs_push(&self, namespace: &Namespace) -> Result<bool> {
        let doc = self.doc(namespace).await?;
        let doc = doc.lock().await;
        Ok(doc.needs_push())
    }

    /// Build the sealed message for the namespace's current state.
    ///
    /// The document stays dirty until [`SyncEngine::confirm_pushed`]
    /// reports the relay accepted it.
    pub async fn push(&self, namespace: &Namespace) -> Result<PushMessage> {
        let keys = self.ring()?;
        let doc = self.doc(namespace).await?;
        let doc = doc.lock().await;
        let push = doc.push();

        let envelope = Envelope::create(&self.keypair, push.payload.clone());
        let hash = *envelope.hash();
        let wire = envelope.encode();
        let message = encrypt::seal(&keys[0], namespace.as_str(), &wire)?;
        if message.len() > MAX_MESSAGE_SIZE {
            return Err(EngineError::MessageTooLarge {
                size: message.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        Ok(PushMessage {
            message,
            hash,
            payload: push.payload,
            obsolete: push.obsolete,
        })
    }

    /// Record that a push landed, and persist the now-clean document.
    pub async fn confirm_pushed(&self, namespace: &Namespace, push: &PushMessage) -> Result<()> {
        let doc = self.doc(namespace).await?;
        let mut doc = doc.lock().await;
        doc.confirm_pushed(push.hash, push.payload.clone())?;
        self.persist(namespace, &doc).await?;
        Ok(())
    }

    /// The canonical encoding of the namespace's current tree.
    pub async fn current_encoding(&self, namespace: &Namespace) -> Result<Vec<u8>> {
        self.read(namespace, canonical::encode_dict).await
    }
}

fn open_with_ring(keys: &[[u8; 32]], domain: &str, message: &[u8]) -> Option<Vec<u8>> {
    keys.iter()
        .find_map(|key| encrypt::open(key, domain, message).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergent_store::MemoryStore;

    const SHARED_KEY: [u8; 32] = [0x33; 32];

    fn engine(seed: u8) -> SyncEngine<MemoryStore> {
        let engine = SyncEngine::new(Keypair::from_seed(&[seed; 32]), MemoryStore::new());
        engine.add_key(SHARED_KEY, true);
        engine
    }

    fn ns() -> Namespace {
        Namespace::new("UserProfile")
    }

    #[tokio::test]
    async fn test_two_devices_converge() {
        let a = engine(1);
        let b = engine(2);
        let ns = ns();
        a.open(&ns).await.unwrap();
        b.open(&ns).await.unwrap();

        a.edit(&ns, |p| p.set_text("name", "alice")).await.unwrap();
        assert!(a.needs_push(&ns).await.unwrap());

        let push = a.push(&ns).await.unwrap();
        a.confirm_pushed(&ns, &push).await.unwrap();
        assert!(!a.needs_push(&ns).await.unwrap());

        let report = b.ingest(&ns, vec![push.message]).await.unwrap();
        assert_eq!(report.merge.merged.len(), 1);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.undecryptable, 0);

        assert_eq!(b.text_at(&ns, "name").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(
            a.current_encoding(&ns).await.unwrap(),
            b.current_encoding(&ns).await.unwrap()
        );
        // B adopted A's exact state; no push needed.
        assert!(!b.needs_push(&ns).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_edits_converge_after_exchange() {
        let a = engine(1);
        let b = engine(2);
        let ns = ns();
        a.open(&ns).await.unwrap();
        b.open(&ns).await.unwrap();

        a.edit(&ns, |p| {
            p.set_mut("members").insert("x".into());
            p.set_mut("members").insert("y".into());
        })
        .await
        .unwrap();
        b.edit(&ns, |p| {
            p.set_mut("members").insert("y".into());
            p.set_mut("members").insert("z".into());
        })
        .await
        .unwrap();

        let push_a = a.push(&ns).await.unwrap();
        let push_b = b.push(&ns).await.unwrap();
        a.confirm_pushed(&ns, &push_a).await.unwrap();
        b.confirm_pushed(&ns, &push_b).await.unwrap();

        a.ingest(&ns, vec![push_b.message.clone()]).await.unwrap();
        b.ingest(&ns, vec![push_a.message.clone()]).await.unwrap();

        let enc_a = a.current_encoding(&ns).await.unwrap();
        let enc_b = b.current_encoding(&ns).await.unwrap();
        assert_eq!(enc_a, enc_b);
        let members = a.read(&ns, |d| d.set_at("members").cloned()).await.unwrap();
        assert_eq!(members.map(|s| s.len()), Some(3));
    }

    #[tokio::test]
    async fn test_wrong_key_counts_undecryptable() {
        let a = engine(1);
        let b = engine(2);
        b.clear_keys();
        b.add_key([0x44; 32], true);
        let ns = ns();
        a.open(&ns).await.unwrap();
        b.open(&ns).await.unwrap();

        a.edit(&ns, |p| p.set_text("name", "alice")).await.unwrap();
        let push = a.push(&ns).await.unwrap();

        let report = b.ingest(&ns, vec![push.message]).await.unwrap();
        assert_eq!(report.undecryptable, 1);
        assert!(report.merge.merged.is_empty());
    }

    #[tokio::test]
    async fn test_old_key_still_opens_after_rotation() {
        let a = engine(1);
        let ns = ns();
        a.open(&ns).await.unwrap();
        a.edit(&ns, |p| p.set_text("name", "alice")).await.unwrap();
        let push = a.push(&ns).await.unwrap();

        // B rotated to a new sealing key but kept the old one at low
        // priority.
        let b = engine(2);
        b.clear_keys();
        b.add_key([0x55; 32], true);
        b.add_key(SHARED_KEY, false);
        b.open(&ns).await.unwrap();

        let report = b.ingest(&ns, vec![push.message]).await.unwrap();
        assert_eq!(report.undecryptable, 0);
        assert_eq!(report.merge.merged.len(), 1);
    }

    #[tokio::test]
    async fn test_tampered_message_rejected() {
        let a = engine(1);
        let b = engine(2);
        let ns = ns();
        a.open(&ns).await.unwrap();
        b.open(&ns).await.unwrap();

        a.edit(&ns, |p| p.set_text("name", "alice")).await.unwrap();
        let push = a.push(&ns).await.unwrap();

        // Forge an envelope whose hash does not match its payload and
        // seal it with the right key.
        let envelope = Envelope::create(&Keypair::from_seed(&[9; 32]), b"d1:ai1ee".to_vec());
        let mut dict = canonical::decode_dict(&envelope.encode()).unwrap();
        dict.insert("h".into(), convergent_core::Value::from(vec![0u8; 32]));
        let forged_wire = canonical::encode_dict(&dict);
        let forged = encrypt::seal(&SHARED_KEY, ns.as_str(), &forged_wire).unwrap();

        let report = b.ingest(&ns, vec![forged, push.message]).await.unwrap();
        assert_eq!(report.rejected, 1);
        // The honest message still merges.
        assert_eq!(report.merge.merged.len(), 1);
    }

    #[tokio::test]
    async fn test_no_keys_error() {
        let a = engine(1);
        a.clear_keys();
        let ns = ns();
        a.open(&ns).await.unwrap();
        assert!(matches!(
            a.push(&ns).await,
            Err(EngineError::NoKeys)
        ));
        assert!(matches!(
            a.ingest(&ns, Vec::new()).await,
            Err(EngineError::NoKeys)
        ));
    }

    #[tokio::test]
    async fn test_unknown_namespace_error() {
        let a = engine(1);
        assert!(matches!(
            a.needs_push(&ns()).await,
            Err(EngineError::UnknownNamespace(_))
        ));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let store = MemoryStore::new();
        let ns = ns();
        {
            let a = SyncEngine::new(Keypair::from_seed(&[1; 32]), store);
            a.add_key(SHARED_KEY, true);
            a.open(&ns).await.unwrap();
            a.edit(&ns, |p| p.set_positive_int("priority", 7))
                .await
                .unwrap();
            a.close(&ns).await.unwrap();

            // Reuse the same backing store for the "restarted" engine.
            let b = SyncEngine::new(Keypair::from_seed(&[1; 32]), take_store(a));
            b.add_key(SHARED_KEY, true);
            b.open(&ns).await.unwrap();
            assert_eq!(b.int_at(&ns, "priority").await.unwrap(), Some(7));
            assert!(b.needs_push(&ns).await.unwrap());
        }
    }

    fn take_store(engine: SyncEngine<MemoryStore>) -> MemoryStore {
        Arc::try_unwrap(engine.store).unwrap_or_else(|_| panic!("store still shared"))
    }

    #[tokio::test]
    async fn test_sqlite_backed_engine_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convergent.db");
        let ns = ns();

        {
            let store = convergent_store::SqliteStore::open(&path).unwrap();
            let a = SyncEngine::new(Keypair::from_seed(&[1; 32]), store);
            a.add_key(SHARED_KEY, true);
            a.open(&ns).await.unwrap();
            a.edit(&ns, |p| p.set_text("name", "alice")).await.unwrap();
            a.close(&ns).await.unwrap();
        }

        let store = convergent_store::SqliteStore::open(&path).unwrap();
        let b = SyncEngine::new(Keypair::from_seed(&[1; 32]), store);
        b.add_key(SHARED_KEY, true);
        b.open(&ns).await.unwrap();
        assert_eq!(b.text_at(&ns, "name").await.unwrap().as_deref(), Some("alice"));
        assert!(b.needs_push(&ns).await.unwrap());
    }

    #[tokio::test]
    async fn test_group_records_converge_across_devices() {
        use convergent_core::{Group, NotifyMode, SessionId};

        let a = engine(1);
        let b = engine(2);
        let ns = Namespace::new("UserGroups");
        a.open(&ns).await.unwrap();
        b.open(&ns).await.unwrap();

        let study = SessionId::from_pubkey([0x11; 32]);
        let book_club = SessionId::from_pubkey([0x22; 32]);
        a.edit(&ns, |p| {
            p.set_group(
                &study,
                &Group {
                    name: "rust study".into(),
                    priority: 1,
                    notifications: NotifyMode::MentionsOnly,
                    ..Group::default()
                },
            )
        })
        .await
        .unwrap();
        b.edit(&ns, |p| {
            p.set_group(
                &book_club,
                &Group {
                    name: "book club".into(),
                    joined_at: 1_700_000_000,
                    ..Group::default()
                },
            )
        })
        .await
        .unwrap();

        let push_a = a.push(&ns).await.unwrap();
        let push_b = b.push(&ns).await.unwrap();
        a.confirm_pushed(&ns, &push_a).await.unwrap();
        b.confirm_pushed(&ns, &push_b).await.unwrap();
        a.ingest(&ns, vec![push_b.message.clone()]).await.unwrap();
        b.ingest(&ns, vec![push_a.message.clone()]).await.unwrap();

        for e in [&a, &b] {
            let groups = e
                .read(&ns, convergent_core::groups::groups_in)
                .await
                .unwrap();
            assert_eq!(groups.len(), 2);
            assert_eq!(groups[0].1.name, "rust study");
            assert_eq!(groups[1].1.name, "book club");
        }
        assert_eq!(
            a.current_encoding(&ns).await.unwrap(),
            b.current_encoding(&ns).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let a = engine(1);
        let profile = Namespace::new("UserProfile");
        let contacts = Namespace::new("Contacts");
        a.open(&profile).await.unwrap();
        a.open(&contacts).await.unwrap();

        a.edit(&profile, |p| p.set_text("name", "alice"))
            .await
            .unwrap();
        assert!(a.needs_push(&profile).await.unwrap());
        assert!(!a.needs_push(&contacts).await.unwrap());
        assert_eq!(a.namespaces().await, vec![contacts, profile]);
    }
}
