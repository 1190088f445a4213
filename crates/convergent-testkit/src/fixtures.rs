//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: devices sharing a
//! namespace key, plus envelope and sealing shortcuts.

use convergent::{MemoryStore, SyncEngine};
use convergent_core::{canonical, encrypt, ContentHash, Dict, Envelope, Keypair, Value};
use convergent_sync::Namespace;

/// A test device: an engine over a memory store with one shared key.
pub struct DeviceFixture {
    pub keypair: Keypair,
    pub engine: SyncEngine<MemoryStore>,
    pub shared_key: [u8; 32],
}

impl DeviceFixture {
    /// Create a device with a deterministic keypair and the given
    /// shared namespace key.
    pub fn with_seed(seed: [u8; 32], shared_key: [u8; 32]) -> Self {
        let keypair = Keypair::from_seed(&seed);
        let engine = SyncEngine::new(keypair.clone(), MemoryStore::new());
        engine.add_key(shared_key, true);
        Self {
            keypair,
            engine,
            shared_key,
        }
    }

    /// Create a device with a random keypair.
    pub fn new(shared_key: [u8; 32]) -> Self {
        Self::with_seed(rand::random(), shared_key)
    }

    /// Build, sign, and seal a configuration message for a namespace,
    /// as this device's push path would.
    pub fn sealed_message(&self, namespace: &Namespace, data: &Dict) -> Vec<u8> {
        let payload = canonical::encode_dict(data);
        let envelope = Envelope::create(&self.keypair, payload);
        encrypt::seal(&self.shared_key, namespace.as_str(), &envelope.encode())
            .expect("sealing fixture message")
    }

    /// The content hash the engine will see for `data`.
    pub fn payload_hash(&self, data: &Dict) -> ContentHash {
        ContentHash::hash(&canonical::encode_dict(data))
    }
}

/// Create `n` devices sharing one namespace key, with deterministic
/// keypairs.
pub fn multi_device_fixtures(n: usize, shared_key: [u8; 32]) -> Vec<DeviceFixture> {
    (0..n)
        .map(|i| DeviceFixture::with_seed([i as u8 + 1; 32], shared_key))
        .collect()
}

/// Build a dict from entry pairs; test shorthand.
pub fn dict(entries: Vec<(&str, Value)>) -> Dict {
    entries.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
}

/// Install a compact tracing subscriber for a test run. Safe to call
/// more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergent::DictExt;

    #[tokio::test]
    async fn test_fixture_message_round_trips_through_engine() {
        init_tracing();
        let key = [0x77u8; 32];
        let devices = multi_device_fixtures(2, key);
        let ns = Namespace::new("UserProfile");

        let data = dict(vec![("name", Value::from("alice"))]);
        let message = devices[0].sealed_message(&ns, &data);

        devices[1].engine.open(&ns).await.unwrap();
        let report = devices[1].engine.ingest(&ns, vec![message]).await.unwrap();
        assert_eq!(report.merge.merged, vec![devices[0].payload_hash(&data)]);
        assert_eq!(
            devices[1].engine.text_at(&ns, "name").await.unwrap().as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_fixtures_are_deterministic() {
        let key = [0x77u8; 32];
        let a = multi_device_fixtures(3, key);
        let b = multi_device_fixtures(3, key);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.keypair.public_key(), y.keypair.public_key());
        }
    }

    #[tokio::test]
    async fn test_three_devices_converge() {
        let key = [0x66u8; 32];
        let devices = multi_device_fixtures(3, key);
        let ns = Namespace::new("Contacts");
        for d in &devices {
            d.engine.open(&ns).await.unwrap();
        }

        // Each device contributes one disjoint entry.
        let names = ["alice", "bob", "carol"];
        let mut pushes = Vec::new();
        for (d, name) in devices.iter().zip(names) {
            d.engine
                .edit(&ns, |p| {
                    p.set_mut("members").insert(name.into());
                })
                .await
                .unwrap();
            let push = d.engine.push(&ns).await.unwrap();
            d.engine.confirm_pushed(&ns, &push).await.unwrap();
            pushes.push(push.message);
        }

        // Everyone sees everyone's messages, in a different order each.
        for (i, d) in devices.iter().enumerate() {
            let mut batch = pushes.clone();
            batch.rotate_left(i);
            d.engine.ingest(&ns, batch).await.unwrap();
        }

        let reference = devices[0].engine.current_encoding(&ns).await.unwrap();
        for d in &devices[1..] {
            assert_eq!(d.engine.current_encoding(&ns).await.unwrap(), reference);
        }
        let members = devices[0]
            .engine
            .read(&ns, |d| d.set_at("members").map(|s| s.len()))
            .await
            .unwrap();
        assert_eq!(members, Some(3));
    }
}
