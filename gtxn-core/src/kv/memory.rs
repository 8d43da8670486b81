//! In-process reference implementation of the KV contract, backed by a
//! `HashMap` guarded by a `tokio::sync::Mutex`. Grounded on the teacher's
//! `storage::memory::Memory` engine (a `BTreeMap`-backed `Engine`), adapted
//! to the async CAS contract of `super::KvStore`.
//!
//! This is the store the CLI and the test suite drive directly; the real
//! external store is an abstract collaborator per spec §1 and is not
//! implemented here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CasVersion, GetResult, KvError, KvResult, KvStore};

struct Entry {
    value: Vec<u8>,
    version: CasVersion,
}

/// Fault injection knobs used by tests exercising spec §8's boundary
/// behaviors (deadline exhaustion, forced conflicts).
#[derive(Debug, Default, Clone)]
pub struct FaultInjector {
    /// Always report a CAS mismatch on `replace` for these keys, regardless
    /// of the version passed in.
    pub always_cas_mismatch_keys: Arc<std::sync::Mutex<std::collections::HashSet<String>>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_mismatch(&self, key: &str) {
        self.always_cas_mismatch_keys
            .lock()
            .unwrap()
            .insert(key.to_string());
    }
}

/// Thread-safe in-memory key-value store with per-key CAS versions.
pub struct MemoryStore {
    data: Mutex<HashMap<String, Entry>>,
    next_version: AtomicU64,
    faults: FaultInjector,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            next_version: AtomicU64::new(1),
            faults: FaultInjector::new(),
        }
    }

    pub fn with_faults(faults: FaultInjector) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            next_version: AtomicU64::new(1),
            faults,
        }
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    fn next_version(&self) -> CasVersion {
        CasVersion(self.next_version.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of live keys, used by benchmark-end consistency checks.
    pub async fn len(&self) -> usize {
        self.data.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<GetResult> {
        let data = self.data.lock().await;
        match data.get(key) {
            Some(entry) => Ok(GetResult {
                value: Some(entry.value.clone()),
                version: Some(entry.version),
                exists: true,
            }),
            None => Ok(GetResult {
                value: None,
                version: None,
                exists: false,
            }),
        }
    }

    async fn insert(&self, key: &str, value: Vec<u8>) -> KvResult<CasVersion> {
        let mut data = self.data.lock().await;
        if data.contains_key(key) {
            return Err(KvError::AlreadyExists);
        }
        let version = self.next_version();
        data.insert(key.to_string(), Entry { value, version });
        Ok(version)
    }

    async fn replace(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: CasVersion,
    ) -> KvResult<CasVersion> {
        if self
            .faults
            .always_cas_mismatch_keys
            .lock()
            .unwrap()
            .contains(key)
        {
            return Err(KvError::CasMismatch);
        }

        let mut data = self.data.lock().await;
        match data.get(key) {
            None => Err(KvError::NotFound),
            Some(entry) if entry.version != expected => Err(KvError::CasMismatch),
            Some(_) => {
                let version = self.next_version();
                data.insert(key.to_string(), Entry { value, version });
                Ok(version)
            }
        }
    }

    async fn remove(&self, key: &str) -> KvResult<()> {
        let mut data = self.data.lock().await;
        data.remove(key);
        Ok(())
    }
}
