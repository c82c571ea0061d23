use crate::gate::schedule::EventInstanceKey;
use opendal::{ErrorKind, Operator};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};

/// Directory (or key prefix) holding one JSON document per event instance
pub const LEDGER_DIR: &str = "ledger";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger storage failed for partition {key}: {source}")]
    Storage {
        key: EventInstanceKey,
        #[source]
        source: opendal::Error,
    },

    #[error("Ledger partition {key} is corrupt: {source}")]
    Corrupt {
        key: EventInstanceKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("Ledger partition {key} could not be encoded: {source}")]
    Encode {
        key: EventInstanceKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Joins the parts of a composite identity; parts must not contain it
pub const IDENTITY_SEPARATOR: char = '|';

/// Identity used for guest-record de-duplication: `guest_name|timestamp`
pub fn composite_identity(guest_name: &str, timestamp: &str) -> String {
    format!("{guest_name}{IDENTITY_SEPARATOR}{timestamp}")
}

/// Durable record of consumed identities, partitioned by event instance.
///
/// Every partition is a JSON array stored at `ledger/<key>.json`. Reads and
/// writes of one partition are serialized by a lock owned by that partition
/// alone, so admissions for different events never wait on each other.
#[derive(Debug)]
pub struct ConsumptionLedger {
    operator: Operator,
    partitions: Mutex<HashMap<EventInstanceKey, Arc<TokioMutex<()>>>>,
}

impl ConsumptionLedger {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            partitions: Mutex::new(HashMap::new()),
        }
    }

    /// Mark `identity` as consumed for `key`.
    ///
    /// Returns `Ok(true)` when the identity was not consumed before and the mark
    /// has been persisted, `Ok(false)` when it was already consumed. Nothing is
    /// reported as consumed unless the write succeeded.
    pub async fn check_and_consume(
        &self,
        key: &EventInstanceKey,
        identity: &str,
    ) -> Result<bool, LedgerError> {
        let lock = self.partition_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.consume_locked(key, identity).await
        };
        self.release_partition(key, lock);
        result
    }

    /// Number of identities consumed so far for `key`
    pub async fn consumed_count(&self, key: &EventInstanceKey) -> Result<usize, LedgerError> {
        let lock = self.partition_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.load(key).await.map(|consumed| consumed.len())
        };
        self.release_partition(key, lock);
        result
    }

    async fn consume_locked(
        &self,
        key: &EventInstanceKey,
        identity: &str,
    ) -> Result<bool, LedgerError> {
        let mut consumed = self.load(key).await?;
        if consumed.contains(identity) {
            debug!(instance = %key, identity, "Identity already consumed");
            return Ok(false);
        }

        consumed.insert(identity.to_string());
        self.persist(key, &consumed).await?;

        info!(
            instance = %key,
            identity,
            consumed = consumed.len(),
            "Identity consumed"
        );
        Ok(true)
    }

    fn partition_lock(&self, key: &EventInstanceKey) -> Arc<TokioMutex<()>> {
        self.partitions.lock().entry(key.clone()).or_default().clone()
    }

    /// Forget the lock of a partition nobody else is using.
    ///
    /// Locks are only cloned while the registry is held, so a count of two
    /// (the registry entry and `lock`) means no other task can still reach it.
    fn release_partition(&self, key: &EventInstanceKey, lock: Arc<TokioMutex<()>>) {
        let mut partitions = self.partitions.lock();
        if Arc::strong_count(&lock) == 2 {
            partitions.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_partitions(&self) -> usize {
        self.partitions.lock().len()
    }

    fn partition_path(key: &EventInstanceKey) -> String {
        format!("{LEDGER_DIR}/{key}.json")
    }

    async fn load(&self, key: &EventInstanceKey) -> Result<BTreeSet<String>, LedgerError> {
        let path = Self::partition_path(key);
        match self.operator.read(&path).await {
            Ok(buffer) => serde_json::from_slice(&buffer.to_vec()).map_err(|source| {
                LedgerError::Corrupt {
                    key: key.clone(),
                    source,
                }
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(instance = %key, "No ledger partition yet, starting empty");
                Ok(BTreeSet::new())
            }
            Err(source) => Err(LedgerError::Storage {
                key: key.clone(),
                source,
            }),
        }
    }

    async fn persist(
        &self,
        key: &EventInstanceKey,
        consumed: &BTreeSet<String>,
    ) -> Result<(), LedgerError> {
        let path = Self::partition_path(key);
        let content = serde_json::to_vec(consumed).map_err(|source| LedgerError::Encode {
            key: key.clone(),
            source,
        })?;
        debug!(path, entries = consumed.len(), "Saving ledger partition");

        self.operator
            .write(&path, content)
            .await
            .map_err(|source| LedgerError::Storage {
                key: key.clone(),
                source,
            })?;
        Ok(())
    }
}
