//! In-memory throttle store. One mutex guards the whole map, which makes
//! every `mutate` trivially atomic per key.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{Apply, ThrottleKey, ThrottleRecord, ThrottleStore};

#[derive(Debug, Default)]
pub struct MemoryThrottleStore {
    records: Mutex<HashMap<String, ThrottleRecord>>,
}

impl MemoryThrottleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThrottleStore for MemoryThrottleStore {
    async fn load(&self, key: &ThrottleKey) -> anyhow::Result<Option<ThrottleRecord>> {
        Ok(self.records.lock().await.get(&key.canonical()).copied())
    }

    async fn mutate(&self, key: &ThrottleKey, apply: Apply) -> anyhow::Result<ThrottleRecord> {
        let mut records = self.records.lock().await;
        let record = records.entry(key.canonical()).or_default();
        apply(record);
        Ok(*record)
    }
}
