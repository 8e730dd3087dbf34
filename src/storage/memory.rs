//! In-memory storage backend. Nothing survives the process.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::SubscriptionStore;
use crate::subscription::{ErrorRecord, SubscriptionRecord};

#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<BTreeMap<String, SubscriptionRecord>>,
    recent_error: Mutex<Option<ErrorRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("lock poisoned: {e}")
}

#[async_trait]
impl SubscriptionStore for MemoryStorage {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn get(&self, id: &str) -> Result<Option<SubscriptionRecord>> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records.get(id).cloned())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, SubscriptionRecord>> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records.clone())
    }

    async fn put(&self, id: &str, record: &SubscriptionRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let mut record = record.clone();
        record.id = id.to_string();
        records.insert(id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records.remove(id);
        Ok(())
    }

    async fn recent_error(&self) -> Result<Option<ErrorRecord>> {
        Ok(self.recent_error.lock().map_err(poisoned)?.clone())
    }

    async fn set_recent_error(&self, error: &ErrorRecord) -> Result<()> {
        *self.recent_error.lock().map_err(poisoned)? = Some(error.clone());
        Ok(())
    }

    async fn clear_recent_error(&self) -> Result<bool> {
        Ok(self.recent_error.lock().map_err(poisoned)?.take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_normalizes_id_to_key() {
        let store = MemoryStorage::new();
        let rec = SubscriptionRecord::seeded("wrong", "Mix", 2);
        store.put("PL1", &rec).await.unwrap();
        assert_eq!(store.get("PL1").await.unwrap().unwrap().id, "PL1");
        assert!(store.get("wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_slot_take() {
        let store = MemoryStorage::new();
        store.set_recent_error(&ErrorRecord::new("boom", "oops")).await.unwrap();
        assert!(store.clear_recent_error().await.unwrap());
        assert!(!store.clear_recent_error().await.unwrap());
    }
}
