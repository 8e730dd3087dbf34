//! Local storage backend: one redb file holding JSON-encoded records.
//!
//! Tables:
//!   subscriptions: playlist_id → {title, itemCount, readItemCount}
//!   meta:          "recent_error" → {message, displayableMessage, occurred_at}
//!
//! redb calls are synchronous and short; the async trait methods just call
//! through.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::BTreeMap;

use super::SubscriptionStore;
use crate::subscription::{ErrorRecord, SubscriptionRecord};

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const SUBSCRIPTIONS: JsonTable = TableDefinition::new("subscriptions");
const META: JsonTable = TableDefinition::new("meta");

const RECENT_ERROR_KEY: &str = "recent_error";

pub struct LocalStorage {
    db: Database,
}

impl LocalStorage {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let db = Database::create(path)
            .with_context(|| format!("failed to open subscription db at {}", path.display()))?;
        // Ensure tables exist
        let txn = db.begin_write()?;
        {
            txn.open_table(SUBSCRIPTIONS)?;
            txn.open_table(META)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Default path: `<data_dir>/playlist-watch/subscriptions.redb`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .context("Failed to get data directory")?
            .join("playlist-watch");
        Ok(data_dir.join("subscriptions.redb"))
    }

    fn read_value(&self, table: JsonTable, key: &str) -> Result<Option<Vec<u8>>> {
        let rtxn = self.db.begin_read()?;
        let table = rtxn.open_table(table)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn write_value(&self, table: JsonTable, key: &str, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn remove_value(&self, table: JsonTable, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(table)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        txn.commit()?;
        Ok(removed)
    }
}

fn decode_record(id: &str, bytes: &[u8]) -> Result<SubscriptionRecord> {
    let mut record: SubscriptionRecord = serde_json::from_slice(bytes)
        .with_context(|| format!("corrupt subscription record for {}", id))?;
    record.id = id.to_string();
    Ok(record)
}

#[async_trait]
impl SubscriptionStore for LocalStorage {
    fn backend_name(&self) -> &str {
        "local"
    }

    async fn get(&self, id: &str) -> Result<Option<SubscriptionRecord>> {
        let Some(bytes) = self.read_value(SUBSCRIPTIONS, id)? else {
            return Ok(None);
        };
        match decode_record(id, &bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable subscription {}: {:#}", id, e);
                Ok(None)
            }
        }
    }

    async fn get_all(&self) -> Result<BTreeMap<String, SubscriptionRecord>> {
        let rtxn = self.db.begin_read()?;
        let table = rtxn.open_table(SUBSCRIPTIONS)?;
        let mut records = BTreeMap::new();
        for item in table.iter()? {
            let (key, val) = item?;
            let id = key.value().to_string();
            match decode_record(&id, val.value()) {
                Ok(record) => {
                    records.insert(id, record);
                }
                Err(e) => tracing::warn!("Skipping unreadable subscription {}: {:#}", id, e),
            }
        }
        Ok(records)
    }

    async fn put(&self, id: &str, record: &SubscriptionRecord) -> Result<()> {
        let json = serde_json::to_vec(record)?;
        self.write_value(SUBSCRIPTIONS, id, &json)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.remove_value(SUBSCRIPTIONS, id)?;
        Ok(())
    }

    async fn recent_error(&self) -> Result<Option<ErrorRecord>> {
        match self.read_value(META, RECENT_ERROR_KEY)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).context("corrupt error record")?,
            )),
            None => Ok(None),
        }
    }

    async fn set_recent_error(&self, error: &ErrorRecord) -> Result<()> {
        let json = serde_json::to_vec(error)?;
        self.write_value(META, RECENT_ERROR_KEY, &json)
    }

    async fn clear_recent_error(&self) -> Result<bool> {
        self.remove_value(META, RECENT_ERROR_KEY)
    }
}
