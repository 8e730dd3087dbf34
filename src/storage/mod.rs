//! Storage abstraction for subscriptions.
//!
//! - [`LocalStorage`]: redb file on disk (default)
//! - [`MemoryStorage`]: in-process map, for tests and `serve --ephemeral`
//!
//! The engine holds one `SubscriptionStore` and every read-modify-write goes
//! through it. Stores do no locking across calls; sequencing is the engine's
//! job.

pub mod local;
pub mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::subscription::{ErrorRecord, SubscriptionRecord};

/// Key-value persistence for subscription records plus the error slot.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Human-readable backend name (e.g., "local", "memory").
    fn backend_name(&self) -> &str;

    // ── Subscriptions ────────────────────────────────────────────────

    async fn get(&self, id: &str) -> Result<Option<SubscriptionRecord>>;

    /// Every stored record, keyed by playlist ID.
    async fn get_all(&self) -> Result<BTreeMap<String, SubscriptionRecord>>;

    /// Full overwrite of the record under `id`.
    async fn put(&self, id: &str, record: &SubscriptionRecord) -> Result<()>;

    /// Remove `id`. Removing an absent key is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    // ── Error slot ───────────────────────────────────────────────────

    async fn recent_error(&self) -> Result<Option<ErrorRecord>>;

    /// Overwrites whatever error was there before.
    async fn set_recent_error(&self, error: &ErrorRecord) -> Result<()>;

    /// Returns true if an error was actually cleared.
    async fn clear_recent_error(&self) -> Result<bool>;
}
