//! Reconciliation engine.
//!
//! Owns the read-modify-write sequences over the subscription store:
//! subscribing, unsubscribing, acknowledging, and the periodic pass that
//! diffs fresh item counts against what we recorded last time.
//!
//! Two guards keep those sequences honest:
//! - `write_lock` serializes every store mutation. Network calls happen
//!   outside it, and the pass re-reads each record under it, so an
//!   unsubscribe that lands mid-fetch is never resurrected. A record whose
//!   total moved since the pass read it was reseeded by a subscribe that
//!   finished mid-fetch; its counts are newer than the pass's, so it is
//!   left alone.
//! - `pass_guard` lets only one reconciliation pass run at a time; an
//!   overlapping tick is skipped rather than queued.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::{CatalogClient, CollectionInfo};
use crate::notify::Notifier;
use crate::storage::SubscriptionStore;
use crate::subscription::{
    aggregate_unread, parse_playlist_id, summarize, ErrorRecord, SubscriptionRecord,
    SubscriptionSummary,
};

pub const SUBSCRIBE_FAILED_MESSAGE: &str = "Sorry, we couldn't add your playlist.";
pub const UPDATE_FAILED_MESSAGE: &str = "Something went wrong fetching your playlist updates.";

/// What applying one fetched playlist did to its record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Change {
    pub title_changed: bool,
    /// Items added since the last observed total
    pub new_items: u64,
    /// The playlist got smaller; both counts were collapsed
    pub shrunk: bool,
}

impl Change {
    pub fn is_dirty(&self) -> bool {
        self.title_changed || self.new_items > 0 || self.shrunk
    }
}

/// Apply a fresh observation to a stored record.
///
/// Growth advances `total_count` and leaves `read_count` alone, so the
/// unread delta grows. Shrinkage collapses both counts to the new total:
/// removed items are tracked, never reported as new.
pub fn apply_fetched(record: &mut SubscriptionRecord, fetched: &CollectionInfo) -> Change {
    let mut change = Change::default();

    if record.title != fetched.title {
        record.title = fetched.title.clone();
        change.title_changed = true;
    }

    if fetched.item_count > record.total_count {
        change.new_items = fetched.item_count - record.total_count;
        record.total_count = fetched.item_count;
    } else if fetched.item_count < record.total_count {
        record.total_count = fetched.item_count;
        record.read_count = fetched.item_count;
        change.shrunk = true;
    }

    change
}

/// Summary of one completed reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Playlists the API returned
    pub checked: usize,
    /// Records written back
    pub changed: usize,
    /// Sum of growth across all playlists
    pub new_items: u64,
    /// Subscribed IDs the API did not return
    pub missing: usize,
    /// Returned playlists whose record vanished or was reseeded mid-pass
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was already running
    Skipped,
    Completed(ReconcileReport),
    /// The batch fetch failed; nothing was mutated
    Failed(ErrorRecord),
}

pub struct Engine {
    store: Arc<dyn SubscriptionStore>,
    catalog: Arc<dyn CatalogClient>,
    notifier: Arc<dyn Notifier>,
    write_lock: Mutex<()>,
    pass_guard: Mutex<()>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        catalog: Arc<dyn CatalogClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            write_lock: Mutex::new(()),
            pass_guard: Mutex::new(()),
        }
    }

    // ── Subscribe / unsubscribe ──────────────────────────────────────

    /// Subscribe to a playlist by ID or URL, seeding both counts from the
    /// API so it starts with nothing unread.
    ///
    /// On failure the error slot and badge are set and the recorded error
    /// is returned.
    pub async fn subscribe(&self, input: &str) -> Result<SubscriptionRecord, ErrorRecord> {
        let Some(id) = parse_playlist_id(input) else {
            return Err(self
                .record_failure(format!("not a playlist id or url: {:?}", input), SUBSCRIBE_FAILED_MESSAGE)
                .await);
        };

        tracing::info!("Subscribing to playlist {}", id);

        let fetched = match self.catalog.fetch_collections(std::slice::from_ref(&id)).await {
            Ok(fetched) => fetched,
            Err(e) => return Err(self.record_failure(e.to_string(), SUBSCRIBE_FAILED_MESSAGE).await),
        };

        let Some(info) = fetched.get(&id) else {
            return Err(self
                .record_failure(format!("playlist {} not found", id), SUBSCRIBE_FAILED_MESSAGE)
                .await);
        };

        let record = SubscriptionRecord::seeded(id.as_str(), info.title.as_str(), info.item_count);
        let stored = {
            let _write = self.write_lock.lock().await;
            self.store.put(&id, &record).await
        };
        if let Err(e) = stored {
            return Err(self.record_failure(format!("{:#}", e), SUBSCRIBE_FAILED_MESSAGE).await);
        }

        self.record_success().await;
        Ok(record)
    }

    /// Remove a subscription. Absent IDs are fine.
    pub async fn unsubscribe(&self, input: &str) -> Result<()> {
        let id = normalize_id(input);
        tracing::info!("Unsubscribing from playlist {}", id);

        let _write = self.write_lock.lock().await;
        self.store.delete(&id).await
    }

    pub async fn is_subscribed(&self, input: &str) -> Result<bool> {
        Ok(self.store.get(&normalize_id(input)).await?.is_some())
    }

    // ── Popup operations ─────────────────────────────────────────────

    /// Mark everything in a playlist as seen and refresh the badge with
    /// the remaining unread total, which is returned.
    pub async fn acknowledge(&self, input: &str) -> Result<u64> {
        let id = normalize_id(input);

        let unread = {
            let _write = self.write_lock.lock().await;
            if let Some(mut record) = self.store.get(&id).await? {
                if record.read_count != record.total_count {
                    record.read_count = record.total_count;
                    self.store.put(&id, &record).await?;
                    tracing::debug!("Acknowledged {} at {} items", id, record.total_count);
                }
            }
            aggregate_unread(self.store.get_all().await?.values())
        };

        self.notifier.show_count(unread);
        Ok(unread)
    }

    pub async fn list(&self) -> Result<Vec<SubscriptionSummary>> {
        Ok(summarize(&self.store.get_all().await?))
    }

    pub async fn unread_total(&self) -> Result<u64> {
        Ok(aggregate_unread(self.store.get_all().await?.values()))
    }

    pub async fn recent_error(&self) -> Result<Option<ErrorRecord>> {
        self.store.recent_error().await
    }

    /// Put the badge back in a state consistent with the store: the error
    /// marker if an error is recorded, otherwise the unread total.
    pub async fn restore_badge(&self) -> Result<()> {
        if self.store.recent_error().await?.is_some() {
            self.notifier.show_error();
        } else {
            self.notifier.show_count(self.unread_total().await?);
        }
        Ok(())
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Fetch every subscribed playlist in one call and fold the results
    /// into the store.
    ///
    /// Catalog failures are absorbed into the error slot and reported as
    /// [`PassOutcome::Failed`]; only store failures come back as `Err`.
    pub async fn reconcile_all(&self) -> Result<PassOutcome> {
        let Ok(_pass) = self.pass_guard.try_lock() else {
            tracing::debug!("Reconciliation already running, skipping this one");
            return Ok(PassOutcome::Skipped);
        };

        let records = self.store.get_all().await?;
        if records.is_empty() {
            return Ok(PassOutcome::Completed(ReconcileReport::default()));
        }

        let ids: Vec<String> = records.keys().cloned().collect();
        tracing::info!("Updating {} playlist(s)", ids.len());

        let fetched = match self.catalog.fetch_collections(&ids).await {
            Ok(fetched) => fetched,
            Err(e) => {
                return Ok(PassOutcome::Failed(
                    self.record_failure(e.to_string(), UPDATE_FAILED_MESSAGE).await,
                ))
            }
        };

        let mut report = ReconcileReport {
            checked: fetched.len(),
            ..Default::default()
        };

        {
            let _write = self.write_lock.lock().await;
            for id in &ids {
                let Some(info) = fetched.get(id) else {
                    report.missing += 1;
                    tracing::debug!("Playlist {} not returned by the API", id);
                    continue;
                };

                // Re-read under the lock; the snapshot above may be stale
                let Some(mut record) = self.store.get(id).await? else {
                    report.skipped += 1;
                    tracing::debug!("Playlist {} was unsubscribed during the pass", id);
                    continue;
                };

                if records.get(id).map(|r| r.total_count) != Some(record.total_count) {
                    report.skipped += 1;
                    tracing::debug!("Playlist {} was resubscribed during the pass", id);
                    continue;
                }

                let change = apply_fetched(&mut record, info);
                if change.is_dirty() {
                    self.store.put(id, &record).await?;
                    report.changed += 1;
                    tracing::debug!("Updated playlist {}: {:?}", id, change);
                }
                report.new_items += change.new_items;
            }
        }

        let had_error = match self.store.clear_recent_error().await {
            Ok(cleared) => cleared,
            Err(e) => {
                tracing::warn!("Could not clear recent error: {:#}", e);
                false
            }
        };

        if report.new_items > 0 {
            self.notifier.show_count(report.new_items);
        } else if had_error {
            // Take the error marker down; the unread total is what was
            // showing before it went up.
            self.notifier.show_count(self.unread_total().await?);
        }

        tracing::info!(
            "Update finished: {} checked, {} changed, {} new item(s)",
            report.checked,
            report.changed,
            report.new_items
        );
        Ok(PassOutcome::Completed(report))
    }

    // ── Error slot ───────────────────────────────────────────────────

    async fn record_failure(&self, message: String, displayable_message: &str) -> ErrorRecord {
        tracing::warn!("{} ({})", displayable_message, message);
        let error = ErrorRecord::new(message, displayable_message);
        if let Err(e) = self.store.set_recent_error(&error).await {
            tracing::warn!("Could not record error: {:#}", e);
        }
        self.notifier.show_error();
        error
    }

    async fn record_success(&self) {
        match self.store.clear_recent_error().await {
            Ok(true) => {
                if let Err(e) = self.restore_badge().await {
                    tracing::warn!("Could not restore badge: {:#}", e);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not clear recent error: {:#}", e),
        }
    }
}

/// Accept the same inputs as subscribe; fall back to the raw trimmed text
/// so odd legacy keys can still be removed.
fn normalize_id(input: &str) -> String {
    parse_playlist_id(input).unwrap_or_else(|| input.trim().to_string())
}
