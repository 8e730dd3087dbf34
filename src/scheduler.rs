//! Recurring reconciliation timer.
//!
//! One pass at startup, then one every `interval` with the first scheduled
//! pass after `initial_delay`. Ticks missed while a slow pass was running
//! are dropped, not replayed.

use std::sync::Arc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::PollConfig;
use crate::engine::{Engine, PassOutcome};

/// Run one pass, logging instead of propagating store failures.
pub async fn run_pass(engine: &Engine) -> Option<PassOutcome> {
    match engine.reconcile_all().await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::warn!("Playlist update failed: {:#}", e);
            None
        }
    }
}

/// Drive the schedule forever. Spawn this on the runtime.
pub async fn run(engine: Arc<Engine>, poll: PollConfig) {
    if poll.run_on_startup {
        run_pass(&engine).await;
    }

    let mut ticker = time::interval_at(Instant::now() + poll.initial_delay(), poll.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        "Polling every {}s (first scheduled run in {}s)",
        poll.interval().as_secs(),
        poll.initial_delay().as_secs()
    );

    loop {
        ticker.tick().await;
        run_pass(&engine).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::FakeCatalog;
    use crate::notify::Badge;
    use crate::storage::{MemoryStorage, SubscriptionStore};
    use crate::subscription::SubscriptionRecord;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    async fn seeded_engine() -> (Arc<Engine>, Arc<FakeCatalog>) {
        let store = Arc::new(MemoryStorage::new());
        store.put("A", &SubscriptionRecord::seeded("A", "Mix", 1)).await.unwrap();
        let catalog = Arc::new(FakeCatalog::default());
        catalog.set("A", "Mix", 1);
        let engine = Engine::new(store, catalog.clone(), Arc::new(Badge::new()));
        (Arc::new(engine), catalog)
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_pass_then_interval() {
        let (engine, catalog) = seeded_engine().await;
        let poll = PollConfig::default();

        let handle = tokio::spawn(run(engine, poll));

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);

        // Scheduled passes at 60s and 120s
        time::sleep(Duration::from_secs(95)).await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_startup_pass_when_disabled() {
        let (engine, catalog) = seeded_engine().await;
        let poll = PollConfig {
            interval_secs: 10,
            initial_delay_secs: 5,
            run_on_startup: false,
        };

        let handle = tokio::spawn(run(engine, poll));

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);

        // Passes at 5s and 15s
        time::sleep(Duration::from_secs(14)).await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 2);

        handle.abort();
    }
}
