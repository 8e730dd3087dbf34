//! Badge / notification surface.
//!
//! The engine only ever writes here. UI collaborators read the current
//! [`BadgeState`] back through the `status` request.

use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Sink for the aggregate signal produced by reconciliation.
pub trait Notifier: Send + Sync {
    /// Show `count` new items; 0 clears the indicator.
    fn show_count(&self, count: u64);

    /// Replace the indicator with an error marker.
    fn show_error(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "lowercase")]
pub enum BadgeState {
    Clear,
    Count(u64),
    Error,
}

impl BadgeState {
    /// Text a browser-action style badge would show.
    pub fn text(&self) -> String {
        match self {
            BadgeState::Clear => String::new(),
            BadgeState::Count(n) => n.to_string(),
            BadgeState::Error => "!".to_string(),
        }
    }
}

/// Shared badge state. Clones point at the same badge.
#[derive(Debug, Clone)]
pub struct Badge {
    state: Arc<Mutex<BadgeState>>,
}

impl Default for Badge {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(BadgeState::Clear)),
        }
    }
}

impl Badge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> BadgeState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, next: BadgeState) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state != next {
            tracing::info!("Badge: {:?} -> {:?}", *state, next);
        }
        *state = next;
    }
}

impl Notifier for Badge {
    fn show_count(&self, count: u64) {
        if count == 0 {
            self.set(BadgeState::Clear);
        } else {
            self.set(BadgeState::Count(count));
        }
    }

    fn show_error(&self) {
        self.set(BadgeState::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_transitions() {
        let badge = Badge::new();
        assert_eq!(badge.current(), BadgeState::Clear);

        badge.show_count(5);
        assert_eq!(badge.current(), BadgeState::Count(5));
        assert_eq!(badge.current().text(), "5");

        badge.show_error();
        assert_eq!(badge.current().text(), "!");

        badge.show_count(0);
        assert_eq!(badge.current(), BadgeState::Clear);
        assert_eq!(badge.current().text(), "");
    }

    #[test]
    fn test_clones_share_state() {
        let badge = Badge::new();
        let ui_side = badge.clone();
        badge.show_count(3);
        assert_eq!(ui_side.current(), BadgeState::Count(3));
    }

    #[test]
    fn test_serialized_shape() {
        assert_eq!(
            serde_json::to_value(BadgeState::Count(2)).unwrap(),
            serde_json::json!({"kind": "count", "count": 2})
        );
        assert_eq!(
            serde_json::to_value(BadgeState::Error).unwrap(),
            serde_json::json!({"kind": "error"})
        );
    }
}
