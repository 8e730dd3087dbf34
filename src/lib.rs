//! Playlist subscriptions with new-item tracking.
//!
//! Polls the YouTube Data API for every subscribed playlist, diffs item
//! counts against what was recorded last time, and keeps an unread total
//! for a badge-style indicator.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod notify;
pub mod rpc;
pub mod scheduler;
pub mod storage;
pub mod subscription;
