//! JSON-lines request surface for UI collaborators.
//!
//! One request per line in, one response per line out:
//!
//! ```text
//! → {"cmd": "subscribe", "id": "PLxxxx"}
//! ← {"success": true}
//! → {"cmd": "is_subscribed", "id": "PLxxxx"}
//! ← {"success": true, "data": true}
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::engine::{Engine, PassOutcome};
use crate::notify::Badge;

const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong!";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Subscribe { id: String },
    Unsubscribe { id: String },
    IsSubscribed { id: String },
    /// Mark a playlist as seen
    Acknowledge { id: String },
    List,
    Status,
    /// Run a reconciliation pass now
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok() -> Self {
        Self { success: true, message: None, data: None }
    }

    pub fn ok_with<T: Serialize>(data: T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self { success: true, message: None, data: Some(data) },
            Err(e) => Self::fail(format!("could not encode response: {}", e)),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), data: None }
    }
}

/// Dispatches requests into the engine.
pub struct Service {
    engine: Arc<Engine>,
    badge: Badge,
}

impl Service {
    pub fn new(engine: Arc<Engine>, badge: Badge) -> Self {
        Self { engine, badge }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Subscribe { id } => match self.engine.subscribe(&id).await {
                Ok(_) => Response::ok(),
                Err(error) => Response::fail(error.displayable_message),
            },
            Request::Unsubscribe { id } => match self.engine.unsubscribe(&id).await {
                Ok(()) => Response::ok(),
                Err(e) => self.internal_failure("unsubscribe", e),
            },
            Request::IsSubscribed { id } => match self.engine.is_subscribed(&id).await {
                Ok(subscribed) => Response::ok_with(subscribed),
                Err(e) => self.internal_failure("is_subscribed", e),
            },
            Request::Acknowledge { id } => match self.engine.acknowledge(&id).await {
                Ok(unread) => Response::ok_with(unread),
                Err(e) => self.internal_failure("acknowledge", e),
            },
            Request::List => match self.engine.list().await {
                Ok(rows) => Response::ok_with(rows),
                Err(e) => self.internal_failure("list", e),
            },
            Request::Status => self.status().await,
            Request::Refresh => match self.engine.reconcile_all().await {
                Ok(PassOutcome::Completed(report)) => Response::ok_with(report),
                Ok(PassOutcome::Skipped) => Response {
                    message: Some("An update is already running".to_string()),
                    ..Response::ok()
                },
                Ok(PassOutcome::Failed(error)) => Response::fail(error.displayable_message),
                Err(e) => self.internal_failure("refresh", e),
            },
        }
    }

    /// Parse and handle one line; malformed input gets a failure response.
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                tracing::debug!("Request: {:?}", request);
                self.handle(request).await
            }
            Err(e) => Response::fail(format!("invalid request: {}", e)),
        }
    }

    async fn status(&self) -> Response {
        let unread = match self.engine.unread_total().await {
            Ok(unread) => unread,
            Err(e) => return self.internal_failure("status", e),
        };
        let error = match self.engine.recent_error().await {
            Ok(error) => error,
            Err(e) => return self.internal_failure("status", e),
        };
        let badge = self.badge.current();

        Response::ok_with(json!({
            "badge": badge,
            "badge_text": badge.text(),
            "unread": unread,
            "error": error,
        }))
    }

    fn internal_failure(&self, what: &str, e: anyhow::Error) -> Response {
        tracing::warn!("{} failed: {:#}", what, e);
        Response::fail(GENERIC_FAILURE_MESSAGE)
    }
}

/// Serve requests from `reader` until EOF, writing responses to `writer`.
pub async fn serve<R, W>(service: &Service, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = service.handle_line(line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    Ok(())
}
