//! Push notifications
//!
//! Plain-text HTTP POST to an ntfy-style `{server}/{topic}` endpoint.
//! Every send is best-effort: callers log failures and carry on.

use crate::models::FailureReason;
use async_trait::async_trait;
use mediasync_common::config::NotificationSettings;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("mediasync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Notification transport errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP client could not be built
    #[error("Client setup error: {0}")]
    ClientError(String),

    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Endpoint answered with a non-success status
    #[error("Endpoint error {0}: {1}")]
    EndpointError(u16, String),
}

/// Message kinds, mapped to ntfy tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    CardDetected,
    FileImported,
    ImportFailed,
    BatchSummary,
}

impl NotificationKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::CardDetected => "floppy_disk",
            Self::FileImported => "camera",
            Self::ImportFailed => "warning",
            Self::BatchSummary => "package",
        }
    }
}

/// One outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn card_detected(card: &str) -> Self {
        Self {
            kind: NotificationKind::CardDetected,
            title: "Media Importer".to_string(),
            body: format!("SD card detected: {}", card),
        }
    }

    pub fn file_imported(filename: &str) -> Self {
        Self {
            kind: NotificationKind::FileImported,
            title: "Media Importer".to_string(),
            body: format!("Successfully imported {}", filename),
        }
    }

    /// Copy or verification failure; nothing was archived under this name
    pub fn import_failed(filename: &str, reason: FailureReason) -> Self {
        let body = match reason {
            FailureReason::Verification => format!("VERIFICATION FAILED: {}", filename),
            _ => format!("IMPORT FAILED ({}): {}", reason, filename),
        };
        Self {
            kind: NotificationKind::ImportFailed,
            title: "Media Importer".to_string(),
            body,
        }
    }

    pub fn batch_summary(body: String) -> Self {
        Self {
            kind: NotificationKind::BatchSummary,
            title: "Media Importer Notification".to_string(),
            body,
        }
    }
}

/// Notification transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sends nothing; used when notifications are off or unconfigured
#[derive(Debug, Default, Clone)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// ntfy HTTP client
pub struct NtfyNotifier {
    http_client: reqwest::Client,
    endpoint: String,
}

impl NtfyNotifier {
    pub fn new(endpoint: String) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| NotifyError::ClientError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::debug!(endpoint = %self.endpoint, kind = ?notification.kind, "Sending notification");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Title", notification.title.as_str())
            .header("Priority", "default")
            .header("Tags", notification.kind.tag())
            .body(notification.body.clone().into_bytes())
            .send()
            .await
            .map_err(|e| NotifyError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotifyError::EndpointError(status.as_u16(), error_text));
        }

        Ok(())
    }
}

/// Pick the transport for the given settings
///
/// Missing server or topic, or `enabled = false`, silently yields the
/// disabled notifier.
pub fn build_notifier(settings: &NotificationSettings) -> Result<Arc<dyn Notifier>, NotifyError> {
    match settings.endpoint() {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Notifications enabled");
            Ok(Arc::new(NtfyNotifier::new(endpoint)?))
        }
        None => {
            tracing::info!("Notifications disabled");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

/// Send and log; never fails the caller
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.send(notification).await {
        tracing::warn!(kind = ?notification.kind, error = %e, "Failed to send notification");
    }
}
