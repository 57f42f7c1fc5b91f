//! Admin webhook forwarder for analyzed transactions

use crate::config::NotificationConfig;
use crate::error::ClassifiedError;
use crate::types::analysis::RiskAnalysis;
use crate::types::transaction::Transaction;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Payload pairing the original transaction with its analysis
#[derive(Debug, Serialize)]
pub struct AdminNotification<'a> {
    pub transaction: &'a Transaction,
    pub analysis: &'a RiskAnalysis,
}

/// Delivery failure of the admin notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("admin webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Destination for analyzed transactions
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        transaction: &Transaction,
        analysis: &RiskAnalysis,
    ) -> Result<(), NotifyError>;
}

/// Posts notifications to the configured admin webhook
#[derive(Clone)]
pub struct AdminNotifier {
    client: reqwest::Client,
    url: String,
}

impl AdminNotifier {
    /// Create a notifier. Fails with ConfigurationError on a bad URL.
    pub fn new(config: &NotificationConfig) -> Result<Self, ClassifiedError> {
        reqwest::Url::parse(&config.webhook_url).map_err(|e| {
            ClassifiedError::configuration(format!("admin webhook url is invalid: {e}"))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                ClassifiedError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            url: config.webhook_url.clone(),
        })
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationSink for AdminNotifier {
    async fn notify(
        &self,
        transaction: &Transaction,
        analysis: &RiskAnalysis,
    ) -> Result<(), NotifyError> {
        let request_id = Uuid::new_v4();
        let payload = AdminNotification {
            transaction,
            analysis,
        };

        let response = self
            .client
            .post(&self.url)
            .header("X-Request-Id", request_id.to_string())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                transaction_id = %transaction.transaction_id,
                request_id = %request_id,
                status = status.as_u16(),
                "Admin webhook rejected notification"
            );
            return Err(rejection(status.as_u16(), response.text().await));
        }

        debug!(
            transaction_id = %transaction.transaction_id,
            request_id = %request_id,
            degraded = analysis.is_degraded(),
            "Admin notification delivered"
        );

        Ok(())
    }
}

/// Build the rejection error, keeping a body read failure as the body text
fn rejection<E: Display>(status: u16, body: Result<String, E>) -> NotifyError {
    let body = body.unwrap_or_else(|e| {
        warn!(status, error = %e, "Failed to read admin webhook response body");
        format!("<unreadable body: {e}>")
    });
    NotifyError::Status { status, body }
}
