//! Notification port
//!
//! Free-text messages to the driver broadcast channel. Delivery is best effort:
//! callers log failures and move on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::status::HandoverStatus;
use super::types::{ActivityNames, ShipmentDetail};
use crate::config::NotificationConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Notification client setup failed: {0}")]
    Setup(String),

    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification gateway rejected message: HTTP {status}")]
    Rejected { status: u16 },
}

impl NotifyError {
    pub fn code(&self) -> &'static str {
        match self {
            NotifyError::Setup(_) => "NOTIFY_SETUP",
            NotifyError::Transport(_) => "NOTIFY_TRANSPORT",
            NotifyError::Rejected { .. } => "NOTIFY_REJECTED",
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Transport(e.to_string())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get notifier name for logging
    fn name(&self) -> &'static str;

    /// Send `message` to the configured channel
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    message: &'a str,
}

/// Posts messages to an HTTP chat gateway
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
    channel: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotifyError::Setup(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            channel: config.channel.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.endpoint).json(&WebhookPayload {
            channel: &self.channel,
            message,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        info!(notifier = "log", %message, "Notification (delivery disabled)");
        Ok(())
    }
}

/// Check-in / check-out broadcast; `None` when there is nothing to list
pub fn driver_notice(
    status: HandoverStatus,
    details: &[ShipmentDetail],
    time: &str,
    notes: Option<&str>,
) -> Option<String> {
    let first = details.first()?;
    let title = if status == HandoverStatus::DriverCheckin {
        "Driver Check-In"
    } else {
        "Driver Check-Out"
    };

    let mut msg = format!("*{title}*\n\n");
    msg.push_str(&format!("Driver: *{}*\n", first.driver_name));
    msg.push_str(&format!("Vehicle: *{}*\n", first.vehicle_name));
    msg.push_str(&format!("Customer: *{}*\n", first.customer_name));
    msg.push_str(&format!("Time: *{time}*\n"));
    msg.push_str(&format!("Notes: {}\n\n", notes.unwrap_or("-")));
    msg.push_str("*Shipments:*\n");
    for (i, d) in details.iter().enumerate() {
        msg.push_str(&format!("{}. *{}* - {}\n", i + 1, d.document_no, d.customer_name));
    }
    msg.push_str(&format!("\n_Total: {} shipment(s)_", details.len()));
    Some(msg)
}

/// Check-out without documents, with id fallbacks when names are unknown
pub fn activity_checkout_notice(
    names: Option<&ActivityNames>,
    driver_id: i64,
    customer_id: Option<i64>,
    time: Option<&str>,
    notes: Option<&str>,
) -> String {
    let (driver, customer, time) = match names {
        Some(n) => (
            n.driver_name.clone(),
            n.customer_name.clone(),
            time.unwrap_or("just now").to_string(),
        ),
        None => (
            format!("ID: {driver_id}"),
            customer_id.map_or_else(|| "-".to_string(), |c| format!("ID: {c}")),
            "just now".to_string(),
        ),
    };

    let mut msg = String::from("*Driver Check-Out (no documents)*\n\n");
    msg.push_str(&format!("Driver: *{driver}*\n"));
    msg.push_str(&format!("Location: *{customer}*\n"));
    msg.push_str(&format!("Time: *{time}*\n"));
    msg.push_str(&format!("Notes: {}\n\n", notes.unwrap_or("-")));
    msg.push_str("_The driver left the customer without bringing shipment documents back._");
    msg
}
