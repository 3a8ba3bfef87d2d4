//! Deliver worker.

use std::time::Duration;

use apalis::prelude::*;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::jobs::DeliverJob;

/// Why a delivery attempt failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Inbox returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl DeliveryError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Serialize(_) => false,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

/// Context for the deliver worker.
#[derive(Clone)]
pub struct DeliverContext {
    pub http_client: Client,
    pub user_agent: String,
}

impl DeliverContext {
    /// Create a new deliver context.
    pub fn new(user_agent: String) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            user_agent,
        })
    }
}

/// Worker function for delivering activities.
///
/// # Errors
/// Returns an error if the activity delivery fails. Client errors other
/// than 429 abort the job instead of scheduling a retry.
pub async fn deliver_worker(job: DeliverJob, ctx: Data<DeliverContext>) -> Result<(), Error> {
    info!(
        user_id = %job.user_id,
        inbox = %job.inbox,
        high_priority = job.high_priority,
        "Delivering activity"
    );

    match deliver_activity(&job, &ctx).await {
        Ok(()) => {
            info!(inbox = %job.inbox, "Activity delivered successfully");
            Ok(())
        }
        Err(e) if e.is_retryable() => {
            warn!(inbox = %job.inbox, error = %e, "Delivery failed, will retry");
            Err(Error::Failed(std::sync::Arc::new(Box::new(e))))
        }
        Err(e) => {
            error!(inbox = %job.inbox, error = %e, "Delivery failed permanently");
            Err(Error::Abort(std::sync::Arc::new(Box::new(e))))
        }
    }
}

async fn deliver_activity(job: &DeliverJob, ctx: &DeliverContext) -> Result<(), DeliveryError> {
    let body = serde_json::to_vec(&job.activity)?;

    let response = ctx
        .http_client
        .post(&job.inbox)
        .header("Content-Type", "application/activity+json")
        .header("Accept", "application/activity+json")
        .header("User-Agent", &ctx.user_agent)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    match accepted(status) {
        Ok(()) => Ok(()),
        Err(status) => Err(DeliveryError::Status {
            status,
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

/// Whether an inbox response counts as delivered.
fn accepted(status: StatusCode) -> Result<(), StatusCode> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::GONE {
        // Remote actor deleted
        warn!(%status, "Remote actor gone");
        Ok(())
    } else {
        Err(status)
    }
}
