//! Payment providers: Stripe subscriptions and Wompi payment links
//!
//! Both providers change an account's plan only after the webhook that reports
//! the payment has been authenticated.

use crate::database::entities::Plan;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub mod config;
pub mod mock;
pub mod stripe;
pub mod wompi;

pub use mock::{MockStripeApi, MockWompiApi};
pub use stripe::{StripeApi, StripeBilling, StripeClient, SubscriptionInfo};
pub use wompi::{PaymentLink, TransactionInfo, WompiApi, WompiBilling, WompiClient};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Plan {0} is not purchasable")]
    PlanNotPurchasable(Plan),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

pub type BillingResult<T> = Result<T, BillingError>;

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WebhookOutcome {
    /// `applied`, `acknowledged` or `ignored`
    pub status: &'static str,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl WebhookOutcome {
    pub fn applied(event_type: impl Into<String>, user_id: i32, plan: Plan) -> Self {
        Self {
            status: "applied",
            event_type: event_type.into(),
            user_id: Some(user_id),
            plan: Some(plan),
        }
    }

    pub fn acknowledged(event_type: impl Into<String>) -> Self {
        Self {
            status: "acknowledged",
            event_type: event_type.into(),
            user_id: None,
            plan: None,
        }
    }

    pub fn ignored(event_type: impl Into<String>) -> Self {
        Self {
            status: "ignored",
            event_type: event_type.into(),
            user_id: None,
            plan: None,
        }
    }
}

/// Map a non-2xx provider response to an error, keeping the body for logs
pub(crate) async fn read_json(response: reqwest::Response) -> BillingResult<serde_json::Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| BillingError::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(BillingError::Provider {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| BillingError::InvalidPayload(e.to_string()))
}
