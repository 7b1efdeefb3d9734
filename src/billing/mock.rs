use super::stripe::{CheckoutRequest, StripeApi, SubscriptionInfo};
use super::wompi::{PaymentLinkRequest, TransactionInfo, WompiApi};
use super::{BillingError, BillingResult};
use crate::database::entities::UserRecord;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// In-process Stripe stand-in that records what it was asked to do
#[derive(Clone, Default)]
pub struct MockStripeApi {
    checkouts: Arc<Mutex<Vec<CheckoutRequest>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl MockStripeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StripeApi for MockStripeApi {
    async fn create_customer(&self, user: &UserRecord) -> BillingResult<String> {
        Ok(format!("cus_mock_{}", user.id))
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> BillingResult<String> {
        if let Ok(mut checkouts) = self.checkouts.lock() {
            checkouts.push(request.clone());
        }
        Ok(format!(
            "https://checkout.stripe.com/c/pay/cs_mock_{}_{}",
            request.user_id, request.plan
        ))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionInfo> {
        if let Ok(mut cancelled) = self.cancelled.lock() {
            cancelled.push(subscription_id.to_string());
        }
        Ok(SubscriptionInfo {
            id: subscription_id.to_string(),
            status: "active".to_string(),
            current_period_end: Some(1_900_000_000),
            cancel_at_period_end: true,
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionInfo> {
        Ok(SubscriptionInfo {
            id: subscription_id.to_string(),
            status: "active".to_string(),
            current_period_end: Some(1_900_000_000),
            cancel_at_period_end: false,
        })
    }
}

/// In-process Wompi stand-in
#[derive(Clone, Default)]
pub struct MockWompiApi {
    links: Arc<Mutex<Vec<PaymentLinkRequest>>>,
}

impl MockWompiApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self) -> Vec<PaymentLinkRequest> {
        self.links.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WompiApi for MockWompiApi {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> BillingResult<String> {
        let mut links = self
            .links
            .lock()
            .map_err(|e| BillingError::Http(e.to_string()))?;
        links.push(request.clone());
        Ok(format!("mock_link_{}", links.len()))
    }

    async fn get_transaction(&self, transaction_id: &str) -> BillingResult<TransactionInfo> {
        if transaction_id == "missing" {
            return Err(BillingError::Provider {
                status: 404,
                body: "NOT_FOUND_ERROR".to_string(),
            });
        }
        Ok(TransactionInfo {
            id: transaction_id.to_string(),
            status: "APPROVED".to_string(),
            amount_in_cents: Some(2900),
            reference: Some(format!("ref_{}", transaction_id)),
            customer_email: None,
        })
    }
}
