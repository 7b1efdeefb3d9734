use super::config::{BillingConfig, StripeConfig};
use super::{BillingError, BillingResult, WebhookOutcome, read_json};
use crate::database::DatabaseManager;
use crate::database::entities::{Plan, UserRecord};
use crate::entitlement::PlansConfig;
use crate::error::AppError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

/// Subscription state as reported by Stripe
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SubscriptionInfo {
    pub id: String,
    pub status: String,
    /// Unix timestamp of the end of the paid period
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionInfo {
    fn from_json(value: &serde_json::Value) -> BillingResult<Self> {
        let id = value["id"]
            .as_str()
            .ok_or_else(|| BillingError::InvalidPayload("subscription without id".to_string()))?;
        Ok(Self {
            id: id.to_string(),
            status: value["status"].as_str().unwrap_or("unknown").to_string(),
            current_period_end: value["current_period_end"].as_i64(),
            cancel_at_period_end: value["cancel_at_period_end"].as_bool().unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub user_id: i32,
    pub plan: Plan,
    pub success_url: String,
    pub cancel_url: String,
}

/// Subset of the Stripe REST API this service calls
#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn create_customer(&self, user: &UserRecord) -> BillingResult<String>;

    /// Returns the hosted checkout URL
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> BillingResult<String>;

    /// Cancel at the end of the current period
    async fn cancel_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionInfo>;

    async fn get_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionInfo>;
}

/// Form-encoded client for `api.stripe.com`
pub struct StripeClient {
    client: reqwest::Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig, timeout: Duration) -> BillingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BillingError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn ensure_configured(&self) -> BillingResult<()> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(BillingError::NotConfigured("Stripe"))
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> BillingResult<serde_json::Value> {
        self.ensure_configured()?;
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::Http(e.to_string()))?;
        read_json(response).await
    }
}

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[async_trait]
impl StripeApi for StripeClient {
    async fn create_customer(&self, user: &UserRecord) -> BillingResult<String> {
        let form = vec![
            field("email", &user.email),
            field("name", user.display_name()),
            field("metadata[user_id]", user.id),
            field("metadata[username]", &user.username),
        ];
        let customer = self.post_form("customers", &form).await?;
        customer["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BillingError::InvalidPayload("customer without id".to_string()))
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> BillingResult<String> {
        let form = vec![
            field("customer", &request.customer_id),
            field("mode", "subscription"),
            field("payment_method_types[0]", "card"),
            field("line_items[0][price]", &request.price_id),
            field("line_items[0][quantity]", 1),
            field("success_url", &request.success_url),
            field("cancel_url", &request.cancel_url),
            field("metadata[user_id]", request.user_id),
            field("metadata[plan]", request.plan),
            // Copied onto the subscription so its lifecycle events carry them too
            field("subscription_data[metadata][user_id]", request.user_id),
            field("subscription_data[metadata][plan]", request.plan),
        ];
        let session = self.post_form("checkout/sessions", &form).await?;
        session["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BillingError::InvalidPayload("checkout session without url".to_string()))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionInfo> {
        let form = vec![field("cancel_at_period_end", true)];
        let subscription = self
            .post_form(&format!("subscriptions/{}", subscription_id), &form)
            .await?;
        SubscriptionInfo::from_json(&subscription)
    }

    async fn get_subscription(&self, subscription_id: &str) -> BillingResult<SubscriptionInfo> {
        self.ensure_configured()?;
        let response = self
            .client
            .get(self.url(&format!("subscriptions/{}", subscription_id)))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| BillingError::Http(e.to_string()))?;
        SubscriptionInfo::from_json(&read_json(response).await?)
    }
}

/// Check a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=...]`) against the raw payload
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> BillingResult<()> {
    if secret.is_empty() {
        return Err(BillingError::NotConfigured("Stripe webhook secret"));
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| BillingError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature("missing v1 signature".to_string()));
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(BillingError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let matches = signatures.iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matches {
        Ok(())
    } else {
        Err(BillingError::InvalidSignature("signature mismatch".to_string()))
    }
}

/// Build a header value the way Stripe signs deliveries
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> BillingResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Stripe-backed subscription management
#[derive(Clone)]
pub struct StripeBilling {
    api: Arc<dyn StripeApi>,
    database: Arc<dyn DatabaseManager>,
    plans: PlansConfig,
    config: BillingConfig,
}

impl StripeBilling {
    pub fn new(
        api: Arc<dyn StripeApi>,
        database: Arc<dyn DatabaseManager>,
        plans: PlansConfig,
        config: BillingConfig,
    ) -> Self {
        Self {
            api,
            database,
            plans,
            config,
        }
    }

    fn price_id(&self, plan: Plan) -> Result<String, BillingError> {
        if !plan.is_purchasable() {
            return Err(BillingError::PlanNotPurchasable(plan));
        }
        self.plans
            .settings(plan)
            .stripe_price_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(BillingError::NotConfigured("Stripe price id"))
    }

    /// Start a checkout for `plan`, registering the customer on first use
    pub async fn checkout(&self, user: &UserRecord, plan: Plan) -> Result<String, AppError> {
        let price_id = self.price_id(plan)?;

        let customer_id = match &user.stripe_customer_id {
            Some(id) => id.clone(),
            None => {
                let id = self.api.create_customer(user).await?;
                self.database.users().set_stripe_customer(user.id, &id).await?;
                info!(user_id = user.id, "Stripe customer created");
                id
            }
        };

        let url = self
            .api
            .create_checkout_session(&CheckoutRequest {
                customer_id,
                price_id,
                user_id: user.id,
                plan,
                success_url: self.config.success_url.clone(),
                cancel_url: self.config.cancel_url.clone(),
            })
            .await?;

        info!(user_id = user.id, plan = %plan, "Checkout session created");
        Ok(url)
    }

    pub async fn cancel(&self, user: &UserRecord) -> Result<SubscriptionInfo, AppError> {
        let subscription_id = Self::subscription_id(user)?;
        let info = self.api.cancel_subscription(subscription_id).await?;
        info!(user_id = user.id, subscription_id, "Subscription set to cancel at period end");
        Ok(info)
    }

    pub async fn subscription(&self, user: &UserRecord) -> Result<SubscriptionInfo, AppError> {
        let subscription_id = Self::subscription_id(user)?;
        Ok(self.api.get_subscription(subscription_id).await?)
    }

    fn subscription_id(user: &UserRecord) -> Result<&str, AppError> {
        user.stripe_subscription_id
            .as_deref()
            .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))
    }

    /// Authenticate and apply one webhook delivery
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, AppError> {
        verify_signature(
            payload,
            signature_header,
            &self.config.stripe.webhook_secret,
            self.config.stripe.webhook_tolerance,
            chrono::Utc::now().timestamp(),
        )?;

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::InvalidPayload(e.to_string()))?;
        let object = &event.data.object;

        match event.event_type.as_str() {
            "customer.subscription.created" | "customer.subscription.updated" => {
                let status = object["status"].as_str().unwrap_or_default();
                if !matches!(status, "active" | "trialing") {
                    info!(event_type = %event.event_type, status, "Subscription not active yet");
                    return Ok(WebhookOutcome::acknowledged(event.event_type));
                }

                let plan = object["metadata"]["plan"]
                    .as_str()
                    .and_then(|plan| plan.parse::<Plan>().ok())
                    .filter(Plan::is_purchasable)
                    .ok_or_else(|| {
                        BillingError::InvalidPayload("subscription metadata has no plan".to_string())
                    })?;
                let user = self.subscriber(object).await?;
                let subscription_id = object["id"].as_str().map(str::to_string);

                self.database
                    .users()
                    .set_subscription(user.id, plan, subscription_id)
                    .await?;
                info!(user_id = user.id, plan = %plan, "Subscription applied");
                Ok(WebhookOutcome::applied(event.event_type, user.id, plan))
            }
            "customer.subscription.deleted" => {
                let user = self.subscriber(object).await?;
                self.database
                    .users()
                    .set_subscription(user.id, Plan::Free, None)
                    .await?;
                info!(user_id = user.id, "Subscription ended, account back on free plan");
                Ok(WebhookOutcome::applied(event.event_type, user.id, Plan::Free))
            }
            "invoice.payment_succeeded" => {
                info!(invoice = object["id"].as_str().unwrap_or_default(), "Invoice paid");
                Ok(WebhookOutcome::acknowledged(event.event_type))
            }
            "invoice.payment_failed" => {
                warn!(invoice = object["id"].as_str().unwrap_or_default(), "Invoice payment failed");
                Ok(WebhookOutcome::acknowledged(event.event_type))
            }
            _ => Ok(WebhookOutcome::ignored(event.event_type)),
        }
    }

    /// Account a subscription object refers to: metadata first, then customer id
    async fn subscriber(&self, object: &serde_json::Value) -> Result<UserRecord, AppError> {
        let by_metadata = object["metadata"]["user_id"]
            .as_str()
            .and_then(|id| id.parse::<i32>().ok());

        let user = match by_metadata {
            Some(user_id) => self.database.users().find_by_id(user_id).await?,
            None => match object["customer"].as_str() {
                Some(customer) => self.database.users().find_by_stripe_customer(customer).await?,
                None => None,
            },
        };

        user.ok_or_else(|| AppError::NotFound("Subscriber account not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_signature_round_trip() {
        let payload = br#"{"type":"ping"}"#;
        let header = sign_payload(payload, SECRET, 1_700_000_000).unwrap();
        assert!(verify_signature(payload, &header, SECRET, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_signature_rejects_tampered_payload() {
        let header = sign_payload(br#"{"amount":1}"#, SECRET, 1_700_000_000).unwrap();
        let err = verify_signature(br#"{"amount":2}"#, &header, SECRET, 300, 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature(_)));
    }

    #[test]
    fn test_signature_rejects_stale_timestamp() {
        let payload = b"{}";
        let header = sign_payload(payload, SECRET, 1_700_000_000).unwrap();
        assert!(verify_signature(payload, &header, SECRET, 300, 1_700_000_301).is_err());
    }

    #[test]
    fn test_signature_accepts_any_matching_v1() {
        let payload = b"{}";
        let valid = sign_payload(payload, SECRET, 1_700_000_000).unwrap();
        let v1 = valid.split_once(",v1=").map(|(_, sig)| sig).unwrap();
        let header = format!("t=1700000000,v1={},v1={},v0=ignored", "00".repeat(32), v1);
        assert!(verify_signature(payload, &header, SECRET, 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_signature_rejects_malformed_headers() {
        for header in [
            "",
            "v1=abcd",
            "t=1700000000",
            "t=abc,v1=zz",
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(
                verify_signature(b"{}", header, SECRET, 300, 1_700_000_000).is_err(),
                "header {:?}",
                header
            );
        }
        assert!(matches!(
            verify_signature(b"{}", "t=1,v1=00", "", 300, 1),
            Err(BillingError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_subscription_info_from_json() {
        let value = serde_json::json!({
            "id": "sub_123",
            "status": "active",
            "current_period_end": 1_700_000_000,
            "cancel_at_period_end": true
        });
        let info = SubscriptionInfo::from_json(&value).unwrap();
        assert_eq!(info.id, "sub_123");
        assert!(info.cancel_at_period_end);
        assert!(SubscriptionInfo::from_json(&serde_json::json!({})).is_err());
    }
}
