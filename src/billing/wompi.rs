use super::config::WompiConfig;
use super::{BillingError, BillingResult, WebhookOutcome, read_json};
use crate::database::DatabaseManager;
use crate::database::entities::{Plan, UserRecord};
use crate::entitlement::{EntitlementLedger, PlansConfig};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use utoipa::ToSchema;

const CHECKOUT_LINK_BASE: &str = "https://checkout.wompi.co/l";

#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkRequest {
    pub name: String,
    pub description: String,
    pub amount_in_cents: u64,
    pub currency: String,
    pub single_use: bool,
    pub collect_shipping: bool,
    pub customer_email: String,
}

/// Hosted payment link
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaymentLink {
    pub id: String,
    pub url: String,
    pub amount_in_cents: u64,
    pub plan: Plan,
}

/// Transaction state as reported by Wompi
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionInfo {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount_in_cents: Option<u64>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Subset of the Wompi REST API this service calls
#[async_trait]
pub trait WompiApi: Send + Sync {
    /// Returns the created link id
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> BillingResult<String>;

    async fn get_transaction(&self, transaction_id: &str) -> BillingResult<TransactionInfo>;
}

pub struct WompiClient {
    client: reqwest::Client,
    config: WompiConfig,
}

impl WompiClient {
    pub fn new(config: WompiConfig, timeout: Duration) -> BillingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BillingError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn ensure_configured(&self) -> BillingResult<()> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(BillingError::NotConfigured("Wompi"))
        }
    }
}

#[async_trait]
impl WompiApi for WompiClient {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> BillingResult<String> {
        self.ensure_configured()?;
        let response = self
            .client
            .post(format!("{}/payment_links", self.config.base_url()))
            .bearer_auth(&self.config.private_key)
            .json(request)
            .send()
            .await
            .map_err(|e| BillingError::Http(e.to_string()))?;

        let body = read_json(response).await?;
        body["data"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BillingError::InvalidPayload("payment link without id".to_string()))
    }

    async fn get_transaction(&self, transaction_id: &str) -> BillingResult<TransactionInfo> {
        self.ensure_configured()?;
        let response = self
            .client
            .get(format!(
                "{}/transactions/{}",
                self.config.base_url(),
                transaction_id
            ))
            .bearer_auth(&self.config.private_key)
            .send()
            .await
            .map_err(|e| BillingError::Http(e.to_string()))?;

        let body = read_json(response).await?;
        serde_json::from_value(body["data"].clone())
            .map_err(|e| BillingError::InvalidPayload(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WompiEvent {
    pub event: String,
    pub data: serde_json::Value,
    pub signature: EventSignature,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSignature {
    /// Dotted paths into `data`, e.g. `transaction.id`
    pub properties: Vec<String>,
    pub checksum: String,
}

fn property_value(data: &serde_json::Value, path: &str) -> Option<String> {
    let value = path
        .split('.')
        .try_fold(data, |node, key| node.get(key))?;
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => Some(String::new()),
        other => Some(other.to_string()),
    }
}

/// SHA-256 hex over the signed property values, the timestamp and the events secret
pub fn event_checksum(event: &WompiEvent, secret: &str) -> BillingResult<String> {
    let mut hasher = Sha256::new();
    for property in &event.signature.properties {
        let value = property_value(&event.data, property).ok_or_else(|| {
            BillingError::InvalidSignature(format!("signed property {} is missing", property))
        })?;
        hasher.update(value.as_bytes());
    }
    hasher.update(event.timestamp.to_string().as_bytes());
    hasher.update(secret.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_event(event: &WompiEvent, secret: &str) -> BillingResult<()> {
    if secret.is_empty() {
        return Err(BillingError::NotConfigured("Wompi events secret"));
    }
    let expected = event_checksum(event, secret)?;
    if expected.eq_ignore_ascii_case(&event.signature.checksum) {
        Ok(())
    } else {
        Err(BillingError::InvalidSignature("checksum mismatch".to_string()))
    }
}

/// Wompi-backed one-off plan purchases
#[derive(Clone)]
pub struct WompiBilling {
    api: Arc<dyn WompiApi>,
    database: Arc<dyn DatabaseManager>,
    ledger: EntitlementLedger,
    plans: PlansConfig,
    config: WompiConfig,
}

impl WompiBilling {
    pub fn new(
        api: Arc<dyn WompiApi>,
        database: Arc<dyn DatabaseManager>,
        ledger: EntitlementLedger,
        plans: PlansConfig,
        config: WompiConfig,
    ) -> Self {
        Self {
            api,
            database,
            ledger,
            plans,
            config,
        }
    }

    pub async fn payment_link(&self, user: &UserRecord, plan: Plan) -> Result<PaymentLink, AppError> {
        if !plan.is_purchasable() {
            return Err(BillingError::PlanNotPurchasable(plan).into());
        }
        let settings = self.plans.settings(plan);

        let id = self
            .api
            .create_payment_link(&PaymentLinkRequest {
                name: settings.name.clone(),
                description: settings.name.clone(),
                amount_in_cents: settings.price_cents,
                currency: self.config.currency.clone(),
                single_use: false,
                collect_shipping: false,
                customer_email: user.email.clone(),
            })
            .await?;

        info!(user_id = user.id, plan = %plan, link_id = %id, "Wompi payment link created");
        Ok(PaymentLink {
            url: format!("{}/{}", CHECKOUT_LINK_BASE, id),
            id,
            amount_in_cents: settings.price_cents,
            plan,
        })
    }

    pub async fn transaction(&self, transaction_id: &str) -> Result<TransactionInfo, AppError> {
        Ok(self.api.get_transaction(transaction_id).await?)
    }

    /// Authenticate and apply one event delivery
    pub async fn handle_webhook(&self, payload: &[u8]) -> Result<WebhookOutcome, AppError> {
        let event: WompiEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::InvalidPayload(e.to_string()))?;
        verify_event(&event, &self.config.events_secret)?;

        if event.event != "transaction.updated" {
            return Ok(WebhookOutcome::ignored(event.event));
        }

        let transaction: TransactionInfo =
            serde_json::from_value(event.data["transaction"].clone())
                .map_err(|e| BillingError::InvalidPayload(e.to_string()))?;

        if transaction.status != "APPROVED" {
            info!(transaction = %transaction.id, status = %transaction.status, "Wompi transaction not approved");
            return Ok(WebhookOutcome::acknowledged(event.event));
        }

        let Some(plan) = transaction
            .amount_in_cents
            .and_then(|amount| self.plans.plan_for_amount(amount))
        else {
            warn!(transaction = %transaction.id, amount = ?transaction.amount_in_cents, "Approved amount matches no plan");
            return Ok(WebhookOutcome::acknowledged(event.event));
        };

        let email = transaction.customer_email.as_deref().ok_or_else(|| {
            BillingError::InvalidPayload("transaction has no customer_email".to_string())
        })?;
        let user = self
            .database
            .users()
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("Payer account not found".to_string()))?;

        self.ledger.change_plan(user.id, plan).await?;
        info!(user_id = user.id, plan = %plan, transaction = %transaction.id, "Wompi payment applied");
        Ok(WebhookOutcome::applied(event.event, user.id, plan))
    }
}

/// Build a signed event body, as Wompi would deliver it
pub fn signed_event(
    event: &str,
    transaction: serde_json::Value,
    timestamp: i64,
    secret: &str,
) -> BillingResult<serde_json::Value> {
    let mut unsigned = WompiEvent {
        event: event.to_string(),
        data: serde_json::json!({ "transaction": transaction }),
        signature: EventSignature {
            properties: vec![
                "transaction.id".to_string(),
                "transaction.status".to_string(),
                "transaction.amount_in_cents".to_string(),
            ],
            checksum: String::new(),
        },
        timestamp,
    };
    unsigned.signature.checksum = event_checksum(&unsigned, secret)?;

    Ok(serde_json::json!({
        "event": unsigned.event,
        "data": unsigned.data,
        "signature": {
            "properties": unsigned.signature.properties,
            "checksum": unsigned.signature.checksum,
        },
        "timestamp": unsigned.timestamp,
    }))
}
