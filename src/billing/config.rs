use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub wompi: WompiConfig,
    /// Where Stripe checkout sends the customer after paying
    #[serde(default = "default_success_url")]
    pub success_url: String,
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
    /// Outbound request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_success_url() -> String {
    "http://localhost:3000/billing/success".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:3000/billing/cancel".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            stripe: StripeConfig::default(),
            wompi: WompiConfig::default(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,
    /// Maximum age in seconds of a signed webhook
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance: i64,
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_webhook_tolerance() -> i64 {
    300
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            api_base: default_stripe_api_base(),
            webhook_tolerance: default_webhook_tolerance(),
        }
    }
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WompiConfig {
    #[serde(default)]
    pub public_key: String,
    /// Private key used as bearer credential
    #[serde(default)]
    pub private_key: String,
    /// Secret mixed into event checksums
    #[serde(default)]
    pub events_secret: String,
    /// `staging` talks to the sandbox, anything else to production
    #[serde(default = "default_wompi_environment")]
    pub environment: String,
    #[serde(default = "default_wompi_currency")]
    pub currency: String,
}

fn default_wompi_environment() -> String {
    "staging".to_string()
}

fn default_wompi_currency() -> String {
    "COP".to_string()
}

impl Default for WompiConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            private_key: String::new(),
            events_secret: String::new(),
            environment: default_wompi_environment(),
            currency: default_wompi_currency(),
        }
    }
}

impl WompiConfig {
    pub fn base_url(&self) -> &'static str {
        if self.environment == "staging" {
            "https://sandbox.wompi.co/v1"
        } else {
            "https://production.wompi.co/v1"
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.private_key.is_empty()
    }
}
