use ap_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct PayVaultConfig {
    /// Base url of the PayVault REST API, e.g. "https://api.payvault.example.com"
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Secret used to verify HMAC signatures on webhook notifications.
    pub webhook_secret: Secret<String>,
    /// Url the provider redirects the customer back to after approving an intent.
    pub return_url: String,
}

impl PayVaultConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("AP_PAYVAULT_URL").unwrap_or_else(|_| {
            warn!("AP_PAYVAULT_URL not set, using the sandbox endpoint");
            "https://sandbox.payvault.example.com".to_string()
        });
        let api_key = Secret::new(std::env::var("AP_PAYVAULT_API_KEY").unwrap_or_else(|_| {
            warn!("AP_PAYVAULT_API_KEY not set, using (probably useless) default");
            "pv_test_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("AP_PAYVAULT_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("AP_PAYVAULT_WEBHOOK_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let return_url = std::env::var("AP_PAYVAULT_RETURN_URL")
            .unwrap_or_else(|_| "http://localhost:4000/store/checkout/complete".to_string());
        Self { base_url, api_key, webhook_secret, return_url }
    }
}
