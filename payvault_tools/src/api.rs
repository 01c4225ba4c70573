use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PayVaultConfig,
    data_objects::{CaptureResult, IntentStatus, NewIntentRequest, PaymentIntent},
    PayVaultApiError,
};

#[derive(Clone)]
pub struct PayVaultApi {
    config: PayVaultConfig,
    client: Arc<Client>,
}

impl PayVaultApi {
    pub fn new(config: PayVaultConfig) -> Result<Self, PayVaultApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| PayVaultApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PayVaultApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &PayVaultConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PayVaultApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PayVaultApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PayVaultApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PayVaultApiError::RestResponseError(e.to_string()))?;
            Err(PayVaultApiError::QueryError { status, message })
        }
    }

    /// Register a new payment intent with the provider. The returned `approval_url` is where the
    /// customer approves the charge.
    pub async fn register_intent(
        &self,
        amount: i64,
        currency: &str,
        reference: &str,
    ) -> Result<PaymentIntent, PayVaultApiError> {
        let req = NewIntentRequest {
            amount,
            currency: currency.to_string(),
            reference: reference.to_string(),
            return_url: self.config.return_url.clone(),
        };
        debug!("🏦️ Registering payment intent of {amount} {currency} for [{reference}]");
        let intent = self.rest_query::<PaymentIntent, _>(Method::POST, "/intents", Some(req)).await?;
        debug!("🏦️ Intent {} registered for [{reference}]", intent.intent_id);
        Ok(intent)
    }

    /// Capture the funds for an approved intent.
    ///
    /// The call is idempotent on the provider's side. Capturing an intent that has already been
    /// captured returns the existing capture record rather than an error.
    pub async fn capture(&self, intent_id: &str) -> Result<CaptureResult, PayVaultApiError> {
        debug!("🏦️ Capturing intent {intent_id}");
        let path = format!("/intents/{intent_id}/capture");
        let capture = self.rest_query::<CaptureResult, ()>(Method::POST, &path, None).await?;
        debug!("🏦️ Intent {intent_id} capture returned {:?} ({})", capture.state, capture.capture_id);
        Ok(capture)
    }

    pub async fn intent_status(&self, intent_id: &str) -> Result<IntentStatus, PayVaultApiError> {
        let path = format!("/intents/{intent_id}");
        self.rest_query::<IntentStatus, ()>(Method::GET, &path, None).await
    }
}
