//! Bridges the PayVault REST client into the settlement engine's provider interface.

use arena_payment_engine::traits::{
    CaptureOutcome,
    IntentRequest,
    IntentResult,
    PaymentProvider,
    ProviderError,
};
use payvault_tools::{CaptureResult, CaptureState, PayVaultApi, PayVaultApiError, PayVaultConfig};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct PayVaultProvider {
    api: PayVaultApi,
}

impl PayVaultProvider {
    pub fn new(api: PayVaultApi) -> Self {
        Self { api }
    }

    pub fn try_from_config(config: PayVaultConfig) -> Result<Self, ServerError> {
        let api = PayVaultApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentProvider for PayVaultProvider {
    async fn register_intent(&self, request: IntentRequest) -> Result<IntentResult, ProviderError> {
        let intent = self
            .api
            .register_intent(request.amount.to_minor_units(), &request.currency, &request.reference)
            .await
            .map_err(to_provider_error)?;
        Ok(IntentResult { intent_id: intent.intent_id, approval_url: intent.approval_url })
    }

    async fn capture(&self, intent_id: &str) -> Result<CaptureOutcome, ProviderError> {
        let capture = self.api.capture(intent_id).await.map_err(to_provider_error)?;
        capture_outcome(capture)
    }

    async fn capture_status(&self, intent_id: &str) -> Result<Option<CaptureOutcome>, ProviderError> {
        let status = self.api.intent_status(intent_id).await.map_err(to_provider_error)?;
        let outcome = status.capture.filter(|c| c.state == CaptureState::Captured).map(|c| CaptureOutcome {
            amount: c.amount_as_credits(),
            capture_id: c.capture_id,
            currency: c.currency,
        });
        Ok(outcome)
    }
}

fn capture_outcome(capture: CaptureResult) -> Result<CaptureOutcome, ProviderError> {
    let amount = capture.amount_as_credits();
    match capture.state {
        CaptureState::Captured => {
            Ok(CaptureOutcome { capture_id: capture.capture_id, amount, currency: capture.currency })
        },
        CaptureState::Declined => {
            Err(ProviderError::Declined(format!("Capture {} was declined", capture.capture_id)))
        },
        // The customer has not approved the intent yet. That may still happen, so the error
        // is retryable rather than final.
        CaptureState::Pending => {
            Err(ProviderError::Transient(format!("Intent {} has not been approved yet", capture.intent_id)))
        },
    }
}

fn to_provider_error(e: PayVaultApiError) -> ProviderError {
    if e.is_transient() {
        return ProviderError::Transient(e.to_string());
    }
    match e {
        PayVaultApiError::Declined(m) => ProviderError::Declined(m),
        e => ProviderError::Api(e.to_string()),
    }
}
