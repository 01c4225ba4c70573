use ap_common::Credits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntentRequest {
    /// Amount to collect, in minor currency units.
    pub amount: i64,
    pub currency: String,
    /// Free-form reference the merchant can use to reconcile the intent, typically the order id.
    pub reference: String,
    pub return_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    /// Where to send the customer so they can approve the payment.
    pub approval_url: String,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Captured,
    Declined,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    pub capture_id: String,
    pub intent_id: String,
    pub state: CaptureState,
    pub amount: i64,
    pub currency: String,
    pub captured_at: Option<DateTime<Utc>>,
}

impl CaptureResult {
    pub fn amount_as_credits(&self) -> Credits {
        Credits::from(self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentStatus {
    pub intent_id: String,
    pub state: CaptureState,
    pub capture: Option<CaptureResult>,
}
