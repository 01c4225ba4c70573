use std::fmt::Display;

use ap_common::Credits;
use arena_payment_engine::db_types::{
    MembershipGrant,
    Order,
    OrderId,
    PaymentMethod,
    PlayerStats,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderParams {
    pub item_id: String,
    pub payment_method: PaymentMethod,
    /// The desired handle; required for nickname services and ignored otherwise.
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIdParams {
    pub order_id: OrderId,
}

/// Parameters for settling a provider-paid order. The intent id was handed to the client when the
/// intent was registered; quoting it back is what authorizes the capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOrderParams {
    pub order_id: OrderId,
    pub intent_id: String,
}

/// Returned when a payment intent has been registered. The client sends the customer to
/// `approval_url` to approve the charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResult {
    pub order: Order,
    pub intent_id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResult {
    pub user_id: String,
    pub balance: Credits,
}

/// Everything the store profile page shows about a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub user_id: String,
    pub balance: Credits,
    pub nickname: Option<String>,
    pub membership: Option<MembershipGrant>,
    pub stats: Option<PlayerStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveSupportParams {
    pub request_id: i64,
    pub approve: bool,
    #[serde(default)]
    pub notes: String,
}

/// The notification PayVault posts to the webhook endpoint. The body is signed with
/// HMAC-SHA256; see [`crate::middleware::HmacMiddlewareFactory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayVaultWebhookEvent {
    /// One of `intent.approved`, `intent.declined` or `intent.cancelled`.
    pub event: String,
    pub intent_id: String,
    /// The merchant reference the intent was registered with, i.e. the order id.
    pub reference: String,
}
