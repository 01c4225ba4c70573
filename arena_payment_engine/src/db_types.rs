use std::{fmt::Display, str::FromStr};

use ap_common::Credits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

use crate::helpers::new_order_id;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The order state machine:
///
/// `Created → AwaitingProviderApproval → Captured → Completed` for provider payments,
/// `Created → Completed` for balance payments, with `Created|AwaitingProviderApproval → Cancelled`
/// and any non-terminal state `→ Failed`. `Completed`, `Cancelled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order is newly created. No funds have moved.
    Created,
    /// A payment intent is registered with the provider and awaits customer approval.
    AwaitingProviderApproval,
    /// Funds have been secured at the provider but fulfillment has not run yet. This state is only
    /// ever observed transiently inside the settlement transaction.
    Captured,
    /// The order has been settled and fulfilled. Terminal.
    Completed,
    /// The order was cancelled before capture. Terminal.
    Cancelled,
    /// The order failed permanently (e.g. the gateway exhausted its retries). Terminal.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Completed | OrderStatusType::Cancelled | OrderStatusType::Failed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "Created"),
            OrderStatusType::AwaitingProviderApproval => write!(f, "AwaitingProviderApproval"),
            OrderStatusType::Captured => write!(f, "Captured"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "AwaitingProviderApproval" => Ok(Self::AwaitingProviderApproval),
            "Captured" => Ok(Self::Captured),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// The external PayVault provider collects real money.
    Provider,
    /// The user's internal credit balance is debited.
    Balance,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Provider => write!(f, "provider"),
            PaymentMethod::Balance => write!(f, "balance"),
        }
    }
}

//--------------------------------------       ItemType        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Credits,
    Membership,
    Service,
}

impl Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Credits => write!(f, "credits"),
            ItemType::Membership => write!(f, "membership"),
            ItemType::Service => write!(f, "service"),
        }
    }
}

//--------------------------------------       OrderMemo       -------------------------------------------------------
/// Typed per-order metadata, keyed on the item kind and validated at intake.
///
/// The grant parameters (credits amount, membership duration) are copied from the catalog item at
/// order-creation time so that fulfillment never has to consult the catalog again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderMemo {
    Credits { amount: Credits },
    Membership { tier: String, days: i64 },
    RenameNickname { new_nickname: String },
    ReclaimNickname { requested_nickname: String },
    ResetStats,
}

//--------------------------------------         Order         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub payment_method: PaymentMethod,
    pub total_price: Credits,
    pub currency: String,
    pub memo: Json<OrderMemo>,
    pub status: OrderStatusType,
    pub provider_intent_id: Option<String>,
    pub provider_capture_id: Option<String>,
    /// The stored fulfillment result for a completed order. Also serves as the cached response for
    /// duplicate settlement calls.
    pub fulfillment: Option<Json<FulfillmentOutcome>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn memo(&self) -> &OrderMemo {
        &self.memo.0
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Generated order id, `ord-<16 hex chars>`
    pub order_id: OrderId,
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub payment_method: PaymentMethod,
    pub total_price: Credits,
    pub currency: String,
    pub memo: OrderMemo,
}

impl NewOrder {
    pub fn new(
        user_id: String,
        item_id: String,
        item_type: ItemType,
        payment_method: PaymentMethod,
        total_price: Credits,
        memo: OrderMemo,
    ) -> Self {
        Self {
            order_id: new_order_id(),
            user_id,
            item_id,
            item_type,
            payment_method,
            total_price,
            currency: ap_common::CURRENCY_CODE.to_string(),
            memo,
        }
    }
}

//--------------------------------------     LedgerEntry       -------------------------------------------------------
/// A single, immutable entry of the append-only balance ledger. The displayed balance of a user is
/// always `SUM(delta)` over their entries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub delta: Credits,
    pub reason: String,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   MembershipGrant     -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MembershipGrant {
    pub user_id: String,
    pub tier: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipGrant {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }
}

//--------------------------------------     PlayerStats       -------------------------------------------------------
pub const DEFAULT_RATING: i64 = 1000;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: String,
    pub wins: i64,
    pub losses: i64,
    pub rating: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     SupportKind       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SupportKind {
    ReclaimNickname,
}

impl Display for SupportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupportKind::ReclaimNickname => write!(f, "reclaim-nickname"),
        }
    }
}

//--------------------------------------    SupportStatus      -------------------------------------------------------
/// The manual-review state machine: `pendiente → en_revision → {aprobado, rechazado}`, with
/// `pendiente → {aprobado, rechazado}` allowed directly. `aprobado` and `rechazado` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    Pendiente,
    EnRevision,
    Aprobado,
    Rechazado,
}

impl SupportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupportStatus::Aprobado | SupportStatus::Rechazado)
    }
}

impl Display for SupportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupportStatus::Pendiente => write!(f, "pendiente"),
            SupportStatus::EnRevision => write!(f, "en_revision"),
            SupportStatus::Aprobado => write!(f, "aprobado"),
            SupportStatus::Rechazado => write!(f, "rechazado"),
        }
    }
}

impl FromStr for SupportStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(Self::Pendiente),
            "en_revision" => Ok(Self::EnRevision),
            "aprobado" => Ok(Self::Aprobado),
            "rechazado" => Ok(Self::Rechazado),
            s => Err(ConversionError(format!("Invalid support request status: {s}"))),
        }
    }
}

//--------------------------------------    SupportRequest     -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SupportRequest {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    pub kind: SupportKind,
    pub requested_nickname: Option<String>,
    pub status: SupportStatus,
    pub admin_notes: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  FulfillmentOutcome   -------------------------------------------------------
/// What fulfillment did for a completed order. A nickname conflict is an explicit outcome rather
/// than an error: payment was captured, so the order completes, and the caller is told the handle
/// could not be granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    CreditsGranted { amount: Credits },
    MembershipExtended { tier: String, ends_at: DateTime<Utc> },
    NicknameChanged { nickname: String },
    NicknameConflict { nickname: String },
    SupportRequestOpened { request_id: i64 },
    StatsReset,
}

//--------------------------------------    CompletedOrder     -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub order: Order,
    pub fulfillment: FulfillmentOutcome,
    /// False when this result was served from the already-settled order rather than settled by
    /// this call. The side effect ran exactly once either way.
    pub first_settlement: bool,
}

//--------------------------------------    CaptureDetails     -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDetails {
    pub intent_id: String,
    pub capture_id: String,
}

//--------------------------------------     ClaimOutcome      -------------------------------------------------------
/// The result of an atomic nickname claim. A uniqueness violation is an expected outcome, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed,
    Conflict,
}

//--------------------------------------         Role          -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}
