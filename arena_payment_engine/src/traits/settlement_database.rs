use ap_common::Credits;
use thiserror::Error;

use crate::db_types::{
    CaptureDetails,
    CompletedOrder,
    NewOrder,
    Order,
    OrderId,
    OrderStatusType,
};
use crate::order_objects::OrderQueryFilter;

/// The highest level of behaviour for storage backends supporting the settlement engine.
///
/// Every method that mutates state executes as a single atomic unit of work: the order status
/// transition, the ledger / membership / nickname mutation and (for reclaim orders) the support
/// request creation are committed together or not at all. A crash between steps leaves the order
/// in its prior, well-defined state.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a brand-new order in `Created` status.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementError>;

    /// Returns the order for the given order id, or `None` if it does not exist.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementError>;

    /// Stores the provider intent id on the order and moves it from `Created` to
    /// `AwaitingProviderApproval`. Guarded: fails if the order is in any other state.
    async fn set_provider_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<Order, SettlementError>;

    /// Settles a provider-paid order in one transaction: a compare-and-transition on the status
    /// (`Created|AwaitingProviderApproval → Completed`), followed by fulfillment dispatch.
    ///
    /// Exactly one caller ever performs the side effect. A concurrent or repeated call for an
    /// order that is already `Completed` with the same intent id returns the stored result with
    /// `first_settlement == false` and no further effects.
    async fn complete_order(
        &self,
        order_id: &OrderId,
        capture: &CaptureDetails,
    ) -> Result<CompletedOrder, SettlementError>;

    /// Settles a balance-paid order in one transaction: verifies the user's balance covers the
    /// price, appends the debit ledger entry, transitions `Created → Completed` and dispatches
    /// fulfillment. On insufficient funds nothing changes and the order remains `Created`.
    async fn debit_and_complete(&self, order_id: &OrderId) -> Result<CompletedOrder, SettlementError>;

    /// Cancels an order. Guarded: only orders in `Created` or `AwaitingProviderApproval` can be
    /// cancelled; captured funds are never cancellable through this path.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, SettlementError>;

    /// Marks an order as permanently failed and records the reason. No fulfillment ever runs for
    /// a failed order.
    async fn fail_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, SettlementError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

/// The error taxonomy of the settlement engine.
///
/// `Validation`, `NotFound`-style and `Forbidden` errors are rejected before any side effect.
/// `Conflict` and `InsufficientFunds` leave state unchanged except where explicitly defined.
/// `GatewayFailed` is terminal for the order and never triggers fulfillment.
#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Unknown catalog item: {0}")]
    ItemNotFound(String),
    #[error("The requested support request {0} does not exist")]
    SupportRequestNotFound(i64),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Operation not permitted: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: Credits, available: Credits },
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStateTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("The payment gateway failed permanently: {0}")]
    GatewayFailed(String),
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for SettlementError {
    fn from(e: serde_json::Error) -> Self {
        SettlementError::DatabaseError(format!("Stored JSON could not be decoded: {e}"))
    }
}
