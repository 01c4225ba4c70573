use serde::{Deserialize, Serialize};

use crate::db_types::{CompletedOrder, Order};

/// Emitted after an order has been settled and fulfilled (post-commit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub completed: CompletedOrder,
}

impl OrderCompletedEvent {
    pub fn new(completed: CompletedOrder) -> Self {
        Self { completed }
    }
}

/// Emitted after an order has been cancelled by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted after an order has been marked as permanently failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailedEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderFailedEvent {
    pub fn new(order: Order, reason: String) -> Self {
        Self { order, reason }
    }
}
