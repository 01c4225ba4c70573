use std::fmt::Debug;

use log::*;

use crate::{
    catalog::{CatalogProvider, ItemKind, ServiceKind},
    db_types::{
        CaptureDetails,
        CompletedOrder,
        NewOrder,
        Order,
        OrderId,
        OrderMemo,
        OrderStatusType,
        PaymentMethod,
    },
    events::{EventProducers, OrderCancelledEvent, OrderCompletedEvent, OrderFailedEvent},
    gateway::GatewayAdapter,
    helpers::validate_nickname_format,
    order_objects::{OrderHistory, OrderQueryFilter, Pagination},
    traits::{IntentResult, PaymentProvider, SettlementDatabase, SettlementError},
};

/// `OrderFlowApi` is the primary API for the order lifecycle: intake, payment, settlement and
/// exactly-once fulfillment.
///
/// It owns the order state machine. All state transitions go through the storage backend as atomic
/// units of work; this API sequences them, talks to the payment gateway, and fires event hooks
/// after a transition has committed. Hooks never fire for replayed (already settled) calls.
pub struct OrderFlowApi<B, C, P> {
    db: B,
    catalog: C,
    gateway: GatewayAdapter<P>,
    producers: EventProducers,
}

impl<B, C, P> Debug for OrderFlowApi<B, C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, C, P> OrderFlowApi<B, C, P> {
    pub fn new(db: B, catalog: C, gateway: GatewayAdapter<P>, producers: EventProducers) -> Self {
        Self { db, catalog, gateway, producers }
    }
}

impl<B, C, P> OrderFlowApi<B, C, P>
where
    B: SettlementDatabase,
    C: CatalogProvider,
    P: PaymentProvider,
{
    /// Creates a brand-new order in `Created` status for a catalog item.
    ///
    /// The grant parameters of the item (credits amount, membership duration) are snapshotted into
    /// the order memo here, so later price or catalog changes never affect an order already taken.
    /// Nickname services require the desired handle, which is validated for format at intake. No
    /// availability check happens here: that race is settled by the claim itself at fulfillment.
    pub async fn create_order(
        &self,
        user_id: &str,
        item_id: &str,
        payment_method: PaymentMethod,
        nickname: Option<&str>,
    ) -> Result<Order, SettlementError> {
        let item = self.catalog.item(item_id).ok_or_else(|| SettlementError::ItemNotFound(item_id.to_string()))?;
        let memo = match &item.kind {
            ItemKind::Credits { amount } => {
                if payment_method == PaymentMethod::Balance {
                    return Err(SettlementError::Validation(
                        "Credit packs cannot be paid for with the credit balance".to_string(),
                    ));
                }
                OrderMemo::Credits { amount: *amount }
            },
            ItemKind::Membership { tier, days } => OrderMemo::Membership { tier: tier.clone(), days: *days },
            ItemKind::Service { service } => match service {
                ServiceKind::RenameNickname => {
                    OrderMemo::RenameNickname { new_nickname: required_nickname(nickname)? }
                },
                ServiceKind::ReclaimNickname => {
                    OrderMemo::ReclaimNickname { requested_nickname: required_nickname(nickname)? }
                },
                ServiceKind::ResetStats => OrderMemo::ResetStats,
            },
        };
        let new_order = NewOrder::new(
            user_id.to_string(),
            item.id.clone(),
            item.kind.item_type(),
            payment_method,
            item.price,
            memo,
        );
        let order = self.db.insert_order(new_order).await?;
        debug!(
            "🔄️📦️ Order [{}] created for {user_id}: {} ({}) at {} via {payment_method}",
            order.order_id, item.name, item.id, order.total_price
        );
        Ok(order)
    }

    /// Registers a payment intent with the provider for a `Created`, provider-paid order and moves
    /// it to `AwaitingProviderApproval`. Only the order's owner may register an intent. A permanent
    /// gateway failure marks the order `Failed`.
    pub async fn register_provider_intent(
        &self,
        user_id: &str,
        order_id: &OrderId,
    ) -> Result<(Order, IntentResult), SettlementError> {
        let order = self.fetch_order(order_id).await?;
        ensure_owned(&order, user_id)?;
        if order.payment_method != PaymentMethod::Provider {
            return Err(SettlementError::Forbidden(format!(
                "Order [{order_id}] is not payable through the provider"
            )));
        }
        if order.status != OrderStatusType::Created {
            return Err(SettlementError::InvalidStateTransition {
                order_id: order_id.clone(),
                from: order.status,
                to: OrderStatusType::AwaitingProviderApproval,
            });
        }
        let intent = match self.gateway.register_intent(&order).await {
            Ok(intent) => intent,
            Err(e @ SettlementError::GatewayFailed(_)) => {
                self.mark_failed(order_id, &e.to_string()).await?;
                return Err(e);
            },
            Err(e) => return Err(e),
        };
        let order = self.db.set_provider_intent(order_id, &intent.intent_id).await?;
        debug!("🔄️🏦️ Order [{order_id}] is awaiting provider approval under intent {}", intent.intent_id);
        Ok((order, intent))
    }

    /// Captures the approved payment at the provider and settles the order in one unit of work.
    ///
    /// `provider_intent_id` must match the intent registered for the order; the caller's knowledge
    /// of the intent id is the settlement credential, so a mismatch is a conflict and nothing is
    /// captured. Safe to call repeatedly and concurrently for the same order: exactly one call
    /// performs the capture-settle-fulfill sequence, every other call observes the settled order
    /// and gets the stored result back with `first_settlement == false`. A permanent capture
    /// failure marks the order `Failed` and fulfillment never runs.
    pub async fn capture_and_complete(
        &self,
        order_id: &OrderId,
        provider_intent_id: &str,
    ) -> Result<CompletedOrder, SettlementError> {
        let order = self.fetch_order(order_id).await?;
        let intent_id = order.provider_intent_id.clone().ok_or_else(|| {
            SettlementError::Validation(format!("Order [{order_id}] has no payment intent registered"))
        })?;
        if intent_id != provider_intent_id {
            return Err(SettlementError::Conflict(format!(
                "Payment intent {provider_intent_id} does not match the intent registered for order [{order_id}]"
            )));
        }
        if order.status == OrderStatusType::Completed {
            debug!("🔄️💰️ Order [{order_id}] is already settled. Returning the stored result.");
            return replayed(order);
        }
        let capture = match self.gateway.capture(&order, &intent_id).await {
            Ok(capture) => capture,
            Err(e @ SettlementError::GatewayFailed(_)) => {
                self.mark_failed(order_id, &e.to_string()).await?;
                return Err(e);
            },
            Err(e) => return Err(e),
        };
        let details = CaptureDetails { intent_id, capture_id: capture.capture_id };
        let completed = self.db.complete_order(order_id, &details).await?;
        if completed.first_settlement {
            info!("🔄️💰️ Order [{order_id}] captured and settled: {:?}", completed.fulfillment);
            self.call_order_completed_hook(&completed).await;
        }
        Ok(completed)
    }

    /// Settles a balance-paid order: debits the owner's credit balance and fulfills the order in
    /// one unit of work. Only the order's owner may spend their balance. On insufficient funds
    /// nothing changes and the order stays `Created`. Repeated calls for a settled order return
    /// the stored result without further effects.
    pub async fn complete_with_balance(
        &self,
        user_id: &str,
        order_id: &OrderId,
    ) -> Result<CompletedOrder, SettlementError> {
        let order = self.fetch_order(order_id).await?;
        ensure_owned(&order, user_id)?;
        if order.payment_method != PaymentMethod::Balance {
            return Err(SettlementError::Forbidden(format!(
                "Order [{order_id}] is not payable from the credit balance"
            )));
        }
        if order.status == OrderStatusType::Completed {
            debug!("🔄️💳️ Order [{order_id}] is already settled. Returning the stored result.");
            return replayed(order);
        }
        let completed = self.db.debit_and_complete(order_id).await?;
        if completed.first_settlement {
            info!("🔄️💳️ Order [{order_id}] paid from balance and settled: {:?}", completed.fulfillment);
            self.call_order_completed_hook(&completed).await;
        }
        Ok(completed)
    }

    /// Cancels an order that has not been captured yet. Only the order's owner may cancel it.
    pub async fn cancel_order(&self, user_id: &str, order_id: &OrderId) -> Result<Order, SettlementError> {
        let order = self.fetch_order(order_id).await?;
        ensure_owned(&order, user_id)?;
        let order = self.db.cancel_order(order_id).await?;
        info!("🔄️❌️ Order [{order_id}] cancelled");
        for emitter in &self.producers.order_cancelled_producer {
            emitter.publish_event(OrderCancelledEvent::new(order.clone())).await;
        }
        Ok(order)
    }

    /// Marks an order as permanently failed, recording the reason.
    pub async fn mark_failed(&self, order_id: &OrderId, reason: &str) -> Result<Order, SettlementError> {
        let order = self.db.fail_order(order_id, reason).await?;
        warn!("🔄️⛔️ Order [{order_id}] failed permanently: {reason}");
        for emitter in &self.producers.order_failed_producer {
            emitter.publish_event(OrderFailedEvent::new(order.clone(), reason.to_string())).await;
        }
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, SettlementError> {
        self.db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))
    }

    /// The order history for a user, newest first.
    pub async fn history_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<OrderHistory, SettlementError> {
        let query = OrderQueryFilter::default().with_user_id(user_id).with_pagination(pagination);
        let orders = self.db.search_orders(query).await?;
        Ok(OrderHistory::new(user_id.to_string(), orders))
    }

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`.
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, SettlementError> {
        trace!("🔄️🔍️ Searching orders: {query}");
        self.db.search_orders(query).await
    }

    async fn call_order_completed_hook(&self, completed: &CompletedOrder) {
        for emitter in &self.producers.order_completed_producer {
            debug!("🔄️📦️ Notifying order completed hook subscribers");
            emitter.publish_event(OrderCompletedEvent::new(completed.clone())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

fn ensure_owned(order: &Order, user_id: &str) -> Result<(), SettlementError> {
    if order.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(SettlementError::Forbidden(format!(
            "Order [{}] does not belong to {user_id}",
            order.order_id
        )))
    }
}

fn required_nickname(nickname: Option<&str>) -> Result<String, SettlementError> {
    let nickname =
        nickname.ok_or_else(|| SettlementError::Validation("A nickname is required for this item".to_string()))?;
    validate_nickname_format(nickname).map_err(|e| SettlementError::Validation(e.to_string()))?;
    Ok(nickname.to_string())
}

/// Rebuilds the settlement result from the stored fulfillment of an already-settled order.
fn replayed(order: Order) -> Result<CompletedOrder, SettlementError> {
    let fulfillment = order
        .fulfillment
        .clone()
        .map(|f| f.0)
        .ok_or_else(|| {
            SettlementError::DatabaseError(format!(
                "Order [{}] is Completed but has no stored fulfillment",
                order.order_id
            ))
        })?;
    Ok(CompletedOrder { order, fulfillment, first_settlement: false })
}
