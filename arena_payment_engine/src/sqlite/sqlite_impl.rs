//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every mutating operation runs as a single transaction so that the order transition and its fulfillment
//! side effect commit together or not at all.
use std::fmt::Debug;

use ap_common::Credits;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, fulfillment, ledger, memberships, new_pool, nicknames, orders, stats, support};
use crate::{
    db_types::{
        CaptureDetails,
        ClaimOutcome,
        CompletedOrder,
        LedgerEntry,
        MembershipGrant,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PlayerStats,
        SupportKind,
        SupportRequest,
    },
    order_objects::{OrderQueryFilter, Pagination},
    support_objects::{SupportQueryFilter, SupportResolution},
    traits::{
        LedgerManagement,
        NicknameManagement,
        SettlementDatabase,
        SettlementError,
        SupportManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Inserts the order inside an explicit transaction. The commit makes the row durable before
    /// this returns; the driver's implicit auto-commit completes asynchronously, and a fetch on
    /// another pool connection straight after the insert could otherwise miss the order.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn set_provider_intent(&self, order_id: &OrderId, intent_id: &str) -> Result<Order, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::set_provider_intent(order_id, intent_id, &mut tx).await?;
        let order = match updated {
            Some(order) => order,
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
                return Err(SettlementError::InvalidStateTransition {
                    order_id: order_id.clone(),
                    from: order.status,
                    to: OrderStatusType::AwaitingProviderApproval,
                });
            },
        };
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] now carries provider intent {intent_id}");
        Ok(order)
    }

    /// Takes the captured payment, and in a single atomic transaction,
    /// * performs the compare-and-transition that claims the settlement (`Created` or
    ///   `AwaitingProviderApproval` to the transient `Captured` status),
    /// * dispatches the fulfillment side effect for the order's memo,
    /// * moves the order to `Completed`, storing the fulfillment result on the row.
    ///
    /// If the transition was claimed by an earlier call, the stored result is returned with
    /// `first_settlement == false`, provided the capture refers to the same payment intent. A
    /// capture for a different intent on a settled order is a conflict and changes nothing.
    async fn complete_order(
        &self,
        order_id: &OrderId,
        capture: &CaptureDetails,
    ) -> Result<CompletedOrder, SettlementError> {
        let mut tx = self.pool.begin().await?;
        match orders::mark_captured(order_id, capture, &mut tx).await? {
            Some(order) => {
                let outcome = fulfillment::apply_fulfillment(&order, &mut tx).await?;
                let order = orders::complete_with_fulfillment(order_id, &outcome, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order [{order_id}] settled under capture {}", capture.capture_id);
                Ok(CompletedOrder { order, fulfillment: outcome, first_settlement: true })
            },
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
                tx.commit().await?;
                self.replay_settlement(order, Some(capture))
            },
        }
    }

    /// Settles a balance-paid order. In a single atomic transaction,
    /// * performs the compare-and-transition that claims the settlement (`Created` to the
    ///   transient `Captured` status),
    /// * checks the user's balance covers the price and appends the debit ledger entry,
    /// * dispatches the fulfillment side effect and moves the order to `Completed`.
    ///
    /// The guarded transition makes this connection the writer before the balance is read, so two
    /// concurrent purchases against the same balance serialise and the loser sees the depleted
    /// balance. On insufficient funds the transaction rolls back and the order remains `Created`.
    async fn debit_and_complete(&self, order_id: &OrderId) -> Result<CompletedOrder, SettlementError> {
        let mut tx = self.pool.begin().await?;
        match orders::begin_balance_settlement(order_id, &mut tx).await? {
            Some(order) => {
                let balance = ledger::balance_for_user(&order.user_id, &mut tx).await?;
                if balance < order.total_price {
                    debug!(
                        "🗃️ Order [{order_id}] needs {} but {} only has {balance}. Rolling back.",
                        order.total_price, order.user_id
                    );
                    tx.rollback().await?;
                    return Err(SettlementError::InsufficientFunds {
                        required: order.total_price,
                        available: balance,
                    });
                }
                ledger::insert_entry(&order.user_id, -order.total_price, "Order payment", Some(order_id), &mut tx)
                    .await?;
                let outcome = fulfillment::apply_fulfillment(&order, &mut tx).await?;
                let order = orders::complete_with_fulfillment(order_id, &outcome, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Order [{order_id}] paid from balance and settled");
                Ok(CompletedOrder { order, fulfillment: outcome, first_settlement: true })
            },
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
                tx.commit().await?;
                self.replay_settlement(order, None)
            },
        }
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = orders::cancel_order(order_id, &mut tx).await?;
        let order = match cancelled {
            Some(order) => order,
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
                return Err(SettlementError::InvalidStateTransition {
                    order_id: order_id.clone(),
                    from: order.status,
                    to: OrderStatusType::Cancelled,
                });
            },
        };
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] cancelled");
        Ok(order)
    }

    async fn fail_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let failed = orders::fail_order(order_id, reason, &mut tx).await?;
        let order = match failed {
            Some(order) => order,
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
                if order.status == OrderStatusType::Failed {
                    // marking a failed order as failed again is a no-op
                    tx.commit().await?;
                    return Ok(order);
                }
                return Err(SettlementError::InvalidStateTransition {
                    order_id: order_id.clone(),
                    from: order.status,
                    to: OrderStatusType::Failed,
                });
            },
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn balance_for_user(&self, user_id: &str) -> Result<Credits, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        ledger::balance_for_user(user_id, &mut conn).await
    }

    async fn ledger_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<LedgerEntry>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        ledger::entries_for_user(user_id, pagination, &mut conn).await
    }

    async fn membership_for_user(&self, user_id: &str) -> Result<Option<MembershipGrant>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        memberships::membership_for_user(user_id, &mut conn).await
    }

    async fn stats_for_user(&self, user_id: &str) -> Result<Option<PlayerStats>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        stats::stats_for_user(user_id, &mut conn).await
    }
}

impl NicknameManagement for SqliteDatabase {
    async fn nickname_in_use(&self, nickname: &str) -> Result<bool, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        nicknames::nickname_in_use(nickname, &mut conn).await
    }

    async fn claim_nickname(&self, user_id: &str, nickname: &str) -> Result<ClaimOutcome, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        nicknames::claim_nickname(user_id, nickname, &mut conn).await
    }

    async fn nickname_for_user(&self, user_id: &str) -> Result<Option<String>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        nicknames::nickname_for_user(user_id, &mut conn).await
    }
}

impl SupportManagement for SqliteDatabase {
    async fn fetch_support_request(&self, request_id: i64) -> Result<Option<SupportRequest>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        support::fetch_request(request_id, &mut conn).await
    }

    async fn search_support_requests(
        &self,
        query: SupportQueryFilter,
    ) -> Result<Vec<SupportRequest>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        support::search_requests(query, &mut conn).await
    }

    async fn start_review(&self, request_id: i64, admin_id: &str) -> Result<SupportRequest, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let updated = support::start_review(request_id, &mut tx).await?;
        let request = match updated {
            Some(request) => request,
            None => {
                let request = support::fetch_request(request_id, &mut tx)
                    .await?
                    .ok_or(SettlementError::SupportRequestNotFound(request_id))?;
                return Err(SettlementError::Forbidden(format!(
                    "Support request #{request_id} is {} and cannot enter review",
                    request.status
                )));
            },
        };
        tx.commit().await?;
        debug!("🗃️ Support request #{request_id} taken into review by {admin_id}");
        Ok(request)
    }

    /// Resolves the request, and when the resolution is an approved reclaim, claims the handle on
    /// behalf of the requester inside the same transaction. If the claim hits the uniqueness
    /// constraint the whole resolution rolls back and the request stays open for the admin to
    /// decide what to do.
    async fn resolve_support_request(
        &self,
        request_id: i64,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<SupportResolution, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let resolved = support::resolve_request(request_id, admin_id, approve, notes, &mut tx).await?;
        let request = match resolved {
            Some(request) => request,
            None => {
                let request = support::fetch_request(request_id, &mut tx)
                    .await?
                    .ok_or(SettlementError::SupportRequestNotFound(request_id))?;
                return Err(SettlementError::Forbidden(format!(
                    "Support request #{request_id} is already {}",
                    request.status
                )));
            },
        };
        let mut claim = None;
        if approve && request.kind == SupportKind::ReclaimNickname {
            let nickname = request.requested_nickname.as_deref().ok_or_else(|| {
                SettlementError::DatabaseError(format!(
                    "Support request #{request_id} is a reclaim with no requested nickname"
                ))
            })?;
            match nicknames::claim_nickname(&request.user_id, nickname, &mut tx).await? {
                ClaimOutcome::Claimed => claim = Some(ClaimOutcome::Claimed),
                ClaimOutcome::Conflict => {
                    warn!(
                        "🗃️ Approval of support request #{request_id} lost the race for '{nickname}'. Rolling the \
                         resolution back."
                    );
                    tx.rollback().await?;
                    return Err(SettlementError::Conflict(format!(
                        "Nickname '{nickname}' is already in use. Request #{request_id} remains open."
                    )));
                },
            }
        }
        tx.commit().await?;
        Ok(SupportResolution { request, claim })
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Rebuilds the settlement result for an order whose guarded transition did not match, i.e.
    /// a replayed or concurrent settlement call.
    fn replay_settlement(
        &self,
        order: Order,
        capture: Option<&CaptureDetails>,
    ) -> Result<CompletedOrder, SettlementError> {
        if order.status != OrderStatusType::Completed {
            return Err(SettlementError::InvalidStateTransition {
                order_id: order.order_id.clone(),
                from: order.status,
                to: OrderStatusType::Completed,
            });
        }
        if let Some(capture) = capture {
            if order.provider_intent_id.as_deref() != Some(capture.intent_id.as_str()) {
                return Err(SettlementError::Conflict(format!(
                    "Order [{}] was settled under a different payment intent",
                    order.order_id
                )));
            }
        }
        let fulfillment = order.fulfillment.clone().map(|f| f.0).ok_or_else(|| {
            SettlementError::DatabaseError(format!(
                "Order [{}] is Completed but has no stored fulfillment",
                order.order_id
            ))
        })?;
        debug!("🗃️ Order [{}] was already settled. Returning the stored result.", order.order_id);
        Ok(CompletedOrder { order, fulfillment, first_settlement: false })
    }
}
