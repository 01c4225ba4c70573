use log::trace;
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{CaptureDetails, FulfillmentOutcome, NewOrder, Order, OrderId},
    order_objects::OrderQueryFilter,
    traits::SettlementError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The order is created in `Created` status.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SettlementError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                item_id,
                item_type,
                payment_method,
                total_price,
                currency,
                memo
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.user_id)
    .bind(order.item_id)
    .bind(order.item_type)
    .bind(order.payment_method)
    .bind(order.total_price)
    .bind(order.currency)
    .bind(Json(order.memo))
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Stores the provider intent id on the order and moves it to `AwaitingProviderApproval`.
///
/// The update is guarded on `Created` status. Returns `None` when no row matched, i.e. the order
/// does not exist or is not in `Created` status.
pub async fn set_provider_intent(
    order_id: &OrderId,
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE orders
           SET status = 'AwaitingProviderApproval', provider_intent_id = $1, updated_at = CURRENT_TIMESTAMP
           WHERE order_id = $2 AND status = 'Created'
           RETURNING *"#,
    )
    .bind(intent_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// The compare-and-transition that makes provider settlement exactly-once.
///
/// Moves the order to the transient `Captured` status and records the capture details, guarded on
/// `Created` or `AwaitingProviderApproval`. Exactly one concurrent caller gets the row back; every
/// other caller gets `None` and must inspect the order to find out why.
pub async fn mark_captured(
    order_id: &OrderId,
    capture: &CaptureDetails,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE orders
           SET status = 'Captured',
               provider_intent_id = COALESCE(provider_intent_id, $1),
               provider_capture_id = $2,
               updated_at = CURRENT_TIMESTAMP
           WHERE order_id = $3 AND status IN ('Created', 'AwaitingProviderApproval')
           RETURNING *"#,
    )
    .bind(capture.intent_id.as_str())
    .bind(capture.capture_id.as_str())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// The balance-payment counterpart of [`mark_captured`]. Guarded on `Created` only, since
/// balance-paid orders never visit the provider.
pub async fn begin_balance_settlement(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE orders
           SET status = 'Captured', updated_at = CURRENT_TIMESTAMP
           WHERE order_id = $1 AND status = 'Created'
           RETURNING *"#,
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Finalises settlement: moves the order from the transient `Captured` status to `Completed` and
/// stores the fulfillment result, which doubles as the cached response for replayed calls.
pub async fn complete_with_fulfillment(
    order_id: &OrderId,
    outcome: &FulfillmentOutcome,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    let order: Option<Order> = sqlx::query_as(
        r#"UPDATE orders
           SET status = 'Completed',
               fulfillment = $1,
               completed_at = CURRENT_TIMESTAMP,
               updated_at = CURRENT_TIMESTAMP
           WHERE order_id = $2 AND status = 'Captured'
           RETURNING *"#,
    )
    .bind(Json(outcome.clone()))
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    order.ok_or_else(|| {
        SettlementError::DatabaseError(format!(
            "Order [{order_id}] left 'Captured' status mid-settlement. The transaction will be rolled back."
        ))
    })
}

/// Cancels the order. Guarded: only `Created` and `AwaitingProviderApproval` orders can be
/// cancelled.
pub async fn cancel_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE orders
           SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP
           WHERE order_id = $1 AND status IN ('Created', 'AwaitingProviderApproval')
           RETURNING *"#,
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Marks the order as permanently failed, recording the reason. Guarded against terminal statuses.
pub async fn fail_order(
    order_id: &OrderId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE orders
           SET status = 'Failed', failure_reason = $1, updated_at = CURRENT_TIMESTAMP
           WHERE order_id = $2 AND status NOT IN ('Completed', 'Cancelled', 'Failed')
           RETURNING *"#,
    )
    .bind(reason)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order (newest first)
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.to_string());
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(item_id) = query.item_id {
        where_clause.push("item_id = ");
        where_clause.push_bind_unseparated(item_id);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method.to_string());
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    if query.pagination.count.is_some() || query.pagination.offset.is_some() {
        // SQLite requires a LIMIT clause before OFFSET
        builder.push(" LIMIT ");
        builder.push_bind(query.pagination.count.unwrap_or(-1));
        if let Some(offset) = query.pagination.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
    }

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("Result of search_orders: {:?}", orders.len());
    Ok(orders)
}
