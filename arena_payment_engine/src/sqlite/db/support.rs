use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Order, SupportKind, SupportRequest, SupportStatus},
    support_objects::SupportQueryFilter,
    traits::SettlementError,
};

/// Opens a manual-review request for the order in `pendiente` status.
pub async fn insert_request(
    order: &Order,
    requested_nickname: &str,
    conn: &mut SqliteConnection,
) -> Result<SupportRequest, SettlementError> {
    let request = sqlx::query_as(
        r#"INSERT INTO support_requests (order_id, user_id, kind, requested_nickname)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(order.order_id.as_str())
    .bind(order.user_id.as_str())
    .bind(SupportKind::ReclaimNickname)
    .bind(requested_nickname)
    .fetch_one(conn)
    .await?;
    Ok(request)
}

pub async fn fetch_request(id: i64, conn: &mut SqliteConnection) -> Result<Option<SupportRequest>, SettlementError> {
    let request = sqlx::query_as("SELECT * FROM support_requests WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(request)
}

/// Fetches support requests according to criteria specified in the `SupportQueryFilter`, oldest
/// first, so admins work the queue in arrival order.
pub async fn search_requests(
    query: SupportQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<SupportRequest>, SettlementError> {
    let mut builder = QueryBuilder::new("SELECT * FROM support_requests ");
    if query.status.is_some() || query.user_id.is_some() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    if query.pagination.count.is_some() || query.pagination.offset.is_some() {
        builder.push(" LIMIT ");
        builder.push_bind(query.pagination.count.unwrap_or(-1));
        if let Some(offset) = query.pagination.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
    }
    trace!("🛃️ Executing query: {}", builder.sql());
    let requests = builder.build_query_as::<SupportRequest>().fetch_all(conn).await?;
    Ok(requests)
}

/// Moves the request from `pendiente` to `en_revision`. Guarded: returns `None` when the request
/// does not exist or is not `pendiente`.
pub async fn start_review(id: i64, conn: &mut SqliteConnection) -> Result<Option<SupportRequest>, SettlementError> {
    let request = sqlx::query_as(
        r#"UPDATE support_requests
           SET status = 'en_revision', updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'pendiente'
           RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

/// Resolves the request as `aprobado` or `rechazado`, recording who decided and why. Guarded:
/// returns `None` when the request does not exist or is already terminal.
pub async fn resolve_request(
    id: i64,
    admin_id: &str,
    approve: bool,
    notes: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SupportRequest>, SettlementError> {
    let status = if approve { SupportStatus::Aprobado } else { SupportStatus::Rechazado };
    let request = sqlx::query_as(
        r#"UPDATE support_requests
           SET status = $1,
               admin_notes = $2,
               resolved_by = $3,
               resolved_at = CURRENT_TIMESTAMP,
               updated_at = CURRENT_TIMESTAMP
           WHERE id = $4 AND status IN ('pendiente', 'en_revision')
           RETURNING *"#,
    )
    .bind(status.to_string())
    .bind(notes)
    .bind(admin_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}
