use ap_common::Credits;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LedgerEntry, OrderId},
    order_objects::Pagination,
    traits::SettlementError,
};

/// Appends an entry to the ledger. Entries are immutable once written; corrections are new entries.
pub async fn insert_entry(
    user_id: &str,
    delta: Credits,
    reason: &str,
    order_id: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, SettlementError> {
    let entry = sqlx::query_as(
        r#"INSERT INTO ledger_entries (user_id, delta, reason, order_id)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(delta)
    .bind(reason)
    .bind(order_id.map(|o| o.as_str().to_string()))
    .fetch_one(conn)
    .await?;
    trace!("📒️ Ledger entry of {delta} recorded for {user_id} ({reason})");
    Ok(entry)
}

/// The user's balance, `SUM(delta)` over their entries. A user with no entries has a zero balance.
pub async fn balance_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Credits, SettlementError> {
    let balance: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(delta), 0) FROM ledger_entries WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(Credits::from(balance))
}

/// The user's ledger entries, newest first.
pub async fn entries_for_user(
    user_id: &str,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, SettlementError> {
    let entries = sqlx::query_as(
        r#"SELECT * FROM ledger_entries
           WHERE user_id = $1
           ORDER BY created_at DESC, id DESC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(user_id)
    .bind(pagination.count.unwrap_or(-1))
    .bind(pagination.offset.unwrap_or(0))
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
