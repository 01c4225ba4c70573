use chrono::{Duration, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::MembershipGrant, traits::SettlementError};

/// Extends (or starts) the user's membership by `days`.
///
/// An active membership is extended from its current expiry; a lapsed or absent one starts now.
/// The tier of the grant being applied always wins, so buying a different tier switches the
/// member over for the whole remaining period.
pub async fn extend_membership(
    user_id: &str,
    tier: &str,
    days: i64,
    conn: &mut SqliteConnection,
) -> Result<MembershipGrant, SettlementError> {
    let now = Utc::now();
    let current = membership_for_user(user_id, conn).await?;
    let (starts_at, base) = match current {
        Some(m) if m.ends_at > now => (m.starts_at, m.ends_at),
        _ => (now, now),
    };
    let ends_at = base + Duration::days(days);
    let grant = sqlx::query_as(
        r#"INSERT INTO memberships (user_id, tier, starts_at, ends_at)
           VALUES ($1, $2, $3, $4)
           ON CONFLICT (user_id) DO UPDATE
           SET tier = excluded.tier,
               starts_at = excluded.starts_at,
               ends_at = excluded.ends_at,
               updated_at = CURRENT_TIMESTAMP
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(tier)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(conn)
    .await?;
    trace!("📇️ Membership for {user_id} now runs to {ends_at} on tier {tier}");
    Ok(grant)
}

pub async fn membership_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MembershipGrant>, SettlementError> {
    let grant = sqlx::query_as("SELECT * FROM memberships WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(grant)
}
