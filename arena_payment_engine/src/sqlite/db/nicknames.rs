use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::ClaimOutcome, traits::SettlementError};

/// Atomically claims `nickname` for `user_id`, replacing any handle the user already holds.
///
/// The `nicknames.nickname` column carries a case-insensitive uniqueness constraint, which is the
/// authoritative guard against two users holding the same handle. A violation of that constraint
/// is an expected outcome here and maps to [`ClaimOutcome::Conflict`]; any other database error is
/// surfaced as usual.
pub async fn claim_nickname(
    user_id: &str,
    nickname: &str,
    conn: &mut SqliteConnection,
) -> Result<ClaimOutcome, SettlementError> {
    let result = sqlx::query(
        r#"INSERT INTO nicknames (user_id, nickname)
           VALUES ($1, $2)
           ON CONFLICT (user_id) DO UPDATE
           SET nickname = excluded.nickname, updated_at = CURRENT_TIMESTAMP"#,
    )
    .bind(user_id)
    .bind(nickname)
    .execute(conn)
    .await;
    match result {
        Ok(_) => {
            debug!("🪪️ Nickname '{nickname}' claimed by {user_id}");
            Ok(ClaimOutcome::Claimed)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🪪️ Nickname '{nickname}' is already taken. Claim by {user_id} rejected.");
            Ok(ClaimOutcome::Conflict)
        },
        Err(e) => Err(e.into()),
    }
}

/// Whether the handle is currently held by anyone, compared case-insensitively.
pub async fn nickname_in_use(nickname: &str, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let in_use: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM nicknames WHERE nickname = $1)")
        .bind(nickname)
        .fetch_one(conn)
        .await?;
    Ok(in_use)
}

pub async fn nickname_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<String>, SettlementError> {
    let nickname = sqlx::query_scalar("SELECT nickname FROM nicknames WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(nickname)
}
