use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{PlayerStats, DEFAULT_RATING},
    traits::SettlementError,
};

/// Resets the user's competitive record to zero wins and losses at the default rating.
pub async fn reset_stats(user_id: &str, conn: &mut SqliteConnection) -> Result<PlayerStats, SettlementError> {
    let stats = sqlx::query_as(
        r#"INSERT INTO player_stats (user_id, wins, losses, rating)
           VALUES ($1, 0, 0, $2)
           ON CONFLICT (user_id) DO UPDATE
           SET wins = 0, losses = 0, rating = excluded.rating, updated_at = CURRENT_TIMESTAMP
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(DEFAULT_RATING)
    .fetch_one(conn)
    .await?;
    debug!("📊️ Player stats reset for {user_id}");
    Ok(stats)
}

pub async fn stats_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<PlayerStats>, SettlementError> {
    let stats =
        sqlx::query_as("SELECT * FROM player_stats WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(stats)
}
