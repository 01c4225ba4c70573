use ap_common::Credits;

use crate::db_types::{LedgerEntry, MembershipGrant, PlayerStats};
use crate::order_objects::Pagination;
use crate::traits::SettlementError;

/// Read access to the append-only balance ledger and the account records fulfillment mutates.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    /// The user's current balance, derived as `SUM(delta)` over their ledger entries.
    async fn balance_for_user(&self, user_id: &str) -> Result<Credits, SettlementError>;

    /// The user's ledger entries, newest first.
    async fn ledger_for_user(&self, user_id: &str, pagination: Pagination)
        -> Result<Vec<LedgerEntry>, SettlementError>;

    async fn membership_for_user(&self, user_id: &str) -> Result<Option<MembershipGrant>, SettlementError>;

    async fn stats_for_user(&self, user_id: &str) -> Result<Option<PlayerStats>, SettlementError>;
}
