use ap_common::Credits;

use crate::{
    db_types::{LedgerEntry, MembershipGrant, PlayerStats},
    order_objects::Pagination,
    traits::{LedgerManagement, SettlementError},
};

/// Read access to user balances, ledger history, memberships and player stats.
#[derive(Debug, Clone)]
pub struct LedgerApi<B> {
    db: B,
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn balance_for_user(&self, user_id: &str) -> Result<Credits, SettlementError> {
        self.db.balance_for_user(user_id).await
    }

    pub async fn ledger_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<LedgerEntry>, SettlementError> {
        self.db.ledger_for_user(user_id, pagination).await
    }

    pub async fn membership_for_user(&self, user_id: &str) -> Result<Option<MembershipGrant>, SettlementError> {
        self.db.membership_for_user(user_id).await
    }

    pub async fn stats_for_user(&self, user_id: &str) -> Result<Option<PlayerStats>, SettlementError> {
        self.db.stats_for_user(user_id).await
    }
}
