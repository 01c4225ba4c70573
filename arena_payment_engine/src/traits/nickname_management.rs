use crate::db_types::ClaimOutcome;
use crate::traits::SettlementError;

/// Validates and atomically claims unique handles.
///
/// `nickname_in_use` is advisory only; the authoritative guard is the storage-level uniqueness
/// constraint enforced by `claim_nickname`. This is what closes the unavoidable race between a
/// verify and a claim from concurrent purchasers of the same desired handle.
#[allow(async_fn_in_trait)]
pub trait NicknameManagement: Clone {
    async fn nickname_in_use(&self, nickname: &str) -> Result<bool, SettlementError>;

    /// Attempts the atomic rename. A uniqueness violation is an expected outcome and is returned
    /// as [`ClaimOutcome::Conflict`], letting the caller decide how to handle the fulfillment
    /// failure.
    async fn claim_nickname(&self, user_id: &str, nickname: &str) -> Result<ClaimOutcome, SettlementError>;

    async fn nickname_for_user(&self, user_id: &str) -> Result<Option<String>, SettlementError>;
}
