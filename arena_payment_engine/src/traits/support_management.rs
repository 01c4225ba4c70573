use crate::db_types::SupportRequest;
use crate::support_objects::{SupportQueryFilter, SupportResolution};
use crate::traits::SettlementError;

/// The manual-review queue. Requests are created by fulfillment as a side effect of a completed
/// order, mutated only by administrator actions, and terminal once resolved.
#[allow(async_fn_in_trait)]
pub trait SupportManagement: Clone {
    async fn fetch_support_request(&self, request_id: i64) -> Result<Option<SupportRequest>, SettlementError>;

    async fn search_support_requests(&self, query: SupportQueryFilter)
        -> Result<Vec<SupportRequest>, SettlementError>;

    /// Moves a request from `pendiente` to `en_revision`. Guarded.
    async fn start_review(&self, request_id: i64, admin_id: &str) -> Result<SupportRequest, SettlementError>;

    /// Resolves a request in a single unit of work. Approving a reclaim-nickname request claims
    /// the handle for the requester inside the same transaction; a claim conflict rolls the
    /// resolution back and is reported as such, leaving the request open for the admin to decide.
    async fn resolve_support_request(
        &self,
        request_id: i64,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<SupportResolution, SettlementError>;
}
