use log::*;

use crate::{
    db_types::SupportRequest,
    support_objects::{SupportQueryFilter, SupportResolution},
    traits::{SettlementError, SupportManagement},
};

/// Administrator access to the manual-review queue.
#[derive(Debug, Clone)]
pub struct SupportApi<B> {
    db: B,
}

impl<B> SupportApi<B>
where B: SupportManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_request(&self, request_id: i64) -> Result<SupportRequest, SettlementError> {
        self.db
            .fetch_support_request(request_id)
            .await?
            .ok_or(SettlementError::SupportRequestNotFound(request_id))
    }

    pub async fn search_requests(&self, query: SupportQueryFilter) -> Result<Vec<SupportRequest>, SettlementError> {
        self.db.search_support_requests(query).await
    }

    pub async fn start_review(&self, request_id: i64, admin_id: &str) -> Result<SupportRequest, SettlementError> {
        let request = self.db.start_review(request_id, admin_id).await?;
        debug!("🛃️ Support request #{request_id} moved to {} by {admin_id}", request.status);
        Ok(request)
    }

    /// Resolves the request. An approval of a reclaim-nickname request attempts the claim on
    /// behalf of the requester; if the handle has been taken in the meantime the resolution is
    /// rolled back and a conflict is returned so the admin can decide how to proceed.
    pub async fn resolve_request(
        &self,
        request_id: i64,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<SupportResolution, SettlementError> {
        let resolution = self.db.resolve_support_request(request_id, admin_id, approve, notes).await?;
        info!(
            "🛃️ Support request #{request_id} resolved as {} by {admin_id}",
            resolution.request.status
        );
        Ok(resolution)
    }
}
