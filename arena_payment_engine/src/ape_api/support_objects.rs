use serde::{Deserialize, Serialize};

use crate::db_types::{ClaimOutcome, SupportRequest, SupportStatus};
use crate::order_objects::Pagination;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportQueryFilter {
    pub status: Option<SupportStatus>,
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl SupportQueryFilter {
    pub fn with_status(mut self, status: SupportStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportResolution {
    pub request: SupportRequest,
    /// The result of the nickname claim performed on behalf of the requester, when the resolution
    /// involved one.
    pub claim: Option<ClaimOutcome>,
}
