use serde::{Deserialize, Serialize};

use crate::{
    helpers::validate_nickname_format,
    traits::{NicknameManagement, SettlementError},
};

/// The result of a nickname pre-check. Advisory only: the authoritative availability check is the
/// uniqueness constraint applied when the claim is actually made, so a `available == true` answer
/// can still lose the race to a concurrent purchaser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicknameCheck {
    pub nickname: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// `None` when the format is invalid and the availability lookup was skipped.
    pub available: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NicknameApi<B> {
    db: B,
}

impl<B> NicknameApi<B>
where B: NicknameManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Validates the format of the desired nickname and, when it passes, reports whether the
    /// handle is currently in use.
    pub async fn check_nickname(&self, nickname: &str) -> Result<NicknameCheck, SettlementError> {
        if let Err(e) = validate_nickname_format(nickname) {
            return Ok(NicknameCheck {
                nickname: nickname.to_string(),
                valid: false,
                reason: Some(e.to_string()),
                available: None,
            });
        }
        let in_use = self.db.nickname_in_use(nickname).await?;
        Ok(NicknameCheck { nickname: nickname.to_string(), valid: true, reason: None, available: Some(!in_use) })
    }

    pub async fn nickname_for_user(&self, user_id: &str) -> Result<Option<String>, SettlementError> {
        self.db.nickname_for_user(user_id).await
    }
}
