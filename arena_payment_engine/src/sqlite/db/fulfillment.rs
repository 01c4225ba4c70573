use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{ClaimOutcome, FulfillmentOutcome, Order, OrderMemo},
    sqlite::db::{ledger, memberships, nicknames, stats, support},
    traits::SettlementError,
};

/// Dispatches the fulfillment side effect for a captured order on the given connection.
///
/// Callers run this inside the settlement transaction, so the effect commits together with the
/// order's transition to `Completed` or not at all. The memo carries everything the effect needs;
/// the catalog is never consulted here.
///
/// A nickname claim that loses the uniqueness race does not error: the payment has been captured,
/// so the order still completes, with [`FulfillmentOutcome::NicknameConflict`] recording what
/// happened.
pub async fn apply_fulfillment(
    order: &Order,
    conn: &mut SqliteConnection,
) -> Result<FulfillmentOutcome, SettlementError> {
    let user_id = order.user_id.as_str();
    let outcome = match order.memo() {
        OrderMemo::Credits { amount } => {
            ledger::insert_entry(user_id, *amount, "Credits purchase", Some(&order.order_id), conn).await?;
            FulfillmentOutcome::CreditsGranted { amount: *amount }
        },
        OrderMemo::Membership { tier, days } => {
            let grant = memberships::extend_membership(user_id, tier, *days, conn).await?;
            FulfillmentOutcome::MembershipExtended { tier: grant.tier, ends_at: grant.ends_at }
        },
        OrderMemo::RenameNickname { new_nickname } => match nicknames::claim_nickname(user_id, new_nickname, conn)
            .await?
        {
            ClaimOutcome::Claimed => FulfillmentOutcome::NicknameChanged { nickname: new_nickname.clone() },
            ClaimOutcome::Conflict => {
                warn!(
                    "🪪️ Order [{}] paid for nickname '{new_nickname}' but the handle was taken first. Completing \
                     with a conflict outcome.",
                    order.order_id
                );
                FulfillmentOutcome::NicknameConflict { nickname: new_nickname.clone() }
            },
        },
        OrderMemo::ReclaimNickname { requested_nickname } => {
            let request = support::insert_request(order, requested_nickname, conn).await?;
            debug!("🛃️ Order [{}] opened support request #{} for review", order.order_id, request.id);
            FulfillmentOutcome::SupportRequestOpened { request_id: request.id }
        },
        OrderMemo::ResetStats => {
            stats::reset_stats(user_id, conn).await?;
            FulfillmentOutcome::StatsReset
        },
    };
    Ok(outcome)
}
