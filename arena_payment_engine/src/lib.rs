//! Arena Payment Engine
//!
//! The settlement engine behind the Arena store. The platform sells virtual goods (credits,
//! memberships and account services such as nickname changes) payable either through the external
//! PayVault provider or the user's internal credit balance. This crate guarantees that every
//! purchase is fulfilled exactly once, regardless of payment method, duplicate client retries,
//! asynchronous provider notifications, or partial failures between payment capture and the
//! fulfillment side effect.
//!
//! The crate is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). Low-level storage access lives in free
//!    functions taking a `&mut SqliteConnection` so that they compose into atomic transactions.
//!    You should never need to access the database directly; use the public APIs instead. The
//!    exception is the data types used in the database, defined in [`db_types`], which are public.
//! 2. The public API ([`mod@ape_api`]). [`OrderFlowApi`] owns the order state machine and all of
//!    its transition guarantees; [`LedgerApi`], [`NicknameApi`] and [`SupportApi`] cover balances,
//!    handle reservation and the manual-review queue. Backends implement the traits in
//!    [`mod@traits`] to plug in.
//! 3. Event hooks ([`mod@events`]): a small actor framework emitting events (order completed,
//!    cancelled, failed) that callers can subscribe custom handlers to.

pub mod catalog;
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod helpers;
pub mod traits;

mod ape_api;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use ape_api::{
    ledger_api::LedgerApi,
    nickname_api::{NicknameApi, NicknameCheck},
    order_flow_api::OrderFlowApi,
    order_objects,
    support_api::SupportApi,
    support_objects,
};
