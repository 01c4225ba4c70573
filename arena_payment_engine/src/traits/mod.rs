//! The behaviour contracts backends must implement to drive the settlement engine.
//!
//! Storage backends implement [`SettlementDatabase`] (plus the narrower management traits) to act
//! as the transactional persistence layer. Payment providers implement [`PaymentProvider`] to
//! collect real money.

mod ledger_management;
mod nickname_management;
mod payment_provider;
mod settlement_database;
mod support_management;

pub use ledger_management::LedgerManagement;
pub use nickname_management::NicknameManagement;
pub use payment_provider::{CaptureOutcome, IntentRequest, IntentResult, PaymentProvider, ProviderError};
pub use settlement_database::{SettlementDatabase, SettlementError};
pub use support_management::SupportManagement;
