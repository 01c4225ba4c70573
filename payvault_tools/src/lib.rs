//! A thin REST client for the PayVault payment provider.
//!
//! PayVault is the external processor that actually moves money. The client covers the three calls
//! the settlement engine needs: registering a payment intent, capturing the funds for an approved
//! intent, and querying the status of an intent. Capture is idempotent on the provider's side;
//! re-capturing an already-captured intent returns the existing capture record.

mod api;
mod config;
mod error;

mod data_objects;

pub use api::PayVaultApi;
pub use config::PayVaultConfig;
pub use data_objects::{CaptureResult, CaptureState, IntentStatus, NewIntentRequest, PaymentIntent};
pub use error::PayVaultApiError;
