mod credits;

pub mod helpers;
pub mod op;
mod secret;

pub use credits::{Credits, CreditsConversionError, CURRENCY_CODE, CURRENCY_CODE_LOWER};
pub use secret::Secret;
