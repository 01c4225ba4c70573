mod nickname;

pub use nickname::{validate_nickname_format, NicknameFormatError, MAX_NICKNAME_LEN, MIN_NICKNAME_LEN};
use rand::Rng;

use crate::db_types::OrderId;

/// Generates a fresh order id of the form `ord-<16 hex chars>`.
pub fn new_order_id() -> OrderId {
    let mut rng = rand::thread_rng();
    let id: u64 = rng.gen();
    OrderId(format!("ord-{id:016x}"))
}
