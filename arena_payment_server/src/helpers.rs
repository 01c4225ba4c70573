use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Calculates the base64-encoded HMAC-SHA256 signature for `data`, as PayVault attaches to its
/// webhook notifications.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}
