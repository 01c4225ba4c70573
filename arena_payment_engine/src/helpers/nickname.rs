use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const MIN_NICKNAME_LEN: usize = 3;
pub const MAX_NICKNAME_LEN: usize = 24;

static NICKNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{2,23}$").expect("nickname regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NicknameFormatError {
    #[error("Nickname must be between {MIN_NICKNAME_LEN} and {MAX_NICKNAME_LEN} characters long")]
    Length,
    #[error("Nickname must start with a letter and contain only letters, digits and underscores")]
    Charset,
}

/// Checks the format of a desired handle. Uniqueness is not checked here; that is the claim-time
/// unique constraint's job.
pub fn validate_nickname_format(nickname: &str) -> Result<(), NicknameFormatError> {
    if nickname.len() < MIN_NICKNAME_LEN || nickname.len() > MAX_NICKNAME_LEN {
        return Err(NicknameFormatError::Length);
    }
    if !NICKNAME_RE.is_match(nickname) {
        return Err(NicknameFormatError::Charset);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_nicknames() {
        for n in ["proGamer", "abc", "A_1", "x".repeat(24).as_str()] {
            assert!(validate_nickname_format(n).is_ok(), "{n} should be valid");
        }
    }

    #[test]
    fn invalid_nicknames() {
        assert_eq!(validate_nickname_format("ab"), Err(NicknameFormatError::Length));
        assert_eq!(validate_nickname_format(&"x".repeat(25)), Err(NicknameFormatError::Length));
        assert_eq!(validate_nickname_format("1abc"), Err(NicknameFormatError::Charset));
        assert_eq!(validate_nickname_format("pro gamer"), Err(NicknameFormatError::Charset));
        assert_eq!(validate_nickname_format("prö"), Err(NicknameFormatError::Charset));
    }
}
