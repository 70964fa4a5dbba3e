//! Session ID generation

use rand::{rngs::OsRng, TryRngCore};

use crate::error::{SessionError, SessionResult};

/// Default number of random bytes in a session ID (128 bits)
pub const DEFAULT_ID_LENGTH: usize = 16;

/// Generate a new session ID from `length` bytes of OS randomness, encoded as
/// lowercase hex (`2 * length` characters). Uniqueness is probabilistic only;
/// no collision check is made against active sessions.
pub fn generate_id(length: usize) -> SessionResult<String> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SessionError::Generation(Box::new(e)))?;
    Ok(hex::encode(bytes))
}

/// Whether the ID looks like one produced by [`generate_id`]: non-empty and
/// lowercase hex only.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_hex_of_requested_length() {
        let id = generate_id(16).unwrap();
        assert_eq!(id.len(), 32);
        assert!(is_valid_id(&id));

        let id = generate_id(24).unwrap();
        assert_eq!(id.len(), 48);
    }

    #[test]
    fn consecutive_ids_differ() {
        assert_ne!(generate_id(16).unwrap(), generate_id(16).unwrap());
    }

    #[test]
    fn rejects_non_hex_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id("ABCDEF"));
        assert!(is_valid_id("0123456789abcdef"));
    }
}
