/// Opaque one-time tokens (password reset, email verification)
///
/// The plaintext is 32 random base62 characters and is only ever shown to the
/// user. The store keeps its SHA-256 hex digest, so a leaked table cannot be
/// replayed.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the plaintext token
pub const TOKEN_LENGTH: usize = 32;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a new token, returning `(plaintext, digest)`
pub fn generate_token() -> (String, String) {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let digest = digest_token(&token);

    (token, digest)
}

/// SHA-256 of the plaintext, lower-case hex
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check run before touching the store
pub fn validate_token_format(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let (first, first_digest) = generate_token();
        let (second, second_digest) = generate_token();

        assert_eq!(first.len(), TOKEN_LENGTH);
        assert!(validate_token_format(&first));
        assert_ne!(first, second);
        assert_ne!(first_digest, second_digest);
        assert_eq!(first_digest.len(), 64);
        assert_eq!(first_digest, digest_token(&first));
    }

    #[test]
    fn test_digest_is_stable_hex() {
        // Known SHA-256 of "abc"
        assert_eq!(
            digest_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_validate_token_format() {
        assert!(validate_token_format("abcdefghijklmnopqrstuvwxyz012345"));
        assert!(!validate_token_format("short"));
        assert!(!validate_token_format("abcdefghijklmnopqrstuvwxyz01234!"));
        assert!(!validate_token_format(""));
    }
}
