//! One-time codes for email, password reset and phone verification.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Six random decimal digits, zero padded.
pub fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", code)
}

pub fn codes_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Keyed digest of a code, so a token can carry it without revealing it.
pub fn code_digest(secret: &str, subject: &str, code: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(subject.as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn comparison_requires_exact_match() {
        assert!(codes_match("012345", "012345"));
        assert!(!codes_match("012345", "012346"));
        assert!(!codes_match("012345", "12345"));
    }

    #[test]
    fn digest_depends_on_subject_and_secret() {
        let a = code_digest("secret", "user-1", "123456");
        assert_eq!(a, code_digest("secret", "user-1", "123456"));
        assert_ne!(a, code_digest("secret", "user-2", "123456"));
        assert_ne!(a, code_digest("other", "user-1", "123456"));
        assert!(!a.contains("123456"));
    }
}
