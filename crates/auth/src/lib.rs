//! Gateway identity, pairing sessions, and hashed bearer tokens (§4.2).
//!
//! Business logic lives here; persistence is delegated to an
//! [`AuthRepository`] implementation (the SQLite adapter lives in
//! `spaceduck-store`) so this crate stays free of any particular storage
//! engine, matching the "opaque collaborator" framing of the data model.

mod repository;
mod store;

pub use repository::AuthRepository;
pub use store::{AuthStore, ConfirmOutcome, PairingStartResult};

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a uniform 6-digit code, zero-padded (`000000..=999999`).
pub fn generate_pairing_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..=999_999);
    format!("{n:06}")
}

/// Generate a random 32-byte token, returned hex-encoded.
pub fn generate_raw_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn sha256_hex(raw: &str) -> Vec<u8> {
    Sha256::digest(raw.as_bytes()).to_vec()
}

/// Constant-time comparison of two already-hashed tokens.
pub fn hashes_equal(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_pairing_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn raw_token_is_64_hex_chars() {
        let token = generate_raw_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hashes_equal_is_constant_time_safe() {
        let a = sha256_hex("abc");
        let b = sha256_hex("abc");
        let c = sha256_hex("xyz");
        assert!(hashes_equal(&a, &b));
        assert!(!hashes_equal(&a, &c));
    }
}
