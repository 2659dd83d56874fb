//! Time-based one-time passwords (RFC 6238 over HMAC-SHA256).
//!
//! Codes are six digits with a 60 second step. Secrets are 20 random bytes
//! stored hex encoded on the user row.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const OTP_DIGITS: u32 = 6;
pub const OTP_STEP_SECONDS: i64 = 60;

/// Generate a fresh hex-encoded OTP secret.
pub fn generate_otp_secret() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..20).map(|_| rng.random()).collect();
    hex::encode(random_bytes)
}

/// HOTP value for `counter`, truncated to `digits` decimal digits.
pub fn hotp(key: &[u8], counter: u64, digits: u32) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = ((hash[offset] as u32 & 0x7f) << 24)
        | ((hash[offset + 1] as u32) << 16)
        | ((hash[offset + 2] as u32) << 8)
        | (hash[offset + 3] as u32);

    let code = binary % 10u32.pow(digits);
    Some(format!("{:0width$}", code, width = digits as usize))
}

/// TOTP code for a hex secret at the given unix time.
pub fn totp_at(secret_hex: &str, unix_time: i64) -> Option<String> {
    let key = hex::decode(secret_hex).ok()?;
    let counter = unix_time.max(0) / OTP_STEP_SECONDS;
    hotp(&key, counter as u64, OTP_DIGITS)
}

/// Check `code` against the current step and the previous one.
pub fn verify_totp(secret_hex: &str, code: &str, unix_time: i64) -> bool {
    let code = code.trim();
    if code.len() != OTP_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    [unix_time, unix_time - OTP_STEP_SECONDS]
        .into_iter()
        .filter_map(|t| totp_at(secret_hex, t))
        .any(|expected| bool::from(expected.as_bytes().ct_eq(code.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotp_rfc6238_sha256_vector() {
        // RFC 6238 appendix B, SHA-256 seed, T = 59s with a 30s step (counter 1).
        let key = b"12345678901234567890123456789012";
        assert_eq!(hotp(key, 1, 8).unwrap(), "46119246");
        assert_eq!(hotp(key, 1, 6).unwrap(), "119246");
    }

    #[test]
    fn test_secret_is_hex_of_20_bytes() {
        let secret = generate_otp_secret();
        assert_eq!(secret.len(), 40);
        assert!(hex::decode(&secret).is_ok());
        assert_ne!(secret, generate_otp_secret());
    }

    #[test]
    fn test_totp_stable_within_step() {
        let secret = generate_otp_secret();
        let t = 1_700_000_040;
        let code = totp_at(&secret, t).unwrap();
        assert_eq!(code.len(), 6);
        assert_eq!(totp_at(&secret, t + 10).unwrap(), code);
    }

    #[test]
    fn test_verify_allows_one_step_drift() {
        let secret = generate_otp_secret();
        let t = 1_700_000_040;
        let code = totp_at(&secret, t).unwrap();
        assert!(verify_totp(&secret, &code, t));
        assert!(verify_totp(&secret, &code, t + OTP_STEP_SECONDS));
    }

    #[test]
    fn test_verify_rejects_malformed_codes() {
        let secret = generate_otp_secret();
        assert!(!verify_totp(&secret, "12345", 0));
        assert!(!verify_totp(&secret, "abcdef", 0));
        assert!(!verify_totp("not-hex", "123456", 0));
    }
}
