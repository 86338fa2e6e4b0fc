//! Cryptographic primitives for the signup flow.
//!
//! Keyed hashes (HMAC-SHA256) are used wherever we need deterministic,
//! non-reversible lookup values: document/phone duplicate detection, OTP
//! storage, captcha tokens. Field encryption is XChaCha20-Poly1305 with a
//! fresh random nonce per call; the nonce travels inside the blob, so a
//! stored value is a single opaque string.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 24;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key must be exactly 32 bytes")]
    InvalidKey,

    #[error("field encryption failed")]
    EncryptionFailed,

    /// Tag mismatch, truncated blob, or bad encoding. Indicates key mismatch
    /// or tampering; callers must not continue past this.
    #[error("field decryption failed")]
    DecryptionFailed,
}

/// 32-byte symmetric key for PII field encryption.
///
/// Wiped from memory on drop. `Debug` deliberately prints nothing useful.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = BASE64.decode(encoded).map_err(|_| CryptoError::InvalidKey)?;
        let bytes: [u8; 32] = raw.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Deterministic keyed hash, hex-encoded.
///
/// Used for document/phone lookup hashes and stored OTP hashes. Same
/// secret + same input always yields the same output, which is what makes
/// duplicate detection work without decrypting anything.
pub fn hmac_hex(secret: &[u8], value: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(value.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute the HMAC of `value` and compare against `expected_hex` in
/// constant time. Length mismatch short-circuits; length is not secret.
pub fn hmac_verify(secret: &[u8], value: &str, expected_hex: &str) -> bool {
    let computed = hmac_hex(secret, value);
    constant_time_eq(computed.as_bytes(), expected_hex.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Encrypt a PII field. Output is base64(nonce || ciphertext+tag).
pub fn encrypt_field(key: &EncryptionKey, plaintext: &str) -> Result<String, CryptoError> {
    let cipher = XChaCha20Poly1305::new(&chacha20poly1305::Key::from(key.0));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(blob))
}

/// Decrypt a blob produced by [`encrypt_field`]. Fails closed: any tag
/// mismatch or malformed input is `DecryptionFailed`, never empty output.
pub fn decrypt_field(key: &EncryptionKey, blob: &str) -> Result<String, CryptoError> {
    let raw = BASE64
        .decode(blob)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    if raw.len() <= NONCE_LEN {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new(&chacha20poly1305::Key::from(key.0));
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

/// Generate a zero-padded numeric OTP, uniform over [0, 10^length).
pub fn generate_otp(length: usize) -> String {
    let max = 10u64.pow(length as u32);
    let value = OsRng.gen_range(0..max);
    format!("{:0width$}", value, width = length)
}

/// Arithmetic captcha challenge: two small operands plus an HMAC token
/// binding them, so the answer cannot be replayed against different
/// operands.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CaptchaChallenge {
    pub a: u8,
    pub b: u8,
    pub token: String,
}

pub fn create_captcha(secret: &[u8]) -> CaptchaChallenge {
    let a = OsRng.gen_range(1..=9u8);
    let b = OsRng.gen_range(1..=9u8);
    let token = captcha_token(secret, a, b);
    CaptchaChallenge { a, b, token }
}

pub fn verify_captcha(secret: &[u8], a: u8, b: u8, token: &str, answer: u16) -> bool {
    let expected = captcha_token(secret, a, b);
    if !constant_time_eq(expected.as_bytes(), token.as_bytes()) {
        return false;
    }
    answer == u16::from(a) + u16::from(b)
}

fn captcha_token(secret: &[u8], a: u8, b: u8) -> String {
    hmac_hex(secret, &format!("captcha:{}:{}", a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey::from_bytes([7u8; 32])
    }

    #[test]
    fn hmac_is_deterministic() {
        let h1 = hmac_hex(b"secret", "+5511987654321");
        let h2 = hmac_hex(b"secret", "+5511987654321");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn hmac_differs_by_secret_and_value() {
        let base = hmac_hex(b"secret", "value");
        assert_ne!(base, hmac_hex(b"other", "value"));
        assert_ne!(base, hmac_hex(b"secret", "other"));
    }

    #[test]
    fn hmac_verify_accepts_match_rejects_mismatch() {
        let h = hmac_hex(b"secret", "123456");
        assert!(hmac_verify(b"secret", "123456", &h));
        assert!(!hmac_verify(b"secret", "654321", &h));
        // Truncated expected value must fail on the length check.
        assert!(!hmac_verify(b"secret", "123456", &h[..10]));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = test_key();
        for plaintext in ["x", "", "12345678901", "José da Silva"] {
            let blob = encrypt_field(&key, plaintext).unwrap();
            assert_eq!(decrypt_field(&key, &blob).unwrap(), plaintext);
        }
    }

    #[test]
    fn encryption_uses_fresh_nonces() {
        let key = test_key();
        let a = encrypt_field(&key, "same input").unwrap();
        let b = encrypt_field(&key, "same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = test_key();
        let blob = encrypt_field(&key, "sensitive").unwrap();
        let mut raw = BASE64.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);
        assert!(matches!(
            decrypt_field(&key, &tampered),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let blob = encrypt_field(&test_key(), "sensitive").unwrap();
        let other = EncryptionKey::from_bytes([9u8; 32]);
        assert!(decrypt_field(&other, &blob).is_err());
    }

    #[test]
    fn truncated_blob_fails_closed() {
        assert!(decrypt_field(&test_key(), "AAAA").is_err());
        assert!(decrypt_field(&test_key(), "not base64 !!!").is_err());
    }

    #[test]
    fn otp_has_requested_length_and_digits() {
        for _ in 0..50 {
            let otp = generate_otp(6);
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(generate_otp(4).len(), 4);
    }

    #[test]
    fn captcha_round_trip() {
        let challenge = create_captcha(b"secret");
        let answer = u16::from(challenge.a) + u16::from(challenge.b);
        assert!(verify_captcha(
            b"secret",
            challenge.a,
            challenge.b,
            &challenge.token,
            answer
        ));
    }

    #[test]
    fn captcha_rejects_wrong_answer_and_forged_token() {
        let challenge = create_captcha(b"secret");
        let answer = u16::from(challenge.a) + u16::from(challenge.b);
        assert!(!verify_captcha(
            b"secret",
            challenge.a,
            challenge.b,
            &challenge.token,
            answer + 1
        ));
        // Token minted for different operands must not validate.
        let other = captcha_token(b"secret", challenge.a.wrapping_add(1), challenge.b);
        assert!(!verify_captcha(
            b"secret",
            challenge.a,
            challenge.b,
            &other,
            answer
        ));
    }

    #[test]
    fn key_from_base64_enforces_length() {
        assert!(EncryptionKey::from_base64(&BASE64.encode([1u8; 32])).is_ok());
        assert!(EncryptionKey::from_base64(&BASE64.encode([1u8; 16])).is_err());
        assert!(EncryptionKey::from_base64("not base64 !!!").is_err());
    }
}
