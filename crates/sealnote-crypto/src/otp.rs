//! One-time code derivation (RFC 4226 / RFC 6238)
//!
//! Pure derivation only: window policy, cooldowns, and secret storage live
//! in the service layer. SHA-1 is retained because it is what authenticator
//! apps implement for `otpauth://` provisioning; it is used purely as an
//! HMAC here, where collision attacks do not apply.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Number of digits in a generated code
pub const CODE_DIGITS: usize = 6;

/// Length of a freshly generated shared secret in bytes (160 bits)
pub const SECRET_SIZE: usize = 20;

/// TOTP time step in seconds (the standard authenticator period)
pub const TIME_STEP_SECS: u64 = 30;

/// Alphabet for RFC 4648 base32, as expected by authenticator apps
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Derive the 6-digit code for a counter value.
///
/// HMAC-SHA1 over the 8-byte big-endian counter, dynamic truncation per
/// RFC 4226 §5.3, reduced mod 1 000 000 and zero-padded.
pub fn hotp(secret: &[u8], counter: u64) -> String {
    let Ok(mut mac) = HmacSha1::new_from_slice(secret) else {
        unreachable!("HMAC-SHA1 accepts any key size");
    };
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    // Dynamic truncation: low nibble of the last byte selects the offset
    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(hash[offset] & 0x7f) << 24)
        | (u32::from(hash[offset + 1]) << 16)
        | (u32::from(hash[offset + 2]) << 8)
        | u32::from(hash[offset + 3]);

    format!("{:06}", binary % 1_000_000)
}

/// Time counter for a wall-clock time in unix seconds.
pub fn time_counter(unix_seconds: u64) -> u64 {
    unix_seconds / TIME_STEP_SECS
}

/// Constant-time comparison of two candidate codes.
///
/// Length difference short-circuits: code length is public (always six
/// digits), only the digit values are secret.
pub fn code_matches(candidate: &str, expected: &str) -> bool {
    if candidate.len() != expected.len() {
        return false;
    }

    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Encode bytes as unpadded RFC 4648 base32.
///
/// Authenticator apps expect the shared secret in this form inside the
/// provisioning URI.
pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;

        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }

    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

/// Build the `otpauth://` provisioning URI for authenticator apps.
///
/// Pure formatting over the base32-encoded secret, the account name, and
/// the issuer; not security-critical.
pub fn provisioning_uri(secret: &[u8], account: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={}&issuer={issuer}&algorithm=SHA1&digits={CODE_DIGITS}&period={TIME_STEP_SECS}",
        base32_encode(secret)
    )
}
