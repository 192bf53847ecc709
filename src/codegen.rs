use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const CODE_LEN: usize = 7;
pub const MAX_CUSTOM_LEN: usize = 16;

// Paths owned by the router, never usable as codes
pub const RESERVED_CODES: [&str; 5] = ["shorten", "analytics", "qr", "health", "metrics"];

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

// Create a short code (hash of url + time + sequence, mapped onto base62)
pub fn generate_code(url: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(SEQUENCE.fetch_add(1, Ordering::Relaxed).to_le_bytes());

    hasher
        .finalize()
        .iter()
        .take(CODE_LEN)
        .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
        .collect()
}

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES.contains(&code)
}

// Custom codes: 1..=16 chars of [a-z0-9_-], already lowercased
pub fn is_valid_custom(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CUSTOM_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
