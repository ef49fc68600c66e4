// =============================================================================
// Bithumb HMAC-SHA512 request signing
// =============================================================================
//
// Private endpoints sign `endpoint || NUL || url_encode(sorted params) || NUL
// || nonce` with HMAC-SHA512, then Base64-encode the *hex string* of the
// digest rather than its raw bytes — a quirk of Bithumb's API that must be
// preserved for interoperability with existing signing fixtures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Monotonic nonce source. Bithumb rejects a nonce that does not strictly
/// increase across calls within one process, so this counter ratchets
/// forward even if the wall clock hasn't advanced since the last call.
pub struct NonceGenerator {
    last: AtomicI64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Current time in milliseconds, guaranteed greater than every value
    /// previously returned by this generator.
    pub fn next(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as i64;

        loop {
            let prev = self.last.load(Ordering::SeqCst);
            let candidate = now.max(prev + 1);
            if self
                .last
                .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return candidate;
            }
        }
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// URL-encode `params` sorted alphabetically by key, as `k=v` pairs joined by
/// `&` — the encoding Bithumb expects the signature to be computed over.
pub fn sorted_url_encode(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Compute the `Api-Sign` header value for a private request.
///
/// `params` must already contain the `endpoint` key (Bithumb signs and posts
/// it as an ordinary form field, not just as part of the URL path).
pub fn sign(secret: &str, endpoint: &str, params: &BTreeMap<String, String>, nonce: i64) -> String {
    let encoded = sorted_url_encode(params);
    let signing_string = format!("{endpoint}\0{encoded}\0{nonce}");

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(signing_string.as_bytes());
    let hex_digest = hex::encode(mac.finalize().into_bytes());

    BASE64.encode(hex_digest.as_bytes())
}
