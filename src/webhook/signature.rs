//! `X-Hub-Signature-256` verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw body, keyed by
//! the webhook secret, and sends it as `sha256=<hex>`. Deliveries are
//! verified before the body is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decode a `sha256=<hex>` header. `None` for any other shape.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// `sha256=<hex>`, as GitHub sends it.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Constant-time check of a delivery's signature header.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example from GitHub's "Validating webhook deliveries" guide.
    const DOC_SECRET: &[u8] = b"It's a Secret to Everybody";
    const DOC_PAYLOAD: &[u8] = b"Hello, World!";
    const DOC_HEADER: &str =
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

    #[test]
    fn test_documented_vector() {
        assert!(verify_signature(DOC_PAYLOAD, DOC_HEADER, DOC_SECRET));
        assert_eq!(
            format_signature_header(&compute_signature(DOC_PAYLOAD, DOC_SECRET)),
            DOC_HEADER
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        assert!(!verify_signature(DOC_PAYLOAD, DOC_HEADER, b"wrong"));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        assert!(!verify_signature(b"Hello, World?", DOC_HEADER, DOC_SECRET));
    }

    #[test]
    fn test_malformed_headers() {
        assert!(parse_signature_header("757107ea").is_none());
        assert!(parse_signature_header("sha1=757107ea").is_none());
        assert!(parse_signature_header("sha256=not-hex").is_none());
        assert!(!verify_signature(DOC_PAYLOAD, "", DOC_SECRET));
    }
}
