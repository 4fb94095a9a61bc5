//! Last-resort token decoding without signature verification.
//!
//! Used only when the upstream authority cannot be reached and no local
//! verification succeeded. Anything produced here is display data: it is
//! tagged as unverified by the caller and must never authorize an action.

use crate::auth::claims::IdentityClaims;
use common::jwt::{decode_unverified_header, decode_unverified_payload};
use serde_json::Value;

/// Decodes token payloads without checking signatures.
pub struct UnverifiedDecoder;

impl UnverifiedDecoder {
    /// Decode the payload of a three-segment token.
    ///
    /// Returns `None` if the token is oversized, not three segments, or the
    /// payload is not a JSON object. A broken header only loses `alg`/`kid`.
    pub fn decode(token: &str) -> Option<IdentityClaims> {
        let payload = decode_unverified_payload(token)
            .map_err(|e| {
                tracing::debug!(target: "idr.auth.unverified", error = ?e, "Unverified decode failed");
            })
            .ok()?;

        let claims: IdentityClaims = serde_json::from_value(Value::Object(payload)).ok()?;

        let (alg, kid) = match decode_unverified_header(token) {
            Ok(header) => (
                header.get("alg").and_then(Value::as_str).map(str::to_string),
                header.get("kid").and_then(Value::as_str).map(str::to_string),
            ),
            Err(_) => (None, None),
        };

        Some(claims.with_header(alg, kid))
    }

    /// Read `exp` without verification.
    ///
    /// Only ever used to shorten a cache lifetime, never to extend trust.
    pub fn peek_exp(token: &str) -> Option<i64> {
        Self::decode(token).and_then(|claims| claims.exp)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn unsigned_token(header: &str, payload: &str) -> String {
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_reads_payload_and_header() {
        let token = unsigned_token(
            r#"{"alg":"RS256","kid":"k1"}"#,
            r#"{"sub":"u1","email":"u1@example.com","exp":1900000000,"phone":"+1555"}"#,
        );

        let claims = UnverifiedDecoder::decode(&token).unwrap();

        assert_eq!(claims.sub.as_deref(), Some("u1"));
        assert_eq!(claims.email.as_deref(), Some("u1@example.com"));
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(claims.alg.as_deref(), Some("RS256"));
        assert_eq!(claims.kid.as_deref(), Some("k1"));
        assert_eq!(claims.extra.get("phone").unwrap(), "+1555");
    }

    #[test]
    fn test_decode_ignores_signature_entirely() {
        let token = format!(
            "{}.{}.definitely-not-a-signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"sub":"forged"}"#)
        );

        let claims = UnverifiedDecoder::decode(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("forged"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(UnverifiedDecoder::decode("").is_none());
        assert!(UnverifiedDecoder::decode("opaque-session-token").is_none());
        assert!(UnverifiedDecoder::decode("a.b").is_none());
        assert!(UnverifiedDecoder::decode("a.!!!.c").is_none());
        assert!(UnverifiedDecoder::decode(&unsigned_token("{}", "[1,2,3]")).is_none());
    }

    #[test]
    fn test_peek_exp() {
        let with_exp = unsigned_token(r#"{"alg":"EdDSA"}"#, r#"{"sub":"u","exp":1234}"#);
        let without_exp = unsigned_token(r#"{"alg":"EdDSA"}"#, r#"{"sub":"u"}"#);

        assert_eq!(UnverifiedDecoder::peek_exp(&with_exp), Some(1234));
        assert_eq!(UnverifiedDecoder::peek_exp(&without_exp), None);
        assert_eq!(UnverifiedDecoder::peek_exp("opaque"), None);
    }
}
