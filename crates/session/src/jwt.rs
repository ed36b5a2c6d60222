//! Expiry decoding for AT Protocol session JWTs
//!
//! Access and refresh tokens are opaque as far as this client is
//! concerned — signature verification is the PDS's job over the TLS
//! connection we already trust. All we need from them is the `exp`
//! claim, so the payload segment is base64url-decoded and read as JSON
//! without ever touching the signature.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Decode the `exp` claim (seconds since epoch) from a JWT without
/// verifying its signature.
pub fn decode_expiry(jwt: &str) -> Result<i64> {
    let payload = jwt
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::MalformedToken("token has no payload segment".into()))?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(payload))
        .map_err(|e| Error::MalformedToken(format!("payload is not valid base64: {e}")))?;

    let claims: Claims = serde_json::from_slice(&decoded)
        .map_err(|e| Error::MalformedToken(format!("payload is not valid JSON: {e}")))?;

    Ok(claims.exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn make_jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decodes_exp_claim() {
        let jwt = make_jwt(1_700_000_000);
        assert_eq!(decode_expiry(&jwt).unwrap(), 1_700_000_000);
    }

    #[test]
    fn rejects_token_without_payload_segment() {
        let err = decode_expiry("onlyoneseg").unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
    }

    #[test]
    fn rejects_non_json_payload() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode("not json");
        let jwt = format!("{header}.{payload}.sig");
        let err = decode_expiry(&jwt).unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
    }
}
