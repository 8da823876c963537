// JWT payload decoding
// Parses the claims segment only; signature verification is the server's job.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use super::types::{MalformedToken, TokenClaims};

/// Decode the payload segment of a JWT.
///
/// Total function: any structural problem (wrong segment count, bad base64,
/// invalid JSON, missing `exp`) comes back as `MalformedToken` rather than
/// panicking or propagating a parse error.
pub fn decode_token(token: &str) -> Result<TokenClaims, MalformedToken> {
    let mut segments = token.split('.');
    let _header = segments.next();
    let payload = segments.next().ok_or(MalformedToken {
        reason: "missing payload segment",
    })?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .map_err(|_| MalformedToken {
            reason: "payload is not valid base64url",
        })?;

    serde_json::from_slice(&bytes).map_err(|_| MalformedToken {
        reason: "payload is not a valid claims object",
    })
}

#[cfg(test)]
pub(crate) fn mint_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({"exp": exp, "user_id": 7, "email": "clerk@example.com"}).to_string(),
    );
    format!("{}.{}.sig", header, payload)
}
