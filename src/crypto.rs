//! Tuya Open API request signing.
//! HMAC-SHA256 over `client_id [+ access_token] + t + string_to_sign`.

use crate::error::{Result, TuyaError};
use crate::protocol::SignedRequest;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const SIGN_METHOD: &str = "HMAC-SHA256";

/// Headers values produced for one outgoing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Uppercase hex HMAC, sent as the `sign` header
    pub sign: String,
    /// Milliseconds since epoch, sent as the `t` header
    pub timestamp: String,
    /// Path and sorted query that were signed (and are requested)
    pub canonical_path: String,
}

/// Lowercase hex SHA-256 of the body, or of the empty string when there is none.
pub fn body_hash(body: Option<&[u8]>) -> String {
    hex::encode(Sha256::digest(body.unwrap_or_default()))
}

/// `METHOD\n{body_hash}\n\n{canonical_path}`; the empty line is the (unused) headers section.
pub fn string_to_sign(method: &str, body_hash: &str, canonical_path: &str) -> String {
    format!("{}\n{}\n\n{}", method, body_hash, canonical_path)
}

/// RequestSigner holds the project credentials and produces request signatures.
#[derive(Clone)]
pub struct RequestSigner {
    access_id: String,
    access_secret: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_id", &self.access_id)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    pub fn new<I: Into<String>, S: Into<String>>(access_id: I, access_secret: S) -> Self {
        Self {
            access_id: access_id.into(),
            access_secret: access_secret.into(),
        }
    }

    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    /// Sign a request at the given timestamp (ms since epoch).
    ///
    /// `access_token` is `None` for the token request itself; the token segment
    /// is then left out of the message entirely.
    pub fn sign(
        &self,
        request: &SignedRequest,
        access_token: Option<&str>,
        timestamp: u64,
    ) -> Result<Signature> {
        let canonical_path = request.canonical_path();
        let hash = body_hash(request.body.as_deref());
        let to_sign = string_to_sign(request.method.as_str(), &hash, &canonical_path);
        let t = timestamp.to_string();

        let mut message =
            String::with_capacity(self.access_id.len() + t.len() + to_sign.len() + 64);
        message.push_str(&self.access_id);
        if let Some(token) = access_token {
            message.push_str(token);
        }
        message.push_str(&t);
        message.push_str(&to_sign);

        Ok(Signature {
            sign: self.sign_message(&message)?,
            timestamp: t,
            canonical_path,
        })
    }

    /// Uppercase hex HMAC-SHA256 of `message` keyed by the access secret.
    pub fn sign_message(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.access_secret.as_bytes())
            .map_err(|_| TuyaError::SigningFailed)?;
        mac.update(message.as_bytes());
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{self, GRANT_TYPE_KEY, GRANT_TYPE_SIMPLE, TOKEN_PATH};
    use serde::Serialize;

    const T: u64 = 1_700_000_000_000;

    fn signer() -> RequestSigner {
        RequestSigner::new("test-id", "test-secret")
    }

    #[test]
    fn empty_body_hash_is_sha256_of_nothing() {
        assert_eq!(
            body_hash(None),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(body_hash(Some(b"")), body_hash(None));
    }

    #[test]
    fn token_request_signature_matches_reference() {
        let request = SignedRequest::get(TOKEN_PATH).query(GRANT_TYPE_KEY, GRANT_TYPE_SIMPLE);
        let sig = signer().sign(&request, None, T).unwrap();
        assert_eq!(sig.canonical_path, "/v1.0/token?grant_type=1");
        assert_eq!(sig.timestamp, "1700000000000");
        assert_eq!(
            sig.sign,
            "7F48787ED624D5E9BB4256D54CC73236825DD353A1BDA8283EBDC3EE6917D4E5"
        );
    }

    #[test]
    fn history_signature_matches_reference() {
        // Inserted out of order on purpose.
        let request = SignedRequest::get(protocol::history_path("dev1"))
            .query("page_size", 10)
            .query("page_no", 1);
        let sig = signer().sign(&request, Some("tok123"), T).unwrap();
        assert_eq!(
            sig.canonical_path,
            "/v1.0/scales/dev1/datas/history?page_no=1&page_size=10"
        );
        assert_eq!(
            sig.sign,
            "303E689DF0E8798AB00C87D1A2E5FD590C8120F3C72FE095A804A738183AB43D"
        );
    }

    #[test]
    fn post_signature_hashes_exact_body_bytes() {
        #[derive(Serialize)]
        struct Body {
            height: f64,
            weight: f64,
            age: u32,
            sex: u8,
            resistance: &'static str,
        }
        let body = Body {
            height: 170.0,
            weight: 65.0,
            age: 30,
            sex: 1,
            resistance: "550",
        };
        let request =
            SignedRequest::post_json(protocol::analysis_path("dev1"), &body).unwrap();
        assert_eq!(
            body_hash(request.body.as_deref()),
            "4b68914d52908ad57da041a2d78321d5aa2a00aa5520f0b654bf2a1b4a30ad9d"
        );
        let sig = signer().sign(&request, Some("tok123"), T).unwrap();
        assert_eq!(
            sig.sign,
            "7995282AD4177898DAB422E5C8A7E4764B2AD2CF25BBE2B7E591CDE995DE8DEC"
        );
    }

    #[test]
    fn signature_is_deterministic() {
        let request = SignedRequest::get("/v1.0/devices/dev1");
        let a = signer().sign(&request, Some("tok"), T).unwrap();
        let b = signer().sign(&request, Some("tok"), T).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_byte_changes_alter_signature() {
        let base = SignedRequest::get("/v1.0/devices/dev1");
        let reference = signer().sign(&base, Some("tok"), T).unwrap().sign;

        let other_path = SignedRequest::get("/v1.0/devices/dev2");
        assert_ne!(signer().sign(&other_path, Some("tok"), T).unwrap().sign, reference);
        assert_ne!(signer().sign(&base, Some("tol"), T).unwrap().sign, reference);
        assert_ne!(signer().sign(&base, Some("tok"), T + 1).unwrap().sign, reference);
        assert_ne!(signer().sign(&base, None, T).unwrap().sign, reference);

        let other_key = RequestSigner::new("test-id", "test-secreu");
        assert_ne!(other_key.sign(&base, Some("tok"), T).unwrap().sign, reference);
    }

    #[test]
    fn missing_token_is_omitted_not_padded() {
        let request = SignedRequest::get(TOKEN_PATH).query(GRANT_TYPE_KEY, GRANT_TYPE_SIMPLE);
        let sig = signer().sign(&request, None, T).unwrap();
        let manual = format!(
            "test-id{}{}",
            T,
            string_to_sign("GET", &body_hash(None), "/v1.0/token?grant_type=1")
        );
        assert_eq!(sig.sign, signer().sign_message(&manual).unwrap());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", signer());
        assert!(rendered.contains("test-id"));
        assert!(!rendered.contains("test-secret"));
    }
}
