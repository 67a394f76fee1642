//! Tuya Open API wire definitions.
//! Regions, endpoint paths, signing headers, request shape and the response envelope.

use crate::error::{Result, TuyaError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const HEADER_CLIENT_ID: &str = "client_id";
pub const HEADER_T: &str = "t";
pub const HEADER_SIGN: &str = "sign";
pub const HEADER_SIGN_METHOD: &str = "sign_method";
pub const HEADER_ACCESS_TOKEN: &str = "access_token";

pub const TOKEN_PATH: &str = "/v1.0/token";
pub const GRANT_TYPE_KEY: &str = "grant_type";
/// Simple mode grant (project credentials only).
pub const GRANT_TYPE_SIMPLE: &str = "1";

define_regions! {
    Us = ("us", "Americas", "https://openapi.tuyaus.com"),
    Eu = ("eu", "Europe", "https://openapi.tuyaeu.com"),
    Cn = ("cn", "China", "https://openapi.tuyacn.com"),
    In = ("in", "India", "https://openapi.tuyain.com"),
}

impl Default for Region {
    fn default() -> Self {
        Region::Eu
    }
}

pub fn device_path(device_id: &str) -> String {
    format!("/v1.0/devices/{}", device_id)
}

pub fn history_path(device_id: &str) -> String {
    format!("/v1.0/scales/{}/datas/history", device_id)
}

pub fn analysis_path(device_id: &str) -> String {
    format!("/v1.0/scales/{}/analysis-reports", device_id)
}

/// HTTP methods used by the scale endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// Query parameters kept sorted by key.
///
/// Values are stored exactly as they will be signed and sent; no
/// percent-encoding is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn insert<K: Into<String>, V: ToString>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `k=v` pairs joined by `&`, ascending by key.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A request before signing: method, path, sorted query and exact body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    /// Body bytes as transmitted; the body hash is computed over these.
    pub body: Option<Vec<u8>>,
}

impl SignedRequest {
    pub fn get<P: Into<String>>(path: P) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
        }
    }

    /// Build a POST whose body is the compact JSON encoding of `body`.
    pub fn post_json<P: Into<String>, B: Serialize>(path: P, body: &B) -> Result<Self> {
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            query: QueryParams::new(),
            body: Some(serde_json::to_vec(body)?),
        })
    }

    pub fn query<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.query.insert(key, value);
        self
    }

    /// Path plus key-sorted query string, or the bare path without parameters.
    pub fn canonical_path(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query.to_query_string())
        }
    }
}

/// Tuya response wrapper: `{success, code, msg, result, t}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub t: Option<u64>,
}

/// Decode a response body into the typed `result` payload.
///
/// Fails on invalid JSON, on `success: false`, and when `result` is absent or
/// null. Every endpoint wrapper goes through this single step.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    if envelope.success == Some(false) {
        let code = envelope.code.unwrap_or_default();
        let msg = envelope
            .msg
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| cloud_error_message(code).to_string());
        return Err(TuyaError::Api { code, msg });
    }

    match envelope.result {
        None | Some(Value::Null) => Err(TuyaError::MissingResult),
        Some(result) => Ok(serde_json::from_value(result)?),
    }
}

/// Messages for commonly seen Tuya cloud error codes.
pub fn cloud_error_message(code: i64) -> &'static str {
    match code {
        500 => "system error",
        1001 => "secret invalid",
        1002 => "access_token is null",
        1004 => "sign invalid",
        1010 => "token invalid",
        1013 => "request time is invalid",
        1106 => "permission deny",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_is_sorted_regardless_of_insertion_order() {
        let mut params = QueryParams::new();
        params.insert("b", 2);
        params.insert("a", 1);
        assert_eq!(params.to_query_string(), "a=1&b=2");

        let reversed: QueryParams = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(reversed, params);
    }

    #[test]
    fn canonical_path_without_query_is_the_path() {
        let request = SignedRequest::get("/v1.0/devices/abc");
        assert_eq!(request.canonical_path(), "/v1.0/devices/abc");
    }

    #[test]
    fn canonical_path_keeps_values_verbatim() {
        let request = SignedRequest::get(history_path("dev1"))
            .query("start_time", 1700000000001i64)
            .query("page_size", 10)
            .query("page_no", 1);
        assert_eq!(
            request.canonical_path(),
            "/v1.0/scales/dev1/datas/history?page_no=1&page_size=10&start_time=1700000000001"
        );
    }

    #[test]
    fn post_body_is_compact_and_ordered_as_built() {
        #[derive(Serialize)]
        struct Body {
            z: u8,
            a: &'static str,
        }
        let request = SignedRequest::post_json("/x", &Body { z: 1, a: "b" }).unwrap();
        assert_eq!(request.body.as_deref(), Some(&br#"{"z":1,"a":"b"}"#[..]));
        assert_eq!(request.method, Method::Post);
    }

    #[test]
    fn regions_parse_case_insensitively() {
        assert_eq!("EU".parse::<Region>().unwrap(), Region::Eu);
        assert_eq!(" in ".parse::<Region>().unwrap(), Region::In);
        assert_eq!(Region::Us.endpoint(), "https://openapi.tuyaus.com");
        assert_eq!(Region::Cn.to_string(), "cn");
        assert!(matches!(
            "mars".parse::<Region>(),
            Err(TuyaError::UnknownRegion(code)) if code == "mars"
        ));
        assert_eq!(Region::ALL.len(), 4);
    }

    #[test]
    fn envelope_failure_surfaces_cloud_code() {
        let body = json!({"success": false, "code": 1004, "msg": "sign invalid"}).to_string();
        let err = decode_envelope::<Value>(body.as_bytes()).unwrap_err();
        assert!(matches!(err, TuyaError::Api { code: 1004, ref msg } if msg == "sign invalid"));

        let body = json!({"success": false, "code": 1010}).to_string();
        let err = decode_envelope::<Value>(body.as_bytes()).unwrap_err();
        assert!(matches!(err, TuyaError::Api { code: 1010, ref msg } if msg == "token invalid"));
    }

    #[test]
    fn envelope_without_result_is_rejected() {
        let err = decode_envelope::<Value>(br#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, TuyaError::MissingResult));

        let err = decode_envelope::<Value>(br#"{"result":null}"#).unwrap_err();
        assert!(matches!(err, TuyaError::MissingResult));

        let err = decode_envelope::<Value>(b"<html>").unwrap_err();
        assert!(matches!(err, TuyaError::Json(_)));
    }

    #[test]
    fn envelope_result_decodes_into_type() {
        #[derive(Deserialize)]
        struct Payload {
            value: u32,
        }
        let payload: Payload = decode_envelope(br#"{"success":true,"result":{"value":7}}"#).unwrap();
        assert_eq!(payload.value, 7);
    }
}
