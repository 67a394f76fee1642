//! Error types and result definitions for the tuya-scale crate.
//! Includes TinyTuya-style error codes and conversion from HTTP/IO/JSON errors.

use thiserror::Error;

/// Represents all possible errors that can occur when talking to the Tuya cloud.
#[derive(Error, Debug, Clone)]
pub enum TuyaError {
    /// Standard IO error (files, runtime startup)
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// Transport-level HTTP failure (DNS, TLS, connection reset, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out
    #[error("Timeout waiting for Tuya cloud")]
    Timeout,

    /// The server answered with something other than 200 OK
    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response envelope reported `success: false`
    #[error("Tuya cloud error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// The response envelope had no `result` object
    #[error("Response is missing 'result'")]
    MissingResult,

    /// Access token could not be obtained
    #[error("Authentication failed: {0}")]
    Auth(Box<TuyaError>),

    /// Analysis report could not be obtained for a record
    #[error("Analysis report failed: {0}")]
    Analysis(Box<TuyaError>),

    /// HMAC key could not be initialized
    #[error("Request signing failed")]
    SigningFailed,

    /// Region code is not one of the known data centers
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for Tuya cloud operations.
pub type Result<T> = std::result::Result<T, TuyaError>;

impl From<std::io::Error> for TuyaError {
    fn from(err: std::io::Error) -> Self {
        TuyaError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TuyaError {
    fn from(err: serde_json::Error) -> Self {
        TuyaError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for TuyaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TuyaError::Timeout
        } else {
            TuyaError::Http(err.to_string())
        }
    }
}

impl TuyaError {
    pub fn code(&self) -> u32 {
        match self {
            TuyaError::Io(_) => ERR_CONNECT,
            TuyaError::Json(_) => ERR_CLOUDRESP,
            TuyaError::Http(_) => ERR_CONNECT,
            TuyaError::Timeout => ERR_TIMEOUT,
            TuyaError::Status { .. } => ERR_CLOUD,
            TuyaError::Api { .. } => ERR_CLOUD,
            TuyaError::MissingResult => ERR_CLOUDRESP,
            TuyaError::Auth(_) => ERR_CLOUDTOKEN,
            TuyaError::Analysis(_) => ERR_CLOUD,
            TuyaError::SigningFailed => ERR_CLOUDKEY,
            TuyaError::UnknownRegion(_) => ERR_PARAMS,
            TuyaError::Config(_) => ERR_PARAMS,
        }
    }

    /// Returns true when the error came from acquiring the access token.
    pub fn is_auth(&self) -> bool {
        matches!(self, TuyaError::Auth(_))
    }
}

// Error response codes
define_error_codes! {
    ERR_SUCCESS = 0 => "Connection Successful",
    ERR_CONNECT = 901 => "Network Error: Unable to Connect",
    ERR_TIMEOUT = 902 => "Timeout Waiting for Device",
    ERR_CLOUDKEY = 909 => "Missing Tuya Cloud Key and Secret",
    ERR_CLOUDRESP = 910 => "Invalid JSON Response from Cloud",
    ERR_CLOUDTOKEN = 911 => "Unable to Get Cloud Token",
    ERR_PARAMS = 912 => "Missing Function Parameters",
    ERR_CLOUD = 913 => "Error Response from Tuya Cloud",
}
