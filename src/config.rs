//! Downloader configuration, read from the environment (and `.env` if present).

use crate::client::CloudClientBuilder;
use crate::error::{Result, TuyaError};
use crate::profile::{self, Sex, UserProfile};
use crate::protocol::Region;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATA_FILE: &str = "scale_data.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub access_id: String,
    pub access_key: String,
    pub device_id: String,
    pub region: Region,
    /// Full endpoint URL; takes precedence over `region`.
    pub api_endpoint: Option<String>,
    pub profile: UserProfile,
    /// JSON file holding the accumulated history
    pub data_file: PathBuf,
    pub debug_logs: bool,
}

impl Config {
    /// Load configuration from environment variables, after reading `.env`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| {
            get(key).ok_or_else(|| TuyaError::Config(format!("{} is not set", key)))
        };

        let region = match get("TUYA_REGION") {
            Some(code) => code.parse()?,
            None => Region::default(),
        };

        let sex = match get("SEX") {
            Some(raw) => {
                let code: u8 = raw
                    .parse()
                    .map_err(|_| TuyaError::Config(format!("SEX must be 1 or 2, got '{}'", raw)))?;
                Sex::try_from(code)?
            }
            None => Sex::default(),
        };
        let birth_date = profile::parse_birth_date(&require("BIRTHDATE")?)?;

        Ok(Self {
            access_id: require("ACCESS_ID")?,
            access_key: require("ACCESS_KEY")?,
            device_id: require("DEVICE_ID")?,
            region,
            api_endpoint: get("API_ENDPOINT"),
            profile: UserProfile {
                sex,
                ..UserProfile::default()
            }
            .with_birth_date(birth_date),
            data_file: get("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            debug_logs: get("DEBUG_LOGS").is_some_and(|v| is_truthy(&v)),
        })
    }

    /// Client builder carrying these credentials and endpoint.
    pub fn client_builder(&self) -> CloudClientBuilder {
        let builder = CloudClientBuilder::new(&self.access_id, &self.access_key).region(self.region);
        match &self.api_endpoint {
            Some(url) => builder.base_url(url),
            None => builder,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
