//! # tuya-scale
//!
//! Asynchronous Tuya Open API v2.0 client for smart scales: signed requests,
//! token caching, measurement history and body-composition reports.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tuya_scale::{CloudClient, Region, UserProfile};
//!
//! # async fn run() -> tuya_scale::error::Result<()> {
//! let client = CloudClient::builder("ACCESS_ID", "ACCESS_SECRET")
//!     .region(Region::Eu)
//!     .build()?;
//! let latest = client.get_latest_data("DEVICE_ID", &UserProfile::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
#[macro_use]
pub mod macros;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod model;
pub mod profile;
pub mod protocol;
pub mod runtime;
pub mod store;
pub mod sync;
pub mod token;

pub use client::{CloudClient, CloudClientBuilder};
pub use error::TuyaError;
pub use model::{
    AnalysisReport, AnalysisRequest, DeviceInfo, LatestMeasurement, RecordQuery, ScaleRecord,
    ScaleUser,
};
pub use profile::{Sex, UserProfile};
pub use protocol::Region;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
