//! Blocking wrapper around [`crate::client::CloudClient`].
//!
//! Every call is driven on the shared runtime from [`crate::runtime`], so
//! these methods must not be used from within an async context.

use crate::client::{CloudClient as AsyncClient, CloudClientBuilder};
use crate::error::Result;
use crate::model::{
    AnalysisReport, AnalysisRequest, DeviceInfo, HistoryPage, LatestMeasurement, RecordQuery,
    ScaleRecord, ScaleUser,
};
use crate::profile::UserProfile;
use crate::runtime;
use std::collections::HashMap;

#[derive(Clone)]
pub struct CloudClient {
    inner: AsyncClient,
}

impl CloudClient {
    pub fn new(inner: AsyncClient) -> Self {
        Self { inner }
    }

    pub fn from_builder(builder: CloudClientBuilder) -> Result<Self> {
        Ok(Self::new(builder.build()?))
    }

    /// The underlying async client.
    pub fn as_async(&self) -> &AsyncClient {
        &self.inner
    }

    pub fn get_access_token(&self) -> Result<String> {
        runtime::block_on(self.inner.get_access_token())?
    }

    pub fn invalidate_token(&self) -> Result<()> {
        runtime::block_on(self.inner.invalidate_token())
    }

    pub fn validate_credentials(&self) -> Result<bool> {
        runtime::block_on(self.inner.validate_credentials())
    }

    pub fn get_device_info(&self, device_id: &str) -> Result<DeviceInfo> {
        runtime::block_on(self.inner.get_device_info(device_id))?
    }

    pub fn fetch_page(&self, device_id: &str, query: &RecordQuery) -> Result<HistoryPage> {
        runtime::block_on(self.inner.fetch_page(device_id, query))?
    }

    pub fn fetch_records(&self, device_id: &str, query: &RecordQuery) -> Result<Vec<ScaleRecord>> {
        runtime::block_on(self.inner.fetch_records(device_id, query))?
    }

    pub fn fetch_all_records(
        &self,
        device_id: &str,
        page_size: u32,
        start_time: Option<i64>,
    ) -> Result<Vec<ScaleRecord>> {
        runtime::block_on(self.inner.fetch_all_records(device_id, page_size, start_time))
    }

    pub fn discover_users(&self, device_id: &str) -> Result<Vec<ScaleUser>> {
        runtime::block_on(self.inner.discover_users(device_id))?
    }

    pub fn get_analysis_report(
        &self,
        device_id: &str,
        input: &AnalysisRequest,
    ) -> Result<AnalysisReport> {
        runtime::block_on(self.inner.get_analysis_report(device_id, input))?
    }

    pub fn enrich_records(
        &self,
        device_id: &str,
        records: &mut [ScaleRecord],
        profile: &UserProfile,
    ) -> Result<usize> {
        runtime::block_on(self.inner.enrich_records(device_id, records, profile))
    }

    pub fn get_latest_data(
        &self,
        device_id: &str,
        profile: &UserProfile,
    ) -> Result<HashMap<String, LatestMeasurement>> {
        runtime::block_on(self.inner.get_latest_data(device_id, profile))?
    }
}
