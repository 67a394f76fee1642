//! Signed client for the Tuya cloud scale endpoints.
//! Handles request signing, token caching, history paging and analysis reports.

use crate::crypto::{RequestSigner, SIGN_METHOD};
use crate::error::{Result, TuyaError};
use crate::model::{
    self, AnalysisReport, AnalysisRequest, DeviceInfo, HistoryPage, LatestMeasurement,
    RecordQuery, ScaleRecord, ScaleUser,
};
use crate::profile::UserProfile;
use crate::protocol::{
    self, GRANT_TYPE_KEY, GRANT_TYPE_SIMPLE, HEADER_ACCESS_TOKEN, HEADER_CLIENT_ID, HEADER_SIGN,
    HEADER_SIGN_METHOD, HEADER_T, Region, SignedRequest,
};
use crate::token::{AccessToken, Clock, SystemClock, TokenGrant, TokenState};
use log::{debug, error, info, warn};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Records scanned when inferring the users of a scale.
const USER_DISCOVERY_PAGE_SIZE: u32 = 100;
/// Records fetched per user when looking for the latest measurement.
const LATEST_RECORDS_PER_USER: u32 = 10;

/// Builder for [`CloudClient`].
pub struct CloudClientBuilder {
    access_id: String,
    access_secret: String,
    region: Region,
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    clock: Option<Arc<dyn Clock>>,
}

impl CloudClientBuilder {
    pub fn new<I, S>(access_id: I, access_secret: S) -> Self
    where
        I: Into<String>,
        S: Into<String>,
    {
        Self {
            access_id: access_id.into(),
            access_secret: access_secret.into(),
            region: Region::default(),
            base_url: None,
            timeout: None,
            connect_timeout: None,
            clock: None,
        }
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Override the region endpoint, e.g. for a proxy or a mock server.
    pub fn base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Total time allowed for a single request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Time source for request timestamps and token expiry.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<CloudClient> {
        if self.access_id.trim().is_empty() || self.access_secret.trim().is_empty() {
            return Err(TuyaError::Config(
                "access id and access secret must not be empty".into(),
            ));
        }

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            http = http.connect_timeout(timeout);
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| self.region.endpoint().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(CloudClient {
            inner: Arc::new(ClientInner {
                http: http.build()?,
                base_url,
                signer: RequestSigner::new(self.access_id, self.access_secret),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                token: Mutex::new(TokenState::Unauthenticated),
            }),
        })
    }
}

/// Tuya Open API client for smart scale data.
///
/// Cloning is cheap; clones share the HTTP client and the token cache.
#[derive(Clone)]
pub struct CloudClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
    clock: Arc<dyn Clock>,
    token: Mutex<TokenState>,
}

impl CloudClient {
    pub fn builder<I, S>(access_id: I, access_secret: S) -> CloudClientBuilder
    where
        I: Into<String>,
        S: Into<String>,
    {
        CloudClientBuilder::new(access_id, access_secret)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn access_id(&self) -> &str {
        self.inner.signer.access_id()
    }
}

// -------------------------------------------------------------------------
// Token lifecycle
// -------------------------------------------------------------------------
impl CloudClient {
    /// Returns a valid access token, requesting a new one only when the cached
    /// token is missing or within a minute of expiry.
    pub async fn get_access_token(&self) -> Result<String> {
        let mut state = self.inner.token.lock().await;
        if let Some(token) = state.usable_at(self.inner.clock.now_millis()) {
            return Ok(token.as_str().to_string());
        }
        *state = TokenState::Unauthenticated;

        let request = SignedRequest::get(protocol::TOKEN_PATH).query(GRANT_TYPE_KEY, GRANT_TYPE_SIMPLE);
        debug!("Requesting access token for client {}", self.access_id());

        let grant: TokenGrant = self.call(&request, None).await.map_err(|e| {
            error!("Failed to get access token: {}", e);
            TuyaError::Auth(Box::new(e))
        })?;
        let lifetime = grant.expire_time;
        let token = AccessToken::from_grant(grant, self.inner.clock.now_millis());
        info!("Acquired access token (valid for {}s)", lifetime);

        let value = token.as_str().to_string();
        *state = TokenState::Authenticated(token);
        Ok(value)
    }

    /// Forget the cached token so the next call requests a fresh one.
    pub async fn invalidate_token(&self) {
        *self.inner.token.lock().await = TokenState::Unauthenticated;
    }

    /// Probe whether the configured credentials can obtain a token.
    pub async fn validate_credentials(&self) -> bool {
        match self.get_access_token().await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to validate credentials: {}", e);
                false
            }
        }
    }
}

// -------------------------------------------------------------------------
// Endpoints
// -------------------------------------------------------------------------
impl CloudClient {
    /// Device metadata. Missing data is an error.
    pub async fn get_device_info(&self, device_id: &str) -> Result<DeviceInfo> {
        let token = self.get_access_token().await?;
        let request = SignedRequest::get(protocol::device_path(device_id));
        self.call(&request, Some(&token)).await
    }

    /// One page of measurement history, with the server-reported totals.
    ///
    /// Unlike [`fetch_records`](Self::fetch_records), failures are returned as
    /// errors.
    pub async fn fetch_page(&self, device_id: &str, query: &RecordQuery) -> Result<HistoryPage> {
        let token = self.get_access_token().await?;
        let mut request = SignedRequest::get(protocol::history_path(device_id))
            .query("page_no", query.page_no)
            .query("page_size", query.page_size);
        if let Some(start_time) = query.start_time {
            request = request.query("start_time", start_time);
        }
        self.call(&request, Some(&token)).await
    }

    /// One page of records, optionally filtered by user.
    ///
    /// A failed or malformed page yields an empty list. Only a failure to
    /// obtain the access token is returned as an error.
    pub async fn fetch_records(
        &self,
        device_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<ScaleRecord>> {
        let mut records = match self.fetch_page(device_id, query).await {
            Ok(page) => page.records,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                error!("Failed to get scale records for {}: {}", device_id, e);
                return Ok(Vec::new());
            }
        };

        if let Some(user_id) = &query.user_id {
            records.retain(|r| r.user_id.as_deref() == Some(user_id.as_str()));
        }
        Ok(records)
    }

    /// Walk history pages from the first one and return everything collected.
    ///
    /// Stops on a short page, when the reported total is reached, or at the
    /// first error; what was accumulated before an error is still returned.
    pub async fn fetch_all_records(
        &self,
        device_id: &str,
        page_size: u32,
        start_time: Option<i64>,
    ) -> Vec<ScaleRecord> {
        let page_size = page_size.max(1);
        let mut all = Vec::new();
        let mut page_no = 1;

        match start_time {
            Some(t) => info!("Starting data retrieval for {} from {}", device_id, t),
            None => info!("Starting data retrieval for {} from the beginning", device_id),
        }

        loop {
            let query = RecordQuery {
                page_size,
                page_no,
                start_time,
                user_id: None,
            };
            let page = match self.fetch_page(device_id, &query).await {
                Ok(page) => page,
                Err(e) => {
                    error!("Error retrieving page {}: {}", page_no, e);
                    break;
                }
            };

            let count = page.records.len();
            all.extend(page.records);
            let total = page.total.unwrap_or(all.len() as u64);
            info!(
                "Retrieved {} records from page {}, {} of {}",
                count,
                page_no,
                all.len(),
                total
            );

            if count < page_size as usize
                || all.len() as u64 >= total
                || page.has_more == Some(false)
            {
                break;
            }
            page_no += 1;
        }

        info!("Total records retrieved: {}", all.len());
        all
    }

    /// Users of the scale, inferred from recent records.
    pub async fn discover_users(&self, device_id: &str) -> Result<Vec<ScaleUser>> {
        let query = RecordQuery::new().page_size(USER_DISCOVERY_PAGE_SIZE);
        let records = self.fetch_records(device_id, &query).await?;
        let users = model::discover_users(&records);
        if users.is_empty() {
            warn!("No users found in recent measurement records of {}", device_id);
        } else {
            debug!("Discovered users from records: {:?}", users);
        }
        Ok(users)
    }

    /// Request a body-composition report.
    pub async fn get_analysis_report(
        &self,
        device_id: &str,
        input: &AnalysisRequest,
    ) -> Result<AnalysisReport> {
        let token = self.get_access_token().await?;
        let request = SignedRequest::post_json(protocol::analysis_path(device_id), input)?;
        debug!(
            "Requesting analysis report for {}: height={}, weight={}, resistance={}",
            device_id, input.height, input.weight, input.resistance
        );
        self.call(&request, Some(&token))
            .await
            .map_err(|e| TuyaError::Analysis(Box::new(e)))
    }

    /// Attach an analysis report to `record` when its data allows one.
    ///
    /// Returns whether a report was attached; failures are logged only.
    pub async fn enrich_record(
        &self,
        device_id: &str,
        record: &mut ScaleRecord,
        profile: &UserProfile,
    ) -> bool {
        let Some(input) = record.analysis_request(profile) else {
            debug!(
                "Skipping analysis for record {} - insufficient data: height={:?}, weight={:?}, resistance={:?}",
                record.id, record.height, record.weight, record.resistance
            );
            return false;
        };

        match self.get_analysis_report(device_id, &input).await {
            Ok(report) => {
                record.analysis_report = Some(report);
                debug!("Added analysis report for record {}", record.id);
                true
            }
            Err(e) => {
                warn!("Could not fetch analysis report for record {}: {}", record.id, e);
                false
            }
        }
    }

    /// Enrich every record that has no report yet; returns how many were enriched.
    pub async fn enrich_records(
        &self,
        device_id: &str,
        records: &mut [ScaleRecord],
        profile: &UserProfile,
    ) -> usize {
        let mut enriched = 0;
        for record in records.iter_mut().filter(|r| r.analysis_report.is_none()) {
            if self.enrich_record(device_id, record, profile).await {
                enriched += 1;
            }
        }
        info!("Enriched {} records with analysis reports", enriched);
        enriched
    }

    /// Latest measurement of every user of the scale, keyed by user id.
    ///
    /// The report is computed from the newest record with a usable resistance
    /// reading and attached to the newest record overall. Users whose data
    /// cannot be fetched are skipped.
    pub async fn get_latest_data(
        &self,
        device_id: &str,
        profile: &UserProfile,
    ) -> Result<HashMap<String, LatestMeasurement>> {
        let users = self.discover_users(device_id).await?;
        let mut latest = HashMap::new();

        for user in users {
            let query = RecordQuery::new()
                .page_size(LATEST_RECORDS_PER_USER)
                .user(user.user_id.clone());
            let records = self.fetch_records(device_id, &query).await?;
            let Some(newest) = records.first() else {
                warn!("No records found for user {}", user.user_id);
                continue;
            };

            let source = records
                .iter()
                .find(|r| r.has_valid_resistance())
                .unwrap_or(newest);
            let mut record = newest.clone();

            match source.analysis_request(profile) {
                Some(input) => match self.get_analysis_report(device_id, &input).await {
                    Ok(report) => {
                        debug!(
                            "Added analysis report for user {} using resistance {}",
                            user.user_id, input.resistance
                        );
                        record.analysis_report = Some(report);
                    }
                    Err(e) => warn!("Could not fetch analysis report for user {}: {}", user.user_id, e),
                },
                None => debug!(
                    "Skipping analysis report for user {} - insufficient data",
                    user.user_id
                ),
            }

            latest.insert(
                user.user_id.clone(),
                LatestMeasurement {
                    user_id: user.user_id,
                    nickname: user.nickname,
                    record,
                },
            );
        }

        Ok(latest)
    }
}

// -------------------------------------------------------------------------
// Transport
// -------------------------------------------------------------------------
impl CloudClient {
    /// Sign and send a request; returns the status code and raw body.
    async fn send(&self, request: &SignedRequest, access_token: Option<&str>) -> Result<(u16, Vec<u8>)> {
        let signature = self
            .inner
            .signer
            .sign(request, access_token, self.inner.clock.now_millis())?;
        let url = format!("{}{}", self.inner.base_url, signature.canonical_path);

        let mut builder = self
            .inner
            .http
            .request(request.method.into(), &url)
            .header(HEADER_CLIENT_ID, self.access_id())
            .header(HEADER_T, &signature.timestamp)
            .header(HEADER_SIGN, &signature.sign)
            .header(HEADER_SIGN_METHOD, SIGN_METHOD);
        if let Some(token) = access_token {
            builder = builder.header(HEADER_ACCESS_TOKEN, token);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        debug!("{} {}", request.method, url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());
        Ok((status, body))
    }

    /// Send, require HTTP 200, and decode the envelope's `result`.
    async fn call<T: DeserializeOwned>(
        &self,
        request: &SignedRequest,
        access_token: Option<&str>,
    ) -> Result<T> {
        let (status, body) = self.send(request, access_token).await?;
        if status != 200 {
            return Err(TuyaError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        protocol::decode_envelope(&body)
    }
}
