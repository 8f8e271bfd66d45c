//! Client for the remote stage catalog API.

use crate::error::SyncError;
use crate::types::{StagesSnapshot, SyncConfig, Testcase};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Everything except RFC 3986 unreserved characters gets escaped, `/` included.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a value for use in a query parameter or path segment.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

#[derive(Deserialize)]
struct TestcasesResponse {
    testcases: Vec<Testcase>,
}

#[derive(Deserialize)]
struct FileContentResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Read-only client for the three catalog endpoints.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Builds a client with the configured request timeout.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn stages_url(&self) -> String {
        format!("{}/stages", self.base_url)
    }

    pub fn testcases_url(&self, stage_name: &str) -> String {
        format!(
            "{}/stages/{}/testcases",
            self.base_url,
            encode_component(stage_name)
        )
    }

    pub fn file_content_url(&self, stage_name: &str, remote_file_path: &str) -> String {
        format!(
            "{}/file-content?stageName={}&filePath={}",
            self.base_url,
            encode_component(stage_name),
            encode_component(remote_file_path)
        )
    }

    /// Fetches the current stage listing.
    ///
    /// A non-success status here means there is no catalog to work from and
    /// is reported as `CatalogUnavailable`.
    pub async fn list_stages(&self) -> Result<StagesSnapshot, SyncError> {
        let url = self.stages_url();
        self.get_json(&url).await.map_err(|e| match e {
            SyncError::HttpError { url, status } => SyncError::CatalogUnavailable { url, status },
            other => other,
        })
    }

    /// Fetches the testcases of one stage.
    pub async fn list_testcases(&self, stage_name: &str) -> Result<Vec<Testcase>, SyncError> {
        let url = self.testcases_url(stage_name);
        let response: TestcasesResponse = self.get_json(&url).await?;
        Ok(response.testcases)
    }

    /// Fetches the full text of one remote file.
    pub async fn fetch_file_content(
        &self,
        stage_name: &str,
        remote_file_path: &str,
    ) -> Result<String, SyncError> {
        let url = self.file_content_url(stage_name, remote_file_path);
        let response: FileContentResponse = self.get_json(&url).await?;
        response
            .content
            .ok_or(SyncError::ContentFieldMissing { url })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SyncError> {
        debug!("GET {}", url);
        let network = |source: reqwest::Error| SyncError::NetworkError {
            url: url.to_string(),
            source,
        };

        let response = self.http.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpError {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(network)?;
        serde_json::from_str(&body).map_err(|e| SyncError::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
