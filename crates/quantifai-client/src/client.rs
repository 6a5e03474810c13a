//! HTTP client for the analysis service.
//!
//! Wraps `reqwest` with the service's two endpoints: `POST /analyze`
//! (multipart upload, JSON answer) and `GET /download/{output_file}`.

use std::path::Path;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quantifai_core::AppConfig;
use reqwest::{Client, Url};
use serde_json::{Map, Value};

use crate::error::AnalysisError;
use crate::request::AnalysisRequest;

const ANALYZE_PATH: &str = "analyze";
const DOWNLOAD_PATH: &str = "download/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Characters left unescaped in a download identifier. Same set as
/// JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Client for the analysis service.
///
/// Use [`AnalysisClient::new`] with the loaded [`AppConfig`], or
/// [`AnalysisClient::with_base_url`] to point at a mock server in tests.
pub struct AnalysisClient {
    client: Client,
    base_url: Url,
}

impl AnalysisClient {
    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AnalysisError::InvalidBaseUrl`] if the
    /// configured service URL does not parse.
    pub fn new(config: &AppConfig) -> Result<Self, AnalysisError> {
        Self::build(
            &config.service_url,
            config.request_timeout_secs,
            config.connect_timeout_secs,
            &config.user_agent,
        )
    }

    /// Creates a client with a custom base URL (for testing with wiremock)
    /// and the default connect timeout.
    ///
    /// # Errors
    ///
    /// Same as [`AnalysisClient::new`].
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, AnalysisError> {
        Self::build(
            base_url,
            timeout_secs,
            DEFAULT_CONNECT_TIMEOUT_SECS,
            user_agent,
        )
    }

    fn build(
        base_url: &str,
        timeout_secs: u64,
        connect_timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: normalise_base_url(base_url)?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Uploads the request and returns the JSON object the service answered
    /// with. The call is made once; there is no retry.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::Http`] on network failure.
    /// - [`AnalysisError::UnexpectedStatus`] on a non-2xx status.
    /// - [`AnalysisError::Deserialize`] if the body is not a JSON object.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Map<String, Value>, AnalysisError> {
        let url = self.endpoint(ANALYZE_PATH)?;
        let form = request.to_form()?;

        let response = self.client.post(url.clone()).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            // The service reports failures as {"error": "..."}; keep it for the log.
            let message = response
                .text()
                .await
                .ok()
                .and_then(|body| serde_json::from_str::<Value>(&body).ok())
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned));
            return Err(AnalysisError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<Map<String, Value>>(&body).map_err(|e| {
            AnalysisError::Deserialize {
                context: format!("analyze response from {url}"),
                source: e,
            }
        })
    }

    /// Builds the download link for a result file.
    ///
    /// Returns `None` when there is no identifier (or an empty one), so the
    /// caller can disable the download instead of following a broken link.
    #[must_use]
    pub fn download_url(&self, output_file: Option<&str>) -> Option<Url> {
        // A bare "." or ".." would be folded away as a dot-segment, escaped or not.
        let output_file = output_file.filter(|f| !matches!(*f, "" | "." | ".."))?;
        let escaped = utf8_percent_encode(output_file, COMPONENT);
        self.base_url
            .join(&format!("{DOWNLOAD_PATH}{escaped}"))
            .map_err(|e| {
                tracing::warn!(output_file, error = %e, "download_url: could not build link");
            })
            .ok()
    }

    /// Fetches a result file and writes it to `dest`. Returns the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::MissingOutputFile`] if `output_file` is empty.
    /// - [`AnalysisError::Http`] on network failure.
    /// - [`AnalysisError::UnexpectedStatus`] on a non-2xx status.
    /// - [`AnalysisError::Io`] if `dest` cannot be written.
    pub async fn download(&self, output_file: &str, dest: &Path) -> Result<usize, AnalysisError> {
        let url = self
            .download_url(Some(output_file))
            .ok_or(AnalysisError::MissingOutputFile)?;

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                message: None,
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| AnalysisError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        tracing::info!(url = %url, dest = %dest.display(), bytes = bytes.len(), "result file downloaded");
        Ok(bytes.len())
    }

    fn endpoint(&self, path: &str) -> Result<Url, AnalysisError> {
        self.base_url
            .join(path)
            .map_err(|e| AnalysisError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Ensures the base URL ends with exactly one slash so that relative joins
/// append to its path rather than replacing the last segment.
fn normalise_base_url(base_url: &str) -> Result<Url, AnalysisError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| AnalysisError::InvalidBaseUrl {
        base_url: base_url.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
