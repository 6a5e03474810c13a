use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the analysis service client.
///
/// None of these reach the rendering layer; the orchestrator logs them and
/// reports a fixed failure message instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status. `message` carries the
    /// service's `{"error": ...}` text when the body had one.
    #[error(
        "unexpected HTTP status {status} from {url}{}",
        message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
    )]
    UnexpectedStatus {
        status: u16,
        url: String,
        message: Option<String>,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no output file to download")]
    MissingOutputFile,
}
