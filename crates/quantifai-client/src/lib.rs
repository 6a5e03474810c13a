pub mod client;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod request;
pub mod types;

pub use client::AnalysisClient;
pub use error::AnalysisError;
pub use normalize::normalize_response;
pub use orchestrator::{AnalysisOrchestrator, AnalysisService, Submission, FAILURE_MESSAGE};
pub use request::AnalysisRequest;
pub use reqwest::Url;
pub use types::{AnalysisResult, AnalysisSummary, DetailRow, LifecycleState};
