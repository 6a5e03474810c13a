//! End-to-end lifecycle tests: `AnalysisOrchestrator` driving a real
//! `AnalysisClient` against a wiremock server.

use quantifai_client::{
    AnalysisClient, AnalysisOrchestrator, LifecycleState, FAILURE_MESSAGE,
};
use quantifai_core::{UploadCapture, UploadFile};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(base_url: &str) -> AnalysisOrchestrator<AnalysisClient> {
    let client = AnalysisClient::with_base_url(base_url, 30, "quantifai-test/0.1")
        .expect("client construction should not fail");
    AnalysisOrchestrator::new(client)
}

fn capture_with_file() -> UploadCapture {
    let mut capture = UploadCapture::new();
    capture.select_file(Some(UploadFile::new("sales.xlsx", vec![0x50, 0x4b, 3, 4])));
    capture.set_date_range(Some("2024-01-01".into()), Some("2024-01-31".into()));
    capture.toggle_flag("holiday", true).unwrap();
    capture
}

#[tokio::test]
async fn detailed_response_ends_succeeded_with_rows_and_download_link() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stock": 12,
            "staff": 3,
            "output_file": "r1.xlsx",
            "detailed_results": [
                {"Date": "01/01/2024", "Total (kg)": 5, "Fries": 1.5},
                {"Date": "02/01/2024", "Total (kg)": 6, "Fries": 1.8}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(&server.uri());
    let capture = capture_with_file();
    orch.submit(capture.selection()).await;

    let result = orch.result().expect("should have succeeded");
    assert_eq!(result.summary.stock, Some(12.0));
    assert_eq!(result.summary.staff, Some(3.0));
    assert_eq!(result.detail.len(), 2);
    assert_eq!(result.detail[1].total(), Some(6.0));

    let link = orch
        .service()
        .download_url(result.summary.output_file.as_deref())
        .expect("download should be available");
    assert_eq!(link.as_str(), format!("{}/download/r1.xlsx", server.uri()));
}

#[tokio::test]
async fn response_without_output_file_disables_download() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stock": 0, "staff": 1})))
        .mount(&server)
        .await;

    let orch = orchestrator(&server.uri());
    orch.submit(capture_with_file().selection()).await;

    let result = orch.result().expect("should have succeeded");
    assert_eq!(result.summary.stock, Some(0.0));
    assert!(!result.summary.download_available());
    assert!(orch
        .service()
        .download_url(result.summary.output_file.as_deref())
        .is_none());
}

#[tokio::test]
async fn service_error_ends_failed_with_fixed_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "KeyError: 'Date'"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(&server.uri());
    orch.submit(capture_with_file().selection()).await;

    assert_eq!(
        orch.state(),
        LifecycleState::Failed(FAILURE_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn unreachable_service_ends_failed() {
    // Bind an ephemeral port, then release it so nothing is listening there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let orch = orchestrator(&format!("http://{addr}"));
    orch.submit(capture_with_file().selection()).await;

    assert_eq!(orch.state().failure_message(), Some(FAILURE_MESSAGE));
}

#[tokio::test]
async fn submit_without_file_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let orch = orchestrator(&server.uri());
    let mut capture = UploadCapture::new();
    capture.toggle_flag("promo", true).unwrap();
    orch.submit(capture.selection()).await;

    assert_eq!(orch.state(), LifecycleState::Idle);
}
