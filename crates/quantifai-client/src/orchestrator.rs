//! Analysis request lifecycle.
//!
//! [`AnalysisOrchestrator`] owns the [`LifecycleState`] and is the only thing
//! that changes it. A submission moves the state to `Submitting` before the
//! call goes out and to `Succeeded`/`Failed` exactly once when it settles,
//! or to `Failed` if the latest submission is dropped before settling.
//! Renderers read the state through [`AnalysisOrchestrator::state`] or follow
//! it with [`AnalysisOrchestrator::subscribe`].
//!
//! Overlapping submissions are not serialized: whichever call settles last
//! decides the final state, regardless of the order they were issued in.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use quantifai_core::UploadSelection;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::client::AnalysisClient;
use crate::error::AnalysisError;
use crate::normalize::normalize_response;
use crate::request::AnalysisRequest;
use crate::types::{AnalysisResult, LifecycleState};

/// Shown to the user for any failed submission. The underlying error is
/// logged, never displayed.
pub const FAILURE_MESSAGE: &str = "An error occurred during the analysis.";

/// The remote side of a submission.
pub trait AnalysisService {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<Map<String, Value>, AnalysisError>> + Send;
}

impl AnalysisService for AnalysisClient {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<Map<String, Value>, AnalysisError>> + Send {
        AnalysisClient::analyze(self, request)
    }
}

pub struct AnalysisOrchestrator<S> {
    service: S,
    state: watch::Sender<LifecycleState>,
    last_submission: AtomicU64,
}

impl<S: AnalysisService> AnalysisOrchestrator<S> {
    #[must_use]
    pub fn new(service: S) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            service,
            state,
            last_submission: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    /// The current result, if the last settled submission succeeded.
    #[must_use]
    pub fn result(&self) -> Option<AnalysisResult> {
        self.state.borrow().result().cloned()
    }

    /// Receiver that observes every state transition from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Submits `selection` and waits for the call to settle.
    ///
    /// A selection without a file is ignored: no request, no transition.
    pub async fn submit(&self, selection: &UploadSelection) {
        if let Some(submission) = self.begin(selection) {
            submission.settle().await;
        }
    }

    /// Synchronous half of [`submit`](Self::submit).
    ///
    /// Moves the state to `Submitting`, dropping any previous result or
    /// error, and returns the pending call. Returns `None` and changes
    /// nothing if the selection has no file.
    #[must_use]
    pub fn begin(&self, selection: &UploadSelection) -> Option<Submission<'_, S>> {
        let Some(request) = AnalysisRequest::from_selection(selection) else {
            tracing::debug!("submit ignored: no file selected");
            return None;
        };

        let id = self.last_submission.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.state.send_replace(LifecycleState::Submitting);
        if previous.is_submitting() {
            tracing::warn!(
                submission = id,
                "submitting while another submission is in flight; the last to settle wins"
            );
        }

        tracing::info!(
            submission = id,
            file = request.file().name(),
            bytes = request.file().len(),
            start_date = request.field("start_date").unwrap_or_default(),
            end_date = request.field("end_date").unwrap_or_default(),
            "analysis submitted"
        );

        Some(Submission {
            orchestrator: self,
            id,
            request,
            settled: false,
        })
    }
}

/// A submission that has entered `Submitting` but not yet settled.
///
/// Dropping it before [`settle`](Self::settle) completes (a timeout, a lost
/// `select!`, or never awaiting it) publishes `Failed` if it is still the
/// latest submission and the state is still `Submitting`.
pub struct Submission<'a, S> {
    orchestrator: &'a AnalysisOrchestrator<S>,
    id: u64,
    request: AnalysisRequest,
    settled: bool,
}

impl<S: AnalysisService> Submission<'_, S> {
    /// Per-orchestrator sequence number, starting at 1.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    /// Performs the call and publishes its outcome. Returns the state it
    /// published.
    pub async fn settle(mut self) -> LifecycleState {
        let outcome = self.orchestrator.service.analyze(&self.request).await;

        let next = match outcome {
            Ok(body) => {
                let result = normalize_response(&body);
                tracing::info!(
                    submission = self.id,
                    stock = ?result.summary.stock,
                    staff = ?result.summary.staff,
                    rows = result.detail.len(),
                    "analysis succeeded"
                );
                LifecycleState::Succeeded(result)
            }
            Err(err) => {
                tracing::error!(submission = self.id, error = %err, "analysis failed");
                LifecycleState::Failed(FAILURE_MESSAGE.to_string())
            }
        };

        let latest = self.orchestrator.last_submission.load(Ordering::Relaxed);
        if latest != self.id {
            tracing::debug!(
                submission = self.id,
                latest,
                "settling after a newer submission was issued"
            );
        }

        self.settled = true;
        self.orchestrator.state.send_replace(next.clone());
        next
    }
}

impl<S> Drop for Submission<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // A newer submission owns the `Submitting` state.
        if self.orchestrator.last_submission.load(Ordering::Relaxed) != self.id {
            return;
        }
        let abandoned = self.orchestrator.state.send_if_modified(|state| {
            if state.is_submitting() {
                *state = LifecycleState::Failed(FAILURE_MESSAGE.to_string());
                true
            } else {
                false
            }
        });
        if abandoned {
            tracing::warn!(
                submission = self.id,
                "submission dropped before it settled; marking it failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use quantifai_core::{Flags, UploadFile};
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;

    type Reply = Result<Map<String, Value>, AnalysisError>;

    /// Service whose replies are released by the test, keyed by file name.
    #[derive(Default)]
    struct ScriptedService {
        pending: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
        calls: Mutex<Vec<AnalysisRequest>>,
    }

    impl ScriptedService {
        fn expect(&self, file_name: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.pending
                .lock()
                .unwrap()
                .insert(file_name.to_string(), rx);
            tx
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl AnalysisService for ScriptedService {
        fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> impl Future<Output = Reply> + Send {
            self.calls.lock().unwrap().push(request.clone());
            let rx = self
                .pending
                .lock()
                .unwrap()
                .remove(request.file().name())
                .expect("no scripted reply for this file");
            async move { rx.await.expect("reply sender dropped") }
        }
    }

    /// Service whose call never completes.
    struct StalledService;

    impl AnalysisService for StalledService {
        fn analyze(
            &self,
            _request: &AnalysisRequest,
        ) -> impl Future<Output = Reply> + Send {
            std::future::pending()
        }
    }

    fn selection(file_name: &str) -> UploadSelection {
        UploadSelection {
            file: Some(UploadFile::new(file_name, b"Date,Total\n".to_vec())),
            start_date: Some("2024-01-01".to_string()),
            end_date: None,
            flags: Flags {
                weather: true,
                holiday: false,
                promo: true,
            },
        }
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn transport_error() -> AnalysisError {
        AnalysisError::UnexpectedStatus {
            status: 503,
            url: "http://localhost:5000/analyze".to_string(),
            message: None,
        }
    }

    #[tokio::test]
    async fn submit_without_file_is_a_silent_no_op() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        let mut rx = orch.subscribe();

        orch.submit(&UploadSelection::default()).await;

        assert_eq!(orch.state(), LifecycleState::Idle);
        assert_eq!(orch.service().call_count(), 0);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn begin_enters_submitting_before_the_call_settles() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        let reply = orch.service().expect("a.csv");

        let submission = orch.begin(&selection("a.csv")).expect("file present");
        assert_eq!(orch.state(), LifecycleState::Submitting);
        assert_eq!(submission.id(), 1);
        assert_eq!(submission.request().field("rain"), Some("true"));
        assert_eq!(submission.request().field("holiday"), Some("false"));

        reply
            .send(Ok(body(json!({"stock": 12, "staff": 3, "output_file": "r1.xlsx"}))))
            .unwrap();
        let settled = submission.settle().await;

        assert!(matches!(settled, LifecycleState::Succeeded(_)));
        assert_eq!(orch.state(), settled);
        let result = orch.result().unwrap();
        assert_eq!(result.summary.stock, Some(12.0));
        assert!(result.detail.is_empty());
    }

    #[tokio::test]
    async fn failure_sets_fixed_message_and_hides_cause() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        orch.service()
            .expect("a.csv")
            .send(Err(transport_error()))
            .unwrap();

        orch.submit(&selection("a.csv")).await;

        assert_eq!(
            orch.state(),
            LifecycleState::Failed(FAILURE_MESSAGE.to_string())
        );
        assert!(orch.result().is_none());
    }

    #[tokio::test]
    async fn success_after_failure_clears_the_error() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        orch.service()
            .expect("a.csv")
            .send(Err(transport_error()))
            .unwrap();
        orch.submit(&selection("a.csv")).await;
        assert!(orch.state().failure_message().is_some());

        orch.service()
            .expect("a.csv")
            .send(Ok(body(json!({"stock": 5, "staff": 1, "output_file": "r2.xlsx"}))))
            .unwrap();
        orch.submit(&selection("a.csv")).await;

        let state = orch.state();
        assert!(state.failure_message().is_none());
        assert_eq!(
            state.result().unwrap().summary.output_file.as_deref(),
            Some("r2.xlsx")
        );
    }

    #[tokio::test]
    async fn new_submission_clears_previous_result_while_in_flight() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        orch.service()
            .expect("a.csv")
            .send(Ok(body(json!({"stock": 1}))))
            .unwrap();
        orch.submit(&selection("a.csv")).await;
        assert!(orch.result().is_some());

        let _reply = orch.service().expect("b.csv");
        let _pending = orch.begin(&selection("b.csv")).unwrap();
        assert!(orch.result().is_none());
        assert_eq!(orch.state(), LifecycleState::Submitting);
    }

    #[tokio::test]
    async fn subscribers_see_submitting_then_settled_state() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        let mut rx = orch.subscribe();
        let reply = orch.service().expect("a.csv");

        let submission = orch.begin(&selection("a.csv")).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Submitting);

        reply.send(Ok(body(json!({"stock": 7})))).unwrap();
        submission.settle().await;

        assert!(rx.has_changed().unwrap());
        assert!(matches!(
            *rx.borrow_and_update(),
            LifecycleState::Succeeded(_)
        ));
    }

    #[tokio::test]
    async fn overlapping_submissions_last_to_settle_wins() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        let reply_a = orch.service().expect("a.csv");
        let reply_b = orch.service().expect("b.csv");

        let first = orch.begin(&selection("a.csv")).unwrap();
        let second = orch.begin(&selection("b.csv")).unwrap();
        assert_eq!((first.id(), second.id()), (1, 2));

        // The later submission answers first; the earlier one overtakes it.
        let release = async {
            reply_b
                .send(Ok(body(json!({"output_file": "b.xlsx"}))))
                .unwrap();
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            reply_a
                .send(Ok(body(json!({"output_file": "a.xlsx"}))))
                .unwrap();
        };
        tokio::join!(first.settle(), second.settle(), release);

        assert_eq!(orch.service().call_count(), 2);
        assert_eq!(
            orch.result().unwrap().summary.output_file.as_deref(),
            Some("a.xlsx")
        );
    }

    #[tokio::test]
    async fn overlapping_submissions_in_issue_order() {
        let orch = AnalysisOrchestrator::new(ScriptedService::default());
        let reply_a = orch.service().expect("a.csv");
        let reply_b = orch.service().expect("b.csv");

        let first = orch.begin(&selection("a.csv")).unwrap();
        let second = orch.begin(&selection("b.csv")).unwrap();

        reply_a.send(Err(transport_error())).unwrap();
        let after_first = first.settle().await;
        assert!(after_first.failure_message().is_some());

        reply_b
            .send(Ok(body(json!({"output_file": "b.xlsx"}))))
            .unwrap();
        second.settle().await;

        assert_eq!(
            orch.result().unwrap().summary.output_file.as_deref(),
            Some("b.xlsx")
        );
    }

    #[tokio::test]
    async fn timed_out_submit_does_not_stay_submitting() {
        let orch = AnalysisOrchestrator::new(StalledService);
        let mut rx = orch.subscribe();

        let outcome = tokio::time::timeout(
            Duration::from_millis(10),
            orch.submit(&selection("a.csv")),
        )
        .await;

        assert!(outcome.is_err(), "stalled call should time out");
        assert_eq!(
            orch.state(),
            LifecycleState::Failed(FAILURE_MESSAGE.to_string())
        );
        assert_eq!(
            rx.borrow_and_update().failure_message(),
            Some(FAILURE_MESSAGE)
        );
    }

    #[tokio::test]
    async fn submission_never_settled_fails_when_dropped() {
        let orch = AnalysisOrchestrator::new(StalledService);

        let submission = orch.begin(&selection("a.csv")).unwrap();
        assert_eq!(orch.state(), LifecycleState::Submitting);
        drop(submission);

        assert_eq!(orch.state().failure_message(), Some(FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn dropping_an_older_submission_leaves_the_newer_one_in_flight() {
        let orch = AnalysisOrchestrator::new(StalledService);

        let first = orch.begin(&selection("a.csv")).unwrap();
        let second = orch.begin(&selection("b.csv")).unwrap();
        drop(first);
        assert_eq!(orch.state(), LifecycleState::Submitting);

        drop(second);
        assert_eq!(orch.state().failure_message(), Some(FAILURE_MESSAGE));
    }
}
