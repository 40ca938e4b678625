//! The upload → extract → analyze → visualize state machine.
//!
//! One run is active at a time. A run walks the ingestion workflow one task
//! per step and publishes the phase of the task about to run, so readers of
//! the [`watch`] channel see `Extracting`, `Analyzing` and finally `Ready` or
//! `Failed`. A failed run falls back to `Idle` after a fixed delay.

use nexus_flow::{ExecutionStatus, FlowError, Graph};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::OrchestratorError,
    models::{StructuredAnalysis, UploadFile},
    tasks::{AnalyzeDocumentTask, ExtractTextTask, session_keys},
    workflow::create_ingestion_session,
};

pub const EXTRACTING_PROGRESS: &str = "Extracting document text...";
pub const ANALYZING_PROGRESS: &str = "Analyzing document...";
/// The only failure text users ever see
pub const FAILURE_MESSAGE: &str = "Analysis failed. Resetting...";

pub const DEFAULT_FAILURE_RESET: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Extracting,
    Analyzing,
    Ready(Arc<StructuredAnalysis>),
    Failed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Analyzing => "analyzing",
            Self::Ready(_) => "ready",
            Self::Failed => "failed",
        }
    }

    /// A run is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Extracting | Self::Analyzing)
    }

    pub fn analysis(&self) -> Option<&Arc<StructuredAnalysis>> {
        match self {
            Self::Ready(analysis) => Some(analysis),
            _ => None,
        }
    }

    fn for_task(task_id: &str) -> Option<Self> {
        match task_id {
            ExtractTextTask::ID => Some(Self::Extracting),
            AnalyzeDocumentTask::ID => Some(Self::Analyzing),
            _ => None,
        }
    }
}

/// What readers of the orchestrator see at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Run the phase belongs to; `None` while idle
    pub run_id: Option<String>,
    pub phase: Phase,
    pub progress: Option<String>,
    pub message: Option<String>,
}

impl StateSnapshot {
    pub fn idle() -> Self {
        Self {
            run_id: None,
            phase: Phase::Idle,
            progress: None,
            message: None,
        }
    }

    fn for_run(run_id: &str, phase: Phase) -> Self {
        let progress = match phase {
            Phase::Extracting => Some(EXTRACTING_PROGRESS.to_string()),
            Phase::Analyzing => Some(ANALYZING_PROGRESS.to_string()),
            _ => None,
        };
        let message = matches!(phase, Phase::Failed).then(|| FAILURE_MESSAGE.to_string());
        Self {
            run_id: Some(run_id.to_string()),
            phase,
            progress,
            message,
        }
    }

    fn belongs_to(&self, run_id: &str) -> bool {
        self.run_id.as_deref() == Some(run_id)
    }
}

/// Owns the ingestion state and drives runs through the workflow graph
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    graph: Arc<Graph>,
    state: watch::Sender<StateSnapshot>,
    failure_reset: Duration,
}

impl Orchestrator {
    pub fn new(graph: Graph, failure_reset: Duration) -> Self {
        let (state, _) = watch::channel(StateSnapshot::idle());
        Self {
            inner: Arc::new(Inner {
                graph: Arc::new(graph),
                state,
                failure_reset,
            }),
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.inner.state.subscribe()
    }

    /// Start a run for `upload` and return its id.
    ///
    /// Accepted from `Idle`, `Ready` and `Failed`. Any earlier result or
    /// pending reset is superseded. Must be called inside a tokio runtime.
    pub fn select_file(&self, upload: UploadFile) -> Result<String, OrchestratorError> {
        if !upload.is_accepted() {
            warn!(file = %upload.name, mime_type = ?upload.mime_type, "Rejected unsupported file");
            return Err(OrchestratorError::UnsupportedFormat {
                name: upload.name,
                mime_type: upload.mime_type,
            });
        }

        let run_id = Uuid::new_v4().to_string();
        let mut busy = None;
        self.inner.state.send_if_modified(|state| {
            if state.phase.is_busy() {
                busy = Some(state.phase.name());
                return false;
            }
            *state = StateSnapshot::for_run(&run_id, Phase::Extracting);
            true
        });
        if let Some(phase) = busy {
            warn!(file = %upload.name, phase, "Rejected upload while a run is in flight");
            return Err(OrchestratorError::Busy { phase });
        }

        info!(run_id = %run_id, file = %upload.name, format = %upload.format(), "Run started");
        let run = tokio::spawn(self.clone().run(run_id.clone(), upload));
        tokio::spawn(self.clone().supervise(run_id.clone(), run));
        Ok(run_id)
    }

    /// Leave the dashboard: `Ready → Idle`
    pub fn go_back(&self) -> Result<(), OrchestratorError> {
        let mut rejected = None;
        self.inner.state.send_if_modified(|state| {
            if let Phase::Ready(_) = state.phase {
                *state = StateSnapshot::idle();
                true
            } else {
                rejected = Some(state.phase.name());
                false
            }
        });
        match rejected {
            Some(phase) => Err(OrchestratorError::InvalidTransition {
                phase,
                event: "return to upload",
            }),
            None => Ok(()),
        }
    }

    async fn run(self, run_id: String, upload: UploadFile) {
        match self.execute(&run_id, upload).await {
            Ok(analysis) => {
                info!(run_id = %run_id, title = %analysis.title, "Run completed");
                self.publish(&run_id, Phase::Ready(analysis));
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Run failed");
                self.fail(&run_id).await;
            }
        }
    }

    /// A run task that panicked or was cancelled still ends in `Failed`
    async fn supervise(self, run_id: String, run: JoinHandle<()>) {
        if let Err(e) = run.await {
            error!(run_id = %run_id, error = %e, "Run task ended abnormally");
            self.fail(&run_id).await;
        }
    }

    async fn fail(&self, run_id: &str) {
        self.publish(run_id, Phase::Failed);
        tokio::time::sleep(self.inner.failure_reset).await;
        self.reset_failed(run_id);
    }

    async fn execute(
        &self,
        run_id: &str,
        upload: UploadFile,
    ) -> nexus_flow::Result<Arc<StructuredAnalysis>> {
        let graph = &self.inner.graph;
        let mut session = create_ingestion_session(graph, run_id, upload)?;

        loop {
            let task_id = session.current_task_id.clone();
            if let Some(phase) = Phase::for_task(&task_id) {
                self.publish(run_id, phase);
            }

            let result = graph.execute_session(&mut session).await?;
            if let Some(status) = session.status_message.as_deref() {
                info!(run_id, task_id = %task_id, status, "Step finished");
            }
            if result.status == ExecutionStatus::Completed {
                break;
            }
        }

        session
            .context
            .attachment::<StructuredAnalysis>(session_keys::ANALYSIS)
            .ok_or_else(|| FlowError::ContextError("Analysis not found in context".to_string()))
    }

    /// Move `run_id` to `phase`. A state owned by another run is left alone.
    fn publish(&self, run_id: &str, phase: Phase) {
        self.inner.state.send_if_modified(|state| {
            if !state.belongs_to(run_id) || state.phase.name() == phase.name() {
                return false;
            }
            *state = StateSnapshot::for_run(run_id, phase);
            true
        });
    }

    fn reset_failed(&self, run_id: &str) {
        let reset = self.inner.state.send_if_modified(|state| {
            if state.belongs_to(run_id) && state.phase == Phase::Failed {
                *state = StateSnapshot::idle();
                true
            } else {
                false
            }
        });
        if reset {
            info!(run_id, "Failed run cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{
            AnalysisBackend, AnalysisClient, AnalysisRequest, ValidationPolicy,
            tests::ScriptedBackend,
            validate::tests::sample_reply,
        },
        error::AnalysisError,
        reader::DocumentReader,
        workflow::build_ingestion_workflow,
    };
    use async_trait::async_trait;
    use tokio::time::Instant;

    struct PanickingBackend;

    #[async_trait]
    impl AnalysisBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn generate(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
            panic!("backend bug");
        }
    }

    fn orchestrator_with(backend: ScriptedBackend, timeout: Duration) -> Orchestrator {
        let client = AnalysisClient::new(Arc::new(backend), ValidationPolicy::Strict, timeout);
        let graph = build_ingestion_workflow(Arc::new(DocumentReader::default()), Arc::new(client));
        Orchestrator::new(graph, DEFAULT_FAILURE_RESET)
    }

    fn orchestrator(backend: ScriptedBackend) -> Orchestrator {
        orchestrator_with(backend, Duration::from_secs(120))
    }

    fn slow_success() -> ScriptedBackend {
        ScriptedBackend::replying(sample_reply().to_string()).delayed(Duration::from_secs(1))
    }

    fn text_file(content: &'static str) -> UploadFile {
        UploadFile::new("paper.txt", Some("text/plain".to_string()), content)
    }

    async fn wait_for_phase(rx: &mut watch::Receiver<StateSnapshot>, name: &str) -> StateSnapshot {
        rx.wait_for(|state| state.phase.name() == name)
            .await
            .unwrap()
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_walks_extracting_analyzing_ready() {
        let orchestrator = orchestrator(slow_success());
        let mut rx = orchestrator.subscribe();

        let run_id = orchestrator.select_file(text_file("A paper about attention")).unwrap();
        let first = rx.borrow_and_update().clone();
        assert_eq!(first.phase, Phase::Extracting);
        assert_eq!(first.progress.as_deref(), Some(EXTRACTING_PROGRESS));
        assert_eq!(first.run_id.as_deref(), Some(run_id.as_str()));

        let mut seen = vec![first.phase.name()];
        while !matches!(rx.borrow().phase, Phase::Ready(_) | Phase::Failed) {
            rx.changed().await.unwrap();
            seen.push(rx.borrow_and_update().phase.name());
        }
        assert_eq!(seen, ["extracting", "analyzing", "ready"]);

        let state = orchestrator.snapshot();
        let analysis = state.phase.analysis().unwrap();
        assert_eq!(analysis.title, "Attention Is All You Need");
        assert_eq!(state.run_id.as_deref(), Some(run_id.as_str()));
        assert_eq!(state.progress, None);
    }

    #[tokio::test(start_paused = true)]
    async fn analyzing_phase_carries_its_progress_message() {
        let orchestrator = orchestrator(slow_success());
        let mut rx = orchestrator.subscribe();

        orchestrator.select_file(text_file("paper")).unwrap();
        let state = wait_for_phase(&mut rx, "analyzing").await;
        assert_eq!(state.progress.as_deref(), Some(ANALYZING_PROGRESS));
        assert_eq!(state.message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_failure_shows_generic_message_then_resets() {
        let orchestrator = orchestrator(ScriptedBackend::failing(|| {
            AnalysisError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            }
        }));
        let mut rx = orchestrator.subscribe();

        orchestrator.select_file(text_file("paper")).unwrap();
        let failed = wait_for_phase(&mut rx, "failed").await;
        assert_eq!(failed.message.as_deref(), Some(FAILURE_MESSAGE));
        assert_eq!(failed.phase.analysis(), None);
        let failed_at = Instant::now();

        let idle = wait_for_phase(&mut rx, "idle").await;
        assert!(failed_at.elapsed() >= DEFAULT_FAILURE_RESET);
        assert_eq!(idle, StateSnapshot::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_failure_fails_the_run() {
        let backend = ScriptedBackend::replying(sample_reply().to_string());
        let orchestrator = orchestrator(backend);
        let mut rx = orchestrator.subscribe();

        orchestrator.select_file(text_file("  \n\t ")).unwrap();
        let failed = wait_for_phase(&mut rx, "failed").await;
        assert_eq!(failed.message.as_deref(), Some(FAILURE_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_times_out_into_failed() {
        let backend = ScriptedBackend::replying(sample_reply().to_string())
            .delayed(Duration::from_secs(3600));
        let orchestrator = orchestrator_with(backend, Duration::from_secs(120));
        let mut rx = orchestrator.subscribe();

        let started = Instant::now();
        orchestrator.select_file(text_file("paper")).unwrap();
        wait_for_phase(&mut rx, "failed").await;
        assert!(started.elapsed() >= Duration::from_secs(120));
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn upload_is_rejected_while_a_run_is_in_flight() {
        let orchestrator = orchestrator(slow_success());
        let mut rx = orchestrator.subscribe();

        let run_id = orchestrator.select_file(text_file("first")).unwrap();
        let err = orchestrator.select_file(text_file("second")).unwrap_err();
        assert_eq!(err, OrchestratorError::Busy { phase: "extracting" });

        wait_for_phase(&mut rx, "analyzing").await;
        let err = orchestrator.select_file(text_file("third")).unwrap_err();
        assert_eq!(err, OrchestratorError::Busy { phase: "analyzing" });

        let ready = wait_for_phase(&mut rx, "ready").await;
        assert_eq!(ready.run_id.as_deref(), Some(run_id.as_str()));
    }

    #[tokio::test]
    async fn unsupported_file_never_leaves_idle() {
        let orchestrator = orchestrator(slow_success());
        let upload = UploadFile::new("photo.png", Some("image/png".to_string()), "png");

        let err = orchestrator.select_file(upload).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported format. Accepted formats: PDF, DOCX, TXT, MD."
        );
        assert_eq!(orchestrator.snapshot(), StateSnapshot::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn going_back_from_ready_clears_the_result() {
        let orchestrator = orchestrator(slow_success());
        let mut rx = orchestrator.subscribe();

        orchestrator.select_file(text_file("paper")).unwrap();
        wait_for_phase(&mut rx, "ready").await;

        orchestrator.go_back().unwrap();
        assert_eq!(orchestrator.snapshot(), StateSnapshot::idle());
    }

    #[tokio::test]
    async fn going_back_outside_ready_is_rejected() {
        let orchestrator = orchestrator(slow_success());
        assert_eq!(
            orchestrator.go_back().unwrap_err(),
            OrchestratorError::InvalidTransition {
                phase: "idle",
                event: "return to upload",
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn new_upload_from_ready_replaces_the_result() {
        let orchestrator = orchestrator(slow_success());
        let mut rx = orchestrator.subscribe();

        let first = orchestrator.select_file(text_file("paper")).unwrap();
        wait_for_phase(&mut rx, "ready").await;

        let second = orchestrator.select_file(text_file("another paper")).unwrap();
        assert_ne!(first, second);
        let state = orchestrator.snapshot();
        assert_eq!(state.phase, Phase::Extracting);
        assert_eq!(state.phase.analysis(), None);

        let ready = wait_for_phase(&mut rx, "ready").await;
        assert_eq!(ready.run_id.as_deref(), Some(second.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reset_does_not_touch_a_newer_run() {
        let backend = ScriptedBackend::replying(sample_reply().to_string())
            .delayed(Duration::from_secs(10));
        let orchestrator = orchestrator(backend);
        let mut rx = orchestrator.subscribe();

        // Blank text fails during extraction, before the backend is reached
        orchestrator.select_file(text_file("   ")).unwrap();
        wait_for_phase(&mut rx, "failed").await;

        let second = orchestrator.select_file(text_file("paper")).unwrap();
        wait_for_phase(&mut rx, "analyzing").await;

        tokio::time::sleep(DEFAULT_FAILURE_RESET + Duration::from_secs(1)).await;
        let state = orchestrator.snapshot();
        assert_eq!(state.phase, Phase::Analyzing);
        assert_eq!(state.run_id.as_deref(), Some(second.as_str()));

        wait_for_phase(&mut rx, "ready").await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_run_still_fails_and_frees_the_orchestrator() {
        let client = AnalysisClient::new(
            Arc::new(PanickingBackend),
            ValidationPolicy::Strict,
            Duration::from_secs(120),
        );
        let graph = build_ingestion_workflow(Arc::new(DocumentReader::default()), Arc::new(client));
        let orchestrator = Orchestrator::new(graph, DEFAULT_FAILURE_RESET);
        let mut rx = orchestrator.subscribe();

        orchestrator.select_file(text_file("paper")).unwrap();
        let failed = wait_for_phase(&mut rx, "failed").await;
        assert_eq!(failed.message.as_deref(), Some(FAILURE_MESSAGE));

        wait_for_phase(&mut rx, "idle").await;
        assert!(orchestrator.select_file(text_file("retry")).is_ok());
    }
}
