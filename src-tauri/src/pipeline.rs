use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dispatch::{UiDispatcher, UiEvent};
use crate::generator::ResponseGenerator;
use crate::metrics::PipelineMetrics;
use crate::speech::SpeechSurface;
use crate::utils::{now_epoch_ms, preview_for_log};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const THINKING_MESSAGE: &str = "考え中...";
pub const NOT_READY_MESSAGE: &str = "AIモデルの読み込み中です。少々お待ちください。";
pub const TIMEOUT_MESSAGE: &str =
    "応答時間が長すぎるため、回答できません。別の質問をお試しください。";
pub const READY_MESSAGE: &str = "準備ができました！何か質問してください。";

pub fn generation_failed_message(detail: &str) -> String {
    format!("応答の生成中にエラーが発生しました: {detail}")
}

pub fn initialization_failed_message(detail: &str) -> String {
    format!("モデル初期化エラー: {detail}")
}

/// Identifies one submitted request. Resolutions carrying any other token
/// are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Responded(String),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    #[default]
    Idle,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Readiness {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyPrompt,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Started(RequestToken),
    NotReady,
    Rejected(RejectReason),
}

impl Submission {
    /// Whether the prompt was consumed. A rejected prompt stays in the input.
    pub fn accepted(self) -> bool {
        !matches!(self, Submission::Rejected(_))
    }
}

#[derive(Debug)]
pub struct PendingRequest {
    pub token: RequestToken,
    pub prompt: String,
    pub started_at_ms: u64,
    started: Instant,
    timer: Option<JoinHandle<()>>,
}

/// Runs prompts through the generator one at a time, racing each call
/// against a deadline.
pub struct RequestPipeline {
    generator: Arc<dyn ResponseGenerator>,
    dispatcher: UiDispatcher,
    timeout: Duration,
    readiness: Readiness,
    pending: Option<PendingRequest>,
    next_token: u64,
    metrics: PipelineMetrics,
}

impl RequestPipeline {
    pub fn new(generator: Arc<dyn ResponseGenerator>, dispatcher: UiDispatcher) -> Self {
        Self {
            generator,
            dispatcher,
            timeout: REQUEST_TIMEOUT,
            readiness: Readiness::default(),
            pending: None,
            next_token: 0,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> PipelineState {
        if self.pending.is_some() {
            PipelineState::InFlight
        } else {
            PipelineState::Idle
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Kicks off generator initialization in the background. Only the first
    /// call does anything.
    pub fn start_initialization(&mut self) -> bool {
        if self.readiness != Readiness::Uninitialized {
            return false;
        }
        self.readiness = Readiness::Loading;

        let generator = Arc::clone(&self.generator);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(generator.initialize())
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(err.to_string()),
                Err(panic) => Err(panic_detail(panic.as_ref())),
            };
            dispatcher.post(UiEvent::GeneratorInitialized(result));
        });
        info!("generator initialization started");
        true
    }

    pub fn finish_initialization(
        &mut self,
        result: Result<(), String>,
        surface: &mut SpeechSurface<'_>,
    ) {
        match result {
            Ok(()) => {
                self.readiness = Readiness::Ready;
                info!("generator ready");
                surface.show(READY_MESSAGE);
            }
            Err(detail) => {
                self.readiness = Readiness::Failed;
                warn!("generator initialization failed: {detail}");
                surface.show(initialization_failed_message(&detail));
            }
        }
    }

    pub fn submit(&mut self, prompt: &str, surface: &mut SpeechSurface<'_>) -> Submission {
        if let Some(pending) = &self.pending {
            self.metrics.record_rejected();
            debug!(
                in_flight = pending.token.value(),
                "request rejected while another is in flight"
            );
            return Submission::Rejected(RejectReason::InFlight);
        }
        if prompt.trim().is_empty() {
            self.metrics.record_rejected();
            return Submission::Rejected(RejectReason::EmptyPrompt);
        }

        let token = RequestToken(self.next_token);
        self.next_token += 1;
        self.pending = Some(PendingRequest {
            token,
            prompt: prompt.to_string(),
            started_at_ms: now_epoch_ms(),
            started: Instant::now(),
            timer: None,
        });
        surface.show(THINKING_MESSAGE);

        if self.readiness != Readiness::Ready {
            self.pending = None;
            self.metrics.record_not_ready();
            info!(
                readiness = ?self.readiness,
                "request short-circuited; generator not ready"
            );
            surface.show(NOT_READY_MESSAGE);
            return Submission::NotReady;
        }

        self.spawn_generation(token, prompt.to_string());
        let timer = self.spawn_deadline(token);
        if let Some(pending) = self.pending.as_mut() {
            pending.timer = Some(timer);
        }
        info!(
            token = token.value(),
            prompt = %preview_for_log(prompt, 40),
            "request started"
        );
        Submission::Started(token)
    }

    /// Applies the first resolution for the in-flight request. Returns
    /// `false` for anything stale, which leaves the bubble untouched.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        outcome: RequestOutcome,
        surface: &mut SpeechSurface<'_>,
    ) -> bool {
        let Some(pending) = self.pending.take_if(|pending| pending.token == token) else {
            self.metrics.record_discarded();
            debug!(
                token = token.value(),
                ?outcome,
                "discarding resolution for a finished request"
            );
            return false;
        };

        if let Some(timer) = pending.timer {
            timer.abort();
        }
        let latency_ms = pending.started.elapsed().as_millis() as u64;

        match outcome {
            RequestOutcome::Responded(text) => {
                self.metrics.record_completed(latency_ms);
                info!(token = token.value(), latency_ms, "request answered");
                surface.show(text);
            }
            RequestOutcome::Failed(detail) => {
                self.metrics.record_failed(latency_ms);
                warn!(token = token.value(), "request failed: {detail}");
                surface.show(generation_failed_message(&detail));
            }
            RequestOutcome::TimedOut => {
                self.metrics.record_timeout();
                warn!(
                    token = token.value(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "request timed out"
                );
                surface.show(TIMEOUT_MESSAGE);
            }
        }
        true
    }

    fn spawn_generation(&self, token: RequestToken, prompt: String) {
        let generator = Arc::clone(&self.generator);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(generator.generate(&prompt))
                .catch_unwind()
                .await
            {
                Ok(Ok(text)) => RequestOutcome::Responded(text),
                Ok(Err(err)) => RequestOutcome::Failed(err.to_string()),
                Err(panic) => RequestOutcome::Failed(panic_detail(panic.as_ref())),
            };
            dispatcher.post(UiEvent::RequestResolved { token, outcome });
        });
    }

    fn spawn_deadline(&self, token: RequestToken) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            dispatcher.post(UiEvent::RequestResolved {
                token,
                outcome: RequestOutcome::TimedOut,
            });
        })
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "generator panicked".to_string()
    }
}
