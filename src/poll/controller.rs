use super::schedule::PollSchedule;
use crate::{
    error::{GenerationError, Result},
    models::{GenerationRequest, TaskState, TaskStatus},
    provider::TaskProvider,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;

pub const TIMEOUT_MESSAGE: &str = "Render timed out. Please try again.";

/// Why a generation ended in `fail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Failure {
    /// The provider itself reported the task as failed.
    Provider {
        code: Option<String>,
        message: Option<String>,
    },
    TimedOut,
    /// Submission or a status lookup errored.
    Error { status: u16, message: String },
}

impl Failure {
    pub fn message(&self) -> String {
        match self {
            Failure::Provider { message, code } => message
                .clone()
                .or_else(|| code.as_ref().map(|code| format!("Provider failure {}", code)))
                .unwrap_or_else(|| "Render failed.".to_string()),
            Failure::TimedOut => TIMEOUT_MESSAGE.to_string(),
            Failure::Error { message, .. } => message.clone(),
        }
    }

    fn from_error(err: &GenerationError) -> Self {
        Failure::Error {
            status: err.http_status(),
            message: err.message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GenerationPhase {
    Idle,
    Submitting,
    Waiting {
        task_id: String,
    },
    Success {
        task_id: String,
        result_urls: Vec<String>,
        warning: Option<String>,
    },
    Fail {
        task_id: Option<String>,
        failure: Failure,
    },
}

impl GenerationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationPhase::Success { .. } | GenerationPhase::Fail { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, GenerationPhase::Submitting | GenerationPhase::Waiting { .. })
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            GenerationPhase::Waiting { task_id } | GenerationPhase::Success { task_id, .. } => {
                Some(task_id)
            }
            GenerationPhase::Fail { task_id, .. } => task_id.as_deref(),
            GenerationPhase::Idle | GenerationPhase::Submitting => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GenerationPhase::Idle => "idle",
            GenerationPhase::Submitting => "submitting",
            GenerationPhase::Waiting { .. } => "waiting",
            GenerationPhase::Success { .. } => "success",
            GenerationPhase::Fail { .. } => "fail",
        }
    }

    fn from_status(status: TaskStatus) -> Option<Self> {
        match status.state {
            TaskState::Waiting => None,
            TaskState::Success => Some(GenerationPhase::Success {
                task_id: status.task_id,
                result_urls: status.result_urls,
                warning: status.warning,
            }),
            TaskState::Fail => Some(GenerationPhase::Fail {
                task_id: Some(status.task_id),
                failure: Failure::Provider {
                    code: status.fail_code,
                    message: status.fail_msg,
                },
            }),
        }
    }
}

struct Inner {
    /// Bumped by submit, check-again and reset. Continuations carrying an
    /// older epoch are stale and must not touch the phase.
    epoch: u64,
    task_id: Option<String>,
    started_at: Option<Instant>,
    pending: Option<JoinHandle<()>>,
}

struct Shared<P> {
    provider: P,
    schedule: PollSchedule,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<GenerationPhase>,
}

impl<P> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(inner: &Inner, epoch: u64, task_id: Option<&str>) -> bool {
        inner.epoch == epoch && (task_id.is_none() || inner.task_id.as_deref() == task_id)
    }

    /// Apply a terminal phase if the continuation is still relevant.
    fn finish(&self, epoch: u64, task_id: Option<&str>, phase: GenerationPhase) -> bool {
        let mut inner = self.lock();
        if !Self::is_current(&inner, epoch, task_id) {
            log::debug!("Dropping stale {} result for task {:?}", phase.name(), task_id);
            return false;
        }
        log::info!(task_id = task_id.unwrap_or("none"); "Generation finished as {}", phase.name());
        // Detach rather than abort: this may be the pending task itself.
        inner.pending.take();
        self.phase_tx.send_replace(phase);
        true
    }
}

/// Drives one generation at a time through
/// `idle -> submitting -> waiting -> success | fail`.
///
/// Polling runs on a spawned tokio task; a terminal state, a reset or a new
/// submission stops it. Must be used from within a tokio runtime.
pub struct PollController<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for PollController<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: TaskProvider + 'static> PollController<P> {
    pub fn new(provider: P) -> Self {
        Self::with_schedule(provider, PollSchedule::default())
    }

    pub fn with_schedule(provider: P, schedule: PollSchedule) -> Self {
        let (phase_tx, _) = watch::channel(GenerationPhase::Idle);
        Self {
            shared: Arc::new(Shared {
                provider,
                schedule,
                inner: Mutex::new(Inner {
                    epoch: 0,
                    task_id: None,
                    started_at: None,
                    pending: None,
                }),
                phase_tx,
            }),
        }
    }

    pub fn phase(&self) -> GenerationPhase {
        self.shared.phase_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationPhase> {
        self.shared.phase_tx.subscribe()
    }

    pub fn updates(&self) -> WatchStream<GenerationPhase> {
        WatchStream::new(self.subscribe())
    }

    /// Resolves once the generation reached `success`/`fail`, or was reset.
    pub async fn wait_for_outcome(&self) -> GenerationPhase {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|phase| phase.is_terminal() || *phase == GenerationPhase::Idle)
            .await
            .map(|phase| phase.clone());
        settled.unwrap_or_else(|_| self.phase())
    }

    /// Create the remote task and start polling it. Returns the task id.
    pub async fn submit(&self, request: GenerationRequest) -> Result<String> {
        let epoch = {
            let mut inner = self.shared.lock();
            if self.phase().is_busy() {
                return Err(GenerationError::InvalidState(
                    "A generation is already in progress.".to_string(),
                ));
            }
            inner.epoch += 1;
            if let Some(handle) = inner.pending.take() {
                handle.abort();
            }
            inner.task_id = None;
            inner.started_at = Some(Instant::now());
            self.shared.phase_tx.send_replace(GenerationPhase::Submitting);
            inner.epoch
        };

        log::info!("Submitting generation for {}", request.model());

        match self.shared.provider.create_task(&request).await {
            Ok(task_id) => {
                let mut inner = self.shared.lock();
                if inner.epoch != epoch {
                    log::warn!("Task {} was created after a reset; ignoring it", task_id);
                    return Err(GenerationError::InvalidState(
                        "Generation was reset before the task was created.".to_string(),
                    ));
                }
                let started_at = *inner.started_at.get_or_insert_with(Instant::now);
                inner.task_id = Some(task_id.clone());
                self.shared.phase_tx.send_replace(GenerationPhase::Waiting {
                    task_id: task_id.clone(),
                });
                inner.pending = Some(self.spawn_poll_loop(epoch, task_id.clone(), started_at));
                Ok(task_id)
            }
            Err(err) => {
                log::error!("Task submission failed: {}", err);
                self.shared.finish(
                    epoch,
                    None,
                    GenerationPhase::Fail {
                        task_id: None,
                        failure: Failure::from_error(&err),
                    },
                );
                Err(err)
            }
        }
    }

    /// Manual retry after a failure: resume polling the same task with a
    /// fresh clock.
    pub fn check_again(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        let task_id = match (self.phase(), inner.task_id.clone()) {
            (GenerationPhase::Fail { .. }, Some(task_id)) => task_id,
            _ => {
                return Err(GenerationError::InvalidState(
                    "There is no failed task to check again.".to_string(),
                ))
            }
        };

        inner.epoch += 1;
        let epoch = inner.epoch;
        let started_at = Instant::now();
        inner.started_at = Some(started_at);
        log::info!(task_id = task_id.as_str(); "Checking task again");
        self.shared.phase_tx.send_replace(GenerationPhase::Waiting {
            task_id: task_id.clone(),
        });
        inner.pending = Some(self.spawn_poll_loop(epoch, task_id, started_at));
        Ok(())
    }

    /// Cancel any scheduled poll and forget the current task.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.epoch += 1;
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        inner.task_id = None;
        inner.started_at = None;
        self.shared.phase_tx.send_replace(GenerationPhase::Idle);
        log::debug!("Generation reset");
    }

    fn spawn_poll_loop(&self, epoch: u64, task_id: String, started_at: Instant) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { poll_until_settled(shared, epoch, task_id, started_at).await })
    }
}

async fn poll_until_settled<P: TaskProvider>(
    shared: Arc<Shared<P>>,
    epoch: u64,
    task_id: String,
    started_at: Instant,
) {
    let timed_out = || GenerationPhase::Fail {
        task_id: Some(task_id.clone()),
        failure: Failure::TimedOut,
    };

    loop {
        let elapsed = started_at.elapsed();
        if shared.schedule.is_expired(elapsed) {
            log::warn!(task_id = task_id.as_str(); "Task timed out after {:?}", elapsed);
            shared.finish(epoch, Some(&task_id), timed_out());
            return;
        }

        // A lookup may not outlive the ceiling.
        let remaining = shared.schedule.ceiling.saturating_sub(elapsed);
        let lookup = tokio::time::timeout(remaining, shared.provider.query_task(&task_id)).await;

        let next = match lookup {
            Err(_) => {
                log::warn!(task_id = task_id.as_str(); "Status lookup hit the ceiling");
                Some(timed_out())
            }
            Ok(Ok(status)) => GenerationPhase::from_status(status),
            Ok(Err(err)) => {
                log::error!(task_id = task_id.as_str(); "Status lookup failed: {}", err);
                Some(GenerationPhase::Fail {
                    task_id: Some(task_id.clone()),
                    failure: Failure::from_error(&err),
                })
            }
        };

        if let Some(phase) = next {
            shared.finish(epoch, Some(&task_id), phase);
            return;
        }

        let still_current = Shared::<P>::is_current(&shared.lock(), epoch, Some(&task_id));
        if !still_current {
            return;
        }

        let delay = shared.schedule.delay_for(elapsed);
        log::debug!(task_id = task_id.as_str(); "Still waiting; next check in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
