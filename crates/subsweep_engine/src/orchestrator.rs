//! Runs the coordinator: feeds it messages and carries out the effects it returns.

use std::sync::Arc;

use subsweep_core::{
    update, ActionOutcome, ChannelTarget, ContextId, Coordinator, CoordinatorView, Effect,
    FailureReason, JobSummary, Msg, PersistedState, Reply, RequestError, StatusSnapshot,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, timeout};

use crate::link::{ExecutorLink, ReadinessBoard};
use crate::navigate::Navigator;
use crate::persist::StateStore;
use crate::protocol::{OrchestratorRequest, OrchestratorResponse};
use crate::readiness::Bootstrap;
use crate::settings::Settings;
use crate::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Rejected(#[from] RequestError),
    #[error("the orchestrator has shut down")]
    Closed,
}

/// Observable job progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A new status record was persisted.
    Progress(StatusSnapshot),
    Finished(JobSummary),
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    pub navigator: Arc<dyn Navigator>,
    pub link: Arc<dyn ExecutorLink>,
    pub board: ReadinessBoard,
    pub store: Arc<dyn StateStore>,
    pub settings: Settings,
    /// RFC 3339 timestamps for the status record.
    pub clock: Clock,
}

enum Command {
    Start {
        targets: Vec<ChannelTarget>,
        owner: ContextId,
        reply: oneshot::Sender<Result<usize, RequestError>>,
    },
    Resume {
        persisted: PersistedState,
        owner: ContextId,
        reply: oneshot::Sender<Result<usize, RequestError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<String, RequestError>>,
    },
    View {
        reply: oneshot::Sender<CoordinatorView>,
    },
}

/// Cheap handle to a running orchestrator task.
#[derive(Clone)]
pub struct OrchestratorHandle {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<JobEvent>,
}

impl OrchestratorHandle {
    /// Spawns the orchestrator on the current tokio runtime.
    pub fn spawn(deps: OrchestratorDeps) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (events, _) = broadcast::channel(64);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let runner = Runner::new(deps, msg_tx, events.clone());
        tokio::spawn(runner.run(cmd_rx, msg_rx));
        Self { cmd_tx, events }
    }

    pub async fn start(
        &self,
        targets: Vec<ChannelTarget>,
        owner: ContextId,
    ) -> Result<usize, OrchestratorError> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::Start {
            targets,
            owner,
            reply,
        })
        .await?;
        Ok(answer.await.map_err(|_| OrchestratorError::Closed)??)
    }

    /// Continues an interrupted job from its persisted cursor in `owner`.
    pub async fn resume(
        &self,
        persisted: PersistedState,
        owner: ContextId,
    ) -> Result<usize, OrchestratorError> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::Resume {
            persisted,
            owner,
            reply,
        })
        .await?;
        Ok(answer.await.map_err(|_| OrchestratorError::Closed)??)
    }

    pub async fn stop(&self) -> Result<String, OrchestratorError> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        Ok(answer.await.map_err(|_| OrchestratorError::Closed)??)
    }

    pub async fn view(&self) -> Result<CoordinatorView, OrchestratorError> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::View { reply }).await?;
        answer.await.map_err(|_| OrchestratorError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Answers a UI request in its wire shape.
    pub async fn respond(&self, request: OrchestratorRequest) -> OrchestratorResponse {
        match request {
            OrchestratorRequest::StartJob { targets, context } => {
                OrchestratorResponse::start(flatten(self.start(targets, context).await))
            }
            OrchestratorRequest::StopJob => OrchestratorResponse::stop(flatten(self.stop().await)),
        }
    }

    async fn send(&self, command: Command) -> Result<(), OrchestratorError> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| OrchestratorError::Closed)
    }
}

fn flatten<T>(result: Result<T, OrchestratorError>) -> Result<T, RequestError> {
    result.map_err(|err| match err {
        OrchestratorError::Rejected(reason) => reason,
        OrchestratorError::Closed => RequestError::NoActiveJob,
    })
}

struct Runner {
    state: Coordinator,
    deps: Arc<OrchestratorDeps>,
    bootstrap: Arc<Bootstrap>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    events: broadcast::Sender<JobEvent>,
}

impl Runner {
    fn new(
        deps: OrchestratorDeps,
        msg_tx: mpsc::UnboundedSender<Msg>,
        events: broadcast::Sender<JobEvent>,
    ) -> Self {
        let bootstrap = Arc::new(Bootstrap::new(
            deps.link.clone(),
            deps.board.clone(),
            deps.settings.readiness.clone(),
        ));
        Self {
            state: Coordinator::new(),
            deps: Arc::new(deps),
            bootstrap,
            msg_tx,
            events,
        }
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut msg_rx: mpsc::UnboundedReceiver<Msg>,
    ) {
        let mut announcements = self.deps.board.subscribe();
        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(msg) = msg_rx.recv() => {
                    self.apply(msg);
                }
                Ok(context) = announcements.recv() => {
                    // An announcement vouches for whichever target is current.
                    if let Some(index) = self.state.job().map(|job| job.cursor()) {
                        self.apply(Msg::ExecutorReady { context, index });
                    }
                }
            }
        }
        sweep_logging::sweep_debug!("Orchestrator stopped: all handles dropped");
    }

    fn handle_command(&mut self, command: Command) {
        let at = (self.deps.clock)();
        match command {
            Command::Start {
                targets,
                owner,
                reply,
            } => {
                let replies = self.apply(Msg::StartRequested { targets, owner, at });
                let _ = reply.send(accepted(replies));
            }
            Command::Resume {
                persisted,
                owner,
                reply,
            } => {
                let replies = self.apply(Msg::ResumeRequested {
                    persisted,
                    owner,
                    at,
                });
                let _ = reply.send(accepted(replies));
            }
            Command::Stop { reply } => {
                let replies = self.apply(Msg::StopRequested { at });
                let result = match replies.into_iter().next() {
                    Some(Reply::Stopped { message }) => Ok(message),
                    Some(Reply::Rejected(reason)) => Err(reason),
                    _ => Err(RequestError::NoActiveJob),
                };
                let _ = reply.send(result);
            }
            Command::View { reply } => {
                let _ = reply.send(self.state.view());
            }
        }
    }

    /// Runs one message through `update`, executes side effects and returns the
    /// replies for the caller.
    fn apply(&mut self, msg: Msg) -> Vec<Reply> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        let mut replies = Vec::new();
        for effect in effects {
            match effect {
                Effect::Reply(reply) => replies.push(reply),
                other => self.execute(other),
            }
        }
        replies
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Reply(_) => {}
            Effect::Persist(persisted) => {
                if let Err(err) = self.deps.store.save(&persisted) {
                    sweep_logging::sweep_error!("Failed to persist job state: {err}");
                }
                let _ = self.events.send(JobEvent::Progress(persisted.status));
            }
            Effect::Navigate {
                context,
                index,
                url,
            } => {
                sweep_logging::sweep_info!("[{}] {context} -> {url}", index + 1);
                let deps = self.deps.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let msg = match navigate_and_settle(&deps, context, &url).await {
                        Ok(()) => Msg::NavigationCompleted { context },
                        Err(reason) => {
                            sweep_logging::sweep_warn!("Could not open {url}: {reason}");
                            Msg::NavigationFailed { context, reason }
                        }
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::EnsureReady { context, index } => {
                let bootstrap = self.bootstrap.clone();
                let bound = self.deps.settings.readiness.timeout();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let msg = match timeout(bound, bootstrap.ensure_ready(context)).await {
                        Ok(Ok(())) => Msg::ExecutorReady { context, index },
                        Ok(Err(err)) => {
                            sweep_logging::sweep_warn!("{err}");
                            Msg::ReadinessFailed {
                                context,
                                index,
                                reason: err.into(),
                            }
                        }
                        Err(_) => Msg::ReadinessFailed {
                            context,
                            index,
                            reason: FailureReason::Timeout,
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::DispatchAction {
                context,
                index,
                target,
            } => {
                let bootstrap = self.bootstrap.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let outcome = bootstrap.dispatch_action(context, &target).await;
                    match &outcome {
                        ActionOutcome::Success => {
                            sweep_logging::sweep_info!("[{}] {} done", index + 1, target.name)
                        }
                        ActionOutcome::Failure { reason } => {
                            sweep_logging::sweep_warn!(
                                "[{}] {} failed: {reason}",
                                index + 1,
                                target.name
                            )
                        }
                    }
                    let _ = tx.send(Msg::ActionFinished {
                        context,
                        index,
                        outcome,
                    });
                });
            }
            Effect::SchedulePacing => {
                let deps = self.deps.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    sleep(deps.settings.engine.pacing()).await;
                    let _ = tx.send(Msg::PacingElapsed { at: (deps.clock)() });
                });
            }
            Effect::Finished(summary) => {
                sweep_logging::sweep_info!(
                    "Job {:?}: {} of {} processed, {} succeeded, {} failed",
                    summary.end,
                    summary.processed,
                    summary.total,
                    summary.success_count,
                    summary.error_count
                );
                let _ = self.events.send(JobEvent::Finished(summary));
            }
        }
    }
}

fn accepted(replies: Vec<Reply>) -> Result<usize, RequestError> {
    match replies.into_iter().next() {
        Some(Reply::Accepted { total }) => Ok(total),
        Some(Reply::Rejected(reason)) => Err(reason),
        _ => Err(RequestError::NoActiveJob),
    }
}

/// Navigates, waits for the load (bounded) and lets the page settle.
async fn navigate_and_settle(
    deps: &OrchestratorDeps,
    context: ContextId,
    url: &str,
) -> Result<(), FailureReason> {
    let navigation = async {
        deps.navigator.navigate(context, url).await?;
        deps.navigator.wait_for_navigation(context).await
    };
    match timeout(deps.settings.engine.navigation_timeout(), navigation).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            return Err(FailureReason::Navigation {
                message: err.to_string(),
            })
        }
        Err(_) => {
            return Err(FailureReason::Navigation {
                message: "timed out waiting for the page to load".to_string(),
            })
        }
    }
    sleep(deps.settings.engine.settle()).await;
    Ok(())
}
