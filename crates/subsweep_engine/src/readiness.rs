//! Making sure a live executor answers in a context before work is sent to it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use subsweep_core::{ActionOutcome, ChannelRecord, ChannelTarget, ContextId, FailureReason};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

use crate::export::ExportError;
use crate::link::{ExecutorLink, ReadinessBoard};
use crate::protocol::{ExecutorRequest, ExecutorResponse};
use crate::settings::ReadinessSettings;
use crate::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    #[error("could not inject an executor into {context}: {source}")]
    InjectFailed {
        context: ContextId,
        source: TransportError,
    },
    #[error("executor in {context} is unreachable: {source}")]
    Unreachable {
        context: ContextId,
        source: TransportError,
    },
}

impl From<ReadinessError> for FailureReason {
    fn from(err: ReadinessError) -> Self {
        match err {
            ReadinessError::InjectFailed { source, .. } => source.into(),
            ReadinessError::Unreachable { .. } => FailureReason::Unreachable,
        }
    }
}

/// Probe, inject when nobody answers, let the page settle, retry once.
pub struct Bootstrap {
    link: Arc<dyn ExecutorLink>,
    board: ReadinessBoard,
    settings: ReadinessSettings,
}

impl Bootstrap {
    pub fn new(
        link: Arc<dyn ExecutorLink>,
        board: ReadinessBoard,
        settings: ReadinessSettings,
    ) -> Self {
        Self {
            link,
            board,
            settings,
        }
    }

    pub async fn ping(&self, context: ContextId) -> Result<(), TransportError> {
        match self.link.request(context, ExecutorRequest::Ping).await? {
            ExecutorResponse::Ready { ready: true } => Ok(()),
            other => Err(TransportError::UnexpectedResponse(other.kind().to_string())),
        }
    }

    /// Waits until the executor in `context` answers a ping.
    ///
    /// One injection is attempted when the first probe fails; after that the
    /// probe is repeated `probe_attempts` times before giving up.
    pub async fn ensure_ready(&self, context: ContextId) -> Result<(), ReadinessError> {
        let first = match self.with_reinject(context, || self.ping(context)).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        sweep_logging::sweep_debug!("{context}: {first}; polling for readiness");
        let mut last = first;
        for _ in 0..self.settings.probe_attempts {
            sleep(self.settings.probe_interval()).await;
            match self.ping(context).await {
                Ok(()) => return Ok(()),
                Err(source) => last = ReadinessError::Unreachable { context, source },
            }
        }
        Err(last)
    }

    /// Runs `op`; when it fails to reach the executor, injects once, settles and
    /// runs it a second time. A second failure is final.
    pub async fn with_reinject<T, F, Fut>(
        &self,
        context: ContextId,
        op: F,
    ) -> Result<T, ReadinessError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => sweep_logging::sweep_debug!("{context}: {err}; injecting executor"),
        }
        self.reinject(context).await?;
        op().await
            .map_err(|source| ReadinessError::Unreachable { context, source })
    }

    async fn reinject(&self, context: ContextId) -> Result<(), ReadinessError> {
        let mut announcements = self.board.subscribe();
        self.link
            .inject(context)
            .await
            .map_err(|source| ReadinessError::InjectFailed { context, source })?;
        if !wait_for_announcement(&mut announcements, context, self.settings.inject_settle()).await
        {
            sweep_logging::sweep_debug!("{context}: no ready announcement, settled by timer");
        }
        Ok(())
    }

    /// Sends the per-channel action, bounded by the readiness timeout.
    ///
    /// Always yields an outcome: unreachable executors and timeouts become
    /// failures.
    pub async fn dispatch_action(
        &self,
        context: ContextId,
        target: &ChannelTarget,
    ) -> ActionOutcome {
        let link = &self.link;
        let attempt = self.with_reinject(context, || {
            let target = target.clone();
            async move {
                match link
                    .request(context, ExecutorRequest::PerformAction { target })
                    .await?
                {
                    ExecutorResponse::Outcome { outcome } => Ok(outcome),
                    other => Err(TransportError::UnexpectedResponse(other.kind().to_string())),
                }
            }
        });
        match timeout(self.settings.timeout(), attempt).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                sweep_logging::sweep_warn!("{context}: {err}");
                ActionOutcome::failure(err.into())
            }
            Err(_) => {
                sweep_logging::sweep_warn!(
                    "{context}: no answer within {:?}",
                    self.settings.timeout()
                );
                ActionOutcome::failure(FailureReason::Timeout)
            }
        }
    }

    /// Asks the executor in `context` to scrape the subscriptions listing.
    ///
    /// Goes through the same probe and reinject path as actions. Scrolling a
    /// long listing takes a while, so the caller picks the bound.
    pub async fn export_subscriptions(
        &self,
        context: ContextId,
        bound: Duration,
    ) -> Result<Vec<ChannelRecord>, ExportError> {
        let link = &self.link;
        let attempt = self.with_reinject(context, || async move {
            match link
                .request(context, ExecutorRequest::ExportSubscriptions)
                .await?
            {
                ExecutorResponse::Exported { records, .. } => Ok(Ok(records)),
                ExecutorResponse::ExportFailed { error, .. } => Ok(Err(error)),
                other => Err(TransportError::UnexpectedResponse(other.kind().to_string())),
            }
        });
        match timeout(bound, attempt).await {
            Ok(Ok(Ok(records))) => Ok(records),
            Ok(Ok(Err(error))) => Err(ExportError::Remote(error)),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ExportError::TimedOut(bound)),
        }
    }
}

/// True when `context` announced itself within `settle`. Either way at most
/// `settle` elapses.
async fn wait_for_announcement(
    announcements: &mut broadcast::Receiver<ContextId>,
    context: ContextId,
    settle: Duration,
) -> bool {
    let deadline = Instant::now() + settle;
    loop {
        match tokio::time::timeout_at(deadline, announcements.recv()).await {
            Ok(Ok(announced)) if announced == context => return true,
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                tokio::time::sleep_until(deadline).await;
                return false;
            }
            Err(_) => return false,
        }
    }
}
