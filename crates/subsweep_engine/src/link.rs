//! Cross-context messaging between the orchestrator and page executors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use subsweep_core::ContextId;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::executor::{Executor, ExecutorService};
use crate::protocol::{ExecutorRequest, ExecutorResponse};
use crate::settings::Settings;
use crate::surface::PageSurface;
use crate::{Clock, Delivery, TransportError};

#[async_trait::async_trait]
pub trait ExecutorLink: Send + Sync {
    /// Sends `request` to the executor in `context` and waits for its answer.
    async fn request(
        &self,
        context: ContextId,
        request: ExecutorRequest,
    ) -> Result<ExecutorResponse, TransportError>;

    /// Installs a fresh executor in `context`, replacing any previous one.
    async fn inject(&self, context: ContextId) -> Result<(), TransportError>;
}

/// Executors announce themselves here once they can take requests.
#[derive(Clone)]
pub struct ReadinessBoard {
    tx: broadcast::Sender<ContextId>,
}

impl Default for ReadinessBoard {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }
}

impl ReadinessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces that `context` has a live executor. Nobody listening is fine.
    pub fn announce(&self, context: ContextId) -> Delivery {
        match self.tx.send(context) {
            Ok(listeners) => Delivery::Delivered { listeners },
            Err(_) => Delivery::NoListener,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContextId> {
        self.tx.subscribe()
    }
}

/// Looks up the page behind a context. `None` means the context is gone.
pub type SurfaceLookup = Arc<dyn Fn(ContextId) -> Option<Arc<dyn PageSurface>> + Send + Sync>;

struct Envelope {
    request: ExecutorRequest,
    reply: oneshot::Sender<ExecutorResponse>,
}

/// In-process link: each injected executor is a task fed through a channel.
///
/// Navigating a page away destroys its executor; backends call [`ChannelLink::detach`]
/// when that happens.
#[derive(Clone)]
pub struct ChannelLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    executors: Mutex<HashMap<ContextId, mpsc::Sender<Envelope>>>,
    surfaces: SurfaceLookup,
    settings: Settings,
    board: ReadinessBoard,
    collected_on: Clock,
}

impl ChannelLink {
    pub fn new(
        surfaces: SurfaceLookup,
        settings: Settings,
        board: ReadinessBoard,
        collected_on: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                executors: Mutex::new(HashMap::new()),
                surfaces,
                settings,
                board,
                collected_on,
            }),
        }
    }

    /// Drops the executor of `context`, as a page load would.
    pub fn detach(&self, context: ContextId) -> bool {
        self.executors().remove(&context).is_some()
    }

    pub fn is_attached(&self, context: ContextId) -> bool {
        self.executors()
            .get(&context)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn executors(&self) -> std::sync::MutexGuard<'_, HashMap<ContextId, mpsc::Sender<Envelope>>> {
        self.inner
            .executors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl ExecutorLink for ChannelLink {
    async fn request(
        &self,
        context: ContextId,
        request: ExecutorRequest,
    ) -> Result<ExecutorResponse, TransportError> {
        let sender = self
            .executors()
            .get(&context)
            .cloned()
            .ok_or(TransportError::NotListening(context))?;
        let (reply, answer) = oneshot::channel();
        sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| TransportError::NotListening(context))?;
        answer
            .await
            .map_err(|_| TransportError::Disconnected(context))
    }

    async fn inject(&self, context: ContextId) -> Result<(), TransportError> {
        let surface =
            (self.inner.surfaces)(context).ok_or(TransportError::ContextClosed(context))?;
        let settings = &self.inner.settings;
        let executor = Executor::new(
            surface,
            settings.executor.clone(),
            settings.scroll.clone(),
            settings.engine.listing_url.clone(),
            self.inner.collected_on.clone(),
        );
        let service = ExecutorService::new(context, executor);

        let (tx, mut rx) = mpsc::channel::<Envelope>(8);
        // Replacing the sender ends the previous executor's loop.
        self.executors().insert(context, tx);

        let board = self.inner.board.clone();
        tokio::spawn(async move {
            if let Delivery::NoListener = board.announce(context) {
                sweep_logging::sweep_debug!("{context}: ready announcement had no listener");
            }
            while let Some(Envelope { request, reply }) = rx.recv().await {
                let response = service.handle(request).await;
                if reply.send(response).is_err() {
                    sweep_logging::sweep_debug!("{context}: requester went away");
                }
            }
            sweep_logging::sweep_trace!("{context}: executor detached");
        });
        sweep_logging::sweep_debug!("{context}: executor injected");
        Ok(())
    }
}
