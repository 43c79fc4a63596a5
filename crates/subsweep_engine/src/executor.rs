use std::sync::Arc;

use subsweep_core::{
    ActionOutcome, ChannelRecord, ChannelTarget, ContextId, ControlRole, FailureReason,
};
use tokio::time::sleep;

use crate::export::ExportError;
use crate::extract::{stabilize_scroll, ChannelScraper};
use crate::protocol::{ExecutorRequest, ExecutorResponse};
use crate::settings::{ExecutorSettings, ScrollSettings};
use crate::surface::{Control, PageSurface, SubscriptionState};
use crate::{Clock, TransportError};

/// Confirmations some layouts show after the unsubscribe item. Both are optional.
const CONFIRMATIONS: [ControlRole; 2] = [ControlRole::ConfirmToast, ControlRole::ConfirmDialog];

/// Performs the per-channel action and the listing export against one page.
pub struct Executor {
    surface: Arc<dyn PageSurface>,
    settings: ExecutorSettings,
    scroll: ScrollSettings,
    scraper: ChannelScraper,
    listing_url: String,
    collected_on: Clock,
}

impl Executor {
    pub fn new(
        surface: Arc<dyn PageSurface>,
        settings: ExecutorSettings,
        scroll: ScrollSettings,
        listing_url: impl Into<String>,
        collected_on: Clock,
    ) -> Self {
        Self {
            surface,
            settings,
            scroll,
            scraper: ChannelScraper::default(),
            listing_url: listing_url.into(),
            collected_on,
        }
    }

    pub fn with_scraper(mut self, scraper: ChannelScraper) -> Self {
        self.scraper = scraper;
        self
    }

    /// Unsubscribes from the channel open in the page.
    ///
    /// A channel that already shows a plain "Subscribe" control counts as done.
    /// Every path ends in exactly one outcome.
    pub async fn perform_action(&self, target: &ChannelTarget) -> ActionOutcome {
        match self.unsubscribe(target).await {
            Ok(outcome) => outcome,
            Err(err) => {
                sweep_logging::sweep_warn!("Action on {} aborted: {err}", target.name);
                ActionOutcome::failure(err.into())
            }
        }
    }

    async fn unsubscribe(&self, target: &ChannelTarget) -> Result<ActionOutcome, TransportError> {
        let Some(primary) = self
            .poll_for(ControlRole::Subscription, self.settings.primary_attempts)
            .await?
        else {
            return Ok(not_found(ControlRole::Subscription));
        };
        if primary.subscription_state() == SubscriptionState::NotSubscribed {
            sweep_logging::sweep_info!("{} is already unsubscribed", target.name);
            return Ok(ActionOutcome::Success);
        }
        self.click(&primary).await?;

        let Some(item) = self
            .poll_for(ControlRole::UnsubscribeItem, self.settings.secondary_attempts)
            .await?
        else {
            return Ok(not_found(ControlRole::UnsubscribeItem));
        };
        self.click(&item).await?;

        for role in CONFIRMATIONS {
            match self.poll_for(role, self.settings.confirm_attempts).await? {
                Some(control) => self.click(&control).await?,
                None => sweep_logging::sweep_debug!("No {role} shown for {}", target.name),
            }
        }
        sweep_logging::sweep_info!("Unsubscribed from {}", target.name);
        Ok(ActionOutcome::Success)
    }

    /// Looks for `role` up to `attempts` times, pausing between lookups.
    async fn poll_for(
        &self,
        role: ControlRole,
        attempts: usize,
    ) -> Result<Option<Control>, TransportError> {
        for attempt in 1..=attempts {
            if let Some(control) = self.surface.locate(role).await? {
                sweep_logging::sweep_trace!(
                    "Found {role} with strategy {} on attempt {attempt}",
                    control.strategy
                );
                return Ok(Some(control));
            }
            if attempt < attempts {
                sleep(self.settings.poll_interval()).await;
            }
        }
        Ok(None)
    }

    async fn click(&self, control: &Control) -> Result<(), TransportError> {
        self.surface.invoke(control).await?;
        sleep(self.settings.step_delay()).await;
        Ok(())
    }

    /// Loads the full listing and scrapes it into table rows.
    pub async fn export_subscriptions(&self) -> Result<Vec<ChannelRecord>, ExportError> {
        let current = self.surface.current_url().await?;
        if !current.starts_with(&self.listing_url) {
            sweep_logging::sweep_info!("Opening {}", self.listing_url);
            self.surface.open(&self.listing_url).await?;
        }
        let report = stabilize_scroll(self.surface.as_ref(), &self.scroll).await?;
        sweep_logging::sweep_debug!("Listing settled after {} scrolls", report.attempts);

        let html = self.surface.document_html().await?;
        let base = self.surface.current_url().await?;
        let records = self
            .scraper
            .scrape(&html, Some(&base), &(self.collected_on)());
        if records.is_empty() {
            return Err(ExportError::NoSubscriptions);
        }
        Ok(records)
    }
}

fn not_found(role: ControlRole) -> ActionOutcome {
    sweep_logging::sweep_warn!("{role} not found");
    ActionOutcome::failure(FailureReason::ControlNotFound { role })
}

/// Answers protocol requests on behalf of the executor living in one context.
pub struct ExecutorService {
    context: ContextId,
    executor: Executor,
}

impl ExecutorService {
    pub fn new(context: ContextId, executor: Executor) -> Self {
        Self { context, executor }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub async fn handle(&self, request: ExecutorRequest) -> ExecutorResponse {
        match request {
            ExecutorRequest::Ping => ExecutorResponse::ready(),
            ExecutorRequest::PerformAction { target } => {
                sweep_logging::sweep_debug!("{}: acting on {}", self.context, target.url);
                ExecutorResponse::Outcome {
                    outcome: self.executor.perform_action(&target).await,
                }
            }
            ExecutorRequest::ExportSubscriptions => {
                let result = self.executor.export_subscriptions().await;
                if let Err(err) = &result {
                    sweep_logging::sweep_error!("Export failed: {err}");
                }
                ExecutorResponse::export(result.map_err(|err| err.to_string()))
            }
        }
    }
}
