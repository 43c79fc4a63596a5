//! Wires one Chromium tab to the engine: navigator, executor link and orchestrator.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use subsweep_core::{ChannelRecord, ContextId};
use subsweep_engine::{
    Bootstrap, BrowserSession, CdpPage, ChannelLink, Clock, DetachingNavigator, LaunchOptions,
    OrchestratorDeps, OrchestratorHandle, PageSurface, ReadinessBoard, RonStateStore, Settings,
    SurfaceLookup,
};
use sweep_logging::sweep_info;

use crate::cli::BrowserArgs;

/// The single tab every job runs in.
pub const TAB: ContextId = ContextId(1);

pub fn utc_clock() -> Clock {
    Arc::new(|| Utc::now().to_rfc3339())
}

pub fn utc_date() -> Clock {
    Arc::new(|| Utc::now().format("%Y-%m-%d").to_string())
}

pub struct Session {
    browser: BrowserSession,
    page: Arc<CdpPage>,
    link: ChannelLink,
    board: ReadinessBoard,
    bootstrap: Bootstrap,
    settings: Settings,
}

impl Session {
    /// Launches the browser and opens the tab on `start_url`.
    pub async fn open(args: &BrowserArgs, settings: Settings, start_url: &str) -> Result<Self> {
        let options = LaunchOptions {
            headless: args.headless,
            user_data_dir: args.profile.clone(),
            chrome_path: args.chrome.clone(),
        };
        let browser = BrowserSession::launch(&options).await?;
        let page = browser.open_page(TAB, start_url).await?.into_shared();

        let lookup_page = page.clone();
        let surfaces: SurfaceLookup = Arc::new(move |context| {
            (context == lookup_page.context())
                .then(|| lookup_page.clone() as Arc<dyn PageSurface>)
        });
        let board = ReadinessBoard::new();
        let link = ChannelLink::new(surfaces, settings.clone(), board.clone(), utc_date());
        let bootstrap = Bootstrap::new(
            Arc::new(link.clone()),
            board.clone(),
            settings.readiness.clone(),
        );
        Ok(Self {
            browser,
            page,
            link,
            board,
            bootstrap,
            settings,
        })
    }

    /// Starts an orchestrator that persists into `state_dir`.
    pub fn orchestrator(&self, state_dir: &Path) -> OrchestratorHandle {
        OrchestratorHandle::spawn(OrchestratorDeps {
            navigator: Arc::new(DetachingNavigator::new(self.page.clone(), self.link.clone())),
            link: Arc::new(self.link.clone()),
            board: self.board.clone(),
            store: Arc::new(RonStateStore::new(state_dir.to_path_buf())),
            settings: self.settings.clone(),
            clock: utc_clock(),
        })
    }

    /// Asks the executor in the tab to scrape the subscriptions listing,
    /// injecting one first when none answers.
    pub async fn export(&self) -> Result<Vec<ChannelRecord>> {
        let records = self
            .bootstrap
            .export_subscriptions(TAB, self.settings.export_timeout())
            .await
            .context("export failed")?;
        sweep_info!("Scraped {} channels", records.len());
        Ok(records)
    }

    pub async fn close(self) {
        self.browser.close().await;
    }
}

pub fn load_engine_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => subsweep_engine::load_settings(path)
            .with_context(|| format!("reading settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}
