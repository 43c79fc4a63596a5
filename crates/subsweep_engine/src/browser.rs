//! Chromium backend over the DevTools protocol.
//!
//! One [`CdpPage`] wraps one tab. It is both the [`Navigator`] for its context
//! and the [`PageSurface`] its executor drives. The control selector tables
//! below track the current channel page layout and are expected to drift.

use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use serde::Deserialize;
use subsweep_core::{ContextId, ControlRole};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::navigate::Navigator;
use crate::surface::{Control, ControlSurface, DocumentSurface, ScrollSurface};
use crate::TransportError;

const SUBSCRIPTION_SELECTORS: &[&str] = &[
    "ytd-subscribe-button-renderer button",
    "#subscribe-button button",
    "button[aria-label*=\"Unsubscribe\"]",
    "button[aria-label*=\"Subscribed\"]",
    "button[title*=\"Subscribed\"]",
    "yt-button-renderer[is-paper-button] button[aria-label*=\"Subscribed\"]",
];

const UNSUBSCRIBE_ITEM_SELECTORS: &[&str] = &[
    "#contentWrapper yt-list-item-view-model:last-child",
    "div#contentWrapper yt-list-item-view-model[role=\"menuitem\"]:last-child",
    "tp-yt-iron-dropdown yt-list-item-view-model:last-child",
    "button[aria-label*=\"Unsubscribe\"]",
    "yt-button-renderer[aria-label*=\"Unsubscribe\"] button",
];

const CONFIRM_TOAST_SELECTORS: &[&str] = &[
    "tp-yt-paper-toast button[aria-label*=\"Unsubscribe\"]",
    "ytd-toast button[aria-label*=\"Unsubscribe\"]",
    "ytd-notification-action-button-renderer button[aria-label*=\"Unsubscribe\"]",
];

const CONFIRM_DIALOG_SELECTORS: &[&str] = &[
    "yt-confirm-dialog-renderer #confirm-button button",
    "ytd-popup-container button[aria-label*=\"Unsubscribe\"]",
    "tp-yt-paper-dialog button[aria-label*=\"Unsubscribe\"]",
    "ytd-confirmation-dialog-renderer button[aria-label*=\"Unsubscribe\"]",
    "#confirm-button button",
];

fn selectors_for(role: ControlRole) -> &'static [&'static str] {
    match role {
        ControlRole::Subscription => SUBSCRIPTION_SELECTORS,
        ControlRole::UnsubscribeItem => UNSUBSCRIBE_ITEM_SELECTORS,
        ControlRole::ConfirmToast => CONFIRM_TOAST_SELECTORS,
        ControlRole::ConfirmDialog => CONFIRM_DIALOG_SELECTORS,
    }
}

fn role_tag(role: ControlRole) -> &'static str {
    match role {
        ControlRole::Subscription => "subscription",
        ControlRole::UnsubscribeItem => "unsubscribe-item",
        ControlRole::ConfirmToast => "confirm-toast",
        ControlRole::ConfirmDialog => "confirm-dialog",
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("could not open a tab: {0}")]
    Tab(String),
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Chromium profile to reuse, so an existing sign-in carries over.
    pub user_data_dir: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
}

/// A launched browser and its CDP event pump.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    sweep_logging::sweep_debug!("CDP handler: {err}");
                }
            }
        });
        sweep_logging::sweep_info!("Browser launched");
        Ok(Self { browser, handler })
    }

    pub async fn open_page(&self, context: ContextId, url: &str) -> Result<CdpPage, BrowserError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::Tab(e.to_string()))?;
        Ok(CdpPage { context, page })
    }

    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            sweep_logging::sweep_warn!("Browser did not close cleanly: {err}");
        }
        self.handler.abort();
    }
}

#[derive(Clone)]
pub struct CdpPage {
    context: ContextId,
    page: Page,
}

#[derive(Debug, Deserialize)]
struct Located {
    label: String,
    strategy: usize,
}

impl CdpPage {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, js: &str) -> Result<T, TransportError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| TransportError::Page(e.to_string()))?
            .into_value()
            .map_err(|e| TransportError::Page(format!("{e:?}")))
    }

    fn check_context(&self, context: ContextId) -> Result<(), TransportError> {
        if context == self.context {
            Ok(())
        } else {
            Err(TransportError::ContextClosed(context))
        }
    }
}

#[async_trait::async_trait]
impl Navigator for CdpPage {
    async fn navigate(&self, context: ContextId, url: &str) -> Result<(), TransportError> {
        self.check_context(context)?;
        self.page
            .goto(url)
            .await
            .map_err(|e| TransportError::Page(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_navigation(&self, context: ContextId) -> Result<(), TransportError> {
        self.check_context(context)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| TransportError::Page(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ControlSurface for CdpPage {
    async fn locate(&self, role: ControlRole) -> Result<Option<Control>, TransportError> {
        let selectors = serde_json::to_string(selectors_for(role))
            .map_err(|e| TransportError::Page(e.to_string()))?;
        let tag = role_tag(role);
        let js = format!(
            r#"(() => {{
                const selectors = {selectors};
                for (let i = 0; i < selectors.length; i++) {{
                    let el = null;
                    try {{ el = document.querySelector(selectors[i]); }} catch (_) {{ continue; }}
                    if (!el) continue;
                    document.querySelectorAll('[data-subsweep-role="{tag}"]')
                        .forEach(old => old.removeAttribute('data-subsweep-role'));
                    el.setAttribute('data-subsweep-role', '{tag}');
                    const label = ((el.getAttribute('aria-label') || '') + ' ' + (el.textContent || '')).trim();
                    return {{ label, strategy: i }};
                }}
                return null;
            }})()"#
        );
        let located: Option<Located> = self.eval(&js).await?;
        Ok(located.map(|found| Control {
            role,
            label: found.label,
            strategy: found.strategy,
        }))
    }

    async fn invoke(&self, control: &Control) -> Result<(), TransportError> {
        let tag = role_tag(control.role);
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('[data-subsweep-role="{tag}"]');
                if (!el) return false;
                el.dispatchEvent(new MouseEvent('click', {{ bubbles: true, cancelable: true, view: window }}));
                return true;
            }})()"#
        );
        if self.eval::<bool>(&js).await? {
            Ok(())
        } else {
            Err(TransportError::Page(format!("{} left the page", control.role)))
        }
    }
}

#[async_trait::async_trait]
impl ScrollSurface for CdpPage {
    async fn scroll_to_bottom(&self) -> Result<(), TransportError> {
        self.eval::<bool>(
            "(() => { window.scrollTo(0, document.documentElement.scrollHeight); return true; })()",
        )
        .await
        .map(|_| ())
    }

    async fn content_extent(&self) -> Result<u64, TransportError> {
        self.eval("document.documentElement.scrollHeight").await
    }
}

#[async_trait::async_trait]
impl DocumentSurface for CdpPage {
    async fn current_url(&self) -> Result<String, TransportError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| TransportError::Page(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn document_html(&self) -> Result<String, TransportError> {
        self.page
            .content()
            .await
            .map_err(|e| TransportError::Page(e.to_string()))
    }

    async fn open(&self, url: &str) -> Result<(), TransportError> {
        self.navigate(self.context, url).await?;
        self.wait_for_navigation(self.context).await
    }
}
