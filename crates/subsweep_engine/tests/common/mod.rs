#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};

use subsweep_core::{ChannelTarget, ContextId, ControlRole};
use subsweep_engine::{
    ChannelLink, Clock, Control, ControlSurface, DocumentSurface, Navigator, PageSurface,
    ReadinessBoard, ScrollSurface, Settings, SurfaceLookup, TransportError,
};

pub const LISTING_URL: &str = "https://video.example/feed/channels";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(sweep_logging::initialize_for_tests);
}

pub fn channel_url(name: &str) -> String {
    format!("https://video.example/@{name}")
}

pub fn target(name: &str) -> ChannelTarget {
    ChannelTarget::new(name, channel_url(name))
}

pub fn fixed_clock(value: &'static str) -> Clock {
    Arc::new(move || value.to_string())
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.engine.listing_url = LISTING_URL.to_string();
    settings
}

/// How one channel page behaves.
#[derive(Debug, Clone, Default)]
pub struct ChannelPage {
    pub subscribed: bool,
    pub has_button: bool,
    /// The subscription menu never shows its unsubscribe entry.
    pub menu_broken: bool,
    /// Unsubscribing needs a confirmation dialog.
    pub with_dialog: bool,
    pub menu_open: bool,
    pub dialog_open: bool,
}

impl ChannelPage {
    pub fn subscribed() -> Self {
        Self {
            subscribed: true,
            has_button: true,
            ..Self::default()
        }
    }

    pub fn unsubscribed() -> Self {
        Self {
            has_button: true,
            ..Self::default()
        }
    }

    pub fn without_button() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct SiteState {
    url: String,
    channels: HashMap<String, ChannelPage>,
    clicks: Vec<(String, ControlRole)>,
    lookups: HashMap<ControlRole, usize>,
    navigations: Vec<String>,
    broken_urls: HashSet<String>,
    listing_html: String,
    extents: Vec<u64>,
    scrolls: usize,
}

/// A scripted single-tab website: navigator and page surface at once.
pub struct FakeSite {
    context: ContextId,
    state: Mutex<SiteState>,
}

impl FakeSite {
    pub fn new(context: ContextId) -> Arc<Self> {
        Arc::new(Self {
            context,
            state: Mutex::new(SiteState {
                url: "about:blank".to_string(),
                extents: vec![1000],
                ..SiteState::default()
            }),
        })
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn add_channel(&self, name: &str, page: ChannelPage) {
        self.state
            .lock()
            .unwrap()
            .channels
            .insert(channel_url(name), page);
    }

    pub fn break_navigation_to(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_urls
            .insert(channel_url(name));
    }

    pub fn break_listing(&self) {
        self.state
            .lock()
            .unwrap()
            .broken_urls
            .insert(LISTING_URL.to_string());
    }

    pub fn set_listing(&self, html: &str, extents: Vec<u64>) {
        let mut state = self.state.lock().unwrap();
        state.listing_html = html.to_string();
        state.extents = extents;
    }

    pub fn show(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.state.lock().unwrap().channels[&channel_url(name)].subscribed
    }

    pub fn clicks(&self) -> Vec<ControlRole> {
        self.state
            .lock()
            .unwrap()
            .clicks
            .iter()
            .map(|(_, role)| *role)
            .collect()
    }

    pub fn clicked_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for (url, _) in &self.state.lock().unwrap().clicks {
            if urls.last() != Some(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    pub fn lookups(&self, role: ControlRole) -> usize {
        self.state
            .lock()
            .unwrap()
            .lookups
            .get(&role)
            .copied()
            .unwrap_or(0)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    /// Surface lookup that only knows this site's context.
    pub fn lookup(self: &Arc<Self>) -> SurfaceLookup {
        let site = self.clone();
        Arc::new(move |context| {
            (context == site.context).then(|| site.clone() as Arc<dyn PageSurface>)
        })
    }
}

pub fn channel_link(site: &Arc<FakeSite>, board: &ReadinessBoard) -> ChannelLink {
    ChannelLink::new(
        site.lookup(),
        test_settings(),
        board.clone(),
        fixed_clock("2024-05-01"),
    )
}

#[async_trait::async_trait]
impl Navigator for FakeSite {
    async fn navigate(&self, context: ContextId, url: &str) -> Result<(), TransportError> {
        if context != self.context {
            return Err(TransportError::ContextClosed(context));
        }
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.broken_urls.contains(url) {
            return Err(TransportError::Page("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        state.url = url.to_string();
        if let Some(page) = state.channels.get_mut(url) {
            page.menu_open = false;
            page.dialog_open = false;
        }
        Ok(())
    }

    async fn wait_for_navigation(&self, _context: ContextId) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl ControlSurface for FakeSite {
    async fn locate(&self, role: ControlRole) -> Result<Option<Control>, TransportError> {
        let mut state = self.state.lock().unwrap();
        *state.lookups.entry(role).or_default() += 1;
        let url = state.url.clone();
        let Some(page) = state.channels.get(&url) else {
            return Ok(None);
        };
        let label = match role {
            ControlRole::Subscription if page.has_button => {
                if page.subscribed {
                    Some("Subscribed")
                } else {
                    Some("Subscribe")
                }
            }
            ControlRole::UnsubscribeItem if page.menu_open && !page.menu_broken => {
                Some("Unsubscribe")
            }
            ControlRole::ConfirmDialog if page.dialog_open => Some("Unsubscribe"),
            _ => None,
        };
        Ok(label.map(|label| Control::new(role, label)))
    }

    async fn invoke(&self, control: &Control) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        let url = state.url.clone();
        state.clicks.push((url.clone(), control.role));
        let page = state
            .channels
            .get_mut(&url)
            .ok_or_else(|| TransportError::Page("nothing to click".to_string()))?;
        match control.role {
            ControlRole::Subscription => page.menu_open = true,
            ControlRole::UnsubscribeItem => {
                page.menu_open = false;
                if page.with_dialog {
                    page.dialog_open = true;
                } else {
                    page.subscribed = false;
                }
            }
            ControlRole::ConfirmDialog => {
                page.dialog_open = false;
                page.subscribed = false;
            }
            ControlRole::ConfirmToast => {}
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScrollSurface for FakeSite {
    async fn scroll_to_bottom(&self) -> Result<(), TransportError> {
        self.state.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn content_extent(&self) -> Result<u64, TransportError> {
        let state = self.state.lock().unwrap();
        let index = state.scrolls.min(state.extents.len().saturating_sub(1));
        Ok(state.extents.get(index).copied().unwrap_or(0))
    }
}

#[async_trait::async_trait]
impl DocumentSurface for FakeSite {
    async fn current_url(&self) -> Result<String, TransportError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn document_html(&self) -> Result<String, TransportError> {
        let state = self.state.lock().unwrap();
        if state.url.starts_with(LISTING_URL) {
            Ok(state.listing_html.clone())
        } else {
            Ok("<html><body></body></html>".to_string())
        }
    }

    async fn open(&self, url: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.broken_urls.contains(url) {
            return Err(TransportError::Page("net::ERR_CONNECTION_RESET".to_string()));
        }
        state.url = url.to_string();
        Ok(())
    }
}

pub const LISTING_HTML: &str = r#"<html><body><div id="contents">
  <ytd-channel-renderer>
    <a id="main-link" href="/@rustlang"><yt-formatted-string>Rust Lang</yt-formatted-string></a>
    <span id="subscribers">120K subscribers</span>
    <yt-formatted-string id="description-text">Official channel, "systems" talks
    Subscribed</yt-formatted-string>
  </ytd-channel-renderer>
  <ytd-channel-renderer>
    <h3><a href="https://video.example/channel/UC123">Second, Channel</a></h3>
  </ytd-channel-renderer>
  <ytd-channel-renderer>
    <span id="subscribers">5 subscribers</span>
  </ytd-channel-renderer>
</div></body></html>"#;
