//! What the executor and the extractor need from a live page.
//!
//! Each backend (a CDP tab, a scripted fake in tests) implements these traits;
//! selector tables and DOM details stay behind them.

use subsweep_core::ControlRole;

use crate::TransportError;

/// Subscription state read off the primary control's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Subscribed,
    NotSubscribed,
    Unknown,
}

/// A control found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub role: ControlRole,
    /// Accessible label and visible text, concatenated.
    pub label: String,
    /// Index of the lookup strategy that matched.
    pub strategy: usize,
}

impl Control {
    pub fn new(role: ControlRole, label: impl Into<String>) -> Self {
        Self {
            role,
            label: label.into(),
            strategy: 0,
        }
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        classify_subscription_label(&self.label)
    }
}

/// "Subscribed", "Unsubscribe from X" or a notification bell mean the viewer is
/// subscribed; a bare "Subscribe" means they are not.
pub fn classify_subscription_label(label: &str) -> SubscriptionState {
    let label = label.to_lowercase();
    if ["subscribed", "unsubscribe", "notification", "setting"]
        .iter()
        .any(|marker| label.contains(marker))
    {
        SubscriptionState::Subscribed
    } else if label.contains("subscribe") {
        SubscriptionState::NotSubscribed
    } else {
        SubscriptionState::Unknown
    }
}

#[async_trait::async_trait]
pub trait ControlSurface: Send + Sync {
    /// Looks `role` up once. `Ok(None)` means no strategy matched right now.
    async fn locate(&self, role: ControlRole) -> Result<Option<Control>, TransportError>;

    async fn invoke(&self, control: &Control) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
pub trait ScrollSurface: Send + Sync {
    async fn scroll_to_bottom(&self) -> Result<(), TransportError>;

    /// Current scrollable height of the document.
    async fn content_extent(&self) -> Result<u64, TransportError>;
}

#[async_trait::async_trait]
pub trait DocumentSurface: Send + Sync {
    async fn current_url(&self) -> Result<String, TransportError>;

    async fn document_html(&self) -> Result<String, TransportError>;

    /// Loads `url` in place and waits for it to finish loading.
    async fn open(&self, url: &str) -> Result<(), TransportError>;
}

/// Everything an executor drives.
pub trait PageSurface: ControlSurface + ScrollSurface + DocumentSurface {}

impl<T: ControlSurface + ScrollSurface + DocumentSurface + ?Sized> PageSurface for T {}
