use subsweep_core::ContextId;

use crate::link::ChannelLink;
use crate::TransportError;

/// Moves a context to a new page.
#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, context: ContextId, url: &str) -> Result<(), TransportError>;

    /// Resolves once the page in `context` reports its load finished.
    async fn wait_for_navigation(&self, context: ContextId) -> Result<(), TransportError>;
}

/// A page load discards whatever executor the old document hosted. This wrapper
/// mirrors that on a [`ChannelLink`] so the next item has to bootstrap again.
pub struct DetachingNavigator<N> {
    inner: N,
    link: ChannelLink,
}

impl<N: Navigator> DetachingNavigator<N> {
    pub fn new(inner: N, link: ChannelLink) -> Self {
        Self { inner, link }
    }
}

#[async_trait::async_trait]
impl<N: Navigator> Navigator for DetachingNavigator<N> {
    async fn navigate(&self, context: ContextId, url: &str) -> Result<(), TransportError> {
        self.link.detach(context);
        self.inner.navigate(context, url).await
    }

    async fn wait_for_navigation(&self, context: ContextId) -> Result<(), TransportError> {
        self.inner.wait_for_navigation(context).await
    }
}

#[async_trait::async_trait]
impl<N: Navigator + ?Sized> Navigator for std::sync::Arc<N> {
    async fn navigate(&self, context: ContextId, url: &str) -> Result<(), TransportError> {
        (**self).navigate(context, url).await
    }

    async fn wait_for_navigation(&self, context: ContextId) -> Result<(), TransportError> {
        (**self).wait_for_navigation(context).await
    }
}
