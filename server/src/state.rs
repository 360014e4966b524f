use std::sync::Arc;

use hls_stream::StitchedAd;
use tokio::sync::RwLock;

/// Single slot holding the latest poll result.
///
/// Written only by the poller, read by every query handler. Values are
/// replaced and cloned whole under the lock, so a reader sees either the
/// previous or the new result.
#[derive(Clone, Default)]
pub struct LatestStitched {
    inner: Arc<RwLock<Option<StitchedAd>>>,
}

impl LatestStitched {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, value: Option<StitchedAd>) {
        *self.inner.write().await = value;
    }

    pub async fn get(&self) -> Option<StitchedAd> {
        self.inner.read().await.clone()
    }
}
