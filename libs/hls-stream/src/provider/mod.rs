pub mod twitch;

use async_trait::async_trait;

use crate::{HlsStreamError, StitchedAd};

#[async_trait]
pub trait StitchProvider: Send + Sync {
    /// Channel this provider is bound to
    fn channel(&self) -> &str;

    /// Resolve the variant playlist url of the channel.
    ///
    /// `Ok(None)` means the channel currently can not be resolved (offline,
    /// unknown), which is not an error.
    async fn resolve_playlist(&self) -> Result<Option<String>, HlsStreamError>;

    /// Fetch the variant playlist and return the first qualifying stitched ad
    async fn fetch_stitched(&self, playlist_url: &str)
        -> Result<Option<StitchedAd>, HlsStreamError>;
}
