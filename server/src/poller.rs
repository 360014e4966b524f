use std::sync::Arc;

use hls_stream::StitchProvider;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::state::LatestStitched;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Waiting for a playable variant playlist
    Resolving,
    /// Polling a resolved variant playlist for stitched ads
    Polling { playlist_url: String },
}

/// Drives playlist resolution and stitched-ad polling for one channel.
///
/// Only one request is in flight at a time; all retries happen at fixed
/// intervals, forever.
pub struct Poller {
    provider: Arc<dyn StitchProvider>,
    latest: LatestStitched,
    playlist_interval: Duration,
    poll_interval: Duration,
    state: PollState,
}

impl Poller {
    pub fn new(
        provider: Arc<dyn StitchProvider>,
        latest: LatestStitched,
        playlist_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            latest,
            playlist_interval,
            poll_interval,
            state: PollState::Resolving,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Run a single action of the current state.
    ///
    /// Returns the delay to wait before the next step.
    pub async fn step(&mut self) -> Duration {
        match std::mem::replace(&mut self.state, PollState::Resolving) {
            PollState::Resolving => self.resolve().await,
            PollState::Polling { playlist_url } => self.poll(playlist_url).await,
        }
    }

    async fn resolve(&mut self) -> Duration {
        let channel = self.provider.channel();
        match self.provider.resolve_playlist().await {
            Ok(Some(playlist_url)) => {
                log::info!("[{}]Channel playlist found: {}", channel, playlist_url);
                self.state = PollState::Polling { playlist_url };
                Duration::ZERO
            }
            Ok(None) => {
                log::debug!("[{}]Channel playlist not available", channel);
                self.playlist_interval
            }
            Err(e) => {
                log::error!(
                    "[{}]An error occurred while fetching playlist url: {}",
                    channel,
                    e
                );
                self.playlist_interval
            }
        }
    }

    async fn poll(&mut self, playlist_url: String) -> Duration {
        let channel = self.provider.channel();
        match self.provider.fetch_stitched(&playlist_url).await {
            Ok(stitched) => {
                log::debug!("[{}]Fetched stitched: {:?}", channel, stitched);
                self.latest.set(stitched).await;
                self.state = PollState::Polling { playlist_url };
                self.poll_interval
            }
            Err(e) => {
                // state is already back to Resolving
                log::error!(
                    "[{}]An error occurred while fetching stitched: {}",
                    channel,
                    e
                );
                self.playlist_interval
            }
        }
    }

    pub async fn run(mut self) {
        log::info!("[{}]Start polling", self.provider.channel());
        loop {
            let delay = self.step().await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
