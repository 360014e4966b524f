use std::time::Duration;

use chrono::DateTime;
use m3u8_rs::{parse_playlist_res, Playlist};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::daterange::{split_manifest, DateRange};
use crate::{HlsStreamError, StitchProvider, StitchedAd};

const STITCHED_AD_CLASS: &str = "twitch-stitched-ad";
const ROLL_TYPE_ATTRIBUTE: &str = "X-TV-TWITCH-AD-ROLL-TYPE";
const POD_LENGTH_ATTRIBUTE: &str = "X-TV-TWITCH-AD-POD-LENGTH";
const PREROLL: &str = "PREROLL";

const PLAYBACK_ACCESS_TOKEN_QUERY: &str = "query PlaybackAccessToken($login: String!) { streamPlaybackAccessToken(channelName: $login, params: {platform: \"web\", playerBackend: \"mediaplayer\", playerType: \"site\"}) { value signature } }";

/// Base urls of the Twitch services, overridable for tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchEndpoints {
    pub gql_url: String,
    pub usher_url: String,
}

impl Default for TwitchEndpoints {
    fn default() -> Self {
        Self {
            gql_url: "https://gql.twitch.tv/gql".to_string(),
            usher_url: "https://usher.ttvnw.net".to_string(),
        }
    }
}

/// Ephemeral playback credential, valid for one resolution cycle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "value")]
    pub token: String,
    pub signature: String,
}

#[derive(Serialize)]
struct GqlRequest<'a> {
    query: &'static str,
    variables: GqlVariables<'a>,
}

#[derive(Serialize)]
struct GqlVariables<'a> {
    login: &'a str,
}

#[derive(Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlData {
    stream_playback_access_token: Option<AccessToken>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

pub struct TwitchProvider {
    channel: String,
    client_id: String,
    client: reqwest::Client,
    endpoints: TwitchEndpoints,
}

impl TwitchProvider {
    pub fn new(
        channel: &str,
        client_id: &str,
        timeout: Duration,
        endpoints: TwitchEndpoints,
    ) -> Result<Self, HlsStreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(HlsStreamError::NetworkError)?;

        Ok(Self {
            channel: channel.to_string(),
            client_id: client_id.to_string(),
            client,
            endpoints,
        })
    }

    pub async fn get_access_token(&self) -> Result<AccessToken, HlsStreamError> {
        let body = GqlRequest {
            query: PLAYBACK_ACCESS_TOKEN_QUERY,
            variables: GqlVariables {
                login: &self.channel,
            },
        };

        let response = self
            .client
            .post(&self.endpoints.gql_url)
            .header("Client-ID", &self.client_id)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HlsStreamError::ProtocolError {
                status: response.status(),
                url: self.endpoints.gql_url.clone(),
            });
        }

        let content = response.text().await?;
        let resp: GqlResponse = serde_json::from_str(&content).map_err(|e| {
            HlsStreamError::DataError(format!("Invalid access token response: {e}"))
        })?;

        if let Some(token) = resp.data.and_then(|data| data.stream_playback_access_token) {
            return Ok(token);
        }

        match resp.errors {
            Some(errors) if !errors.is_empty() => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                Err(HlsStreamError::DataError(format!(
                    "Access token request failed: {}",
                    messages.join("; ")
                )))
            }
            _ => Err(HlsStreamError::DataError(format!(
                "No playback access token for channel {}",
                self.channel
            ))),
        }
    }

    fn master_playlist_url(&self, token: &AccessToken) -> String {
        format!(
            "{}/api/channel/hls/{}.m3u8?token={}&sig={}",
            self.endpoints.usher_url.trim_end_matches('/'),
            urlencoding::encode(&self.channel),
            urlencoding::encode(&token.token),
            token.signature
        )
    }

    /// Resolve the first variant playlist of the channel's master playlist
    pub async fn fetch_playlist_url(
        &self,
        token: &AccessToken,
    ) -> Result<Option<String>, HlsStreamError> {
        let master_url = self.master_playlist_url(token);
        let response = self.client.get(&master_url).send().await?;

        if !response.status().is_success() {
            log::debug!(
                "[{}]Master playlist unavailable: {}",
                self.channel,
                response.status()
            );
            return Ok(None);
        }

        let content = response.bytes().await?;
        parse_master_playlist(&content, &master_url)
    }
}

#[async_trait::async_trait]
impl StitchProvider for TwitchProvider {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn resolve_playlist(&self) -> Result<Option<String>, HlsStreamError> {
        log::debug!("[{}]Fetching playlist url", self.channel);
        let token = self.get_access_token().await?;
        self.fetch_playlist_url(&token).await
    }

    async fn fetch_stitched(
        &self,
        playlist_url: &str,
    ) -> Result<Option<StitchedAd>, HlsStreamError> {
        log::debug!("[{}]Fetching stitched", self.channel);

        let response = self.client.get(playlist_url).send().await?;
        if !response.status().is_success() {
            return Err(HlsStreamError::ProtocolError {
                status: response.status(),
                url: playlist_url.to_string(),
            });
        }

        let content = response.text().await?;
        parse_stitched(&content)
    }
}

/// Pick the first variant of a master playlist, resolved against `base_url`
pub fn parse_master_playlist(
    content: &[u8],
    base_url: &str,
) -> Result<Option<String>, HlsStreamError> {
    match parse_playlist_res(content) {
        Ok(Playlist::MasterPlaylist(playlist)) => {
            let Some(variant) = playlist.variants.iter().find(|v| !v.is_i_frame) else {
                return Ok(None);
            };
            resolve_uri(base_url, &variant.uri).map(Some)
        }
        // m3u8-rs only detects a master playlist by its variant tags
        Ok(Playlist::MediaPlaylist(playlist)) if playlist.segments.is_empty() => Ok(None),
        Ok(Playlist::MediaPlaylist(_)) => Err(HlsStreamError::DataError(
            "Not a master playlist".to_string(),
        )),
        Err(e) => Err(HlsStreamError::DataError(format!(
            "M3U8 parse error: {}",
            e
        ))),
    }
}

fn resolve_uri(base_url: &str, uri: &str) -> Result<String, HlsStreamError> {
    Url::parse(base_url)
        .and_then(|base| base.join(uri))
        .map(String::from)
        .map_err(|e| HlsStreamError::DataError(format!("Invalid variant uri {uri}: {e}")))
}

/// Scan a media playlist for the first non-preroll stitched ad
pub fn parse_stitched(content: &str) -> Result<Option<StitchedAd>, HlsStreamError> {
    // date ranges are validated one by one below, so m3u8-rs only sees the rest
    let (ranges, rest) = split_manifest(content);
    match parse_playlist_res(rest.as_bytes()) {
        Ok(Playlist::MediaPlaylist(_)) => {}
        Ok(Playlist::MasterPlaylist(_)) => {
            return Err(HlsStreamError::DataError(
                "Not a media playlist".to_string(),
            ))
        }
        Err(e) => {
            return Err(HlsStreamError::DataError(format!(
                "M3U8 parse error: {}",
                e
            )))
        }
    }

    for range in &ranges {
        if let Some(stitched) = stitched_from_daterange(range)? {
            return Ok(Some(stitched));
        }
    }

    Ok(None)
}

fn stitched_from_daterange(range: &DateRange) -> Result<Option<StitchedAd>, HlsStreamError> {
    if range.class() != Some(STITCHED_AD_CLASS) {
        return Ok(None);
    }

    let roll_type = range
        .attribute(ROLL_TYPE_ATTRIBUTE)
        .unwrap_or_default()
        .to_uppercase();
    if roll_type == PREROLL {
        return Ok(None);
    }

    let pod_length = range
        .attribute(POD_LENGTH_ATTRIBUTE)
        .ok_or_else(|| HlsStreamError::DataError(format!("Missing {POD_LENGTH_ATTRIBUTE}")))?;
    let pod_length = pod_length.parse::<u32>().map_err(|e| {
        HlsStreamError::DataError(format!(
            "Invalid {POD_LENGTH_ATTRIBUTE} {pod_length:?}: {e}"
        ))
    })?;

    let start_date = range
        .start_date()
        .ok_or_else(|| HlsStreamError::DataError("Missing START-DATE".to_string()))?;
    let start_date = DateTime::parse_from_rfc3339(start_date).map_err(|e| {
        HlsStreamError::DataError(format!("Invalid START-DATE {start_date:?}: {e}"))
    })?;

    Ok(Some(StitchedAd {
        start_date,
        roll_type,
        pod_length,
    }))
}
