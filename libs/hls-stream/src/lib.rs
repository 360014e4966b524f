pub mod daterange;
pub mod provider;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Serialize, Serializer};
use thiserror::Error;

// Re-export main types
pub use daterange::DateRange;
pub use provider::twitch::{AccessToken, TwitchEndpoints, TwitchProvider};
pub use provider::StitchProvider;

#[derive(Error, Debug)]
pub enum HlsStreamError {
    #[error("NetworkError: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("ProtocolError: unexpected status {status} from {url}")]
    ProtocolError {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("DataError: {0}")]
    DataError(String),
}

/// An ad break stitched into the live stream by the platform.
///
/// Only non-preroll breaks are ever represented; `roll_type` is uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StitchedAd {
    #[serde(serialize_with = "serialize_rfc3339")]
    pub start_date: DateTime<FixedOffset>,
    pub roll_type: String,
    /// Ad pod length in seconds
    pub pod_length: u32,
}

/// RFC3339 with `Z` for a zero offset and sub-second digits only when present
fn serialize_rfc3339<S>(date: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
