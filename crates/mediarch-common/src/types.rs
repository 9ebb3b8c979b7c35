//! Core type definitions shared across the enrichment pipeline.
//!
//! This module defines the closed enums used throughout mediarch: media kinds,
//! asset slots, job kinds, job priorities, and enrichment status. Keeping
//! these as closed sets (rather than free-form strings) is load-bearing: the
//! job queue, publisher, and asset selector all switch exhaustively over them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media a library holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Movies library.
    Movie,
    /// TV shows library (series/season/episode).
    Tv,
    /// Music library.
    Music,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Tv => write!(f, "tv"),
            Self::Music => write!(f, "music"),
        }
    }
}

/// Closed set of artwork/trailer slots an entity can have at most one
/// selected candidate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Poster,
    Fanart,
    Banner,
    Clearlogo,
    Clearart,
    Discart,
    Landscape,
    Thumb,
    Characterart,
    Keyart,
    Trailer,
}

impl AssetType {
    /// All asset types, for iteration during selection/publish.
    pub const ALL: [AssetType; 11] = [
        Self::Poster,
        Self::Fanart,
        Self::Banner,
        Self::Clearlogo,
        Self::Clearart,
        Self::Discart,
        Self::Landscape,
        Self::Thumb,
        Self::Characterart,
        Self::Keyart,
        Self::Trailer,
    ];

    /// Filename suffix used by the publisher's Kodi-compatible naming
    /// convention. The NFO sidecar is not an asset type and has no
    /// suffix of its own here.
    #[must_use]
    pub fn filename_suffix(self) -> &'static str {
        match self {
            Self::Poster => "-poster",
            Self::Fanart => "-fanart",
            Self::Banner => "-banner",
            Self::Clearlogo => "-clearlogo",
            Self::Clearart => "-clearart",
            Self::Discart => "-disc",
            Self::Landscape => "-landscape",
            Self::Thumb => "-thumb",
            Self::Characterart => "-characterart",
            Self::Keyart => "-keyart",
            Self::Trailer => "-trailer",
        }
    }

    /// Whether this slot holds a video rather than an image.
    #[must_use]
    pub fn is_video(self) -> bool {
        matches!(self, Self::Trailer)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poster => write!(f, "poster"),
            Self::Fanart => write!(f, "fanart"),
            Self::Banner => write!(f, "banner"),
            Self::Clearlogo => write!(f, "clearlogo"),
            Self::Clearart => write!(f, "clearart"),
            Self::Discart => write!(f, "discart"),
            Self::Landscape => write!(f, "landscape"),
            Self::Thumb => write!(f, "thumb"),
            Self::Characterart => write!(f, "characterart"),
            Self::Keyart => write!(f, "keyart"),
            Self::Trailer => write!(f, "trailer"),
        }
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poster" => Ok(Self::Poster),
            "fanart" => Ok(Self::Fanart),
            "banner" => Ok(Self::Banner),
            "clearlogo" => Ok(Self::Clearlogo),
            "clearart" => Ok(Self::Clearart),
            "discart" => Ok(Self::Discart),
            "landscape" => Ok(Self::Landscape),
            "thumb" => Ok(Self::Thumb),
            "characterart" => Ok(Self::Characterart),
            "keyart" => Ok(Self::Keyart),
            "trailer" => Ok(Self::Trailer),
            _ => Err(format!("unknown asset type: {s}")),
        }
    }
}

/// Closed set of job kinds the queue will ever hold. Handlers dispatch on
/// this exhaustively; there is no "other" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    FileScan,
    ProviderUpdate,
    Identify,
    Enrich,
    Publish,
    NotifyPlayer,
    WebhookReceived,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileScan => write!(f, "fileScan"),
            Self::ProviderUpdate => write!(f, "providerUpdate"),
            Self::Identify => write!(f, "identify"),
            Self::Enrich => write!(f, "enrich"),
            Self::Publish => write!(f, "publish"),
            Self::NotifyPlayer => write!(f, "notifyPlayer"),
            Self::WebhookReceived => write!(f, "webhookReceived"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fileScan" => Ok(Self::FileScan),
            "providerUpdate" => Ok(Self::ProviderUpdate),
            "identify" => Ok(Self::Identify),
            "enrich" => Ok(Self::Enrich),
            "publish" => Ok(Self::Publish),
            "notifyPlayer" => Ok(Self::NotifyPlayer),
            "webhookReceived" => Ok(Self::WebhookReceived),
            _ => Err(format!("unknown job kind: {s}")),
        }
    }
}

/// Job priority class. Lower numeric value is claimed first by `pickNext`.
/// The two named constants are the ones the fetch orchestrator keys its
/// per-call timeout/retry budget off of; arbitrary numeric
/// priorities between and beyond them are legal for queue ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPriority(pub i32);

impl JobPriority {
    /// Short timeout (10s), few retries (2) in the fetch orchestrator.
    pub const USER: JobPriority = JobPriority(0);
    /// Long timeout (60s), more retries (5) in the fetch orchestrator.
    pub const BACKGROUND: JobPriority = JobPriority(100);
    /// Manual trigger priority: above background, below interactive user jobs.
    pub const MANUAL: JobPriority = JobPriority(10);

    /// Whether this priority should use the `user` timeout/retry budget
    /// rather than the `background` one.
    #[must_use]
    pub fn is_interactive(self) -> bool {
        self.0 < Self::BACKGROUND.0
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an entity's enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Unidentified,
    Identified,
    Enriching,
    Enriched,
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unidentified => write!(f, "unidentified"),
            Self::Identified => write!(f, "identified"),
            Self::Enriching => write!(f, "enriching"),
            Self::Enriched => write!(f, "enriched"),
        }
    }
}

impl std::str::FromStr for EnrichmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unidentified" => Ok(Self::Unidentified),
            "identified" => Ok(Self::Identified),
            "enriching" => Ok(Self::Enriching),
            "enriched" => Ok(Self::Enriched),
            _ => Err(format!("unknown enrichment status: {s}")),
        }
    }
}

/// Authentication scheme a provider's HTTP surface expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    None,
    ApiKey,
    Bearer,
    Jwt,
}

/// Status of the last connection test run against a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Error,
    NeverTested,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::NeverTested => write!(f, "never_tested"),
        }
    }
}

impl std::str::FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "never_tested" => Ok(Self::NeverTested),
            _ => Err(format!("unknown test status: {s}")),
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ApiKey => write!(f, "api-key"),
            Self::Bearer => write!(f, "bearer"),
            Self::Jwt => write!(f, "jwt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_media_type_serialization() {
        let mt = MediaType::Movie;
        let json = serde_json::to_string(&mt).unwrap();
        assert_eq!(json, r#""movie""#);
    }

    #[test]
    fn test_asset_type_round_trips_through_str() {
        for at in AssetType::ALL {
            let s = at.to_string();
            let back = AssetType::from_str(&s).unwrap();
            assert_eq!(at, back);
        }
    }

    #[test]
    fn test_asset_type_filename_suffix() {
        assert_eq!(AssetType::Poster.filename_suffix(), "-poster");
        assert_eq!(AssetType::Discart.filename_suffix(), "-disc");
    }

    #[test]
    fn test_trailer_is_video_others_are_not() {
        assert!(AssetType::Trailer.is_video());
        assert!(!AssetType::Poster.is_video());
    }

    #[test]
    fn test_job_kind_display_matches_payload_key() {
        assert_eq!(JobKind::FileScan.to_string(), "fileScan");
        assert_eq!(JobKind::NotifyPlayer.to_string(), "notifyPlayer");
    }

    #[test]
    fn test_job_kind_round_trips() {
        for kind in [
            JobKind::FileScan,
            JobKind::ProviderUpdate,
            JobKind::Identify,
            JobKind::Enrich,
            JobKind::Publish,
            JobKind::NotifyPlayer,
            JobKind::WebhookReceived,
        ] {
            assert_eq!(JobKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn test_job_priority_ordering() {
        assert!(JobPriority::USER < JobPriority::MANUAL);
        assert!(JobPriority::MANUAL < JobPriority::BACKGROUND);
    }

    #[test]
    fn test_job_priority_is_interactive() {
        assert!(JobPriority::USER.is_interactive());
        assert!(!JobPriority::BACKGROUND.is_interactive());
    }

    #[test]
    fn test_test_status_round_trip() {
        for status in [TestStatus::Success, TestStatus::Error, TestStatus::NeverTested] {
            assert_eq!(TestStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn test_auth_scheme_display() {
        assert_eq!(AuthScheme::ApiKey.to_string(), "api-key");
    }

    #[test]
    fn test_enrichment_status_round_trip() {
        for status in [
            EnrichmentStatus::Unidentified,
            EnrichmentStatus::Identified,
            EnrichmentStatus::Enriching,
            EnrichmentStatus::Enriched,
        ] {
            assert_eq!(
                EnrichmentStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
    }
}
