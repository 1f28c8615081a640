use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Kind of media source a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaCategory {
    /// Plain composited video, position sync only.
    Video,
    /// Equirectangular video rendered on a sphere.
    Video360,
    /// Video placed as an overlay with host playback controls.
    OverlayVideo,
}

impl MediaCategory {
    /// Whether play/pause controls (local or inbound) apply to this category.
    pub fn accepts_playback_controls(&self) -> bool {
        match self {
            MediaCategory::Video => false,
            MediaCategory::Video360 | MediaCategory::OverlayVideo => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Video => "video",
            MediaCategory::Video360 => "video360",
            MediaCategory::OverlayVideo => "overlayVideo",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Loading => write!(f, "loading"),
            Phase::Playing => write!(f, "playing"),
            Phase::Paused => write!(f, "paused"),
            Phase::Ended => write!(f, "ended"),
        }
    }
}

/// A playable url, classified before the load starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Direct(String),
    /// HLS style manifest, the surface picks native playback or a fallback player.
    AdaptiveManifest(String),
}

impl MediaSource {
    /// Returns `None` for a missing or blank url, the session then stays idle.
    pub fn resolve<S: AsRef<str>>(src: S) -> Option<Self> {
        let src = src.as_ref().trim();
        if src.is_empty() {
            None
        } else if src.contains("m3u8") {
            Some(MediaSource::AdaptiveManifest(src.to_owned()))
        } else {
            Some(MediaSource::Direct(src.to_owned()))
        }
    }

    pub fn url(&self) -> &str {
        match self {
            MediaSource::Direct(url) | MediaSource::AdaptiveManifest(url) => url,
        }
    }
}

/// Ownership claim carried in a source's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub time: f64,
    pub owner: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthoritativePosition {
    pub position: f64,
    pub observed_at: Instant,
}

/// Playback clock state of one media item on one participant.
#[derive(Debug, Clone)]
pub struct MediaSession {
    media_id: String,
    category: MediaCategory,
    phase: Phase,
    owner: Option<String>,
    authoritative: Option<AuthoritativePosition>,
    drift_tolerance: f64,
    looping: bool,
}

impl MediaSession {
    pub fn new<S: AsRef<str>>(media_id: S, category: MediaCategory, drift_tolerance: f64) -> Self {
        Self {
            media_id: media_id.as_ref().to_owned(),
            category,
            phase: Phase::Idle,
            owner: None,
            authoritative: None,
            drift_tolerance,
            looping: false,
        }
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn category(&self) -> MediaCategory {
        self.category
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn authoritative(&self) -> Option<AuthoritativePosition> {
        self.authoritative
    }

    pub fn drift_tolerance(&self) -> f64 {
        self.drift_tolerance
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Ended
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Only the router moves the phase. Leaving or entering `Playing` re-anchors
    /// the authoritative position so it stays frozen while not playing.
    pub(crate) fn transition(&mut self, phase: Phase, now: Instant) {
        if self.phase == Phase::Playing && phase != Phase::Playing {
            if let Some(position) = self.authoritative_position_at(now) {
                self.authoritative = Some(AuthoritativePosition {
                    position,
                    observed_at: now,
                });
            }
        } else if self.phase != Phase::Playing && phase == Phase::Playing {
            if let Some(authoritative) = self.authoritative.as_mut() {
                authoritative.observed_at = now;
            }
        }
        self.phase = phase;
    }

    /// Replace owner and position wholesale, last writer wins.
    pub(crate) fn record_authoritative<S: AsRef<str>>(&mut self, owner: S, position: f64, observed_at: Instant) {
        self.owner = Some(owner.as_ref().to_owned());
        self.authoritative = Some(AuthoritativePosition { position, observed_at });
    }

    /// A new source invalidates the position of the previous one.
    pub(crate) fn forget_position(&mut self) {
        self.authoritative = None;
    }

    /// Best estimate of the owner's position at `now`. Positions received
    /// before the media is ready are taken as they are, the owner may be paused.
    pub fn authoritative_position_at(&self, now: Instant) -> Option<f64> {
        let authoritative = self.authoritative?;
        match self.phase {
            Phase::Playing => Some(
                authoritative.position + now.saturating_duration_since(authoritative.observed_at).as_secs_f64(),
            ),
            Phase::Idle | Phase::Loading | Phase::Paused | Phase::Ended => Some(authoritative.position),
        }
    }
}
