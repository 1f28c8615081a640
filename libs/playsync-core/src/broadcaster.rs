use std::time::Duration;

use crate::{EngineEvent, MediaCategory, PlaybackSurface, RoomMessage, SyncTarget};

/// Position read from a loaded surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub position: f64,
    pub remaining: f64,
}

/// Builds the authority's position reports. The timer itself lives with the
/// session task so it is cancelled with the rest of the session.
#[derive(Debug, Clone)]
pub struct SyncBroadcaster {
    media_id: String,
    category: MediaCategory,
    interval: Duration,
}

impl SyncBroadcaster {
    pub fn new<S: AsRef<str>>(media_id: S, category: MediaCategory, interval: Duration) -> Self {
        Self {
            media_id: media_id.as_ref().to_owned(),
            category,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `None` while the duration is unknown, so an unloaded surface never
    /// produces a report.
    pub fn sample<S: PlaybackSurface + ?Sized>(surface: &S) -> Option<PositionSample> {
        let duration = surface.duration().filter(|d| d.is_finite() && *d > 0.0)?;
        let position = surface.current_time();
        if !position.is_finite() {
            return None;
        }
        Some(PositionSample {
            position,
            remaining: (duration - position).max(0.0),
        })
    }

    pub fn periodic_update(&self, sample: PositionSample) -> RoomMessage {
        RoomMessage::position_update(SyncTarget::All, sample.position, Some(self.media_id.clone()))
    }

    pub fn targeted_update<S: AsRef<str>>(&self, participant_id: S, sample: PositionSample) -> RoomMessage {
        RoomMessage::position_update(
            SyncTarget::Participant(participant_id.as_ref().to_owned()),
            sample.position,
            Some(self.media_id.clone()),
        )
    }

    pub fn time_update(&self, sample: PositionSample) -> EngineEvent {
        EngineEvent::VideoTimeUpdate {
            id: self.media_id.clone(),
            category: self.category,
            time: sample.remaining.floor() as u64,
        }
    }
}
