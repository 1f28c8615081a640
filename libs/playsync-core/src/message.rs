use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::{
    constants::{BROADCAST_TARGET, BROADCAST_TARGET_ALIAS},
    SyncResult,
};

/// Recipient of a position update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncTarget {
    All,
    Participant(String),
}

impl SyncTarget {
    pub fn addresses(&self, participant_id: &str) -> bool {
        match self {
            SyncTarget::All => true,
            SyncTarget::Participant(id) => id == participant_id,
        }
    }
}

impl From<String> for SyncTarget {
    fn from(id: String) -> Self {
        if id == BROADCAST_TARGET || id == BROADCAST_TARGET_ALIAS {
            SyncTarget::All
        } else {
            SyncTarget::Participant(id)
        }
    }
}

impl From<SyncTarget> for String {
    fn from(target: SyncTarget) -> Self {
        match target {
            SyncTarget::All => BROADCAST_TARGET.to_owned(),
            SyncTarget::Participant(id) => id,
        }
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = f64::deserialize(deserializer)?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(D::Error::custom(format!("invalid playback position: {seconds}")));
    }
    Ok(seconds.floor() as u64)
}

/// Messages exchanged over the room data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomMessage {
    UpdateVideoTime {
        id: SyncTarget,
        #[serde(deserialize_with = "deserialize_seconds")]
        time: u64,
        #[serde(rename = "mediaId", default, skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
    },
    VideoPlay {
        #[serde(rename = "mediaId", default, skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
    },
    VideoPause {
        #[serde(rename = "mediaId", default, skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
    },
    UserJoined,
}

impl RoomMessage {
    /// Position update with the position floored to whole seconds.
    pub fn position_update(target: SyncTarget, position: f64, media_id: Option<String>) -> Self {
        RoomMessage::UpdateVideoTime {
            id: target,
            time: position.max(0.0).floor() as u64,
            media_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RoomMessage::UpdateVideoTime { .. } => "UpdateVideoTime",
            RoomMessage::VideoPlay { .. } => "VideoPlay",
            RoomMessage::VideoPause { .. } => "VideoPause",
            RoomMessage::UserJoined => "UserJoined",
        }
    }

    pub fn media_id(&self) -> Option<&str> {
        match self {
            RoomMessage::UpdateVideoTime { media_id, .. }
            | RoomMessage::VideoPlay { media_id }
            | RoomMessage::VideoPause { media_id } => media_id.as_deref(),
            RoomMessage::UserJoined => None,
        }
    }

    /// Messages without a media id concern every session of the receiver.
    pub fn concerns(&self, media_id: &str) -> bool {
        self.media_id().map_or(true, |id| id == media_id)
    }

    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> SyncResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// A decoded room message with the participant that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender_id: String,
    pub message: RoomMessage,
}

impl Envelope {
    pub fn new<S: AsRef<str>>(sender_id: S, message: RoomMessage) -> Self {
        Self {
            sender_id: sender_id.as_ref().to_owned(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_host_update_wire_shape() {
        let message = RoomMessage::position_update(SyncTarget::All, 42.6, None);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "type": "UpdateVideoTime", "id": "HOST", "time": 42 })
        );

        let message = RoomMessage::position_update(SyncTarget::Participant("p-2".into()), 7.9, Some("clip".into()));
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "type": "UpdateVideoTime", "id": "p-2", "time": 7, "mediaId": "clip" })
        );
    }

    #[test]
    fn test_decode_foreign_senders() {
        // fractional times from other clients are floored
        let message = RoomMessage::decode(br#"{"type":"UpdateVideoTime","id":"ALL","time":12.9}"#).unwrap();
        assert_eq!(
            message,
            RoomMessage::UpdateVideoTime {
                id: SyncTarget::All,
                time: 12,
                media_id: None
            }
        );

        assert_eq!(
            RoomMessage::decode(br#"{"type":"VideoPause"}"#).unwrap(),
            RoomMessage::VideoPause { media_id: None }
        );
        assert_eq!(
            RoomMessage::decode(br#"{"type":"UserJoined"}"#).unwrap(),
            RoomMessage::UserJoined
        );
    }

    #[test]
    fn test_reject_malformed() {
        assert!(RoomMessage::decode(br#"{"type":"UpdateVideoTime","id":"HOST","time":-3}"#).is_err());
        assert!(RoomMessage::decode(br#"{"type":"UpdateVideoTime","id":"HOST"}"#).is_err());
        assert!(RoomMessage::decode(br#"{"type":"Unknown"}"#).is_err());
        assert!(RoomMessage::decode(b"not json").is_err());
    }

    #[test]
    fn test_targets() {
        assert!(SyncTarget::All.addresses("anyone"));
        assert!(SyncTarget::Participant("a".into()).addresses("a"));
        assert!(!SyncTarget::Participant("a".into()).addresses("b"));

        let message = RoomMessage::VideoPlay {
            media_id: Some("clip".into()),
        };
        assert!(message.concerns("clip"));
        assert!(!message.concerns("other"));
        assert!(RoomMessage::UserJoined.concerns("other"));
    }
}
