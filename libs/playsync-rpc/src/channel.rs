use async_trait::async_trait;
use playsync_core::{Envelope, RoomMessage};
use tokio::sync::broadcast::{error::RecvError, Receiver};

use super::*;

/// Best-effort data channel shared by every participant of a room.
#[async_trait]
pub trait RoomChannel: Send + Sync {
    fn participant_id(&self) -> &str;

    async fn send_data(&self, message: &RoomMessage) -> RoomResult<()>;

    /// Dropping the subscription unsubscribes.
    fn on_data(&self) -> RoomSubscription;
}

/// Inbound side of a room channel for one participant. Own messages and
/// undecodable payloads are skipped.
#[derive(Debug)]
pub struct RoomSubscription {
    participant_id: String,
    rx: Option<Receiver<RoomBroadcast>>,
}

impl RoomSubscription {
    pub fn new<S: AsRef<str>>(participant_id: S, rx: Receiver<RoomBroadcast>) -> Self {
        Self {
            participant_id: participant_id.as_ref().to_owned(),
            rx: Some(rx),
        }
    }

    /// A subscription without a channel, it never yields a message.
    pub fn detached<S: AsRef<str>>(participant_id: S) -> Self {
        Self {
            participant_id: participant_id.as_ref().to_owned(),
            rx: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }

    /// Next message from another participant, `None` once the participant
    /// left or the room was closed. Cancel safe.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(RoomBroadcast::Data { sender_id, payload }) => {
                    if sender_id == self.participant_id {
                        continue;
                    }
                    match RoomMessage::decode(&payload) {
                        Ok(message) => return Some(Envelope::new(sender_id, message)),
                        Err(e) => debug!("drop message from {}: {}", sender_id, e),
                    }
                }
                Ok(RoomBroadcast::CloseUser(user)) if user == self.participant_id => {
                    debug!("{} left the room", user);
                    self.rx = None;
                }
                Ok(RoomBroadcast::CloseUser(_)) => {}
                Ok(RoomBroadcast::CloseAll) => {
                    debug!("room of {} closed", self.participant_id);
                    self.rx = None;
                }
                Err(RecvError::Lagged(count)) => {
                    warn!("{} missed {} room messages", self.participant_id, count)
                }
                Err(RecvError::Closed) => self.rx = None,
            }
        }
    }
}
