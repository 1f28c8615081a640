use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use playsync_core::RoomMessage;
use tokio::sync::broadcast::{Receiver, Sender};

use super::*;

/// Room channel backed by the in-process broadcast of a room context.
#[derive(Debug)]
pub struct MemoryRoomChannel {
    room_id: String,
    participant_id: String,
    sender: Sender<RoomBroadcast>,
    // subscribed at join time so nothing sent after the join is missed
    joined: Mutex<Option<Receiver<RoomBroadcast>>>,
}

impl MemoryRoomChannel {
    pub fn new<R, P>(room_id: R, participant_id: P, sender: Sender<RoomBroadcast>) -> Self
    where
        R: AsRef<str>,
        P: AsRef<str>,
    {
        let joined = sender.subscribe();
        Self {
            room_id: room_id.as_ref().to_owned(),
            participant_id: participant_id.as_ref().to_owned(),
            sender,
            joined: Mutex::new(Some(joined)),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}

#[async_trait]
impl RoomChannel for MemoryRoomChannel {
    fn participant_id(&self) -> &str {
        &self.participant_id
    }

    async fn send_data(&self, message: &RoomMessage) -> RoomResult<()> {
        let payload = message.encode()?;
        trace!(
            "{} send {} to {}: {}bytes",
            self.participant_id,
            message.kind(),
            self.room_id,
            payload.len()
        );
        self.sender
            .send(RoomBroadcast::Data {
                sender_id: self.participant_id.clone(),
                payload,
            })
            .map(|_| ())
            .map_err(|_| RoomError::ChannelClosed)
    }

    fn on_data(&self) -> RoomSubscription {
        let rx = self
            .joined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.sender.subscribe());
        RoomSubscription::new(&self.participant_id, rx)
    }
}
