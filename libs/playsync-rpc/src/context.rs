use std::{collections::hash_map::Entry, sync::Arc};

use async_trait::async_trait;
use playsync_core::{constants::DEFAULT_CHANNEL_CAPACITY, RoomMessage};
use tokio::sync::broadcast::channel as broadcast;

use super::*;

/// Owner of the in-memory rooms, one broadcast channel per room id.
#[async_trait]
pub trait RoomContextImpl: Send + Sync {
    fn get_channel(&self) -> &RoomChannels;

    fn capacity(&self) -> usize {
        DEFAULT_CHANNEL_CAPACITY
    }

    /// Subscribes the participant, then announces it with `UserJoined`.
    async fn join_room(&self, room_id: &str, participant_id: &str) -> RoomResult<Arc<MemoryRoomChannel>> {
        let sender = match self.get_channel().write().await.entry(room_id.to_owned()) {
            Entry::Occupied(tx) => tx.get().clone(),
            Entry::Vacant(v) => {
                let (tx, _) = broadcast(self.capacity());
                v.insert(tx.clone());
                tx
            }
        };
        info!("{} join room {}", participant_id, room_id);

        let channel = Arc::new(MemoryRoomChannel::new(room_id, participant_id, sender));
        match channel.send_data(&RoomMessage::UserJoined).await {
            // the joining participant is the only listener
            Ok(()) | Err(RoomError::ChannelClosed) => {}
            Err(e) => return Err(e),
        }
        Ok(channel)
    }

    /// The room outlives its listeners, only `close_room` drops it.
    async fn leave_room(&self, room_id: &str, participant_id: &str) {
        let rooms = self.get_channel().read().await;
        let Some(tx) = rooms.get(room_id) else {
            return;
        };
        info!("{} leave room {}", participant_id, room_id);
        if tx.send(RoomBroadcast::CloseUser(participant_id.to_owned())).is_err() {
            debug!("room {} has no listener left", room_id);
        }
    }

    async fn close_room(&self, room_id: &str) {
        if let Some(tx) = self.get_channel().write().await.remove(room_id) {
            info!("close room {}", room_id);
            if tx.send(RoomBroadcast::CloseAll).is_err() {
                debug!("room {} had no listener", room_id);
            }
        }
    }

    async fn room_size(&self, room_id: &str) -> usize {
        self.get_channel()
            .read()
            .await
            .get(room_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}
