use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::*;

/// Rooms held in process memory.
pub struct MinimumRoomContext {
    channel: RoomChannels,
    capacity: usize,
}

impl MinimumRoomContext {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(playsync_core::constants::DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channel: RwLock::new(HashMap::new()),
            capacity,
        })
    }
}

impl RoomContextImpl for MinimumRoomContext {
    fn get_channel(&self) -> &RoomChannels {
        &self.channel
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
