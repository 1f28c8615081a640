use std::collections::HashMap;

use tokio::sync::{broadcast::Sender, RwLock};

#[derive(Debug, Clone)]
pub enum RoomBroadcast {
    /// Room message encoded as json
    Data { sender_id: String, payload: Vec<u8> },
    CloseUser(String),
    CloseAll,
}

type Broadcast = Sender<RoomBroadcast>;
pub type RoomChannels = RwLock<HashMap<String, Broadcast>>;
