mod broadcast;
mod channel;
mod connector;
mod context;
mod engine;
mod handler;
mod types;
mod utils;

pub use broadcast::{RoomBroadcast, RoomChannels};
pub use channel::{RoomChannel, RoomSubscription};
pub use connector::MemoryRoomChannel;
pub use context::RoomContextImpl;
pub use engine::SyncEngine;
pub use handler::{handle_session, SessionCommand};
pub use types::{RoomError, RoomResult};
pub use utils::MinimumRoomContext;

use playsync_core::{debug, error, info, trace, warn};
