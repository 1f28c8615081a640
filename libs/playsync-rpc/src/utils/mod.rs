mod room_context;

use super::*;

pub use room_context::MinimumRoomContext;
