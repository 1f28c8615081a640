mod memory;

pub use memory::MemoryRoomChannel;

use super::*;
