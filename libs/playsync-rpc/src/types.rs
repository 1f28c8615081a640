use playsync_core::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room channel has no listener")]
    ChannelClosed,
    #[error("sync engine stopped")]
    EngineStopped,
    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type RoomResult<T> = Result<T, RoomError>;
