mod error;

pub use error::{SyncError, SyncResult};
