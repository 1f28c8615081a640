use std::time::Duration;

/// Target id meaning "every participant" on the wire.
pub const BROADCAST_TARGET: &str = "HOST";
/// Alternative spelling of the broadcast target accepted on receive.
pub const BROADCAST_TARGET_ALIAS: &str = "ALL";

pub const DEFAULT_DRIFT_TOLERANCE_SECS: f64 = 1.5;
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(3);
pub const TIGHT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;
