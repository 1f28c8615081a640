mod authority;
mod broadcaster;
mod camera;
mod config;
mod driver;
mod events;
mod message;
mod reconciler;
mod router;
mod session;
mod surface;
mod types;

pub mod constants;

pub use authority::{AuthorityResolver, DefaultPermissions, Permission, PermissionTable, Role};
pub use broadcaster::{PositionSample, SyncBroadcaster};
pub use camera::{CameraPosition, OrbitCamera};
pub use config::SyncConfig;
pub use driver::{SessionDriver, SourceConfig};
pub use events::{EngineEvent, EventBus};
pub use message::{Envelope, RoomMessage, SyncTarget};
pub use reconciler::{Correction, DriftReconciler};
pub use router::{Actor, ControlEvent, ControlEventRouter, Effect};
pub use session::{AuthoritativePosition, MediaCategory, MediaSession, MediaSource, Phase, SourceMeta};
pub use surface::{AutoplayPolicy, LoadStatus, PlaybackError, PlaybackSurface, SimulatedSurface};
pub use tracing::{debug, error, info, trace, warn};
pub use types::{SyncError, SyncResult};
