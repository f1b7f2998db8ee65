pub mod driver;
pub mod geometry;
pub mod grid;
pub mod selection;
pub mod sync;
pub mod workflow;

pub use driver::LocalSession;
pub use sync::{ChannelMessage, RemoteOutcome, SnapshotOutcome, MAX_RESYNC_ATTEMPTS};
pub use workflow::{PendingPlacement, PlacementOutcome, Session};
