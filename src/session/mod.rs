mod controller;
mod state;

pub use controller::{SessionController, STALE_SESSION_HOURS};
pub use state::{TrackerState, TrackerStatus};
