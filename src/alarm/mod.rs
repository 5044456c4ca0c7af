mod scheduler;

pub use scheduler::{
    next_occurrence, AlarmContext, AlarmPhase, AlarmScheduler, CHECK_INTERVAL_SECS,
};
