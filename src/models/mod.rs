mod sample;
mod session;

pub use sample::SleepSample;
pub use session::{
    PhaseKind, PhasePartition, QualityLabel, SleepPhase, SleepSession, DEFAULT_QUALITY_SCORE,
};
