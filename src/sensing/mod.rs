mod recorder;
mod source;

pub use recorder::{SampleBuffer, SampleRecorder, SAMPLE_INTERVAL_SECS};
pub use source::{MotionStream, SignalSource, SoundStream};
