use rodio::Source;
use std::time::Duration;

use super::SAMPLE_RATE;

/// Square-wave beeper: 880 Hz with a 300 ms on / 300 ms off duty cycle.
const BEEP_HZ: f32 = 880.0;
const SLOT_MS: usize = 300;

pub struct ClassicBeep {
    position: usize,
    total_samples: usize,
    phase: f32,
}

impl ClassicBeep {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            position: 0,
            total_samples: duration_ms as usize * SAMPLE_RATE as usize / 1000,
            phase: 0.0,
        }
    }
}

impl Iterator for ClassicBeep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let slot_samples = SLOT_MS * SAMPLE_RATE as usize / 1000;
        let beep_on = (self.position / slot_samples) % 2 == 0;

        // Phase accumulator; avoids f32 precision loss over long positions
        self.phase += BEEP_HZ / SAMPLE_RATE as f32;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let value = if !beep_on {
            0.0
        } else if self.phase < 0.5 {
            1.0
        } else {
            -1.0
        };

        self.position += 1;
        Some(value * 0.15)
    }
}

impl Source for ClassicBeep {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_millis(
            (self.total_samples * 1000 / SAMPLE_RATE as usize) as u64,
        ))
    }
}
