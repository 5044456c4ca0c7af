use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

use super::SAMPLE_RATE;

/// Ascending C-major sequence, C4 through G4, 800 ms per note, repeated
/// until the requested duration is filled.
const NOTE_HZ: [f32; 5] = [261.63, 293.66, 329.63, 349.23, 392.00];
const NOTE_MS: usize = 800;

/// Edge fade per note to avoid clicks at note boundaries
const FADE_SAMPLES: usize = 441;

pub struct GentleScale {
    position: usize,
    total_samples: usize,
}

impl GentleScale {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            position: 0,
            total_samples: duration_ms as usize * SAMPLE_RATE as usize / 1000,
        }
    }
}

impl Iterator for GentleScale {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let note_samples = NOTE_MS * SAMPLE_RATE as usize / 1000;
        let cycle = self.position % (NOTE_HZ.len() * note_samples);
        let note_index = cycle / note_samples;
        let note_position = cycle % note_samples;

        let t = note_position as f32 / SAMPLE_RATE as f32;
        let tone = (TAU * NOTE_HZ[note_index] * t).sin();

        let fade_in = note_position as f32 / FADE_SAMPLES as f32;
        let fade_out = (note_samples - note_position) as f32 / FADE_SAMPLES as f32;
        let envelope = fade_in.min(fade_out).clamp(0.0, 1.0);

        self.position += 1;
        Some(tone * envelope * 0.2)
    }
}

impl Source for GentleScale {
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
