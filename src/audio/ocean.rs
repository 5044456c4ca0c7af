use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

use super::SAMPLE_RATE;

/// Amplitude swell frequency that gives the wave effect
const SWELL_HZ: f32 = 0.3;

/// Filtered noise with a slow amplitude swell, approximating surf.
pub struct Ocean {
    position: usize,
    total_samples: usize,
    last_brown: f32,
    // 2nd order bandpass filter state
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
    rng: StdRng,
    swell_phase: f32,
}

impl Ocean {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            position: 0,
            total_samples: duration_ms as usize * SAMPLE_RATE as usize / 1000,
            last_brown: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            rng: StdRng::from_entropy(),
            swell_phase: 0.0,
        }
    }

    // Generate brown noise sample
    fn brown_noise_sample(&mut self) -> f32 {
        let white = self.rng.gen_range(-1.0..1.0);
        self.last_brown += white * 0.02;
        self.last_brown = self.last_brown.clamp(-1.0, 1.0);
        self.last_brown *= 0.9999;
        self.last_brown
    }

    // Resonant low-mid bandpass for the rumble of breaking water
    fn bandpass_filter(&mut self, input: f32) -> f32 {
        let b0 = 0.1;
        let b1 = 0.0;
        let b2 = -0.1;
        let a1 = -1.94;
        let a2 = 0.95;

        let output = b0 * input + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;

        // Update state
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

impl Iterator for Ocean {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let brown = self.brown_noise_sample();
        let filtered = self.bandpass_filter(brown);

        self.swell_phase += TAU * SWELL_HZ / SAMPLE_RATE as f32;
        if self.swell_phase > TAU {
            self.swell_phase -= TAU;
        }
        let swell = 0.55 + 0.45 * self.swell_phase.sin();

        // Mix filtered noise with slight unfiltered noise for texture
        let mix = filtered * 0.8 + brown * 0.2;

        self.position += 1;
        Some(mix * swell * 0.4)
    }
}

impl Source for Ocean {
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
