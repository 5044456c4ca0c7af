use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

use super::SAMPLE_RATE;

/// Fixed arpeggio C4 E4 G4 C5 G4 E4 across 3 s, then repeats.
const NOTE_HZ: [f32; 6] = [261.63, 329.63, 392.00, 523.25, 392.00, 329.63];
const ARPEGGIO_MS: usize = 3_000;

pub struct PianoArpeggio {
    position: usize,
    total_samples: usize,
}

impl PianoArpeggio {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            position: 0,
            total_samples: duration_ms as usize * SAMPLE_RATE as usize / 1000,
        }
    }
}

impl Iterator for PianoArpeggio {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let note_samples = ARPEGGIO_MS * SAMPLE_RATE as usize / 1000 / NOTE_HZ.len();
        let cycle = self.position % (NOTE_HZ.len() * note_samples);
        let note_index = cycle / note_samples;
        let age = (cycle % note_samples) as f32 / SAMPLE_RATE as f32;

        let freq = NOTE_HZ[note_index];
        // Fundamental plus a soft octave overtone for a piano-ish attack
        let tone = (TAU * freq * age).sin() + 0.4 * (TAU * freq * 2.0 * age).sin();
        let envelope = (-6.0 * age).exp();

        self.position += 1;
        Some(tone * envelope * 0.25)
    }
}

impl Source for PianoArpeggio {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_length_matches_duration() {
        assert_eq!(
            PianoArpeggio::new(3_000).count(),
            3 * SAMPLE_RATE as usize
        );
    }

    #[test]
    fn notes_decay_within_their_slot() {
        let note_samples = ARPEGGIO_MS * SAMPLE_RATE as usize / 1000 / NOTE_HZ.len();
        let samples: Vec<f32> = PianoArpeggio::new(3_000).collect();

        let early_peak = samples[..note_samples / 8]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        let late_peak = samples[note_samples * 7 / 8..note_samples]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(early_peak > late_peak * 4.0);
    }

    #[test]
    fn arpeggio_repeats_after_three_seconds() {
        let samples: Vec<f32> = PianoArpeggio::new(6_000).collect();
        let cycle = 3 * SAMPLE_RATE as usize;
        for offset in [0usize, 1_000, 10_000] {
            assert!((samples[offset] - samples[cycle + offset]).abs() < 1e-5);
        }
    }
}
