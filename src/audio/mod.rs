pub mod birds;
pub mod chimes;
pub mod classic;
pub mod gentle;
pub mod ocean;
pub mod piano;

use birds::Birds;
use chimes::Chimes;
use classic::ClassicBeep;
use gentle::GentleScale;
use ocean::Ocean;
use piano::PianoArpeggio;

use rodio::{OutputStream, Sink};
use serde::{Deserialize, Serialize};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Shared sample rate for all generators.
pub const SAMPLE_RATE: u32 = 44_100;

/// Preview playback length.
pub const PREVIEW_MS: u64 = 3_000;

/// One full-alarm playback pass; the caller re-invokes while unacknowledged.
pub const ALARM_MS: u64 = 60_000;

/// The six procedurally generated alarm sounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlarmSound {
    Gentle,
    Classic,
    Chimes,
    Birds,
    Ocean,
    Piano,
}

impl AlarmSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSound::Gentle => "Gentle",
            AlarmSound::Classic => "Classic",
            AlarmSound::Chimes => "Chimes",
            AlarmSound::Birds => "Birds",
            AlarmSound::Ocean => "Ocean",
            AlarmSound::Piano => "Piano",
        }
    }
}

enum AudioCommand {
    Play { sound: AlarmSound, duration_ms: u64 },
    Stop,
    SetVolume(f32),
}

/// Handle to the synthesis engine. All rodio objects live on a dedicated
/// thread because they are not `Send`; the handle only moves commands.
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        // Spawn dedicated audio thread holding non-Send audio objects
        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                fn append_generator(sink: &Sink, sound: AlarmSound, duration_ms: u64) {
                    match sound {
                        AlarmSound::Gentle => sink.append(GentleScale::new(duration_ms)),
                        AlarmSound::Classic => sink.append(ClassicBeep::new(duration_ms)),
                        AlarmSound::Chimes => sink.append(Chimes::new(duration_ms)),
                        AlarmSound::Birds => sink.append(Birds::new(duration_ms)),
                        AlarmSound::Ocean => sink.append(Ocean::new(duration_ms)),
                        AlarmSound::Piano => sink.append(PianoArpeggio::new(duration_ms)),
                    }
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play { sound, duration_ms } => {
                            // Replace whatever is currently playing
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                            match ensure_sink(&mut _stream, &mut sink) {
                                Ok(()) => {
                                    if let Some(ref s) = sink {
                                        append_generator(s, sound, duration_ms);
                                    }
                                }
                                Err(err) => {
                                    log::error!("audio output unavailable: {err}");
                                }
                            }
                        }
                        AudioCommand::Stop => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                        }
                        AudioCommand::SetVolume(v) => {
                            if let Some(ref s) = sink {
                                s.set_volume(v.clamp(0.0, 1.0));
                            }
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    /// Short preview of one alarm sound.
    pub fn preview(&self, sound: AlarmSound) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play {
            sound,
            duration_ms: PREVIEW_MS,
        })
        .map_err(|e| e.to_string())
    }

    /// One full-alarm pass; callers loop this while the alarm is unacknowledged.
    pub fn play_alarm(&self, sound: AlarmSound) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play {
            sound,
            duration_ms: ALARM_MS,
        })
        .map_err(|e| e.to_string())
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::SetVolume(volume))
            .map_err(|e| e.to_string())
    }

    /// Silence and release whatever is playing. No-op when idle.
    pub fn stop(&self) -> Result<(), String> {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent_when_idle() {
        let handle = AudioEngineHandle::new();
        assert!(handle.stop().is_ok());
        assert!(handle.stop().is_ok());
    }
}
