use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::audio::AlarmSound;

/// Serialize the alarm target as "HH:mm" wall-clock text.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&text, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettings {
    pub enabled: bool,
    /// Target wake-up time, local wall clock.
    #[serde(with = "hhmm")]
    pub target_time: NaiveTime,
    /// Minutes before the target during which light sleep triggers an early wake.
    pub window_minutes: u32,
    pub sound: AlarmSound,
    pub vibrate: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            target_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            window_minutes: 30,
            sound: AlarmSound::Gentle,
            vibrate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    alarm: AlarmSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn alarm(&self) -> AlarmSettings {
        self.data.read().unwrap().alarm.clone()
    }

    /// Every mutation is written through to disk immediately.
    pub fn update_alarm(&self, settings: AlarmSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.alarm = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl SettingsStore {
    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_read_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.alarm();
        assert!(!settings.enabled);
        assert_eq!(settings.window_minutes, 30);
        assert_eq!(settings.target_time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(settings.sound, AlarmSound::Gentle);
        assert!(settings.vibrate);
    }

    #[test]
    fn update_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.alarm();
        settings.enabled = true;
        settings.target_time = NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        settings.sound = AlarmSound::Ocean;
        store.update_alarm(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.alarm(), settings);
    }

    #[test]
    fn target_time_round_trips_as_hhmm() {
        let settings = AlarmSettings {
            target_time: NaiveTime::from_hms_opt(23, 45, 0).unwrap(),
            ..AlarmSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"23:45\""));
        let back: AlarmSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target_time, settings.target_time);
    }

    #[test]
    fn corrupt_settings_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.alarm(), AlarmSettings::default());
    }
}
