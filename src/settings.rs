//! Player preferences, save data and mixer volumes.
//!
//! These are plain resources with explicit load/save lifecycles. Nothing
//! here is global: insert a loaded [`Preferences`] or [`SaveSlot`] before
//! adding [`SettingsPlugin`] to use files on disk, or keep the in-memory
//! defaults in tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading or writing persisted data.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode data: {0}")]
    Encode(#[from] ron::Error),

    #[error("failed to decode data: {0}")]
    Decode(#[from] ron::error::SpannedError),
}

fn read_ron<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(Some(ron::from_str(&source)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn write_ron<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let source = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())?;
    fs::write(path, source)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum PreferenceValue {
    Float(f32),
    Bool(bool),
}

/// Keyed float and bool preferences.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    path: Option<PathBuf>,
    values: BTreeMap<String, PreferenceValue>,
}

impl Preferences {
    /// Preferences that are never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load preferences from `path`. A missing file yields empty preferences
    /// that will be saved to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let values = read_ron(&path)?.unwrap_or_default();
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    /// Write every value to the backing file, if any.
    pub fn save(&self) -> Result<(), PersistenceError> {
        match &self.path {
            Some(path) => write_ron(path, &self.values),
            None => Ok(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Float stored under `key`, or `None` (with a warning) if there is none.
    pub fn try_get_float(&self, key: &str) -> Option<f32> {
        match self.values.get(key) {
            Some(PreferenceValue::Float(value)) => Some(*value),
            _ => {
                warn!("no preference key \"{key}\" found");
                None
            }
        }
    }

    /// Float stored under `key`. Missing keys read as zero.
    pub fn get_float(&self, key: &str) -> f32 {
        self.try_get_float(key).unwrap_or(0.0)
    }

    /// Store a float and save immediately.
    pub fn set_float(&mut self, key: impl Into<String>, value: f32) -> Result<(), PersistenceError> {
        self.values.insert(key.into(), PreferenceValue::Float(value));
        self.save()
    }

    /// Bool stored under `key`. Missing keys read as `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(PreferenceValue::Bool(true)))
    }

    /// Store a bool. Call [`save`](Self::save) to persist it.
    pub fn set_bool(&mut self, key: impl Into<String>, state: bool) {
        self.values.insert(key.into(), PreferenceValue::Bool(state));
    }

    /// Erase every stored value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// A single save file holding one serialized blob.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct SaveSlot {
    path: PathBuf,
}

impl SaveSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Serialize `data` to the slot, replacing its contents.
    pub fn save<T: Serialize>(&self, data: &T) -> Result<(), PersistenceError> {
        write_ron(&self.path, data)?;
        debug!("saved game data to {}", self.path.display());
        Ok(())
    }

    /// Read the slot. An empty slot is `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, PersistenceError> {
        read_ron(&self.path)
    }

    /// Remove the save file. Deleting an empty slot succeeds.
    pub fn delete(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Mixer channel.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeChannel {
    Master,
    Music,
    Effects,
    Ui,
}

impl VolumeChannel {
    pub const ALL: [VolumeChannel; 4] = [
        VolumeChannel::Master,
        VolumeChannel::Music,
        VolumeChannel::Effects,
        VolumeChannel::Ui,
    ];

    /// Preference and mixer parameter key.
    pub fn key(self) -> &'static str {
        match self {
            VolumeChannel::Master => "masterVolume",
            VolumeChannel::Music => "musicVolume",
            VolumeChannel::Effects => "effectsVolume",
            VolumeChannel::Ui => "uiVolume",
        }
    }
}

/// Quietest level sent to the mixer.
pub const SILENCE_DB: f32 = -80.0;

/// Linear volume in `[0, 1]` to mixer decibels.
pub fn volume_to_decibels(volume: f32) -> f32 {
    if volume <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * volume.log10()).max(SILENCE_DB)
    }
}

/// Published whenever a channel volume changes.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct MixerVolumeChanged {
    pub key: &'static str,
    pub decibels: f32,
}

/// Request to change a channel volume.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct SetVolume {
    pub channel: VolumeChannel,
    pub volume: f32,
}

/// Linear channel volumes.
#[derive(Resource, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Resource)]
pub struct AudioVolumes {
    pub master: f32,
    pub music: f32,
    pub effects: f32,
    pub ui: f32,
}

impl Default for AudioVolumes {
    fn default() -> Self {
        Self {
            master: 1.0,
            music: 1.0,
            effects: 1.0,
            ui: 1.0,
        }
    }
}

impl AudioVolumes {
    /// Volumes saved in `preferences`. Missing channels are at full volume.
    pub fn restore_from(preferences: &Preferences) -> Self {
        let mut volumes = Self::default();
        for channel in VolumeChannel::ALL {
            if let Some(volume) = preferences.try_get_float(channel.key()) {
                volumes.set(channel, volume);
            }
        }
        volumes
    }

    pub fn volume(&self, channel: VolumeChannel) -> f32 {
        match channel {
            VolumeChannel::Master => self.master,
            VolumeChannel::Music => self.music,
            VolumeChannel::Effects => self.effects,
            VolumeChannel::Ui => self.ui,
        }
    }

    /// Set a channel, clamped to `[0, 1]`, and return the mixer update.
    pub fn set(&mut self, channel: VolumeChannel, volume: f32) -> MixerVolumeChanged {
        let clamped = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        if clamped != volume {
            warn!("{} {volume} out of range, using {clamped}", channel.key());
        }
        let slot = match channel {
            VolumeChannel::Master => &mut self.master,
            VolumeChannel::Music => &mut self.music,
            VolumeChannel::Effects => &mut self.effects,
            VolumeChannel::Ui => &mut self.ui,
        };
        *slot = clamped;
        self.mixer_update(channel)
    }

    /// Set a channel and persist it to `preferences`.
    pub fn set_and_persist(
        &mut self,
        channel: VolumeChannel,
        volume: f32,
        preferences: &mut Preferences,
    ) -> Result<MixerVolumeChanged, PersistenceError> {
        let update = self.set(channel, volume);
        preferences.set_float(channel.key(), self.volume(channel))?;
        Ok(update)
    }

    /// Mixer update for the current value of a channel.
    pub fn mixer_update(&self, channel: VolumeChannel) -> MixerVolumeChanged {
        MixerVolumeChanged {
            key: channel.key(),
            decibels: volume_to_decibels(self.volume(channel)),
        }
    }
}

/// Load saved volumes and push every channel to the mixer.
pub fn restore_volumes(
    preferences: Res<Preferences>,
    mut volumes: ResMut<AudioVolumes>,
    mut mixer: EventWriter<MixerVolumeChanged>,
) {
    *volumes = AudioVolumes::restore_from(&preferences);
    for channel in VolumeChannel::ALL {
        mixer.write(volumes.mixer_update(channel));
    }
}

/// Apply [`SetVolume`] requests.
pub fn apply_volume_requests(
    mut requests: EventReader<SetVolume>,
    mut volumes: ResMut<AudioVolumes>,
    mut preferences: ResMut<Preferences>,
    mut mixer: EventWriter<MixerVolumeChanged>,
) {
    for request in requests.read() {
        match volumes.set_and_persist(request.channel, request.volume, &mut preferences) {
            Ok(update) => {
                mixer.write(update);
            }
            Err(err) => {
                error!("failed to persist {}: {err}", request.channel.key());
                mixer.write(volumes.mixer_update(request.channel));
            }
        }
    }
}

/// Registers preferences, volumes and their systems.
///
/// Uses in-memory preferences unless a [`Preferences`] resource was inserted
/// beforehand.
pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<AudioVolumes>();
        app.init_resource::<Preferences>();
        app.init_resource::<AudioVolumes>();
        app.add_event::<SetVolume>();
        app.add_event::<MixerVolumeChanged>();
        app.add_systems(Startup, restore_volumes);
        app.add_systems(Update, apply_volume_requests);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn missing_float_reads_zero() {
        let preferences = Preferences::in_memory();
        assert_eq!(preferences.get_float("masterVolume"), 0.0);
        assert_eq!(preferences.try_get_float("masterVolume"), None);
    }

    #[test]
    fn bools_and_floats_share_keys() {
        let mut preferences = Preferences::in_memory();
        preferences.set_bool("subtitles", true);
        assert!(preferences.get_bool("subtitles"));
        assert!(preferences.has_key("subtitles"));
        assert_eq!(preferences.try_get_float("subtitles"), None);

        preferences.clear();
        assert!(!preferences.has_key("subtitles"));
        assert!(!preferences.get_bool("subtitles"));
    }

    #[test]
    fn set_float_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.ron");

        let mut preferences = Preferences::load(&path).unwrap();
        preferences.set_float("musicVolume", 0.25).unwrap();

        let reloaded = Preferences::load(&path).unwrap();
        assert_eq!(reloaded.get_float("musicVolume"), 0.25);
    }

    #[test]
    fn corrupt_preferences_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.ron");
        fs::write(&path, "{ not ron").unwrap();

        assert!(matches!(Preferences::load(&path), Err(PersistenceError::Decode(_))));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct GameData {
        level: u32,
        doors_opened: Vec<String>,
    }

    #[test]
    fn save_slot_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SaveSlot::new(dir.path().join("saves").join("data.ron"));

        assert_eq!(slot.load::<GameData>().unwrap(), None);

        let data = GameData {
            level: 3,
            doors_opened: vec!["cellar".into()],
        };
        slot.save(&data).unwrap();
        assert!(slot.exists());
        assert_eq!(slot.load::<GameData>().unwrap(), Some(data));

        slot.delete().unwrap();
        assert!(!slot.exists());
        slot.delete().unwrap();
    }

    #[test]
    fn decibel_conversion() {
        assert_relative_eq!(volume_to_decibels(1.0), 0.0);
        assert_relative_eq!(volume_to_decibels(0.1), -20.0, epsilon = 1e-4);
        assert_eq!(volume_to_decibels(0.0), SILENCE_DB);
        assert_eq!(volume_to_decibels(1e-9), SILENCE_DB);
    }

    #[test]
    fn volume_is_clamped() {
        let mut volumes = AudioVolumes::default();
        volumes.set(VolumeChannel::Effects, 1.5);
        assert_eq!(volumes.effects, 1.0);
        let update = volumes.set(VolumeChannel::Ui, -0.5);
        assert_eq!(volumes.ui, 0.0);
        assert_eq!(update.key, "uiVolume");
        assert_eq!(update.decibels, SILENCE_DB);
    }

    #[test]
    fn restore_defaults_missing_channels_to_full() {
        let mut preferences = Preferences::in_memory();
        preferences.set_float("musicVolume", 0.5).unwrap();

        let volumes = AudioVolumes::restore_from(&preferences);

        assert_eq!(volumes.music, 0.5);
        assert_eq!(volumes.master, 1.0);
        assert_eq!(volumes.effects, 1.0);
        assert_eq!(volumes.ui, 1.0);
    }

    #[test]
    fn restore_ignores_non_float_volume() {
        let mut preferences = Preferences::in_memory();
        preferences.set_bool("effectsVolume", false);

        let volumes = AudioVolumes::restore_from(&preferences);

        assert_eq!(volumes.effects, 1.0);
    }

    #[test]
    fn set_volume_request_updates_mixer_and_preferences() {
        let mut app = App::new();
        app.add_plugins(SettingsPlugin);
        app.update();

        app.world_mut().send_event(SetVolume {
            channel: VolumeChannel::Master,
            volume: 0.1,
        });
        app.update();

        assert_eq!(app.world().resource::<AudioVolumes>().master, 0.1);
        assert_eq!(app.world().resource::<Preferences>().get_float("masterVolume"), 0.1);

        let events = app.world().resource::<Events<MixerVolumeChanged>>();
        let master: Vec<_> = events
            .iter_current_update_events()
            .filter(|e| e.key == "masterVolume")
            .collect();
        assert_eq!(master.len(), 1);
        assert_relative_eq!(master[0].decibels, -20.0, epsilon = 1e-4);
    }
}
