use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    midi: MidiConfig,
    #[serde(default)]
    osc: OscConfig,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    sample_rate: Option<u32>,
    buffer_size: Option<u32>,
}

#[derive(Deserialize, Default)]
struct MidiConfig {
    ring_capacity: Option<usize>,
}

#[derive(Deserialize, Default)]
struct OscConfig {
    param_queue_capacity: Option<usize>,
    out_host: Option<String>,
}

/// Runtime configuration: embedded defaults merged with an optional user file.
pub struct Config {
    audio: AudioConfig,
    midi: MidiConfig,
    osc: OscConfig,
}

impl Config {
    pub fn load() -> Self {
        let user = user_config_path()
            .filter(|path| path.exists())
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(contents) => Some((path, contents)),
                Err(e) => {
                    log::warn!(target: "config", "could not read config {}: {}", path.display(), e);
                    None
                }
            });
        match user {
            Some((path, contents)) => Self::from_user_toml(&contents, &path.display().to_string()),
            None => Self::from_user_toml("", "<none>"),
        }
    }

    /// Merge a user TOML document over the embedded defaults. Malformed input
    /// is logged and ignored.
    pub fn from_user_toml(contents: &str, origin: &str) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });

        match toml::from_str::<ConfigFile>(contents) {
            Ok(user) => merge(&mut base, user),
            Err(e) => log::warn!(target: "config", "ignoring malformed config {}: {}", origin, e),
        }

        Config {
            audio: base.audio,
            midi: base.midi,
            osc: base.osc,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate.unwrap_or(48_000)
    }

    pub fn buffer_size(&self) -> u32 {
        self.audio.buffer_size.unwrap_or(256).clamp(16, 8192)
    }

    pub fn midi_ring_capacity(&self) -> usize {
        self.midi
            .ring_capacity
            .unwrap_or(synthlink_audio::DEFAULT_MIDI_RING_CAPACITY)
            .clamp(16, 1 << 20)
    }

    pub fn param_queue_capacity(&self) -> usize {
        self.osc.param_queue_capacity.unwrap_or(1024).clamp(16, 1 << 20)
    }

    pub fn osc_out_host(&self) -> &str {
        self.osc.out_host.as_deref().unwrap_or("127.0.0.1")
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("synthlink").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.audio.sample_rate.is_some() {
        base.audio.sample_rate = user.audio.sample_rate;
    }
    if user.audio.buffer_size.is_some() {
        base.audio.buffer_size = user.audio.buffer_size;
    }
    if user.midi.ring_capacity.is_some() {
        base.midi.ring_capacity = user.midi.ring_capacity;
    }
    if user.osc.param_queue_capacity.is_some() {
        base.osc.param_queue_capacity = user.osc.param_queue_capacity;
    }
    if user.osc.out_host.is_some() {
        base.osc.out_host = user.osc.out_host;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_user_toml("", "test");
        assert_eq!(config.sample_rate(), 48_000);
        assert_eq!(config.buffer_size(), 256);
        assert_eq!(config.midi_ring_capacity(), 4096);
        assert_eq!(config.param_queue_capacity(), 1024);
        assert_eq!(config.osc_out_host(), "127.0.0.1");
    }

    #[test]
    fn test_user_override_merges() {
        let config = Config::from_user_toml(
            "[audio]\nsample_rate = 44100\n[osc]\nout_host = \"192.168.1.20\"\n",
            "test",
        );
        assert_eq!(config.sample_rate(), 44_100);
        assert_eq!(config.buffer_size(), 256);
        assert_eq!(config.osc_out_host(), "192.168.1.20");
    }

    #[test]
    fn test_malformed_user_config_ignored() {
        let config = Config::from_user_toml("[audio\nsample_rate = ", "test");
        assert_eq!(config.sample_rate(), 48_000);
    }
}
