//! Audio output via cpal.
//!
//! Devices are addressed as `<host>.<device>` index pairs, the same numbering
//! `list_output_devices` prints.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize,
    SupportedStreamConfigRange,
};

use crate::{BlockEngine, BlockScheduler};

/// An output device discovered on the system
#[derive(Debug, Clone)]
pub struct OutputDeviceInfo {
    pub host_index: usize,
    pub device_index: usize,
    pub host_name: String,
    pub name: String,
}

/// `<host>.<device>` selector, e.g. `0.2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelector {
    pub host_index: usize,
    pub device_index: usize,
}

impl DeviceSelector {
    pub fn parse(text: &str) -> Result<Self, String> {
        let (host, device) = text
            .split_once('.')
            .ok_or_else(|| format!("Audio interface must be of the form a.b, got '{}'", text))?;
        let host_index = host
            .trim()
            .parse()
            .map_err(|_| format!("Invalid audio host index '{}'", host))?;
        let device_index = device
            .trim()
            .parse()
            .map_err(|_| format!("Invalid audio device index '{}'", device))?;
        Ok(Self {
            host_index,
            device_index,
        })
    }
}

/// Enumerate output devices across every available host API
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    let mut devices = Vec::new();
    for (host_index, host_id) in cpal::available_hosts().into_iter().enumerate() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!(target: "audio::device", "host {} unavailable: {}", host_id.name(), e);
                continue;
            }
        };
        let Ok(outputs) = host.output_devices() else {
            continue;
        };
        for (device_index, device) in outputs.enumerate() {
            devices.push(OutputDeviceInfo {
                host_index,
                device_index,
                host_name: host_id.name().to_string(),
                name: device.name().unwrap_or_else(|_| "Unknown".to_string()),
            });
        }
    }
    devices
}

/// Number of host APIs available, for range errors
pub fn host_count() -> usize {
    cpal::available_hosts().len()
}

fn resolve_device(selector: Option<DeviceSelector>) -> Result<Device, String> {
    let Some(sel) = selector else {
        log::info!(target: "audio::device", "Audio device is unspecified: using system default");
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| "No default output device available".to_string());
    };

    let hosts = cpal::available_hosts();
    let host_id = *hosts.get(sel.host_index).ok_or_else(|| {
        format!(
            "Audio host index must be in range 0...{}",
            hosts.len().saturating_sub(1)
        )
    })?;
    let host = cpal::host_from_id(host_id).map_err(|e| e.to_string())?;
    log::info!(target: "audio::device", "Audio driver type: [{}]", host_id.name());

    let devices: Vec<Device> = host
        .output_devices()
        .map_err(|e| format!("Failed to enumerate output devices: {}", e))?
        .collect();
    let count = devices.len();
    devices.into_iter().nth(sel.device_index).ok_or_else(|| {
        format!(
            "Audio device index must be in range 0...{}",
            count.saturating_sub(1)
        )
    })
}

fn in_range(range: &SupportedStreamConfigRange, rate: u32) -> bool {
    rate >= range.min_sample_rate().0 && rate <= range.max_sample_rate().0
}

/// Pick a stream configuration the device actually supports.
///
/// Candidates must produce `f32`. Stereo ranges containing the requested rate
/// win, then any range containing it, then the first stereo range. When the
/// rate is out of range the device default rate is used if the range allows
/// it, else the range maximum. A buffer size outside the supported range (or
/// an unknown range) falls back to the driver default.
pub fn choose_output_config(
    supported: &[SupportedStreamConfigRange],
    sample_rate: u32,
    buffer_size: u32,
    device_default_rate: Option<u32>,
) -> Result<StreamConfig, String> {
    let floats: Vec<&SupportedStreamConfigRange> = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let best = floats
        .iter()
        .find(|c| c.channels() >= 2 && in_range(c, sample_rate))
        .or_else(|| floats.iter().find(|c| in_range(c, sample_rate)))
        .or_else(|| floats.iter().find(|c| c.channels() >= 2))
        .or_else(|| floats.first())
        .ok_or_else(|| "Device has no f32 output configuration".to_string())?;

    let rate = if in_range(best, sample_rate) {
        sample_rate
    } else {
        let fallback = match device_default_rate {
            Some(rate) if in_range(best, rate) => rate,
            _ => best.max_sample_rate().0,
        };
        log::warn!(
            target: "audio::device",
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            sample_rate,
            fallback
        );
        fallback
    };

    let buffer = match best.buffer_size() {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&buffer_size) => {
            BufferSize::Fixed(buffer_size)
        }
        SupportedBufferSize::Range { min, max } => {
            log::warn!(
                target: "audio::device",
                "Buffer size {} outside supported range {}...{}, using driver default",
                buffer_size,
                min,
                max
            );
            BufferSize::Default
        }
        SupportedBufferSize::Unknown => {
            log::debug!(target: "audio::device", "Supported buffer sizes unknown, using driver default");
            BufferSize::Default
        }
    };

    Ok(StreamConfig {
        channels: best.channels(),
        sample_rate: SampleRate(rate),
        buffer_size: buffer,
    })
}

/// Why [`AudioOutput::open`] failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOpenError {
    /// The selected device could not be found or created
    Device(String),
    /// The device exists but refused the stream configuration
    Stream(String),
}

impl std::fmt::Display for AudioOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioOpenError::Device(msg) | AudioOpenError::Stream(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for AudioOpenError {}

/// A running (or paused) output stream driving a [`BlockScheduler`].
pub struct AudioOutput {
    stream: Stream,
    device_name: String,
    sample_rate: u32,
    /// `None` when the driver picks the buffer size
    buffer_size: Option<u32>,
}

impl AudioOutput {
    /// Open the selected device and hand the scheduler to its callback. The
    /// stream is created paused; call [`AudioOutput::start`].
    pub fn open<E: BlockEngine + 'static>(
        selector: Option<DeviceSelector>,
        sample_rate: u32,
        buffer_size: u32,
        mut scheduler: BlockScheduler<E>,
    ) -> Result<Self, AudioOpenError> {
        let device = resolve_device(selector).map_err(AudioOpenError::Device)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported: Vec<SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| AudioOpenError::Device(format!("Failed to get output config: {}", e)))?
            .collect();
        let default_rate = device.default_output_config().ok().map(|c| c.sample_rate().0);
        let config = choose_output_config(&supported, sample_rate, buffer_size, default_rate)
            .map_err(|e| AudioOpenError::Stream(format!("Unable to open audio device {}: {}", device_name, e)))?;

        let sample_rate = config.sample_rate.0;
        let buffer_size = match config.buffer_size {
            BufferSize::Fixed(frames) => Some(frames),
            BufferSize::Default => None,
        };
        scheduler.set_sample_rate(sample_rate as f32);
        let frame_channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    scheduler.process(data, frame_channels);
                },
                |err| {
                    log::error!(target: "audio::device", "Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioOpenError::Stream(format!("Unable to open audio device {}: {}", device_name, e)))?;

        log::info!(
            target: "audio::device",
            "Audio output: [{}] {} channels",
            device_name,
            config.channels
        );

        Ok(Self {
            stream,
            device_name,
            sample_rate,
            buffer_size,
        })
    }

    pub fn start(&self) -> Result<(), String> {
        log::info!(
            target: "audio::device",
            "Audio starting: SampleRate={} BufferSize={}",
            self.sample_rate,
            self.buffer_size
                .map_or_else(|| "default".to_string(), |frames| frames.to_string())
        );
        self.stream
            .play()
            .map_err(|e| format!("Failed to start audio stream: {}", e))
    }

    pub fn stop(&self) -> Result<(), String> {
        self.stream
            .pause()
            .map_err(|e| format!("Failed to stop audio stream: {}", e))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        assert_eq!(
            DeviceSelector::parse("0.2"),
            Ok(DeviceSelector {
                host_index: 0,
                device_index: 2
            })
        );
        assert_eq!(
            DeviceSelector::parse(" 1 . 0 "),
            Ok(DeviceSelector {
                host_index: 1,
                device_index: 0
            })
        );
    }

    #[test]
    fn test_parse_selector_rejects_malformed() {
        assert!(DeviceSelector::parse("3").is_err());
        assert!(DeviceSelector::parse("a.1").is_err());
        assert!(DeviceSelector::parse("1.").is_err());
        assert!(DeviceSelector::parse("-1.0").is_err());
    }

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Range { min: 64, max: 4096 },
            format,
        )
    }

    #[test]
    fn test_choose_config_prefers_stereo_f32_at_requested_rate() {
        let supported = [
            range(2, 44_100, 44_100, SampleFormat::F32),
            range(1, 8_000, 96_000, SampleFormat::F32),
            range(2, 8_000, 96_000, SampleFormat::I16),
            range(2, 8_000, 96_000, SampleFormat::F32),
        ];
        let config = choose_output_config(&supported, 48_000, 256, None).unwrap();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, SampleRate(48_000));
        assert_eq!(config.buffer_size, BufferSize::Fixed(256));
    }

    #[test]
    fn test_choose_config_falls_back_to_device_rate() {
        let supported = [range(2, 44_100, 44_100, SampleFormat::F32)];
        let config = choose_output_config(&supported, 48_000, 256, Some(44_100)).unwrap();
        assert_eq!(config.sample_rate, SampleRate(44_100));

        let supported = [range(2, 22_050, 32_000, SampleFormat::F32)];
        let config = choose_output_config(&supported, 48_000, 256, Some(44_100)).unwrap();
        assert_eq!(config.sample_rate, SampleRate(32_000));
    }

    #[test]
    fn test_choose_config_uses_default_buffer_when_unsupported() {
        let supported = [range(2, 8_000, 96_000, SampleFormat::F32)];
        let config = choose_output_config(&supported, 48_000, 16_384, None).unwrap();
        assert_eq!(config.buffer_size, BufferSize::Default);

        let unknown = [SupportedStreamConfigRange::new(
            2,
            SampleRate(8_000),
            SampleRate(96_000),
            SupportedBufferSize::Unknown,
            SampleFormat::F32,
        )];
        let config = choose_output_config(&unknown, 48_000, 256, None).unwrap();
        assert_eq!(config.buffer_size, BufferSize::Default);
    }

    #[test]
    fn test_choose_config_needs_f32() {
        let supported = [range(2, 8_000, 96_000, SampleFormat::I16)];
        assert!(choose_output_config(&supported, 48_000, 256, None).is_err());
        assert!(choose_output_config(&[], 48_000, 256, None).is_err());
    }
}
