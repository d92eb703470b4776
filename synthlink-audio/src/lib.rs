pub mod device;
pub mod event_ring;
pub mod scheduler;

pub use device::{
    choose_output_config, host_count, list_output_devices, AudioOpenError, AudioOutput, DeviceSelector, OutputDeviceInfo,
};
pub use event_ring::{event_ring, EventConsumer, EventProducer, RingStats};
pub use scheduler::{BlockScheduler, SchedulerStats};

use synthlink_types::MidiEvent;

/// Default MIDI ring capacity (events).
pub const DEFAULT_MIDI_RING_CAPACITY: usize = 4096;

/// The audio-thread side of a synthesis engine, as driven by
/// [`BlockScheduler`]. Every method runs on the real-time thread and must not
/// block, lock or allocate.
pub trait BlockEngine: Send {
    /// Frames produced by one `synthesize_block` call
    fn block_size(&self) -> usize;

    /// Pick up externally queued control changes (e.g. OSC parameter
    /// updates). Called once before each block.
    fn poll_control(&mut self) {}

    fn apply_midi(&mut self, event: &MidiEvent);

    /// Render exactly `block_size` frames into the output buffers.
    fn synthesize_block(&mut self);

    /// Left and right output of the last rendered block.
    fn output(&self) -> (&[f32], &[f32]);

    fn set_sample_rate(&mut self, _sample_rate: f32) {}
}
