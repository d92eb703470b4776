//! Audio block scheduler: runs inside the device callback.
//!
//! The engine renders fixed-size blocks; the device asks for arbitrary frame
//! counts. Per output frame the scheduler either copies the next sample pair
//! out of the last rendered block, or (at a block boundary) polls control
//! input, drains the MIDI ring into the engine and renders the next block.
//! MIDI therefore only ever mutates engine state between blocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use synthlink_types::MidiEvent;

use crate::event_ring::{EventConsumer, RingStats};
use crate::BlockEngine;

pub struct BlockScheduler<E> {
    engine: E,
    midi: EventConsumer<MidiEvent>,
    /// Read position inside the current block. Starts past the end so the
    /// first frame renders.
    pos: usize,
    blocks_rendered: u64,
    shared_blocks: Arc<AtomicU64>,
}

/// Counters of a scheduler that has moved into the device callback.
#[derive(Clone)]
pub struct SchedulerStats {
    blocks_rendered: Arc<AtomicU64>,
    midi: RingStats,
}

impl SchedulerStats {
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered.load(Ordering::Relaxed)
    }

    pub fn midi_dropped(&self) -> u64 {
        self.midi.dropped()
    }
}

impl<E: BlockEngine> BlockScheduler<E> {
    pub fn new(engine: E, midi: EventConsumer<MidiEvent>) -> Self {
        let pos = engine.block_size();
        Self {
            engine,
            midi,
            pos,
            blocks_rendered: 0,
            shared_blocks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fill an interleaved output buffer. Channel 0 gets the left output,
    /// channel 1 the right, any further channels are silenced. A mono
    /// device receives the left output only.
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 || output.is_empty() || self.engine.block_size() == 0 {
            return;
        }

        for frame in output.chunks_mut(channels) {
            if self.pos >= self.engine.block_size() {
                self.render_block();
            }
            let (left, right) = self.engine.output();
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = match ch {
                    0 => left[self.pos],
                    1 => right[self.pos],
                    _ => 0.0,
                };
            }
            self.pos += 1;
        }
    }

    fn render_block(&mut self) {
        self.engine.poll_control();
        let engine = &mut self.engine;
        self.midi.drain(|event| engine.apply_midi(&event));
        self.engine.synthesize_block();
        self.blocks_rendered += 1;
        self.shared_blocks.store(self.blocks_rendered, Ordering::Relaxed);
        self.pos = 0;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.engine.set_sample_rate(sample_rate);
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered
    }

    /// MIDI events lost to ring overflow so far.
    pub fn midi_dropped(&self) -> u64 {
        self.midi.dropped()
    }

    /// Take this before handing the scheduler to [`crate::AudioOutput::open`].
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            blocks_rendered: Arc::clone(&self.shared_blocks),
            midi: self.midi.stats(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
