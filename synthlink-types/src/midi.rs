/// One driver-reported MIDI message, stored raw.
///
/// Fixed-size and `Copy` so it can live by value inside a ring buffer slot.
/// Messages longer than three bytes (sysex) are not representable and are
/// rejected by [`MidiEvent::from_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Driver timestamp in microseconds (driver-specific epoch)
    pub timestamp_us: u64,
    bytes: [u8; 3],
    len: u8,
}

impl MidiEvent {
    /// Build an event from a raw driver message. Returns `None` for empty or
    /// oversized messages.
    pub fn from_bytes(timestamp_us: u64, data: &[u8]) -> Option<Self> {
        if data.is_empty() || data.len() > 3 {
            return None;
        }
        let mut bytes = [0u8; 3];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            timestamp_us,
            bytes,
            len: data.len() as u8,
        })
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            timestamp_us: 0,
            bytes: [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            len: 3,
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self {
            timestamp_us: 0,
            bytes: [0x80 | (channel & 0x0F), note & 0x7F, 0],
            len: 3,
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self {
            timestamp_us: 0,
            bytes: [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            len: 3,
        }
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Decode into a typed message. `None` for system messages and
    /// truncated channel messages.
    pub fn kind(&self) -> Option<MidiEventKind> {
        parse_midi_message(self.bytes())
    }
}

/// The specific type of a channel MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    PitchBend {
        channel: u8,
        /// Pitch bend value: -8192 (full down) to +8191 (full up), 0 = center
        value: i16,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    Aftertouch {
        channel: u8,
        pressure: u8,
    },
    PolyAftertouch {
        channel: u8,
        note: u8,
        pressure: u8,
    },
}

/// Parse a raw MIDI message into a MidiEventKind
pub fn parse_midi_message(data: &[u8]) -> Option<MidiEventKind> {
    let (&status, rest) = data.split_first()?;
    let channel = status & 0x0F;

    match (status & 0xF0, rest) {
        (0x80, [note, _, ..]) => Some(MidiEventKind::NoteOff {
            channel,
            note: *note,
        }),
        // Note On with velocity 0 is a Note Off
        (0x90, [note, 0, ..]) => Some(MidiEventKind::NoteOff {
            channel,
            note: *note,
        }),
        (0x90, [note, velocity, ..]) => Some(MidiEventKind::NoteOn {
            channel,
            note: *note,
            velocity: *velocity,
        }),
        (0xA0, [note, pressure, ..]) => Some(MidiEventKind::PolyAftertouch {
            channel,
            note: *note,
            pressure: *pressure,
        }),
        (0xB0, [controller, value, ..]) => Some(MidiEventKind::ControlChange {
            channel,
            controller: *controller,
            value: *value,
        }),
        (0xC0, [program, ..]) => Some(MidiEventKind::ProgramChange {
            channel,
            program: *program,
        }),
        (0xD0, [pressure, ..]) => Some(MidiEventKind::Aftertouch {
            channel,
            pressure: *pressure,
        }),
        (0xE0, [lsb, msb, ..]) => {
            let value = (((*msb as i16) << 7) | *lsb as i16) - 8192;
            Some(MidiEventKind::PitchBend { channel, value })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let data = [0x91, 60, 100];
        match parse_midi_message(&data).unwrap() {
            MidiEventKind::NoteOn {
                channel,
                note,
                velocity,
            } => {
                assert_eq!(channel, 1);
                assert_eq!(note, 60);
                assert_eq!(velocity, 100);
            }
            other => panic!("Expected NoteOn, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_note_on_velocity_zero() {
        let event = parse_midi_message(&[0x90, 60, 0]).unwrap();
        assert_eq!(event, MidiEventKind::NoteOff { channel: 0, note: 60 });
    }

    #[test]
    fn test_parse_pitch_bend() {
        let center = parse_midi_message(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(center, MidiEventKind::PitchBend { channel: 0, value: 0 });

        let up = parse_midi_message(&[0xE0, 0x7F, 0x7F]).unwrap();
        assert_eq!(up, MidiEventKind::PitchBend { channel: 0, value: 8191 });

        let down = parse_midi_message(&[0xE0, 0x00, 0x00]).unwrap();
        assert_eq!(down, MidiEventKind::PitchBend { channel: 0, value: -8192 });
    }

    #[test]
    fn test_parse_short_and_unknown_messages() {
        assert!(parse_midi_message(&[]).is_none());
        assert!(parse_midi_message(&[0x90, 60]).is_none());
        assert!(parse_midi_message(&[0xB0, 1]).is_none());
        assert!(parse_midi_message(&[0xF0, 0x01, 0x02]).is_none());
    }

    #[test]
    fn test_event_from_bytes() {
        let event = MidiEvent::from_bytes(1234, &[0xC2, 7]).unwrap();
        assert_eq!(event.bytes(), &[0xC2, 7]);
        assert_eq!(event.timestamp_us, 1234);
        assert_eq!(
            event.kind(),
            Some(MidiEventKind::ProgramChange {
                channel: 2,
                program: 7
            })
        );

        assert!(MidiEvent::from_bytes(0, &[]).is_none());
        assert!(MidiEvent::from_bytes(0, &[0xF0, 1, 2, 3, 0xF7]).is_none());
    }

    #[test]
    fn test_constructors_mask_channel() {
        let event = MidiEvent::note_on(17, 60, 100);
        assert_eq!(event.status(), 0x91);
        assert_eq!(MidiEvent::note_off(0, 60).kind(), Some(MidiEventKind::NoteOff { channel: 0, note: 60 }));
    }
}
