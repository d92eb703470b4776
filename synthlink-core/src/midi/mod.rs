//! Hardware MIDI input via midir.
//!
//! The driver callback is the producer side of the MIDI event ring: it wraps
//! each raw message in a [`MidiEvent`] and pushes it without blocking. The
//! producer travels with the connection and is handed back on disconnect.

use midir::{Ignore, MidiInput, MidiInputConnection};
use synthlink_audio::EventProducer;
use synthlink_types::MidiEvent;

const CLIENT_NAME: &str = "synthlink";

/// Information about an available MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// List MIDI input ports without keeping a client around.
pub fn list_input_ports() -> Result<Vec<MidiPortInfo>, String> {
    let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
    Ok(port_infos(&midi_in))
}

fn port_infos(midi_in: &MidiInput) -> Vec<MidiPortInfo> {
    midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// MIDI input manager
pub struct MidiInputManager {
    midi_in: Option<MidiInput>,
    connection: Option<MidiInputConnection<EventProducer<MidiEvent>>>,
    connected_port_name: Option<String>,
    available_ports: Vec<MidiPortInfo>,
}

impl MidiInputManager {
    pub fn new() -> Self {
        let midi_in = match MidiInput::new(CLIENT_NAME) {
            Ok(m) => Some(m),
            Err(e) => {
                log::warn!(target: "midi", "MIDI unavailable: {}", e);
                None
            }
        };
        Self {
            midi_in,
            connection: None,
            connected_port_name: None,
            available_ports: Vec::new(),
        }
    }

    /// Refresh the list of available MIDI input ports
    pub fn refresh_ports(&mut self) {
        self.available_ports = self.midi_in.as_ref().map(port_infos).unwrap_or_default();
    }

    pub fn list_ports(&self) -> &[MidiPortInfo] {
        &self.available_ports
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected_port_name.as_deref()
    }

    /// Connect to a MIDI input port by index, feeding `producer`. Any
    /// existing connection is closed first.
    pub fn connect(&mut self, port_index: usize, producer: EventProducer<MidiEvent>) -> Result<(), String> {
        self.disconnect();

        // midir consumes the client on connect; keep a fresh one for listing
        let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
        midi_in.ignore(Ignore::None);
        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| format!("Invalid MIDI port index: {}", port_index))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "synthlink-input",
                |timestamp, message, producer: &mut EventProducer<MidiEvent>| {
                    // Sysex and other long messages do not fit an event slot
                    if let Some(event) = MidiEvent::from_bytes(timestamp, message) {
                        producer.push(event);
                    }
                },
                producer,
            )
            .map_err(|e| e.to_string())?;

        log::info!(target: "midi", "MIDI input opened: {}", port_name);
        self.connection = Some(connection);
        self.connected_port_name = Some(port_name);
        self.midi_in = MidiInput::new(CLIENT_NAME).ok();
        Ok(())
    }

    /// Close the connection, returning the ring producer it was feeding.
    pub fn disconnect(&mut self) -> Option<EventProducer<MidiEvent>> {
        let connection = self.connection.take()?;
        let (_, producer) = connection.close();
        if let Some(name) = self.connected_port_name.take() {
            log::info!(target: "midi", "MIDI input closed: {}", name);
        }
        Some(producer)
    }
}

impl Default for MidiInputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}
