//! # synthlink-core
//!
//! Control plumbing between the outside world and a synthesis engine: OSC in
//! and out, hardware MIDI input, and the small shared state the network
//! thread is allowed to touch.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use synthlink_audio::event_ring;
//! use synthlink_core::{config::Config, defaults::UserDefaults, handoff::HandoffState, osc::OscService};
//!
//! let config = Config::load();
//! let (params_tx, params_rx) = event_ring(config.param_queue_capacity());
//! let handoff = Arc::new(HandoffState::new());
//! // `host` implements `SynthHost`; `params_rx` goes to its audio-side poll
//! let mut osc = OscService::new(host, params_tx, Arc::clone(&handoff),
//!     UserDefaults::load(UserDefaults::default_location()), config.osc_out_host())?;
//! osc.start_listening(53280)?;
//! osc.start_sending(53281)?;
//! ```
//!
//! ## Module Overview
//!
//! - [`osc`]: address routing table, dispatcher, UDP listener, outbound sender
//! - [`handoff`]: listening/sending flags and the pending patch-load slot
//! - [`host`]: `SynthHost` / `ParamSource`, the engine collaborator traits
//! - [`midi`]: midir input feeding the MIDI event ring
//! - [`worker`]: non-real-time job thread
//! - [`config`], [`defaults`], [`paths`]: runtime config, persisted user
//!   defaults, directory resolution

pub mod config;
pub mod defaults;
pub mod handoff;
pub mod host;
pub mod midi;
pub mod osc;
pub mod paths;
pub mod worker;

pub use handoff::{run_housekeeping, HandoffState};
pub use host::{ParamSource, SynthHost};
