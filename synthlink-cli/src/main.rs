mod args;
mod library;
mod synth;

use std::fs::File;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use synthlink_audio::{
    event_ring, host_count, list_output_devices, AudioOpenError, AudioOutput, BlockScheduler,
    DeviceSelector, SchedulerStats,
};
use synthlink_core::config::Config;
use synthlink_core::defaults::UserDefaults;
use synthlink_core::midi::{list_input_ports, MidiInputManager};
use synthlink_core::osc::OscService;
use synthlink_core::{paths, run_housekeeping, HandoffState, SynthHost};
use synthlink_types::{MidiEvent, ParamUpdate};

use args::{CliArgs, USAGE};
use synth::{ParamTable, ReferenceHost, ReferenceVoice};

const EXIT_MIDI_OPEN: i32 = 1;
const EXIT_AUDIO_CREATE: i32 = 2;
const EXIT_AUDIO_OPEN: i32 = 3;
const EXIT_AUDIO_HOST_INDEX: i32 = 4;
const EXIT_MIDI_INDEX: i32 = 5;
const EXIT_USAGE: i32 = 64;

/// Housekeeping tick when nothing wakes the loop earlier
const MESSAGE_LOOP_INTERVAL: Duration = Duration::from_millis(25);

/// A bring-up failure and the process exit code it maps to.
#[derive(Debug)]
struct SetupError {
    code: i32,
    message: String,
}

impl SetupError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = paths::config_dir().join("synthlink.log");
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    match File::create(&log_path) {
        Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
        Err(e) => eprintln!("Cannot create log file {}: {}", log_path.display(), e),
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Logger was already initialized");
    }

    log::debug!("synthlink starting (log level: {:?})", log_level);
}

fn list_devices() {
    for dev in list_output_devices() {
        println!(
            "Audio Device: [{}.{}] : {}.{}",
            dev.host_index, dev.device_index, dev.host_name, dev.name
        );
    }
    match list_input_ports() {
        Ok(ports) => {
            for port in ports {
                println!("MIDI Device: [{}] : {}", port.index, port.name);
            }
        }
        Err(e) => log::error!("Unable to enumerate MIDI devices: {}", e),
    }
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match CliArgs::parse(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            process::exit(EXIT_USAGE);
        }
    };
    if args.help {
        println!("{}", USAGE);
        return;
    }
    if args.version {
        println!("synthlink {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_logging(args.verbose);

    if args.list_devices {
        list_devices();
        return;
    }

    if let Err(e) = run(&args) {
        log::error!("Error: {}", e.message);
        process::exit(e.code);
    }
}

fn open_midi(
    manager: &mut MidiInputManager,
    requested: Option<i64>,
    producer: synthlink_audio::EventProducer<MidiEvent>,
) -> Result<(), SetupError> {
    manager.refresh_ports();
    let count = manager.list_ports().len();
    let index = match requested {
        Some(i) if i < 0 || i as usize >= count => {
            return Err(SetupError::new(
                EXIT_MIDI_INDEX,
                format!("MIDI input must be in range 0...{}", count as i64 - 1),
            ));
        }
        Some(i) => i as usize,
        None if count == 0 => {
            log::warn!("No MIDI inputs available, running without MIDI");
            return Ok(());
        }
        None => 0,
    };
    let name = manager.list_ports()[index].name.clone();
    manager
        .connect(index, producer)
        .map_err(|e| SetupError::new(EXIT_MIDI_OPEN, format!("Unable to open MIDI device {}: {}", name, e)))?;
    log::info!("Opened MIDI input: [{}]", name);
    Ok(())
}

fn open_audio(
    interface: Option<&str>,
    config: &Config,
    scheduler: BlockScheduler<ReferenceVoice>,
) -> Result<AudioOutput, SetupError> {
    let selector = match interface {
        Some(text) => {
            let sel = DeviceSelector::parse(text).map_err(|e| SetupError::new(EXIT_AUDIO_OPEN, e))?;
            let hosts = host_count();
            if sel.host_index >= hosts {
                return Err(SetupError::new(
                    EXIT_AUDIO_HOST_INDEX,
                    format!("Audio type index must be in range 0...{}", hosts as i64 - 1),
                ));
            }
            Some(sel)
        }
        None => None,
    };

    let audio = AudioOutput::open(selector, config.sample_rate(), config.buffer_size(), scheduler)
        .map_err(|e| match e {
            AudioOpenError::Device(msg) => SetupError::new(EXIT_AUDIO_CREATE, msg),
            AudioOpenError::Stream(msg) => SetupError::new(EXIT_AUDIO_OPEN, msg),
        })?;
    audio
        .start()
        .map_err(|e| SetupError::new(EXIT_AUDIO_OPEN, e))?;
    Ok(audio)
}

fn start_osc(
    args: &CliArgs,
    config: &Config,
    host: &Arc<ReferenceHost>,
    handoff: &Arc<HandoffState>,
    params: synthlink_audio::EventProducer<ParamUpdate>,
) -> Option<OscService<ReferenceHost>> {
    let Some(in_port) = args.osc_in_port else {
        if args.osc_out_port.is_some() {
            log::warn!("--osc-out-port requires --osc-in-port; OSC output not started");
        }
        return None;
    };

    let defaults = UserDefaults::load(UserDefaults::default_location());
    let mut service = match OscService::new(
        Arc::clone(host),
        params,
        Arc::clone(handoff),
        defaults,
        config.osc_out_host(),
    ) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Unable to start OSC: {}", e);
            return None;
        }
    };

    log::info!("Starting OSC input on {}", in_port);
    if let Err(e) = service.start_listening(in_port) {
        log::error!("Unable to start OSC input on port {}: {}", in_port, e);
    }
    if let Some(out_port) = args.osc_out_port {
        log::info!("Starting OSC output on {}", out_port);
        if let Err(e) = service.start_sending(out_port) {
            log::error!("Unable to start OSC output on port {}: {}", out_port, e);
        }
    }
    Some(service)
}

/// Warn about MIDI events lost since the last call. Returns the new total.
fn report_midi_overflow(stats: &SchedulerStats, reported: u64) -> u64 {
    let total = stats.midi_dropped();
    if total > reported {
        log::warn!(
            "MIDI input overflowed: {} events dropped ({} total)",
            total - reported,
            total
        );
    }
    total
}

fn run(args: &CliArgs) -> Result<(), SetupError> {
    let config = Config::load();
    let data_dir = paths::data_dir();
    log::debug!("data directory: {}", data_dir.display());

    let (midi_tx, midi_rx) = event_ring::<MidiEvent>(config.midi_ring_capacity());
    let (param_tx, param_rx) = event_ring::<ParamUpdate>(config.param_queue_capacity());
    let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
    let handoff = Arc::new(HandoffState::new());

    let table = Arc::new(ParamTable::new());
    let host = Arc::new(ReferenceHost::new(Arc::clone(&table), data_dir, Some(wake_tx)));
    if let Some(patch) = &args.init_patch {
        host.load_patch(patch);
    }

    let mut midi = MidiInputManager::new();
    open_midi(&mut midi, args.midi_input, midi_tx)?;

    let voice = ReferenceVoice::new(Arc::clone(&table), param_rx, config.sample_rate() as f32);
    let scheduler = BlockScheduler::new(voice, midi_rx);
    let stats = scheduler.stats();
    let audio = open_audio(args.audio_interface.as_deref(), &config, scheduler)?;

    let osc = start_osc(args, &config, &host, &handoff, param_tx);
    if osc.is_some() {
        log::info!("Beginning message loop");
    } else {
        log::info!("Running");
    }

    let mut midi_dropped = 0;
    loop {
        match wake_rx.recv_timeout(MESSAGE_LOOP_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        run_housekeeping(&handoff, host.as_ref());
        midi_dropped = report_midi_overflow(&stats, midi_dropped);
    }

    drop(osc);
    if let Err(e) = audio.stop() {
        log::warn!("{}", e);
    }
    midi.disconnect();
    Ok(())
}
