//! Command-line flags.

use std::path::PathBuf;

pub const USAGE: &str = "\
synthlink: a command line player for the synthlink engine

Usage: synthlink [OPTIONS]

Options:
  -l, --list-devices            List all devices available on this system, then exit
  -a, --audio-interface <a.b>   Select an audio interface, using index (like '0.2') as shown in list-devices
  -m, --midi-input <index>      Select a MIDI input using the index from list-devices
      --osc-in-port <port>      Port for OSC input; unspecified means no OSC
      --osc-out-port <port>     Port for OSC output; unspecified means input only; input required
      --init-patch <path>       Choose this file (by path) as the initial patch
  -v, --verbose                 Debug logging
      --version                 Print version and exit
  -h, --help                    Print this help and exit";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub list_devices: bool,
    pub audio_interface: Option<String>,
    pub midi_input: Option<i64>,
    pub osc_in_port: Option<u16>,
    pub osc_out_port: Option<u16>,
    pub init_patch: Option<PathBuf>,
    pub verbose: bool,
    pub version: bool,
    pub help: bool,
}

fn value<'a, I: Iterator<Item = &'a String>>(flag: &str, it: &mut I) -> Result<&'a String, String> {
    it.next().ok_or_else(|| format!("{} requires a value", flag))
}

/// `0` means "unspecified", like omitting the flag.
fn port(flag: &str, text: &str) -> Result<Option<u16>, String> {
    let port: u16 = text
        .parse()
        .map_err(|_| format!("{} expects a port number, got '{}'", flag, text))?;
    Ok(if port == 0 { None } else { Some(port) })
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut out = CliArgs::default();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f, Some(v.to_string())),
                _ => (arg.as_str(), None),
            };
            let take = |it: &mut std::slice::Iter<'_, String>| -> Result<String, String> {
                match &inline {
                    Some(v) => Ok(v.clone()),
                    None => value(flag, it).cloned(),
                }
            };
            match flag {
                "-l" | "--list-devices" => out.list_devices = true,
                "-a" | "--audio-interface" => out.audio_interface = Some(take(&mut it)?),
                "-m" | "--midi-input" => {
                    let text = take(&mut it)?;
                    let index = text
                        .parse()
                        .map_err(|_| format!("{} expects an index, got '{}'", flag, text))?;
                    out.midi_input = Some(index);
                }
                "--osc-in-port" => out.osc_in_port = port(flag, &take(&mut it)?)?,
                "--osc-out-port" => out.osc_out_port = port(flag, &take(&mut it)?)?,
                "--init-patch" => out.init_patch = Some(PathBuf::from(take(&mut it)?)),
                "-v" | "--verbose" => out.verbose = true,
                "--version" => out.version = true,
                "-h" | "--help" => out.help = true,
                other => return Err(format!("Unknown argument '{}'", other)),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        CliArgs::parse(&owned)
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "-a", "0.2", "-m", "1", "--osc-in-port", "53280", "--osc-out-port=53281",
            "--init-patch", "/tmp/Init.fxp", "-v",
        ])
        .unwrap();
        assert_eq!(args.audio_interface.as_deref(), Some("0.2"));
        assert_eq!(args.midi_input, Some(1));
        assert_eq!(args.osc_in_port, Some(53280));
        assert_eq!(args.osc_out_port, Some(53281));
        assert_eq!(args.init_patch, Some(PathBuf::from("/tmp/Init.fxp")));
        assert!(args.verbose);
        assert!(!args.list_devices);
    }

    #[test]
    fn test_zero_port_means_unspecified() {
        assert_eq!(parse(&["--osc-in-port", "0"]).unwrap().osc_in_port, None);
    }

    #[test]
    fn test_negative_midi_index_parses() {
        assert_eq!(parse(&["-m", "-1"]).unwrap().midi_input, Some(-1));
    }

    #[test]
    fn test_errors() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["-m"]).is_err());
        assert!(parse(&["-m", "x"]).is_err());
        assert!(parse(&["--osc-in-port", "70000"]).is_err());
    }
}
