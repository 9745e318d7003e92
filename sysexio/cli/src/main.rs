mod utils;
pub use utils::*;

use clap::Parser;
use std::sync::Arc;
use sysexio::{
    apps::sysexio::{spawn_dispatcher, FrameLogger, SessionCoordinator},
    midi::{DeviceHosting, DeviceInfo, HostedMidiDevices, DEFAULT_QUEUE_SIZE},
    sysex::SysexHeader,
};

/// Scan a MIDI device for SysEx frames.
///
/// Type `s` to start scanning, `h` to halt and `q` to quit.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Index of the device to scan, as listed on startup
    #[arg(default_value_t = 0)]
    device: usize,

    /// Vendor id expected after the SysEx start byte
    #[arg(long, default_value = "0x33", value_parser = parse_byte)]
    vendor: u8,

    /// Model id expected in the frame header
    #[arg(long, default_value = "0x09", value_parser = parse_byte)]
    model: u8,

    /// Number of chunks buffered between the MIDI driver and the reader
    #[arg(long, default_value_t = DEFAULT_QUEUE_SIZE)]
    queue_size: usize,

    /// Path to log file to write to. Defaults
    /// to system log file at ~/.sysexio/log/sysexio.log
    #[arg(long)]
    log: Option<std::path::PathBuf>,

    /// Log verbosity level
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn parse_byte(value: &str) -> Result<u8, std::num::ParseIntError> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn print_devices(devices: &[DeviceInfo], selected: usize) {
    println!("Midi Devices:");
    for (i, device) in devices.iter().enumerate() {
        let marker = if i == selected { "**" } else { "  " };
        println!(
            "{i} {marker} {} {} {} {}",
            device.name, device.id, device.direction, device.queue_size
        );
    }
}

fn run(opts: Options) -> anyhow::Result<()> {
    let log_file = opts.log.or(locations::log_file("sysexio"));
    logger::start("sysexio", log_file.as_deref(), opts.verbose)?;

    let host = Arc::new(HostedMidiDevices::default().with_queue_size(opts.queue_size));
    let devices = host.list_devices()?;
    print_devices(&devices, opts.device);

    let Some(device) = devices.get(opts.device).cloned() else {
        anyhow::bail!(
            "no MIDI device at index {} ({} available)",
            opts.device,
            devices.len()
        );
    };

    let header = SysexHeader {
        vendor: opts.vendor,
        model: opts.model,
    };
    log::debug!("expecting sysex header {header:?} from {}", device.name);

    let coordinator = SessionCoordinator::new(host, device, header, Arc::new(FrameLogger));

    let (commands_tx, commands_rx) = crossbeam::channel::unbounded();
    // blocked on stdin until the process exits
    let _dispatcher = spawn_dispatcher(std::io::BufReader::new(std::io::stdin()), commands_tx)?;

    coordinator.run(commands_rx);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let opts = Options::parse();

    if let Err(e) = run(opts) {
        if logger::is_active() {
            log::error!("{e}");
        } else {
            use colored::*;
            eprintln!("{} {}", "Error:".red().bold(), format!("{e}").bold());
        }
    }

    Ok(())
}
