//! # ARC Probe
//!
//! Diagnostic tool for ARC Gen III controllers and the ARC-66/67 PCIe board.
//!
//! The codec subcommands (`encode`, `decode`, `reply`, `board-config`, `pci-decode`)
//! work offline. The device subcommands (`list`, `config-space`, `bars`, `status`)
//! open a board through the native driver backend.
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use arc_device::{
    DeviceDescriptor,
    config::{Builder, Config},
    pci::decode_dump,
    pcie::{BOARD_ID, Fiber, PcieDevice},
    system::NativeSystem,
};
use arc_protocol::{
    codec::{decode_command, decode_command_list, encode_command},
    config::BoardConfig,
};
use clap::{ArgAction, Parser, Subcommand};
use clap_num::maybe_hex;
use env_logger::Env;

#[derive(Subcommand, Eq, PartialEq, Clone)]
enum Command {
    /// Encode mnemonics into command words
    Encode {
        #[arg(required = true)]
        mnemonics: Vec<String>,
    },
    /// Decode command words into mnemonics
    Decode {
        #[arg(required = true, value_parser = maybe_hex::<u32>)]
        words: Vec<u32>,
    },
    /// Render a command list together with its reply
    Reply {
        #[arg(value_parser = maybe_hex::<u32>)]
        reply: u32,
        #[arg(required = true, value_parser = maybe_hex::<u32>)]
        commands: Vec<u32>,
    },
    /// Decode a controller configuration word
    BoardConfig {
        #[arg(value_parser = maybe_hex::<u32>)]
        word: u32,
    },
    /// Decode a raw configuration-space dump of 16 dwords
    PciDecode {
        #[arg(required = true, value_parser = maybe_hex::<u32>)]
        dwords: Vec<u32>,
    },
    /// List the PCIe boards found
    List,
    /// Print the configuration space of a board
    ConfigSpace {
        #[arg(short, long, default_value = "0")]
        device: usize,
    },
    /// Print the base address registers of a board
    Bars {
        #[arg(short, long, default_value = "0")]
        device: usize,
    },
    /// Print the status register, the ids and the fiber links of a board
    Status {
        #[arg(short, long, default_value = "0")]
        device: usize,
    },
}

#[derive(Parser)]
#[command(about = "Diagnostics for ARC Gen III camera controllers", long_about = None)]
struct Args {
    #[arg(long, help = "Time to wait for a command reply in milliseconds")]
    reply_timeout_ms: Option<u64>,

    #[arg(long, help = "Directory scanned for ARC device nodes")]
    device_dir: Option<PathBuf>,

    #[arg(
        long,
        help = "Open this device path instead of scanning, e.g. a Windows interface path"
    )]
    device_path: Option<String>,

    #[cfg(windows)]
    #[arg(long, help = "Device interface GUID the board driver publishes")]
    interface_guid: Option<String>,

    #[arg(long, help = "Log every command together with its reply")]
    log_commands: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

impl Args {
    fn config(&self) -> Config {
        let mut builder = Builder::new().log_commands(self.log_commands);
        if let Some(ms) = self.reply_timeout_ms {
            builder = builder.reply_timeout(Duration::from_millis(ms));
        }
        if let Some(dir) = &self.device_dir {
            builder = builder.device_dir(dir);
        }
        builder.build()
    }
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(windows)]
fn native_system(args: &Args) -> Result<NativeSystem, Box<dyn Error>> {
    use arc_device::system::windows::parse_interface_guid;

    match &args.interface_guid {
        Some(text) => {
            let guid = parse_interface_guid(text)
                .ok_or_else(|| format!("Invalid interface GUID: {}", text))?;
            Ok(NativeSystem::new(guid))
        }
        None => Ok(NativeSystem::default()),
    }
}

#[cfg(not(windows))]
fn native_system(_args: &Args) -> Result<NativeSystem, Box<dyn Error>> {
    Ok(NativeSystem::default())
}

/// Opens board `n`, or the explicit `--device-path` if one was given.
fn open_device(
    args: &Args,
    config: Config,
    n: usize,
) -> Result<PcieDevice<NativeSystem>, Box<dyn Error>> {
    let mut device = PcieDevice::new(native_system(args)?, config);
    match &args.device_path {
        Some(path) => device.open_device(&DeviceDescriptor::new(path.as_str()))?,
        None => {
            device.find_devices()?;
            device.open(n)?;
        }
    }
    Ok(device)
}

fn report(out: &mut impl Write, name: &str, value: Result<String, String>) -> io::Result<()> {
    match value {
        Ok(value) => writeln!(out, "{:<24}{}", name, value),
        Err(e) => writeln!(out, "{:<24}<{}>", name, e.replace('\n', " ")),
    }
}

fn print_status(device: &PcieDevice<NativeSystem>, out: &mut impl Write) -> io::Result<()> {
    let status = device.status().map_err(|e| e.to_string());
    report(out, "Status:", status.map(|s| s.to_string()))?;
    if let Ok(status) = device.status() {
        let flags = [
            ("Idle:", status.idle()),
            ("Command Sent:", status.command_sent()),
            ("Reply Received:", status.reply_received()),
            ("Readout:", status.readout()),
            ("Controller Reset:", status.controller_reset()),
            ("Header Error:", status.header_error()),
            ("Image Read Timeout:", status.image_read_timeout()),
            ("Fiber 2x Receiver:", status.fiber_2x()),
        ];
        for (name, flag) in flags {
            report(out, name, Ok(flag.to_string()))?;
        }
    }
    let id = device.id().map_err(|e| e.to_string());
    report(
        out,
        "Board Id:",
        id.map(|id| {
            let marker = if id == BOARD_ID { "" } else { " ( unexpected )" };
            format!("0x{:X}{}", id, marker)
        }),
    )?;
    for (name, fiber) in [("Fiber A:", Fiber::A), ("Fiber B:", Fiber::B)] {
        let connected = device.is_fiber_connected(fiber).map_err(|e| e.to_string());
        report(out, name, connected.map(|c| c.to_string()))?;
    }
    report(
        out,
        "Controller Id:",
        Ok(format!("0x{:X}", device.controller_id())),
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(args.verbose)))
        .init();

    let config = args.config();
    log::debug!("{}", config.banner());
    log::debug!(
        "Config: reply_timeout={:?}, device_dir={}",
        config.reply_timeout,
        config.device_dir.display()
    );

    let mut out = io::stdout().lock();
    match &args.command {
        Command::Encode { mnemonics } => {
            for mnemonic in mnemonics {
                writeln!(out, "0x{:08X}", encode_command(mnemonic)?)?;
            }
        }
        Command::Decode { words } => {
            for word in words {
                writeln!(out, "{}", decode_command(*word))?;
            }
        }
        Command::Reply { reply, commands } => {
            writeln!(out, "{}", decode_command_list(*reply, commands))?;
        }
        Command::BoardConfig { word } => {
            writeln!(out, "{}", BoardConfig::decode(*word))?;
        }
        Command::PciDecode { dwords } => {
            decode_dump(dwords)?.print_config_space(&mut out)?;
        }
        Command::List => {
            let mut device = PcieDevice::new(native_system(&args)?, config);
            if let Err(e) = device.find_devices() {
                log::warn!("{}", e);
            }
            for line in device.device_list() {
                writeln!(out, "{}", line)?;
            }
        }
        Command::ConfigSpace { device } => {
            let mut device = open_device(&args, config, *device)?;
            device.config_space()?.print_config_space(&mut out)?;
        }
        Command::Bars { device } => {
            let mut device = open_device(&args, config, *device)?;
            device.bar_space()?.print_bars(&mut out)?;
        }
        Command::Status { device } => {
            let device = open_device(&args, config, *device)?;
            print_status(&device, &mut out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_hex_and_decimal() {
        let args = Args::parse_from(["arc-probe", "decode", "0x444F4E", "5526350"]);
        assert!(args.command == Command::Decode {
            words: vec![0x444F4E, 5526350]
        });
    }

    #[test]
    fn flags_feed_the_config() {
        let args = Args::parse_from([
            "arc-probe",
            "--reply-timeout-ms",
            "3000",
            "--device-dir",
            "/tmp/arc",
            "-vv",
            "list",
        ]);
        let config = args.config();
        assert_eq!(config.reply_timeout, Duration::from_secs(3));
        assert_eq!(config.device_dir, PathBuf::from("/tmp/arc"));
        assert!(!config.log_commands);
        assert_eq!(default_filter(args.verbose), "trace");
    }
}
