//! `ddc`: command-line interface for the DDC/DUC front-end.
//!
//! ```text
//! USAGE:
//!   ddc probe                        Reset span, gains, attenuators; load default filters
//!   ddc info                         HDL identification, span, playback, temperatures
//!   ddc profile <file>               Upload a coefficient profile
//!   ddc waveform <file>              Upload an enveloped waveform
//!   ddc span get | set <hz>          Read or select the span
//!   ddc raw read <ch> | write <ch> <value>
//!   ddc channels                     List raw channels with current values
//! ```
//!
//! The register resource comes from `--resource` or `DDC_RESOURCE`;
//! `--simulate` runs everything against an in-memory register file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ddc_driver::chip::regs;
use ddc_driver::{
    parse_size, ClockTopology, DdcDevice, DeviceConfig, DeviceManager, DeviceSession,
    MmapRegisters, Progress, RegisterInterface, SoftwareRegisters, RAW_CHANNELS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Upload write size, matching one sysfs binary attribute write.
const UPLOAD_CHUNK: usize = 4096;

#[derive(Parser)]
#[command(name = "ddc", about = "AXI DDC/DUC front-end CLI", version)]
struct Cli {
    /// Register resource to map (UIO node or PCIe resource file).
    #[arg(long, global = true)]
    resource: Option<PathBuf>,

    /// Bytes to map, hex (0x...) or decimal.
    #[arg(long, global = true, value_parser = parse_map_size)]
    map_size: Option<usize>,

    /// Use an in-memory register file instead of hardware.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Bring the core to its boot state.
    Probe,
    /// Print identification and status.
    Info,
    /// Upload a coefficient profile.
    Profile {
        /// Profile text file.
        file: PathBuf,
    },
    /// Upload an enveloped waveform.
    Waveform {
        /// Waveform envelope file.
        file: PathBuf,
    },
    /// Span (analysis bandwidth).
    Span {
        #[command(subcommand)]
        action: SpanCmd,
    },
    /// Raw channel access.
    Raw {
        #[command(subcommand)]
        action: RawCmd,
    },
    /// List raw channels and their values.
    Channels,
}

#[derive(Subcommand)]
enum SpanCmd {
    /// Print the current span in Hz.
    Get,
    /// Select the span for a bandwidth in Hz.
    Set {
        /// Bandwidth in Hz.
        hz: String,
    },
}

#[derive(Subcommand)]
enum RawCmd {
    /// Read a channel.
    Read {
        /// Channel name (see `ddc channels`).
        channel: String,
    },
    /// Write a channel.
    Write {
        /// Channel name (see `ddc channels`).
        channel: String,
        /// Value, hex (0x...) or decimal.
        value: String,
    },
}

fn parse_map_size(raw: &str) -> Result<usize, String> {
    parse_size(raw).ok_or_else(|| format!("not a size: {raw}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    let mut config = DeviceConfig::from_env();
    if let Some(path) = &cli.resource {
        config = config.with_resource(path);
    }
    if let Some(size) = cli.map_size {
        config.map_size = size;
    }

    let probe = matches!(cli.command, Cmd::Probe);
    let mgr = DeviceManager::init(1, &ClockTopology::new())?;
    mgr.register(bring_up(config, cli.simulate, probe)?)?;
    let dev = mgr.open_first()?;

    match cli.command {
        Cmd::Probe | Cmd::Info => cmd_info(&dev),
        Cmd::Profile { file } => cmd_profile(&dev, &file)?,
        Cmd::Waveform { file } => cmd_waveform(&dev, &file)?,
        Cmd::Span { action } => cmd_span(&dev, &action)?,
        Cmd::Raw { action } => cmd_raw(&dev, &action)?,
        Cmd::Channels => cmd_channels(&dev),
    }

    Ok(())
}

fn bring_up(config: DeviceConfig, simulate: bool, probe: bool) -> Result<DdcDevice> {
    let registers: Arc<dyn RegisterInterface> = if simulate {
        Arc::new(SoftwareRegisters::new().with_value(regs::LOAD_DONE, 1))
    } else {
        let Some(path) = config.resource_path.clone() else {
            bail!("no register resource: pass --resource or set DDC_RESOURCE (or use --simulate)");
        };
        let mapped = MmapRegisters::open(&path, config.map_size)
            .with_context(|| format!("mapping {}", path.display()))?;
        info!(path = %path.display(), size = config.map_size, "mapped register resource");
        Arc::new(mapped)
    };

    // A simulated core starts blank every run, so it always gets the boot sequence.
    Ok(if probe || simulate {
        DdcDevice::probe(registers, config)
    } else {
        DdcDevice::attach(registers, config)
    })
}

fn cmd_info(dev: &DeviceSession) {
    let ident = dev.ident();
    let playback = dev.playback();

    println!("Device       : {}", dev.handle().name());
    println!("Backend      : {}", dev.backend_type());
    println!("HDL          : {ident}");
    println!("Span         : {} Hz", dev.span_hz());
    if let Some(profile) = dev.committed_profile() {
        println!(
            "Profile      : {} halfband, {} polyphase taps",
            profile.halfband().len(),
            profile.poly().len()
        );
    }
    println!(
        "Playback     : {} (mode {}, DDR {:#x}..{:#x}, {} sequences)",
        if playback.enabled { "armed" } else { "off" },
        playback.mode,
        playback.ddr_start,
        playback.ddr_end,
        playback.sequence_count
    );
    for name in ["local", "remote", "status"] {
        if let Ok(value) = dev.read_raw(name) {
            println!("Temp {name:<7} : {value}");
        }
    }
}

/// Feed a file to an upload channel in sysfs-sized writes; returns the
/// progress of the last write.
fn feed(
    data: &[u8],
    mut write: impl FnMut(usize, &[u8]) -> ddc_driver::Result<Progress>,
) -> Result<Progress> {
    let mut progress = Progress::Incomplete;
    for (i, chunk) in data.chunks(UPLOAD_CHUNK).enumerate() {
        let offset = i * UPLOAD_CHUNK;
        progress = write(offset, chunk).with_context(|| format!("write at offset {offset:#x}"))?;
    }
    Ok(progress)
}

fn cmd_profile(dev: &DeviceSession, file: &Path) -> Result<()> {
    let text = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    match feed(&text, |offset, chunk| dev.upload_profile(offset, chunk))? {
        Progress::Applied => {
            if let Some(profile) = dev.committed_profile() {
                println!(
                    "Profile applied: {} halfband, {} polyphase taps",
                    profile.halfband().len(),
                    profile.poly().len()
                );
            }
            Ok(())
        }
        _ => bail!("{}: no </profile> tag, nothing applied", file.display()),
    }
}

fn cmd_waveform(dev: &DeviceSession, file: &Path) -> Result<()> {
    let blob = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    match feed(&blob, |offset, chunk| dev.upload_waveform(offset, chunk))? {
        Progress::Applied => {
            let playback = dev.playback();
            let loaded = dev.loaded_payload().map_or(0, |p| p.len());
            println!(
                "Waveform loaded: {loaded} bytes, playback {}",
                if playback.enabled { "armed" } else { "off" }
            );
            Ok(())
        }
        Progress::ForeignMarker => bail!("{}: not a waveform envelope", file.display()),
        Progress::Incomplete => {
            bail!("{}: end marker missing or wrong, nothing applied", file.display())
        }
    }
}

fn cmd_span(dev: &DeviceSession, action: &SpanCmd) -> Result<()> {
    match action {
        SpanCmd::Get => print!("{}", dev.read_span()),
        SpanCmd::Set { hz } => {
            dev.write_span(hz.as_bytes())?;
            print!("{}", dev.read_span());
        }
    }
    Ok(())
}

fn cmd_raw(dev: &DeviceSession, action: &RawCmd) -> Result<()> {
    match action {
        RawCmd::Read { channel } => println!("{}", dev.read_raw(channel)?),
        RawCmd::Write { channel, value } => {
            let value = parse_size(value)
                .and_then(|v| u32::try_from(v).ok())
                .with_context(|| format!("not a 32-bit value: {value}"))?;
            dev.write_raw(channel, value)?;
        }
    }
    Ok(())
}

fn cmd_channels(dev: &DeviceSession) {
    println!("{:<18} {:<8} {:>3}  {:>10}  value", "name", "type", "idx", "address");
    for channel in &RAW_CHANNELS {
        let value = dev.read_raw(channel.name).unwrap_or_default();
        println!(
            "{:<18} {:<8} {:>3}  {:#010x}  {value:#x}",
            channel.name, channel.kind.to_string(), channel.index, channel.address
        );
    }
}
