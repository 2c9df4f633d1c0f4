use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uom::si::f64::ThermodynamicTemperature;
use uom::si::thermodynamic_temperature::degree_celsius;

use lepton_uvc_lib::camera::{DeviceIdentity, LeptonCommands};
use lepton_uvc_lib::mlx::{Mlx90614Config, SensorState};
use lepton_uvc_lib::observer::PropertyChange;
use lepton_uvc_lib::{CommandId, I2cAddress, LeptonPort, PortConfig, UvcTransport};

type Port = LeptonPort<UvcTransport>;

/// Talk to a FLIR Lepton on a PureThermal board through its UVC extension units.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// USB vendor id
    #[arg(long, value_parser = parse_u16, default_value = "0x1e4e")]
    vid: u16,
    /// USB product id
    #[arg(long, value_parser = parse_u16, default_value = "0x0100")]
    pid: u16,
    /// JSON file overriding the MLX90614 detection settings
    #[arg(long)]
    sensor_config: Option<PathBuf>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show extension units, capabilities and camera identity
    Info,
    /// Probe every I2C address behind the bridge
    Scan,
    /// Run MLX90614 detection and print its first readings
    Detect,
    /// Read an attribute
    Get {
        #[arg(value_parser = parse_u16)]
        cmd: u16,
        /// Attribute length in 16-bit words
        #[arg(default_value_t = 1)]
        words: usize,
    },
    /// Write an attribute
    Set {
        #[arg(value_parser = parse_u16)]
        cmd: u16,
        #[arg(value_parser = parse_u16, required = true)]
        words: Vec<u16>,
    },
    /// Trigger a run command
    Run {
        #[arg(value_parser = parse_u16)]
        cmd: u16,
    },
    /// Raw I2C write/read transaction
    I2c {
        #[arg(value_parser = parse_u8)]
        address: u8,
        /// Bytes to write, as hex
        #[arg(short, long)]
        write: Option<String>,
        /// Number of bytes to read
        #[arg(short, long)]
        read: Option<usize>,
    },
    /// Poll the spotmeter and auxiliary sensor periodically
    Watch {
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
        /// Stop after this many ticks
        #[arg(long)]
        count: Option<u64>,
    },
}

fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let n = parse_number(s)?;
    u16::try_from(n).map_err(|_| format!("'{}' does not fit in 16 bits", s))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("'{}' does not fit in 8 bits", s))
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv; RUST_LOG still wins
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn load_sensor_config(path: &Path) -> Result<Mlx90614Config> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read sensor config {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid sensor config {:?}", path))
}

fn open_port(config: &PortConfig, sensor_config: Option<Mlx90614Config>) -> Result<(Arc<Port>, String)> {
    let device = UvcTransport::open(config).context("Failed to open PureThermal board")?;

    let mut port = LeptonPort::new(device.transport, device.units)
        .with_observer(Arc::new(|change: PropertyChange| debug!(%change, "Property changed")));
    if let Some(sensor_config) = sensor_config {
        port = port.with_sensor_config(sensor_config);
    }
    Ok((Arc::new(port), device.firmware))
}

fn celsius(t: Option<ThermodynamicTemperature>) -> String {
    match t {
        Some(t) => format!("{:.2} °C", t.get::<degree_celsius>()),
        None => "-".to_string(),
    }
}

fn print_words(words: &[u16]) {
    let text: Vec<String> = words.iter().map(|w| format!("{:04x}", w)).collect();
    println!("{}", text.join(" "));
}

/// One-shot commands. These block on USB transfers, so they run off the runtime.
fn run_once(port: &Port, firmware: &str, command: Command) -> Result<()> {
    match command {
        Command::Info => {
            for unit in port.extension_units() {
                println!("{:?}", unit);
            }
            println!("Generic I2C passthrough: {}", port.capabilities().supports_generic_i2c);
            let identity = DeviceIdentity::read(port, firmware).context("Failed to read camera identity")?;
            println!("{}", identity);
            println!("Runtime AGC change:   {}", identity.supports_runtime_agc_change());
            println!("Hardware pseudocolor: {}", identity.supports_hw_pseudo_color());
            println!("Radiometry:           {}", identity.supports_radiometry());
        }
        Command::Scan => {
            let scan = port.i2c_scan(false).context("I2C scan failed")?;
            print!("{}", scan);
        }
        Command::Detect => {
            let state = port.enumerate_aux_sensor();
            println!("MLX90614: {:?}", state);
            if state == SensorState::Present {
                let (ambient, object) = port.aux_readings();
                println!("Ambient: {}", celsius(ambient));
                println!("Object:  {}", celsius(object));
            }
        }
        Command::Get { cmd, words } => {
            let mut attribute = vec![0u16; words];
            port.get_attribute(CommandId(cmd), &mut attribute)
                .with_context(|| format!("GET {:#06x} failed", cmd))?;
            print_words(&attribute);
        }
        Command::Set { cmd, words } => {
            port.set_attribute(CommandId(cmd), &words)
                .with_context(|| format!("SET {:#06x} failed", cmd))?;
        }
        Command::Run { cmd } => {
            port.run_command(CommandId(cmd))
                .with_context(|| format!("RUN {:#06x} failed", cmd))?;
        }
        Command::I2c { address, write, read } => {
            let address = I2cAddress::try_from(address)?;
            let write = write
                .map(hex::decode)
                .transpose()
                .context("--write must be hex")?;
            let reply = port.i2c_write_read(address, write.as_deref(), read)?;
            println!("Status: {} ({})", reply.status, i16::from(reply.status));
            if !reply.data.is_empty() {
                println!("Data:   {}", hex::encode(&reply.data));
            }
        }
        Command::Watch { .. } => bail!("watch is not a one-shot command"),
    }
    Ok(())
}

async fn watch(port: Arc<Port>, interval_ms: u64, count: Option<u64>) -> Result<()> {
    let state = {
        let port = port.clone();
        tokio::task::spawn_blocking(move || port.enumerate_aux_sensor()).await?
    };
    info!("Auxiliary sensor: {:?}", state);

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }
        }

        let tick_port = port.clone();
        let spot = tokio::task::spawn_blocking(move || {
            tick_port.poll();
            tick_port.spotmeter_obj_kelvin_x100()
        })
        .await?;

        let spot = match spot {
            Ok(reading) => reading.to_string(),
            Err(e) => {
                debug!("Spotmeter read failed: {}", e);
                "-".to_string()
            }
        };
        let (ambient, object) = port.aux_readings();
        let aux = if port.aux_sensor_present() {
            format!("ambient {}, object {}", celsius(ambient), celsius(object))
        } else {
            "no auxiliary sensor".to_string()
        };
        println!("spotmeter {} | {}", spot, aux);

        ticks += 1;
        if count.is_some_and(|c| ticks >= c) {
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("{:?}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = PortConfig {
        vid: cli.vid,
        pid: cli.pid,
        ..PortConfig::default()
    };
    let sensor_config = cli.sensor_config.as_deref().map(load_sensor_config).transpose()?;
    let (port, firmware) = tokio::task::spawn_blocking(move || open_port(&config, sensor_config)).await??;

    match cli.command {
        Command::Watch { interval_ms, count } => watch(port, interval_ms, count).await,
        command => tokio::task::spawn_blocking(move || run_once(&port, &firmware, command)).await?,
    }
}
