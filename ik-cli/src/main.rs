//! InstrumentKit command-line tool
//!
//! Opens one instrument, runs one command and exits. The connection comes
//! from `--connect` or from the saved settings:
//!
//! ```text
//! instrumentkit --connect serial:///dev/ttyUSB0 cc1 info
//! instrumentkit --connect tcp://192.168.1.20:1998 topmode laser 1
//! instrumentkit --simulate v2.010 cc1 set window 5ns
//! ```

mod settings;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use ik_comm::{Communicator, ConnectionSpec, PortScanner};
use ik_drivers::{Cc1, Cc1Property, TopMode};
use ik_protocol::Value;
use ik_sim::{VirtualCc1, VirtualCc1Config};
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_TARGETS: [&str; 5] = ["instrumentkit", "ik_protocol", "ik_comm", "ik_drivers", "ik_sim"];

/// InstrumentKit CLI
#[derive(Parser, Debug)]
#[command(name = "instrumentkit", version, about = "Talk to laboratory instruments", long_about = None)]
struct Cli {
    /// Instrument address: vxi11://host[/name], serial://port[@baud] or tcp://host:port
    #[arg(short, long, global = true)]
    connect: Option<ConnectionSpec>,

    /// Read timeout in seconds
    #[arg(short, long, global = true)]
    timeout: Option<f64>,

    /// Run CC1 commands against a virtual counter with this firmware
    #[arg(long, global = true, value_name = "FIRMWARE")]
    simulate: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Qubitekk CC1 coincidence counter
    Cc1 {
        #[command(subcommand)]
        action: Cc1Action,
    },

    /// Toptica TopMode laser
    Topmode {
        #[command(subcommand)]
        action: TopModeAction,
    },

    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum Cc1Action {
    /// Firmware, dialect and every setting
    Info,
    /// Read one property (window, delay, dwell_time, gate, subtract, trigger, firmware, count:N)
    Get { property: Cc1Property },
    /// Write one property, e.g. `set window 5ns` or `set gate false`
    Set { property: Cc1Property, value: String },
    /// Reset the counts on all channels
    Clear,
    /// Counts on every channel
    Counts,
}

#[derive(Subcommand, Debug)]
enum TopModeAction {
    /// Read a raw parameter, e.g. `laser1:wavelength`
    Get { param: String },
    /// System emission, key lock, interlock and health
    Status,
    /// Details of one laser head (1 or 2)
    Laser { number: usize },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the settings file location and contents
    Show,
    /// Save the default connection
    Connect { spec: ConnectionSpec },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load()?;
    tracing::debug!("Loaded settings: {:?}", settings);

    match &cli.command {
        Commands::Ports => list_ports(&cli),
        Commands::Cc1 { action } => run_cc1(&cli, &settings, action),
        Commands::Topmode { action } => run_topmode(&cli, &settings, action),
        Commands::Settings { action } => run_settings(&cli, settings, action),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let default_filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print `(name, value)` rows as aligned text or a JSON object
fn print_rows<V: Display + serde::Serialize>(cli: &Cli, rows: &[(String, V)]) -> anyhow::Result<()> {
    if cli.json {
        let map: BTreeMap<&str, &V> = rows.iter().map(|(k, v)| (k.as_str(), v)).collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (name, value) in rows {
            println!("{name:<width$}  {value}");
        }
    }
    Ok(())
}

fn or_never<T: Display>(time: Option<T>) -> String {
    time.map_or_else(|| "never".to_string(), |t| t.to_string())
}

fn connect(cli: &Cli, settings: &Settings) -> anyhow::Result<Box<dyn Communicator>> {
    let spec = cli
        .connect
        .clone()
        .or_else(|| settings.connection.clone())
        .context("No instrument given; pass --connect or save one with `instrumentkit settings connect`")?;

    let timeout = match cli.timeout {
        Some(secs) if !(secs.is_finite() && secs > 0.0) => {
            bail!("Timeout must be a positive number of seconds, got {secs}")
        }
        Some(secs) => Some(Duration::from_secs_f64(secs)),
        None => settings.timeout(),
    };

    tracing::info!("Connecting to {}", spec);
    ik_comm::open(&spec, timeout).with_context(|| format!("Failed to open {spec}"))
}

// ============================================================================
// Ports
// ============================================================================

fn list_ports(cli: &Cli) -> anyhow::Result<()> {
    let ports = PortScanner::new().enumerate_ports()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        for port in &ports {
            println!("{}", port.describe());
        }
    }
    Ok(())
}

// ============================================================================
// CC1
// ============================================================================

fn run_cc1(cli: &Cli, settings: &Settings, action: &Cc1Action) -> anyhow::Result<()> {
    let comm: Box<dyn Communicator> = match &cli.simulate {
        Some(firmware) => Box::new(VirtualCc1::from_config(VirtualCc1Config {
            firmware: firmware.clone(),
            ..settings.simulator.clone()
        })?),
        None => connect(cli, settings)?,
    };
    let mut cc1 = Cc1::with_limits(comm, settings.cc1_limits.clone())?;

    match action {
        Cc1Action::Info => {
            let mut rows = vec![("dialect".to_string(), Value::Text(format!("{:?}", cc1.dialect())))];
            for prop in Cc1Property::all() {
                if !matches!(prop, Cc1Property::Count(_)) {
                    rows.push((prop.to_string(), cc1.get(prop)?));
                }
            }
            print_rows(cli, &rows)?;
        }
        Cc1Action::Get { property } => {
            let value = cc1.get(*property)?;
            print_rows(cli, &[(property.to_string(), value)])?;
        }
        Cc1Action::Set { property, value } => {
            let value = Value::parse_literal(value);
            cc1.set(*property, &value)?;
            tracing::info!("Set {} to {}", property, value);
        }
        Cc1Action::Clear => {
            cc1.clear_counts()?;
            tracing::info!("Counts cleared");
        }
        Cc1Action::Counts => {
            let mut rows = Vec::new();
            for i in cc1.channels() {
                let prop = Cc1Property::Count(i);
                rows.push((prop.to_string(), cc1.get(prop)?));
            }
            print_rows(cli, &rows)?;
        }
    }

    cc1.into_inner().close();
    Ok(())
}

// ============================================================================
// TopMode
// ============================================================================

fn run_topmode(cli: &Cli, settings: &Settings, action: &TopModeAction) -> anyhow::Result<()> {
    if cli.simulate.is_some() {
        bail!("--simulate only applies to CC1 commands");
    }
    let mut tm = TopMode::new(connect(cli, settings)?);

    match action {
        TopModeAction::Get { param } => {
            let value = tm.reference(param)?;
            print_rows(cli, &[(param.clone(), value)])?;
        }
        TopModeAction::Status => {
            let rows = vec![
                ("emission".to_string(), tm.enable()?),
                ("key locked".to_string(), tm.locked()?),
                ("interlock open".to_string(), tm.interlock()?),
                ("fpga ok".to_string(), tm.fpga_status()?),
                ("temperature ok".to_string(), tm.temperature_status()?),
                ("current ok".to_string(), tm.current_status()?),
            ];
            print_rows(cli, &rows)?;
        }
        TopModeAction::Laser { number } => {
            let index = number
                .checked_sub(1)
                .context("Laser numbers start at 1")?;
            let mut laser = tm.laser(index)?;
            let rows = vec![
                ("serial number".to_string(), laser.serial_number()?),
                ("model".to_string(), laser.model()?),
                ("production date".to_string(), laser.production_date()?),
                ("wavelength".to_string(), laser.wavelength()?.to_string()),
                ("emission".to_string(), laser.enable()?.to_string()),
                ("on time".to_string(), laser.on_time()?.to_string()),
                ("intensity".to_string(), laser.intensity()?.to_string()),
                ("tec ready".to_string(), laser.tec_status()?.to_string()),
                ("charm".to_string(), format!("{:?}", laser.correction_status()?)),
                ("mode hop".to_string(), laser.mode_hop()?.to_string()),
                ("lock start".to_string(), or_never(laser.lock_start()?)),
                ("latest mode hop".to_string(), or_never(laser.latest_mode_hop_time()?)),
            ];
            print_rows(cli, &rows)?;
        }
    }

    tm.into_inner().close();
    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

fn run_settings(cli: &Cli, mut settings: Settings, action: &SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => {
            if let Some(path) = Settings::settings_path() {
                eprintln!("Config: {}", path.display());
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                match &settings.connection {
                    Some(spec) => println!("connection  {spec}"),
                    None => println!("connection  (none)"),
                }
                println!("{:#?}", settings.cc1_limits);
            }
        }
        SettingsAction::Connect { spec } => {
            settings.connection = Some(spec.clone());
            let path = settings.save()?;
            println!("Saved {} to {}", spec, path.display());
        }
    }
    Ok(())
}
