//! Command line control for the C-WAVE GTR.
//!
//! # Usage
//!
//! ```bash
//! cwave --address 192.168.1.20 status
//! cwave --address 192.168.1.20 wavelength 1550 --shg
//! cwave --address 192.168.1.20 shutter laserOut open
//! cwave --mock poll --count 5
//! ```
//!
//! The address may also come from a TOML file (`--config`) or the
//! `GTR_ADDRESS` environment variable.

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use daq_driver_hubner::mock::MockConnector;
use daq_driver_hubner::{
    Gtr, GtrConfig, LambdaRequest, PiezoChannel, ShutterChannel, StatusSnapshot,
};
use logging::{OutputFormat, TracingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cwave")]
#[command(about = "Control a HÜBNER C-WAVE GTR laser", long_about = None)]
struct Cli {
    /// Device address (host, host:port or ws:// URL)
    #[arg(long, global = true)]
    address: Option<String>,

    /// Configuration file (TOML format)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Talk to a simulated device instead of real hardware
    #[arg(long, global = true, conflicts_with = "address")]
    mock: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Compact)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the decoded status block
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print identification data
    Info,

    /// Dial a new wavelength
    Wavelength {
        /// Target OPO wavelength in nm
        nm: f64,
        /// Also bring up the SHG stage
        #[arg(long)]
        shg: bool,
        /// Use the wavelength meter while dialing the SHG
        #[arg(long)]
        use_wlm: bool,
        /// Block until the dial has finished
        #[arg(long)]
        wait: bool,
    },

    /// Open or close a shutter
    Shutter {
        /// Shutter (laserOut, opoOut, shgOut, pump, mirOut)
        channel: ShutterChannel,
        /// Target state
        #[arg(value_enum)]
        action: ShutterAction,
    },

    /// Set the manual output level of a piezo
    PiezoOutput {
        /// Piezo (opo, shg, etalon, ref)
        channel: PiezoChannel,
        /// Level in percent
        level: f64,
    },

    /// Set or print the wavelength-meter lock setpoint
    WlmSetpoint {
        /// Setpoint in nm; prints the current value when omitted
        nm: Option<f64>,
    },

    /// Print a status summary line repeatedly
    Poll {
        /// Interval between polls in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Number of polls, 0 for no limit
        #[arg(long, default_value = "0")]
        count: u64,
    },

    /// Put both state machines into idle
    Idle,

    /// Reboot the device
    Reboot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ShutterAction {
    Open,
    Close,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GtrConfig::load_from(path),
        None => GtrConfig::load(),
    }
    .context("failed to load configuration")?;
    config.validate()?;

    logging::init(
        TracingConfig::from_level_str(&config.log_level)
            .map_err(anyhow::Error::msg)?
            .with_format(cli.log_format),
    )
    .map_err(anyhow::Error::msg)?;

    let gtr = open(&cli, &config)?;
    let result = run(&gtr, cli.command);
    if let Err(e) = gtr.disconnect() {
        warn!(error = %e, "error while disconnecting");
    }
    result
}

/// Build a client and connect it.
fn open(cli: &Cli, config: &GtrConfig) -> Result<Gtr> {
    let options = config.bridge_options();
    if cli.mock {
        let gtr = Gtr::with_connector(Arc::new(MockConnector::new()), options)?;
        gtr.connect("mock.local")?;
        info!("using simulated device");
        return Ok(gtr);
    }

    let Some(address) = cli.address.as_deref().or(config.address.as_deref()) else {
        bail!("no device address; pass --address, set GTR_ADDRESS or use --mock");
    };
    let gtr = Gtr::with_options(options)?;
    gtr.connect(address)
        .with_context(|| format!("failed to connect to {address}"))?;
    Ok(gtr)
}

fn run(gtr: &Gtr, command: Commands) -> Result<()> {
    match command {
        Commands::Status { json } => {
            let status = gtr.get_status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Commands::Info => {
            let info = gtr.get_info()?;
            println!("{} (serial {})", info.name, info.serial_number);
            println!("  version:  {} ({})", info.version, info.revision);
            println!("  mac:      {}", info.mac);
        }
        Commands::Wavelength {
            nm,
            shg,
            use_wlm,
            wait,
        } => {
            gtr.set_lambda(LambdaRequest {
                wavelength: nm,
                request_shg: shg,
                use_wlm_for_shg: use_wlm,
            })?;
            if wait {
                while !gtr.get_dial_done()? {
                    std::thread::sleep(Duration::from_millis(500));
                }
                println!("dial to {nm} nm finished");
            }
        }
        Commands::Shutter { channel, action } => {
            gtr.set_shutter(channel, action == ShutterAction::Open)?;
        }
        Commands::PiezoOutput { channel, level } => gtr.set_piezo_manual_output(channel, level)?,
        Commands::WlmSetpoint { nm: Some(nm) } => gtr.set_wlm_setpoint(nm)?,
        Commands::WlmSetpoint { nm: None } => println!("{} nm", gtr.get_wlm_setpoint()?),
        Commands::Poll { interval_ms, count } => {
            let interval = Duration::from_millis(interval_ms);
            let mut polled = 0;
            loop {
                println!("{}", summary(&gtr.get_status()?));
                polled += 1;
                if count != 0 && polled >= count {
                    break;
                }
                std::thread::sleep(interval);
            }
        }
        Commands::Idle => gtr.idle()?,
        Commands::Reboot => {
            gtr.reboot()?;
            println!("device is rebooting");
        }
    }
    Ok(())
}

fn summary(status: &StatusSnapshot) -> String {
    format!(
        "t={} target={:.3} nm measured={:.3} nm opo={:?} shg={:?} lock_opo={} lock_etalon={}",
        status.system_time,
        status.target_wavelength,
        status.measured_wavelength,
        status.opo_state,
        status.shg_state,
        status.status_bits.lock_opo,
        status.status_bits.lock_etalon,
    )
}

fn print_status(status: &StatusSnapshot) {
    println!("{}", summary(status));
    println!(
        "  uptime {} s, operation {} s, abi {}",
        status.uptime, status.operation_time, status.abi_version
    );
    println!(
        "  tec opo {:.2} °C, shg {:.2} °C, ref {:.2} °C",
        status.tec_opo.temperature, status.tec_shg.temperature, status.tec_ref.temperature
    );
    println!(
        "  piezo opo {:.1} %, shg {:.1} %, etalon {:.1} %, ref {:.1} %",
        status.piezo_opo.output,
        status.piezo_shg.output,
        status.piezo_etalon.output,
        status.piezo_ref.output
    );
    println!(
        "  shutters laser {:?}, opo {:?}, shg {:?}, pump {:?}, mir {:?}",
        status.shutters.laser_out,
        status.shutters.opo_out,
        status.shutters.shg_out,
        status.shutters.pump,
        status.shutters.mir_out
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_shutter_command() {
        let cli = Cli::try_parse_from(["cwave", "--mock", "shutter", "laserOut", "open"]).unwrap();
        assert!(cli.mock);
        match cli.command {
            Commands::Shutter { channel, action } => {
                assert_eq!(channel, ShutterChannel::LaserOut);
                assert_eq!(action, ShutterAction::Open);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_channel_is_rejected() {
        assert!(Cli::try_parse_from(["cwave", "piezo-output", "idler", "50"]).is_err());
    }

    #[test]
    fn test_mock_conflicts_with_address() {
        assert!(Cli::try_parse_from(["cwave", "--mock", "--address", "10.0.0.1", "info"]).is_err());
    }

    #[test]
    fn test_commands_against_mock() {
        let cli = Cli::try_parse_from(["cwave", "--mock", "info"]).unwrap();
        let gtr = open(&cli, &GtrConfig::default()).unwrap();

        run(&gtr, Commands::WlmSetpoint { nm: Some(737.1) }).unwrap();
        run(&gtr, Commands::WlmSetpoint { nm: None }).unwrap();
        assert_eq!(gtr.get_wlm_setpoint().unwrap(), 737.1);

        run(
            &gtr,
            Commands::Wavelength {
                nm: 1550.0,
                shg: false,
                use_wlm: false,
                wait: true,
            },
        )
        .unwrap();
        assert!(run(&gtr, Commands::Poll { interval_ms: 1, count: 2 }).is_ok());

        let err = run(
            &gtr,
            Commands::PiezoOutput {
                channel: PiezoChannel::Opo,
                level: 150.0,
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_address_is_reported() {
        let cli = Cli::try_parse_from(["cwave", "info"]).unwrap();
        let config = GtrConfig::default();
        let err = open(&cli, &config).err().unwrap();
        assert!(err.to_string().contains("no device address"));
    }
}
