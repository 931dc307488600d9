//! HÜBNER C-WAVE GTR driver for rust-daq.
//!
//! This crate controls the C-WAVE GTR tunable continuous-wave laser over its
//! network command interface:
//! - [`Gtr`]: blocking, thread-safe typed control API
//! - [`telemetry`]: decoder for the 925-byte status block
//! - [`mock`]: in-process simulated device for tests and dry runs
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! daq-driver-hubner = { path = "../daq-driver-hubner" }
//! ```
//!
//! ```rust,no_run
//! use daq_driver_hubner::{Gtr, LambdaRequest};
//!
//! let gtr = Gtr::new()?;
//! gtr.connect("192.168.1.20")?;
//! gtr.set_lambda(LambdaRequest {
//!     wavelength: 1550.0,
//!     request_shg: false,
//!     use_wlm_for_shg: false,
//! })?;
//! while !gtr.get_dial_done()? {
//!     std::thread::sleep(std::time::Duration::from_millis(500));
//! }
//! # Ok::<(), daq_driver_hubner::GtrError>(())
//! ```

pub mod address;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
mod gtr;
pub mod mock;
pub mod reader;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use address::{AddressError, DeviceAddress};
pub use bridge::BridgeOptions;
pub use config::GtrConfig;
pub use error::{GtrError, Result};
pub use gtr::{Gtr, DEFAULT_PARK_LEVEL};
pub use reader::{BinaryReader, BinaryWriter};
pub use telemetry::{
    AllowedActionBits, MonitorSource, OpoState, PiezoControlSource, PiezoMode, PiezoStatus,
    ShgState, ShutterState, StatusBits, StatusSnapshot, StepperHomingState, StepperStatus,
    TecStatus, TriggerSource, STATUS_BLOCK_LEN,
};
pub use transport::{Connector, Transport, WsConnector};
pub use types::{
    Channel, DeviceInfo, LambdaRequest, LyotScan, MappingFieldChannel, PiezoChannel,
    PiezoScanSettings, ScanChannel, ScanStep, ShutterChannel, StepperChannel, TecChannel,
    TemperatureOptimizeChannel, TemperatureScan,
};
