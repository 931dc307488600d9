//! HÜBNER C-WAVE GTR control client.
//!
//! Reference: C-WAVE GTR remote interface (JSON commands over WebSocket)
//!
//! Protocol Overview:
//! - Endpoint: `ws://<host>/api/cmd`
//! - Request: `{"uid", "cmd", "chan", "type": "get"|"set", "arg"}`
//! - Reply: `{"res": "ok"|<error>, "arg"}`
//! - Status: `status` returns a base64 encoded 925-byte block
//!
//! # Usage
//!
//! ```rust,no_run
//! use daq_driver_hubner::{Gtr, ShutterChannel};
//!
//! let gtr = Gtr::new()?;
//! gtr.connect("192.168.1.20")?;
//! gtr.set_shutter(ShutterChannel::LaserOut, true)?;
//! let status = gtr.get_status()?;
//! println!("measured {} nm", status.measured_wavelength);
//! # Ok::<(), daq_driver_hubner::GtrError>(())
//! ```
//!
//! All methods block the calling thread. A [`Gtr`] can be shared between
//! threads; requests from different threads are serialized.

use crate::address::DeviceAddress;
use crate::bridge::{Bridge, BridgeOptions, REBOOT_COMMAND};
use crate::channel::{decode_payload, Request};
use crate::error::{GtrError, Result};
use crate::telemetry::{PiezoControlSource, PiezoMode, StatusBits, StatusSnapshot};
use crate::transport::{Connector, WsConnector};
use crate::types::{
    DeviceInfo, LambdaRequest, LyotScan, MappingFieldChannel, PiezoChannel, PiezoScanSettings,
    ScanChannel, ShutterChannel, StepperChannel, TecChannel, TemperatureOptimizeChannel,
    TemperatureScan,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Manual output level used when stopping a piezo scan.
pub const DEFAULT_PARK_LEVEL: f64 = 50.0;

// =============================================================================
// Argument validation
// =============================================================================

fn finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GtrError::InvalidArgument(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

fn percent(name: &str, value: f64) -> Result<f64> {
    let value = finite(name, value)?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(GtrError::InvalidArgument(format!(
            "{name} must be within [0, 100], got {value}"
        )))
    }
}

fn validate_scan_settings(settings: &PiezoScanSettings) -> Result<()> {
    percent("scan min", settings.min)?;
    percent("scan max", settings.max)?;
    finite("scan rate", settings.rate)?;
    if settings.min > settings.max {
        return Err(GtrError::InvalidArgument(format!(
            "scan min {} exceeds scan max {}",
            settings.min, settings.max
        )));
    }
    if settings.rate <= 0.0 {
        return Err(GtrError::InvalidArgument(format!(
            "scan rate must be positive, got {}",
            settings.rate
        )));
    }
    Ok(())
}

fn validate_temperature_scan(scan: &TemperatureScan) -> Result<()> {
    finite("start temperature", scan.start_temperature)?;
    if scan.steps.is_empty() {
        return Err(GtrError::InvalidArgument(
            "temperature scan needs at least one step".into(),
        ));
    }
    for step in &scan.steps {
        finite("step range", step.range)?;
        finite("step slew rate", step.slew_rate)?;
    }
    Ok(())
}

/// Accept JSON booleans and the numeric flags some firmware versions send.
fn flag(cmd: &str, payload: Value) -> Result<bool> {
    match payload {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        other => Err(GtrError::UnexpectedPayload {
            command: cmd.to_string(),
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}

/// Accept integers and the float-encoded integers some firmware versions
/// send. Fractions are truncated toward zero.
fn integer(cmd: &str, payload: Value) -> Result<i32> {
    let unexpected = |reason: String| GtrError::UnexpectedPayload {
        command: cmd.to_string(),
        reason,
    };
    let n = match payload {
        Value::Number(n) => n,
        other => return Err(unexpected(format!("expected an integer, got {other}"))),
    };
    if let Some(v) = n.as_i64() {
        return i32::try_from(v).map_err(|_| unexpected(format!("{v} is out of range")));
    }
    match n.as_f64().map(f64::trunc) {
        Some(v) if v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) => Ok(v as i32),
        _ => Err(unexpected(format!("{n} is out of range"))),
    }
}

// =============================================================================
// Gtr
// =============================================================================

/// Client for one C-WAVE GTR.
pub struct Gtr {
    bridge: Bridge,
}

impl Gtr {
    /// Create a client using WebSocket links and default timeouts.
    pub fn new() -> Result<Self> {
        Self::with_options(BridgeOptions::default())
    }

    /// Create a client using WebSocket links.
    pub fn with_options(options: BridgeOptions) -> Result<Self> {
        Self::with_connector(Arc::new(WsConnector), options)
    }

    /// Create a client over an arbitrary link factory.
    pub fn with_connector(connector: Arc<dyn Connector>, options: BridgeOptions) -> Result<Self> {
        Ok(Self {
            bridge: Bridge::spawn(connector, options)?,
        })
    }

    fn set(&self, request: Request) -> Result<()> {
        self.bridge.query(request).map(drop)
    }

    fn get<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let cmd = request.cmd;
        decode_payload(cmd, self.bridge.query(request)?)
    }

    fn get_flag(&self, request: Request) -> Result<bool> {
        let cmd = request.cmd;
        flag(cmd, self.bridge.query(request)?)
    }

    fn get_int(&self, request: Request) -> Result<i32> {
        let cmd = request.cmd;
        integer(cmd, self.bridge.query(request)?)
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    /// Connect to the device, replacing any existing connection.
    ///
    /// `address` may be a host, `host:port` or a full `ws://` URL.
    #[instrument(skip(self), err)]
    pub fn connect(&self, address: &str) -> Result<()> {
        let address = DeviceAddress::parse(address)?;
        self.bridge.connect(address.url().clone())
    }

    /// Close the connection.
    #[instrument(skip(self), err)]
    pub fn disconnect(&self) -> Result<()> {
        self.bridge.disconnect()
    }

    /// Whether a connection is held. Performs no I/O.
    pub fn is_connected(&self) -> bool {
        self.bridge.is_connected()
    }

    // -------------------------------------------------------------------------
    // Status and system
    // -------------------------------------------------------------------------

    /// Fetch and decode the status block.
    #[instrument(skip(self), err)]
    pub fn get_status(&self) -> Result<StatusSnapshot> {
        let text: String = self.get(Request::get("status"))?;
        StatusSnapshot::from_base64(&text)
    }

    /// Status flags from a fresh status block.
    pub fn get_status_bits(&self) -> Result<StatusBits> {
        Ok(self.get_status()?.status_bits)
    }

    /// Whether the last wavelength dial has finished.
    #[instrument(skip(self), err)]
    pub fn get_dial_done(&self) -> Result<bool> {
        self.get_flag(Request::get("dial_done"))
    }

    /// Identification data.
    #[instrument(skip(self), err)]
    pub fn get_info(&self) -> Result<DeviceInfo> {
        self.get(Request::get("info"))
    }

    /// Reboot the device. The device drops the connection, which is expected.
    #[instrument(skip(self), err)]
    pub fn reboot(&self) -> Result<()> {
        self.set(Request::set(REBOOT_COMMAND, Value::Null))
    }

    /// Put both state machines into idle for full manual control.
    #[instrument(skip(self), err)]
    pub fn idle(&self) -> Result<()> {
        self.set(Request::set("idle", Value::Null))
    }

    // -------------------------------------------------------------------------
    // Wavelength
    // -------------------------------------------------------------------------

    /// Dial a new OPO wavelength.
    #[instrument(skip(self), err)]
    pub fn set_lambda(&self, request: LambdaRequest) -> Result<()> {
        let wavelength = finite("wavelength", request.wavelength)?;
        if wavelength <= 0.0 {
            return Err(GtrError::InvalidArgument(format!(
                "wavelength must be positive, got {wavelength}"
            )));
        }
        self.set(Request::set_with("lambda", &request)?)
    }

    /// Parameters of the last wavelength dial.
    #[instrument(skip(self), err)]
    pub fn get_lambda(&self) -> Result<LambdaRequest> {
        self.get(Request::get("lambda"))
    }

    /// Open or close a shutter.
    #[instrument(skip(self), err)]
    pub fn set_shutter(&self, channel: ShutterChannel, open: bool) -> Result<()> {
        self.set(Request::set("shutter", open).on(channel))
    }

    // -------------------------------------------------------------------------
    // Lyot filter
    // -------------------------------------------------------------------------

    /// Move the Lyot filter to its non-selective position.
    #[instrument(skip(self), err)]
    pub fn set_lyot_inselective(&self) -> Result<()> {
        self.set(Request::set("lyot_inselective", Value::Null))
    }

    /// Whether the Lyot filter is non-selective.
    #[instrument(skip(self), err)]
    pub fn get_lyot_inselective(&self) -> Result<bool> {
        self.get_flag(Request::get("lyot_inselective"))
    }

    /// Set the Lyot motor target.
    #[instrument(skip(self), err)]
    pub fn set_lyot_target(&self, target: i32) -> Result<()> {
        self.set(Request::set("lyot_target", target))
    }

    /// Lyot motor target.
    #[instrument(skip(self), err)]
    pub fn get_lyot_target(&self) -> Result<i32> {
        self.get_int(Request::get("lyot_target"))
    }

    /// Lyot motor position.
    #[instrument(skip(self), err)]
    pub fn get_lyot_position(&self) -> Result<i32> {
        self.get_int(Request::get("lyot_position"))
    }

    /// Start a Lyot scan between two motor positions.
    #[instrument(skip(self), err)]
    pub fn set_lyot_scan(&self, start_position: i32, end_position: i32) -> Result<()> {
        if start_position == end_position {
            return Err(GtrError::InvalidArgument(format!(
                "lyot scan start and end are both {start_position}"
            )));
        }
        let scan = LyotScan {
            start_position,
            end_position,
        };
        self.set(Request::set_with("lyot_scan", &scan)?)
    }

    // -------------------------------------------------------------------------
    // Piezos
    // -------------------------------------------------------------------------

    /// Set the operating mode of a piezo.
    #[instrument(skip(self), err)]
    pub fn set_piezo_mode(&self, channel: PiezoChannel, mode: PiezoMode) -> Result<()> {
        self.set(Request::set_with("piezo_mode", &mode)?.on(channel))
    }

    /// Operating mode of a piezo.
    #[instrument(skip(self), err)]
    pub fn get_piezo_mode(&self, channel: PiezoChannel) -> Result<PiezoMode> {
        self.get(Request::get("piezo_mode").on(channel))
    }

    /// Set the control loop setpoint.
    #[instrument(skip(self), err)]
    pub fn set_piezo_control_setpoint(&self, channel: PiezoChannel, level: f64) -> Result<()> {
        let level = finite("control setpoint", level)?;
        self.set(Request::set("piezo_control_setpoint", level).on(channel))
    }

    /// Control loop setpoint.
    #[instrument(skip(self), err)]
    pub fn get_piezo_control_setpoint(&self, channel: PiezoChannel) -> Result<f64> {
        self.get(Request::get("piezo_control_setpoint").on(channel))
    }

    /// Nudge the control loop output by `step`.
    #[instrument(skip(self), err)]
    pub fn set_piezo_control_output_step(&self, channel: PiezoChannel, step: f64) -> Result<()> {
        let step = finite("output step", step)?;
        self.set(Request::set("piezo_control_output_step", step).on(channel))
    }

    /// Select the signal feeding the control loop.
    #[instrument(skip(self), err)]
    pub fn set_piezo_control_input_source(
        &self,
        channel: PiezoChannel,
        source: PiezoControlSource,
    ) -> Result<()> {
        self.set(Request::set_with("piezo_control_input_source", &source)?.on(channel))
    }

    /// Signal feeding the control loop.
    #[instrument(skip(self), err)]
    pub fn get_piezo_control_input_source(&self, channel: PiezoChannel) -> Result<PiezoControlSource> {
        self.get(Request::get("piezo_control_input_source").on(channel))
    }

    /// Select the signal judging lock quality.
    #[instrument(skip(self), err)]
    pub fn set_piezo_control_criterion_source(
        &self,
        channel: PiezoChannel,
        source: PiezoControlSource,
    ) -> Result<()> {
        self.set(Request::set_with("piezo_control_criterion_source", &source)?.on(channel))
    }

    /// Signal judging lock quality.
    #[instrument(skip(self), err)]
    pub fn get_piezo_control_criterion_source(
        &self,
        channel: PiezoChannel,
    ) -> Result<PiezoControlSource> {
        self.get(Request::get("piezo_control_criterion_source").on(channel))
    }

    /// Set the lock criterion threshold.
    #[instrument(skip(self), err)]
    pub fn set_piezo_control_threshold(&self, channel: PiezoChannel, level: f64) -> Result<()> {
        let level = finite("threshold", level)?;
        self.set(Request::set("piezo_control_threshold", level).on(channel))
    }

    /// Lock criterion threshold.
    #[instrument(skip(self), err)]
    pub fn get_piezo_control_threshold(&self, channel: PiezoChannel) -> Result<f64> {
        self.get(Request::get("piezo_control_threshold").on(channel))
    }

    /// Set the scan window used in scan mode.
    #[instrument(skip(self), err)]
    pub fn set_piezo_scan_settings(
        &self,
        channel: PiezoChannel,
        settings: PiezoScanSettings,
    ) -> Result<()> {
        validate_scan_settings(&settings)?;
        self.set(Request::set_with("piezo_scan_settings", &settings)?.on(channel))
    }

    /// Scan window used in scan mode.
    #[instrument(skip(self), err)]
    pub fn get_piezo_scan_settings(&self, channel: PiezoChannel) -> Result<PiezoScanSettings> {
        self.get(Request::get("piezo_scan_settings").on(channel))
    }

    /// Set the output level used in manual mode, in percent.
    #[instrument(skip(self), err)]
    pub fn set_piezo_manual_output(&self, channel: PiezoChannel, value: f64) -> Result<()> {
        let value = percent("manual output", value)?;
        self.set(Request::set("piezo_manual_output", value).on(channel))
    }

    /// Output level used in manual mode.
    #[instrument(skip(self), err)]
    pub fn get_piezo_manual_output(&self, channel: PiezoChannel) -> Result<f64> {
        self.get(Request::get("piezo_manual_output").on(channel))
    }

    /// Configure the scan window, then switch the piezo to scan mode.
    pub fn scan_piezo(&self, channel: PiezoChannel, settings: PiezoScanSettings) -> Result<()> {
        self.set_piezo_scan_settings(channel, settings)?;
        self.set_piezo_mode(channel, PiezoMode::Scan)
    }

    /// Switch the piezo to manual mode and park it at `level` percent.
    pub fn stop_piezo(&self, channel: PiezoChannel, level: f64) -> Result<()> {
        percent("manual output", level)?;
        self.set_piezo_mode(channel, PiezoMode::Manual)?;
        self.set_piezo_manual_output(channel, level)
    }

    // -------------------------------------------------------------------------
    // Steppers
    // -------------------------------------------------------------------------

    /// Move a crystal stepper to its inactive position.
    #[instrument(skip(self), err)]
    pub fn set_stepper_inactive_position(&self, channel: StepperChannel) -> Result<()> {
        self.set(Request::set("stepper_inactive_position", Value::Null).on(channel))
    }

    /// Select the crystal poling period.
    #[instrument(skip(self), err)]
    pub fn set_stepper_period(&self, channel: StepperChannel, period: i32) -> Result<()> {
        self.set(Request::set("stepper_period", period).on(channel))
    }

    /// Selected crystal poling period.
    #[instrument(skip(self), err)]
    pub fn get_stepper_period(&self, channel: StepperChannel) -> Result<i32> {
        self.get_int(Request::get("stepper_period").on(channel))
    }

    /// Set the stepper target position.
    #[instrument(skip(self), err)]
    pub fn set_stepper_target(&self, channel: StepperChannel, position: i32) -> Result<()> {
        self.set(Request::set("stepper_target", position).on(channel))
    }

    /// Stepper target position.
    #[instrument(skip(self), err)]
    pub fn get_stepper_target(&self, channel: StepperChannel) -> Result<i32> {
        self.get_int(Request::get("stepper_target").on(channel))
    }

    /// Stepper position.
    #[instrument(skip(self), err)]
    pub fn get_stepper_position(&self, channel: StepperChannel) -> Result<i32> {
        self.get_int(Request::get("stepper_position").on(channel))
    }

    /// Start a homing run.
    #[instrument(skip(self), err)]
    pub fn start_stepper_homing(&self, channel: StepperChannel) -> Result<()> {
        self.set(Request::set("stepper_starthoming", Value::Null).on(channel))
    }

    // -------------------------------------------------------------------------
    // Temperature controllers
    // -------------------------------------------------------------------------

    /// Enable or disable a temperature controller.
    #[instrument(skip(self), err)]
    pub fn set_tec_enabled(&self, channel: TecChannel, enabled: bool) -> Result<()> {
        self.set(Request::set("tec_enabled", enabled).on(channel))
    }

    /// Whether a temperature controller is enabled.
    #[instrument(skip(self), err)]
    pub fn get_tec_enabled(&self, channel: TecChannel) -> Result<bool> {
        self.get_flag(Request::get("tec_enabled").on(channel))
    }

    /// Set a temperature controller setpoint in degrees Celsius.
    #[instrument(skip(self), err)]
    pub fn set_tec_setpoint(&self, channel: TecChannel, temperature: f64) -> Result<()> {
        let temperature = finite("temperature", temperature)?;
        self.set(Request::set("tec_setpoint", temperature).on(channel))
    }

    /// Temperature controller setpoint.
    #[instrument(skip(self), err)]
    pub fn get_tec_setpoint(&self, channel: TecChannel) -> Result<f64> {
        self.get(Request::get("tec_setpoint").on(channel))
    }

    // -------------------------------------------------------------------------
    // Wavelength meter lock
    // -------------------------------------------------------------------------

    /// Enable or disable the wavelength-meter lock.
    #[instrument(skip(self), err)]
    pub fn set_wlm_enabled(&self, enabled: bool) -> Result<()> {
        self.set(Request::set("wlm_enabled", enabled))
    }

    /// Whether the wavelength-meter lock is enabled.
    #[instrument(skip(self), err)]
    pub fn get_wlm_enabled(&self) -> Result<bool> {
        self.get_flag(Request::get("wlm_enabled"))
    }

    /// Set the wavelength-meter lock setpoint in nm.
    #[instrument(skip(self), err)]
    pub fn set_wlm_setpoint(&self, wavelength: f64) -> Result<()> {
        let wavelength = finite("wlm setpoint", wavelength)?;
        self.set(Request::set("wlm_setpoint", wavelength))
    }

    /// Wavelength-meter lock setpoint.
    #[instrument(skip(self), err)]
    pub fn get_wlm_setpoint(&self) -> Result<f64> {
        self.get(Request::get("wlm_setpoint"))
    }

    /// Set the proportional gain of the wavelength-meter lock.
    #[instrument(skip(self), err)]
    pub fn set_wlm_kp(&self, p_factor: f64) -> Result<()> {
        let p_factor = finite("wlm kp", p_factor)?;
        self.set(Request::set("wlm_kp", p_factor))
    }

    /// Proportional gain of the wavelength-meter lock.
    #[instrument(skip(self), err)]
    pub fn get_wlm_kp(&self) -> Result<f64> {
        self.get(Request::get("wlm_kp"))
    }

    /// Set the integral gain of the wavelength-meter lock.
    #[instrument(skip(self), err)]
    pub fn set_wlm_ki(&self, i_factor: f64) -> Result<()> {
        let i_factor = finite("wlm ki", i_factor)?;
        self.set(Request::set("wlm_ki", i_factor))
    }

    /// Integral gain of the wavelength-meter lock.
    #[instrument(skip(self), err)]
    pub fn get_wlm_ki(&self) -> Result<f64> {
        self.get(Request::get("wlm_ki"))
    }

    /// Enter or leave absolute wavelength stabilization.
    #[instrument(skip(self), err)]
    pub fn set_stabilize_wlm(&self, enabled: bool) -> Result<()> {
        self.set(Request::set("stabilize_wlm", enabled))
    }

    // -------------------------------------------------------------------------
    // Optimization and calibration
    // -------------------------------------------------------------------------

    /// Read a calibration map.
    #[instrument(skip(self), err)]
    pub fn get_mapping_field<T: DeserializeOwned>(&self, channel: MappingFieldChannel) -> Result<T> {
        self.get(Request::get("mapping_field").on(channel))
    }

    /// Start etalon optimization, optionally over a custom range.
    #[instrument(skip(self), err)]
    pub fn set_etalon_optimize(&self, scan_range: Option<f64>) -> Result<()> {
        if let Some(range) = scan_range {
            finite("etalon scan range", range)?;
        }
        self.set(Request::set("etalon_optimize", scan_range))
    }

    /// Start crystal temperature optimization.
    ///
    /// `None` uses the device defaults.
    #[instrument(skip(self), err)]
    pub fn set_temperature_optimize(
        &self,
        channel: TemperatureOptimizeChannel,
        scan: Option<TemperatureScan>,
    ) -> Result<()> {
        if let Some(scan) = &scan {
            validate_temperature_scan(scan)?;
        }
        self.set(Request::set_with("temperature_optimize", &scan)?.on(channel))
    }

    /// Download the latest scan data.
    #[instrument(skip(self), err)]
    pub fn get_scan<T: DeserializeOwned>(&self, channel: ScanChannel) -> Result<T> {
        self.get(Request::get("scan").on(channel))
    }

    /// Start the OPO reference calibration.
    #[instrument(skip(self), err)]
    pub fn calibrate_reference(&self) -> Result<()> {
        self.set(Request::set("calibrate_reference", Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;
    use crate::types::ScanStep;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn percent_bounds_are_inclusive() {
        assert_eq!(percent("x", 0.0).unwrap(), 0.0);
        assert_eq!(percent("x", 100.0).unwrap(), 100.0);
        assert!(percent("x", 100.5).is_err());
        assert!(percent("x", -0.1).is_err());
        assert!(percent("x", f64::NAN).is_err());
    }

    #[test]
    fn scan_settings_must_be_ordered_and_positive() {
        let ok = PiezoScanSettings {
            min: 10.0,
            max: 90.0,
            rate: 1.0,
        };
        assert!(validate_scan_settings(&ok).is_ok());
        assert!(validate_scan_settings(&PiezoScanSettings { min: 95.0, ..ok }).is_err());
        assert!(validate_scan_settings(&PiezoScanSettings { rate: 0.0, ..ok }).is_err());
        assert!(validate_scan_settings(&PiezoScanSettings { max: 101.0, ..ok }).is_err());
    }

    #[test]
    fn temperature_scan_needs_steps() {
        let mut scan = TemperatureScan {
            start_temperature: 40.0,
            steps: Vec::new(),
        };
        assert!(validate_temperature_scan(&scan).is_err());
        scan.steps.push(ScanStep {
            range: 1.0,
            slew_rate: f64::INFINITY,
        });
        assert!(validate_temperature_scan(&scan).is_err());
        scan.steps[0].slew_rate = 0.05;
        assert!(validate_temperature_scan(&scan).is_ok());
    }

    #[test]
    fn flags_accept_numbers() {
        assert!(flag("dial_done", json!(true)).unwrap());
        assert!(flag("dial_done", json!(1)).unwrap());
        assert!(!flag("dial_done", json!(0)).unwrap());
        assert!(matches!(
            flag("dial_done", json!("yes")),
            Err(GtrError::UnexpectedPayload { .. })
        ));
    }

    #[test]
    fn integers_accept_float_encoding() {
        assert_eq!(integer("lyot_target", json!(1800)).unwrap(), 1800);
        assert_eq!(integer("lyot_target", json!(1800.0)).unwrap(), 1800);
        assert_eq!(integer("stepper_position", json!(-42.9)).unwrap(), -42);
        for bad in [json!("1800"), json!(null), json!(1e12), json!(i64::MAX)] {
            assert!(matches!(
                integer("lyot_target", bad),
                Err(GtrError::UnexpectedPayload { .. })
            ));
        }
    }

    #[test]
    #[traced_test]
    fn rejected_arguments_are_logged() {
        let connector = MockConnector::new();
        let gtr = Gtr::with_connector(Arc::new(connector.clone()), BridgeOptions::default())
            .unwrap();
        gtr.connect("gtr.test").unwrap();

        assert!(gtr.set_piezo_manual_output(PiezoChannel::Opo, 150.0).is_err());
        assert!(logs_contain("manual output must be within [0, 100]"));
        assert_eq!(connector.device().sent_commands(), Vec::<String>::new());
    }
}
