//! Simulated C-WAVE GTR for tests, benches and the `--mock` CLI flag.
//!
//! [`MockConnector`] hands out [`MockTransport`] links that are all served
//! by one shared [`MockDevice`]. The device keeps its state in a
//! [`StatusSnapshot`], so values written through commands show up in the
//! next `status` block. Every link operation is appended to an event log
//! that tests can inspect:
//!
//! ```rust,ignore
//! let connector = MockConnector::new();
//! let gtr = Gtr::with_connector(Arc::new(connector.clone()), BridgeOptions::default())?;
//! gtr.connect("gtr.test")?;
//! gtr.set_wlm_setpoint(737.1)?;
//! assert_eq!(connector.device().sent_commands(), vec!["wlm_setpoint"]);
//! ```

use crate::bridge::REBOOT_COMMAND;
use crate::channel::RequestKind;
use crate::error::{GtrError, Result};
use crate::telemetry::{OpoState, PiezoMode, ShgState, ShutterState, StatusSnapshot};
use crate::transport::{Connector, Transport};
use crate::types::{
    Channel, DeviceInfo, LambdaRequest, LyotScan, MappingFieldChannel, PiezoChannel,
    PiezoScanSettings, ScanChannel, ShutterChannel, StepperChannel, TecChannel,
    TemperatureOptimizeChannel, TemperatureScan,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

// =============================================================================
// Event log
// =============================================================================

/// Link operation observed by the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A link was opened to the URL
    Connect(String),
    /// A text frame was received from the client
    Send(String),
    /// The client closed a link
    Close,
}

// =============================================================================
// Device state
// =============================================================================

struct SimulatedGtr {
    status: StatusSnapshot,
    lambda: LambdaRequest,
    info: DeviceInfo,
    dial_done: bool,
}

impl Default for SimulatedGtr {
    fn default() -> Self {
        let mut status = StatusSnapshot {
            abi_version: 1,
            target_wavelength: 1064.0,
            measured_wavelength: 1064.0,
            opo_state: OpoState::Stabilize,
            ..Default::default()
        };
        status.status_bits.temp_opo = true;
        status.status_bits.lock_opo = true;
        status.status_bits.pump_power = true;
        status.allowed_actions.dial = true;
        status.wlm.setpoint = 1064.0;
        status.temperatures.board = 35.0;
        for channel in PiezoChannel::ALL {
            let piezo = status.piezo_mut(*channel);
            piezo.manual_output = 50.0;
            piezo.output = 50.0;
            piezo.scan_max = 100.0;
            piezo.scan_rate = 1.0;
        }
        for channel in TecChannel::ALL {
            let tec = status.tec_mut(*channel);
            tec.enabled = true;
            tec.setpoint = 40.0;
            tec.temperature = 40.0;
        }
        Self {
            status,
            lambda: LambdaRequest {
                wavelength: 1064.0,
                request_shg: false,
                use_wlm_for_shg: false,
            },
            info: DeviceInfo {
                name: "C-WAVE GTR (simulated)".into(),
                version: "0.0.0".into(),
                revision: 1,
                serial_number: 1,
                mac: "00:00:00:00:00:00".into(),
            },
            dial_done: true,
        }
    }
}

fn parse<T: DeserializeOwned>(arg: Value) -> std::result::Result<T, String> {
    serde_json::from_value(arg).map_err(|e| format!("invalid argument: {e}"))
}

fn channel<C: Channel + FromStr>(chan: Option<&str>) -> std::result::Result<C, String> {
    chan.and_then(|key| key.parse().ok())
        .ok_or_else(|| format!("invalid channel: {}", chan.unwrap_or("null")))
}

fn render<T: Serialize>(value: &T) -> std::result::Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Read or overwrite one stored value.
fn property<T: Serialize + DeserializeOwned>(
    kind: RequestKind,
    arg: Value,
    slot: &mut T,
) -> std::result::Result<Value, String> {
    match kind {
        RequestKind::Get => render(slot),
        RequestKind::Set => {
            *slot = parse(arg)?;
            Ok(Value::Null)
        }
    }
}

fn read_only(kind: RequestKind, value: Value) -> std::result::Result<Value, String> {
    match kind {
        RequestKind::Get => Ok(value),
        RequestKind::Set => Err("read-only".into()),
    }
}

fn action(kind: RequestKind) -> std::result::Result<(), String> {
    match kind {
        RequestKind::Set => Ok(()),
        RequestKind::Get => Err("write-only".into()),
    }
}

impl SimulatedGtr {
    fn handle(
        &mut self,
        cmd: &str,
        chan: Option<&str>,
        kind: RequestKind,
        arg: Value,
    ) -> std::result::Result<Value, String> {
        let status = &mut self.status;
        match cmd {
            "status" => read_only(kind, Value::String(status.to_base64())),
            "dial_done" => read_only(kind, json!(self.dial_done)),
            "info" => read_only(kind, render(&self.info)?),
            "lambda" => {
                if kind == RequestKind::Set {
                    let request: LambdaRequest = parse(arg)?;
                    if !(request.wavelength > 0.0) {
                        return Err("wavelength out of range".into());
                    }
                    self.lambda = request;
                    status.target_wavelength = request.wavelength;
                    status.measured_wavelength = request.wavelength;
                    status.opo_state = OpoState::Stabilize;
                    status.shg_state = if request.request_shg {
                        ShgState::Stabilize
                    } else {
                        ShgState::Idle
                    };
                    status.status_bits.shg_requested = request.request_shg;
                    status.status_bits.use_wlm_for_shg = request.use_wlm_for_shg;
                    self.dial_done = true;
                    Ok(Value::Null)
                } else {
                    render(&self.lambda)
                }
            }
            "shutter" => {
                action(kind)?;
                let open: bool = parse(arg)?;
                *status.shutter_mut(channel::<ShutterChannel>(chan)?) = if open {
                    ShutterState::Open
                } else {
                    ShutterState::Closed
                };
                Ok(Value::Null)
            }
            "lyot_inselective" => match kind {
                RequestKind::Set => {
                    status.lyot.is_inselective = true;
                    Ok(Value::Null)
                }
                RequestKind::Get => Ok(json!(status.lyot.is_inselective)),
            },
            "lyot_target" => {
                let result = property(kind, arg, &mut status.lyot.target)?;
                status.lyot.position = status.lyot.target;
                Ok(result)
            }
            "lyot_position" => read_only(kind, json!(status.lyot.position)),
            "lyot_scan" => {
                action(kind)?;
                let scan: LyotScan = parse(arg)?;
                if scan.start_position == scan.end_position {
                    return Err("empty scan range".into());
                }
                Ok(Value::Null)
            }
            "piezo_mode" => {
                let piezo = status.piezo_mut(channel(chan)?);
                let result = property(kind, arg, &mut piezo.mode)?;
                if piezo.mode == PiezoMode::Manual {
                    piezo.output = piezo.manual_output;
                }
                Ok(result)
            }
            "piezo_control_setpoint" => {
                property(kind, arg, &mut status.piezo_mut(channel(chan)?).setpoint)
            }
            "piezo_control_output_step" => {
                action(kind)?;
                let step: f64 = parse(arg)?;
                let piezo = status.piezo_mut(channel(chan)?);
                piezo.output = (piezo.output + step).clamp(0.0, 100.0);
                Ok(Value::Null)
            }
            "piezo_control_input_source" => {
                property(kind, arg, &mut status.piezo_mut(channel(chan)?).input_source)
            }
            "piezo_control_criterion_source" => property(
                kind,
                arg,
                &mut status.piezo_mut(channel(chan)?).criterion_source,
            ),
            "piezo_control_threshold" => {
                property(kind, arg, &mut status.piezo_mut(channel(chan)?).threshold)
            }
            "piezo_scan_settings" => {
                let piezo = status.piezo_mut(channel(chan)?);
                if kind == RequestKind::Set {
                    let settings: PiezoScanSettings = parse(arg)?;
                    piezo.scan_min = settings.min;
                    piezo.scan_max = settings.max;
                    piezo.scan_rate = settings.rate;
                    Ok(Value::Null)
                } else {
                    render(&PiezoScanSettings {
                        min: piezo.scan_min,
                        max: piezo.scan_max,
                        rate: piezo.scan_rate,
                    })
                }
            }
            "piezo_manual_output" => {
                let piezo = status.piezo_mut(channel(chan)?);
                if kind == RequestKind::Set {
                    let level: f64 = parse(arg)?;
                    if !(0.0..=100.0).contains(&level) {
                        return Err("out of range".into());
                    }
                    piezo.manual_output = level;
                    if piezo.mode == PiezoMode::Manual {
                        piezo.output = level;
                    }
                    Ok(Value::Null)
                } else {
                    Ok(json!(piezo.manual_output))
                }
            }
            "stepper_inactive_position" => {
                action(kind)?;
                status.stepper_mut(channel(chan)?).is_inactive_position = true;
                Ok(Value::Null)
            }
            "stepper_period" => {
                let stepper = status.stepper_mut(channel(chan)?);
                if kind == RequestKind::Set {
                    let period: i32 = parse(arg)?;
                    stepper.target_period =
                        i8::try_from(period).map_err(|_| "out of range".to_string())?;
                    Ok(Value::Null)
                } else {
                    Ok(json!(stepper.target_period))
                }
            }
            "stepper_target" => {
                let stepper = status.stepper_mut(channel::<StepperChannel>(chan)?);
                let result = property(kind, arg, &mut stepper.target)?;
                if kind == RequestKind::Set {
                    stepper.position = stepper.target;
                    stepper.is_inactive_position = false;
                }
                Ok(result)
            }
            "stepper_position" => read_only(
                kind,
                json!(status.stepper(channel(chan)?).position),
            ),
            "stepper_starthoming" => {
                action(kind)?;
                let stepper = status.stepper_mut(channel(chan)?);
                stepper.position = 0;
                stepper.target = 0;
                stepper.homing_state = Default::default();
                Ok(Value::Null)
            }
            "tec_enabled" => property(kind, arg, &mut status.tec_mut(channel(chan)?).enabled),
            "tec_setpoint" => {
                let tec = status.tec_mut(channel(chan)?);
                let result = property(kind, arg, &mut tec.setpoint)?;
                tec.temperature = tec.setpoint;
                Ok(result)
            }
            "wlm_enabled" => property(kind, arg, &mut status.wlm.enabled),
            "wlm_setpoint" => property(kind, arg, &mut status.wlm.setpoint),
            "wlm_kp" => property(kind, arg, &mut status.wlm.k_p),
            "wlm_ki" => property(kind, arg, &mut status.wlm.k_i),
            "mapping_field" => {
                let points = match channel::<MappingFieldChannel>(chan)? {
                    MappingFieldChannel::XtalOpo => json!([[1.0, 1450.0], [2.0, 1520.0]]),
                    MappingFieldChannel::XtalShg => json!([[1.0, 725.0], [2.0, 760.0]]),
                    MappingFieldChannel::Lyot => json!([[0, 1450.0], [4000, 1600.0]]),
                };
                read_only(kind, points)
            }
            "scan" => {
                let points = match channel::<ScanChannel>(chan)? {
                    ScanChannel::Lyot => json!([[0, 0.1], [100, 0.8], [200, 0.2]]),
                    _ => json!([[40.0, 0.2], [40.5, 0.9], [41.0, 0.3]]),
                };
                read_only(kind, points)
            }
            "etalon_optimize" => {
                action(kind)?;
                let _range: Option<f64> = parse(arg)?;
                Ok(Value::Null)
            }
            "temperature_optimize" => {
                action(kind)?;
                let _channel: TemperatureOptimizeChannel = channel(chan)?;
                let _scan: Option<TemperatureScan> = parse(arg)?;
                Ok(Value::Null)
            }
            "calibrate_reference" => action(kind).map(|()| Value::Null),
            "stabilize_wlm" => {
                action(kind)?;
                let enabled: bool = parse(arg)?;
                status.opo_state = if enabled {
                    OpoState::StabilizeWlm
                } else {
                    OpoState::Stabilize
                };
                Ok(Value::Null)
            }
            "idle" => {
                action(kind)?;
                status.opo_state = OpoState::Idle;
                status.shg_state = ShgState::Idle;
                Ok(Value::Null)
            }
            _ => Err("unknown command".into()),
        }
    }
}

/// What the device does with one received frame.
enum Response {
    Reply(String),
    DropLink,
}

#[derive(Default)]
struct DeviceState {
    gtr: SimulatedGtr,
    events: Vec<TransportEvent>,
    epoch: u64,
    refuse_next_connect: bool,
    fail_next_close: bool,
    close_link_on: Option<String>,
    reply_delay: Option<Duration>,
    scripted: VecDeque<String>,
    outstanding: usize,
    max_outstanding: usize,
}

impl DeviceState {
    fn receive(&mut self, text: String) -> Response {
        self.events.push(TransportEvent::Send(text.clone()));

        let request: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let cmd = request.get("cmd").and_then(Value::as_str).unwrap_or_default();
        if cmd == REBOOT_COMMAND || self.close_link_on.as_deref() == Some(cmd) {
            debug!(cmd, "simulated device dropping link");
            return Response::DropLink;
        }

        self.outstanding += 1;
        self.max_outstanding = self.max_outstanding.max(self.outstanding);

        if let Some(raw) = self.scripted.pop_front() {
            return Response::Reply(raw);
        }

        let uid = request.get("uid").cloned().unwrap_or(Value::Null);
        let chan = request.get("chan").and_then(Value::as_str);
        let arg = request.get("arg").cloned().unwrap_or(Value::Null);
        let kind = match request.get("type").and_then(Value::as_str) {
            Some("get") => Ok(RequestKind::Get),
            Some("set") => Ok(RequestKind::Set),
            _ => Err("invalid request type".to_string()),
        };
        let reply = match kind.and_then(|kind| self.gtr.handle(cmd, chan, kind, arg)) {
            Ok(arg) => json!({"uid": uid, "res": "ok", "arg": arg}),
            Err(message) => json!({"uid": uid, "res": "error", "arg": message}),
        };
        Response::Reply(reply.to_string())
    }
}

// =============================================================================
// MockDevice
// =============================================================================

/// Shared handle to the simulated device.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// A device in its power-up state.
    pub fn new() -> Self {
        Self::default()
    }

    /// All link events so far.
    pub fn events(&self) -> Vec<TransportEvent> {
        self.state.lock().events.clone()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Every received frame parsed as JSON.
    pub fn sent_requests(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Send(text) => serde_json::from_str(&text).ok(),
                _ => None,
            })
            .collect()
    }

    /// Command names of every received frame.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent_requests()
            .iter()
            .filter_map(|request| request.get("cmd").and_then(Value::as_str))
            .map(str::to_owned)
            .collect()
    }

    /// Highest number of requests that were awaiting a reply at once.
    pub fn max_outstanding(&self) -> usize {
        self.state.lock().max_outstanding
    }

    /// Current status block contents.
    pub fn status(&self) -> StatusSnapshot {
        self.state.lock().gtr.status.clone()
    }

    /// Modify the status block contents.
    pub fn update_status(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        f(&mut self.state.lock().gtr.status);
    }

    /// Reject the next connection attempt.
    pub fn refuse_next_connect(&self) {
        self.state.lock().refuse_next_connect = true;
    }

    /// Make the next client close report an error.
    pub fn fail_next_close(&self) {
        self.state.lock().fail_next_close = true;
    }

    /// Drop the link instead of answering `cmd`.
    pub fn close_link_on(&self, cmd: impl Into<String>) {
        self.state.lock().close_link_on = Some(cmd.into());
    }

    /// Hold back the next reply for `delay`.
    pub fn delay_next_reply(&self, delay: Duration) {
        self.state.lock().reply_delay = Some(delay);
    }

    /// Answer the next request with `raw` instead of handling it.
    pub fn push_reply(&self, raw: impl Into<String>) {
        self.state.lock().scripted.push_back(raw.into());
    }

    /// Drop every open link from the device side.
    pub fn drop_links(&self) {
        self.state.lock().epoch += 1;
    }
}

// =============================================================================
// MockConnector / MockTransport
// =============================================================================

/// [`Connector`] serving links from a [`MockDevice`].
#[derive(Clone, Default)]
pub struct MockConnector {
    device: MockDevice,
}

impl MockConnector {
    /// A connector for a fresh device.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector for an existing device.
    pub fn with_device(device: MockDevice) -> Self {
        Self { device }
    }

    /// The device behind this connector.
    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>> {
        let mut state = self.device.state.lock();
        if std::mem::take(&mut state.refuse_next_connect) {
            return Err(GtrError::ConnectionFailed {
                address: url.to_string(),
                reason: "connection refused (simulated)".into(),
            });
        }
        state.events.push(TransportEvent::Connect(url.to_string()));
        Ok(Box::new(MockTransport {
            device: self.device.clone(),
            epoch: state.epoch,
            pending: VecDeque::new(),
            closed: false,
        }))
    }
}

/// One link to the simulated device.
pub struct MockTransport {
    device: MockDevice,
    epoch: u64,
    pending: VecDeque<String>,
    closed: bool,
}

impl MockTransport {
    fn is_closed(&self) -> bool {
        self.closed || self.device.state.lock().epoch != self.epoch
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.is_closed() {
            return Err(GtrError::NotConnected);
        }
        match self.device.state.lock().receive(text) {
            Response::Reply(reply) => self.pending.push_back(reply),
            Response::DropLink => self.closed = true,
        }
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<Option<String>> {
        let delay = self.device.state.lock().reply_delay.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.is_closed() {
            return Ok(None);
        }
        match self.pending.pop_front() {
            Some(reply) => {
                let mut state = self.device.state.lock();
                state.outstanding = state.outstanding.saturating_sub(1);
                Ok(Some(reply))
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        let mut state = self.device.state.lock();
        state.outstanding = state.outstanding.saturating_sub(self.pending.len());
        self.pending.clear();
        state.events.push(TransportEvent::Close);
        if std::mem::take(&mut state.fail_next_close) {
            return Err(GtrError::Transport("close failed (simulated)".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cmd: &str, chan: Option<&str>, kind: &str, arg: Value) -> String {
        json!({"uid": 1, "cmd": cmd, "chan": chan, "type": kind, "arg": arg}).to_string()
    }

    fn reply(state: &mut DeviceState, text: String) -> Value {
        match state.receive(text) {
            Response::Reply(raw) => serde_json::from_str(&raw).unwrap(),
            Response::DropLink => panic!("link dropped"),
        }
    }

    #[test]
    fn set_then_get_round_trips_through_state() {
        let mut state = DeviceState::default();
        let set = reply(&mut state, request("wlm_setpoint", None, "set", json!(737.1)));
        assert_eq!(set, json!({"uid": 1, "res": "ok", "arg": null}));

        let get = reply(&mut state, request("wlm_setpoint", None, "get", Value::Null));
        assert_eq!(get["arg"], json!(737.1));
        assert_eq!(state.gtr.status.wlm.setpoint, 737.1);
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let mut state = DeviceState::default();
        let answer = reply(&mut state, request("warp_drive", None, "set", json!(9)));
        assert_eq!(answer["res"], "error");
        assert_eq!(answer["arg"], "unknown command");
    }

    #[test]
    fn bad_channel_is_rejected() {
        let mut state = DeviceState::default();
        let answer = reply(&mut state, request("piezo_mode", Some("idler"), "get", Value::Null));
        assert_eq!(answer["res"], "error");
    }

    #[test]
    fn manual_output_range_is_enforced_by_device() {
        let mut state = DeviceState::default();
        let answer = reply(
            &mut state,
            request("piezo_manual_output", Some("opo"), "set", json!(120.0)),
        );
        assert_eq!(answer["arg"], "out of range");
    }

    #[test]
    fn status_reflects_written_values() {
        let mut state = DeviceState::default();
        reply(&mut state, request("shutter", Some("pump"), "set", json!(true)));
        let answer = reply(&mut state, request("status", None, "get", Value::Null));
        let snapshot = StatusSnapshot::from_base64(answer["arg"].as_str().unwrap()).unwrap();
        assert_eq!(snapshot.shutter(ShutterChannel::Pump), ShutterState::Open);
    }

    #[test]
    fn reboot_drops_link() {
        let mut state = DeviceState::default();
        assert!(matches!(
            state.receive(request("reboot", None, "set", Value::Null)),
            Response::DropLink
        ));
    }

    #[test]
    fn scripted_reply_is_sent_verbatim() {
        let mut state = DeviceState::default();
        state.scripted.push_back(r#"{"res":"error","arg":"out of range"}"#.into());
        let answer = reply(&mut state, request("wlm_kp", None, "get", Value::Null));
        assert_eq!(answer, json!({"res": "error", "arg": "out of range"}));
    }
}
