//! The 925-byte status block.
//!
//! The layout is not self-describing: every field is read in firmware order
//! and nested records are decoded inline. Decoding is all-or-nothing; a
//! failure anywhere returns the error and no snapshot.

use super::bits::{AllowedActionBits, StatusBits};
use super::enums::{
    read_u8_enum, write_u8_enum, MonitorSource, OpoState, ShgState, ShutterState, TriggerSource,
};
use super::records::{PiezoStatus, StepperStatus, TecStatus};
use crate::error::{GtrError, Result};
use crate::reader::{BinaryReader, BinaryWriter};
use crate::types::{PiezoChannel, ShutterChannel, StepperChannel, TecChannel};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Exact length of a decoded status block.
pub const STATUS_BLOCK_LEN: usize = 925;

/// Wavelength-meter lock settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WlmStatus {
    /// Lock enabled
    pub enabled: bool,
    /// Lock setpoint in nm
    pub setpoint: f64,
    /// Proportional gain
    pub k_p: f64,
    /// Integral gain
    pub k_i: f64,
}

/// Housekeeping temperatures in degrees Celsius.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardTemperatures {
    /// Processor die
    pub soc: f64,
    /// Main board
    pub board: f64,
    /// Optical baseplate
    pub baseplate: f64,
    /// Housing
    pub case: f64,
}

/// Lock-in amplifier readings and configuration words.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInStatus {
    /// Averaged demodulated signal
    pub average: f64,
    /// Moving average of the demodulated signal
    pub moving_average: f64,
    /// Lock-in enabled
    pub enabled: bool,
    /// Modulation clock divisor word
    pub mod_divisor_bits: u32,
    /// Modulation frequency word
    pub frequency: u32,
    /// Demodulation phase word
    pub phase: u32,
    /// Averaging configuration word
    pub averaging_bits: u32,
    /// Output clock divisor word
    pub out_divisor_bits: u32,
}

/// Position of every shutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutterStates {
    /// Main laser output
    pub laser_out: ShutterState,
    /// OPO output
    pub opo_out: ShutterState,
    /// SHG output
    pub shg_out: ShutterState,
    /// Pump input
    pub pump: ShutterState,
    /// MIR output
    pub mir_out: ShutterState,
}

/// Lyot filter motor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyotStatus {
    /// Current motor position
    pub position: i32,
    /// Target motor position
    pub target: i32,
    /// Motor is moving
    pub is_moving: bool,
    /// Filter is parked at its non-selective position
    pub is_inselective: bool,
    /// Step frequency in Hz
    pub frequency: f64,
}

/// Photodiode calibration and readings.
///
/// Channels without a live power reading only carry full scale and scaling
/// factor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photodiodes {
    /// Pump photodiode full scale
    pub pump_full_scale: f64,
    /// Pump power
    pub pump_power: f64,
    /// Pump photodiode scaling factor
    pub pump_scaling_factor: f64,
    /// OPO photodiode full scale
    pub opo_full_scale: f64,
    /// OPO power
    pub opo_power: f64,
    /// OPO photodiode scaling factor
    pub opo_scaling_factor: f64,
    /// SHG photodiode full scale
    pub shg_full_scale: f64,
    /// SHG power
    pub shg_power: f64,
    /// SHG photodiode scaling factor
    pub shg_scaling_factor: f64,
    /// SHG PDH photodiode full scale
    pub shg_pdh_full_scale: f64,
    /// SHG PDH photodiode scaling factor
    pub shg_pdh_scaling_factor: f64,
    /// Etalon photodiode full scale
    pub etalon_full_scale: f64,
    /// Etalon photodiode scaling factor
    pub etalon_scaling_factor: f64,
    /// Reference photodiode full scale
    pub ref_full_scale: f64,
    /// Reference photodiode scaling factor
    pub ref_scaling_factor: f64,
    /// Auxiliary photodiode full scale
    pub aux_full_scale: f64,
    /// Auxiliary photodiode scaling factor
    pub aux_scaling_factor: f64,
}

impl Photodiodes {
    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            pump_full_scale: reader.read_f64()?,
            pump_power: reader.read_f64()?,
            pump_scaling_factor: reader.read_f64()?,
            opo_full_scale: reader.read_f64()?,
            opo_power: reader.read_f64()?,
            opo_scaling_factor: reader.read_f64()?,
            shg_full_scale: reader.read_f64()?,
            shg_power: reader.read_f64()?,
            shg_scaling_factor: reader.read_f64()?,
            shg_pdh_full_scale: reader.read_f64()?,
            shg_pdh_scaling_factor: reader.read_f64()?,
            etalon_full_scale: reader.read_f64()?,
            etalon_scaling_factor: reader.read_f64()?,
            ref_full_scale: reader.read_f64()?,
            ref_scaling_factor: reader.read_f64()?,
            aux_full_scale: reader.read_f64()?,
            aux_scaling_factor: reader.read_f64()?,
        })
    }

    fn encode(&self, writer: &mut BinaryWriter) {
        for value in [
            self.pump_full_scale,
            self.pump_power,
            self.pump_scaling_factor,
            self.opo_full_scale,
            self.opo_power,
            self.opo_scaling_factor,
            self.shg_full_scale,
            self.shg_power,
            self.shg_scaling_factor,
            self.shg_pdh_full_scale,
            self.shg_pdh_scaling_factor,
            self.etalon_full_scale,
            self.etalon_scaling_factor,
            self.ref_full_scale,
            self.ref_scaling_factor,
            self.aux_full_scale,
            self.aux_scaling_factor,
        ] {
            writer.write_f64(value);
        }
    }
}

/// Decoded status block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Layout version reported by the firmware
    pub abi_version: u32,
    /// Device clock in seconds
    pub system_time: u64,
    /// Lock and hardware flags
    pub status_bits: StatusBits,
    /// Seconds since power-up
    pub uptime: u64,
    /// Accumulated operating seconds
    pub operation_time: u64,
    /// Target wavelength in nm
    pub target_wavelength: f64,
    /// Measured wavelength in nm
    pub measured_wavelength: f64,
    /// OPO state machine
    pub opo_state: OpoState,
    /// SHG state machine
    pub shg_state: ShgState,
    /// Actions the device currently accepts
    pub allowed_actions: AllowedActionBits,
    /// Estimated seconds until the OPO is ready
    pub eta_opo: i32,
    /// Estimated seconds until the SHG is ready
    pub eta_shg: i32,
    /// Wavelength-meter lock
    pub wlm: WlmStatus,
    /// Housekeeping temperatures
    pub temperatures: BoardTemperatures,
    /// Source routed to monitor output 0
    pub monitor0: MonitorSource,
    /// Source routed to monitor output 1
    pub monitor1: MonitorSource,
    /// Trigger output source
    pub trigger: TriggerSource,
    /// SHG cavity piezo
    pub piezo_shg: PiezoStatus,
    /// OPO cavity piezo
    pub piezo_opo: PiezoStatus,
    /// Etalon piezo
    pub piezo_etalon: PiezoStatus,
    /// Reference cavity piezo
    pub piezo_ref: PiezoStatus,
    /// Lock-in amplifier
    pub lock_in: LockInStatus,
    /// Shutter positions
    pub shutters: ShutterStates,
    /// OPO crystal stepper
    pub stepper_opo: StepperStatus,
    /// SHG crystal stepper
    pub stepper_shg: StepperStatus,
    /// Lyot filter motor
    pub lyot: LyotStatus,
    /// Photodiode readings
    pub photodiodes: Photodiodes,
    /// OPO crystal oven
    pub tec_opo: TecStatus,
    /// SHG crystal oven
    pub tec_shg: TecStatus,
    /// Reference cavity oven
    pub tec_ref: TecStatus,
}

impl StatusSnapshot {
    /// Decode a snapshot starting at the reader's position.
    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            abi_version: reader.read_u32()?,
            system_time: reader.read_u64()?,
            status_bits: StatusBits::decode(reader)?,
            uptime: reader.read_u64()?,
            operation_time: reader.read_u64()?,
            target_wavelength: reader.read_f64()?,
            measured_wavelength: reader.read_f64()?,
            opo_state: read_u8_enum(reader)?,
            shg_state: read_u8_enum(reader)?,
            allowed_actions: AllowedActionBits::decode(reader)?,
            eta_opo: reader.read_i32()?,
            eta_shg: reader.read_i32()?,
            wlm: WlmStatus {
                enabled: reader.read_bool()?,
                setpoint: reader.read_f64()?,
                k_p: reader.read_f64()?,
                k_i: reader.read_f64()?,
            },
            temperatures: BoardTemperatures {
                soc: reader.read_f64()?,
                board: reader.read_f64()?,
                baseplate: reader.read_f64()?,
                case: reader.read_f64()?,
            },
            monitor0: read_u8_enum(reader)?,
            monitor1: read_u8_enum(reader)?,
            trigger: read_u8_enum(reader)?,
            piezo_shg: PiezoStatus::decode(reader)?,
            piezo_opo: PiezoStatus::decode(reader)?,
            piezo_etalon: PiezoStatus::decode(reader)?,
            piezo_ref: PiezoStatus::decode(reader)?,
            lock_in: LockInStatus {
                average: reader.read_f64()?,
                moving_average: reader.read_f64()?,
                enabled: reader.read_bool()?,
                mod_divisor_bits: reader.read_u32()?,
                frequency: reader.read_u32()?,
                phase: reader.read_u32()?,
                averaging_bits: reader.read_u32()?,
                out_divisor_bits: reader.read_u32()?,
            },
            shutters: ShutterStates {
                laser_out: read_u8_enum(reader)?,
                opo_out: read_u8_enum(reader)?,
                shg_out: read_u8_enum(reader)?,
                pump: read_u8_enum(reader)?,
                mir_out: read_u8_enum(reader)?,
            },
            stepper_opo: StepperStatus::decode(reader)?,
            stepper_shg: StepperStatus::decode(reader)?,
            lyot: LyotStatus {
                position: reader.read_i32()?,
                target: reader.read_i32()?,
                is_moving: reader.read_bool()?,
                is_inselective: reader.read_bool()?,
                frequency: reader.read_f64()?,
            },
            photodiodes: Photodiodes::decode(reader)?,
            tec_opo: TecStatus::decode(reader)?,
            tec_shg: TecStatus::decode(reader)?,
            tec_ref: TecStatus::decode(reader)?,
        })
    }

    /// Decode a raw block, which must be exactly [`STATUS_BLOCK_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != STATUS_BLOCK_LEN {
            return Err(GtrError::MalformedTelemetry(format!(
                "status block is {} bytes, expected {STATUS_BLOCK_LEN}",
                bytes.len()
            )));
        }
        Self::decode(&mut BinaryReader::new(bytes))
    }

    /// Decode the base64 text carried in a `status` reply.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| GtrError::MalformedTelemetry(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Encode the snapshot into a status block.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = BinaryWriter::with_capacity(STATUS_BLOCK_LEN);
        w.write_u32(self.abi_version);
        w.write_u64(self.system_time);
        self.status_bits.encode(&mut w);
        w.write_u64(self.uptime);
        w.write_u64(self.operation_time);
        w.write_f64(self.target_wavelength);
        w.write_f64(self.measured_wavelength);
        write_u8_enum(&mut w, self.opo_state);
        write_u8_enum(&mut w, self.shg_state);
        self.allowed_actions.encode(&mut w);
        w.write_i32(self.eta_opo);
        w.write_i32(self.eta_shg);

        w.write_bool(self.wlm.enabled);
        w.write_f64(self.wlm.setpoint);
        w.write_f64(self.wlm.k_p);
        w.write_f64(self.wlm.k_i);
        w.write_f64(self.temperatures.soc);
        w.write_f64(self.temperatures.board);
        w.write_f64(self.temperatures.baseplate);
        w.write_f64(self.temperatures.case);

        write_u8_enum(&mut w, self.monitor0);
        write_u8_enum(&mut w, self.monitor1);
        write_u8_enum(&mut w, self.trigger);

        for piezo in [
            &self.piezo_shg,
            &self.piezo_opo,
            &self.piezo_etalon,
            &self.piezo_ref,
        ] {
            piezo.encode(&mut w);
        }

        w.write_f64(self.lock_in.average);
        w.write_f64(self.lock_in.moving_average);
        w.write_bool(self.lock_in.enabled);
        w.write_u32(self.lock_in.mod_divisor_bits);
        w.write_u32(self.lock_in.frequency);
        w.write_u32(self.lock_in.phase);
        w.write_u32(self.lock_in.averaging_bits);
        w.write_u32(self.lock_in.out_divisor_bits);

        for shutter in [
            self.shutters.laser_out,
            self.shutters.opo_out,
            self.shutters.shg_out,
            self.shutters.pump,
            self.shutters.mir_out,
        ] {
            write_u8_enum(&mut w, shutter);
        }

        self.stepper_opo.encode(&mut w);
        self.stepper_shg.encode(&mut w);

        w.write_i32(self.lyot.position);
        w.write_i32(self.lyot.target);
        w.write_bool(self.lyot.is_moving);
        w.write_bool(self.lyot.is_inselective);
        w.write_f64(self.lyot.frequency);

        self.photodiodes.encode(&mut w);
        self.tec_opo.encode(&mut w);
        self.tec_shg.encode(&mut w);
        self.tec_ref.encode(&mut w);
        w.into_bytes()
    }

    /// Encode the snapshot as the base64 text of a `status` reply.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.encode())
    }

    /// Piezo record for a channel.
    #[must_use]
    pub fn piezo(&self, channel: PiezoChannel) -> &PiezoStatus {
        match channel {
            PiezoChannel::Opo => &self.piezo_opo,
            PiezoChannel::Shg => &self.piezo_shg,
            PiezoChannel::Etalon => &self.piezo_etalon,
            PiezoChannel::Ref => &self.piezo_ref,
        }
    }

    pub(crate) fn piezo_mut(&mut self, channel: PiezoChannel) -> &mut PiezoStatus {
        match channel {
            PiezoChannel::Opo => &mut self.piezo_opo,
            PiezoChannel::Shg => &mut self.piezo_shg,
            PiezoChannel::Etalon => &mut self.piezo_etalon,
            PiezoChannel::Ref => &mut self.piezo_ref,
        }
    }

    /// Stepper record for a channel.
    #[must_use]
    pub fn stepper(&self, channel: StepperChannel) -> &StepperStatus {
        match channel {
            StepperChannel::Opo => &self.stepper_opo,
            StepperChannel::Shg => &self.stepper_shg,
        }
    }

    pub(crate) fn stepper_mut(&mut self, channel: StepperChannel) -> &mut StepperStatus {
        match channel {
            StepperChannel::Opo => &mut self.stepper_opo,
            StepperChannel::Shg => &mut self.stepper_shg,
        }
    }

    /// Temperature controller record for a channel.
    #[must_use]
    pub fn tec(&self, channel: TecChannel) -> &TecStatus {
        match channel {
            TecChannel::Opo => &self.tec_opo,
            TecChannel::Shg => &self.tec_shg,
            TecChannel::Ref => &self.tec_ref,
        }
    }

    pub(crate) fn tec_mut(&mut self, channel: TecChannel) -> &mut TecStatus {
        match channel {
            TecChannel::Opo => &mut self.tec_opo,
            TecChannel::Shg => &mut self.tec_shg,
            TecChannel::Ref => &mut self.tec_ref,
        }
    }

    /// State of one shutter.
    #[must_use]
    pub fn shutter(&self, channel: ShutterChannel) -> ShutterState {
        match channel {
            ShutterChannel::LaserOut => self.shutters.laser_out,
            ShutterChannel::OpoOut => self.shutters.opo_out,
            ShutterChannel::ShgOut => self.shutters.shg_out,
            ShutterChannel::Pump => self.shutters.pump,
            ShutterChannel::MirOut => self.shutters.mir_out,
        }
    }

    pub(crate) fn shutter_mut(&mut self, channel: ShutterChannel) -> &mut ShutterState {
        match channel {
            ShutterChannel::LaserOut => &mut self.shutters.laser_out,
            ShutterChannel::OpoOut => &mut self.shutters.opo_out,
            ShutterChannel::ShgOut => &mut self.shutters.shg_out,
            ShutterChannel::Pump => &mut self.shutters.pump,
            ShutterChannel::MirOut => &mut self.shutters.mir_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::enums::{PiezoControlSource, PiezoMode, StepperHomingState};

    fn known_snapshot() -> StatusSnapshot {
        let mut snapshot = StatusSnapshot {
            abi_version: 3,
            system_time: 1_700_000_000_000,
            status_bits: StatusBits::from_word((1 << 3) | (1 << 19) | (1 << 24)),
            uptime: 3600,
            operation_time: 987_654,
            target_wavelength: 737.1,
            measured_wavelength: 737.098,
            opo_state: OpoState::StabilizeWlm,
            shg_state: ShgState::WaitForWlm,
            allowed_actions: AllowedActionBits::from_word(0b01_0011),
            eta_opo: -1,
            eta_shg: 42,
            wlm: WlmStatus {
                enabled: true,
                setpoint: 737.1,
                k_p: 0.5,
                k_i: 0.01,
            },
            temperatures: BoardTemperatures {
                soc: 55.0,
                board: 38.5,
                baseplate: 25.1,
                case: 27.3,
            },
            monitor0: MonitorSource::OutRef,
            monitor1: MonitorSource::LockinAverage,
            trigger: TriggerSource::HomingShg,
            ..Default::default()
        };
        snapshot.piezo_opo.mode = PiezoMode::Scan;
        snapshot.piezo_opo.scan_min = 5.0;
        snapshot.piezo_opo.scan_max = 95.0;
        snapshot.piezo_etalon.mode = PiezoMode::Control;
        snapshot.piezo_etalon.input_source = PiezoControlSource::Aux;
        snapshot.piezo_etalon.criterion_source = PiezoControlSource::None;
        snapshot.piezo_ref.input_source = PiezoControlSource::RefBal;
        snapshot.piezo_ref.k_d = 7;
        snapshot.lock_in.out_divisor_bits = 0xdead_beef;
        snapshot.shutters.mir_out = ShutterState::Guarding;
        snapshot.shutters.laser_out = ShutterState::Open;
        snapshot.stepper_shg.homing_state = StepperHomingState::Error;
        snapshot.stepper_shg.target_period = -3;
        snapshot.lyot.position = -512;
        snapshot.lyot.is_inselective = true;
        snapshot.photodiodes.aux_scaling_factor = 1.25;
        snapshot.tec_ref.out_max = 4095;
        snapshot.tec_shg.temperature = 41.7;
        snapshot
    }

    #[test]
    fn encoded_block_has_firmware_length() {
        assert_eq!(known_snapshot().encode().len(), STATUS_BLOCK_LEN);
        assert_eq!(StatusSnapshot::default().encode().len(), STATUS_BLOCK_LEN);
    }

    #[test]
    fn decodes_known_values() {
        let expected = known_snapshot();
        let decoded = StatusSnapshot::from_bytes(&expected.encode()).unwrap();
        assert_eq!(decoded, expected);
        assert_eq!(
            decoded.piezo(PiezoChannel::Etalon).criterion_source,
            PiezoControlSource::None
        );
        assert_eq!(decoded.shutter(ShutterChannel::MirOut), ShutterState::Guarding);
        assert_eq!(decoded.tec(TecChannel::Ref).out_max, 4095);
        assert!(decoded.status_bits.wlm_connected);
        assert!(decoded.allowed_actions.opo_temperature_optimization);
    }

    #[test]
    fn header_fields_sit_at_firmware_offsets() {
        let bytes = known_snapshot().encode();
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[32..40], &737.1f64.to_le_bytes());
        assert_eq!(bytes[48], 8); // OpoState::StabilizeWlm
        assert_eq!(bytes[49], 3); // ShgState::WaitForWlm
        assert_eq!(bytes[119], 12); // monitor0 = OutRef
    }

    #[test]
    fn every_truncation_underruns() {
        let bytes = known_snapshot().encode();
        for len in 0..STATUS_BLOCK_LEN {
            let err = StatusSnapshot::decode(&mut BinaryReader::new(&bytes[..len])).unwrap_err();
            assert!(
                matches!(err, GtrError::BufferUnderrun { .. }),
                "length {len} gave {err:?}"
            );
        }
    }

    #[test]
    fn wrong_length_is_malformed() {
        let mut bytes = known_snapshot().encode();
        bytes.push(0);
        assert!(matches!(
            StatusSnapshot::from_bytes(&bytes),
            Err(GtrError::MalformedTelemetry(_))
        ));
        assert!(matches!(
            StatusSnapshot::from_bytes(&bytes[..100]),
            Err(GtrError::MalformedTelemetry(_))
        ));
    }

    #[test]
    fn unknown_enum_code_aborts_decode() {
        let mut bytes = known_snapshot().encode();
        bytes[49] = 6; // ShgState has six variants
        let err = StatusSnapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            GtrError::UnknownEnumCode {
                enumeration: "ShgState",
                code: 6
            }
        ));
    }

    #[test]
    fn bad_sentinel_range_aborts_decode() {
        let mut bytes = known_snapshot().encode();
        // input source of the first (SHG) piezo record
        bytes[122 + 75] = (-2i8) as u8;
        let err = StatusSnapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            GtrError::UnknownEnumCode {
                enumeration: "PiezoControlSource",
                code: -2
            }
        ));
    }

    #[test]
    fn base64_round_trip() {
        let expected = known_snapshot();
        let text = expected.to_base64();
        assert_eq!(StatusSnapshot::from_base64(&text).unwrap(), expected);
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let err = StatusSnapshot::from_base64("not*base64").unwrap_err();
        assert!(matches!(err, GtrError::MalformedTelemetry(_)));

        let short = STANDARD.encode([0u8; 16]);
        let err = StatusSnapshot::from_base64(&short).unwrap_err();
        assert!(err.to_string().contains("16 bytes"));
    }
}
