//! Per-subsystem records nested in the status block.
//!
//! Each record reads its fields strictly in firmware order. The `encode`
//! methods write the same layout and exist for the simulated device.

use super::enums::{
    read_i8_enum, read_u8_enum, write_i8_enum, write_u8_enum, PiezoControlSource, PiezoMode,
    StepperHomingState,
};
use crate::error::Result;
use crate::reader::{BinaryReader, BinaryWriter};
use serde::{Deserialize, Serialize};

/// Wire size of one [`PiezoStatus`] record.
pub const PIEZO_STATUS_LEN: usize = 105;
/// Wire size of one [`StepperStatus`] record.
pub const STEPPER_STATUS_LEN: usize = 20;
/// Wire size of one [`TecStatus`] record.
pub const TEC_STATUS_LEN: usize = 49;

/// State of one piezo actuator and its control loop.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiezoStatus {
    /// Operating mode
    pub mode: PiezoMode,
    /// Control loop setpoint
    pub setpoint: f64,
    /// Output level in manual mode, percent
    pub manual_output: f64,
    /// Lower scan bound, percent
    pub scan_min: f64,
    /// Upper scan bound, percent
    pub scan_max: f64,
    /// Scan rate
    pub scan_rate: f64,
    /// Current control error
    pub error: f64,
    /// Control loop input
    pub input: f64,
    /// Current output level, percent
    pub output: f64,
    /// Control loop enabled
    pub enabled: bool,
    /// Output slew rate
    pub slew_rate: f64,
    /// Control direction inverted
    pub invert: bool,
    /// Signal feeding the control loop
    pub input_source: PiezoControlSource,
    /// Signal used as lock criterion
    pub criterion_source: PiezoControlSource,
    /// Lock criterion threshold
    pub threshold: f64,
    /// Search scan rate
    pub search_rate: f64,
    /// Proportional gain
    pub k_p: u32,
    /// Integral gain
    pub k_i: u32,
    /// Derivative gain
    pub k_d: u32,
}

impl PiezoStatus {
    /// Decode one record at the reader's position.
    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            mode: read_u8_enum(reader)?,
            setpoint: reader.read_f64()?,
            manual_output: reader.read_f64()?,
            scan_min: reader.read_f64()?,
            scan_max: reader.read_f64()?,
            scan_rate: reader.read_f64()?,
            error: reader.read_f64()?,
            input: reader.read_f64()?,
            output: reader.read_f64()?,
            enabled: reader.read_bool()?,
            slew_rate: reader.read_f64()?,
            invert: reader.read_bool()?,
            input_source: read_i8_enum(reader)?,
            criterion_source: read_i8_enum(reader)?,
            threshold: reader.read_f64()?,
            search_rate: reader.read_f64()?,
            k_p: reader.read_u32()?,
            k_i: reader.read_u32()?,
            k_d: reader.read_u32()?,
        })
    }

    pub(crate) fn encode(&self, writer: &mut BinaryWriter) {
        write_u8_enum(writer, self.mode);
        for value in [
            self.setpoint,
            self.manual_output,
            self.scan_min,
            self.scan_max,
            self.scan_rate,
            self.error,
            self.input,
            self.output,
        ] {
            writer.write_f64(value);
        }
        writer.write_bool(self.enabled);
        writer.write_f64(self.slew_rate);
        writer.write_bool(self.invert);
        write_i8_enum(writer, self.input_source);
        write_i8_enum(writer, self.criterion_source);
        writer.write_f64(self.threshold);
        writer.write_f64(self.search_rate);
        writer.write_u32(self.k_p);
        writer.write_u32(self.k_i);
        writer.write_u32(self.k_d);
    }
}

/// State of a crystal stepper motor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepperStatus {
    /// Current motor position
    pub position: i32,
    /// Target motor position
    pub target: i32,
    /// Motor is moving
    pub is_moving: bool,
    /// Progress of the homing run
    pub homing_state: StepperHomingState,
    /// Selected poling period, negative when none
    pub target_period: i8,
    /// Crystal is parked at its inactive position
    pub is_inactive_position: bool,
    /// Step frequency in Hz
    pub frequency: f64,
}

impl StepperStatus {
    /// Decode one record at the reader's position.
    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            position: reader.read_i32()?,
            target: reader.read_i32()?,
            is_moving: reader.read_bool()?,
            homing_state: read_u8_enum(reader)?,
            target_period: reader.read_i8()?,
            is_inactive_position: reader.read_bool()?,
            frequency: reader.read_f64()?,
        })
    }

    pub(crate) fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_i32(self.position);
        writer.write_i32(self.target);
        writer.write_bool(self.is_moving);
        write_u8_enum(writer, self.homing_state);
        writer.write_i8(self.target_period);
        writer.write_bool(self.is_inactive_position);
        writer.write_f64(self.frequency);
    }
}

/// State of a temperature controller (TEC).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TecStatus {
    /// Controller enabled
    pub enabled: bool,
    /// Measured temperature in degrees Celsius
    pub temperature: f64,
    /// Temperature setpoint in degrees Celsius
    pub setpoint: f64,
    /// Controller output
    pub output: f64,
    /// Setpoint slew rate
    pub slew_rate: f64,
    /// Proportional gain
    pub k_p: u32,
    /// Integral gain
    pub k_i: u32,
    /// Lower output limit
    pub out_min: u32,
    /// Upper output limit
    pub out_max: u32,
}

impl TecStatus {
    /// Decode one record at the reader's position.
    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            enabled: reader.read_bool()?,
            temperature: reader.read_f64()?,
            setpoint: reader.read_f64()?,
            output: reader.read_f64()?,
            slew_rate: reader.read_f64()?,
            k_p: reader.read_u32()?,
            k_i: reader.read_u32()?,
            out_min: reader.read_u32()?,
            out_max: reader.read_u32()?,
        })
    }

    pub(crate) fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_bool(self.enabled);
        writer.write_f64(self.temperature);
        writer.write_f64(self.setpoint);
        writer.write_f64(self.output);
        writer.write_f64(self.slew_rate);
        writer.write_u32(self.k_p);
        writer.write_u32(self.k_i);
        writer.write_u32(self.out_min);
        writer.write_u32(self.out_max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GtrError;

    fn sample_piezo() -> PiezoStatus {
        PiezoStatus {
            mode: PiezoMode::Control,
            setpoint: 12.5,
            manual_output: 50.0,
            scan_min: 10.0,
            scan_max: 90.0,
            scan_rate: 2.0,
            error: -0.25,
            input: 1.5,
            output: 48.0,
            enabled: true,
            slew_rate: 3.0,
            invert: false,
            input_source: PiezoControlSource::Ref,
            criterion_source: PiezoControlSource::None,
            threshold: 0.1,
            search_rate: 4.0,
            k_p: 100,
            k_i: 20,
            k_d: 1,
        }
    }

    #[test]
    fn record_sizes_match_firmware_layout() {
        let mut writer = BinaryWriter::new();
        sample_piezo().encode(&mut writer);
        assert_eq!(writer.len(), PIEZO_STATUS_LEN);

        let mut writer = BinaryWriter::new();
        StepperStatus::default().encode(&mut writer);
        assert_eq!(writer.len(), STEPPER_STATUS_LEN);

        let mut writer = BinaryWriter::new();
        TecStatus::default().encode(&mut writer);
        assert_eq!(writer.len(), TEC_STATUS_LEN);
    }

    #[test]
    fn piezo_sources_decode_from_signed_bytes() {
        let mut writer = BinaryWriter::new();
        sample_piezo().encode(&mut writer);
        let bytes = writer.into_bytes();

        // input source sits after mode (1), eight doubles (64), enabled (1),
        // slew rate (8) and invert (1)
        assert_eq!(bytes[75] as i8, 4);
        assert_eq!(bytes[76] as i8, -1);

        let decoded = PiezoStatus::decode(&mut BinaryReader::new(&bytes)).unwrap();
        assert_eq!(decoded, sample_piezo());
    }

    #[test]
    fn stepper_decodes_signed_fields() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-1200i32).to_le_bytes());
        bytes.extend_from_slice(&3400i32.to_le_bytes());
        bytes.push(1);
        bytes.push(5);
        bytes.push(0xfe);
        bytes.push(0);
        bytes.extend_from_slice(&250.0f64.to_le_bytes());

        let stepper = StepperStatus::decode(&mut BinaryReader::new(&bytes)).unwrap();
        assert_eq!(stepper.position, -1200);
        assert_eq!(stepper.target, 3400);
        assert!(stepper.is_moving);
        assert_eq!(stepper.homing_state, StepperHomingState::Unknown);
        assert_eq!(stepper.target_period, -2);
        assert!(!stepper.is_inactive_position);
        assert_eq!(stepper.frequency, 250.0);
    }

    #[test]
    fn bad_homing_state_is_rejected() {
        let mut writer = BinaryWriter::new();
        StepperStatus::default().encode(&mut writer);
        let mut bytes = writer.into_bytes();
        bytes[9] = 7;

        let err = StepperStatus::decode(&mut BinaryReader::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            GtrError::UnknownEnumCode {
                enumeration: "StepperHomingState",
                code: 7
            }
        ));
    }

    #[test]
    fn truncated_tec_record_underruns() {
        let bytes = [0u8; TEC_STATUS_LEN - 1];
        let err = TecStatus::decode(&mut BinaryReader::new(&bytes)).unwrap_err();
        assert!(matches!(err, GtrError::BufferUnderrun { requested: 4, .. }));
    }
}
