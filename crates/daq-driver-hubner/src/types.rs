//! Routing keys and argument types of the command protocol.
//!
//! Channel enums are only turned into strings at the wire boundary through
//! [`Channel::key`].

use crate::error::{GtrError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A closed set of routing keys for the `chan` field of a request.
pub trait Channel: Copy + fmt::Debug + 'static {
    /// Every channel in device order.
    const ALL: &'static [Self];

    /// Wire key sent in the `chan` field.
    fn key(self) -> &'static str;
}

macro_rules! channel_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $key:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $key)]
                $variant,
            )+
        }

        impl Channel for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.key())
            }
        }

        impl FromStr for $name {
            type Err = GtrError;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|c| c.key().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        let keys: Vec<_> = Self::ALL.iter().map(|c| c.key()).collect();
                        GtrError::InvalidArgument(format!(
                            "unknown {} '{s}' (expected one of: {})",
                            stringify!($name),
                            keys.join(", ")
                        ))
                    })
            }
        }
    };
}

channel_enum! {
    /// Piezo actuators.
    PiezoChannel {
        /// OPO cavity piezo
        Opo => "opo",
        /// SHG cavity piezo
        Shg => "shg",
        /// Etalon piezo
        Etalon => "etalon",
        /// Reference cavity piezo
        Ref => "ref",
    }
}

channel_enum! {
    /// Crystal stepper motors.
    StepperChannel {
        /// OPO crystal
        Opo => "opo",
        /// SHG crystal
        Shg => "shg",
    }
}

channel_enum! {
    /// Temperature controllers.
    TecChannel {
        /// OPO crystal oven
        Opo => "opo",
        /// SHG crystal oven
        Shg => "shg",
        /// Reference cavity
        Ref => "ref",
    }
}

channel_enum! {
    /// Shutters.
    ShutterChannel {
        /// Main laser output
        LaserOut => "laserOut",
        /// OPO output
        OpoOut => "opoOut",
        /// SHG output
        ShgOut => "shgOut",
        /// Pump beam
        Pump => "pump",
        /// Mid-infrared output
        MirOut => "mirOut",
    }
}

channel_enum! {
    /// Recorded scans that can be downloaded.
    ScanChannel {
        /// OPO crystal temperature scan
        TemperatureOpo => "tempOpo",
        /// SHG crystal temperature scan
        TemperatureShg => "tempShg",
        /// Etalon piezo scan
        PiezoEtalon => "piezoEtalon",
        /// Lyot filter scan
        Lyot => "lyot",
    }
}

channel_enum! {
    /// Calibration maps stored on the device.
    MappingFieldChannel {
        /// OPO crystal map
        XtalOpo => "xtalOpo",
        /// SHG crystal map
        XtalShg => "xtalShg",
        /// Lyot filter map
        Lyot => "lyot",
    }
}

channel_enum! {
    /// Crystals with a temperature optimization routine.
    TemperatureOptimizeChannel {
        /// OPO crystal
        Opo => "opo",
        /// SHG crystal
        Shg => "shg",
    }
}

/// Scan window of a piezo in scan mode, in percent of full range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiezoScanSettings {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Sweep rate
    pub rate: f64,
}

/// Parameters of a wavelength dial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaRequest {
    /// Target OPO wavelength in nm
    pub wavelength: f64,
    /// Also bring up the SHG stage
    pub request_shg: bool,
    /// Use the wavelength meter while dialing the SHG
    #[serde(default)]
    pub use_wlm_for_shg: bool,
}

/// Identification data of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Product name
    pub name: String,
    /// Firmware version string
    pub version: String,
    /// Firmware revision number
    pub revision: u32,
    /// Device serial number
    pub serial_number: u64,
    /// Network interface MAC address
    pub mac: String,
}

/// One step of a crystal temperature scan.
///
/// Sent on the wire as a `[range, slewRate]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct ScanStep {
    /// Temperature span of the step
    pub range: f64,
    /// Slew rate used for the step
    pub slew_rate: f64,
}

impl From<[f64; 2]> for ScanStep {
    fn from([range, slew_rate]: [f64; 2]) -> Self {
        Self { range, slew_rate }
    }
}

impl From<ScanStep> for [f64; 2] {
    fn from(step: ScanStep) -> Self {
        [step.range, step.slew_rate]
    }
}

/// Explicit parameters of a temperature optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureScan {
    /// Temperature the scan starts from
    pub start_temperature: f64,
    /// Steps to run in order
    pub steps: Vec<ScanStep>,
}

/// Lyot filter scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyotScan {
    /// First motor position
    pub start_position: i32,
    /// Last motor position
    pub end_position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_keys_match_firmware_names() {
        assert_eq!(PiezoChannel::Etalon.key(), "etalon");
        assert_eq!(ShutterChannel::LaserOut.key(), "laserOut");
        assert_eq!(ScanChannel::TemperatureShg.key(), "tempShg");
        assert_eq!(MappingFieldChannel::XtalOpo.key(), "xtalOpo");
        assert_eq!(TecChannel::ALL.len(), 3);
        assert_eq!(
            serde_json::to_value(ShutterChannel::MirOut).unwrap(),
            json!("mirOut")
        );
    }

    #[test]
    fn channels_parse_case_insensitively() {
        assert_eq!("LASEROUT".parse::<ShutterChannel>().unwrap(), ShutterChannel::LaserOut);
        assert_eq!("ref".parse::<PiezoChannel>().unwrap(), PiezoChannel::Ref);

        let err = "idler".parse::<StepperChannel>().unwrap_err();
        assert!(matches!(err, GtrError::InvalidArgument(_)));
        assert!(err.to_string().contains("opo, shg"));
    }

    #[test]
    fn lambda_request_uses_device_field_names() {
        let request = LambdaRequest {
            wavelength: 1064.0,
            request_shg: true,
            use_wlm_for_shg: false,
        };
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({"wavelength": 1064.0, "requestShg": true, "useWlmForShg": false})
        );
    }

    #[test]
    fn temperature_scan_steps_are_pairs() {
        let scan = TemperatureScan {
            start_temperature: 40.0,
            steps: vec![ScanStep {
                range: 2.0,
                slew_rate: 0.1,
            }],
        };
        assert_eq!(
            serde_json::to_value(&scan).unwrap(),
            json!({"startTemperature": 40.0, "steps": [[2.0, 0.1]]})
        );
    }

    #[test]
    fn device_info_reads_camel_case() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "name": "C-WAVE GTR",
            "version": "2.1.0",
            "revision": 7,
            "serialNumber": 1042,
            "mac": "00:11:22:33:44:55"
        }))
        .unwrap();
        assert_eq!(info.revision, 7);
        assert_eq!(info.serial_number, 1042);
    }

    #[test]
    fn device_info_rejects_textual_serial() {
        let result = serde_json::from_value::<DeviceInfo>(json!({
            "name": "C-WAVE GTR",
            "version": "2.1.0",
            "revision": 7,
            "serialNumber": "GTR-0042",
            "mac": "00:11:22:33:44:55"
        }));
        assert!(result.is_err());
    }
}
