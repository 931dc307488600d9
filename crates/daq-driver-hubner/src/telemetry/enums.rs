//! Closed enumerations carried in the status block.
//!
//! Each enumeration is stored on the wire as a small integer that indexes
//! into the ordered variant list. [`PiezoControlSource`] is signed and uses
//! code `-1` for "no source selected"; decoding shifts the code by one so
//! that `-1` lands on [`PiezoControlSource::None`].

use crate::error::{GtrError, Result};
use crate::reader::{BinaryReader, BinaryWriter};
use serde::{Deserialize, Serialize};

/// An enumeration with an ordered list of variants addressed by wire code.
pub trait WireEnum: Sized + Copy + PartialEq + 'static {
    /// Name reported in [`GtrError::UnknownEnumCode`].
    const NAME: &'static str;
    /// Variants in wire order.
    const VARIANTS: &'static [Self];
    /// Added to a wire code to obtain the variant index.
    const CODE_OFFSET: i64 = 0;

    /// Map a wire code to its variant.
    fn from_code(code: i64) -> Result<Self> {
        usize::try_from(code + Self::CODE_OFFSET)
            .ok()
            .and_then(|index| Self::VARIANTS.get(index))
            .copied()
            .ok_or(GtrError::UnknownEnumCode {
                enumeration: Self::NAME,
                code,
            })
    }

    /// Wire code of this variant.
    fn code(self) -> i64 {
        let index = Self::VARIANTS
            .iter()
            .position(|v| *v == self)
            .unwrap_or_default();
        index as i64 - Self::CODE_OFFSET
    }
}

/// Decode an enumeration stored as an unsigned byte.
pub fn read_u8_enum<E: WireEnum>(reader: &mut BinaryReader<'_>) -> Result<E> {
    E::from_code(i64::from(reader.read_u8()?))
}

/// Decode an enumeration stored as a signed byte.
pub fn read_i8_enum<E: WireEnum>(reader: &mut BinaryReader<'_>) -> Result<E> {
    E::from_code(i64::from(reader.read_i8()?))
}

/// Encode an enumeration as an unsigned byte.
pub fn write_u8_enum<E: WireEnum>(writer: &mut BinaryWriter, value: E) {
    writer.write_u8(value.code() as u8);
}

/// Encode an enumeration as a signed byte.
pub fn write_i8_enum<E: WireEnum>(writer: &mut BinaryWriter, value: E) {
    writer.write_i8(value.code() as i8);
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident $(offset $offset:literal)? {
            $(#[$first_meta:meta])* $first:ident
            $(, $(#[$vmeta:meta])* $variant:ident)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum $name {
            $(#[$first_meta])*
            #[default]
            $first,
            $($(#[$vmeta])* $variant,)*
        }

        impl WireEnum for $name {
            const NAME: &'static str = stringify!($name);
            const VARIANTS: &'static [Self] = &[Self::$first $(, Self::$variant)*];
            $(const CODE_OFFSET: i64 = $offset;)?
        }
    };
}

wire_enum! {
    /// Operating mode of a piezo actuator.
    PiezoMode {
        /// Output follows the manual level
        Manual,
        /// Output sweeps the scan window
        Scan,
        /// Output is driven by the control loop
        Control,
    }
}

wire_enum! {
    /// Signal feeding a piezo control loop. Wire code `-1` means no source.
    PiezoControlSource offset 1 {
        /// No source selected
        None,
        /// Pump photodiode
        Pump,
        /// OPO photodiode
        Opo,
        /// SHG photodiode
        Shg,
        /// SHG Pound-Drever-Hall signal
        ShgPdh,
        /// Reference photodiode
        Ref,
        /// Balanced reference signal
        RefBal,
        /// Auxiliary input
        Aux,
    }
}

wire_enum! {
    /// State of the OPO state machine.
    OpoState {
        /// Idle
        Idle,
        /// Dial requested
        StartDial,
        /// Waiting for pump power
        WaitForPump,
        /// Scanning the Lyot filter
        ScanLyot,
        /// Scanning crystal temperature
        ScanTemperature,
        /// Optimizing the etalon
        OptimizeEtalon,
        /// Calibrating the reference cavity
        CalibrateReference,
        /// Locked
        Stabilize,
        /// Locked on the wavelength meter
        StabilizeWlm,
    }
}

wire_enum! {
    /// State of the SHG state machine.
    ShgState {
        /// Idle
        Idle,
        /// Dial requested
        StartDial,
        /// Waiting for the OPO
        WaitForOpo,
        /// Waiting for the wavelength meter
        WaitForWlm,
        /// Scanning crystal temperature
        ScanTemperature,
        /// Locked
        Stabilize,
    }
}

wire_enum! {
    /// Signal routed to a monitor output.
    MonitorSource {
        /// Pump photodiode
        PdPump,
        /// OPO photodiode
        PdOpo,
        /// SHG PDH photodiode
        PdShgPdh,
        /// Reference photodiode
        PdRef,
        /// SHG photodiode
        PdShg,
        /// Etalon photodiode
        PdEtalon,
        /// Lock-in average
        LockinAverage,
        /// OPO piezo output
        OutOpo,
        /// SHG piezo output
        OutShg,
        /// Etalon piezo output
        OutEtalon,
        /// Balanced reference
        RefBalanced,
        /// Auxiliary input
        Aux,
        /// Reference piezo output
        OutRef,
    }
}

wire_enum! {
    /// Event routed to the trigger output.
    TriggerSource {
        /// OPO piezo scan
        Opo,
        /// SHG piezo scan
        Shg,
        /// Etalon piezo scan
        Etalon,
        /// Reference piezo scan
        Ref,
        /// OPO stepper homing
        HomingOpo,
        /// SHG stepper homing
        HomingShg,
    }
}

wire_enum! {
    /// Position of a shutter.
    ShutterState {
        /// Closed
        Closed,
        /// Open
        Open,
        /// Held closed by a safety guard
        Guarding,
    }
}

wire_enum! {
    /// Progress of a stepper homing run.
    StepperHomingState {
        /// Homed
        Done,
        /// Moving the blade out
        BladeOut,
        /// Searching the blade edge
        BladeEdge,
        /// Moving the blade in
        BladeIn,
        /// Searching the slit
        BladeSlit,
        /// Not homed yet
        Unknown,
        /// Homing failed
        Error,
    }
}
