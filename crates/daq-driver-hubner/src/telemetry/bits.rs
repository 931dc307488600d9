//! Bit-flag words of the status block.
//!
//! Both words are stored as a little-endian `u32`. Only the bit positions
//! listed here carry meaning; all other bits are ignored.

use crate::error::Result;
use crate::reader::{BinaryReader, BinaryWriter};
use serde::{Deserialize, Serialize};

const fn bit(word: u32, index: u32) -> bool {
    word & (1 << index) != 0
}

/// Global status flags of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusBits {
    /// OPO crystal temperature settled (bit 0)
    pub temp_opo: bool,
    /// SHG crystal temperature settled (bit 1)
    pub temp_shg: bool,
    /// Reference cavity temperature settled (bit 2)
    pub temp_ref: bool,
    /// OPO locked (bit 3)
    pub lock_opo: bool,
    /// SHG locked (bit 4)
    pub lock_shg: bool,
    /// Etalon locked (bit 5)
    pub lock_etalon: bool,
    /// Pump power present (bit 6)
    pub pump_power: bool,
    /// SHG output requested (bit 7)
    pub shg_requested: bool,
    /// Wavelength meter used for SHG (bit 8)
    pub use_wlm_for_shg: bool,
    /// OPO position guard active (bit 16)
    pub guard_opo_position: bool,
    /// TEC hardware enable line (bit 17)
    pub tec_hardware_enable: bool,
    /// SHG PDH lock enabled (bit 18)
    pub shg_pdh_enabled: bool,
    /// Wavelength meter connected (bit 19)
    pub wlm_connected: bool,
    /// Wavelength meter warning (bit 20)
    pub wlm_warning: bool,
    /// Licensed for wavelength-meter dialing (bit 24)
    pub has_wlm_dial_license: bool,
    /// Licensed for wavelength-meter stabilization (bit 25)
    pub has_wlm_stabilize_license: bool,
}

impl StatusBits {
    /// Interpret a raw status word.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self {
            temp_opo: bit(word, 0),
            temp_shg: bit(word, 1),
            temp_ref: bit(word, 2),
            lock_opo: bit(word, 3),
            lock_shg: bit(word, 4),
            lock_etalon: bit(word, 5),
            pump_power: bit(word, 6),
            shg_requested: bit(word, 7),
            use_wlm_for_shg: bit(word, 8),
            guard_opo_position: bit(word, 16),
            tec_hardware_enable: bit(word, 17),
            shg_pdh_enabled: bit(word, 18),
            wlm_connected: bit(word, 19),
            wlm_warning: bit(word, 20),
            has_wlm_dial_license: bit(word, 24),
            has_wlm_stabilize_license: bit(word, 25),
        }
    }

    /// Pack the flags back into a status word.
    #[must_use]
    pub fn to_word(&self) -> u32 {
        [
            (self.temp_opo, 0),
            (self.temp_shg, 1),
            (self.temp_ref, 2),
            (self.lock_opo, 3),
            (self.lock_shg, 4),
            (self.lock_etalon, 5),
            (self.pump_power, 6),
            (self.shg_requested, 7),
            (self.use_wlm_for_shg, 8),
            (self.guard_opo_position, 16),
            (self.tec_hardware_enable, 17),
            (self.shg_pdh_enabled, 18),
            (self.wlm_connected, 19),
            (self.wlm_warning, 20),
            (self.has_wlm_dial_license, 24),
            (self.has_wlm_stabilize_license, 25),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |word, (_, index)| word | (1 << index))
    }

    /// Decode from the next `u32` of the block.
    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self::from_word(reader.read_u32()?))
    }

    pub(crate) fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.to_word());
    }
}

/// Actions the device currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllowedActionBits {
    /// Wavelength dial (bit 0)
    pub dial: bool,
    /// Lyot optimization (bit 1)
    pub lyot_optimization: bool,
    /// Etalon optimization (bit 2)
    pub etalon_optimization: bool,
    /// Reference calibration (bit 3)
    pub reference_calibration: bool,
    /// OPO temperature optimization (bit 4)
    pub opo_temperature_optimization: bool,
    /// SHG temperature optimization (bit 5)
    pub shg_temperature_optimization: bool,
}

impl AllowedActionBits {
    /// Interpret a raw allowed-actions word.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self {
            dial: bit(word, 0),
            lyot_optimization: bit(word, 1),
            etalon_optimization: bit(word, 2),
            reference_calibration: bit(word, 3),
            opo_temperature_optimization: bit(word, 4),
            shg_temperature_optimization: bit(word, 5),
        }
    }

    /// Pack the flags back into a word.
    #[must_use]
    pub fn to_word(&self) -> u32 {
        [
            self.dial,
            self.lyot_optimization,
            self.etalon_optimization,
            self.reference_calibration,
            self.opo_temperature_optimization,
            self.shg_temperature_optimization,
        ]
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .fold(0, |word, (index, _)| word | (1 << index))
    }

    /// Decode from the next `u32` of the block.
    pub fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self::from_word(reader.read_u32()?))
    }

    pub(crate) fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_u32(self.to_word());
    }
}
