//! Decoding of the binary status block returned by the `status` command.

pub mod bits;
pub mod enums;
pub mod records;
pub mod snapshot;

pub use bits::{AllowedActionBits, StatusBits};
pub use enums::{
    MonitorSource, OpoState, PiezoControlSource, PiezoMode, ShgState, ShutterState,
    StepperHomingState, TriggerSource, WireEnum,
};
pub use records::{PiezoStatus, StepperStatus, TecStatus};
pub use snapshot::{
    BoardTemperatures, LockInStatus, LyotStatus, Photodiodes, ShutterStates, StatusSnapshot,
    WlmStatus, STATUS_BLOCK_LEN,
};
