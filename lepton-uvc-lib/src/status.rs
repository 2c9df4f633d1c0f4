//! Result codes of the Lepton SDK.
//!
//! The same numeric space is used in two places: as the return value of the SDK
//! callbacks (see [`crate::sdk`]) and as the embedded status word of an I2C
//! passthrough response frame.

use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[repr(i16)]
pub enum LepResult {
    Ok = 0,
    Error = -1,
    NotReady = -2,
    RangeError = -3,
    ChecksumError = -4,
    BadArgPointerError = -5,
    DataSizeError = -6,
    UndefinedFunctionError = -7,
    FunctionNotSupported = -8,
    DataOutOfRangeError = -9,
    CommandNotAllowed = -11,
    // implicit discriminant -10 is unused by the SDK
    #[num_enum(catch_all)]
    Unknown(i16),

    // I2C peripheral errors reported by the bridge
    I2cBusNotReady = -20,
    I2cBufferOverflow = -22,
    I2cArbitrationLost = -23,
    I2cBusError = -24,
    I2cNackReceived = -25,
    I2cFail = -26,

    // Host side communication errors
    CommPortNotOpen = -101,
    CommInvalidPortError = -102,
    CommRangeError = -103,
    ErrorCreatingComm = -104,
    CommNoDev = -108,
    TimeoutError = -109,
    CommErrorWritingComm = -110,
    CommErrorReadingComm = -111,
    CommCountError = -112,
}

impl LepResult {
    pub fn is_ok(&self) -> bool {
        *self == LepResult::Ok
    }

    /// True for the no-acknowledge status an empty I2C address produces.
    pub fn is_nack(&self) -> bool {
        *self == LepResult::I2cNackReceived
    }
}
