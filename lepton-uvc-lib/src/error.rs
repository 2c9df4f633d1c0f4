use crate::status::LepResult;
use nusb::transfer::TransferError;
use thiserror::Error;

/// The primary error type for the `lepton-uvc` library.
#[derive(Error, Debug)]
pub enum LepError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Command {0:#06x} does not belong to a routable module")]
    UnroutableCommand(u16),

    #[error("Short control transfer on unit {unit:#04x} selector {selector}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        unit: u8,
        selector: u8,
        expected: usize,
        actual: usize,
    },

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB device not found. Is the PureThermal board connected?")]
    DeviceNotFound,

    #[error("Device has no UVC VideoControl interface")]
    MissingVideoControl,

    #[error("I2C peripheral at {address:#04x} reported {status}")]
    Peripheral { address: u8, status: LepResult },

    #[error("Generic I2C passthrough is not supported by this firmware")]
    NotSupported,

    #[error("Auxiliary sensor is not available")]
    SensorUnavailable,

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// Coarse classification of a [`LepError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request. Nothing was sent to the device.
    Caller,
    /// The control transfer itself failed or was short.
    Communication,
    /// The addressed I2C peripheral answered with a non-OK status.
    Peripheral,
    /// Capability missing or sensor latched absent. An expected outcome.
    Unsupported,
    /// A reading was flagged invalid or failed a sanity bound.
    OutOfRange,
}

impl LepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LepError::InvalidArgument(_) | LepError::UnroutableCommand(_) => ErrorKind::Caller,
            LepError::ShortTransfer { .. }
            | LepError::Transfer(_)
            | LepError::Usb(_)
            | LepError::DeviceNotFound
            | LepError::MissingVideoControl => ErrorKind::Communication,
            LepError::Peripheral { .. } => ErrorKind::Peripheral,
            LepError::NotSupported | LepError::SensorUnavailable => ErrorKind::Unsupported,
            LepError::OutOfRange(_) => ErrorKind::OutOfRange,
        }
    }

    /// The SDK result code reported across the callback boundary.
    pub fn status(&self) -> LepResult {
        match self {
            LepError::InvalidArgument(_) => LepResult::Error,
            LepError::UnroutableCommand(_) => LepResult::RangeError,
            LepError::ShortTransfer { .. } | LepError::Transfer(_) => LepResult::CommErrorReadingComm,
            LepError::Usb(_) | LepError::DeviceNotFound => LepResult::CommNoDev,
            LepError::MissingVideoControl => LepResult::ErrorCreatingComm,
            LepError::Peripheral { status, .. } => *status,
            LepError::NotSupported | LepError::SensorUnavailable => LepResult::FunctionNotSupported,
            LepError::OutOfRange(_) => LepResult::DataOutOfRangeError,
        }
    }
}
