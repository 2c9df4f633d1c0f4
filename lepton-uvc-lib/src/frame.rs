use crate::constants::{CUSTOM_FRAME_SIZE, CUSTOM_RESPONSE_SIZE, I2C_MAX_READ, I2C_MAX_WRITE};
use crate::error::LepError;
use crate::status::LepResult;
use zerocopy::byteorder::little_endian::{I16, U16};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

/// I2C passthrough request as written to the custom unit's command slot (516 bytes)
///
/// A length of -1 means the phase is skipped entirely, which is different from a
/// zero-length phase: a zero-length write still addresses the peripheral and
/// collects an acknowledge.
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct I2cRequestFrame {
    pub address: U16,
    pub write_len: I16,
    pub read_len: I16,
    pub data: [u8; I2C_MAX_WRITE],
}

/// I2C passthrough response read from the write-read slot (514 bytes)
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct I2cResponseFrame {
    pub status: I16,
    pub data: [u8; I2C_MAX_READ],
}

const _: () = assert!(size_of::<I2cRequestFrame>() == CUSTOM_FRAME_SIZE);
const _: () = assert!(size_of::<I2cResponseFrame>() == CUSTOM_RESPONSE_SIZE);

impl I2cRequestFrame {
    /// Build a request; `None` encodes a skipped phase.
    ///
    /// The payload field is always fully zeroed before the write data is copied in.
    pub fn new(address: u8, write: Option<&[u8]>, read_len: Option<usize>) -> Result<Self, LepError> {
        if let Some(data) = write {
            if data.len() > I2C_MAX_WRITE {
                return Err(LepError::InvalidArgument(format!(
                    "I2C write of {} bytes exceeds {} bytes",
                    data.len(),
                    I2C_MAX_WRITE
                )));
            }
        }
        if let Some(len) = read_len {
            if len > I2C_MAX_READ {
                return Err(LepError::InvalidArgument(format!(
                    "I2C read of {} bytes exceeds {} bytes",
                    len, I2C_MAX_READ
                )));
            }
        }

        let mut frame = Self::new_zeroed();
        frame.address = U16::new(address as u16);
        frame.write_len = I16::new(write.map_or(-1, |d| d.len() as i16));
        frame.read_len = I16::new(read_len.map_or(-1, |l| l as i16));
        if let Some(data) = write {
            frame.data[..data.len()].copy_from_slice(data);
        }
        Ok(frame)
    }

    pub fn write_len(&self) -> Option<usize> {
        usize::try_from(self.write_len.get()).ok()
    }

    pub fn read_len(&self) -> Option<usize> {
        usize::try_from(self.read_len.get()).ok()
    }
}

impl I2cResponseFrame {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LepError> {
        Self::read_from_bytes(bytes).map_err(|_| {
            LepError::InvalidArgument(format!(
                "I2C response must be {} bytes, got {}",
                CUSTOM_RESPONSE_SIZE,
                bytes.len()
            ))
        })
    }

    pub fn status(&self) -> LepResult {
        LepResult::from(self.status.get())
    }
}
