//! I2C passthrough over the custom extension unit.
//!
//! A transaction is two control transfers under one lock: the request frame goes
//! to the custom unit's command slot, then the response frame is fetched from the
//! write-read slot. The bridge performs the I2C transaction in between.
//!
//! There are two levels of outcome. The `Result` reports whether the control
//! transfers worked. [`I2cReply::status`] reports what happened on the I2C bus, for
//! example [`LepResult::I2cNackReceived`] when nobody answered at the address.

use crate::command::UnitId;
use crate::constants::{CUSTOM_CONTROL_I2C_WRITE_READ, CUSTOM_RESPONSE_SIZE, I2C_ADDRESS_COUNT};
use crate::error::LepError;
use crate::frame::{I2cRequestFrame, I2cResponseFrame};
use crate::port::{LeptonPort, check_transfer, custom_write_locked};
use crate::status::LepResult;
use crate::transport::ControlTransport;
use bytes::Bytes;
use std::fmt;
use tracing::{debug, info};
use zerocopy::IntoBytes;

/// A 7-bit I2C address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct I2cAddress(u8);

impl I2cAddress {
    pub const MAX: u8 = 0x7F;

    pub fn value(&self) -> u8 {
        self.0
    }

    /// The next address up, if still within the 7-bit space.
    pub fn next(&self) -> Option<I2cAddress> {
        I2cAddress::try_from(self.0 + 1).ok()
    }

    pub fn all() -> impl Iterator<Item = I2cAddress> {
        (0..=Self::MAX).map(I2cAddress)
    }
}

impl TryFrom<u8> for I2cAddress {
    type Error = LepError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(LepError::InvalidArgument(format!("I2C address {:#04x} is not 7-bit", value)));
        }
        Ok(I2cAddress(value))
    }
}

impl fmt::Debug for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I2cAddress({:#04x})", self.0)
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Outcome of a completed passthrough transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct I2cReply {
    /// Status reported by the bridge for the I2C transaction itself
    pub status: LepResult,
    /// Exactly the requested number of read bytes; empty without a read phase
    pub data: Bytes,
}

impl I2cReply {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Result of probing every 7-bit address.
#[derive(Clone, PartialEq)]
pub struct I2cScan {
    statuses: [LepResult; I2C_ADDRESS_COUNT],
    /// First status that was neither OK nor a NACK
    pub first_unusual: Option<LepResult>,
}

impl I2cScan {
    pub fn is_present(&self, address: I2cAddress) -> bool {
        self.statuses[address.value() as usize].is_ok()
    }

    pub fn presence(&self) -> [bool; I2C_ADDRESS_COUNT] {
        self.statuses.map(|s| s.is_ok())
    }

    pub fn present(&self) -> impl Iterator<Item = I2cAddress> + '_ {
        I2cAddress::all().filter(|a| self.is_present(*a))
    }

    pub fn status(&self, address: I2cAddress) -> LepResult {
        self.statuses[address.value() as usize]
    }
}

impl fmt::Debug for I2cScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cScan")
            .field("present", &self.present().collect::<Vec<_>>())
            .field("first_unusual", &self.first_unusual)
            .finish()
    }
}

// i2cdetect style: "--" for a NACK, "??" for anything else that is not an ACK
impl fmt::Display for I2cScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, status) in self.statuses.iter().enumerate() {
            if i % 16 == 0 {
                write!(f, "{:02x}:", i)?;
            }
            if status.is_ok() {
                write!(f, " {:02x}", i)?;
            } else if status.is_nack() {
                write!(f, " --")?;
            } else {
                write!(f, " ??")?;
            }
            if i % 16 == 15 {
                writeln!(f)?;
            }
        }
        if let Some(unusual) = self.first_unusual {
            writeln!(f, "Result for first ?? is {} ({}).", unusual, i16::from(unusual))?;
        }
        Ok(())
    }
}

impl<T: ControlTransport> LeptonPort<T> {
    /// Combined I2C transaction. `None` skips that phase.
    pub fn i2c_write_read(
        &self,
        address: I2cAddress,
        write: Option<&[u8]>,
        read_len: Option<usize>,
    ) -> Result<I2cReply, LepError> {
        let request = I2cRequestFrame::new(address.value(), write, read_len)?;
        if !self.capabilities().supports_generic_i2c {
            return Err(LepError::NotSupported);
        }

        let unit = u8::from(UnitId::Custom);
        let mut response = [0u8; CUSTOM_RESPONSE_SIZE];
        {
            let mut bus = self.bus();
            custom_write_locked(&mut *bus, request.as_bytes())?;
            let actual = bus.get_cur(unit, CUSTOM_CONTROL_I2C_WRITE_READ, &mut response)?;
            check_transfer(
                "i2c_write_read",
                unit,
                CUSTOM_CONTROL_I2C_WRITE_READ,
                CUSTOM_RESPONSE_SIZE,
                actual,
            )?;
        }

        let response = I2cResponseFrame::from_bytes(&response)?;
        let status = response.status();
        if status == LepResult::Error {
            debug!(
                "I2C transaction at {} got {}, {}",
                address,
                status,
                hex::encode(&response.data[..4])
            );
        }

        let data = match read_len {
            Some(len) => Bytes::copy_from_slice(&response.data[..len]),
            None => Bytes::new(),
        };
        Ok(I2cReply { status, data })
    }

    /// I2C write without a read phase.
    pub fn i2c_write(&self, address: I2cAddress, data: &[u8]) -> Result<I2cReply, LepError> {
        self.i2c_write_read(address, Some(data), None)
    }

    /// I2C read without a write phase.
    pub fn i2c_read(&self, address: I2cAddress, len: usize) -> Result<I2cReply, LepError> {
        self.i2c_write_read(address, None, Some(len))
    }

    /// Probe all 128 addresses with a zero-length write.
    ///
    /// Zero- or one-byte reads can hang the bridge once it has talked to the
    /// Lepton while an MLX90614 shares the bus, so the probe is a write. A
    /// transport failure aborts the scan; peripheral statuses never do.
    pub fn i2c_scan(&self, verbose: bool) -> Result<I2cScan, LepError> {
        if !self.capabilities().supports_generic_i2c {
            return Err(LepError::NotSupported);
        }

        let mut statuses = [LepResult::I2cNackReceived; I2C_ADDRESS_COUNT];
        let mut first_unusual = None;
        for address in I2cAddress::all() {
            let reply = self.i2c_write(address, &[])?;
            if !reply.status.is_ok() && !reply.status.is_nack() && first_unusual.is_none() {
                first_unusual = Some(reply.status);
            }
            statuses[address.value() as usize] = reply.status;
        }

        let scan = I2cScan {
            statuses,
            first_unusual,
        };
        if verbose {
            info!("I2C scan:\n{}", scan);
        }
        Ok(scan)
    }
}
