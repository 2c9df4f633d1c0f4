//! Logical Lepton command ids and their mapping onto UVC extension units.
//!
//! The Lepton SDK addresses every camera setting with a 16-bit command id. The
//! PureThermal firmware exposes each SDK module as its own extension unit, and each
//! command of a module as one control (selector) of that unit.

use crate::constants::COMMAND_MODULE_MASK;
use crate::error::LepError;
use modular_bitfield::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandFields {
    pub kind: B2,
    pub index: B6,
    pub module: B6,
    pub oem: B2,
}

/// Extension unit ids of the PureThermal firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum UnitId {
    Agc = 3,
    Oem = 4,
    Rad = 5,
    Sys = 6,
    Vid = 7,
    I2c = 0x80,
    Custom = 0xFE,
}

/// SDK module, identified by bits 8-13 of a command id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Module {
    Agc = 0x01,
    Sys = 0x02,
    Vid = 0x03,
    Oem = 0x08,
    Rad = 0x0E,
}

impl Module {
    pub fn unit(&self) -> UnitId {
        match self {
            Module::Agc => UnitId::Agc,
            Module::Oem => UnitId::Oem,
            Module::Rad => UnitId::Rad,
            Module::Sys => UnitId::Sys,
            Module::Vid => UnitId::Vid,
        }
    }
}

/// Command type, bits 0-1 of a command id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandKind {
    Get = 0,
    Set = 1,
    Run = 2,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub u16);

impl CommandId {
    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn fields(&self) -> CommandFields {
        CommandFields::from_bytes(self.0.to_le_bytes())
    }

    /// The same command with its type bits replaced.
    pub fn with_kind(&self, kind: CommandKind) -> CommandId {
        CommandId((self.0 & !0x0003) | u8::from(kind) as u16)
    }

    pub fn module(&self) -> Option<Module> {
        Module::try_from(self.fields().module()).ok()
    }
}

impl From<u16> for CommandId {
    fn from(raw: u16) -> Self {
        CommandId(raw)
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({:#06x})", self.0)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// A resolved (extension unit, control selector) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSelector {
    pub unit: UnitId,
    pub control: u8,
}

/// Map a command id onto the extension unit and control that carry it.
///
/// Only the module bits pick the unit; the two OEM/reserved bits are masked off.
/// The control id is the operation index plus one.
pub fn route(cmd: CommandId) -> Result<UnitSelector, LepError> {
    let masked = cmd.raw() & COMMAND_MODULE_MASK;
    let module = Module::try_from((masked >> 8) as u8).map_err(|_| LepError::UnroutableCommand(cmd.raw()))?;
    Ok(UnitSelector {
        unit: module.unit(),
        control: cmd.fields().index() + 1,
    })
}
