//! Callback boundary towards the Lepton SDK.
//!
//! The SDK encodes and decodes camera settings itself and only needs three
//! transport hooks per port: get attribute, set attribute and run command. Each
//! port descriptor carries an opaque user reference back to whatever object owns
//! that port. Here it is a borrowed [`AttributePort`] trait object, not a raw
//! pointer, so the descriptor cannot outlive the port it dispatches to.

use crate::command::CommandId;
use crate::error::LepError;
use crate::port::LeptonPort;
use crate::status::LepResult;
use crate::transport::ControlTransport;
use std::fmt;
use tracing::debug;

/// Transport capability the SDK callbacks dispatch into.
pub trait AttributePort: Send + Sync {
    fn get_attribute(&self, cmd: CommandId, attribute: &mut [u16]) -> Result<(), LepError>;
    fn set_attribute(&self, cmd: CommandId, attribute: &[u16]) -> Result<(), LepError>;
    fn run_command(&self, cmd: CommandId) -> Result<(), LepError>;
}

impl<T: ControlTransport> AttributePort for LeptonPort<T> {
    fn get_attribute(&self, cmd: CommandId, attribute: &mut [u16]) -> Result<(), LepError> {
        LeptonPort::get_attribute(self, cmd, attribute)
    }

    fn set_attribute(&self, cmd: CommandId, attribute: &[u16]) -> Result<(), LepError> {
        LeptonPort::set_attribute(self, cmd, attribute)
    }

    fn run_command(&self, cmd: CommandId) -> Result<(), LepError> {
        LeptonPort::run_command(self, cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    I2c,
    Uvc,
}

/// Per-port descriptor handed to the SDK.
#[derive(Clone, Copy)]
pub struct PortDescriptor<'a> {
    pub port_id: u16,
    pub port_type: PortType,
    user: &'a dyn AttributePort,
}

impl<'a> PortDescriptor<'a> {
    pub fn new(port_id: u16, port_type: PortType, user: &'a dyn AttributePort) -> Self {
        Self {
            port_id,
            port_type,
            user,
        }
    }

    pub fn port(&self) -> &'a dyn AttributePort {
        self.user
    }
}

impl fmt::Debug for PortDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortDescriptor")
            .field("port_id", &self.port_id)
            .field("port_type", &self.port_type)
            .finish_non_exhaustive()
    }
}

fn to_status(op: &str, cmd: u16, result: Result<(), LepError>) -> LepResult {
    match result {
        Ok(()) => LepResult::Ok,
        Err(e) => {
            debug!("{} {:#06x} failed: {}", op, cmd, e);
            e.status()
        }
    }
}

/// `GetAttribute` hook: read `word_length` words into `attribute`.
pub fn uvc_get_attribute(
    port: &PortDescriptor<'_>,
    command_id: u16,
    attribute: &mut [u16],
    word_length: u16,
) -> LepResult {
    let Some(attribute) = attribute.get_mut(..word_length as usize) else {
        return LepResult::DataSizeError;
    };
    to_status(
        "GetAttribute",
        command_id,
        port.user.get_attribute(CommandId(command_id), attribute),
    )
}

/// `SetAttribute` hook: write the first `word_length` words of `attribute`.
pub fn uvc_set_attribute(
    port: &PortDescriptor<'_>,
    command_id: u16,
    attribute: &[u16],
    word_length: u16,
) -> LepResult {
    let Some(attribute) = attribute.get(..word_length as usize) else {
        return LepResult::DataSizeError;
    };
    to_status(
        "SetAttribute",
        command_id,
        port.user.set_attribute(CommandId(command_id), attribute),
    )
}

/// `RunCommand` hook.
pub fn uvc_run_command(port: &PortDescriptor<'_>, command_id: u16) -> LepResult {
    to_status("RunCommand", command_id, port.user.run_command(CommandId(command_id)))
}
