//! The transport adaptation object owned by an open device session.
//!
//! `LeptonPort` turns SDK command ids into control transfers, carries the custom
//! channel used for I2C passthrough, and owns all per-session state. Every transfer
//! runs under the one transport lock, so at most one control transfer is in flight
//! no matter how many threads share the port.

use crate::command::{CommandId, UnitId, route};
use crate::constants::{CUSTOM_CONTROL_COMMAND, CUSTOM_FRAME_SIZE};
use crate::error::LepError;
use crate::mlx::{AuxSensor, Mlx90614Config};
use crate::observer::{PropertyChange, PropertyObserver};
use crate::transport::{Capabilities, ControlTransport, ExtensionUnit};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, trace, warn};
use zerocopy::IntoBytes;

pub struct LeptonPort<T: ControlTransport> {
    transport: Mutex<T>,
    units: Vec<ExtensionUnit>,
    capabilities: Capabilities,
    pub(crate) aux: Mutex<AuxSensor>,
    pub(crate) sensor_config: Mlx90614Config,
    observer: Option<Arc<dyn PropertyObserver>>,
}

impl<T: ControlTransport> LeptonPort<T> {
    /// Wrap an opened transport. `units` is the extension unit list the device
    /// advertised; capabilities are derived from it once, here.
    pub fn new(transport: T, units: Vec<ExtensionUnit>) -> Self {
        let capabilities = Capabilities::from_units(&units);
        for unit in &units {
            info!("Found extension unit {:?}", unit);
        }
        info!("Generic I2C passthrough: {}", capabilities.supports_generic_i2c);

        Self {
            transport: Mutex::new(transport),
            units,
            capabilities,
            aux: Mutex::new(AuxSensor::default()),
            sensor_config: Mlx90614Config::default(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PropertyObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_sensor_config(mut self, config: Mlx90614Config) -> Self {
        self.sensor_config = config;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn extension_units(&self) -> &[ExtensionUnit] {
        &self.units
    }

    pub fn sensor_config(&self) -> &Mlx90614Config {
        &self.sensor_config
    }

    /// Acquire the transport. The guard is the unit of serialization.
    pub(crate) fn bus(&self) -> MutexGuard<'_, T> {
        // a panic mid-transfer leaves no host-side invariant broken
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify(&self, change: PropertyChange) {
        if let Some(observer) = &self.observer {
            trace!(%change, "Property changed");
            observer.property_changed(change);
        }
    }

    /// Read `attribute.len()` 16-bit words for `cmd`. An empty attribute is a
    /// zero-length transfer.
    pub fn get_attribute(&self, cmd: CommandId, attribute: &mut [u16]) -> Result<(), LepError> {
        let sel = route(cmd)?;
        let unit = u8::from(sel.unit);
        let bytes = attribute.as_mut_bytes();
        let expected = bytes.len();

        let actual = self.bus().get_cur(unit, sel.control, bytes)?;
        check_transfer("get_attribute", unit, sel.control, expected, actual)
    }

    /// Write `attribute.len()` 16-bit words for `cmd`.
    pub fn set_attribute(&self, cmd: CommandId, attribute: &[u16]) -> Result<(), LepError> {
        let sel = route(cmd)?;
        let unit = u8::from(sel.unit);
        let bytes = attribute.as_bytes();

        let actual = self.bus().set_cur(unit, sel.control, bytes)?;
        check_transfer("set_attribute", unit, sel.control, bytes.len(), actual)
    }

    /// Trigger a run command. The one byte transferred is the control id itself.
    pub fn run_command(&self, cmd: CommandId) -> Result<(), LepError> {
        let sel = route(cmd)?;
        let unit = u8::from(sel.unit);

        let actual = self.bus().set_cur(unit, sel.control, &[sel.control])?;
        check_transfer("run_command", unit, sel.control, 1, actual)
    }

    /// Read a raw custom frame from the custom unit's command slot.
    pub fn custom_read(&self, frame: &mut [u8]) -> Result<(), LepError> {
        check_frame_len(frame.len())?;
        let unit = u8::from(UnitId::Custom);
        let actual = self.bus().get_cur(unit, CUSTOM_CONTROL_COMMAND, frame)?;
        check_transfer("custom_read", unit, CUSTOM_CONTROL_COMMAND, frame.len(), actual)
    }

    /// Write a raw custom frame to the custom unit's command slot.
    pub fn custom_write(&self, frame: &[u8]) -> Result<(), LepError> {
        let mut bus = self.bus();
        custom_write_locked(&mut *bus, frame)
    }
}

/// Custom channel write for callers that already hold the transport guard.
pub(crate) fn custom_write_locked<T: ControlTransport>(bus: &mut T, frame: &[u8]) -> Result<(), LepError> {
    check_frame_len(frame.len())?;
    let unit = u8::from(UnitId::Custom);
    let actual = bus.set_cur(unit, CUSTOM_CONTROL_COMMAND, frame)?;
    check_transfer("custom_write", unit, CUSTOM_CONTROL_COMMAND, frame.len(), actual)
}

fn check_frame_len(len: usize) -> Result<(), LepError> {
    if len != CUSTOM_FRAME_SIZE {
        return Err(LepError::InvalidArgument(format!(
            "Custom frame must be {} bytes, got {}",
            CUSTOM_FRAME_SIZE, len
        )));
    }
    Ok(())
}

pub(crate) fn check_transfer(
    op: &str,
    unit: u8,
    selector: u8,
    expected: usize,
    actual: usize,
) -> Result<(), LepError> {
    if actual != expected {
        warn!("{} failed on unit {:#04x} selector {}: {} of {} bytes", op, unit, selector, actual, expected);
        return Err(LepError::ShortTransfer {
            unit,
            selector,
            expected,
            actual,
        });
    }
    Ok(())
}
