use crate::command::UnitId;
use crate::constants::CUSTOM_I2C_CAPABILITY_BIT;
use crate::error::LepError;
use std::fmt;

/// Synchronous UVC control transfer primitive.
///
/// Both calls return the number of bytes actually transferred. The adaptation
/// layer treats any count other than the requested one as a communication error,
/// so implementations should report what the bus reported rather than failing on
/// short transfers themselves.
pub trait ControlTransport: Send {
    /// GET_CUR of `buf.len()` bytes from `selector` on extension unit `unit`.
    fn get_cur(&mut self, unit: u8, selector: u8, buf: &mut [u8]) -> Result<usize, LepError>;

    /// SET_CUR of `data` to `selector` on extension unit `unit`.
    fn set_cur(&mut self, unit: u8, selector: u8, data: &[u8]) -> Result<usize, LepError>;
}

impl<T: ControlTransport + ?Sized> ControlTransport for Box<T> {
    fn get_cur(&mut self, unit: u8, selector: u8, buf: &mut [u8]) -> Result<usize, LepError> {
        (**self).get_cur(unit, selector, buf)
    }

    fn set_cur(&mut self, unit: u8, selector: u8, data: &[u8]) -> Result<usize, LepError> {
        (**self).set_cur(unit, selector, data)
    }
}

/// A vendor extension unit as advertised by the VideoControl interface.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtensionUnit {
    pub unit_id: u8,
    pub guid: [u8; 16],
    /// bmControls; bit n advertises control n + 1
    pub controls: u64,
}

impl ExtensionUnit {
    pub fn new(unit_id: u8, controls: u64) -> Self {
        Self {
            unit_id,
            guid: [0; 16],
            controls,
        }
    }

    pub fn has_control(&self, selector: u8) -> bool {
        (1..=64).contains(&selector) && self.controls & (1u64 << (selector - 1)) != 0
    }
}

impl fmt::Debug for ExtensionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExtensionUnit {{ id: {}, controls: {:08x}, guid: {} }}",
            self.unit_id,
            self.controls,
            hex::encode(self.guid)
        )
    }
}

/// Features derived once from the extension unit list at open time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_generic_i2c: bool,
}

impl Capabilities {
    pub fn from_units(units: &[ExtensionUnit]) -> Self {
        let custom = u8::from(UnitId::Custom);
        let supports_generic_i2c = units
            .iter()
            .find(|u| u.unit_id == custom)
            .is_some_and(|u| u.controls & (1u64 << CUSTOM_I2C_CAPABILITY_BIT) != 0);
        Self { supports_generic_i2c }
    }
}
