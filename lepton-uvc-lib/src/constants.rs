// Protocol constants for the PureThermal UVC bridge

/// GroupGets PureThermal vendor id
pub const VID: u16 = 0x1E4E;

/// PureThermal product id
pub const PID: u16 = 0x0100;

/// Mask selecting the module bits of a command id (OEM/reserved bits 14-15 excluded)
pub const COMMAND_MODULE_MASK: u16 = 0x3F00;

/// Selector of the command slot on the custom unit
pub const CUSTOM_CONTROL_COMMAND: u8 = 1;

/// Selector of the I2C write-read slot on the custom unit
pub const CUSTOM_CONTROL_I2C_WRITE_READ: u8 = 7;

/// Bit in the custom unit's bmControls advertising the I2C write-read slot
pub const CUSTOM_I2C_CAPABILITY_BIT: u32 = (CUSTOM_CONTROL_I2C_WRITE_READ - 1) as u32;

/// Maximum write payload of an I2C request frame (510 bytes)
pub const I2C_MAX_WRITE: usize = 510;

/// Maximum read payload of an I2C response frame (512 bytes)
pub const I2C_MAX_READ: usize = 512;

/// Size of a custom request frame: address + two lengths + payload (516 bytes)
pub const CUSTOM_FRAME_SIZE: usize = 2 + 2 + 2 + I2C_MAX_WRITE;

/// Size of a custom response frame: status + payload (514 bytes)
pub const CUSTOM_RESPONSE_SIZE: usize = 2 + I2C_MAX_READ;

/// Number of 7-bit I2C addresses
pub const I2C_ADDRESS_COUNT: usize = 128;

/// UVC class request GET_CUR
pub const UVC_GET_CUR: u8 = 0x81;

/// UVC class request SET_CUR
pub const UVC_SET_CUR: u8 = 0x01;
