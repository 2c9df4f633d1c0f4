//! USB transport for PureThermal boards, using UVC class control requests on the
//! VideoControl interface.

use crate::constants::{PID, UVC_GET_CUR, UVC_SET_CUR, VID};
use crate::error::LepError;
use crate::transport::{ControlTransport, ExtensionUnit};
use nusb::Interface;
use nusb::transfer::{Control, ControlType, Recipient};
use std::time::Duration;
use tracing::{debug, info};

const USB_CLASS_VIDEO: u8 = 0x0E;
const USB_SUBCLASS_VIDEOCONTROL: u8 = 0x01;
const CS_INTERFACE: u8 = 0x24;
const VC_EXTENSION_UNIT: u8 = 0x06;

// Default timeout for a single control transfer
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub vid: u16,
    pub pid: u16,
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            vid: VID,
            pid: PID,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// An opened device, ready to be wrapped in a [`crate::LeptonPort`].
pub struct UvcDevice {
    pub transport: UvcTransport,
    pub units: Vec<ExtensionUnit>,
    /// USB serial string; the PureThermal firmware reports its version here
    pub firmware: String,
}

pub struct UvcTransport {
    interface: Interface,
    vc_interface: u8,
    timeout: Duration,
}

impl UvcTransport {
    /// Find the board, claim its VideoControl interface and list its extension units.
    pub fn open(config: &PortConfig) -> Result<UvcDevice, LepError> {
        info!("Searching for PureThermal {:04x}:{:04x}...", config.vid, config.pid);
        let device_info = nusb::list_devices()?
            .find(|d| d.vendor_id() == config.vid && d.product_id() == config.pid)
            .ok_or(LepError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );
        let firmware = device_info.serial_number().unwrap_or_default().to_string();
        info!(
            "Using {} {} with firmware {}",
            device_info.manufacturer_string().unwrap_or("?"),
            device_info.product_string().unwrap_or("?"),
            firmware
        );

        let device = device_info.open()?;
        let configuration = device
            .active_configuration()
            .map_err(|_| LepError::MissingVideoControl)?;

        let mut vc_interface = None;
        let mut units = Vec::new();
        for alt in configuration.interface_alt_settings() {
            if alt.class() != USB_CLASS_VIDEO || alt.subclass() != USB_SUBCLASS_VIDEOCONTROL {
                continue;
            }
            vc_interface.get_or_insert(alt.interface_number());
            for descriptor in alt.descriptors() {
                if let Some(unit) = parse_extension_unit(&descriptor) {
                    units.push(unit);
                }
            }
        }
        let vc_interface = vc_interface.ok_or(LepError::MissingVideoControl)?;

        let interface = device.detach_and_claim_interface(vc_interface)?;
        info!("VideoControl interface {} claimed successfully.", vc_interface);

        Ok(UvcDevice {
            transport: UvcTransport {
                interface,
                vc_interface,
                timeout: config.timeout,
            },
            units,
            firmware,
        })
    }

    fn control(&self, request: u8, unit: u8, selector: u8) -> Control {
        Control {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request,
            value: (selector as u16) << 8,
            index: ((unit as u16) << 8) | self.vc_interface as u16,
        }
    }
}

impl ControlTransport for UvcTransport {
    fn get_cur(&mut self, unit: u8, selector: u8, buf: &mut [u8]) -> Result<usize, LepError> {
        let control = self.control(UVC_GET_CUR, unit, selector);
        let n = self.interface.control_in_blocking(control, buf, self.timeout)?;
        debug!(unit, selector, bytes = hex::encode(&buf[..n]), "UVC GET_CUR");
        Ok(n)
    }

    fn set_cur(&mut self, unit: u8, selector: u8, data: &[u8]) -> Result<usize, LepError> {
        debug!(unit, selector, bytes = hex::encode(data), "UVC SET_CUR");
        let control = self.control(UVC_SET_CUR, unit, selector);
        Ok(self.interface.control_out_blocking(control, data, self.timeout)?)
    }
}

/// Decode a VC_EXTENSION_UNIT descriptor; `None` for any other descriptor.
///
/// Layout: bLength, bDescriptorType, bDescriptorSubtype, bUnitID, guid[16],
/// bNumControls, bNrInPins, baSourceID[p], bControlSize, bmControls[n], iExtension.
pub fn parse_extension_unit(desc: &[u8]) -> Option<ExtensionUnit> {
    if desc.len() < 24 || desc[1] != CS_INTERFACE || desc[2] != VC_EXTENSION_UNIT {
        return None;
    }
    let unit_id = desc[3];
    let guid: [u8; 16] = desc[4..20].try_into().ok()?;
    let pins = desc[21] as usize;
    let size_at = 22 + pins;
    let control_size = *desc.get(size_at)? as usize;
    let bitmap = desc.get(size_at + 1..size_at + 1 + control_size)?;

    // bmControls is little-endian and at most 8 bytes are meaningful here
    let controls = bitmap
        .iter()
        .take(8)
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i));

    Some(ExtensionUnit {
        unit_id,
        guid,
        controls,
    })
}
