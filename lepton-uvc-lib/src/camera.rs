//! Typed Lepton commands and the periodic session tick.

use crate::command::{CommandId, CommandKind};
use crate::error::LepError;
use crate::observer::PropertyChange;
use crate::port::LeptonPort;
use crate::sdk::AttributePort;
use crate::transport::ControlTransport;
use std::fmt;
use tracing::debug;
use zerocopy::IntoBytes;

pub const SYS_FLIR_SERIAL_NUMBER: CommandId = CommandId(0x0208);
pub const SYS_FFC_NORMALIZATION: CommandId = CommandId(0x0240);
pub const OEM_FLIR_PART_NUMBER: CommandId = CommandId(0x481C);
pub const OEM_SOFTWARE_VERSION: CommandId = CommandId(0x4820);
pub const RAD_SPOTMETER_ROI: CommandId = CommandId(0x4ECC);
pub const RAD_SPOTMETER_OBJ_KELVIN: CommandId = CommandId(0x4ED0);

/// Part numbers of the radiometric Lepton variants
const RADIOMETRIC_PART_NUMBERS: [&str; 2] = ["500-0763-01", "500-0771-01"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoftwareVersion {
    pub gpp_major: u8,
    pub gpp_minor: u8,
    pub gpp_build: u8,
    pub dsp_major: u8,
    pub dsp_minor: u8,
    pub dsp_build: u8,
}

impl SoftwareVersion {
    pub fn gpp(&self) -> String {
        format!("{}.{}.{}", self.gpp_major, self.gpp_minor, self.gpp_build)
    }

    pub fn dsp(&self) -> String {
        format!("{}.{}.{}", self.dsp_major, self.dsp_minor, self.dsp_build)
    }
}

/// Spotmeter region of interest in sensor pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpotmeterRoi {
    pub start_row: u16,
    pub start_col: u16,
    pub end_row: u16,
    pub end_col: u16,
}

impl SpotmeterRoi {
    /// Edges past the end of the coordinate space are clamped to `u16::MAX`.
    pub fn from_rect(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            start_row: y,
            start_col: x,
            end_row: y.saturating_add(height),
            end_col: x.saturating_add(width),
        }
    }

    fn to_words(self) -> [u16; 4] {
        [self.start_row, self.start_col, self.end_row, self.end_col]
    }
}

/// Spotmeter statistics in centi-kelvin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpotmeterReading {
    pub value: u16,
    pub max: u16,
    pub min: u16,
    pub population: u16,
}

impl SpotmeterReading {
    pub fn kelvin(&self) -> f64 {
        self.value as f64 / 100.0
    }
}

impl fmt::Display for SpotmeterReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} K (min {:.2} K, max {:.2} K, {} px)",
            self.kelvin(),
            self.min as f64 / 100.0,
            self.max as f64 / 100.0,
            self.population
        )
    }
}

/// Typed access to the camera settings used by the host application.
pub trait LeptonCommands: AttributePort {
    fn flir_serial_number(&self) -> Result<u64, LepError> {
        let mut words = [0u16; 4];
        self.get_attribute(SYS_FLIR_SERIAL_NUMBER, &mut words)?;
        Ok(words.iter().rev().fold(0u64, |acc, &w| (acc << 16) | w as u64))
    }

    fn oem_software_version(&self) -> Result<SoftwareVersion, LepError> {
        let mut words = [0u16; 4];
        self.get_attribute(OEM_SOFTWARE_VERSION, &mut words)?;
        let b = words.as_bytes();
        Ok(SoftwareVersion {
            gpp_major: b[0],
            gpp_minor: b[1],
            gpp_build: b[2],
            dsp_major: b[3],
            dsp_minor: b[4],
            dsp_build: b[5],
        })
    }

    fn oem_part_number(&self) -> Result<String, LepError> {
        let mut words = [0u16; 16];
        self.get_attribute(OEM_FLIR_PART_NUMBER, &mut words)?;
        // Latin-1, NUL padded
        Ok(words
            .as_bytes()
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect())
    }

    fn spotmeter_roi(&self) -> Result<SpotmeterRoi, LepError> {
        let mut w = [0u16; 4];
        self.get_attribute(RAD_SPOTMETER_ROI, &mut w)?;
        Ok(SpotmeterRoi {
            start_row: w[0],
            start_col: w[1],
            end_row: w[2],
            end_col: w[3],
        })
    }

    fn set_spotmeter_roi(&self, roi: SpotmeterRoi) -> Result<(), LepError> {
        self.set_attribute(RAD_SPOTMETER_ROI.with_kind(CommandKind::Set), &roi.to_words())
    }

    fn spotmeter_obj_kelvin_x100(&self) -> Result<SpotmeterReading, LepError> {
        let mut w = [0u16; 4];
        self.get_attribute(RAD_SPOTMETER_OBJ_KELVIN, &mut w)?;
        Ok(SpotmeterReading {
            value: w[0],
            max: w[1],
            min: w[2],
            population: w[3],
        })
    }

    fn run_ffc_normalization(&self) -> Result<(), LepError> {
        self.run_command(SYS_FFC_NORMALIZATION.with_kind(CommandKind::Run))
    }
}

impl<P: AttributePort + ?Sized> LeptonCommands for P {}

/// Identification strings gathered at open time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// PureThermal firmware version, reported as the USB serial string
    pub pt_firmware: String,
    pub part_number: String,
    pub software_version: SoftwareVersion,
    pub serial_number: u64,
}

impl DeviceIdentity {
    pub fn read(port: &dyn AttributePort, pt_firmware: impl Into<String>) -> Result<Self, LepError> {
        Ok(Self {
            pt_firmware: pt_firmware.into(),
            part_number: port.oem_part_number()?,
            software_version: port.oem_software_version()?,
            serial_number: port.flir_serial_number()?,
        })
    }

    pub fn supports_runtime_agc_change(&self) -> bool {
        !self.pt_firmware.starts_with("v0")
    }

    pub fn supports_hw_pseudo_color(&self) -> bool {
        self.supports_runtime_agc_change() || !self.pt_firmware.contains("Y16")
    }

    pub fn supports_radiometry(&self) -> bool {
        let y16_firmware = self.pt_firmware.contains("Y16");
        let radiometric = RADIOMETRIC_PART_NUMBERS
            .iter()
            .any(|p| self.part_number.contains(p));
        (self.supports_runtime_agc_change() || y16_firmware) && radiometric
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PureThermal firmware: {}", self.pt_firmware)?;
        writeln!(f, "FLIR part number:     {}", self.part_number)?;
        writeln!(f, "FLIR serial number:   {:08x}", self.serial_number)?;
        writeln!(f, "GPP software version: {}", self.software_version.gpp())?;
        write!(f, "DSP software version: {}", self.software_version.dsp())
    }
}

impl<T: ControlTransport> LeptonPort<T> {
    /// Move the spotmeter and tell observers both the region and the value changed.
    pub fn update_spotmeter_roi(&self, roi: SpotmeterRoi) -> Result<(), LepError> {
        self.set_spotmeter_roi(roi)?;
        self.notify(PropertyChange::RadSpotmeterRoi);
        self.notify(PropertyChange::RadSpotmeterInKelvinX100);
        Ok(())
    }

    /// Periodic tick, nominally once per second.
    ///
    /// Sensor failures are absorbed by the auxiliary sensor's error counter and
    /// never returned from here.
    pub fn poll(&self) {
        self.notify(PropertyChange::RadSpotmeterInKelvinX100);

        if !self.aux_sensor_present() {
            return;
        }
        if let Err(e) = self.read_aux_ambient() {
            debug!("Ambient reading skipped: {}", e);
        }
        if let Err(e) = self.read_aux_object() {
            debug!("Object reading skipped: {}", e);
        }
    }
}
