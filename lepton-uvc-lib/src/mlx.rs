//! Driver for an MLX90614 infrared thermometer on the passthrough I2C bus.
//!
//! The sensor has no identification register, so detection is a heuristic: it
//! must acknowledge at its address, the next address up must stay silent, two
//! EEPROM cells must hold their factory values, and a first pair of readings must
//! be physically plausible.
//!
//! After detection the sensor is read periodically. Failed reads feed a bounded
//! error counter; once it saturates the sensor is latched absent for the rest of
//! the session, or until detection is run again.

use crate::error::{ErrorKind, LepError};
use crate::i2c::I2cAddress;
use crate::observer::PropertyChange;
use crate::port::LeptonPort;
use crate::transport::ControlTransport;
use serde::{Deserialize, Serialize};
use std::sync::{MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uom::si::f64::ThermodynamicTemperature;
use uom::si::thermodynamic_temperature::{degree_celsius, kelvin};

/// RAM register: ambient (die) temperature
pub const RAM_TA: u8 = 0x06;
/// RAM register: object temperature, zone 1
pub const RAM_TOBJ1: u8 = 0x07;
/// Command prefix for EEPROM access
pub const EEPROM_ACCESS: u8 = 0x20;

/// Bit 15 of a RAM temperature word flags an invalid reading
pub const READING_ERROR_FLAG: u16 = 0x8000;

/// Kelvin per LSB of a RAM temperature word
pub const KELVIN_PER_LSB: f64 = 0.02;

/// Bytes returned per word read: LSB, MSB, PEC
const WORD_READ_LEN: usize = 3;

/// Expected content of one EEPROM cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EepromSignature {
    pub cell: u8,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mlx90614Config {
    pub address: u8,
    pub signatures: Vec<EepromSignature>,
    pub ambient_limits_celsius: (f64, f64),
    pub object_limits_celsius: (f64, f64),
}

impl Default for Mlx90614Config {
    fn default() -> Self {
        Self {
            address: 0x5A,
            // factory To_max and To_min
            signatures: vec![
                EepromSignature {
                    cell: 0x00,
                    value: 0x9993,
                },
                EepromSignature {
                    cell: 0x01,
                    value: 0x62E3,
                },
            ],
            ambient_limits_celsius: (-60.0, 150.0),
            object_limits_celsius: (-100.0, 500.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorState {
    #[default]
    Unprobed,
    Present,
    Absent,
}

/// Error counter clamped to [-LIMIT, LIMIT].
///
/// Successful reads bank credit down to -LIMIT, so a sensor with a long good
/// history tolerates a longer burst of errors before it is latched absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorCounter(i8);

impl ErrorCounter {
    pub const LIMIT: i8 = 5;

    pub fn value(&self) -> i8 {
        self.0
    }

    /// Count a failure; true once the counter sits at the upper bound.
    pub fn record_failure(&mut self) -> bool {
        self.0 = (self.0 + 1).min(Self::LIMIT);
        self.0 == Self::LIMIT
    }

    pub fn record_success(&mut self) {
        self.0 = (self.0 - 1).max(-Self::LIMIT);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuxSensor {
    pub state: SensorState,
    pub errors: ErrorCounter,
    pub ambient: Option<ThermodynamicTemperature>,
    pub object: Option<ThermodynamicTemperature>,
}

impl AuxSensor {
    /// Record a failed read; returns true on the Present -> Absent transition.
    fn record_failure(&mut self) -> bool {
        if self.errors.record_failure() && self.state == SensorState::Present {
            self.state = SensorState::Absent;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Ambient,
    Object,
}

impl Channel {
    fn register(&self) -> u8 {
        match self {
            Channel::Ambient => RAM_TA,
            Channel::Object => RAM_TOBJ1,
        }
    }

    fn change(&self) -> PropertyChange {
        match self {
            Channel::Ambient => PropertyChange::AuxAmbientTemperature,
            Channel::Object => PropertyChange::AuxObjectTemperature,
        }
    }
}

/// Convert a RAM temperature word; words with the error flag set are rejected.
pub fn raw_to_temperature(raw: u16) -> Result<ThermodynamicTemperature, LepError> {
    if raw & READING_ERROR_FLAG != 0 {
        return Err(LepError::OutOfRange(format!("reading {:#06x} has the error flag set", raw)));
    }
    Ok(ThermodynamicTemperature::new::<kelvin>(raw as f64 * KELVIN_PER_LSB))
}

fn check_limits(temp: ThermodynamicTemperature, limits: (f64, f64), what: &str) -> Result<(), String> {
    let celsius = temp.get::<degree_celsius>();
    if celsius < limits.0 || celsius > limits.1 {
        return Err(format!(
            "{} temperature {:.2} °C outside [{}, {}]",
            what, celsius, limits.0, limits.1
        ));
    }
    Ok(())
}

impl<T: ControlTransport> LeptonPort<T> {
    fn aux(&self) -> MutexGuard<'_, AuxSensor> {
        self.aux.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn aux_sensor_state(&self) -> SensorState {
        self.aux().state
    }

    pub fn aux_sensor_present(&self) -> bool {
        self.aux_sensor_state() == SensorState::Present
    }

    pub fn aux_error_count(&self) -> i8 {
        self.aux().errors.value()
    }

    /// Last good (ambient, object) readings.
    pub fn aux_readings(&self) -> (Option<ThermodynamicTemperature>, Option<ThermodynamicTemperature>) {
        let aux = self.aux();
        (aux.ambient, aux.object)
    }

    /// Read one 16-bit word from the sensor. The trailing PEC byte is not checked.
    pub fn read_mlx_word(&self, address: I2cAddress, command: u8) -> Result<u16, LepError> {
        let reply = self.i2c_write_read(address, Some(&[command]), Some(WORD_READ_LEN))?;
        if !reply.is_ok() {
            return Err(LepError::Peripheral {
                address: address.value(),
                status: reply.status,
            });
        }
        Ok(u16::from_le_bytes([reply.data[0], reply.data[1]]))
    }

    /// Run the detection heuristic and store its outcome.
    ///
    /// Never fails: every problem, transport errors included, ends in
    /// [`SensorState::Absent`].
    pub fn enumerate_aux_sensor(&self) -> SensorState {
        let outcome = self.detect_aux_sensor();

        let (state, changed) = {
            let mut aux = self.aux();
            let was_present = aux.state == SensorState::Present;
            match outcome {
                Ok((ambient, object)) => {
                    info!(
                        "MLX90614 found at {:#04x}: ambient {:.2} °C, object {:.2} °C",
                        self.sensor_config.address,
                        ambient.get::<degree_celsius>(),
                        object.get::<degree_celsius>()
                    );
                    aux.state = SensorState::Present;
                    aux.ambient = Some(ambient);
                    aux.object = Some(object);
                }
                Err(reason) => {
                    info!("No MLX90614: {}", reason);
                    aux.state = SensorState::Absent;
                    aux.ambient = None;
                    aux.object = None;
                }
            }
            aux.errors.reset();
            (aux.state, was_present != (aux.state == SensorState::Present))
        };

        if changed {
            self.notify(PropertyChange::AuxSensorAvailable);
        }
        state
    }

    fn detect_aux_sensor(&self) -> Result<(ThermodynamicTemperature, ThermodynamicTemperature), String> {
        if !self.capabilities().supports_generic_i2c {
            return Err("generic I2C passthrough not supported".to_string());
        }
        let config = &self.sensor_config;
        let address = I2cAddress::try_from(config.address).map_err(|e| e.to_string())?;

        let reply = self.i2c_write(address, &[]).map_err(|e| e.to_string())?;
        if !reply.is_ok() {
            return Err(format!("no acknowledge at {} ({})", address, reply.status));
        }

        // a device answering here too means the bus is not what we think it is
        if let Some(alias) = address.next() {
            let reply = self.i2c_write(alias, &[]).map_err(|e| e.to_string())?;
            if reply.is_ok() {
                return Err(format!("unexpected acknowledge at {}", alias));
            }
        }

        for sig in &config.signatures {
            let value = self
                .read_mlx_word(address, EEPROM_ACCESS | sig.cell)
                .map_err(|e| e.to_string())?;
            if value != sig.value {
                return Err(format!(
                    "EEPROM cell {:#04x} holds {:#06x}, expected {:#06x}",
                    sig.cell, value, sig.value
                ));
            }
        }

        let ambient = self
            .read_mlx_word(address, RAM_TA)
            .and_then(raw_to_temperature)
            .map_err(|e| format!("ambient read failed: {}", e))?;
        let object = self
            .read_mlx_word(address, RAM_TOBJ1)
            .and_then(raw_to_temperature)
            .map_err(|e| format!("object read failed: {}", e))?;
        check_limits(ambient, config.ambient_limits_celsius, "ambient")?;
        check_limits(object, config.object_limits_celsius, "object")?;

        Ok((ambient, object))
    }

    pub fn read_aux_ambient(&self) -> Result<ThermodynamicTemperature, LepError> {
        self.read_aux(Channel::Ambient)
    }

    pub fn read_aux_object(&self) -> Result<ThermodynamicTemperature, LepError> {
        self.read_aux(Channel::Object)
    }

    fn read_aux(&self, channel: Channel) -> Result<ThermodynamicTemperature, LepError> {
        if !self.aux_sensor_present() {
            return Err(LepError::SensorUnavailable);
        }
        let address = I2cAddress::try_from(self.sensor_config.address)?;
        let result = self.read_mlx_word(address, channel.register());

        let (outcome, latched) = {
            let mut aux = self.aux();
            match result {
                Ok(raw) => {
                    aux.errors.record_success();
                    let temp = raw_to_temperature(raw);
                    if let Ok(t) = temp {
                        match channel {
                            Channel::Ambient => aux.ambient = Some(t),
                            Channel::Object => aux.object = Some(t),
                        }
                    }
                    (temp, false)
                }
                Err(e) if matches!(e.kind(), ErrorKind::Communication | ErrorKind::Peripheral) => {
                    let latched = aux.record_failure();
                    debug!(?channel, errors = aux.errors.value(), "MLX90614 read failed: {}", e);
                    (Err(e), latched)
                }
                Err(e) => (Err(e), false),
            }
        };

        if latched {
            warn!("MLX90614 kept failing, disabling it until the next detection");
            self.notify(PropertyChange::AuxSensorAvailable);
        }
        if outcome.is_ok() {
            self.notify(channel.change());
        }
        outcome
    }
}
