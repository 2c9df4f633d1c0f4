//! Simulated PureThermal board shared by the integration tests

// Not every test file uses every helper
#![allow(dead_code)]

use lepton_uvc_lib::LepResult;
use lepton_uvc_lib::LeptonPort;
use lepton_uvc_lib::command::UnitId;
use lepton_uvc_lib::error::LepError;
use lepton_uvc_lib::observer::{PropertyChange, PropertyObserver};
use lepton_uvc_lib::transport::{ControlTransport, ExtensionUnit};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MLX_ADDRESS: u8 = 0x5A;

/// 25.00 °C and 30.00 °C as MLX90614 RAM words
pub const RAW_AMBIENT_25C: u16 = 0x3A3C;
pub const RAW_OBJECT_30C: u16 = 0x3B36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub direction: Direction,
    pub unit: u8,
    pub selector: u8,
    pub data: Vec<u8>,
}

/// Something answering on the simulated I2C bus
#[derive(Debug, Clone)]
pub enum SimDevice {
    /// Acknowledges everything, returns zeros
    Ack,
    /// Answers every transaction with a fixed status
    Status(LepResult),
    /// MLX90614-like word registers
    Mlx(HashMap<u8, u16>),
}

impl SimDevice {
    pub fn healthy_mlx() -> Self {
        SimDevice::Mlx(HashMap::from([
            (0x20, 0x9993),
            (0x21, 0x62E3),
            (0x06, RAW_AMBIENT_25C),
            (0x07, RAW_OBJECT_30C),
        ]))
    }
}

#[derive(Debug, Default)]
pub struct SimState {
    pub transfers: Vec<Transfer>,
    pub attributes: HashMap<(u8, u8), Vec<u8>>,
    pub devices: HashMap<u8, SimDevice>,
    /// Upcoming transfers to cut short, counted down per transfer
    pub short_transfers: usize,
    pending_request: Option<Vec<u8>>,
}

impl SimState {
    pub fn calls(&self) -> usize {
        self.transfers.len()
    }

    pub fn set_register(&mut self, address: u8, register: u8, value: u16) {
        if let Some(SimDevice::Mlx(regs)) = self.devices.get_mut(&address) {
            regs.insert(register, value);
        }
    }

    fn run_i2c(&mut self, response: &mut [u8]) {
        response.fill(0);
        let Some(req) = self.pending_request.take() else {
            response[..2].copy_from_slice(&i16::from(LepResult::Error).to_le_bytes());
            return;
        };
        let address = u16::from_le_bytes([req[0], req[1]]) as u8;
        let write_len = i16::from_le_bytes([req[2], req[3]]);
        let read_len = i16::from_le_bytes([req[4], req[5]]);
        let payload = &req[6..];

        let (status, data): (LepResult, Vec<u8>) = match self.devices.get(&address) {
            None => (LepResult::I2cNackReceived, vec![]),
            Some(SimDevice::Ack) => (LepResult::Ok, vec![]),
            Some(SimDevice::Status(s)) => (*s, vec![]),
            Some(SimDevice::Mlx(regs)) => {
                if write_len == 1 && read_len == 3 {
                    match regs.get(&payload[0]) {
                        Some(value) => {
                            let [lo, hi] = value.to_le_bytes();
                            (LepResult::Ok, vec![lo, hi, 0xA5])
                        }
                        None => (LepResult::I2cNackReceived, vec![]),
                    }
                } else {
                    (LepResult::Ok, vec![])
                }
            }
        };
        response[..2].copy_from_slice(&i16::from(status).to_le_bytes());
        response[2..2 + data.len()].copy_from_slice(&data);
    }
}

/// Transport over shared simulator state. Also detects overlapping transfers.
pub struct SimBus {
    pub state: Arc<Mutex<SimState>>,
    in_flight: Arc<AtomicBool>,
    pub overlaps: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    fn enter(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }

    fn leave(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

impl ControlTransport for SimBus {
    fn get_cur(&mut self, unit: u8, selector: u8, buf: &mut [u8]) -> Result<usize, LepError> {
        self.enter();
        let mut state = self.state.lock().unwrap();
        state.transfers.push(Transfer {
            direction: Direction::Get,
            unit,
            selector,
            data: vec![],
        });

        if unit == u8::from(UnitId::Custom) && selector == 7 {
            state.run_i2c(buf);
        } else if let Some(stored) = state.attributes.get(&(unit, selector)) {
            let n = stored.len().min(buf.len());
            buf[..n].copy_from_slice(&stored[..n]);
        } else {
            buf.fill(0);
        }

        let n = if state.short_transfers > 0 {
            state.short_transfers -= 1;
            buf.len() / 2
        } else {
            buf.len()
        };
        drop(state);
        self.leave();
        Ok(n)
    }

    fn set_cur(&mut self, unit: u8, selector: u8, data: &[u8]) -> Result<usize, LepError> {
        self.enter();
        let mut state = self.state.lock().unwrap();
        state.transfers.push(Transfer {
            direction: Direction::Set,
            unit,
            selector,
            data: data.to_vec(),
        });

        if unit == u8::from(UnitId::Custom) && selector == 1 {
            state.pending_request = Some(data.to_vec());
        } else {
            state.attributes.insert((unit, selector), data.to_vec());
        }

        let n = if state.short_transfers > 0 {
            state.short_transfers -= 1;
            data.len().saturating_sub(1)
        } else {
            data.len()
        };
        drop(state);
        self.leave();
        Ok(n)
    }
}

/// Extension units as advertised by PureThermal firmware, with or without the
/// I2C write-read control on the custom unit.
pub fn units(generic_i2c: bool) -> Vec<ExtensionUnit> {
    let mut units: Vec<ExtensionUnit> = [3u8, 4, 5, 6, 7]
        .iter()
        .map(|&id| ExtensionUnit::new(id, 0xFFFF_FFFF))
        .collect();
    units.push(ExtensionUnit::new(0xFE, if generic_i2c { 0x7F } else { 0x3F }));
    units
}

/// Route library logs through the test harness; RUST_LOG picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn port(generic_i2c: bool) -> (LeptonPort<SimBus>, Arc<Mutex<SimState>>) {
    init_tracing();
    let bus = SimBus::new();
    let state = bus.state.clone();
    (LeptonPort::new(bus, units(generic_i2c)), state)
}

/// Observer that records every event
#[derive(Default)]
pub struct Recorder(Mutex<Vec<PropertyChange>>);

impl Recorder {
    pub fn count(&self, change: PropertyChange) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == change).count()
    }

    pub fn events(&self) -> Vec<PropertyChange> {
        self.0.lock().unwrap().clone()
    }
}

impl PropertyObserver for Recorder {
    fn property_changed(&self, change: PropertyChange) {
        self.0.lock().unwrap().push(change);
    }
}
