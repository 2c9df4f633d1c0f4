//! Tests for MLX90614 detection and the error latch

mod common;

use common::*;
use lepton_uvc_lib::mlx::{Mlx90614Config, SensorState};
use lepton_uvc_lib::observer::PropertyChange;
use lepton_uvc_lib::{ErrorKind, LepError, LeptonPort};
use std::sync::{Arc, Mutex};
use uom::si::thermodynamic_temperature::degree_celsius;

/// 200 °C, above the ambient limit
const RAW_200C: u16 = 0x5C6A;

fn observed_port(generic_i2c: bool) -> (LeptonPort<SimBus>, Arc<Mutex<SimState>>, Arc<Recorder>) {
    let (port, state) = port(generic_i2c);
    let recorder = Arc::new(Recorder::default());
    (port.with_observer(recorder.clone()), state, recorder)
}

fn with_mlx(state: &Arc<Mutex<SimState>>) {
    state
        .lock()
        .unwrap()
        .devices
        .insert(MLX_ADDRESS, SimDevice::healthy_mlx());
}

fn unplug(state: &Arc<Mutex<SimState>>) {
    state.lock().unwrap().devices.remove(&MLX_ADDRESS);
}

#[test]
fn test_detects_healthy_sensor() {
    let (port, state, events) = observed_port(true);
    with_mlx(&state);

    assert_eq!(port.aux_sensor_state(), SensorState::Unprobed);
    assert_eq!(port.enumerate_aux_sensor(), SensorState::Present);
    assert!(port.aux_sensor_present());
    assert_eq!(port.aux_error_count(), 0);
    assert_eq!(events.count(PropertyChange::AuxSensorAvailable), 1);

    let (ambient, object) = port.aux_readings();
    assert!((ambient.unwrap().get::<degree_celsius>() - 25.0).abs() < 0.02);
    assert!((object.unwrap().get::<degree_celsius>() - 30.0).abs() < 0.02);

    // probe, alias probe, two EEPROM cells, two RAM registers
    let state = state.lock().unwrap();
    assert_eq!(state.calls(), 12);
    let eeprom: Vec<u8> = state
        .transfers
        .iter()
        .filter(|t| t.selector == 1 && t.data[2] == 1)
        .map(|t| t.data[6])
        .collect();
    assert_eq!(eeprom, vec![0x20, 0x21, 0x06, 0x07]);
}

#[test]
fn test_unsupported_firmware_is_absent_without_traffic() {
    let (port, state, events) = observed_port(false);
    with_mlx(&state);

    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);
    assert_eq!(state.lock().unwrap().calls(), 0);
    assert!(events.events().is_empty());
}

#[test]
fn test_absent_when_nothing_answers() {
    let (port, _state, events) = observed_port(true);
    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);
    assert_eq!(port.aux_readings(), (None, None));
    assert_eq!(events.count(PropertyChange::AuxSensorAvailable), 0);
}

#[test]
fn test_absent_when_alias_address_answers() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);
    state.lock().unwrap().devices.insert(MLX_ADDRESS + 1, SimDevice::Ack);

    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);
}

#[test]
fn test_absent_on_wrong_signature() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);
    state.lock().unwrap().set_register(MLX_ADDRESS, 0x21, 0x62E4);

    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);
}

#[test]
fn test_absent_on_implausible_reading() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);
    state.lock().unwrap().set_register(MLX_ADDRESS, 0x06, RAW_200C);
    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);

    state.lock().unwrap().set_register(MLX_ADDRESS, 0x06, RAW_AMBIENT_25C);
    state.lock().unwrap().set_register(MLX_ADDRESS, 0x07, 0x8006);
    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);
}

#[test]
fn test_transport_failure_during_detection_is_absent() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);
    state.lock().unwrap().short_transfers = 1;

    assert_eq!(port.enumerate_aux_sensor(), SensorState::Absent);
}

#[test]
fn test_read_before_detection_is_unavailable() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);

    let err = port.read_aux_ambient().unwrap_err();
    assert!(matches!(err, LepError::SensorUnavailable));
    assert_eq!(state.lock().unwrap().calls(), 0);
}

#[test]
fn test_steady_state_reads_notify() {
    let (port, state, events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();

    state.lock().unwrap().set_register(MLX_ADDRESS, 0x07, 0x3AF7);
    let object = port.read_aux_object().unwrap();
    assert!((object.get::<degree_celsius>() - 28.75).abs() < 0.01);
    let ambient = port.read_aux_ambient().unwrap();
    assert!((ambient.get::<degree_celsius>() - 25.0).abs() < 0.02);

    assert_eq!(events.count(PropertyChange::AuxObjectTemperature), 1);
    assert_eq!(events.count(PropertyChange::AuxAmbientTemperature), 1);
    assert_eq!(port.aux_error_count(), -2);
}

#[test]
fn test_error_flag_reading_is_out_of_range() {
    let (port, state, events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();
    {
        let mut state = state.lock().unwrap();
        state.set_register(MLX_ADDRESS, 0x06, 0x8006);
        state.set_register(MLX_ADDRESS, 0x07, 0x8006);
    }

    assert_eq!(port.read_aux_ambient().unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(port.read_aux_object().unwrap_err().kind(), ErrorKind::OutOfRange);

    // the bus worked, so the sensor stays present and the last good values stay
    assert!(port.aux_sensor_present());
    assert_eq!(port.aux_error_count(), -2);
    assert!(port.aux_readings().0.is_some());
    assert_eq!(events.count(PropertyChange::AuxAmbientTemperature), 0);
}

#[test]
fn test_five_failures_latch_absent_once() {
    let (port, state, events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();
    unplug(&state);

    for i in 1..=4 {
        let err = port.read_aux_ambient().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Peripheral);
        assert_eq!(port.aux_error_count(), i);
        assert!(port.aux_sensor_present());
    }
    port.read_aux_object().unwrap_err();
    assert_eq!(port.aux_sensor_state(), SensorState::Absent);
    // one for detection, one for the latch
    assert_eq!(events.count(PropertyChange::AuxSensorAvailable), 2);

    // latched: no more traffic, no more events, even once the sensor answers again
    with_mlx(&state);
    let calls = state.lock().unwrap().calls();
    for _ in 0..10 {
        assert!(matches!(port.read_aux_ambient(), Err(LepError::SensorUnavailable)));
        port.poll();
    }
    assert_eq!(state.lock().unwrap().calls(), calls);
    assert_eq!(events.count(PropertyChange::AuxSensorAvailable), 2);
    assert!(!port.aux_sensor_present());
}

#[test]
fn test_good_history_delays_latch() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();
    for _ in 0..8 {
        port.read_aux_ambient().unwrap();
    }
    assert_eq!(port.aux_error_count(), -5);

    unplug(&state);
    for _ in 0..9 {
        port.read_aux_ambient().unwrap_err();
    }
    assert!(port.aux_sensor_present());
    port.read_aux_ambient().unwrap_err();
    assert!(!port.aux_sensor_present());
}

#[test]
fn test_short_transfers_count_as_failures() {
    let (port, state, _events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();

    state.lock().unwrap().short_transfers = 5;
    for _ in 0..5 {
        let err = port.read_aux_object().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Communication);
    }
    assert_eq!(port.aux_sensor_state(), SensorState::Absent);
}

#[test]
fn test_redetection_restores_sensor() {
    let (port, state, events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();
    unplug(&state);
    for _ in 0..5 {
        let _ = port.read_aux_ambient();
    }
    assert!(!port.aux_sensor_present());

    with_mlx(&state);
    assert_eq!(port.enumerate_aux_sensor(), SensorState::Present);
    assert_eq!(port.aux_error_count(), 0);
    assert_eq!(events.count(PropertyChange::AuxSensorAvailable), 3);
    port.read_aux_ambient().unwrap();
}

#[test]
fn test_poll_reads_both_channels() {
    let (port, state, events) = observed_port(true);
    with_mlx(&state);
    port.enumerate_aux_sensor();

    port.poll();
    assert_eq!(
        events.events(),
        vec![
            PropertyChange::AuxSensorAvailable,
            PropertyChange::RadSpotmeterInKelvinX100,
            PropertyChange::AuxAmbientTemperature,
            PropertyChange::AuxObjectTemperature,
        ]
    );
}

#[test]
fn test_custom_sensor_config() {
    let config: Mlx90614Config =
        serde_json::from_str(r#"{ "address": 90, "signatures": [ { "cell": 1, "value": 25315 } ] }"#).unwrap();
    assert_eq!(config.signatures.len(), 1);
    assert_eq!(config.ambient_limits_celsius, (-60.0, 150.0));

    let (port, state, _events) = observed_port(true);
    let port = port.with_sensor_config(config);
    with_mlx(&state);
    // only cell 1 is checked now
    state.lock().unwrap().set_register(MLX_ADDRESS, 0x20, 0x0000);

    assert_eq!(port.enumerate_aux_sensor(), SensorState::Present);
    assert_eq!(state.lock().unwrap().calls(), 10);
}
