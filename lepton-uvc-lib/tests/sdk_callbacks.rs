//! Tests for the SDK callback boundary

mod common;

use common::*;
use lepton_uvc_lib::LepResult;
use lepton_uvc_lib::camera::{DeviceIdentity, LeptonCommands};
use lepton_uvc_lib::sdk::{PortDescriptor, PortType, uvc_get_attribute, uvc_run_command, uvc_set_attribute};

#[test]
fn test_callbacks_dispatch_to_port() {
    let (port, state) = port(true);
    let desc = PortDescriptor::new(0, PortType::Uvc, &port);

    assert_eq!(uvc_set_attribute(&desc, 0x0105, &[1, 0], 2), LepResult::Ok);
    let mut words = [0u16; 2];
    assert_eq!(uvc_get_attribute(&desc, 0x0104, &mut words, 2), LepResult::Ok);
    assert_eq!(words, [1, 0]);
    assert_eq!(uvc_run_command(&desc, 0x0242), LepResult::Ok);

    let state = state.lock().unwrap();
    assert_eq!(state.calls(), 3);
    assert_eq!((state.transfers[0].unit, state.transfers[0].selector), (3, 2));
}

#[test]
fn test_word_length_limits_transfer() {
    let (port, state) = port(true);
    let desc = PortDescriptor::new(1, PortType::Uvc, &port);

    let mut words = [0u16; 8];
    assert_eq!(uvc_get_attribute(&desc, 0x0208, &mut words, 4), LepResult::Ok);
    assert_eq!(uvc_get_attribute(&desc, 0x0208, &mut words, 9), LepResult::DataSizeError);
    assert_eq!(uvc_set_attribute(&desc, 0x0209, &words, 0), LepResult::Ok);

    // the oversized request never reached the device
    let state = state.lock().unwrap();
    assert_eq!(state.calls(), 2);
    assert_eq!(state.transfers[1].data.len(), 0);
}

#[test]
fn test_errors_map_to_result_codes() {
    let (port, state) = port(true);
    let desc = PortDescriptor::new(0, PortType::Uvc, &port);

    let mut words = [0u16; 1];
    assert_eq!(uvc_get_attribute(&desc, 0x0400, &mut words, 1), LepResult::RangeError);
    assert_eq!(uvc_run_command(&desc, 0x0002), LepResult::RangeError);

    state.lock().unwrap().short_transfers = 2;
    assert_eq!(
        uvc_get_attribute(&desc, 0x0104, &mut words, 1),
        LepResult::CommErrorReadingComm
    );
    assert_eq!(uvc_run_command(&desc, 0x0242), LepResult::CommErrorReadingComm);
}

#[test]
fn test_descriptor_user_reference() {
    let (port, state) = port(true);
    {
        let mut state = state.lock().unwrap();
        let mut part = b"500-0763-01".to_vec();
        part.resize(32, 0);
        state.attributes.insert((4, 8), part);
        state.attributes.insert((4, 9), vec![3, 3, 26, 2, 8, 0, 0, 0]);
        state.attributes.insert((6, 3), vec![0x78, 0x56, 0, 0, 0, 0, 0, 0]);
    }
    let desc = PortDescriptor::new(0, PortType::Uvc, &port);
    assert_eq!(desc.port_type, PortType::Uvc);

    let identity = DeviceIdentity::read(desc.port(), "v1.3.0").unwrap();
    assert_eq!(identity.part_number, "500-0763-01");
    assert_eq!(identity.serial_number, 0x5678);
    assert_eq!(identity.software_version.gpp(), "3.3.26");
    assert_eq!(identity.software_version.dsp(), "2.8.0");
    assert!(identity.supports_radiometry());

    desc.port().run_ffc_normalization().unwrap();
    assert_eq!(state.lock().unwrap().transfers.last().unwrap().data, vec![17]);
}
