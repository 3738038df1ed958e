//! Integration tests for the console → ProvisioningService → event sink
//! pipeline.

use mfgprov::app::commands::AppCommand;
use mfgprov::app::events::AppEvent;
use mfgprov::app::service::ProvisioningService;
use mfgprov::config::ProvisioningConfig;
use mfgprov::error::ProvisionError;
use mfgprov::identity::MacAddress;

use super::mock_net::{
    EXAMPLE_BODY, MockNetwork, MockStore, ReadStep, StepClock, VecSink, ok_response,
};

type Service = ProvisioningService<MockNetwork, MockStore, StepClock>;

fn make_service(net: MockNetwork) -> (Service, VecSink) {
    let service = ProvisioningService::new(
        net,
        MockStore::new(),
        StepClock::new(5),
        ProvisioningConfig::default(),
    );
    (service, VecSink::new())
}

#[test]
fn getmac_reports_success_without_the_password() {
    let (mut service, mut sink) = make_service(MockNetwork::serving(&ok_response(EXAMPLE_BODY)));

    service.handle_line("getmac", &mut sink);

    match sink.last() {
        Some(AppEvent::ProvisioningSucceeded {
            mac,
            serial_number,
            password_len,
        }) => {
            assert_eq!(*mac, MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
            assert_eq!(serial_number.as_str(), "SN123");
            assert_eq!(*password_len, "secret".len());
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(service.fetch_count(), 1);
    assert_eq!(service.last_error(), None);
    assert_eq!(service.store().device.password.as_str(), "secret");
}

#[test]
fn getmac_reports_failure() {
    let mut net = MockNetwork::new();
    net.link = false;
    let (mut service, mut sink) = make_service(net);

    service.handle_command(AppCommand::GetSnMac, &mut sink);

    assert_eq!(
        sink.events,
        [AppEvent::ProvisioningFailed(ProvisionError::LinkDown)]
    );
    assert_eq!(service.last_error(), Some(ProvisionError::LinkDown));
}

#[test]
fn provision_maps_outcome_to_bool() {
    let (mut service, _) = make_service(MockNetwork::serving(&ok_response(EXAMPLE_BODY)));
    assert!(service.provision());

    // The script is spent: the next fetch sees an empty response.
    service.net_mut().push_read(ReadStep::Eof);
    assert!(!service.provision());
    assert_eq!(service.last_error(), Some(ProvisionError::MalformedResponse));
    assert_eq!(service.fetch_count(), 2);
}

#[test]
fn failed_fetch_keeps_earlier_provisioning() {
    let (mut service, mut sink) = make_service(MockNetwork::serving(&ok_response(EXAMPLE_BODY)));
    service.handle_line("getmac", &mut sink);

    service
        .net_mut()
        .push_read(ReadStep::Data(ok_response(r#"{"mac":"bad","sn":"X","pw":"Y"}"#)));
    service.handle_line("getmac", &mut sink);

    assert_eq!(
        sink.last(),
        Some(&AppEvent::ProvisioningFailed(ProvisionError::InvalidMac))
    );
    assert_eq!(service.store().device.serial_number.as_str(), "SN123");
    assert_eq!(
        service.store().network.mac,
        Some(MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
    );
}

#[test]
fn identity_reports_stored_values() {
    let (mut service, mut sink) = make_service(MockNetwork::serving(&ok_response(EXAMPLE_BODY)));

    service.handle_line("identity", &mut sink);
    match sink.last() {
        Some(AppEvent::Identity {
            identity,
            serial_number,
            mac,
        }) => {
            assert_eq!(identity.cpu_id_hex().as_str(), "00112233445566778899AABB");
            assert!(serial_number.is_empty());
            assert_eq!(*mac, None);
        }
        other => panic!("unexpected event {other:?}"),
    }

    service.handle_line("getmac", &mut sink);
    service.handle_line("IDENTITY", &mut sink);
    match sink.last() {
        Some(AppEvent::Identity { serial_number, mac, .. }) => {
            assert_eq!(serial_number.as_str(), "SN123");
            assert!(mac.is_some());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn help_and_unknown_commands() {
    let (mut service, mut sink) = make_service(MockNetwork::new());

    service.handle_line("?", &mut sink);
    service.handle_line("reboot now", &mut sink);
    service.handle_line("   ", &mut sink);

    assert_eq!(sink.events.len(), 2);
    assert_eq!(sink.events[0], AppEvent::Help);
    match &sink.events[1] {
        AppEvent::UnknownCommand(line) => assert_eq!(line.as_str(), "reboot now"),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(service.fetch_count(), 0);
}

#[test]
fn unknown_command_echo_is_bounded() {
    let (mut service, mut sink) = make_service(MockNetwork::new());
    let long = "x".repeat(100);

    service.handle_line(&long, &mut sink);

    match sink.last() {
        Some(AppEvent::UnknownCommand(line)) => assert_eq!(line.len(), 32),
        other => panic!("unexpected event {other:?}"),
    }
}
