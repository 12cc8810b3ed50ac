//! Interface power management between a host and a device.

use sata_link::sim::LinkPair;
use sata_link::{
    Frame, LinkConfig, LinkError, LinkState, PowerMode, PowerOutcome, Role, TxOutcome,
};

const LIMIT: u64 = 10_000;

fn pair() -> LinkPair {
    LinkPair::new(LinkConfig::default()).expect("valid config")
}

/// Requests `mode` at `from` and runs until the outcome is known.
fn negotiate(pair: &mut LinkPair, from: Role, mode: PowerMode) -> PowerOutcome {
    pair.link_mut(from).power_request(mode).expect("request accepted");
    let mut outcome = None;
    let done = pair.run_until(LIMIT, |p| {
        outcome = p.link_mut(from).take_power_outcome();
        outcome.is_some()
    });
    assert!(done, "power negotiation did not finish");
    outcome.expect("outcome")
}

fn both_in(pair: &mut LinkPair, state: LinkState) -> bool {
    pair.run_until(LIMIT, |p| p.host.state() == state && p.device.state() == state)
}

#[test]
fn host_requests_slumber_and_wakes() {
    let mut pair = pair();
    assert_eq!(
        negotiate(&mut pair, Role::Host, PowerMode::Slumber),
        PowerOutcome::Accepted
    );
    assert!(both_in(&mut pair, LinkState::TpmSlumber));
    assert_eq!(pair.host.status().power, Some(PowerMode::Slumber));
    assert_eq!(pair.device.status().power, Some(PowerMode::Slumber));
    assert!(!pair.host.status().link_up);

    // Residency is stable.
    pair.run(2_000);
    assert_eq!(pair.host.state(), LinkState::TpmSlumber);
    assert_eq!(pair.device.state(), LinkState::TpmSlumber);
    assert_eq!(
        pair.host.submit_frame(Frame::from_slice(&[1])),
        Err(LinkError::LowPower)
    );

    assert_eq!(
        negotiate(&mut pair, Role::Host, PowerMode::Active),
        PowerOutcome::Accepted
    );
    assert!(both_in(&mut pair, LinkState::Idle));
    assert_eq!(pair.device.status().power, Some(PowerMode::Active));

    pair.host.submit_frame(Frame::from_slice(&[9, 8, 7])).expect("submit");
    assert!(pair.run_until(LIMIT, |p| p.host.take_tx_outcome() == Some(TxOutcome::Ok)));
    assert_eq!(pair.device.receive_frame(), Some(Frame::from_slice(&[9, 8, 7])));
}

#[test]
fn device_requests_partial_and_host_wakes() {
    let mut pair = pair();
    assert_eq!(
        negotiate(&mut pair, Role::Device, PowerMode::Partial),
        PowerOutcome::Accepted
    );
    assert!(both_in(&mut pair, LinkState::TpmPartial));

    // The peer of the wake request follows COMWAKE.
    assert_eq!(
        negotiate(&mut pair, Role::Host, PowerMode::Active),
        PowerOutcome::Accepted
    );
    assert!(both_in(&mut pair, LinkState::Idle));
    assert_eq!(pair.host.stats().power_transitions, 2);
    assert_eq!(pair.device.stats().power_transitions, 2);
}

#[test]
fn refused_request_returns_to_idle() {
    let no = LinkConfig {
        accept_power_requests: false,
        ..LinkConfig::default()
    };
    let mut pair = LinkPair::with_configs(LinkConfig::default(), no, 2).expect("valid");
    assert_eq!(
        negotiate(&mut pair, Role::Host, PowerMode::Slumber),
        PowerOutcome::Denied
    );
    assert!(both_in(&mut pair, LinkState::Idle));
    assert_eq!(pair.host.status().power, Some(PowerMode::Active));
    assert_eq!(pair.host.stats().power_transitions, 0);
}

#[test]
fn simultaneous_requests_device_yields() {
    let mut pair = pair();
    pair.host.power_request(PowerMode::Slumber).expect("host request");
    pair.device.power_request(PowerMode::Slumber).expect("device request");
    assert!(both_in(&mut pair, LinkState::TpmSlumber));
    assert_eq!(pair.host.take_power_outcome(), Some(PowerOutcome::Accepted));
    assert_eq!(pair.device.take_power_outcome(), Some(PowerOutcome::Accepted));
}

#[test]
fn pending_frame_wins_over_power_request() {
    let mut pair = pair();
    pair.host.submit_frame(Frame::from_slice(&[1, 2, 3])).expect("submit");
    pair.host.power_request(PowerMode::Partial).expect("request");
    assert!(pair.run_until(LIMIT, |p| p.host.take_tx_outcome().is_some()));
    assert_eq!(pair.device.receive_frame(), Some(Frame::from_slice(&[1, 2, 3])));
    assert!(both_in(&mut pair, LinkState::TpmPartial));
    assert_eq!(pair.host.take_power_outcome(), Some(PowerOutcome::Accepted));
}

#[test]
fn second_request_while_pending_is_busy() {
    let mut pair = pair();
    pair.host.power_request(PowerMode::Slumber).expect("first");
    assert_eq!(
        pair.host.power_request(PowerMode::Partial),
        Err(LinkError::Busy)
    );
}

#[test]
fn active_while_active_is_immediate() {
    let mut pair = pair();
    pair.host.power_request(PowerMode::Active).expect("request");
    assert_eq!(pair.host.take_power_outcome(), Some(PowerOutcome::Accepted));
}

#[test]
fn signal_loss_during_slumber() {
    let mut pair = pair();
    negotiate(&mut pair, Role::Host, PowerMode::Slumber);
    assert!(both_in(&mut pair, LinkState::TpmSlumber));
    pair.set_signal_lost(Role::Device, true);
    pair.tick();
    assert_eq!(pair.device.state(), LinkState::NoComm);
    assert_eq!(
        pair.device.power_request(PowerMode::Active),
        Err(LinkError::LinkDown)
    );
}
