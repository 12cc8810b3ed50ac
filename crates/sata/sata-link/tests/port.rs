//! Blocking Transport calls on a port whose PHY loops back to a peer link.

use sata_link::sim::{Direction, Fault, LoopbackPhy};
use sata_link::{
    Frame, LinkConfig, LinkContext, LinkError, LinkState, PowerMode, PowerOutcome, Role,
    SataPort, TxOutcome,
};

fn host_port() -> SataPort<LoopbackPhy> {
    let device = LinkContext::new(Role::Device, LinkConfig::default()).expect("valid");
    let host = LinkContext::new(Role::Host, LinkConfig::default()).expect("valid");
    SataPort::new(host, LoopbackPhy::new(device, 3))
}

#[test]
fn submit_and_receive() {
    let mut port = host_port();
    let words: Vec<u32> = (0..32).map(|i| i * 0x0101_0101).collect();
    assert_eq!(
        port.submit_frame(Frame::from_slice(&words)),
        Ok(TxOutcome::Ok)
    );
    assert_eq!(
        port.phy_mut().peer_mut().receive_frame(),
        Some(Frame::from_slice(&words))
    );

    port.phy_mut()
        .peer_mut()
        .submit_frame(Frame::from_slice(&[0x34, 0x5000_0000]))
        .expect("peer submit");
    assert_eq!(
        port.receive_frame(),
        Ok(Frame::from_slice(&[0x34, 0x5000_0000]))
    );
}

#[test]
fn receive_skips_bad_frames() {
    let mut port = host_port();
    port.phy_mut().arm_fault(Direction::DeviceToHost, Fault::CorruptCrc);
    port.phy_mut()
        .peer_mut()
        .submit_frame(Frame::from_slice(&[1, 2, 3]))
        .expect("peer submit");
    assert!(port.phy().peer().tx_busy());

    // Let the corrupted frame go by, then queue a good one.
    for _ in 0..200 {
        port.step();
        if !port.phy().peer().tx_busy() {
            break;
        }
    }
    assert_eq!(
        port.phy_mut().peer_mut().take_tx_outcome(),
        Some(TxOutcome::CrcError)
    );
    port.phy_mut()
        .peer_mut()
        .submit_frame(Frame::from_slice(&[4, 5]))
        .expect("peer submit");
    assert_eq!(port.receive_frame(), Ok(Frame::from_slice(&[4, 5])));
    assert_eq!(port.link().stats().rx_crc_errors, 1);
}

#[test]
fn power_round_trip() {
    let mut port = host_port();
    assert_eq!(
        port.power_request(PowerMode::Slumber),
        Ok(PowerOutcome::Accepted)
    );
    assert_eq!(port.link().state(), LinkState::TpmSlumber);
    assert_eq!(
        port.submit_frame(Frame::from_slice(&[1])),
        Err(LinkError::LowPower)
    );
    assert_eq!(
        port.power_request(PowerMode::Active),
        Ok(PowerOutcome::Accepted)
    );
    assert_eq!(port.link().state(), LinkState::Idle);
    assert_eq!(
        port.submit_frame(Frame::from_slice(&[1])),
        Ok(TxOutcome::Ok)
    );
}

#[test]
fn reset_recovers_a_dead_peer() {
    let mut port = host_port();
    port.phy_mut().peer_mut().power_off();
    port.run(1_500);
    assert_eq!(port.link().state(), LinkState::NoComm);
    assert_eq!(port.receive_frame(), Err(LinkError::LinkDown));

    port.link_mut().reset();
    port.run(50);
    assert_eq!(port.link().state(), LinkState::Idle);
    assert_eq!(port.phy().peer().state(), LinkState::Idle);
    assert_eq!(
        port.submit_frame(Frame::from_slice(&[0xAB])),
        Ok(TxOutcome::Ok)
    );
}
