//! Back-to-back wire model.
//!
//! Connects two [`LinkContext`]s through a pair of fixed-latency delay
//! lines and a minimal PHY model that honors [`PhyRequest`]s. A PHY in
//! Partial or Slumber stays READY but carries nothing; a powered-off PHY
//! drops READY. A wake request takes [`WAKE_LATENCY`] symbol-times and then
//! signals COMWAKE to the peer. COMRESET (or COMINIT) powers both ends up
//! and is delivered to the peer as an OOB event. One-shot faults can be
//! armed on either direction.

use alloc::collections::VecDeque;

use crate::config::LinkConfig;
use crate::error::ConfigError;
use crate::link::LinkContext;
use crate::phy::{OobEvent, Phy, PhyInput, PhyOutput, PhyRequest, PhySignals};
use crate::primitive::{Primitive, Symbol};
use crate::state::Role;

/// Default one-way latency in symbol-times.
pub const DEFAULT_LATENCY: usize = 2;

/// Symbol-times a PHY takes to come back from a low-power state.
pub const WAKE_LATENCY: u32 = 8;

/// Direction of travel on the cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host transmitter to device receiver.
    HostToDevice,
    /// Device transmitter to host receiver.
    DeviceToHost,
}

impl Direction {
    const fn from_sender(role: Role) -> Self {
        match role {
            Role::Host => Self::HostToDevice,
            Role::Device => Self::DeviceToHost,
        }
    }
}

/// A one-shot fault applied to the next frame on a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Flip a bit of the CRC dword. Needs a latency of at least two.
    CorruptCrc,
    /// XOR `mask` into payload dword `index` (0-based, after SOF).
    FlipBits {
        /// Payload dword to corrupt.
        index: usize,
        /// Bits to flip.
        mask: u32,
    },
}

/// A delay line carrying one symbol per symbol-time.
#[derive(Debug, Clone)]
struct Wire {
    line: VecDeque<Option<Symbol>>,
    latency: usize,
    fault: Option<Fault>,
    in_frame: bool,
    filler: bool,
    data_index: usize,
}

impl Wire {
    /// Creates an empty wire. Latency is clamped to at least one.
    #[must_use]
    fn new(latency: usize) -> Self {
        let latency = latency.max(1);
        let mut line = VecDeque::with_capacity(latency + 1);
        line.resize(latency, None);
        Self {
            line,
            latency,
            fault: None,
            in_frame: false,
            filler: false,
            data_index: 0,
        }
    }

    /// Symbol arriving at the far end this symbol-time.
    fn pop(&mut self) -> Option<Symbol> {
        self.line.pop_front().flatten()
    }

    /// Symbol leaving the near end this symbol-time.
    fn push(&mut self, mut symbol: Option<Symbol>) {
        match symbol.and_then(Symbol::as_primitive) {
            Some(Primitive::Sof) => {
                self.in_frame = true;
                self.data_index = 0;
            }
            Some(Primitive::Eof) => {
                self.in_frame = false;
                if self.fault == Some(Fault::CorruptCrc) {
                    // The CRC dword is the one just ahead of EOF.
                    if let Some(Some(crc)) = self.line.back_mut() {
                        crc.word ^= 1;
                        self.fault = None;
                    }
                }
            }
            _ => {}
        }
        match symbol.and_then(Symbol::as_primitive) {
            Some(Primitive::Cont) => self.filler = true,
            Some(Primitive::Align) | None => {}
            Some(_) => self.filler = false,
        }
        if let Some(sym) = symbol.as_mut() {
            if self.in_frame && !self.filler && !sym.control {
                if let Some(Fault::FlipBits { index, mask }) = self.fault {
                    if index == self.data_index {
                        sym.word ^= mask;
                        self.fault = None;
                    }
                }
                self.data_index += 1;
            }
        }
        self.line.push_back(symbol);
    }

    /// Drops everything in flight.
    fn flush(&mut self) {
        self.line.clear();
        self.line.resize(self.latency, None);
        self.in_frame = false;
        self.filler = false;
    }
}

/// Power state of a modeled PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhyPower {
    On,
    Low,
    Off,
}

/// One end's PHY.
#[derive(Debug, Clone)]
struct PhyModel {
    power: PhyPower,
    signal_lost: bool,
    oob: Option<OobEvent>,
    wake_in: Option<u32>,
}

impl PhyModel {
    const fn new() -> Self {
        Self {
            power: PhyPower::On,
            signal_lost: false,
            oob: None,
            wake_in: None,
        }
    }

    /// Locked, possibly in a low-power state.
    fn ready(&self) -> bool {
        self.power != PhyPower::Off && self.wake_in.is_none()
    }

    /// Carrying symbols.
    fn active(&self) -> bool {
        self.power == PhyPower::On && self.wake_in.is_none()
    }
}

/// The cable and both PHYs.
#[derive(Debug, Clone)]
struct Medium {
    wires: [Wire; 2],
    phys: [PhyModel; 2],
}

const fn side(role: Role) -> usize {
    match role {
        Role::Host => 0,
        Role::Device => 1,
    }
}

const fn other(role: Role) -> Role {
    match role {
        Role::Host => Role::Device,
        Role::Device => Role::Host,
    }
}

impl Medium {
    fn new(latency: usize) -> Self {
        Self {
            wires: [Wire::new(latency), Wire::new(latency)],
            phys: [PhyModel::new(), PhyModel::new()],
        }
    }

    fn wire_mut(&mut self, direction: Direction) -> &mut Wire {
        match direction {
            Direction::HostToDevice => &mut self.wires[0],
            Direction::DeviceToHost => &mut self.wires[1],
        }
    }

    /// What `role`'s PHY presents this symbol-time.
    fn input(&mut self, role: Role) -> PhyInput {
        let arriving = self
            .wire_mut(Direction::from_sender(other(role)))
            .pop();
        let phy = &mut self.phys[side(role)];
        let mut signals = PhySignals::empty();
        if phy.ready() {
            signals |= PhySignals::READY;
        }
        if phy.signal_lost {
            signals |= PhySignals::SIGNAL_LOST;
        }
        let rx = if phy.active() && !phy.signal_lost {
            arriving
        } else {
            None
        };
        PhyInput {
            rx,
            signals,
            oob: phy.oob.take(),
        }
    }

    /// Applies what `role`'s link drove this symbol-time.
    fn output(&mut self, role: Role, out: PhyOutput) {
        let tx = if self.phys[side(role)].active() {
            out.tx
        } else {
            None
        };
        self.wire_mut(Direction::from_sender(role)).push(tx);
        if let Some(request) = out.request {
            self.request(role, request);
        }
    }

    fn request(&mut self, role: Role, request: PhyRequest) {
        let (me, peer) = (side(role), side(other(role)));
        match request {
            PhyRequest::Partial | PhyRequest::Slumber => self.phys[me].power = PhyPower::Low,
            PhyRequest::PowerOff => self.phys[me].power = PhyPower::Off,
            PhyRequest::Wake => {
                if self.phys[me].power != PhyPower::Off {
                    self.phys[me].wake_in = Some(WAKE_LATENCY);
                    self.phys[me].power = PhyPower::On;
                }
            }
            PhyRequest::ComReset => {
                self.wires[0].flush();
                self.wires[1].flush();
                for phy in &mut self.phys {
                    phy.power = PhyPower::On;
                    phy.wake_in = None;
                }
                self.phys[peer].oob = Some(match role {
                    Role::Host => OobEvent::ComReset,
                    Role::Device => OobEvent::ComInit,
                });
            }
        }
    }

    /// Advances wake timers. A PHY that finishes waking wakes its peer
    /// with COMWAKE.
    fn advance(&mut self) {
        for me in 0..2 {
            let Some(left) = self.phys[me].wake_in else {
                continue;
            };
            if left > 1 {
                self.phys[me].wake_in = Some(left - 1);
                continue;
            }
            self.phys[me].wake_in = None;
            let peer = &mut self.phys[1 - me];
            if peer.power == PhyPower::Low {
                peer.power = PhyPower::On;
                peer.oob = Some(OobEvent::ComWake);
            }
        }
    }
}

/// Two links connected back to back.
#[derive(Debug, Clone)]
pub struct LinkPair {
    /// Host end.
    pub host: LinkContext,
    /// Device end.
    pub device: LinkContext,
    medium: Medium,
    ticks: u64,
}

/// Outputs of both ends for one symbol-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticked {
    /// What the host drove.
    pub host: PhyOutput,
    /// What the device drove.
    pub device: PhyOutput,
}

impl LinkPair {
    /// Connects a host and a device with the same configuration and the
    /// default latency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(config: LinkConfig) -> Result<Self, ConfigError> {
        Self::with_configs(config.clone(), config, DEFAULT_LATENCY)
    }

    /// Connects a host and a device with separate configurations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either configuration does not validate.
    pub fn with_configs(
        host: LinkConfig,
        device: LinkConfig,
        latency: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            host: LinkContext::new(Role::Host, host)?,
            device: LinkContext::new(Role::Device, device)?,
            medium: Medium::new(latency),
            ticks: 0,
        })
    }

    /// Mutable access to one end.
    pub fn link_mut(&mut self, role: Role) -> &mut LinkContext {
        match role {
            Role::Host => &mut self.host,
            Role::Device => &mut self.device,
        }
    }

    /// Symbol-times elapsed.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Asserts or clears loss of signal at `role`'s receiver.
    pub fn set_signal_lost(&mut self, role: Role, lost: bool) {
        self.medium.phys[side(role)].signal_lost = lost;
    }

    /// Delivers an OOB event to `role` on the next symbol-time.
    pub fn inject_oob(&mut self, role: Role, event: OobEvent) {
        self.medium.phys[side(role)].oob = Some(event);
    }

    /// Arms a one-shot fault on `direction`.
    pub fn arm_fault(&mut self, direction: Direction, fault: Fault) {
        self.medium.wire_mut(direction).fault = Some(fault);
    }

    /// Advances both ends by one symbol-time.
    pub fn tick(&mut self) -> Ticked {
        let host_in = self.medium.input(Role::Host);
        let device_in = self.medium.input(Role::Device);
        let host = self.host.tick(&host_in);
        let device = self.device.tick(&device_in);
        self.medium.output(Role::Host, host);
        self.medium.output(Role::Device, device);
        self.medium.advance();
        self.ticks += 1;
        Ticked { host, device }
    }

    /// Ticks until `done` holds or `limit` ticks pass. Returns whether
    /// `done` was reached.
    pub fn run_until(&mut self, limit: u64, mut done: impl FnMut(&mut Self) -> bool) -> bool {
        for _ in 0..limit {
            if done(self) {
                return true;
            }
            self.tick();
        }
        done(self)
    }

    /// Ticks `n` times.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }
}

/// A [`Phy`] whose far end is another link, clocked in lock-step with the
/// near end.
#[derive(Debug, Clone)]
pub struct LoopbackPhy {
    peer: LinkContext,
    near: Role,
    medium: Medium,
}

impl LoopbackPhy {
    /// Wraps `peer` as the far end. The near end takes the other role.
    #[must_use]
    pub fn new(peer: LinkContext, latency: usize) -> Self {
        Self {
            near: other(peer.role()),
            peer,
            medium: Medium::new(latency),
        }
    }

    /// The far-end link.
    #[must_use]
    pub const fn peer(&self) -> &LinkContext {
        &self.peer
    }

    /// The far-end link, mutably.
    pub fn peer_mut(&mut self) -> &mut LinkContext {
        &mut self.peer
    }

    /// Arms a one-shot fault on `direction`.
    pub fn arm_fault(&mut self, direction: Direction, fault: Fault) {
        self.medium.wire_mut(direction).fault = Some(fault);
    }
}

impl Phy for LoopbackPhy {
    fn sample(&mut self) -> PhyInput {
        self.medium.input(self.near)
    }

    fn drive(&mut self, output: PhyOutput) {
        let far = self.peer.role();
        let peer_in = self.medium.input(far);
        let peer_out = self.peer.tick(&peer_in);
        self.medium.output(self.near, output);
        self.medium.output(far, peer_out);
        self.medium.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_delays_by_latency() {
        let mut wire = Wire::new(2);
        wire.push(Some(Symbol::data(1)));
        assert_eq!(wire.pop(), None);
        wire.push(Some(Symbol::data(2)));
        assert_eq!(wire.pop(), None);
        wire.push(None);
        assert_eq!(wire.pop(), Some(Symbol::data(1)));
        assert_eq!(wire.pop(), Some(Symbol::data(2)));
    }

    #[test]
    fn corrupt_crc_hits_word_before_eof() {
        let mut wire = Wire::new(3);
        wire.fault = Some(Fault::CorruptCrc);
        for sym in [
            Symbol::primitive(Primitive::Sof),
            Symbol::data(10),
            Symbol::data(20),
            Symbol::primitive(Primitive::Eof),
        ] {
            wire.pop();
            wire.push(Some(sym));
        }
        let rest: Vec<_> = (0..3).map(|_| wire.pop()).collect();
        assert_eq!(
            rest,
            [
                Some(Symbol::data(10)),
                Some(Symbol::data(21)),
                Some(Symbol::primitive(Primitive::Eof)),
            ]
        );
        assert_eq!(wire.fault, None);
    }

    #[test]
    fn flip_bits_targets_payload_index() {
        let mut wire = Wire::new(1);
        wire.fault = Some(Fault::FlipBits { index: 1, mask: 0xF0 });
        wire.push(Some(Symbol::data(0)));
        wire.push(Some(Symbol::primitive(Primitive::Sof)));
        wire.push(Some(Symbol::data(0)));
        wire.push(Some(Symbol::data(0)));
        wire.pop();
        let got: Vec<_> = (0..4).map(|_| wire.pop()).collect();
        assert_eq!(got[2], Some(Symbol::data(0)));
        assert_eq!(got[3], Some(Symbol::data(0xF0)));
    }

    #[test]
    fn idle_pair_stays_idle() {
        let mut pair = LinkPair::new(LinkConfig::default()).expect("valid");
        pair.run(1000);
        assert_eq!(pair.host.state(), crate::LinkState::Idle);
        assert_eq!(pair.device.state(), crate::LinkState::Idle);
        assert!(pair.host.stats().aligns_inserted >= 3);
        assert_eq!(pair.host.stats().link_losses, 0);
    }
}
