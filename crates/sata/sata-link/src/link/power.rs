//! Power management sub-machine.
//!
//! Either end may ask for Partial or Slumber from IDLE. The requester sends
//! PMREQ_P / PMREQ_S in ChkPhyRdy until the peer answers PMACK (enter the
//! mode) or PMNAK (NoPmnak, then back to IDLE). The responder acknowledges
//! with a burst of PMACKs, or refuses from PMDeny. Waking runs through
//! WakeUp1 (PHY ready) and WakeUp2 (ALIGN exchange).

use super::{LinkContext, PmRole};
use crate::cont::{Rx, Tx};
use crate::error::{PowerMode, PowerOutcome};
use crate::phy::{OobEvent, PhyInput};
use crate::primitive::Primitive;
use crate::state::{LinkState, Role};

const fn request_primitive(mode: PowerMode) -> Primitive {
    match mode {
        PowerMode::Partial => Primitive::PmReqP,
        _ => Primitive::PmReqS,
    }
}

const fn resident_state(mode: PowerMode) -> LinkState {
    match mode {
        PowerMode::Partial => LinkState::TpmPartial,
        _ => LinkState::TpmSlumber,
    }
}

fn requested_mode(rx: Rx) -> Option<PowerMode> {
    match rx {
        Rx::Primitive(Primitive::PmReqP) => Some(PowerMode::Partial),
        Rx::Primitive(Primitive::PmReqS) => Some(PowerMode::Slumber),
        _ => None,
    }
}

impl LinkContext {
    /// Transport asked for `mode` and the link is idle.
    pub(super) fn begin_power_request(&mut self, mode: PowerMode) -> LinkState {
        log::debug!("{}: requesting {mode}", self.role);
        self.pm_role = Some(PmRole::Requester(mode));
        LinkState::ChkPhyRdy
    }

    /// The peer sent PMREQ_x while we were idle.
    pub(super) fn peer_power_request(&mut self, input: &PhyInput, mode: PowerMode) -> LinkState {
        let busy = self.tx.is_some();
        if self.config.accept_power_requests && !busy && input.is_ready() {
            log::debug!("{}: peer requests {mode}, accepting", self.role);
            if let Some(own) = self.pm_request.take() {
                self.pm_outcome = Some(if own == mode {
                    PowerOutcome::Accepted
                } else {
                    PowerOutcome::Denied
                });
            }
            self.pm_role = Some(PmRole::Responder(mode));
            self.pmacks_sent = 0;
            LinkState::ChkPhyRdy
        } else {
            log::debug!("{}: peer requests {mode}, refusing", self.role);
            LinkState::PmDeny
        }
    }

    pub(super) fn power_next(&mut self, input: &PhyInput, rx: Rx) -> LinkState {
        match self.state {
            LinkState::ChkPhyRdy => self.chk_phy_rdy_next(input, rx),
            LinkState::PmDeny => {
                let stopped = matches!(rx, Rx::Primitive(_)) && requested_mode(rx).is_none();
                if stopped || self.timed_out(self.config.pm_timeout) {
                    LinkState::Idle
                } else {
                    LinkState::PmDeny
                }
            }
            LinkState::NoPmnak => {
                let stopped = matches!(rx, Rx::Primitive(p) if p != Primitive::PmNak);
                if stopped || self.timed_out(self.config.pm_timeout) {
                    LinkState::Idle
                } else {
                    LinkState::NoPmnak
                }
            }
            LinkState::TpmPartial | LinkState::TpmSlumber | LinkState::NoCommPower => {
                self.low_power_next(input)
            }
            LinkState::WakeUp1 => {
                if input.is_ready() {
                    LinkState::WakeUp2
                } else if self.timed_out(self.config.wake_timeout) {
                    log::warn!("{}: PHY did not wake", self.role);
                    self.link_down();
                    LinkState::NoComm
                } else {
                    LinkState::WakeUp1
                }
            }
            LinkState::WakeUp2 => {
                if self.rx_align || matches!(rx, Rx::Primitive(_)) {
                    log::info!("{}: awake", self.role);
                    self.local_wake = false;
                    self.power = Some(PowerMode::Active);
                    self.stats.power_transitions += 1;
                    if core::mem::take(&mut self.wake_request) {
                        self.pm_outcome = Some(PowerOutcome::Accepted);
                    }
                    LinkState::Idle
                } else if self.timed_out(self.config.wake_timeout) {
                    log::warn!("{}: no ALIGN from peer after wake", self.role);
                    self.local_wake = false;
                    self.link_down();
                    LinkState::NoCommErr
                } else {
                    LinkState::WakeUp2
                }
            }
            // PMOff only leaves through reset.
            state => state,
        }
    }

    fn chk_phy_rdy_next(&mut self, input: &PhyInput, rx: Rx) -> LinkState {
        match self.pm_role {
            Some(PmRole::Responder(mode)) => {
                if self.pmacks_sent >= self.config.pmack_burst {
                    self.enter_low_power(mode)
                } else {
                    LinkState::ChkPhyRdy
                }
            }
            Some(PmRole::Requester(mode)) => {
                if rx.is(Primitive::PmAck) {
                    self.pm_outcome = Some(PowerOutcome::Accepted);
                    return self.enter_low_power(mode);
                }
                if rx.is(Primitive::PmNak) {
                    log::debug!("{}: {mode} refused by peer", self.role);
                    self.deny_power();
                    return LinkState::NoPmnak;
                }
                if let Some(peer_mode) = requested_mode(rx) {
                    // Both ends asked at once: the device gives way.
                    if self.role == Role::Device {
                        self.pm_outcome = Some(if peer_mode == mode {
                            PowerOutcome::Accepted
                        } else {
                            PowerOutcome::Denied
                        });
                        self.pm_role = Some(PmRole::Responder(peer_mode));
                        self.pmacks_sent = 0;
                    }
                    return LinkState::ChkPhyRdy;
                }
                if rx.is(Primitive::XRdy) {
                    self.deny_power();
                    return self.receive_handshake();
                }
                if !input.is_ready() || self.timed_out(self.config.pm_timeout) {
                    log::warn!("{}: {mode} request not acknowledged", self.role);
                    self.deny_power();
                    return LinkState::Idle;
                }
                LinkState::ChkPhyRdy
            }
            None => LinkState::Idle,
        }
    }

    fn enter_low_power(&mut self, mode: PowerMode) -> LinkState {
        log::info!("{}: entering {mode}", self.role);
        self.pm_role = None;
        self.power = Some(mode);
        resident_state(mode)
    }

    /// TPMPartial, TPMSlumber and NoCommPower.
    fn low_power_next(&mut self, input: &PhyInput) -> LinkState {
        if input.oob == Some(OobEvent::ComWake) {
            log::debug!("{}: COMWAKE from peer", self.role);
            return LinkState::WakeUp1;
        }
        if self.wake_request {
            self.local_wake = true;
            return LinkState::WakeUp1;
        }
        if !input.is_ready() {
            return LinkState::NoCommPower;
        }
        self.state
    }

    fn deny_power(&mut self) {
        self.pm_role = None;
        self.pm_outcome = Some(PowerOutcome::Denied);
    }

    /// Abandons any power negotiation in progress.
    pub(super) fn fail_power(&mut self) {
        let pending = self.pm_request.take().is_some()
            || matches!(self.pm_role, Some(PmRole::Requester(_)))
            || self.wake_request;
        self.pm_role = None;
        self.wake_request = false;
        self.local_wake = false;
        if pending {
            self.pm_outcome = Some(PowerOutcome::Denied);
        }
    }

    pub(super) fn power_emit(&mut self) -> Tx {
        match (self.state, self.pm_role) {
            (LinkState::ChkPhyRdy, Some(PmRole::Requester(mode))) => {
                Tx::Primitive(request_primitive(mode))
            }
            (LinkState::ChkPhyRdy, Some(PmRole::Responder(_))) => {
                self.pmacks_sent += 1;
                Tx::Primitive(Primitive::PmAck)
            }
            _ => Tx::Primitive(Primitive::PmNak),
        }
    }
}
