//! Idle, synchronization and bring-up states, plus ALIGN insertion.

use super::LinkContext;
use crate::cont::Rx;
use crate::error::{PowerMode, RxError, TxOutcome};
use crate::phy::{OobEvent, PhyInput};
use crate::primitive::Primitive;
use crate::state::{LinkState, Role};

impl LinkContext {
    /// IDLE: pick the next exchange, receive first.
    pub(super) fn idle_next(&mut self, input: &PhyInput, rx: Rx) -> LinkState {
        let tx_work = self.tx.as_ref().is_some_and(super::TxJob::has_work);

        if rx.is(Primitive::XRdy) && (self.role == Role::Host || !tx_work) {
            return self.receive_handshake();
        }
        if let Rx::Primitive(p @ (Primitive::PmReqP | Primitive::PmReqS)) = rx {
            let mode = if p == Primitive::PmReqP {
                PowerMode::Partial
            } else {
                PowerMode::Slumber
            };
            return self.peer_power_request(input, mode);
        }
        if !input.is_ready() {
            return LinkState::Idle;
        }
        if tx_work {
            return LinkState::SendChkRdy;
        }
        if let Some(mode) = self.pm_request.take() {
            return self.begin_power_request(mode);
        }
        LinkState::Idle
    }

    /// SyncEscape, NoCommErr, NoComm, SendAlign and RESET.
    pub(super) fn sync_next(&mut self, input: &PhyInput, rx: Rx) -> LinkState {
        match self.state {
            LinkState::SyncEscape => {
                if rx.is(Primitive::Sync) || self.timed_out(self.config.handshake_timeout) {
                    LinkState::Idle
                } else {
                    LinkState::SyncEscape
                }
            }
            LinkState::NoCommErr => LinkState::NoComm,
            LinkState::Reset => {
                if input.is_ready() {
                    self.local_reset = false;
                    LinkState::SendAlign
                } else if self.timed_out(self.config.reset_timeout) {
                    log::warn!("{}: PHY not ready after reset", self.role);
                    self.local_reset = false;
                    LinkState::NoComm
                } else {
                    LinkState::Reset
                }
            }
            LinkState::SendAlign => {
                // Any primitive shows the peer is up, ALIGN or otherwise.
                if self.rx_align || matches!(rx, Rx::Primitive(_)) {
                    log::info!("{}: link up", self.role);
                    self.power = Some(PowerMode::Active);
                    LinkState::Idle
                } else if self.timed_out(self.config.reset_timeout) {
                    log::warn!("{}: no ALIGN from peer during bring-up", self.role);
                    LinkState::NoCommErr
                } else {
                    LinkState::SendAlign
                }
            }
            // NoComm only leaves through reset() or an OOB reset.
            state => state,
        }
    }

    /// Handles an OOB event. COMRESET and COMINIT restart the link from any
    /// state; COMWAKE is left to the power sub-machine.
    pub(super) fn on_oob(&mut self, oob: OobEvent) -> Option<LinkState> {
        match oob {
            OobEvent::ComReset | OobEvent::ComInit => {
                log::info!("{}: {:?} received in {}", self.role, oob, self.state);
                self.fail_all(TxOutcome::LinkDown, RxError::LinkDown);
                self.wake_request = false;
                self.power_off_request = false;
                self.local_reset = false;
                Some(LinkState::Reset)
            }
            OobEvent::ComWake => None,
        }
    }

    /// Periodic ALIGN pair, only while idle.
    pub(super) fn align_step(&mut self) -> Option<LinkState> {
        match self.state {
            LinkState::InsertAlign1 => Some(LinkState::InsertAlign2),
            LinkState::InsertAlign2 => {
                let resume = self.align_resume.map_or(LinkState::Idle, |(s, _)| s);
                Some(resume)
            }
            LinkState::Idle | LinkState::SyncEscape
                if self.align_counter >= self.config.align_interval =>
            {
                self.align_resume = Some((self.state, self.state_ticks));
                Some(LinkState::InsertAlign1)
            }
            _ => None,
        }
    }
}
