//! Transmit sub-machine: X_RDY handshake, SOF, payload, CRC, EOF and the
//! wait for the receiver's verdict.

use super::LinkContext;
use crate::cont::{Rx, Tx};
use crate::error::TxOutcome;
use crate::primitive::Primitive;
use crate::state::{LinkState, Role};

impl LinkContext {
    pub(super) fn transmit_next(&mut self, rx: Rx) -> LinkState {
        match self.state {
            LinkState::SendChkRdy => self.send_chk_rdy_next(rx),
            LinkState::SendSof
            | LinkState::SendData
            | LinkState::SendHold
            | LinkState::RcvrHold => self.frame_tx_next(rx),
            LinkState::SendCrc => {
                if rx.is(Primitive::Sync) {
                    self.abort_tx()
                } else {
                    LinkState::SendEof
                }
            }
            LinkState::SendEof => {
                if rx.is(Primitive::Sync) {
                    self.abort_tx()
                } else {
                    LinkState::Wait
                }
            }
            LinkState::Wait => self.wait_next(rx),
            state => state,
        }
    }

    fn send_chk_rdy_next(&mut self, rx: Rx) -> LinkState {
        if self.tx.is_none() {
            return LinkState::Idle;
        }
        if rx.is(Primitive::RRdy) {
            self.retries = 0;
            return LinkState::SendSof;
        }
        // Both ends want to send: the host yields and receives first, its
        // own frame stays queued.
        if rx.is(Primitive::XRdy) && self.role == Role::Host {
            log::debug!("{}: X_RDY collision, receiving first", self.role);
            return self.receive_handshake();
        }
        if self.timed_out(self.config.handshake_timeout) {
            self.stats.handshake_timeouts += 1;
            self.retries += 1;
            if self.retries > self.config.max_retries {
                log::warn!(
                    "{}: no R_RDY after {} attempts, giving up",
                    self.role,
                    self.retries
                );
                self.stats.retries_exhausted += 1;
                self.link_down();
                return LinkState::NoCommErr;
            }
            log::warn!("{}: handshake timeout, retry {}", self.role, self.retries);
            return LinkState::Idle;
        }
        LinkState::SendChkRdy
    }

    /// SendSOF, SendData, SendHold and RcvrHold share their exits.
    fn frame_tx_next(&mut self, rx: Rx) -> LinkState {
        match rx {
            Rx::Primitive(Primitive::Sync) => self.abort_tx(),
            Rx::Primitive(Primitive::Dmat) => {
                if let Some(job) = self.tx.as_mut() {
                    log::debug!(
                        "{}: DMAT, closing frame with {} words unsent",
                        self.role,
                        job.words.len()
                    );
                    job.words.clear();
                    job.sealed = true;
                }
                LinkState::SendCrc
            }
            Rx::Primitive(Primitive::Hold) => LinkState::RcvrHold,
            _ => self.next_payload_state(),
        }
    }

    /// Data if queued, CRC once sealed and drained, HOLD on underrun.
    fn next_payload_state(&self) -> LinkState {
        match &self.tx {
            Some(job) if !job.words.is_empty() => LinkState::SendData,
            Some(job) if job.sealed => LinkState::SendCrc,
            Some(_) => LinkState::SendHold,
            None => LinkState::Idle,
        }
    }

    fn wait_next(&mut self, rx: Rx) -> LinkState {
        if rx.is(Primitive::ROk) {
            self.finish_tx(TxOutcome::Ok);
            LinkState::Idle
        } else if rx.is(Primitive::RErr) {
            self.finish_tx(TxOutcome::CrcError);
            LinkState::Idle
        } else if rx.is(Primitive::Sync) {
            self.abort_tx()
        } else if self.timed_out(self.config.wait_timeout) {
            log::warn!("{}: no R_OK / R_ERR from receiver", self.role);
            self.finish_tx(TxOutcome::CrcError);
            LinkState::Idle
        } else {
            LinkState::Wait
        }
    }

    /// The receiver answered a frame in progress with SYNC.
    fn abort_tx(&mut self) -> LinkState {
        self.stats.aborts += 1;
        self.finish_tx(TxOutcome::Aborted);
        LinkState::Idle
    }

    pub(super) fn transmit_emit(&mut self) -> Tx {
        match self.state {
            LinkState::SendChkRdy => Tx::Primitive(Primitive::XRdy),
            LinkState::SendSof => Tx::Primitive(Primitive::Sof),
            LinkState::SendData => {
                let word = self.tx.as_mut().and_then(|job| job.words.pop_front());
                match word {
                    Some(word) => {
                        self.tx_crc.accumulate(word);
                        Tx::Data(self.tx_scrambler.scramble(word))
                    }
                    None => Tx::Primitive(Primitive::Hold),
                }
            }
            LinkState::RcvrHold => Tx::Primitive(Primitive::HoldA),
            LinkState::SendCrc => {
                let crc = self.tx_crc.finalize();
                Tx::Data(self.tx_scrambler.scramble(crc))
            }
            LinkState::SendEof => Tx::Primitive(Primitive::Eof),
            LinkState::Wait => Tx::Primitive(Primitive::Wtrm),
            _ => Tx::Primitive(Primitive::Hold),
        }
    }
}
