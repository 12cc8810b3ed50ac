//! Receive sub-machine.
//!
//! Payload dwords are descrambled on arrival and held back by one: the
//! dword in front of EOF is the CRC, so a word only becomes payload (and
//! enters the CRC) once another word follows it.

use super::{LinkContext, RxAssembly};
use crate::cont::{Rx, Tx};
use crate::error::RxError;
use crate::frame::Frame;
use crate::primitive::Primitive;
use crate::state::LinkState;

impl LinkContext {
    /// Answers a peer X_RDY: R_RDY now, or SYNC until Transport has room.
    pub(super) fn receive_handshake(&self) -> LinkState {
        if self.rx_backpressured() {
            LinkState::RcvWaitFifo
        } else {
            LinkState::RcvChkRdy
        }
    }

    pub(super) fn receive_next(&mut self, rx: Rx) -> LinkState {
        match self.state {
            LinkState::RcvWaitFifo => {
                if let Rx::Primitive(p) = rx {
                    if p != Primitive::XRdy {
                        return LinkState::Idle;
                    }
                }
                if self.rx_backpressured() {
                    LinkState::RcvWaitFifo
                } else {
                    LinkState::RcvChkRdy
                }
            }
            LinkState::RcvChkRdy => {
                if rx.is(Primitive::Sof) {
                    self.begin_receive();
                    LinkState::RcvData
                } else if rx.is(Primitive::Sync) {
                    LinkState::Idle
                } else if self.timed_out(self.config.handshake_timeout) {
                    log::warn!("{}: no SOF after R_RDY", self.role);
                    self.stats.handshake_timeouts += 1;
                    LinkState::Idle
                } else {
                    LinkState::RcvChkRdy
                }
            }
            LinkState::RcvData | LinkState::Hold | LinkState::RcvHold => self.frame_rx_next(rx),
            LinkState::RcvEof => self.check_crc(),
            LinkState::GoodCrc => {
                self.deliver();
                LinkState::GoodEnd
            }
            LinkState::GoodEnd | LinkState::BadEnd => {
                let peer_moved_on = matches!(rx, Rx::Primitive(p) if p != Primitive::Wtrm);
                if peer_moved_on || self.timed_out(self.config.wait_timeout) {
                    LinkState::Idle
                } else {
                    self.state
                }
            }
            state => state,
        }
    }

    fn begin_receive(&mut self) {
        self.rx_scrambler.reseed();
        self.rx_crc.reset();
        self.terminate = false;
        self.rx = Some(RxAssembly::default());
    }

    /// RcvData, Hold and RcvHold.
    fn frame_rx_next(&mut self, rx: Rx) -> LinkState {
        match rx {
            Rx::Data(word) => self.absorb(word),
            Rx::Primitive(Primitive::Eof) => return LinkState::RcvEof,
            Rx::Primitive(Primitive::Sync) => {
                self.stats.aborts += 1;
                self.fail_rx(RxError::Aborted);
                return LinkState::Idle;
            }
            Rx::Primitive(Primitive::Wtrm | Primitive::Sof) => {
                log::warn!("{}: {rx:?} inside a frame", self.role);
                let fault = self.rx.as_ref().and_then(|asm| asm.fault);
                self.fail_rx(fault.unwrap_or(RxError::Protocol));
                return LinkState::BadEnd;
            }
            Rx::Primitive(Primitive::Hold) => return LinkState::RcvHold,
            Rx::Invalid(_) => self.mark_fault(RxError::Protocol),
            Rx::Primitive(_) | Rx::Silent => {
                // Peer still holding: keep acknowledging.
                if self.state == LinkState::RcvHold && rx == Rx::Silent {
                    return LinkState::RcvHold;
                }
            }
        }
        if self.rx_backpressured() {
            LinkState::Hold
        } else {
            LinkState::RcvData
        }
    }

    /// Takes in one scrambled payload dword.
    fn absorb(&mut self, scrambled: u32) {
        let word = self.rx_scrambler.descramble(scrambled);
        let limit = self.config.max_frame_words as usize;
        let Some(asm) = self.rx.as_mut() else {
            return;
        };
        if let Some(prev) = asm.pending.replace(word) {
            self.rx_crc.accumulate(prev);
            if asm.words.len() < limit {
                asm.words.push(prev);
            } else if asm.fault.is_none() {
                log::warn!("{}: frame exceeds {limit} words", self.role);
                asm.fault = Some(RxError::TooLong);
            }
        }
    }

    fn mark_fault(&mut self, error: RxError) {
        if let Some(asm) = self.rx.as_mut() {
            if asm.fault.is_none() {
                asm.fault = Some(error);
            }
        }
    }

    /// RcvEOF: the held-back dword is the CRC.
    fn check_crc(&mut self) -> LinkState {
        let verdict = match self.rx.as_ref() {
            None => Err(RxError::Protocol),
            Some(asm) => match (asm.fault, asm.pending) {
                (Some(fault), _) => Err(fault),
                (None, None) => Err(RxError::Protocol),
                (None, Some(crc)) if crc == self.rx_crc.finalize() => Ok(()),
                (None, Some(_)) => Err(RxError::Crc),
            },
        };
        match verdict {
            Ok(()) => LinkState::GoodCrc,
            Err(error) => {
                self.fail_rx(error);
                LinkState::BadEnd
            }
        }
    }

    /// GoodCRC: hand the frame to Transport.
    fn deliver(&mut self) {
        self.terminate = false;
        if let Some(asm) = self.rx.take() {
            log::trace!("{}: frame received ({} words)", self.role, asm.words.len());
            self.stats.frames_received += 1;
            self.rx_frames.push_back(Frame::from(asm.words));
        }
    }

    pub(super) fn receive_emit(&self) -> Tx {
        let p = match self.state {
            LinkState::RcvChkRdy => Primitive::RRdy,
            LinkState::RcvData if self.terminate => Primitive::Dmat,
            LinkState::RcvData | LinkState::RcvEof | LinkState::GoodCrc => Primitive::RIp,
            LinkState::Hold => Primitive::Hold,
            LinkState::RcvHold => Primitive::HoldA,
            LinkState::GoodEnd => Primitive::ROk,
            LinkState::BadEnd => Primitive::RErr,
            _ => Primitive::Sync,
        };
        Tx::Primitive(p)
    }
}
