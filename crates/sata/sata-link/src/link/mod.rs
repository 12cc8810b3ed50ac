//! The link-layer protocol engine.
//!
//! A [`LinkContext`] is advanced one symbol-time at a time by
//! [`LinkContext::tick`]. Each tick runs in a fixed order:
//!
//! 1. expand the received symbol through the CONT decoder and update the
//!    silence counter and primitive history;
//! 2. asynchronous conditions: loss of signal (to NoComm from any state),
//!    COMRESET / COMINIT (to RESET), latched reset / power-off / escape
//!    requests, and sustained silence;
//! 3. ALIGN insertion while idle;
//! 4. the transition function of the current state's sub-machine;
//! 5. the output function of the new state, then CONT compression.
//!
//! The state after a tick therefore names what was transmitted during that
//! tick. Transport requests are latched and take effect on the next tick;
//! their outcomes are polled.

mod idle;
mod power;
mod receive;
mod transmit;

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::config::LinkConfig;
use crate::cont::{ContDecoder, ContEncoder, Rx, Tx};
use crate::crc::FrameCrc;
use crate::error::{ConfigError, LinkError, PowerMode, PowerOutcome, RxError, TxOutcome};
use crate::frame::Frame;
use crate::phy::{PhyInput, PhyOutput, PhyRequest};
use crate::primitive::{Primitive, Symbol};
use crate::scrambler::Scrambler;
use crate::state::{LinkState, Phase, Role};
use crate::stats::LinkStats;

/// Snapshot of the link, as the status register would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    /// Which end this link is.
    pub role: Role,
    /// Current state.
    pub state: LinkState,
    /// Phase of the current state.
    pub phase: Phase,
    /// 6-bit hardware state code.
    pub code: u8,
    /// Interface power mode; `None` while the PHY is powered off.
    pub power: Option<PowerMode>,
    /// Whether frames can be exchanged.
    pub link_up: bool,
}

/// A frame queued for, or in, transmission.
#[derive(Debug, Clone)]
struct TxJob {
    words: VecDeque<u32>,
    total: usize,
    sealed: bool,
}

impl TxJob {
    fn has_work(&self) -> bool {
        self.sealed || !self.words.is_empty()
    }
}

/// Who started the power negotiation in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PmRole {
    Requester(PowerMode),
    Responder(PowerMode),
}

/// Receive-side frame assembly.
#[derive(Debug, Clone, Default)]
struct RxAssembly {
    words: Vec<u32>,
    /// Last descrambled dword; becomes payload once the next one arrives,
    /// or is the CRC if EOF follows.
    pending: Option<u32>,
    fault: Option<RxError>,
}

/// One link's protocol engine.
#[derive(Debug, Clone)]
pub struct LinkContext {
    role: Role,
    config: LinkConfig,

    state: LinkState,
    state_ticks: u32,
    align_counter: u32,
    align_resume: Option<(LinkState, u32)>,
    silence: u32,
    last_rx: Option<Primitive>,
    rx_align: bool,
    encoder: ContEncoder,
    decoder: ContDecoder,

    tx: Option<TxJob>,
    tx_scrambler: Scrambler,
    tx_crc: FrameCrc,
    retries: u32,
    tx_outcome: Option<TxOutcome>,

    rx: Option<RxAssembly>,
    rx_scrambler: Scrambler,
    rx_crc: FrameCrc,
    rx_frames: VecDeque<Frame>,
    rx_error: Option<RxError>,
    rx_ready: bool,
    terminate: bool,

    pm_request: Option<PowerMode>,
    pm_role: Option<PmRole>,
    pm_outcome: Option<PowerOutcome>,
    pmacks_sent: u32,
    power: Option<PowerMode>,
    wake_request: bool,
    local_wake: bool,

    escape_request: bool,
    reset_request: bool,
    power_off_request: bool,
    local_reset: bool,

    stats: LinkStats,
}

impl LinkContext {
    /// Creates a link in IDLE.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(role: Role, config: LinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            role,
            encoder: ContEncoder::new(config.cont_enabled),
            config,
            state: LinkState::Idle,
            state_ticks: 0,
            align_counter: 0,
            align_resume: None,
            silence: 0,
            last_rx: None,
            rx_align: false,
            decoder: ContDecoder::new(),
            tx: None,
            tx_scrambler: Scrambler::new(),
            tx_crc: FrameCrc::new(),
            retries: 0,
            tx_outcome: None,
            rx: None,
            rx_scrambler: Scrambler::new(),
            rx_crc: FrameCrc::new(),
            rx_frames: VecDeque::new(),
            rx_error: None,
            rx_ready: true,
            terminate: false,
            pm_request: None,
            pm_role: None,
            pm_outcome: None,
            pmacks_sent: 0,
            power: Some(PowerMode::Active),
            wake_request: false,
            local_wake: false,
            escape_request: false,
            reset_request: false,
            power_off_request: false,
            local_reset: false,
            stats: LinkStats::default(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Which end this link is.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Event counters.
    #[must_use]
    pub const fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Last primitive received, ignoring ALIGN.
    #[must_use]
    pub const fn last_primitive(&self) -> Option<Primitive> {
        self.last_rx
    }

    /// Status register snapshot.
    #[must_use]
    pub const fn status(&self) -> LinkStatus {
        LinkStatus {
            role: self.role,
            state: self.state,
            phase: self.state.phase(),
            code: self.state.code(self.role),
            power: self.power,
            link_up: self.state.is_link_up(),
        }
    }

    /// Whether a frame is queued or in flight.
    #[must_use]
    pub const fn tx_busy(&self) -> bool {
        self.tx.is_some()
    }

    /// Number of received frames waiting for Transport.
    #[must_use]
    pub fn rx_pending(&self) -> usize {
        self.rx_frames.len()
    }

    // ------------------------------------------------------------------
    // Transport requests
    // ------------------------------------------------------------------

    fn check_can_transmit(&self) -> Result<(), LinkError> {
        if self.tx.is_some() {
            return Err(LinkError::Busy);
        }
        if self.state.is_low_power() {
            return Err(LinkError::LowPower);
        }
        if !self.state.is_link_up() {
            return Err(LinkError::LinkDown);
        }
        Ok(())
    }

    fn check_length(&self, len: usize) -> Result<(), LinkError> {
        if len > self.config.max_frame_words as usize {
            return Err(LinkError::FrameTooLong);
        }
        Ok(())
    }

    /// Queues a complete frame for transmission.
    ///
    /// The outcome is reported through [`take_tx_outcome`](Self::take_tx_outcome).
    ///
    /// # Errors
    ///
    /// [`LinkError::Busy`] if a frame is already queued, [`LinkError::LinkDown`]
    /// or [`LinkError::LowPower`] if the link cannot carry frames,
    /// [`LinkError::EmptyFrame`] / [`LinkError::FrameTooLong`] for bad payloads.
    pub fn submit_frame(&mut self, frame: Frame) -> Result<(), LinkError> {
        self.check_can_transmit()?;
        if frame.is_empty() {
            return Err(LinkError::EmptyFrame);
        }
        self.check_length(frame.len())?;
        let words: VecDeque<u32> = frame.into_words().into();
        self.start_job(TxJob {
            total: words.len(),
            words,
            sealed: true,
        });
        Ok(())
    }

    /// Opens a frame whose payload will be supplied with
    /// [`append_words`](Self::append_words). Transmission may begin before
    /// the frame is sealed; if the queue runs dry the link sends HOLD.
    ///
    /// # Errors
    ///
    /// Same conditions as [`submit_frame`](Self::submit_frame).
    pub fn open_frame(&mut self) -> Result<(), LinkError> {
        self.check_can_transmit()?;
        self.start_job(TxJob {
            words: VecDeque::new(),
            total: 0,
            sealed: false,
        });
        Ok(())
    }

    /// Appends payload to the open frame.
    ///
    /// # Errors
    ///
    /// [`LinkError::NoOpenFrame`] if no unsealed frame exists,
    /// [`LinkError::FrameTooLong`] if the frame would exceed the limit.
    pub fn append_words(&mut self, words: &[u32]) -> Result<(), LinkError> {
        let total = match &self.tx {
            Some(job) if !job.sealed => job.total + words.len(),
            _ => return Err(LinkError::NoOpenFrame),
        };
        self.check_length(total)?;
        if let Some(job) = self.tx.as_mut() {
            job.words.extend(words.iter().copied());
            job.total = total;
        }
        Ok(())
    }

    /// Marks the open frame complete.
    ///
    /// # Errors
    ///
    /// [`LinkError::NoOpenFrame`] if no unsealed frame exists,
    /// [`LinkError::EmptyFrame`] if nothing was appended.
    pub fn seal_frame(&mut self) -> Result<(), LinkError> {
        match self.tx.as_mut() {
            Some(job) if !job.sealed => {
                if job.total == 0 {
                    return Err(LinkError::EmptyFrame);
                }
                job.sealed = true;
                Ok(())
            }
            _ => Err(LinkError::NoOpenFrame),
        }
    }

    fn start_job(&mut self, job: TxJob) {
        log::trace!("{}: queued frame ({} words)", self.role, job.total);
        self.retries = 0;
        self.tx_outcome = None;
        self.tx = Some(job);
    }

    /// Takes the outcome of the last transmitted frame, if it has finished.
    pub fn take_tx_outcome(&mut self) -> Option<TxOutcome> {
        self.tx_outcome.take()
    }

    /// Takes the oldest received frame.
    pub fn receive_frame(&mut self) -> Option<Frame> {
        self.rx_frames.pop_front()
    }

    /// Takes the error of the last failed reception.
    pub fn take_receive_error(&mut self) -> Option<RxError> {
        self.rx_error.take()
    }

    /// Tells the link whether Transport can accept frames. While not ready
    /// the receiver holds the peer off.
    pub fn set_receive_ready(&mut self, ready: bool) {
        self.rx_ready = ready;
    }

    /// Asks the receiver to terminate the current frame with DMAT.
    pub fn terminate_receive(&mut self) {
        if self.rx.is_some() {
            self.terminate = true;
        }
    }

    /// Aborts the frame in progress with SYNC.
    ///
    /// Does nothing unless a frame is being sent or received. A frame that is
    /// only queued keeps its place and goes out as usual.
    pub fn escape(&mut self) {
        if self.state.in_frame() {
            self.escape_request = true;
        }
    }

    /// Resets the link: RESET, COMRESET to the PHY, then bring-up.
    pub fn reset(&mut self) {
        self.reset_request = true;
    }

    /// Powers the PHY off. Only a reset leaves that state.
    pub fn power_off(&mut self) {
        self.power_off_request = true;
    }

    /// Requests a power mode change.
    ///
    /// The outcome is reported through
    /// [`take_power_outcome`](Self::take_power_outcome).
    ///
    /// # Errors
    ///
    /// [`LinkError::Busy`] if a request is pending, [`LinkError::LinkDown`] if
    /// the link is down, [`LinkError::LowPower`] when asking for a low-power
    /// mode while already in a different one.
    pub fn power_request(&mut self, mode: PowerMode) -> Result<(), LinkError> {
        if self.pm_request.is_some() || self.pm_role.is_some() || self.wake_request {
            return Err(LinkError::Busy);
        }
        let low_power = matches!(
            self.state,
            LinkState::TpmPartial | LinkState::TpmSlumber | LinkState::NoCommPower
        );
        match mode {
            PowerMode::Active
                if low_power
                    || matches!(self.state, LinkState::WakeUp1 | LinkState::WakeUp2) =>
            {
                self.wake_request = true;
            }
            PowerMode::Active if self.state.is_link_up() => {
                self.pm_outcome = Some(PowerOutcome::Accepted);
            }
            _ if low_power && self.power == Some(mode) => {
                self.pm_outcome = Some(PowerOutcome::Accepted);
            }
            _ if low_power => return Err(LinkError::LowPower),
            PowerMode::Partial | PowerMode::Slumber if self.state.is_link_up() => {
                self.pm_outcome = None;
                self.pm_request = Some(mode);
            }
            _ => return Err(LinkError::LinkDown),
        }
        Ok(())
    }

    /// Takes the outcome of the last power request.
    pub fn take_power_outcome(&mut self) -> Option<PowerOutcome> {
        self.pm_outcome.take()
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advances the link by one symbol-time.
    pub fn tick(&mut self, input: &PhyInput) -> PhyOutput {
        let rx = self.observe(input.rx);
        self.state_ticks = self.state_ticks.saturating_add(1);
        self.align_counter = self.align_counter.saturating_add(1);

        let mut next = self.next_state(input, rx);

        // Frame data must not follow CONT filler: re-send the held
        // primitive once before leaving a HOLD / HOLDA run.
        let close_run = matches!(self.state, LinkState::SendHold | LinkState::RcvrHold)
            && matches!(next, LinkState::SendData | LinkState::SendCrc)
            && self.encoder.run_open();
        if close_run {
            next = self.state;
        }

        let entered = self.enter(next);
        let request = if entered { self.entry_request() } else { None };
        let tx = if close_run {
            self.encoder.close_run()
        } else {
            self.emit().map(|tx| self.encoder.encode(tx))
        };
        if tx.is_none() {
            self.encoder.reset();
        }
        if let Some(sym) = tx {
            if sym == Symbol::primitive(Primitive::Align) {
                self.align_counter = 0;
            }
            log::trace!("{}: [{}] tx {}", self.role, self.state, sym);
        }
        PhyOutput { tx, request }
    }

    /// Expands the received symbol and updates silence and history.
    fn observe(&mut self, symbol: Option<Symbol>) -> Rx {
        let rx = self.decoder.decode(symbol);
        self.rx_align = rx.is(Primitive::Align);
        match rx {
            Rx::Silent => self.silence = self.silence.saturating_add(1),
            Rx::Invalid(word) => {
                self.silence = self.silence.saturating_add(1);
                self.stats.invalid_words += 1;
                log::trace!("{}: invalid control word {word:#010x}", self.role);
            }
            Rx::Primitive(p) => {
                self.silence = 0;
                if p != Primitive::Align && self.last_rx != Some(p) {
                    log::trace!("{}: rx {p}", self.role);
                    self.last_rx = Some(p);
                }
            }
            Rx::Data(_) => self.silence = 0,
        }
        if !self.watches_silence() {
            self.silence = 0;
        }
        if self.rx_align { Rx::Silent } else { rx }
    }

    fn watches_silence(&self) -> bool {
        matches!(self.state, LinkState::Idle | LinkState::SyncEscape)
            || matches!(
                self.state.phase(),
                Phase::Transmit | Phase::Receive | Phase::Align
            )
    }

    fn next_state(&mut self, input: &PhyInput, rx: Rx) -> LinkState {
        if input.signal_lost() {
            if self.state != LinkState::NoComm {
                log::info!("{}: signal lost in {}", self.role, self.state);
                self.link_down();
            }
            return LinkState::NoComm;
        }
        if let Some(oob) = input.oob {
            if let Some(next) = self.on_oob(oob) {
                return next;
            }
        }
        if core::mem::take(&mut self.reset_request) {
            log::info!("{}: reset requested", self.role);
            self.fail_all(TxOutcome::LinkDown, RxError::LinkDown);
            self.local_reset = true;
            return LinkState::Reset;
        }
        if self.power_off_request
            && matches!(self.state.phase(), Phase::IdleSync | Phase::Power)
            && self.state != LinkState::Reset
        {
            self.power_off_request = false;
            log::info!("{}: powering off", self.role);
            self.fail_all(TxOutcome::LinkDown, RxError::LinkDown);
            self.power = None;
            return LinkState::PmOff;
        }
        if self.watches_silence() && self.silence >= self.config.silence_limit {
            log::warn!(
                "{}: no traffic for {} symbols in {}",
                self.role,
                self.silence,
                self.state
            );
            self.link_down();
            return LinkState::NoComm;
        }
        if core::mem::take(&mut self.escape_request) && self.state.in_frame() {
            log::debug!("{}: escaping from {}", self.role, self.state);
            self.fail_all(TxOutcome::Aborted, RxError::Aborted);
            self.stats.aborts += 1;
            return LinkState::SyncEscape;
        }
        if let Some(next) = self.align_step() {
            return next;
        }

        match self.state {
            LinkState::Idle => self.idle_next(input, rx),
            LinkState::SyncEscape
            | LinkState::NoCommErr
            | LinkState::NoComm
            | LinkState::SendAlign
            | LinkState::Reset => self.sync_next(input, rx),
            LinkState::InsertAlign1 | LinkState::InsertAlign2 => self.state,
            state => match state.phase() {
                Phase::Transmit => self.transmit_next(rx),
                Phase::Receive => self.receive_next(rx),
                _ => self.power_next(input, rx),
            },
        }
    }

    /// Switches to `next`. Returns `true` if the state changed.
    fn enter(&mut self, next: LinkState) -> bool {
        let prev = self.state;
        if next == prev {
            return false;
        }
        log::debug!("{}: {} -> {}", self.role, prev, next);
        self.state = next;
        self.state_ticks = 0;
        if let Some((resume, ticks)) = self.align_resume {
            if resume == next && prev == LinkState::InsertAlign2 {
                self.state_ticks = ticks;
                self.align_resume = None;
            }
        }
        match next {
            LinkState::SendSof => {
                self.tx_scrambler.reseed();
                self.tx_crc.reset();
            }
            LinkState::NoComm | LinkState::Reset => {
                self.decoder.reset();
                self.align_resume = None;
            }
            LinkState::Hold | LinkState::RcvHold | LinkState::SendHold | LinkState::RcvrHold => {
                self.stats.holds += 1;
            }
            LinkState::InsertAlign1 => self.stats.aligns_inserted += 1,
            LinkState::TpmPartial | LinkState::TpmSlumber | LinkState::PmOff => {
                self.stats.power_transitions += 1;
            }
            _ => {}
        }
        if next == LinkState::NoComm {
            self.stats.link_losses += 1;
        }
        true
    }

    /// PHY request asserted when the current state is entered.
    fn entry_request(&self) -> Option<PhyRequest> {
        match self.state {
            LinkState::TpmPartial => Some(PhyRequest::Partial),
            LinkState::TpmSlumber => Some(PhyRequest::Slumber),
            LinkState::PmOff => Some(PhyRequest::PowerOff),
            LinkState::WakeUp1 if self.local_wake => Some(PhyRequest::Wake),
            LinkState::Reset if self.local_reset => Some(PhyRequest::ComReset),
            _ => None,
        }
    }

    /// Word transmitted in the current state.
    fn emit(&mut self) -> Option<Tx> {
        let prim = |p| Some(Tx::Primitive(p));
        match self.state {
            LinkState::Idle
            | LinkState::SyncEscape
            | LinkState::RcvWaitFifo
            | LinkState::NoPmnak => prim(Primitive::Sync),
            LinkState::SendAlign
            | LinkState::WakeUp2
            | LinkState::InsertAlign1
            | LinkState::InsertAlign2 => prim(Primitive::Align),
            LinkState::NoComm
            | LinkState::NoCommErr
            | LinkState::Reset
            | LinkState::TpmPartial
            | LinkState::TpmSlumber
            | LinkState::PmOff
            | LinkState::NoCommPower
            | LinkState::WakeUp1 => None,
            LinkState::SendChkRdy
            | LinkState::SendSof
            | LinkState::SendData
            | LinkState::RcvrHold
            | LinkState::SendHold
            | LinkState::SendCrc
            | LinkState::SendEof
            | LinkState::Wait => Some(self.transmit_emit()),
            LinkState::RcvChkRdy
            | LinkState::RcvData
            | LinkState::Hold
            | LinkState::RcvHold
            | LinkState::RcvEof
            | LinkState::GoodCrc
            | LinkState::GoodEnd
            | LinkState::BadEnd => Some(self.receive_emit()),
            LinkState::PmDeny | LinkState::ChkPhyRdy => Some(self.power_emit()),
        }
    }

    // ------------------------------------------------------------------
    // Shared helpers for the sub-machines
    // ------------------------------------------------------------------

    fn timed_out(&self, limit: u32) -> bool {
        self.state_ticks >= limit
    }

    fn rx_backpressured(&self) -> bool {
        !self.rx_ready || self.rx_frames.len() >= self.config.rx_queue_depth as usize
    }

    /// Ends the transmit job with `outcome`.
    fn finish_tx(&mut self, outcome: TxOutcome) {
        if self.tx.take().is_none() {
            return;
        }
        match outcome {
            TxOutcome::Ok => {
                self.stats.frames_sent += 1;
                log::trace!("{}: frame acknowledged", self.role);
            }
            TxOutcome::CrcError => {
                self.stats.tx_errors += 1;
                log::warn!("{}: frame rejected by peer", self.role);
            }
            TxOutcome::Aborted => log::debug!("{}: frame aborted", self.role),
            TxOutcome::LinkDown => log::warn!("{}: frame lost, link down", self.role),
        }
        self.retries = 0;
        self.tx_outcome = Some(outcome);
    }

    /// Ends an in-progress reception with `error`.
    fn fail_rx(&mut self, error: RxError) {
        if self.rx.take().is_none() {
            return;
        }
        self.terminate = false;
        match error {
            RxError::Crc => {
                self.stats.rx_crc_errors += 1;
                log::warn!("{}: received frame failed CRC", self.role);
            }
            RxError::Aborted => log::debug!("{}: reception aborted", self.role),
            other => log::warn!("{}: reception failed: {other}", self.role),
        }
        self.rx_error = Some(error);
    }

    fn fail_all(&mut self, tx: TxOutcome, rx: RxError) {
        self.finish_tx(tx);
        self.fail_rx(rx);
        self.fail_power();
    }

    fn link_down(&mut self) {
        self.fail_all(TxOutcome::LinkDown, RxError::LinkDown);
        self.wake_request = false;
        self.escape_request = false;
    }
}
