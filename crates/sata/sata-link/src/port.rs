//! A link bound to a PHY, with blocking Transport operations.
//!
//! [`SataPort`] clocks its [`LinkContext`] against a [`Phy`] and polls for
//! completion, giving up after a fixed number of symbol-times.

use crate::error::{LinkError, PowerMode, PowerOutcome, RxError, TxOutcome};
use crate::frame::Frame;
use crate::link::LinkContext;
use crate::phy::{Phy, PhyOutput};
use crate::state::LinkState;

/// Default number of symbol-times a blocking call may take.
pub const DEFAULT_BUDGET: u64 = 100_000;

/// A link and the PHY it runs on.
#[derive(Debug)]
pub struct SataPort<P: Phy> {
    link: LinkContext,
    phy: P,
    budget: u64,
}

impl<P: Phy> SataPort<P> {
    /// Binds `link` to `phy` with the default budget.
    pub const fn new(link: LinkContext, phy: P) -> Self {
        Self::with_budget(link, phy, DEFAULT_BUDGET)
    }

    /// Binds `link` to `phy`; blocking calls give up after `budget`
    /// symbol-times.
    pub const fn with_budget(link: LinkContext, phy: P, budget: u64) -> Self {
        Self { link, phy, budget }
    }

    /// The link.
    pub const fn link(&self) -> &LinkContext {
        &self.link
    }

    /// The link, mutably. Use this for the non-blocking requests.
    pub fn link_mut(&mut self) -> &mut LinkContext {
        &mut self.link
    }

    /// The PHY.
    pub const fn phy(&self) -> &P {
        &self.phy
    }

    /// The PHY, mutably.
    pub fn phy_mut(&mut self) -> &mut P {
        &mut self.phy
    }

    /// Runs one symbol-time: sample, tick, drive.
    pub fn step(&mut self) -> PhyOutput {
        let input = self.phy.sample();
        let output = self.link.tick(&input);
        self.phy.drive(output);
        output
    }

    /// Runs `n` symbol-times.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Sends `frame` and waits for the receiver's verdict.
    ///
    /// # Errors
    ///
    /// Whatever [`LinkContext::submit_frame`] rejects the frame with, or
    /// [`LinkError::Timeout`] if no outcome arrives within the budget.
    pub fn submit_frame(&mut self, frame: Frame) -> Result<TxOutcome, LinkError> {
        self.link.submit_frame(frame)?;
        for _ in 0..self.budget {
            self.step();
            if let Some(outcome) = self.link.take_tx_outcome() {
                return Ok(outcome);
            }
        }
        Err(LinkError::Timeout)
    }

    /// Waits for the next good frame. Failed receptions are skipped.
    ///
    /// # Errors
    ///
    /// [`LinkError::LinkDown`] if the link goes down while waiting,
    /// [`LinkError::Timeout`] if nothing arrives within the budget.
    pub fn receive_frame(&mut self) -> Result<Frame, LinkError> {
        for _ in 0..self.budget {
            if let Some(frame) = self.link.receive_frame() {
                return Ok(frame);
            }
            match self.link.take_receive_error() {
                Some(RxError::LinkDown) => return Err(LinkError::LinkDown),
                Some(error) => log::debug!("{}: dropped frame: {error}", self.link.role()),
                None => {}
            }
            if self.link.state() == LinkState::NoComm {
                return Err(LinkError::LinkDown);
            }
            self.step();
        }
        self.link.receive_frame().ok_or(LinkError::Timeout)
    }

    /// Requests a power mode and waits for the negotiation to finish.
    ///
    /// # Errors
    ///
    /// Whatever [`LinkContext::power_request`] rejects the request with, or
    /// [`LinkError::Timeout`] if no outcome arrives within the budget.
    pub fn power_request(&mut self, mode: PowerMode) -> Result<PowerOutcome, LinkError> {
        self.link.power_request(mode)?;
        if let Some(outcome) = self.link.take_power_outcome() {
            return Ok(outcome);
        }
        for _ in 0..self.budget {
            self.step();
            if let Some(outcome) = self.link.take_power_outcome() {
                return Ok(outcome);
            }
        }
        Err(LinkError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::phy::PhyInput;
    use crate::state::Role;

    /// A PHY that never answers.
    #[derive(Debug, Default)]
    struct DeadPhy {
        driven: u64,
    }

    impl Phy for DeadPhy {
        fn sample(&mut self) -> PhyInput {
            PhyInput::ready(None)
        }

        fn drive(&mut self, _output: PhyOutput) {
            self.driven += 1;
        }
    }

    fn port(budget: u64) -> SataPort<DeadPhy> {
        let link = LinkContext::new(Role::Host, LinkConfig::default()).expect("valid");
        SataPort::with_budget(link, DeadPhy::default(), budget)
    }

    #[test]
    fn step_drives_once() {
        let mut port = port(10);
        port.run(5);
        assert_eq!(port.phy().driven, 5);
    }

    #[test]
    fn receive_times_out() {
        let mut port = port(50);
        assert_eq!(port.receive_frame(), Err(LinkError::Timeout));
    }

    #[test]
    fn silent_peer_exhausts_retries() {
        let mut port = port(100_000);
        let outcome = port.submit_frame(Frame::from_slice(&[1, 2, 3]));
        assert_eq!(outcome, Ok(TxOutcome::LinkDown));
        assert_eq!(port.link().state(), LinkState::NoCommErr);
        assert_eq!(port.receive_frame(), Err(LinkError::LinkDown));
    }

    #[test]
    fn rejected_submit_is_not_retried() {
        let mut port = port(10);
        assert_eq!(
            port.submit_frame(Frame::default()),
            Err(LinkError::EmptyFrame)
        );
    }
}
