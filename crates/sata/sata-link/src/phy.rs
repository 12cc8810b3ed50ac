//! Physical layer boundary.
//!
//! The link samples one [`PhyInput`] and produces one [`PhyOutput`] per
//! symbol-time. Everything below this boundary (8b/10b, comma detection,
//! OOB signaling, elastic buffers) belongs to the PHY.

use bitflags::bitflags;

use crate::primitive::Symbol;

bitflags! {
    /// Discrete PHY status lines, sampled every symbol-time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhySignals: u8 {
        /// PHY is locked and ready to carry symbols.
        const READY = 1 << 0;
        /// Loss of signal on the receive pair.
        const SIGNAL_LOST = 1 << 1;
    }
}

/// Out-of-band event detected by the PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OobEvent {
    /// Device-initiated link initialization.
    ComInit,
    /// Host-initiated link reset.
    ComReset,
    /// Wake from a low-power state.
    ComWake,
}

/// Everything the PHY presents to the link for one symbol-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyInput {
    /// Received symbol, if the PHY delivered one.
    pub rx: Option<Symbol>,
    /// Status lines.
    pub signals: PhySignals,
    /// OOB event detected during this symbol-time.
    pub oob: Option<OobEvent>,
}

impl PhyInput {
    /// A ready PHY delivering `rx`.
    #[must_use]
    pub const fn ready(rx: Option<Symbol>) -> Self {
        Self {
            rx,
            signals: PhySignals::READY,
            oob: None,
        }
    }

    /// A PHY that is not ready and delivers nothing.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            rx: None,
            signals: PhySignals::empty(),
            oob: None,
        }
    }

    /// Whether the PHY reports ready.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.signals.contains(PhySignals::READY)
    }

    /// Whether the PHY reports loss of signal.
    #[must_use]
    pub const fn signal_lost(&self) -> bool {
        self.signals.contains(PhySignals::SIGNAL_LOST)
    }
}

/// Request from the link to the PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhyRequest {
    /// Enter the Partial power state.
    Partial,
    /// Enter the Slumber power state.
    Slumber,
    /// Leave a low-power state (send COMWAKE).
    Wake,
    /// Power the PHY down.
    PowerOff,
    /// Send COMRESET (host) or COMINIT (device) and retrain.
    ComReset,
}

/// What the link drives into the PHY for one symbol-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhyOutput {
    /// Symbol to transmit. `None` leaves the transmitter electrically idle.
    pub tx: Option<Symbol>,
    /// Control request, asserted on the symbol-time a state is entered.
    pub request: Option<PhyRequest>,
}

/// A physical layer the link can be clocked against.
pub trait Phy {
    /// Samples the receive side for the current symbol-time.
    fn sample(&mut self) -> PhyInput;

    /// Drives the transmit side for the current symbol-time.
    fn drive(&mut self, output: PhyOutput);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;

    #[test]
    fn ready_input() {
        let input = PhyInput::ready(Some(Symbol::primitive(Primitive::Sync)));
        assert!(input.is_ready());
        assert!(!input.signal_lost());
        assert_eq!(input.oob, None);
    }

    #[test]
    fn idle_input_is_not_ready() {
        let input = PhyInput::idle();
        assert!(!input.is_ready());
        assert_eq!(input.rx, None);
    }

    #[test]
    fn signal_lost_flag() {
        let input = PhyInput {
            rx: None,
            signals: PhySignals::READY | PhySignals::SIGNAL_LOST,
            oob: None,
        };
        assert!(input.is_ready());
        assert!(input.signal_lost());
    }
}
