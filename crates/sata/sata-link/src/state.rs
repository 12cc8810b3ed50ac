//! Link states, phases and roles.
//!
//! The state set is closed: every hardware state code the link controller
//! exposes in its status register has exactly one variant here. The host
//! and device flavors of the transmit handshake share a single variant and
//! are told apart by [`Role`].

use core::fmt;

/// Which end of the cable this link controller sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Host controller. Backs off on an X_RDY collision.
    Host,
    /// Device. Wins X_RDY collisions, yields on PMREQ collisions.
    Device,
}

impl Role {
    /// Short tag used as a log prefix.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "dev",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Coarse grouping of link states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Idle, synchronization and link bring-up.
    IdleSync,
    /// Frame transmission.
    Transmit,
    /// Frame reception.
    Receive,
    /// Power management negotiation and low-power residency.
    Power,
    /// Periodic ALIGN insertion.
    Align,
}

/// A link-layer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    // ---- idle / sync ----
    /// Link up, nothing to do. Transmits SYNC.
    Idle,
    /// Aborting a frame: transmit SYNC until SYNC comes back.
    SyncEscape,
    /// Unrecoverable error; drops to [`NoComm`](Self::NoComm) next tick.
    NoCommErr,
    /// No communication with the peer.
    NoComm,
    /// Link bring-up: transmit ALIGN before going idle.
    SendAlign,
    /// Reset in progress.
    Reset,

    // ---- transmit ----
    /// Transmit handshake: X_RDY until the peer answers R_RDY.
    SendChkRdy,
    /// Start of frame.
    SendSof,
    /// Payload dword.
    SendData,
    /// Peer asked us to pause: transmit HOLDA.
    RcvrHold,
    /// Transport underrun: transmit HOLD.
    SendHold,
    /// Frame CRC dword.
    SendCrc,
    /// End of frame.
    SendEof,
    /// Waiting for R_OK / R_ERR while transmitting WTRM.
    Wait,

    // ---- receive ----
    /// Receive handshake: R_RDY until SOF arrives.
    RcvChkRdy,
    /// Peer wants to send but the receive side is full.
    RcvWaitFifo,
    /// Receiving payload. Transmits R_IP.
    RcvData,
    /// Local backpressure during reception: transmit HOLD.
    Hold,
    /// Peer paused: transmit HOLDA.
    RcvHold,
    /// EOF seen, CRC check pending.
    RcvEof,
    /// CRC matched.
    GoodCrc,
    /// Frame accepted: transmit R_OK.
    GoodEnd,
    /// Frame rejected: transmit R_ERR.
    BadEnd,

    // ---- power management ----
    /// Resident in Partial.
    TpmPartial,
    /// Resident in Slumber.
    TpmSlumber,
    /// PHY powered off.
    PmOff,
    /// Refusing a peer power request: transmit PMNAK.
    PmDeny,
    /// Power request negotiation in progress.
    ChkPhyRdy,
    /// PHY dropped ready while in a low-power state.
    NoCommPower,
    /// Wake, step 1: waiting for the PHY.
    WakeUp1,
    /// Wake, step 2: ALIGN exchange.
    WakeUp2,
    /// Our power request was refused; waiting for PMNAK to stop.
    NoPmnak,

    // ---- ALIGN insertion ----
    /// First of the two inserted ALIGNs.
    InsertAlign1,
    /// Second of the two inserted ALIGNs.
    InsertAlign2,
}

impl LinkState {
    /// Every state, in hardware code order.
    pub const ALL: [Self; 34] = [
        Self::Idle,
        Self::SyncEscape,
        Self::NoCommErr,
        Self::NoComm,
        Self::SendAlign,
        Self::Reset,
        Self::SendChkRdy,
        Self::SendSof,
        Self::SendData,
        Self::RcvrHold,
        Self::SendHold,
        Self::SendCrc,
        Self::SendEof,
        Self::Wait,
        Self::RcvChkRdy,
        Self::RcvWaitFifo,
        Self::RcvData,
        Self::Hold,
        Self::RcvHold,
        Self::RcvEof,
        Self::GoodCrc,
        Self::GoodEnd,
        Self::BadEnd,
        Self::TpmPartial,
        Self::TpmSlumber,
        Self::PmOff,
        Self::PmDeny,
        Self::ChkPhyRdy,
        Self::NoCommPower,
        Self::WakeUp1,
        Self::WakeUp2,
        Self::NoPmnak,
        Self::InsertAlign1,
        Self::InsertAlign2,
    ];

    /// Phase this state belongs to.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Idle
            | Self::SyncEscape
            | Self::NoCommErr
            | Self::NoComm
            | Self::SendAlign
            | Self::Reset => Phase::IdleSync,
            Self::SendChkRdy
            | Self::SendSof
            | Self::SendData
            | Self::RcvrHold
            | Self::SendHold
            | Self::SendCrc
            | Self::SendEof
            | Self::Wait => Phase::Transmit,
            Self::RcvChkRdy
            | Self::RcvWaitFifo
            | Self::RcvData
            | Self::Hold
            | Self::RcvHold
            | Self::RcvEof
            | Self::GoodCrc
            | Self::GoodEnd
            | Self::BadEnd => Phase::Receive,
            Self::TpmPartial
            | Self::TpmSlumber
            | Self::PmOff
            | Self::PmDeny
            | Self::ChkPhyRdy
            | Self::NoCommPower
            | Self::WakeUp1
            | Self::WakeUp2
            | Self::NoPmnak => Phase::Power,
            Self::InsertAlign1 | Self::InsertAlign2 => Phase::Align,
        }
    }

    /// 6-bit state code as reported by the hardware status register.
    ///
    /// Only [`SendChkRdy`](Self::SendChkRdy) depends on the role.
    #[must_use]
    pub const fn code(self, role: Role) -> u8 {
        match self {
            Self::Idle => 0x00,
            Self::SyncEscape => 0x01,
            Self::NoCommErr => 0x02,
            Self::NoComm => 0x03,
            Self::SendAlign => 0x04,
            Self::Reset => 0x05,
            Self::SendChkRdy => match role {
                Role::Host => 0x06,
                Role::Device => 0x07,
            },
            Self::SendSof => 0x08,
            Self::SendData => 0x09,
            Self::RcvrHold => 0x0A,
            Self::SendHold => 0x0B,
            Self::SendCrc => 0x0C,
            Self::SendEof => 0x0D,
            Self::Wait => 0x0E,
            Self::RcvChkRdy => 0x0F,
            Self::RcvWaitFifo => 0x10,
            Self::RcvData => 0x11,
            Self::Hold => 0x12,
            Self::RcvHold => 0x13,
            Self::RcvEof => 0x14,
            Self::GoodCrc => 0x15,
            Self::GoodEnd => 0x16,
            Self::BadEnd => 0x17,
            Self::TpmPartial => 0x18,
            Self::TpmSlumber => 0x19,
            Self::PmOff => 0x1A,
            Self::PmDeny => 0x1B,
            Self::ChkPhyRdy => 0x1C,
            Self::NoCommPower => 0x1D,
            Self::WakeUp1 => 0x1E,
            Self::WakeUp2 => 0x1F,
            Self::NoPmnak => 0x20,
            Self::InsertAlign1 => 0x21,
            Self::InsertAlign2 => 0x22,
        }
    }

    /// Looks a state up by its hardware code.
    #[must_use]
    pub fn from_code(code: u8, role: Role) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code(role) == code)
    }

    /// State name as used in traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::SyncEscape => "SyncEscape",
            Self::NoCommErr => "NoCommErr",
            Self::NoComm => "NoComm",
            Self::SendAlign => "SendAlign",
            Self::Reset => "RESET",
            Self::SendChkRdy => "SendChkRdy",
            Self::SendSof => "SendSOF",
            Self::SendData => "SendData",
            Self::RcvrHold => "RcvrHold",
            Self::SendHold => "SendHold",
            Self::SendCrc => "SendCRC",
            Self::SendEof => "SendEOF",
            Self::Wait => "Wait",
            Self::RcvChkRdy => "RcvChkRdy",
            Self::RcvWaitFifo => "RcvWaitFifo",
            Self::RcvData => "RcvData",
            Self::Hold => "Hold",
            Self::RcvHold => "RcvHold",
            Self::RcvEof => "RcvEOF",
            Self::GoodCrc => "GoodCRC",
            Self::GoodEnd => "GoodEnd",
            Self::BadEnd => "BadEnd",
            Self::TpmPartial => "TPMPartial",
            Self::TpmSlumber => "TPMSlumber",
            Self::PmOff => "PMOff",
            Self::PmDeny => "PMDeny",
            Self::ChkPhyRdy => "ChkPhyRdy",
            Self::NoCommPower => "NoCommPower",
            Self::WakeUp1 => "WakeUp1",
            Self::WakeUp2 => "WakeUp2",
            Self::NoPmnak => "NoPmnak",
            Self::InsertAlign1 => "InsertAlign1",
            Self::InsertAlign2 => "InsertAlign2",
        }
    }

    /// Low-power residency or wake-up in progress.
    #[must_use]
    pub const fn is_low_power(self) -> bool {
        matches!(
            self,
            Self::TpmPartial
                | Self::TpmSlumber
                | Self::NoCommPower
                | Self::PmOff
                | Self::WakeUp1
                | Self::WakeUp2
        )
    }

    /// Whether the link is usable for frames in this state (or will be
    /// once the current exchange completes).
    #[must_use]
    pub const fn is_link_up(self) -> bool {
        !matches!(
            self,
            Self::NoComm | Self::NoCommErr | Self::Reset | Self::SendAlign
        ) && !self.is_low_power()
    }

    /// States in which a frame is on the wire, in either direction.
    #[must_use]
    pub const fn in_frame(self) -> bool {
        matches!(self.phase(), Phase::Transmit | Phase::Receive)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dense_and_unique() {
        for (i, s) in LinkState::ALL.iter().enumerate() {
            let expected = if i <= 5 { i } else { i + 1 };
            assert_eq!(usize::from(s.code(Role::Device)), expected, "{s}");
        }
        assert_eq!(LinkState::SendChkRdy.code(Role::Host), 0x06);
        assert_eq!(LinkState::SendChkRdy.code(Role::Device), 0x07);
    }

    #[test]
    fn from_code_round_trips() {
        for role in [Role::Host, Role::Device] {
            for s in LinkState::ALL {
                assert_eq!(LinkState::from_code(s.code(role), role), Some(s));
            }
        }
        assert_eq!(LinkState::from_code(0x07, Role::Host), None);
        assert_eq!(LinkState::from_code(0x23, Role::Host), None);
    }

    #[test]
    fn phase_spot_checks() {
        assert_eq!(LinkState::Idle.phase(), Phase::IdleSync);
        assert_eq!(LinkState::Wait.phase(), Phase::Transmit);
        assert_eq!(LinkState::GoodEnd.phase(), Phase::Receive);
        assert_eq!(LinkState::NoPmnak.phase(), Phase::Power);
        assert_eq!(LinkState::InsertAlign2.phase(), Phase::Align);
    }

    #[test]
    fn link_up_excludes_dead_and_power_states() {
        assert!(LinkState::Idle.is_link_up());
        assert!(LinkState::RcvData.is_link_up());
        assert!(!LinkState::NoComm.is_link_up());
        assert!(!LinkState::TpmSlumber.is_link_up());
        assert!(!LinkState::Reset.is_link_up());
        assert!(LinkState::PmDeny.is_link_up());
        assert!(LinkState::WakeUp2.is_low_power());
        assert!(!LinkState::ChkPhyRdy.is_low_power());
    }
}
