//! SATA link primitives and their canonical 32-bit encodings.
//!
//! Every dword on the link is either one of the eighteen primitives below
//! or a payload data word. Primitives are identified by exact match against
//! the canonical table; there is no fuzzy recognition.
//!
//! Byte 0 of each primitive is a K28.x control character (K28.5 for ALIGN,
//! K28.3 for everything else). The PHY reports that distinction alongside
//! each received dword, which [`Symbol`] carries as its `control` flag.

use core::fmt;

/// K28.3 control character, byte 0 of every primitive except ALIGN.
pub const K28_3: u8 = 0x7C;
/// K28.5 control character, byte 0 of ALIGN.
pub const K28_5: u8 = 0xBC;

/// A SATA link-layer primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Primitive {
    /// Physical layer word alignment.
    Align = 0,
    /// Continue repeating the previous primitive.
    Cont = 1,
    /// DMA terminate: ask the transmitter to close the frame.
    Dmat = 2,
    /// End of frame.
    Eof = 3,
    /// Flow control: the sender cannot send (or accept) more data now.
    Hold = 4,
    /// Acknowledge of a received HOLD.
    HoldA = 5,
    /// Power management request accepted.
    PmAck = 6,
    /// Power management request denied.
    PmNak = 7,
    /// Request to enter the Partial power state.
    PmReqP = 8,
    /// Request to enter the Slumber power state.
    PmReqS = 9,
    /// Frame received with an error.
    RErr = 10,
    /// Reception in progress.
    RIp = 11,
    /// Frame received without error.
    ROk = 12,
    /// Receiver ready.
    RRdy = 13,
    /// Start of frame.
    Sof = 14,
    /// Idle synchronization.
    Sync = 15,
    /// Wait for frame termination.
    Wtrm = 16,
    /// Transmitter has a frame ready.
    XRdy = 17,
}

impl Primitive {
    /// All primitives, in table order.
    pub const ALL: [Self; 18] = [
        Self::Align,
        Self::Cont,
        Self::Dmat,
        Self::Eof,
        Self::Hold,
        Self::HoldA,
        Self::PmAck,
        Self::PmNak,
        Self::PmReqP,
        Self::PmReqS,
        Self::RErr,
        Self::RIp,
        Self::ROk,
        Self::RRdy,
        Self::Sof,
        Self::Sync,
        Self::Wtrm,
        Self::XRdy,
    ];

    /// Returns the primitive with the given table index, if any.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if (index as usize) < Self::ALL.len() {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Canonical 32-bit encoding (bit-exact with peer hardware).
    #[must_use]
    pub const fn encoding(self) -> u32 {
        match self {
            Self::Align => 0x7B4A_4ABC,
            Self::Cont => 0x9999_AA7C,
            Self::Dmat => 0x3636_B57C,
            Self::Eof => 0xD5D5_B57C,
            Self::Hold => 0xD5D5_AA7C,
            Self::HoldA => 0x9595_AA7C,
            Self::PmAck => 0x9595_957C,
            Self::PmNak => 0xF5F5_957C,
            Self::PmReqP => 0x1717_B57C,
            Self::PmReqS => 0x7575_957C,
            Self::RErr => 0x5656_B57C,
            Self::RIp => 0x5555_B57C,
            Self::ROk => 0x3535_B57C,
            Self::RRdy => 0x4A4A_957C,
            Self::Sof => 0x3737_B57C,
            Self::Sync => 0xB5B5_957C,
            Self::Wtrm => 0x5858_B57C,
            Self::XRdy => 0x5757_B57C,
        }
    }

    /// Whether a run of this primitive may be compressed with CONT.
    ///
    /// Frame delimiters, ALIGN, CONT itself, DMAT and the PMACK/PMNAK
    /// replies are always sent literally.
    #[must_use]
    pub const fn is_continuable(self) -> bool {
        matches!(
            self,
            Self::Hold
                | Self::HoldA
                | Self::PmReqP
                | Self::PmReqS
                | Self::RErr
                | Self::RIp
                | Self::ROk
                | Self::RRdy
                | Self::Sync
                | Self::Wtrm
                | Self::XRdy
        )
    }

    /// Short upper-case name as used in protocol traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Align => "ALIGN",
            Self::Cont => "CONT",
            Self::Dmat => "DMAT",
            Self::Eof => "EOF",
            Self::Hold => "HOLD",
            Self::HoldA => "HOLDA",
            Self::PmAck => "PMACK",
            Self::PmNak => "PMNAK",
            Self::PmReqP => "PMREQ_P",
            Self::PmReqS => "PMREQ_S",
            Self::RErr => "R_ERR",
            Self::RIp => "R_IP",
            Self::ROk => "R_OK",
            Self::RRdy => "R_RDY",
            Self::Sof => "SOF",
            Self::Sync => "SYNC",
            Self::Wtrm => "WTRM",
            Self::XRdy => "X_RDY",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dword classified by value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    /// A recognized primitive.
    Primitive(Primitive),
    /// Anything else: transport payload.
    Data(u32),
}

/// Encodes a primitive to its canonical dword.
#[must_use]
pub const fn encode(primitive: Primitive) -> u32 {
    primitive.encoding()
}

/// Decodes a dword by exact match against the primitive table.
///
/// Words that match no primitive are classified as [`Word::Data`]; whether
/// data is expected is the state machine's business.
#[must_use]
pub fn decode(word: u32) -> Word {
    Primitive::ALL
        .iter()
        .copied()
        .find(|p| p.encoding() == word)
        .map_or(Word::Data(word), Word::Primitive)
}

/// One symbol-time on the wire: a dword plus the PHY's control-character
/// indication for byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// The 32-bit word.
    pub word: u32,
    /// Byte 0 was received as a K28.x control character.
    pub control: bool,
}

impl Symbol {
    /// A primitive symbol.
    #[must_use]
    pub const fn primitive(primitive: Primitive) -> Self {
        Self {
            word: primitive.encoding(),
            control: true,
        }
    }

    /// A data symbol.
    #[must_use]
    pub const fn data(word: u32) -> Self {
        Self {
            word,
            control: false,
        }
    }

    /// Classifies the symbol using the control flag.
    ///
    /// Data symbols are always [`Word::Data`], even when their value equals
    /// a primitive encoding.
    ///
    /// # Errors
    ///
    /// Returns the raw word if the symbol is flagged as control but matches
    /// no primitive.
    pub fn classify(self) -> Result<Word, u32> {
        if !self.control {
            return Ok(Word::Data(self.word));
        }
        match decode(self.word) {
            Word::Primitive(p) => Ok(Word::Primitive(p)),
            Word::Data(raw) => Err(raw),
        }
    }

    /// Returns the primitive carried by this symbol, if any.
    #[must_use]
    pub fn as_primitive(self) -> Option<Primitive> {
        match self.classify() {
            Ok(Word::Primitive(p)) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classify() {
            Ok(Word::Primitive(p)) => write!(f, "{p}"),
            Ok(Word::Data(w)) => write!(f, "{w:#010x}"),
            Err(w) => write!(f, "K?{w:#010x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_inverts_encode() {
        for p in Primitive::ALL {
            assert_eq!(decode(encode(p)), Word::Primitive(p), "{p}");
        }
    }

    #[test]
    fn encodings_are_distinct() {
        for (i, a) in Primitive::ALL.iter().enumerate() {
            for b in &Primitive::ALL[i + 1..] {
                assert_ne!(a.encoding(), b.encoding(), "{a} / {b}");
            }
        }
    }

    #[test]
    fn byte0_is_a_control_character() {
        for p in Primitive::ALL {
            let byte0 = (p.encoding() & 0xFF) as u8;
            if p == Primitive::Align {
                assert_eq!(byte0, K28_5);
            } else {
                assert_eq!(byte0, K28_3, "{p}");
            }
        }
    }

    #[test]
    fn unknown_word_is_data() {
        assert_eq!(decode(0x1234_5678), Word::Data(0x1234_5678));
        assert_eq!(decode(0), Word::Data(0));
        // One bit away from SYNC.
        assert_eq!(decode(0xB5B5_957D), Word::Data(0xB5B5_957D));
    }

    #[test]
    fn spot_check_table() {
        assert_eq!(encode(Primitive::Align), 0x7B4A_4ABC);
        assert_eq!(encode(Primitive::Sync), 0xB5B5_957C);
        assert_eq!(encode(Primitive::XRdy), 0x5757_B57C);
        assert_eq!(encode(Primitive::PmReqP), 0x1717_B57C);
    }

    #[test]
    fn from_index_matches_repr() {
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_index(p as u8), Some(p));
        }
        assert_eq!(Primitive::from_index(18), None);
        assert_eq!(Primitive::from_index(0xFF), None);
    }

    #[test]
    fn data_symbol_with_primitive_value_stays_data() {
        let sym = Symbol::data(Primitive::Sof.encoding());
        assert_eq!(sym.classify(), Ok(Word::Data(0x3737_B57C)));
        assert_eq!(sym.as_primitive(), None);
    }

    #[test]
    fn unknown_control_word_is_invalid() {
        let sym = Symbol {
            word: 0xDEAD_BE7C,
            control: true,
        };
        assert_eq!(sym.classify(), Err(0xDEAD_BE7C));
    }

    #[test]
    fn continuable_set() {
        assert!(Primitive::Sync.is_continuable());
        assert!(Primitive::Hold.is_continuable());
        assert!(Primitive::RIp.is_continuable());
        assert!(!Primitive::Sof.is_continuable());
        assert!(!Primitive::Eof.is_continuable());
        assert!(!Primitive::Align.is_continuable());
        assert!(!Primitive::Cont.is_continuable());
        assert!(!Primitive::PmAck.is_continuable());
    }

    #[test]
    fn display_names() {
        assert_eq!(format!("{}", Primitive::RRdy), "R_RDY");
        assert_eq!(format!("{}", Symbol::primitive(Primitive::Wtrm)), "WTRM");
        assert_eq!(format!("{}", Symbol::data(0xAB)), "0x000000ab");
    }
}
