//! CONT compression of repeated primitives.
//!
//! A transmitter that repeats a continuable primitive may send it twice,
//! then CONT, then scrambled filler data until it has something different
//! to say. The receiver reports the held primitive for every CONT and
//! filler word. ALIGN is transparent on both sides: it may appear inside a
//! run without ending it.

use crate::primitive::{Primitive, Symbol, Word};
use crate::scrambler::Scrambler;

/// What the link wants to put on the wire this symbol-time, before
/// compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tx {
    /// A primitive.
    Primitive(Primitive),
    /// An already-scrambled frame dword.
    Data(u32),
}

/// Transmit-side CONT compressor.
#[derive(Debug, Clone)]
pub struct ContEncoder {
    enabled: bool,
    last: Option<Primitive>,
    repeats: u32,
    filler: Scrambler,
}

impl ContEncoder {
    /// Creates a compressor. When `enabled` is false every primitive is
    /// sent literally.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last: None,
            repeats: 0,
            filler: Scrambler::new(),
        }
    }

    /// Forgets the current run, e.g. after the link went idle electrically.
    pub fn reset(&mut self) {
        self.last = None;
        self.repeats = 0;
    }

    /// Returns `true` while filler is being sent for a compressed run.
    ///
    /// Data must not follow filler directly: the receiver would take it for
    /// more filler. [`close_run`](Self::close_run) ends the run first.
    #[must_use]
    pub const fn run_open(&self) -> bool {
        self.repeats >= 3
    }

    /// Ends an open run by re-sending the held primitive literally.
    pub fn close_run(&mut self) -> Option<Symbol> {
        if !self.run_open() {
            return None;
        }
        let held = self.last?;
        self.repeats = 1;
        Some(Symbol::primitive(held))
    }

    /// Maps one transmit request to the symbol actually sent.
    pub fn encode(&mut self, tx: Tx) -> Symbol {
        match tx {
            Tx::Primitive(Primitive::Align) => Symbol::primitive(Primitive::Align),
            Tx::Primitive(p) if self.enabled && p.is_continuable() && self.last == Some(p) => {
                self.repeats = self.repeats.saturating_add(1);
                match self.repeats {
                    0..=2 => Symbol::primitive(p),
                    3 => Symbol::primitive(Primitive::Cont),
                    _ => Symbol::data(self.filler.next_mask()),
                }
            }
            Tx::Primitive(p) => {
                self.last = Some(p);
                self.repeats = 1;
                Symbol::primitive(p)
            }
            Tx::Data(word) => {
                self.reset();
                Symbol::data(word)
            }
        }
    }
}

/// A received symbol after CONT expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rx {
    /// Nothing arrived this symbol-time.
    Silent,
    /// A primitive, either literal or held by CONT.
    Primitive(Primitive),
    /// A frame dword, still scrambled.
    Data(u32),
    /// A control word that matches no primitive.
    Invalid(u32),
}

impl Rx {
    /// Returns `true` if this is the given primitive.
    #[must_use]
    pub fn is(self, primitive: Primitive) -> bool {
        self == Self::Primitive(primitive)
    }
}

/// Receive-side CONT expander.
#[derive(Debug, Clone, Default)]
pub struct ContDecoder {
    last: Option<Primitive>,
    holding: bool,
}

impl ContDecoder {
    /// Creates an expander with no held primitive.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: None,
            holding: false,
        }
    }

    /// Forgets the held primitive.
    pub fn reset(&mut self) {
        self.last = None;
        self.holding = false;
    }

    /// Primitive currently held by a CONT run, if any.
    #[must_use]
    pub const fn held(&self) -> Option<Primitive> {
        if self.holding { self.last } else { None }
    }

    /// Expands one received symbol.
    pub fn decode(&mut self, symbol: Option<Symbol>) -> Rx {
        let Some(symbol) = symbol else {
            return Rx::Silent;
        };
        match symbol.classify() {
            Ok(Word::Primitive(Primitive::Align)) => Rx::Primitive(Primitive::Align),
            Ok(Word::Primitive(Primitive::Cont)) => match self.last {
                Some(p) => {
                    self.holding = true;
                    Rx::Primitive(p)
                }
                None => Rx::Invalid(symbol.word),
            },
            Ok(Word::Primitive(p)) => {
                self.last = Some(p);
                self.holding = false;
                Rx::Primitive(p)
            }
            Ok(Word::Data(word)) => match self.last {
                Some(p) if self.holding => Rx::Primitive(p),
                _ => {
                    self.last = None;
                    Rx::Data(word)
                }
            },
            Err(raw) => {
                self.reset();
                Rx::Invalid(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(enc: &mut ContEncoder, txs: &[Tx]) -> Vec<Symbol> {
        txs.iter().map(|&t| enc.encode(t)).collect()
    }

    #[test]
    fn third_repeat_becomes_cont_then_filler() {
        let mut enc = ContEncoder::new(true);
        let out = run(&mut enc, &[Tx::Primitive(Primitive::Sync); 6]);
        assert_eq!(out[0], Symbol::primitive(Primitive::Sync));
        assert_eq!(out[1], Symbol::primitive(Primitive::Sync));
        assert_eq!(out[2], Symbol::primitive(Primitive::Cont));
        for sym in &out[3..] {
            assert!(!sym.control);
        }
    }

    #[test]
    fn disabled_sends_literally() {
        let mut enc = ContEncoder::new(false);
        let out = run(&mut enc, &[Tx::Primitive(Primitive::Hold); 5]);
        assert!(out.iter().all(|s| *s == Symbol::primitive(Primitive::Hold)));
    }

    #[test]
    fn non_continuable_never_compressed() {
        let mut enc = ContEncoder::new(true);
        for p in [Primitive::PmAck, Primitive::PmNak, Primitive::Dmat] {
            let out = run(&mut enc, &[Tx::Primitive(p); 5]);
            assert!(out.iter().all(|s| *s == Symbol::primitive(p)), "{p}");
        }
    }

    #[test]
    fn align_does_not_break_a_run() {
        let mut enc = ContEncoder::new(true);
        let txs = [
            Tx::Primitive(Primitive::XRdy),
            Tx::Primitive(Primitive::XRdy),
            Tx::Primitive(Primitive::Align),
            Tx::Primitive(Primitive::XRdy),
        ];
        let out = run(&mut enc, &txs);
        assert_eq!(out[2], Symbol::primitive(Primitive::Align));
        assert_eq!(out[3], Symbol::primitive(Primitive::Cont));
    }

    #[test]
    fn data_ends_a_run() {
        let mut enc = ContEncoder::new(true);
        let txs = [
            Tx::Primitive(Primitive::Sync),
            Tx::Primitive(Primitive::Sync),
            Tx::Data(7),
            Tx::Primitive(Primitive::Sync),
        ];
        let out = run(&mut enc, &txs);
        assert_eq!(out[2], Symbol::data(7));
        assert_eq!(out[3], Symbol::primitive(Primitive::Sync));
    }

    #[test]
    fn round_trip_expands_runs() {
        let mut enc = ContEncoder::new(true);
        let mut dec = ContDecoder::new();
        let mut txs = vec![Tx::Primitive(Primitive::RIp); 10];
        txs.push(Tx::Primitive(Primitive::Align));
        txs.extend([Tx::Primitive(Primitive::RIp); 3]);
        txs.push(Tx::Primitive(Primitive::ROk));
        txs.push(Tx::Primitive(Primitive::ROk));
        txs.push(Tx::Primitive(Primitive::ROk));
        txs.push(Tx::Primitive(Primitive::ROk));
        txs.push(Tx::Primitive(Primitive::Sof));
        txs.push(Tx::Data(0x55));

        let expected: Vec<Rx> = txs
            .iter()
            .map(|t| match *t {
                Tx::Primitive(p) => Rx::Primitive(p),
                Tx::Data(w) => Rx::Data(w),
            })
            .collect();
        let got: Vec<Rx> = txs
            .iter()
            .map(|&t| dec.decode(Some(enc.encode(t))))
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn close_run_before_data() {
        let mut enc = ContEncoder::new(true);
        let mut dec = ContDecoder::new();
        for _ in 0..5 {
            dec.decode(Some(enc.encode(Tx::Primitive(Primitive::HoldA))));
        }
        assert!(enc.run_open());
        assert_eq!(dec.held(), Some(Primitive::HoldA));

        let closing = enc.close_run().expect("run was open");
        assert_eq!(closing, Symbol::primitive(Primitive::HoldA));
        assert_eq!(dec.decode(Some(closing)), Rx::Primitive(Primitive::HoldA));
        assert_eq!(dec.held(), None);
        assert_eq!(dec.decode(Some(enc.encode(Tx::Data(9)))), Rx::Data(9));
        assert_eq!(enc.close_run(), None);
    }

    #[test]
    fn cont_without_history_is_invalid() {
        let mut dec = ContDecoder::new();
        let cont = Symbol::primitive(Primitive::Cont);
        assert_eq!(dec.decode(Some(cont)), Rx::Invalid(cont.word));
    }

    #[test]
    fn silence_is_reported() {
        let mut dec = ContDecoder::new();
        assert_eq!(dec.decode(None), Rx::Silent);
    }

    #[test]
    fn invalid_control_word_drops_hold() {
        let mut dec = ContDecoder::new();
        dec.decode(Some(Symbol::primitive(Primitive::Hold)));
        dec.decode(Some(Symbol::primitive(Primitive::Cont)));
        assert_eq!(dec.held(), Some(Primitive::Hold));
        let bad = Symbol {
            word: 0x0000_007C,
            control: true,
        };
        assert_eq!(dec.decode(Some(bad)), Rx::Invalid(0x7C));
        assert_eq!(dec.held(), None);
        assert_eq!(dec.decode(Some(Symbol::data(1))), Rx::Data(1));
    }
}
