//! SATA data scrambler.
//!
//! A 16-bit linear feedback shift register over
//! G(x) = x^16 + x^15 + x^13 + x^4 + 1, seeded with all ones at every frame
//! boundary and clocked 32 times per dword. Scrambling is an XOR with the
//! LFSR output, so descrambling is the same operation run in lock-step.
//!
//! The link also uses an independent instance of the same generator to
//! produce the filler words that follow a CONT primitive.

/// Value loaded into the LFSR at each frame boundary.
pub const SCRAMBLER_SEED: u16 = 0xFFFF;

/// Low 16 bits of G(x), folded into the register whenever a one shifts out.
const SCRAMBLER_TAPS: u16 = 0xA011;

/// LFSR-based scrambler / descrambler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrambler {
    lfsr: u16,
}

impl Scrambler {
    /// Creates a scrambler at the frame-start seed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lfsr: SCRAMBLER_SEED,
        }
    }

    /// Reloads the seed. Called at every SOF.
    pub fn reseed(&mut self) {
        self.lfsr = SCRAMBLER_SEED;
    }

    /// Advances the generator by one dword and returns its 32 output bits.
    pub fn next_mask(&mut self) -> u32 {
        let mut mask = 0u32;
        for bit in 0..32 {
            let out = self.lfsr >> 15;
            self.lfsr <<= 1;
            if out != 0 {
                self.lfsr ^= SCRAMBLER_TAPS;
            }
            mask |= u32::from(out) << bit;
        }
        mask
    }

    /// Scrambles one payload dword.
    pub fn scramble(&mut self, word: u32) -> u32 {
        word ^ self.next_mask()
    }

    /// Descrambles one received dword.
    pub fn descramble(&mut self, word: u32) -> u32 {
        word ^ self.next_mask()
    }
}

impl Default for Scrambler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descramble_inverts_scramble() {
        let payload = [0u32, 0xFFFF_FFFF, 0x0030_8027, 0xE000_0000, 0x1234_5678];
        let mut tx = Scrambler::new();
        let mut rx = Scrambler::new();
        for w in payload {
            let wire = tx.scramble(w);
            assert_eq!(rx.descramble(wire), w);
        }
    }

    #[test]
    fn reseed_restarts_sequence() {
        let mut s = Scrambler::new();
        let first: Vec<u32> = (0..8).map(|_| s.next_mask()).collect();
        s.reseed();
        let again: Vec<u32> = (0..8).map(|_| s.next_mask()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn sequence_is_not_degenerate() {
        let mut s = Scrambler::new();
        let masks: Vec<u32> = (0..64).map(|_| s.next_mask()).collect();
        assert!(masks.iter().all(|&m| m != 0));
        for pair in masks.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn lfsr_never_reaches_zero() {
        let mut s = Scrambler::new();
        for _ in 0..4096 {
            s.next_mask();
            assert_ne!(s.lfsr, 0);
        }
    }

    #[test]
    fn zero_payload_exposes_the_mask() {
        let mut a = Scrambler::new();
        let mut b = Scrambler::new();
        assert_eq!(a.scramble(0), b.next_mask());
    }

    #[test]
    fn matches_reference_sequence() {
        let mut s = Scrambler::new();
        let masks: Vec<u32> = (0..4).map(|_| s.next_mask()).collect();
        assert_eq!(masks, [0xC2D2_768D, 0x1F26_B368, 0xA508_436C, 0x3452_D354]);
    }
}
