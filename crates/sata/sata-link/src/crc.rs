//! SATA frame CRC.
//!
//! CRC-32 over the IEEE 802.3 generator (0x04C11DB7), processed a dword at
//! a time, most significant bit first, seeded with 0x52325032, with no
//! reflection and no final XOR. The accumulator runs over unscrambled
//! payload dwords in wire order; the result is sent as the last dword of
//! the frame, ahead of EOF.

/// Generator polynomial (x^32 term implied).
pub const CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Accumulator value at the start of every frame.
pub const CRC_SEED: u32 = 0x5232_5032;

/// Running frame CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCrc {
    value: u32,
}

impl FrameCrc {
    /// Creates an accumulator at the seed value.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: CRC_SEED }
    }

    /// Resets to the seed. Called at every SOF.
    pub fn reset(&mut self) {
        self.value = CRC_SEED;
    }

    /// Folds one payload dword into the accumulator.
    pub fn accumulate(&mut self, word: u32) -> u32 {
        let mut crc = self.value ^ word;
        for _ in 0..32 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC_POLYNOMIAL
            } else {
                crc << 1
            };
        }
        self.value = crc;
        crc
    }

    /// Returns the CRC of everything accumulated since the last reset.
    #[must_use]
    pub const fn finalize(&self) -> u32 {
        self.value
    }

    /// Computes the CRC of a complete payload.
    #[must_use]
    pub fn compute(words: &[u32]) -> u32 {
        let mut crc = Self::new();
        for &w in words {
            crc.accumulate(w);
        }
        crc.finalize()
    }
}

impl Default for FrameCrc {
    fn default() -> Self {
        Self::new()
    }
}
