//! Frames exchanged with the Transport layer.

use alloc::vec::Vec;

/// An ordered sequence of payload dwords.
///
/// Frames move between Transport and the link by value; the link never
/// shares a frame it is still working on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    words: Vec<u32>,
}

impl Frame {
    /// Creates a frame by copying `words`.
    #[must_use]
    pub fn from_slice(words: &[u32]) -> Self {
        Self {
            words: words.to_vec(),
        }
    }

    /// Payload dwords.
    #[must_use]
    pub fn as_words(&self) -> &[u32] {
        &self.words
    }

    /// Consumes the frame and returns its payload.
    #[must_use]
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Payload length in dwords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl From<Vec<u32>> for Frame {
    fn from(words: Vec<u32>) -> Self {
        Self { words }
    }
}

impl AsRef<[u32]> for Frame {
    fn as_ref(&self) -> &[u32] {
        &self.words
    }
}
