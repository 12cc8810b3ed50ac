//! Link counters.

/// Event counters kept by a [`LinkContext`](crate::LinkContext).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames acknowledged with R_OK.
    pub frames_sent: u64,
    /// Frames delivered to Transport.
    pub frames_received: u64,
    /// Received frames rejected for CRC mismatch.
    pub rx_crc_errors: u64,
    /// Transmitted frames answered with R_ERR (or not answered).
    pub tx_errors: u64,
    /// Frames aborted with SYNC, either direction.
    pub aborts: u64,
    /// Entries into any HOLD / HOLDA state.
    pub holds: u64,
    /// ALIGN pairs inserted during idle.
    pub aligns_inserted: u64,
    /// Handshake windows that expired.
    pub handshake_timeouts: u64,
    /// Times the retry bound was exceeded.
    pub retries_exhausted: u64,
    /// Transitions into NoComm.
    pub link_losses: u64,
    /// Control words matching no primitive.
    pub invalid_words: u64,
    /// Entries into and exits from low-power states.
    pub power_transitions: u64,
}
