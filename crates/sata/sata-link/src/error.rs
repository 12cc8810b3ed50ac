//! Error and outcome types.

use core::fmt;

/// Errors returned by link requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// A frame (or power request) is already in progress.
    Busy,
    /// The link is down; re-initialization is required.
    LinkDown,
    /// The link is in a low-power state.
    LowPower,
    /// Words were appended without an open frame.
    NoOpenFrame,
    /// The payload exceeds the configured maximum frame length.
    FrameTooLong,
    /// Frames must carry at least one dword.
    EmptyFrame,
    /// The operation did not complete within its tick budget.
    Timeout,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("link busy"),
            Self::LinkDown => f.write_str("link down"),
            Self::LowPower => f.write_str("link in low-power state"),
            Self::NoOpenFrame => f.write_str("no open frame"),
            Self::FrameTooLong => f.write_str("frame exceeds maximum length"),
            Self::EmptyFrame => f.write_str("empty frame"),
            Self::Timeout => f.write_str("operation timed out"),
        }
    }
}

/// Errors in a [`LinkConfig`](crate::LinkConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A timeout was set to zero.
    ZeroTimeout(&'static str),
    /// The ALIGN interval leaves no room between insertions.
    AlignIntervalTooShort(u32),
    /// `max-frame-words` is zero.
    ZeroFrameLength,
    /// `rx-queue-depth` is zero.
    ZeroQueueDepth,
    /// `pmack-burst` is outside 4..=16.
    PmackBurstOutOfRange(u32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroTimeout(name) => write!(f, "{name} must be non-zero"),
            Self::AlignIntervalTooShort(v) => {
                write!(f, "align-interval {v} is too short (minimum 4)")
            }
            Self::ZeroFrameLength => f.write_str("max-frame-words must be non-zero"),
            Self::ZeroQueueDepth => f.write_str("rx-queue-depth must be non-zero"),
            Self::PmackBurstOutOfRange(v) => write!(f, "pmack-burst {v} not in 4..=16"),
        }
    }
}

/// Final result of a frame transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Peer answered R_OK.
    Ok,
    /// Peer answered R_ERR, or never answered.
    CrcError,
    /// The link went down before the frame completed.
    LinkDown,
    /// The frame was aborted with SYNC by either side.
    Aborted,
}

impl fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::CrcError => f.write_str("CRC error"),
            Self::LinkDown => f.write_str("link down"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Why a received frame was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxError {
    /// CRC mismatch.
    Crc,
    /// Transmitter aborted the frame, or we escaped.
    Aborted,
    /// The link went down mid-frame.
    LinkDown,
    /// Payload exceeded the maximum frame length.
    TooLong,
    /// Framing violation (missing EOF, invalid control word, ...).
    Protocol,
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc => f.write_str("CRC mismatch"),
            Self::Aborted => f.write_str("frame aborted"),
            Self::LinkDown => f.write_str("link down during reception"),
            Self::TooLong => f.write_str("frame too long"),
            Self::Protocol => f.write_str("framing violation"),
        }
    }
}

/// Interface power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerMode {
    /// Partial: fast wake.
    Partial,
    /// Slumber: deeper, slower wake.
    Slumber,
    /// Fully active.
    Active,
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial => f.write_str("partial"),
            Self::Slumber => f.write_str("slumber"),
            Self::Active => f.write_str("active"),
        }
    }
}

/// Result of a power mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOutcome {
    /// The requested mode was entered.
    Accepted,
    /// The peer refused, or the link could not honor the request.
    Denied,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_link_errors() {
        assert_eq!(format!("{}", LinkError::Busy), "link busy");
        assert_eq!(format!("{}", LinkError::LinkDown), "link down");
        assert_eq!(
            format!("{}", LinkError::FrameTooLong),
            "frame exceeds maximum length"
        );
    }

    #[test]
    fn display_config_errors() {
        assert_eq!(
            format!("{}", ConfigError::ZeroTimeout("wait-timeout")),
            "wait-timeout must be non-zero"
        );
        assert_eq!(
            format!("{}", ConfigError::PmackBurstOutOfRange(2)),
            "pmack-burst 2 not in 4..=16"
        );
    }

    #[test]
    fn display_outcomes() {
        assert_eq!(format!("{}", TxOutcome::CrcError), "CRC error");
        assert_eq!(format!("{}", RxError::TooLong), "frame too long");
        assert_eq!(format!("{}", PowerMode::Slumber), "slumber");
    }
}
