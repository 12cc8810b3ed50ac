//! Link configuration.
//!
//! All durations are in symbol-times (one [`LinkContext::tick`] each).
//! Keys use kebab-case when loaded from TOML; missing keys take their
//! defaults.
//!
//! ```toml
//! handshake-timeout = 64
//! max-retries = 2
//! cont-enabled = false
//! ```
//!
//! [`LinkContext::tick`]: crate::LinkContext::tick

use serde::Deserialize;

use crate::error::ConfigError;

/// Default X_RDY / R_RDY handshake window.
pub const DEFAULT_HANDSHAKE_TIMEOUT: u32 = 128;
/// Default number of handshake retries before escalating.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default wait for R_OK / R_ERR, and for SYNC after a frame ends.
pub const DEFAULT_WAIT_TIMEOUT: u32 = 512;
/// Default power negotiation window.
pub const DEFAULT_PM_TIMEOUT: u32 = 128;
/// Default wake handshake window.
pub const DEFAULT_WAKE_TIMEOUT: u32 = 512;
/// Default reset / bring-up window.
pub const DEFAULT_RESET_TIMEOUT: u32 = 256;
/// Default number of silent symbol-times before declaring the link lost.
pub const DEFAULT_SILENCE_LIMIT: u32 = 1024;
/// Default spacing of inserted ALIGN pairs.
pub const DEFAULT_ALIGN_INTERVAL: u32 = 256;
/// Default frame length limit in dwords (8 KiB FIS).
pub const DEFAULT_MAX_FRAME_WORDS: u32 = 2048;
/// Default number of undelivered frames before the receiver pushes back.
pub const DEFAULT_RX_QUEUE_DEPTH: u32 = 4;
/// Default number of PMACKs sent when accepting a power request.
pub const DEFAULT_PMACK_BURST: u32 = 4;

/// Tunables of one link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LinkConfig {
    /// Ticks SendChkRdy / RcvChkRdy / SyncEscape wait for the peer.
    pub handshake_timeout: u32,
    /// Handshake timeouts tolerated before going to NoCommErr.
    pub max_retries: u32,
    /// Ticks Wait waits for R_OK / R_ERR, and GoodEnd / BadEnd for SYNC.
    pub wait_timeout: u32,
    /// Ticks a power negotiation may take.
    pub pm_timeout: u32,
    /// Ticks each wake step may take.
    pub wake_timeout: u32,
    /// Ticks RESET / SendAlign may take.
    pub reset_timeout: u32,
    /// Consecutive silent ticks tolerated while the link is up.
    pub silence_limit: u32,
    /// Ticks between ALIGN pair insertions.
    pub align_interval: u32,
    /// Longest accepted payload, in dwords.
    pub max_frame_words: u32,
    /// Undelivered frames before receive backpressure.
    pub rx_queue_depth: u32,
    /// PMACKs sent before entering the requested power state.
    pub pmack_burst: u32,
    /// Compress repeated primitives with CONT.
    pub cont_enabled: bool,
    /// Honor power requests from the peer.
    pub accept_power_requests: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            pm_timeout: DEFAULT_PM_TIMEOUT,
            wake_timeout: DEFAULT_WAKE_TIMEOUT,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            silence_limit: DEFAULT_SILENCE_LIMIT,
            align_interval: DEFAULT_ALIGN_INTERVAL,
            max_frame_words: DEFAULT_MAX_FRAME_WORDS,
            rx_queue_depth: DEFAULT_RX_QUEUE_DEPTH,
            pmack_burst: DEFAULT_PMACK_BURST,
            cont_enabled: true,
            accept_power_requests: true,
        }
    }
}

impl LinkConfig {
    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("handshake-timeout", self.handshake_timeout),
            ("wait-timeout", self.wait_timeout),
            ("pm-timeout", self.pm_timeout),
            ("wake-timeout", self.wake_timeout),
            ("reset-timeout", self.reset_timeout),
            ("silence-limit", self.silence_limit),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroTimeout(*name));
        }
        if self.align_interval < 4 {
            return Err(ConfigError::AlignIntervalTooShort(self.align_interval));
        }
        if self.max_frame_words == 0 {
            return Err(ConfigError::ZeroFrameLength);
        }
        if self.rx_queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if !(4..=16).contains(&self.pmack_burst) {
            return Err(ConfigError::PmackBurstOutOfRange(self.pmack_burst));
        }
        Ok(())
    }
}
