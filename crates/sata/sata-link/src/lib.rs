//! SATA link layer.
//!
//! A symbol-time accurate model of the SATA link-layer protocol engine:
//! primitive encoding, CONT compression, payload scrambling, frame CRC,
//! the host and device state machines for frame transmission and
//! reception, flow control, interface power management and link
//! bring-up.
//!
//! The engine is a plain value ([`LinkContext`]) advanced by
//! [`LinkContext::tick`], one call per symbol-time. It never blocks and
//! never allocates on the hot path beyond frame storage. [`SataPort`]
//! binds a link to a [`Phy`] and offers blocking Transport calls;
//! [`sim::LinkPair`] wires two links back to back for testing. The wire
//! model sits behind the default `sim` feature; firmware builds turn it off
//! with `default-features = false`.
//!
//! # Usage
//!
//! ```
//! use sata_link::{Frame, LinkConfig, TxOutcome, sim::LinkPair};
//!
//! let mut pair = LinkPair::new(LinkConfig::default()).unwrap();
//! pair.host.submit_frame(Frame::from_slice(&[0x27, 0xEC])).unwrap();
//! pair.run_until(1_000, |p| p.device.rx_pending() > 0);
//! assert_eq!(pair.device.receive_frame().unwrap().as_words(), &[0x27, 0xEC]);
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod cont;
pub mod crc;
pub mod error;
pub mod frame;
pub mod link;
pub mod phy;
pub mod port;
pub mod primitive;
pub mod scrambler;
#[cfg(feature = "sim")]
pub mod sim;
pub mod state;
pub mod stats;

pub use config::LinkConfig;
pub use error::{ConfigError, LinkError, PowerMode, PowerOutcome, RxError, TxOutcome};
pub use frame::Frame;
pub use link::{LinkContext, LinkStatus};
pub use phy::{OobEvent, Phy, PhyInput, PhyOutput, PhyRequest, PhySignals};
pub use port::SataPort;
pub use primitive::{Primitive, Symbol, Word, decode, encode};
pub use state::{LinkState, Phase, Role};
pub use stats::LinkStats;
