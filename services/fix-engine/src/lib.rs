//! FIX protocol trading engine
//!
//! A FIX 4.4 engine built from the wire up:
//! - message codec with checksum and length framing
//! - per-connection session protocol (logon, heartbeats, sequence tracking)
//! - order lifecycle state machine with simulated fills
//! - acceptor ([`server::FixServer`]) and initiator ([`client::FixClient`])
//!   engines over plain TCP
//!
//! Decoding is deliberately lenient and there is no sequence-gap recovery;
//! see [`codec::verify_frame`] for the opt-in strict validator.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod order;
pub mod server;
pub mod session;

pub use client::{CancelReject, FixClient};
pub use config::{ClientConfig, ServerConfig};
pub use error::{FixError, FixResult};
pub use message::FixMessage;
pub use order::{ExecType, OrdType, Order, OrderStatus};
pub use server::FixServer;
pub use session::{Session, SessionState};
