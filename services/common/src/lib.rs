//! Shared types for the FIX trading engine services

pub mod constants;
pub mod time;
pub mod types;

pub use types::{Px, Qty, Side};
