//! Common constants used across the FIX engine services
//!
//! Single source of truth for all magic numbers

// Fixed-point arithmetic constants
/// Price scale factor (2 decimal places, matching the FIX wire format)
pub const PRICE_SCALE: i64 = 100;
/// Price scale as f64 for boundary conversions
pub const PRICE_SCALE_F64: f64 = 100.0;

// Time constants
/// Milliseconds per second
pub const MILLIS_PER_SEC: u64 = 1000;
/// Default FIX heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

// Numeric limits for validation
/// Maximum order quantity in whole units
pub const MAX_QUANTITY: i64 = 1_000_000_000;
/// Minimum order quantity in whole units
pub const MIN_QUANTITY: i64 = 1;
