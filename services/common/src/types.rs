//! Core value types for the FIX engine
//!
//! Prices and quantities are fixed-point `i64` newtypes so that order state
//! arithmetic stays deterministic; floating point appears only at the wire
//! boundary where the protocol prints decimal strings.

use crate::constants::{PRICE_SCALE, PRICE_SCALE_F64};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price stored as i64 hundredths (1 tick = 0.01, the FIX wire precision)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Px(i64);

impl Px {
    /// Zero price
    pub const ZERO: Self = Self(0);

    /// Create from hundredths (150.50 == `from_cents(15050)`)
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create from an f64 at the wire boundary, rounding to 2 decimals
    #[must_use]
    pub fn new(value: f64) -> Self {
        let scaled = (value * PRICE_SCALE_F64).round();
        let clamped = if scaled >= i64::MAX as f64 {
            i64::MAX
        } else if scaled <= i64::MIN as f64 {
            i64::MIN
        } else {
            #[allow(clippy::cast_possible_truncation)]
            {
                scaled as i64
            }
        };
        Self(clamped)
    }

    /// Price in hundredths
    #[must_use]
    pub const fn as_cents(&self) -> i64 {
        self.0
    }

    /// Price as f64, for external consumers only
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        {
            self.0 as f64 / PRICE_SCALE_F64
        }
    }

    /// Parse a wire price string ("150.50", "150.5", "150")
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        value.trim().parse::<f64>().ok().map(Self::new)
    }

    /// Render as the 2-decimal wire form ("150.50")
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PRICE_SCALE;
        let frac = (self.0 % PRICE_SCALE).abs();
        write!(f, "{whole}.{frac:02}")
    }
}

/// Order quantity in whole units (shares/contracts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qty(i64);

impl Qty {
    /// Zero quantity
    pub const ZERO: Self = Self(0);

    /// Create from whole units
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Quantity in whole units
    #[must_use]
    pub const fn as_units(&self) -> i64 {
        self.0
    }

    /// True when the quantity is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Half of this quantity, rounded down to whole units
    #[must_use]
    pub const fn half(&self) -> Self {
        Self(self.0 / 2)
    }

    /// Sum of two quantities
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Difference of two quantities, saturating at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Self(0) } else { Self(diff) }
    }

    /// Parse a wire quantity string ("100")
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        value.trim().parse::<i64>().ok().map(Self)
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl Side {
    /// FIX tag 54 code
    #[must_use]
    pub const fn as_fix(&self) -> &'static str {
        match self {
            Self::Buy => "1",
            Self::Sell => "2",
        }
    }

    /// Parse a FIX tag 54 code
    #[must_use]
    pub fn from_fix(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Buy),
            "2" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}
