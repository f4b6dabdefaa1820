//! Order entity and its execution state machine
//!
//! The server owns the authoritative lifecycle; the client mirrors it from
//! execution reports. Transitions are guarded here so that concurrent fill
//! simulators, cancel handlers and replace handlers can never overfill an
//! order or resurrect a terminal one.

use fix_common::{Px, Qty, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status (tag 39 resting state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted locally, not yet acknowledged
    Pending,
    /// Acknowledged, no fills yet
    New,
    /// Some quantity filled
    PartiallyFilled,
    /// Fully filled (terminal)
    Filled,
    /// Canceled (terminal)
    Canceled,
    /// Rejected (terminal)
    Rejected,
}

impl OrderStatus {
    /// FIX tag 39 code; Pending reports as New, which the ack upgrade makes
    /// unobservable on the wire
    #[must_use]
    pub const fn as_fix(&self) -> &'static str {
        match self {
            Self::Pending | Self::New => "0",
            Self::PartiallyFilled => "1",
            Self::Filled => "2",
            Self::Canceled => "4",
            Self::Rejected => "8",
        }
    }

    /// Parse a FIX tag 39 code
    #[must_use]
    pub fn from_fix(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::New),
            "1" => Some(Self::PartiallyFilled),
            "2" => Some(Self::Filled),
            "4" => Some(Self::Canceled),
            "8" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// True for states that admit no further transitions
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{name}")
    }
}

/// Execution report event kind (tag 150)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecType {
    /// Order acknowledged
    New,
    /// Part of the quantity traded
    PartialFill,
    /// Remaining quantity traded
    Fill,
    /// Order canceled
    Canceled,
    /// Order quantity/price replaced
    Replaced,
    /// Order rejected
    Rejected,
    /// Status snapshot, no state change
    OrderStatus,
}

impl ExecType {
    /// FIX tag 150 code
    #[must_use]
    pub const fn as_fix(&self) -> &'static str {
        match self {
            Self::New => "0",
            Self::PartialFill => "1",
            Self::Fill => "2",
            Self::Canceled => "4",
            Self::Replaced => "5",
            Self::Rejected => "8",
            Self::OrderStatus => "I",
        }
    }

    /// Parse a FIX tag 150 code
    #[must_use]
    pub fn from_fix(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::New),
            "1" => Some(Self::PartialFill),
            "2" => Some(Self::Fill),
            "4" => Some(Self::Canceled),
            "5" => Some(Self::Replaced),
            "8" => Some(Self::Rejected),
            "I" => Some(Self::OrderStatus),
            _ => None,
        }
    }
}

/// Order type (tag 40)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdType {
    /// Execute at any price
    Market,
    /// Execute at the limit price or better
    Limit,
}

impl OrdType {
    /// FIX tag 40 code
    #[must_use]
    pub const fn as_fix(&self) -> &'static str {
        match self {
            Self::Market => "1",
            Self::Limit => "2",
        }
    }

    /// Parse a FIX tag 40 code
    #[must_use]
    pub fn from_fix(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Market),
            "2" => Some(Self::Limit),
            _ => None,
        }
    }
}

/// One trading instruction and its mutable execution state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Broker-assigned order id (tag 37)
    pub order_id: String,
    /// Client-assigned order id (tag 11), the primary lookup key
    pub cl_ord_id: String,
    /// Instrument symbol (tag 55)
    pub symbol: String,
    /// Buy or sell (tag 54)
    pub side: Side,
    /// Market or limit (tag 40)
    pub ord_type: OrdType,
    /// Ordered quantity (tag 38)
    pub quantity: Qty,
    /// Limit price (tag 44); market orders carry none
    pub price: Option<Px>,
    /// Cumulative filled quantity (tag 14)
    pub filled_qty: Qty,
    /// Current resting state (tag 39)
    pub status: OrderStatus,
}

impl Order {
    /// Create a freshly submitted order in Pending state
    #[must_use]
    pub fn new(
        order_id: impl Into<String>,
        cl_ord_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        ord_type: OrdType,
        quantity: Qty,
        price: Option<Px>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            cl_ord_id: cl_ord_id.into(),
            symbol: symbol.into(),
            side,
            ord_type,
            quantity,
            price,
            filled_qty: Qty::ZERO,
            status: OrderStatus::Pending,
        }
    }

    /// Quantity still open (tag 151)
    #[must_use]
    pub fn leaves_qty(&self) -> Qty {
        match self.status {
            OrderStatus::Canceled | OrderStatus::Rejected => Qty::ZERO,
            _ => self.quantity.saturating_sub(self.filled_qty),
        }
    }

    /// True once no further transitions are possible
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Acknowledge the order (Pending -> New). No-op in any other state.
    pub fn acknowledge(&mut self) -> bool {
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::New;
            return true;
        }
        false
    }

    /// Apply a partial fill of `qty` units
    ///
    /// Only permitted from New, with a nonzero quantity that keeps the
    /// cumulative fill strictly below the ordered quantity. Returns whether
    /// the fill was applied.
    pub fn apply_partial_fill(&mut self, qty: Qty) -> bool {
        if self.status != OrderStatus::New {
            return false;
        }
        let cum = self.filled_qty.add(qty);
        if qty.is_zero() || cum >= self.quantity {
            return false;
        }
        self.filled_qty = cum;
        self.status = OrderStatus::PartiallyFilled;
        true
    }

    /// Fill the remaining quantity
    ///
    /// Only permitted from New or PartiallyFilled. Returns the quantity
    /// traded by this fill, or `None` when the transition is not allowed.
    pub fn apply_full_fill(&mut self) -> Option<Qty> {
        if !matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled) {
            return None;
        }
        let last = self.quantity.saturating_sub(self.filled_qty);
        self.filled_qty = self.quantity;
        self.status = OrderStatus::Filled;
        Some(last)
    }

    /// Cancel the order; absorbing for everything but Filled
    ///
    /// Returns whether the order is now Canceled (a second cancel of an
    /// already-Canceled order reports true, matching the absorbing rule).
    pub fn cancel(&mut self) -> bool {
        match self.status {
            OrderStatus::Filled => false,
            OrderStatus::Canceled => true,
            _ => {
                self.status = OrderStatus::Canceled;
                true
            }
        }
    }

    /// Overwrite quantity/price for a cancel/replace, retaining fills
    ///
    /// The order is re-identified by the new client order id; a partially
    /// filled order keeps its PartiallyFilled state (status never moves
    /// backwards), everything earlier resets to New.
    pub fn replace(&mut self, new_cl_ord_id: impl Into<String>, quantity: Option<Qty>, price: Option<Px>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.cl_ord_id = new_cl_ord_id.into();
        if let Some(qty) = quantity {
            self.quantity = qty;
        }
        if let Some(px) = price {
            self.price = Some(px);
        }
        if self.status != OrderStatus::PartiallyFilled {
            self.status = OrderStatus::New;
        }
        true
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let px = self.price.map_or_else(|| "MKT".to_string(), |p| p.to_string());
        write!(
            f,
            "{}: {} {} {} @ {} [{}] filled {}",
            self.cl_ord_id, self.side, self.quantity, self.symbol, px, self.status, self.filled_qty
        )
    }
}
