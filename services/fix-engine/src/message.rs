//! FIX message representation
//!
//! A [`FixMessage`] is an insertion-ordered set of `tag=value` fields. Order
//! matters on the wire: tag 35 (MsgType) is always the first field of the
//! body, so fields are stored in a `Vec` rather than a hash map. Messages
//! are small (a dozen fields), which keeps the linear tag lookup cheap.
//!
//! The structural framing tags 8 (BeginString), 9 (BodyLength) and
//! 10 (CheckSum) are never set by producers; [`crate::codec::encode`]
//! computes them at serialisation time.

use fix_common::{Px, Qty, Side};

/// FIX tag numbers used by the engine
pub mod tag {
    /// BeginString
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum
    pub const CHECK_SUM: u32 = 10;
    /// ClOrdID
    pub const CL_ORD_ID: u32 = 11;
    /// CumQty
    pub const CUM_QTY: u32 = 14;
    /// LastPx
    pub const LAST_PX: u32 = 31;
    /// LastQty
    pub const LAST_QTY: u32 = 32;
    /// MsgSeqNum
    pub const MSG_SEQ_NUM: u32 = 34;
    /// MsgType
    pub const MSG_TYPE: u32 = 35;
    /// OrderID
    pub const ORDER_ID: u32 = 37;
    /// OrderQty
    pub const ORDER_QTY: u32 = 38;
    /// OrdStatus
    pub const ORD_STATUS: u32 = 39;
    /// OrdType
    pub const ORD_TYPE: u32 = 40;
    /// OrigClOrdID
    pub const ORIG_CL_ORD_ID: u32 = 41;
    /// Price
    pub const PRICE: u32 = 44;
    /// SenderCompID
    pub const SENDER_COMP_ID: u32 = 49;
    /// SendingTime
    pub const SENDING_TIME: u32 = 52;
    /// Side
    pub const SIDE: u32 = 54;
    /// Symbol
    pub const SYMBOL: u32 = 55;
    /// TargetCompID
    pub const TARGET_COMP_ID: u32 = 56;
    /// Text
    pub const TEXT: u32 = 58;
    /// TimeInForce
    pub const TIME_IN_FORCE: u32 = 59;
    /// TransactTime
    pub const TRANSACT_TIME: u32 = 60;
    /// EncryptMethod
    pub const ENCRYPT_METHOD: u32 = 98;
    /// HeartBtInt
    pub const HEART_BT_INT: u32 = 108;
    /// TestReqID
    pub const TEST_REQ_ID: u32 = 112;
    /// ExecType
    pub const EXEC_TYPE: u32 = 150;
    /// LeavesQty
    pub const LEAVES_QTY: u32 = 151;
    /// CxlRejResponseTo
    pub const CXL_REJ_RESPONSE_TO: u32 = 434;
}

/// FIX message type codes (tag 35)
pub mod msg_type {
    /// Heartbeat
    pub const HEARTBEAT: &str = "0";
    /// Test Request
    pub const TEST_REQUEST: &str = "1";
    /// Logout
    pub const LOGOUT: &str = "5";
    /// Execution Report
    pub const EXECUTION_REPORT: &str = "8";
    /// Order Cancel Reject
    pub const ORDER_CANCEL_REJECT: &str = "9";
    /// Logon
    pub const LOGON: &str = "A";
    /// New Order Single
    pub const NEW_ORDER_SINGLE: &str = "D";
    /// Order Cancel Request
    pub const ORDER_CANCEL_REQUEST: &str = "F";
    /// Order Cancel/Replace Request
    pub const ORDER_CANCEL_REPLACE_REQUEST: &str = "G";
    /// Order Status Request
    pub const ORDER_STATUS_REQUEST: &str = "H";
}

/// An insertion-ordered FIX field set
///
/// Created with the message type already in place (tag 35 first); later
/// `set` calls either append or overwrite in place, preserving the original
/// field position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMessage {
    fields: Vec<(u32, String)>,
}

impl FixMessage {
    /// Create a new message of the given type (tag 35 is set first)
    #[must_use]
    pub fn new(msg_type: &str) -> Self {
        Self {
            fields: vec![(tag::MSG_TYPE, msg_type.to_string())],
        }
    }

    /// Set (or overwrite in place) a tag/value field
    ///
    /// Returns `&mut self` for method chaining.
    pub fn set(&mut self, tag: u32, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((tag, value)),
        }
        self
    }

    /// Retrieve the string value for a tag, or `None` if absent
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Parse the value of a tag as a `u64`
    #[must_use]
    pub fn get_u64(&self, tag: u32) -> Option<u64> {
        self.get(tag)?.parse().ok()
    }

    /// Parse the value of a tag as a price
    #[must_use]
    pub fn get_px(&self, tag: u32) -> Option<Px> {
        Px::from_wire(self.get(tag)?)
    }

    /// Parse the value of a tag as a quantity
    #[must_use]
    pub fn get_qty(&self, tag: u32) -> Option<Qty> {
        Qty::from_wire(self.get(tag)?)
    }

    /// Parse the value of tag 54 as a side
    #[must_use]
    pub fn get_side(&self) -> Option<Side> {
        Side::from_fix(self.get(tag::SIDE)?)
    }

    /// The message type (tag 35); empty for unparsable inbound frames
    #[must_use]
    pub fn msg_type(&self) -> &str {
        self.get(tag::MSG_TYPE).unwrap_or("")
    }

    /// Iterate fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (u32, &str)> {
        self.fields.iter().map(|(t, v)| (*t, v.as_str()))
    }

    /// Number of fields currently set
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
