//! Error types for the FIX engine

use thiserror::Error;

/// Engine-level error types
///
/// Business-rule violations (cancel/replace against an unknown or filled
/// order) are not represented here; they travel back to the counterparty as
/// Order Cancel Reject messages instead.
#[derive(Error, Debug)]
pub enum FixError {
    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A required field was absent from an inbound message
    #[error("missing required field: tag {tag}")]
    MissingField {
        /// The FIX tag that was expected
        tag: u32,
    },

    /// A field was present but its value could not be interpreted
    #[error("invalid value for tag {tag}: {value:?}")]
    InvalidField {
        /// The FIX tag carrying the bad value
        tag: u32,
        /// The offending value as received
        value: String,
    },

    /// A frame failed strict structural validation
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// What the validator objected to
        reason: String,
    },

    /// Declared checksum does not match the computed one
    #[error("checksum mismatch: declared {declared:?}, computed {computed:?}")]
    ChecksumMismatch {
        /// The value carried in tag 10
        declared: String,
        /// The checksum computed over the frame
        computed: String,
    },

    /// Declared body length does not match the actual body
    #[error("body length mismatch: declared {declared}, actual {actual}")]
    BodyLengthMismatch {
        /// The value carried in tag 9
        declared: usize,
        /// The measured body length in bytes
        actual: usize,
    },

    /// An operation required an established session
    #[error("session not logged on")]
    NotLoggedOn,

    /// An operation referenced an order this side does not know
    #[error("unknown order: {cl_ord_id}")]
    UnknownOrder {
        /// The client order id that failed to resolve
        cl_ord_id: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Type alias for engine results
pub type FixResult<T> = Result<T, FixError>;
