//! Wire-level FIX codec
//!
//! Encoding produces a complete self-framed message: the `8=`/`9=` envelope,
//! the body fields in insertion order, and the `10=` checksum trailer.
//! Decoding is deliberately lenient (segments that fail to parse are
//! dropped, checksum and body length are not checked) to match the session
//! layer's "a message without tag 35 is a no-op" rule; [`verify_frame`] is
//! the separate strict validator for callers that want it.

use crate::error::{FixError, FixResult};
use crate::message::{FixMessage, tag};

/// The FIX field delimiter (SOH). Never legal inside a field value.
pub const SOH: u8 = 0x01;

/// Serialize a message into a framed byte sequence
///
/// Injects tag 34 (MsgSeqNum) and tag 52 (SendingTime), serializes every
/// field except the structural 8/9/10 in insertion order, then wraps the
/// body in the length envelope and checksum trailer. Values containing the
/// delimiter byte are a caller contract violation and are not checked here.
#[must_use]
pub fn encode(mut msg: FixMessage, seq: u64, sending_time: &str, begin_string: &str) -> Vec<u8> {
    msg.set(tag::MSG_SEQ_NUM, seq.to_string());
    msg.set(tag::SENDING_TIME, sending_time);

    let mut body = Vec::with_capacity(128);
    for (t, v) in msg.fields() {
        if matches!(t, tag::BEGIN_STRING | tag::BODY_LENGTH | tag::CHECK_SUM) {
            continue;
        }
        body.extend_from_slice(t.to_string().as_bytes());
        body.push(b'=');
        body.extend_from_slice(v.as_bytes());
        body.push(SOH);
    }

    let mut frame = Vec::with_capacity(body.len() + 32);
    frame.extend_from_slice(format!("8={begin_string}\x019={}\x01", body.len()).as_bytes());
    frame.extend_from_slice(&body);
    frame.extend_from_slice(format!("10={:03}\x01", checksum(&frame)).as_bytes());
    frame
}

/// Parse a raw frame back into a field set
///
/// Splits on the delimiter and keeps every segment whose tag parses as a
/// non-negative integer; everything else is dropped silently. Structural
/// tags 8/9/10 are retained. A frame without tag 35 yields a message whose
/// type is the empty string, which no dispatcher matches.
#[must_use]
pub fn decode(bytes: &[u8]) -> FixMessage {
    let text = String::from_utf8_lossy(bytes);

    let mut msg_type = "";
    for segment in text.split('\x01') {
        if let Some(value) = segment.strip_prefix("35=") {
            msg_type = value;
            break;
        }
    }

    let mut msg = FixMessage::new(msg_type);
    for segment in text.split('\x01') {
        let Some((t, v)) = segment.split_once('=') else {
            continue;
        };
        let Ok(t) = t.parse::<u32>() else {
            continue;
        };
        msg.set(t, v);
    }
    msg
}

/// Strictly validate a frame's structure, body length and checksum
///
/// Never called by the lenient decode path; exposed for callers and tests
/// that want wire-level integrity checks.
pub fn verify_frame(frame: &[u8]) -> FixResult<()> {
    if frame.last() != Some(&SOH) {
        return Err(FixError::MalformedFrame {
            reason: "frame does not end with the field delimiter".to_string(),
        });
    }

    let without_final = &frame[..frame.len() - 1];
    let trailer_start = without_final
        .iter()
        .rposition(|&b| b == SOH)
        .map_or(0, |p| p + 1);
    let trailer = String::from_utf8_lossy(&frame[trailer_start..frame.len() - 1]);
    let Some(declared) = trailer.strip_prefix("10=") else {
        return Err(FixError::MalformedFrame {
            reason: "missing checksum trailer".to_string(),
        });
    };
    if declared.len() != 3 || !declared.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FixError::MalformedFrame {
            reason: format!("checksum value {declared:?} is not 3 digits"),
        });
    }
    let computed = format!("{:03}", checksum(&frame[..trailer_start]));
    if computed != declared {
        return Err(FixError::ChecksumMismatch {
            declared: declared.to_string(),
            computed,
        });
    }

    let header_err = || FixError::MalformedFrame {
        reason: "missing 8=/9= envelope".to_string(),
    };
    let first_soh = frame
        .iter()
        .position(|&b| b == SOH)
        .ok_or_else(header_err)?;
    let second_soh = frame[first_soh + 1..]
        .iter()
        .position(|&b| b == SOH)
        .map(|p| first_soh + 1 + p)
        .ok_or_else(header_err)?;
    let length_field = String::from_utf8_lossy(&frame[first_soh + 1..second_soh]);
    let declared_len: usize = length_field
        .strip_prefix("9=")
        .and_then(|v| v.parse().ok())
        .ok_or_else(header_err)?;
    let actual_len = trailer_start.checked_sub(second_soh + 1).ok_or_else(header_err)?;
    if declared_len != actual_len {
        return Err(FixError::BodyLengthMismatch {
            declared: declared_len,
            actual: actual_len,
        });
    }
    Ok(())
}

/// Accumulates stream bytes and splits them into complete frames
///
/// A frame is complete once its `10=…<SOH>` checksum trailer has arrived.
/// The trailer is only recognised at a field boundary (start of buffer or
/// right after a delimiter) so tags like 110 cannot terminate a frame
/// early, and back-to-back frames in one read split correctly.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Remove and return the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let n = self.buf.len();
        let mut i = 0;
        while i + 3 <= n {
            let at_boundary = i == 0 || self.buf[i - 1] == SOH;
            if at_boundary && self.buf[i..].starts_with(b"10=") {
                let rel = self.buf[i + 3..].iter().position(|&b| b == SOH)?;
                let end = i + 3 + rel + 1;
                return Some(self.buf.drain(..end).collect());
            }
            i += 1;
        }
        None
    }

    /// Bytes currently buffered
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Render a frame for logs with the delimiter shown as `|`
#[must_use]
pub fn printable(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|&b| if b == SOH { '|' } else { b as char })
        .collect()
}

fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().map(|&b| u32::from(b)).sum::<u32>() % 256
}
