//! Per-connection FIX session state
//!
//! A [`Session`] owns everything one connection needs to speak the session
//! layer: the comp-id pair stamped onto outbound messages, the logon state,
//! the inbound message counter, and the serialized writer. The outbound
//! sequence number lives *inside* the writer lock, so assigning a number
//! and writing the frame happen atomically; concurrent senders (reader
//! replies, the heartbeat timer, fill simulators) can neither interleave
//! bytes nor ever reuse a sequence number.

use crate::codec;
use crate::error::FixResult;
use crate::message::{FixMessage, msg_type, tag};
use fix_common::time::utc_timestamp;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Session liveness state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable transport
    Disconnected,
    /// Transport up, logon not yet exchanged
    Connected,
    /// Logon exchanged; application traffic may flow
    LoggedOn,
}

/// The two counterparty identifiers for a session
#[derive(Debug, Clone, Default)]
pub struct CompIds {
    /// Our id, stamped into tag 49 of outbound messages
    pub sender: String,
    /// The peer's id, stamped into tag 56
    pub target: String,
}

struct WriterInner<W> {
    writer: W,
    next_seq: u64,
}

/// Shared per-connection session handle
///
/// Generic over the write half so unit tests can drive it with an
/// in-memory duplex stream instead of a TCP socket.
pub struct Session<W> {
    begin_string: String,
    heartbeat_interval: Duration,
    comp_ids: RwLock<CompIds>,
    state: RwLock<SessionState>,
    inbound_count: AtomicU64,
    writer: Mutex<WriterInner<W>>,
}

impl<W: AsyncWrite + Unpin + Send> Session<W> {
    /// Create a session over an established transport (state Connected)
    pub fn new(
        writer: W,
        begin_string: impl Into<String>,
        comp_ids: CompIds,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            heartbeat_interval,
            comp_ids: RwLock::new(comp_ids),
            state: RwLock::new(SessionState::Connected),
            inbound_count: AtomicU64::new(0),
            writer: Mutex::new(WriterInner {
                writer,
                next_seq: 1,
            }),
        }
    }

    /// Current liveness state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Transition the liveness state
    pub fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// True while the session is logged on
    pub fn is_logged_on(&self) -> bool {
        self.state() == SessionState::LoggedOn
    }

    /// Configured heartbeat interval
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Learn comp ids from the first inbound message when not configured
    ///
    /// Our own id is the peer's TargetCompID, theirs is the SenderCompID.
    pub fn learn_comp_ids(&self, msg: &FixMessage) {
        let mut ids = self.comp_ids.write();
        if ids.sender.is_empty()
            && let Some(own) = msg.get(tag::TARGET_COMP_ID)
            && let Some(peer) = msg.get(tag::SENDER_COMP_ID)
        {
            ids.sender = own.to_string();
            ids.target = peer.to_string();
            debug!(sender = %ids.sender, target = %ids.target, "learned session comp ids");
        }
    }

    /// Snapshot of the comp-id pair
    pub fn comp_ids(&self) -> CompIds {
        self.comp_ids.read().clone()
    }

    /// Count an inbound message and return its position in the stream
    ///
    /// Every inbound frame increments the counter by one, parsable or not.
    /// Declared sequence numbers are logged but never reconciled (no
    /// gap-detection/resend protocol).
    pub fn record_inbound(&self, msg: &FixMessage) -> u64 {
        let count = self.inbound_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(declared) = msg.get_u64(tag::MSG_SEQ_NUM)
            && declared != count
        {
            trace!(declared, counted = count, "inbound sequence differs from local count");
        }
        count
    }

    /// Messages received so far
    pub fn inbound_count(&self) -> u64 {
        self.inbound_count.load(Ordering::SeqCst)
    }

    /// Stamp, sequence, encode and write one message
    ///
    /// Returns the sequence number the message was sent under. The number
    /// is assigned under the same lock that performs the write, so two
    /// concurrent sends can never swap or share numbers.
    pub async fn send(&self, mut msg: FixMessage) -> FixResult<u64> {
        {
            let ids = self.comp_ids.read();
            msg.set(tag::SENDER_COMP_ID, ids.sender.clone());
            msg.set(tag::TARGET_COMP_ID, ids.target.clone());
        }

        let mut inner = self.writer.lock().await;
        let seq = inner.next_seq;
        let frame = codec::encode(msg, seq, &utc_timestamp(), &self.begin_string);
        inner.writer.write_all(&frame).await?;
        inner.writer.flush().await?;
        inner.next_seq += 1;
        debug!(seq, frame = %codec::printable(&frame), "sent");
        Ok(seq)
    }

    /// Send a Logon carrying EncryptMethod none and our heartbeat interval
    pub async fn send_logon(&self) -> FixResult<u64> {
        let mut logon = FixMessage::new(msg_type::LOGON);
        logon
            .set(tag::ENCRYPT_METHOD, "0")
            .set(tag::HEART_BT_INT, self.heartbeat_interval.as_secs().to_string());
        self.send(logon).await
    }

    /// Send a Heartbeat, echoing a TestReqID when answering a Test Request
    pub async fn send_heartbeat(&self, test_req_id: Option<&str>) -> FixResult<u64> {
        let mut heartbeat = FixMessage::new(msg_type::HEARTBEAT);
        if let Some(id) = test_req_id {
            heartbeat.set(tag::TEST_REQ_ID, id);
        }
        self.send(heartbeat).await
    }

    /// Send a Test Request with the given id
    pub async fn send_test_request(&self, test_req_id: &str) -> FixResult<u64> {
        let mut req = FixMessage::new(msg_type::TEST_REQUEST);
        req.set(tag::TEST_REQ_ID, test_req_id);
        self.send(req).await
    }

    /// Send a Logout
    pub async fn send_logout(&self) -> FixResult<u64> {
        self.send(FixMessage::new(msg_type::LOGOUT)).await
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> Session<W> {
    /// Spawn the periodic heartbeat task for this session
    ///
    /// Every interval, while logged on, emits a Heartbeat through the same
    /// serialized writer as everything else. Ends when the session
    /// disconnects or the transport fails.
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session.heartbeat_interval);
            // the first tick completes immediately; heartbeats start one
            // full interval after logon
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match session.state() {
                    SessionState::Disconnected => break,
                    SessionState::Connected => {}
                    SessionState::LoggedOn => {
                        if let Err(e) = session.send_heartbeat(None).await {
                            warn!(error = %e, "heartbeat send failed, stopping timer");
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl<W> std::fmt::Debug for Session<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("begin_string", &self.begin_string)
            .field("state", &*self.state.read())
            .field("inbound_count", &self.inbound_count)
            .finish_non_exhaustive()
    }
}
