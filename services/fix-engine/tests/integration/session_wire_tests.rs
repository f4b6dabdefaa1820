//! Wire-level session exchanges against a live acceptor
//!
//! Drives the server with hand-encoded frames over a raw TCP stream, so the
//! exact bytes of the session handshake, heartbeat echo and reject replies
//! can be asserted.

use crate::common::{TEST_TS, fast_server_config, start_server};
use crate::init_test_logging;
use fix_engine::codec::{self, FrameBuffer};
use fix_engine::message::{FixMessage, msg_type, tag};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Minimal hand-rolled initiator speaking raw frames
struct WireClient {
    stream: TcpStream,
    frames: FrameBuffer,
    next_seq: u64,
}

impl WireClient {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.expect("connect"),
            frames: FrameBuffer::new(),
            next_seq: 1,
        }
    }

    async fn send(&mut self, mut msg: FixMessage) {
        msg.set(tag::SENDER_COMP_ID, "WIRE_CLIENT")
            .set(tag::TARGET_COMP_ID, "WIRE_SERVER");
        let frame = codec::encode(msg, self.next_seq, TEST_TS, "FIX.4.4");
        self.next_seq += 1;
        self.stream.write_all(&frame).await.expect("write frame");
    }

    async fn recv(&mut self) -> FixMessage {
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            loop {
                if let Some(frame) = self.frames.next_frame() {
                    codec::verify_frame(&frame).expect("server frame is well-formed");
                    return codec::decode(&frame);
                }
                let mut chunk = [0u8; 4096];
                let n = self.stream.read(&mut chunk).await.expect("read");
                assert!(n > 0, "server closed the connection");
                self.frames.extend(&chunk[..n]);
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    async fn logon(&mut self) {
        let mut logon = FixMessage::new(msg_type::LOGON);
        logon
            .set(tag::ENCRYPT_METHOD, "0")
            .set(tag::HEART_BT_INT, "30");
        self.send(logon).await;
        let reply = self.recv().await;
        assert_eq!(reply.msg_type(), msg_type::LOGON);
    }
}

#[tokio::test]
async fn logon_reply_learns_comp_ids_and_carries_heartbeat_interval() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;

    let mut logon = FixMessage::new(msg_type::LOGON);
    logon
        .set(tag::ENCRYPT_METHOD, "0")
        .set(tag::HEART_BT_INT, "30");
    wire.send(logon).await;

    let reply = wire.recv().await;
    assert_eq!(reply.msg_type(), msg_type::LOGON);
    // the acceptor learned its ids from our message and swapped them
    assert_eq!(reply.get(tag::SENDER_COMP_ID), Some("WIRE_SERVER"));
    assert_eq!(reply.get(tag::TARGET_COMP_ID), Some("WIRE_CLIENT"));
    assert_eq!(reply.get(tag::ENCRYPT_METHOD), Some("0"));
    assert_eq!(reply.get(tag::HEART_BT_INT), Some("5"));
    assert_eq!(reply.get_u64(tag::MSG_SEQ_NUM), Some(1));
}

#[tokio::test]
async fn test_request_is_answered_with_matching_heartbeat() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    let mut req = FixMessage::new(msg_type::TEST_REQUEST);
    req.set(tag::TEST_REQ_ID, "PING-7");
    wire.send(req).await;

    let reply = wire.recv().await;
    assert_eq!(reply.msg_type(), msg_type::HEARTBEAT);
    assert_eq!(reply.get(tag::TEST_REQ_ID), Some("PING-7"));
    assert_eq!(reply.get_u64(tag::MSG_SEQ_NUM), Some(2));
}

#[tokio::test]
async fn tiny_order_skips_the_partial_fill_step() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    let mut order = FixMessage::new(msg_type::NEW_ORDER_SINGLE);
    order
        .set(tag::CL_ORD_ID, "W1")
        .set(tag::SYMBOL, "IBM")
        .set(tag::SIDE, "1")
        .set(tag::ORDER_QTY, "1")
        .set(tag::ORD_TYPE, "2")
        .set(tag::PRICE, "120.00")
        .set(tag::TIME_IN_FORCE, "0")
        .set(tag::TRANSACT_TIME, TEST_TS);
    wire.send(order).await;

    let ack = wire.recv().await;
    assert_eq!(ack.msg_type(), msg_type::EXECUTION_REPORT);
    assert_eq!(ack.get(tag::EXEC_TYPE), Some("0"));
    assert_eq!(ack.get(tag::ORD_STATUS), Some("0"));
    assert_eq!(ack.get(tag::CUM_QTY), Some("0"));
    assert_eq!(ack.get(tag::LEAVES_QTY), Some("1"));
    assert!(ack.get(tag::ORDER_ID).is_some_and(|id| id.starts_with("EXE-")));

    // half of 1 rounds to zero, so the very next report is the full fill
    let fill = wire.recv().await;
    assert_eq!(fill.msg_type(), msg_type::EXECUTION_REPORT);
    assert_eq!(fill.get(tag::EXEC_TYPE), Some("2"));
    assert_eq!(fill.get(tag::ORD_STATUS), Some("2"));
    assert_eq!(fill.get(tag::CUM_QTY), Some("1"));
    assert_eq!(fill.get(tag::LAST_QTY), Some("1"));
    assert_eq!(fill.get(tag::LAST_PX), Some("120.00"));
}

#[tokio::test]
async fn status_snapshot_and_reject_after_fill() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    let mut order = FixMessage::new(msg_type::NEW_ORDER_SINGLE);
    order
        .set(tag::CL_ORD_ID, "W2")
        .set(tag::SYMBOL, "IBM")
        .set(tag::SIDE, "2")
        .set(tag::ORDER_QTY, "1")
        .set(tag::ORD_TYPE, "2")
        .set(tag::PRICE, "95.50")
        .set(tag::TRANSACT_TIME, TEST_TS);
    wire.send(order).await;

    // drain reports until the fill lands
    loop {
        let report = wire.recv().await;
        if report.get(tag::EXEC_TYPE) == Some("2") {
            break;
        }
    }

    // snapshot request: ExecType I, state unchanged
    let mut status_req = FixMessage::new(msg_type::ORDER_STATUS_REQUEST);
    status_req.set(tag::CL_ORD_ID, "W2");
    wire.send(status_req).await;
    let snapshot = wire.recv().await;
    assert_eq!(snapshot.msg_type(), msg_type::EXECUTION_REPORT);
    assert_eq!(snapshot.get(tag::EXEC_TYPE), Some("I"));
    assert_eq!(snapshot.get(tag::ORD_STATUS), Some("2"));
    assert_eq!(snapshot.get(tag::CUM_QTY), Some("1"));
    assert_eq!(snapshot.get(tag::LEAVES_QTY), Some("0"));

    // canceling the filled order earns a reject, not a report
    let mut cancel = FixMessage::new(msg_type::ORDER_CANCEL_REQUEST);
    cancel
        .set(tag::ORIG_CL_ORD_ID, "W2")
        .set(tag::CL_ORD_ID, "CXL-W2");
    wire.send(cancel).await;
    let reject = wire.recv().await;
    assert_eq!(reject.msg_type(), msg_type::ORDER_CANCEL_REJECT);
    assert_eq!(reject.get(tag::ORIG_CL_ORD_ID), Some("W2"));
    assert_eq!(reject.get(tag::CL_ORD_ID), Some("CXL-W2"));
    assert_eq!(reject.get(tag::ORD_STATUS), Some("2"));
    assert_eq!(reject.get(tag::CXL_REJ_RESPONSE_TO), Some("1"));
    assert!(reject.get(tag::TEXT).is_some_and(|t| t.contains("already filled")));
}

#[tokio::test]
async fn unknown_status_request_is_ignored_not_answered() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    let mut status_req = FixMessage::new(msg_type::ORDER_STATUS_REQUEST);
    status_req.set(tag::CL_ORD_ID, "GHOST");
    wire.send(status_req).await;

    // the next reply must be the answer to this probe, not to the status
    // request, proving the unknown id produced no frame at all
    let mut probe = FixMessage::new(msg_type::TEST_REQUEST);
    probe.set(tag::TEST_REQ_ID, "STILL-ALIVE");
    wire.send(probe).await;

    let reply = wire.recv().await;
    assert_eq!(reply.msg_type(), msg_type::HEARTBEAT);
    assert_eq!(reply.get(tag::TEST_REQ_ID), Some("STILL-ALIVE"));
}

#[tokio::test]
async fn order_without_required_fields_is_dropped_not_fatal() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    // New Order Single with no OrderQty: the handler fails, the failure is
    // logged, and the session keeps going
    let mut order = FixMessage::new(msg_type::NEW_ORDER_SINGLE);
    order
        .set(tag::CL_ORD_ID, "BROKEN")
        .set(tag::SYMBOL, "IBM")
        .set(tag::SIDE, "1")
        .set(tag::ORD_TYPE, "2")
        .set(tag::PRICE, "10.00");
    wire.send(order).await;

    let mut probe = FixMessage::new(msg_type::TEST_REQUEST);
    probe.set(tag::TEST_REQ_ID, "AFTER-BROKEN");
    wire.send(probe).await;

    let reply = wire.recv().await;
    assert_eq!(reply.msg_type(), msg_type::HEARTBEAT);
    assert_eq!(reply.get(tag::TEST_REQ_ID), Some("AFTER-BROKEN"));
}

#[tokio::test]
async fn logout_is_answered_with_logout() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    wire.send(FixMessage::new(msg_type::LOGOUT)).await;
    let reply = wire.recv().await;
    assert_eq!(reply.msg_type(), msg_type::LOGOUT);
}

#[tokio::test]
async fn malformed_frame_does_not_kill_the_session() {
    init_test_logging();
    let (_server, addr) = start_server(fast_server_config()).await;
    let mut wire = WireClient::connect(addr).await;
    wire.logon().await;

    // a frame whose body is garbage still ends with a 10= trailer, so the
    // framer yields it; the decoder drops every segment and the session
    // treats it as a no-op
    wire.stream
        .write_all(b"not a fix message\x0110=000\x01")
        .await
        .unwrap();

    let mut probe = FixMessage::new(msg_type::TEST_REQUEST);
    probe.set(tag::TEST_REQ_ID, "AFTER-GARBAGE");
    wire.send(probe).await;

    let reply = wire.recv().await;
    assert_eq!(reply.msg_type(), msg_type::HEARTBEAT);
    assert_eq!(reply.get(tag::TEST_REQ_ID), Some("AFTER-GARBAGE"));
}
