//! FIX initiator engine
//!
//! Connects once, runs one session, and exposes the order-entry surface:
//! new order, cancel, cancel/replace, status request. The client keeps its
//! own private registry of the orders it originated and mirrors their state
//! from inbound execution reports; it never owns the authoritative
//! lifecycle.

use crate::codec::{self, FrameBuffer};
use crate::config::ClientConfig;
use crate::error::{FixError, FixResult};
use crate::message::{FixMessage, msg_type, tag};
use crate::order::{ExecType, OrdType, Order, OrderStatus};
use crate::session::{CompIds, Session, SessionState};
use fix_common::time::utc_timestamp;
use fix_common::{Px, Qty, Side};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type ClientSession = Session<OwnedWriteHalf>;
type OrderMap = Arc<RwLock<FxHashMap<String, Order>>>;
type RejectLog = Arc<RwLock<Vec<CancelReject>>>;

/// A received Order Cancel Reject, kept for inspection
#[derive(Debug, Clone)]
pub struct CancelReject {
    /// ClOrdID of the cancel/replace request that was refused
    pub cl_ord_id: String,
    /// ClOrdID of the order the request referenced
    pub orig_cl_ord_id: String,
    /// What was refused: "1" cancel, "2" cancel/replace
    pub response_to: Option<String>,
    /// The server's explanation
    pub text: String,
}

/// The FIX initiator
pub struct FixClient {
    session: Arc<ClientSession>,
    orders: OrderMap,
    cancel_rejects: RejectLog,
    logon_rx: watch::Receiver<bool>,
    next_req_id: AtomicU64,
    reader: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl FixClient {
    /// Connect to the configured acceptor and send the Logon
    ///
    /// Returns as soon as the transport is up and the Logon is on the wire;
    /// use [`wait_for_logon`](Self::wait_for_logon) to block until the
    /// counterpart's Logon completes the handshake.
    pub async fn connect(config: ClientConfig) -> FixResult<Self> {
        info!(host = %config.host, port = config.port, "connecting to FIX server");
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        let (read_half, write_half) = stream.into_split();

        let session = Arc::new(Session::new(
            write_half,
            config.begin_string.clone(),
            CompIds {
                sender: config.sender_comp_id.clone(),
                target: config.target_comp_id.clone(),
            },
            config.heartbeat_interval(),
        ));
        let orders: OrderMap = Arc::new(RwLock::new(FxHashMap::default()));
        let cancel_rejects: RejectLog = Arc::new(RwLock::new(Vec::new()));
        let (logon_tx, logon_rx) = watch::channel(false);

        session.send_logon().await?;
        let reader = tokio::spawn(read_loop(
            read_half,
            Arc::clone(&session),
            Arc::clone(&orders),
            Arc::clone(&cancel_rejects),
            logon_tx,
        ));
        let heartbeat = session.spawn_heartbeat();

        Ok(Self {
            session,
            orders,
            cancel_rejects,
            logon_rx,
            next_req_id: AtomicU64::new(1),
            reader,
            heartbeat,
        })
    }

    /// Block until the session is logged on, or fail after `timeout`
    pub async fn wait_for_logon(&self, timeout: Duration) -> FixResult<()> {
        let mut rx = self.logon_rx.clone();
        let wait = async move {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| FixError::NotLoggedOn)?;
        if self.session.is_logged_on() {
            Ok(())
        } else {
            Err(FixError::NotLoggedOn)
        }
    }

    /// True while the session is logged on
    #[must_use]
    pub fn is_logged_on(&self) -> bool {
        self.session.is_logged_on()
    }

    /// Submit a New Order Single
    ///
    /// The order is registered locally in Pending state before the send, so
    /// an execution report racing the send's return still finds it.
    pub async fn send_new_order_single(
        &self,
        cl_ord_id: &str,
        symbol: &str,
        side: Side,
        ord_type: OrdType,
        quantity: Qty,
        price: Option<Px>,
    ) -> FixResult<u64> {
        if !self.is_logged_on() {
            return Err(FixError::NotLoggedOn);
        }

        let order = Order::new("", cl_ord_id, symbol, side, ord_type, quantity, price);
        self.orders.write().insert(cl_ord_id.to_string(), order);

        let mut msg = FixMessage::new(msg_type::NEW_ORDER_SINGLE);
        msg.set(tag::CL_ORD_ID, cl_ord_id)
            .set(tag::SYMBOL, symbol)
            .set(tag::SIDE, side.as_fix())
            .set(tag::ORDER_QTY, quantity.to_string())
            .set(tag::ORD_TYPE, ord_type.as_fix());
        if let Some(px) = price {
            msg.set(tag::PRICE, px.to_wire());
        }
        msg.set(tag::TIME_IN_FORCE, "0")
            .set(tag::TRANSACT_TIME, utc_timestamp());

        let seq = self.session.send(msg).await?;
        info!(cl_ord_id, symbol, %side, %quantity, "order sent");
        Ok(seq)
    }

    /// Request cancellation of an earlier order
    ///
    /// Returns the ClOrdID assigned to the cancel request itself. Unknown
    /// local ids are still sent (the server answers them with a Cancel
    /// Reject), just without the symbol/side fields only the registry knows.
    pub async fn send_order_cancel_request(&self, orig_cl_ord_id: &str) -> FixResult<String> {
        if !self.is_logged_on() {
            return Err(FixError::NotLoggedOn);
        }

        let cancel_id = format!("CXL-{}", self.next_req_id.fetch_add(1, Ordering::SeqCst));
        let mut msg = FixMessage::new(msg_type::ORDER_CANCEL_REQUEST);
        msg.set(tag::ORIG_CL_ORD_ID, orig_cl_ord_id)
            .set(tag::CL_ORD_ID, cancel_id.clone());
        match self.order(orig_cl_ord_id) {
            Some(order) => {
                msg.set(tag::SYMBOL, order.symbol)
                    .set(tag::SIDE, order.side.as_fix());
            }
            None => debug!(cl_ord_id = orig_cl_ord_id, "cancel request for order not tracked locally"),
        }
        msg.set(tag::TRANSACT_TIME, utc_timestamp());

        self.session.send(msg).await?;
        info!(cl_ord_id = orig_cl_ord_id, cancel_id = %cancel_id, "cancel request sent");
        Ok(cancel_id)
    }

    /// Request a quantity/price change for an earlier order
    ///
    /// Returns the replacement ClOrdID. The local registry entry is re-keyed
    /// to the new id immediately so the Replaced report (which carries the
    /// new id) finds it.
    pub async fn send_order_cancel_replace_request(
        &self,
        orig_cl_ord_id: &str,
        new_quantity: Option<Qty>,
        new_price: Option<Px>,
    ) -> FixResult<String> {
        if !self.is_logged_on() {
            return Err(FixError::NotLoggedOn);
        }

        let replace_id = format!("RPL-{}", self.next_req_id.fetch_add(1, Ordering::SeqCst));
        let mut msg = FixMessage::new(msg_type::ORDER_CANCEL_REPLACE_REQUEST);
        msg.set(tag::ORIG_CL_ORD_ID, orig_cl_ord_id)
            .set(tag::CL_ORD_ID, replace_id.clone());
        if let Some(qty) = new_quantity {
            msg.set(tag::ORDER_QTY, qty.to_string());
        }
        if let Some(px) = new_price {
            msg.set(tag::PRICE, px.to_wire());
        }

        {
            let mut orders = self.orders.write();
            if let Some(mut order) = orders.remove(orig_cl_ord_id) {
                msg.set(tag::SYMBOL, order.symbol.clone())
                    .set(tag::SIDE, order.side.as_fix())
                    .set(tag::ORD_TYPE, order.ord_type.as_fix());
                order.cl_ord_id = replace_id.clone();
                if let Some(qty) = new_quantity {
                    order.quantity = qty;
                }
                if let Some(px) = new_price {
                    order.price = Some(px);
                }
                orders.insert(replace_id.clone(), order);
            } else {
                debug!(cl_ord_id = orig_cl_ord_id, "replace request for order not tracked locally");
            }
        }
        msg.set(tag::TRANSACT_TIME, utc_timestamp());

        self.session.send(msg).await?;
        info!(cl_ord_id = orig_cl_ord_id, replace_id = %replace_id, "replace request sent");
        Ok(replace_id)
    }

    /// Ask the server for a snapshot execution report of one order
    pub async fn send_order_status_request(&self, cl_ord_id: &str) -> FixResult<u64> {
        if !self.is_logged_on() {
            return Err(FixError::NotLoggedOn);
        }
        let mut msg = FixMessage::new(msg_type::ORDER_STATUS_REQUEST);
        msg.set(tag::CL_ORD_ID, cl_ord_id);
        if let Some(order) = self.order(cl_ord_id) {
            msg.set(tag::SYMBOL, order.symbol)
                .set(tag::SIDE, order.side.as_fix());
        }
        msg.set(tag::TRANSACT_TIME, utc_timestamp());
        self.session.send(msg).await
    }

    /// Send a Test Request; the server answers with a Heartbeat echoing the id
    pub async fn send_test_request(&self, test_req_id: &str) -> FixResult<u64> {
        self.session.send_test_request(test_req_id).await
    }

    /// Snapshot of one locally tracked order
    #[must_use]
    pub fn order(&self, cl_ord_id: &str) -> Option<Order> {
        self.orders.read().get(cl_ord_id).cloned()
    }

    /// Snapshot of every locally tracked order
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.orders.read().values().cloned().collect()
    }

    /// Cancel Rejects received so far, oldest first
    #[must_use]
    pub fn cancel_rejects(&self) -> Vec<CancelReject> {
        self.cancel_rejects.read().clone()
    }

    /// Messages received from the server so far
    #[must_use]
    pub fn inbound_count(&self) -> u64 {
        self.session.inbound_count()
    }

    /// Log out (when logged on) and tear the session down
    pub async fn stop(self) -> FixResult<()> {
        if self.session.is_logged_on() {
            if let Err(e) = self.session.send_logout().await {
                warn!(error = %e, "logout send failed");
            }
            self.session.set_state(SessionState::Disconnected);
        }
        self.heartbeat.abort();
        self.reader.abort();
        info!("disconnected from server");
        Ok(())
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    session: Arc<ClientSession>,
    orders: OrderMap,
    cancel_rejects: RejectLog,
    logon_tx: watch::Sender<bool>,
) {
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; 4096];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                if session.state() != SessionState::Disconnected {
                    warn!(error = %e, "connection lost");
                }
                break;
            }
        };
        frames.extend(&chunk[..n]);
        while let Some(frame) = frames.next_frame() {
            debug!(frame = %codec::printable(&frame), "received");
            let msg = codec::decode(&frame);
            session.record_inbound(&msg);
            handle_message(&session, &orders, &cancel_rejects, &logon_tx, &msg).await;
        }
    }
    session.set_state(SessionState::Disconnected);
    let _ = logon_tx.send(false);
}

async fn handle_message(
    session: &Arc<ClientSession>,
    orders: &OrderMap,
    cancel_rejects: &RejectLog,
    logon_tx: &watch::Sender<bool>,
    msg: &FixMessage,
) {
    match msg.msg_type() {
        msg_type::LOGON => {
            session.set_state(SessionState::LoggedOn);
            let _ = logon_tx.send(true);
            info!("logged on to server");
        }
        msg_type::HEARTBEAT => debug!(test_req_id = msg.get(tag::TEST_REQ_ID), "heartbeat from server"),
        msg_type::TEST_REQUEST => {
            if let Err(e) = session.send_heartbeat(msg.get(tag::TEST_REQ_ID)).await {
                warn!(error = %e, "failed to answer test request");
            }
        }
        msg_type::LOGOUT => {
            session.set_state(SessionState::Disconnected);
            let _ = logon_tx.send(false);
            info!("server logged out");
        }
        msg_type::EXECUTION_REPORT => apply_execution_report(orders, msg),
        msg_type::ORDER_CANCEL_REJECT => {
            warn!(
                cl_ord_id = msg.get(tag::ORIG_CL_ORD_ID),
                reason = msg.get(tag::TEXT),
                "order cancel rejected"
            );
            cancel_rejects.write().push(CancelReject {
                cl_ord_id: msg.get(tag::CL_ORD_ID).unwrap_or_default().to_string(),
                orig_cl_ord_id: msg.get(tag::ORIG_CL_ORD_ID).unwrap_or_default().to_string(),
                response_to: msg.get(tag::CXL_REJ_RESPONSE_TO).map(str::to_string),
                text: msg.get(tag::TEXT).unwrap_or_default().to_string(),
            });
        }
        other => debug!(msg_type = other, "ignoring message"),
    }
}

/// Mirror an execution report into the private registry
///
/// Reports for orders this client never originated are ignored, not errors.
fn apply_execution_report(orders: &OrderMap, msg: &FixMessage) {
    let Some(cl_ord_id) = msg.get(tag::CL_ORD_ID) else {
        return;
    };
    let exec_type = msg.get(tag::EXEC_TYPE).and_then(ExecType::from_fix);

    let mut map = orders.write();
    let Some(order) = map.get_mut(cl_ord_id) else {
        debug!(cl_ord_id, "execution report for unknown order, ignoring");
        return;
    };

    if order.order_id.is_empty()
        && let Some(order_id) = msg.get(tag::ORDER_ID)
    {
        order.order_id = order_id.to_string();
    }
    if let Some(status) = msg.get(tag::ORD_STATUS).and_then(OrderStatus::from_fix) {
        order.status = status;
    }
    if let Some(cum) = msg.get_qty(tag::CUM_QTY) {
        order.filled_qty = cum;
    } else if let Some(last) = msg.get_qty(tag::LAST_QTY) {
        order.filled_qty = last;
    }
    if let Some(qty) = msg.get_qty(tag::ORDER_QTY) {
        order.quantity = qty;
    }
    if let Some(px) = msg.get_px(tag::PRICE) {
        order.price = Some(px);
    }

    info!(
        cl_ord_id,
        exec_type = ?exec_type,
        status = %order.status,
        filled = %order.filled_qty,
        "execution report"
    );
}
