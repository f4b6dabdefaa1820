//! FIX acceptor engine
//!
//! Accepts connections, runs one session per client, owns the single
//! authoritative order registry, and simulates the matching venue: every
//! accepted order is acknowledged, half-filled after a delay, then fully
//! filled, unless a cancel or replace gets there first.

use crate::codec::{self, FrameBuffer};
use crate::config::ServerConfig;
use crate::error::{FixError, FixResult};
use crate::message::{FixMessage, msg_type, tag};
use crate::order::{ExecType, OrdType, Order, OrderStatus};
use crate::session::{CompIds, Session, SessionState};
use dashmap::DashMap;
use fix_common::time::utc_timestamp;
use fix_common::{Px, Qty, Side};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type ServerSession = Session<OwnedWriteHalf>;

/// One registry slot: the shared order plus its cancel signal
///
/// The order lives behind its own lock so the reader task, the
/// status-request handler and the fill simulator can all touch it without
/// any cross-order coordination. The handle survives a replace re-key:
/// a simulator spawned before the replace keeps following the same order.
#[derive(Debug, Clone)]
pub struct OrderHandle {
    order: Arc<RwLock<Order>>,
    cancel: Arc<Notify>,
}

impl OrderHandle {
    fn new(order: Order) -> Self {
        Self {
            order: Arc::new(RwLock::new(order)),
            cancel: Arc::new(Notify::new()),
        }
    }

    /// Clone of the current order state
    #[must_use]
    pub fn snapshot(&self) -> Order {
        self.order.read().clone()
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut Order) -> R) -> R {
        f(&mut self.order.write())
    }

    fn signal_cancel(&self) {
        self.cancel.notify_waiters();
    }

    async fn cancelled(&self) {
        self.cancel.notified().await;
    }
}

/// Shared state handed to every connection handler
#[derive(Clone)]
struct ServerContext {
    config: Arc<ServerConfig>,
    orders: Arc<DashMap<String, OrderHandle>>,
    next_order_id: Arc<AtomicU64>,
}

impl ServerContext {
    fn next_order_id(&self) -> String {
        format!("EXE-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// The FIX acceptor
pub struct FixServer {
    config: Arc<ServerConfig>,
    listener: TcpListener,
    orders: Arc<DashMap<String, OrderHandle>>,
    next_order_id: Arc<AtomicU64>,
}

impl FixServer {
    /// Bind the configured address; the accept loop starts with [`run`](Self::run)
    pub async fn bind(config: ServerConfig) -> FixResult<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!(addr = %listener.local_addr()?, "FIX server listening");
        Ok(Self {
            config: Arc::new(config),
            listener,
            orders: Arc::new(DashMap::new()),
            next_order_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// The address the server actually bound (useful with port 0)
    pub fn local_addr(&self) -> FixResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Snapshot of one order from the authoritative registry
    #[must_use]
    pub fn order(&self, cl_ord_id: &str) -> Option<Order> {
        self.orders.get(cl_ord_id).map(|entry| entry.snapshot())
    }

    /// Number of orders currently registered
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Accept connections forever, one session task per client
    pub async fn run(&self) -> FixResult<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!(%peer, "client connected");
            let ctx = ServerContext {
                config: Arc::clone(&self.config),
                orders: Arc::clone(&self.orders),
                next_order_id: Arc::clone(&self.next_order_id),
            };
            tokio::spawn(async move {
                match handle_connection(stream, ctx).await {
                    Ok(()) => info!(%peer, "client disconnected"),
                    Err(e) => warn!(%peer, error = %e, "session ended with error"),
                }
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, ctx: ServerContext) -> FixResult<()> {
    let (read_half, write_half) = stream.into_split();
    let comp_ids = CompIds {
        sender: ctx.config.sender_comp_id.clone().unwrap_or_default(),
        target: ctx.config.target_comp_id.clone().unwrap_or_default(),
    };
    let session = Arc::new(Session::new(
        write_half,
        ctx.config.begin_string.clone(),
        comp_ids,
        ctx.config.heartbeat_interval(),
    ));

    let mut heartbeat: Option<JoinHandle<()>> = None;
    let result = read_loop(read_half, &session, &ctx, &mut heartbeat).await;

    session.set_state(SessionState::Disconnected);
    if let Some(task) = heartbeat.take() {
        task.abort();
    }
    result
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    session: &Arc<ServerSession>,
    ctx: &ServerContext,
    heartbeat: &mut Option<JoinHandle<()>>,
) -> FixResult<()> {
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        frames.extend(&chunk[..n]);
        while let Some(frame) = frames.next_frame() {
            debug!(frame = %codec::printable(&frame), "received");
            let msg = codec::decode(&frame);
            session.record_inbound(&msg);
            session.learn_comp_ids(&msg);
            // a handler failure poisons only this message, not the session
            if let Err(e) = dispatch(session, ctx, &msg, heartbeat).await {
                error!(error = %e, msg_type = msg.msg_type(), "failed to process message");
            }
        }
    }
}

async fn dispatch(
    session: &Arc<ServerSession>,
    ctx: &ServerContext,
    msg: &FixMessage,
    heartbeat: &mut Option<JoinHandle<()>>,
) -> FixResult<()> {
    match msg.msg_type() {
        msg_type::LOGON => {
            session.set_state(SessionState::LoggedOn);
            info!("client logged on");
            session.send_logon().await?;
            if heartbeat.is_none() {
                *heartbeat = Some(session.spawn_heartbeat());
            }
        }
        msg_type::HEARTBEAT => debug!("heartbeat received"),
        msg_type::TEST_REQUEST => {
            session.send_heartbeat(msg.get(tag::TEST_REQ_ID)).await?;
        }
        msg_type::LOGOUT => {
            session.send_logout().await?;
            session.set_state(SessionState::Disconnected);
            info!("client logged out");
        }
        msg_type::NEW_ORDER_SINGLE => handle_new_order(session, ctx, msg).await?,
        msg_type::ORDER_CANCEL_REQUEST => handle_cancel_request(session, ctx, msg).await?,
        msg_type::ORDER_CANCEL_REPLACE_REQUEST => handle_replace_request(session, ctx, msg).await?,
        msg_type::ORDER_STATUS_REQUEST => handle_status_request(session, ctx, msg).await?,
        other => debug!(msg_type = other, "ignoring message"),
    }
    Ok(())
}

fn require(msg: &FixMessage, t: u32) -> FixResult<&str> {
    msg.get(t).ok_or(FixError::MissingField { tag: t })
}

fn require_qty(msg: &FixMessage, t: u32) -> FixResult<Qty> {
    let raw = require(msg, t)?;
    Qty::from_wire(raw).ok_or_else(|| FixError::InvalidField {
        tag: t,
        value: raw.to_string(),
    })
}

fn require_px(msg: &FixMessage, t: u32) -> FixResult<Px> {
    let raw = require(msg, t)?;
    Px::from_wire(raw).ok_or_else(|| FixError::InvalidField {
        tag: t,
        value: raw.to_string(),
    })
}

async fn handle_new_order(
    session: &Arc<ServerSession>,
    ctx: &ServerContext,
    msg: &FixMessage,
) -> FixResult<()> {
    let cl_ord_id = require(msg, tag::CL_ORD_ID)?.to_string();
    let symbol = require(msg, tag::SYMBOL)?.to_string();
    let side_raw = require(msg, tag::SIDE)?;
    let side = Side::from_fix(side_raw).ok_or_else(|| FixError::InvalidField {
        tag: tag::SIDE,
        value: side_raw.to_string(),
    })?;
    let quantity = require_qty(msg, tag::ORDER_QTY)?;
    let ord_type = msg
        .get(tag::ORD_TYPE)
        .and_then(OrdType::from_fix)
        .unwrap_or(OrdType::Limit);
    let price = match ord_type {
        OrdType::Market => None,
        OrdType::Limit => Some(require_px(msg, tag::PRICE)?),
    };

    let mut order = Order::new(
        ctx.next_order_id(),
        cl_ord_id.clone(),
        symbol,
        side,
        ord_type,
        quantity,
        price,
    );
    order.acknowledge();
    info!(order = %order, "order accepted");

    let handle = OrderHandle::new(order);
    // duplicate ClOrdIDs overwrite: last write wins in the registry
    ctx.orders.insert(cl_ord_id, handle.clone());

    send_execution_report(session, &handle.snapshot(), ExecType::New, None).await?;
    spawn_fill_simulator(Arc::clone(session), Arc::clone(&ctx.config), handle);
    Ok(())
}

async fn handle_cancel_request(
    session: &Arc<ServerSession>,
    ctx: &ServerContext,
    msg: &FixMessage,
) -> FixResult<()> {
    let orig_cl_ord_id = require(msg, tag::ORIG_CL_ORD_ID)?.to_string();
    let cancel_cl_ord_id = msg.get(tag::CL_ORD_ID).unwrap_or_default().to_string();

    let handle = ctx
        .orders
        .get(&orig_cl_ord_id)
        .map(|entry| entry.value().clone());
    let Some(handle) = handle else {
        warn!(cl_ord_id = %orig_cl_ord_id, "cancel rejected: unknown order");
        return send_cancel_reject(
            session,
            &cancel_cl_ord_id,
            &orig_cl_ord_id,
            None,
            "1",
            format!("Unknown order: {orig_cl_ord_id}"),
        )
        .await;
    };

    if handle.with_mut(Order::cancel) {
        handle.signal_cancel();
        let order = handle.snapshot();
        info!(cl_ord_id = %orig_cl_ord_id, "order canceled");
        send_execution_report(session, &order, ExecType::Canceled, None).await?;
    } else {
        let status = handle.snapshot().status;
        warn!(cl_ord_id = %orig_cl_ord_id, "cancel rejected: order already filled");
        send_cancel_reject(
            session,
            &cancel_cl_ord_id,
            &orig_cl_ord_id,
            Some(status),
            "1",
            format!("Order already filled: {orig_cl_ord_id}"),
        )
        .await?;
    }
    Ok(())
}

async fn handle_replace_request(
    session: &Arc<ServerSession>,
    ctx: &ServerContext,
    msg: &FixMessage,
) -> FixResult<()> {
    let orig_cl_ord_id = require(msg, tag::ORIG_CL_ORD_ID)?.to_string();
    let new_cl_ord_id = require(msg, tag::CL_ORD_ID)?.to_string();
    let new_quantity = msg.get_qty(tag::ORDER_QTY);
    let new_price = msg.get_px(tag::PRICE);

    let handle = ctx
        .orders
        .get(&orig_cl_ord_id)
        .map(|entry| entry.value().clone());
    let Some(handle) = handle else {
        warn!(cl_ord_id = %orig_cl_ord_id, "replace rejected: unknown order");
        return send_cancel_reject(
            session,
            &new_cl_ord_id,
            &orig_cl_ord_id,
            None,
            "2",
            format!("Unknown order: {orig_cl_ord_id}"),
        )
        .await;
    };

    let replaced = handle.with_mut(|order| order.replace(&new_cl_ord_id, new_quantity, new_price));
    if !replaced {
        let status = handle.snapshot().status;
        warn!(cl_ord_id = %orig_cl_ord_id, %status, "replace rejected: order is terminal");
        return send_cancel_reject(
            session,
            &new_cl_ord_id,
            &orig_cl_ord_id,
            Some(status),
            "2",
            format!("Order not replaceable: {orig_cl_ord_id} is {status}"),
        )
        .await;
    }

    // re-key the registry entry under the new ClOrdID
    ctx.orders.remove(&orig_cl_ord_id);
    ctx.orders.insert(new_cl_ord_id.clone(), handle.clone());

    let order = handle.snapshot();
    info!(orig = %orig_cl_ord_id, new = %new_cl_ord_id, "order replaced");
    send_execution_report(session, &order, ExecType::Replaced, None).await?;

    // the replaced order gets a fresh fill lifecycle
    spawn_fill_simulator(Arc::clone(session), Arc::clone(&ctx.config), handle);
    Ok(())
}

async fn handle_status_request(
    session: &Arc<ServerSession>,
    ctx: &ServerContext,
    msg: &FixMessage,
) -> FixResult<()> {
    let cl_ord_id = require(msg, tag::CL_ORD_ID)?.to_string();
    let handle = ctx.orders.get(&cl_ord_id).map(|entry| entry.value().clone());
    match handle {
        Some(handle) => {
            send_execution_report(session, &handle.snapshot(), ExecType::OrderStatus, None).await?;
        }
        None => info!(cl_ord_id = %cl_ord_id, "status request for unknown order, ignoring"),
    }
    Ok(())
}

/// Run one order's simulated fill lifecycle
///
/// First delay (shorter for market orders), then a partial fill of half the
/// ordered quantity, second delay, then the full fill. Cancellation is
/// raced against each delay *and* re-checked through the status guards, so
/// a cancel that lands between steps always wins.
fn spawn_fill_simulator(
    session: Arc<ServerSession>,
    config: Arc<ServerConfig>,
    handle: OrderHandle,
) {
    tokio::spawn(async move {
        let market = handle.snapshot().ord_type == OrdType::Market;

        tokio::select! {
            () = tokio::time::sleep(config.first_fill_delay(market)) => {}
            () = handle.cancelled() => {}
        }
        let partial = handle.with_mut(|order| {
            let half = order.quantity.half();
            if order.apply_partial_fill(half) {
                Some((order.clone(), half))
            } else {
                None
            }
        });
        match partial {
            Some((order, half)) => {
                debug!(order = %order, "partial fill");
                if let Err(e) =
                    send_execution_report(&session, &order, ExecType::PartialFill, Some(half)).await
                {
                    warn!(error = %e, "failed to send partial fill report");
                    return;
                }
            }
            // half may round to zero while the order is still live; a
            // terminal order ends the simulation here
            None if handle.snapshot().is_terminal() => return,
            None => {}
        }

        tokio::select! {
            () = tokio::time::sleep(config.final_fill_delay()) => {}
            () = handle.cancelled() => {}
        }
        let full = handle.with_mut(|order| {
            order
                .apply_full_fill()
                .map(|last| (order.clone(), last))
        });
        if let Some((order, last)) = full {
            debug!(order = %order, "full fill");
            if let Err(e) = send_execution_report(&session, &order, ExecType::Fill, Some(last)).await
            {
                warn!(error = %e, "failed to send fill report");
            }
        }
    });
}

/// Build and send an execution report reflecting the given order state
async fn send_execution_report(
    session: &Arc<ServerSession>,
    order: &Order,
    exec_type: ExecType,
    last_qty: Option<Qty>,
) -> FixResult<()> {
    let price = order.price.unwrap_or(Px::ZERO);
    let mut report = FixMessage::new(msg_type::EXECUTION_REPORT);
    report
        .set(tag::ORDER_ID, order.order_id.clone())
        .set(tag::CL_ORD_ID, order.cl_ord_id.clone())
        .set(tag::EXEC_TYPE, exec_type.as_fix())
        .set(tag::ORD_STATUS, order.status.as_fix())
        .set(tag::SYMBOL, order.symbol.clone())
        .set(tag::SIDE, order.side.as_fix())
        .set(tag::ORDER_QTY, order.quantity.to_string())
        .set(tag::PRICE, price.to_wire())
        .set(tag::CUM_QTY, order.filled_qty.to_string())
        .set(tag::LEAVES_QTY, order.leaves_qty().to_string());
    if let Some(last) = last_qty
        && !last.is_zero()
    {
        report
            .set(tag::LAST_QTY, last.to_string())
            .set(tag::LAST_PX, price.to_wire());
    }
    report.set(tag::TRANSACT_TIME, utc_timestamp());
    session.send(report).await?;
    Ok(())
}

/// Reply to an uncancelable cancel/replace with an Order Cancel Reject
async fn send_cancel_reject(
    session: &Arc<ServerSession>,
    cl_ord_id: &str,
    orig_cl_ord_id: &str,
    ord_status: Option<OrderStatus>,
    response_to: &str,
    reason: String,
) -> FixResult<()> {
    let mut reject = FixMessage::new(msg_type::ORDER_CANCEL_REJECT);
    reject
        .set(tag::CL_ORD_ID, cl_ord_id)
        .set(tag::ORIG_CL_ORD_ID, orig_cl_ord_id)
        .set(
            tag::ORD_STATUS,
            ord_status.map_or("8", |status| status.as_fix()),
        )
        .set(tag::CXL_REJ_RESPONSE_TO, response_to)
        .set(tag::TEXT, reason)
        .set(tag::TRANSACT_TIME, utc_timestamp());
    session.send(reject).await?;
    Ok(())
}
