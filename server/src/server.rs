//! Connection multiplexer: the single-threaded event loop.
//!
//! One listening socket plus a fixed table of client slots, driven by
//! one task on a current-thread runtime. Each iteration waits for the
//! first of: an incoming connection, any open slot becoming readable,
//! or the statistics timeout. After any wakeup it sweeps every slot in
//! ascending order with non-blocking reads. Command dispatch is synchronous, so
//! events for one connection are delivered in read order and slots are
//! serviced strictly sequentially; no locking exists anywhere.
//!
//! Per-connection failures (socket errors, protocol errors) close that
//! one connection and the loop continues. Bind and accept failures are
//! fatal, as is a panicking command handler.

use std::net::SocketAddr;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::constants::{MAX_CLIENTS, READ_BUFFER_SIZE};
use crate::dispatch::{CommandHandler, LifecycleKind};
use crate::protocol;
use crate::stats::StatCounters;

/// Statistics reporting cadence, measured by wall clock.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that terminate the server.
#[derive(Debug)]
pub enum ServerError {
    /// The listening socket could not be bound.
    Bind(std::io::Error),
    /// Accepting a new connection failed.
    Accept(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "bind failed: {e}"),
            Self::Accept(e) => write!(f, "accept failed: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind(e) | Self::Accept(e) => Some(e),
        }
    }
}

/// One open client connection.
///
/// The remote address is captured at accept time so disconnect events
/// always report the address of the slot that actually closed.
struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
}

/// The event loop over one listener and up to [`MAX_CLIENTS`] clients.
pub struct Server<H> {
    listener: TcpListener,
    slots: Vec<Option<Connection>>,
    handler: H,
    stats: Rc<StatCounters>,
}

impl<H: CommandHandler> Server<H> {
    /// Bind the listening socket. Failure here is process-fatal.
    pub async fn bind(port: u16, handler: H, stats: Rc<StatCounters>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(ServerError::Bind)?;
        let mut slots = Vec::with_capacity(MAX_CLIENTS);
        slots.resize_with(MAX_CLIENTS, || None);
        Ok(Self {
            listener,
            slots,
            handler,
            stats,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Drive the event loop forever. Only returns on a fatal error.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut report_started = Instant::now();
        let mut timeout = REPORT_INTERVAL;

        loop {
            let accepted = tokio::select! {
                res = self.listener.accept() => Some(res.map_err(ServerError::Accept)?),
                () = readable_any(&self.slots) => None,
                () = tokio::time::sleep(timeout) => None,
            };

            if let Some((stream, addr)) = accepted {
                self.accept_connection(stream, addr).await;
            }

            // Sweep every slot in ascending order; reads are
            // non-blocking, so slots that are not ready are skipped.
            for slot in 0..self.slots.len() {
                self.service_slot(slot, &mut buf).await;
            }

            let elapsed = report_started.elapsed();
            if elapsed >= REPORT_INTERVAL {
                let report = self.stats.take_report();
                tracing::info!(
                    requests = report.requests,
                    live_allocations = report.live_allocations,
                    gets = report.gets,
                    sets = report.sets,
                    deletes = report.deletes,
                    updates = report.updates,
                    "throughput"
                );
                report_started = Instant::now();
                timeout = REPORT_INTERVAL;
            } else {
                // Shorten the next wait by the time already spent so
                // reports keep a steady ~1 second cadence.
                timeout = REPORT_INTERVAL - elapsed;
            }
        }
    }

    async fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            tracing::warn!(%addr, "connection table full, dropping connection");
            return;
        };
        tracing::debug!(%addr, slot, "client connected");

        // The connect event crosses the boundary before any data is read.
        let reply = self
            .handler
            .dispatch_lifecycle(LifecycleKind::Connect, addr.ip(), addr.port());
        let mut conn = Connection { stream, addr };
        if let Some(bytes) = reply {
            if let Err(e) = conn.stream.write_all(&bytes).await {
                tracing::warn!(%addr, "write failed on connect: {e}");
            }
        }
        self.slots[slot] = Some(conn);
    }

    async fn service_slot(&mut self, slot: usize, buf: &mut [u8]) {
        let read = match &self.slots[slot] {
            None => return,
            Some(conn) => conn.stream.try_read(buf),
        };

        let n = match read {
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(e) => {
                tracing::warn!(slot, "read failed: {e}");
                self.close_slot(slot).await;
                return;
            }
            // Zero bytes means the peer closed the connection.
            Ok(0) => {
                self.close_slot(slot).await;
                return;
            }
            Ok(n) => n,
        };

        match protocol::decode_frame(&buf[..n]) {
            Err(e) => {
                tracing::warn!(slot, "protocol error, disconnecting client: {e}");
                self.close_slot(slot).await;
            }
            Ok(args) => {
                self.stats.record_request();
                if let Some(reply) = self.handler.dispatch_command(&args) {
                    self.write_reply(slot, &reply).await;
                }
            }
        }
    }

    async fn write_reply(&mut self, slot: usize, bytes: &[u8]) {
        let result = match &mut self.slots[slot] {
            None => return,
            Some(conn) => conn.stream.write_all(bytes).await,
        };
        if let Err(e) = result {
            tracing::warn!(slot, "write failed: {e}");
            self.close_slot(slot).await;
        }
    }

    /// Close a connection: synthesize the disconnect event, write any
    /// response it produces, drop the socket, and free the slot.
    async fn close_slot(&mut self, slot: usize) {
        let Some(conn) = self.slots[slot].take() else {
            return;
        };
        tracing::debug!(addr = %conn.addr, slot, "client disconnected");
        let reply = self.handler.dispatch_lifecycle(
            LifecycleKind::Disconnect,
            conn.addr.ip(),
            conn.addr.port(),
        );
        if let Some(bytes) = reply {
            let mut stream = conn.stream;
            // Best effort: the peer may already be gone.
            let _ = stream.write_all(&bytes).await;
        }
    }
}

/// Resolve when any open slot's socket becomes readable; pend forever
/// when no connection is open.
async fn readable_any(slots: &[Option<Connection>]) {
    let watches: Vec<_> = slots
        .iter()
        .flatten()
        .map(|conn| Box::pin(conn.stream.readable()))
        .collect();
    if watches.is_empty() {
        std::future::pending::<()>().await;
    } else {
        let _ = futures::future::select_all(watches).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Argument;
    use std::cell::RefCell;
    use std::net::IpAddr;
    use tokio::io::AsyncReadExt;

    /// Replies `+OK` to every command and records lifecycle events.
    struct RecordingHandler {
        events: Rc<RefCell<Vec<(LifecycleKind, IpAddr, u16)>>>,
    }

    impl CommandHandler for RecordingHandler {
        fn dispatch_command(&mut self, _args: &[Argument]) -> Option<Vec<u8>> {
            Some(b"+OK\r\n".to_vec())
        }

        fn dispatch_lifecycle(
            &mut self,
            kind: LifecycleKind,
            addr: IpAddr,
            port: u16,
        ) -> Option<Vec<u8>> {
            self.events.borrow_mut().push((kind, addr, port));
            None
        }
    }

    async fn roundtrip(stream: &mut TcpStream, frame: &[u8]) {
        stream.write_all(frame).await.expect("write");
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.expect("read");
        assert_eq!(&buf[..n], b"+OK\r\n");
    }

    #[test]
    fn test_disconnect_carries_the_closed_slots_address() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build runtime");
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, async move {
            let events = Rc::new(RefCell::new(Vec::new()));
            let handler = RecordingHandler {
                events: Rc::clone(&events),
            };
            let server = Server::bind(0, handler, Rc::new(StatCounters::default()))
                .await
                .expect("bind server");
            let mut addr = server.local_addr().expect("local addr");
            addr.set_ip(IpAddr::from([127, 0, 0, 1]));
            let server_task = tokio::task::spawn_local(async move {
                let _ = server.run().await;
            });

            let mut first = TcpStream::connect(addr).await.expect("connect first");
            let first_port = first.local_addr().expect("first addr").port();
            let mut second = TcpStream::connect(addr).await.expect("connect second");
            let second_port = second.local_addr().expect("second addr").port();

            // One reply on the second connection proves both were
            // accepted (the listener accepts in arrival order).
            roundtrip(&mut second, b"*1\r\n$4\r\nping\r\n").await;

            drop(first);

            // The sweep answering this command also reads the first
            // slot's EOF and closes it.
            roundtrip(&mut second, b"*1\r\n$4\r\nping\r\n").await;

            server_task.abort();

            let events = events.borrow();
            let disconnects: Vec<_> = events
                .iter()
                .filter(|(kind, _, _)| *kind == LifecycleKind::Disconnect)
                .collect();
            assert_eq!(disconnects.len(), 1);
            let &&(_, disconnect_ip, disconnect_port) = disconnects
                .first()
                .expect("one disconnect");
            assert_eq!(disconnect_ip, IpAddr::from([127, 0, 0, 1]));
            assert_eq!(
                disconnect_port, first_port,
                "disconnect must report the closed slot's own peer"
            );
            assert_ne!(disconnect_port, second_port);
        });
    }
}
