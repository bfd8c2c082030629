//! Common helpers for end-to-end tests over a live socket.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::dispatch::HashCommands;
use crate::server::Server;
use crate::stats::StatCounters;
use crate::storage::Database;

/// Run `test` against a freshly bound server on an ephemeral port.
///
/// The server task runs on the same current-thread runtime as the test
/// body (via a `LocalSet`), matching production's single-threaded
/// execution.
pub fn run_e2e<F, Fut>(test: F)
where
    F: FnOnce(SocketAddr) -> Fut,
    Fut: Future<Output = ()>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        let stats = Rc::new(StatCounters::default());
        let database = Database::new(Rc::clone(&stats));
        let handler = HashCommands::new(database);
        let server = Server::bind(0, handler, stats).await.expect("bind server");

        let mut addr = server.local_addr().expect("local addr");
        addr.set_ip(IpAddr::from([127, 0, 0, 1]));

        let server_task = tokio::task::spawn_local(async move {
            let _ = server.run().await;
        });
        test(addr).await;
        server_task.abort();
    });
}

/// Open a client connection to the test server.
pub async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect to server")
}

/// Encode an array frame of bulk strings.
pub fn frame(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", parts.len()).into_bytes();
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Send one frame and read one reply.
pub async fn roundtrip(stream: &mut TcpStream, request: &[u8]) -> Vec<u8> {
    stream.write_all(request).await.expect("write request");
    read_reply(stream).await
}

/// Read whatever the server sends next (empty on close).
pub async fn read_reply(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.expect("read reply");
    buf.truncate(n);
    buf
}
