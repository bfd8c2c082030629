//! A malformed frame disconnects only the offending client.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::e2e_tests::helpers::{connect, frame, roundtrip, run_e2e};

#[test]
fn test_malformed_frame_disconnects_only_that_client() {
    run_e2e(|addr| async move {
        let mut bad = connect(addr).await;
        let mut good = connect(addr).await;

        let reply = roundtrip(&mut good, &frame(&[b"hset", b"t", b"k", b"f", b"v"])).await;
        assert_eq!(reply, b"+OK\r\n");

        // Inline commands are not part of the protocol; the server
        // drops the connection without a reply.
        bad.write_all(b"PING\r\n").await.expect("write garbage");
        let mut buf = [0u8; 64];
        let n = bad.read(&mut buf).await.expect("read after garbage");
        assert_eq!(n, 0, "expected the server to close the connection");

        // The other connection is unaffected.
        let reply = roundtrip(&mut good, &frame(&[b"hget", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$1\r\nv\r\n");
    });
}

#[test]
fn test_client_disconnect_frees_the_slot() {
    run_e2e(|addr| async move {
        let mut first = connect(addr).await;
        roundtrip(&mut first, &frame(&[b"hset", b"t", b"k", b"f", b"v"])).await;
        drop(first);

        let mut second = connect(addr).await;
        let reply = roundtrip(&mut second, &frame(&[b"hget", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$1\r\nv\r\n");
    });
}
