//! Store a field and read it back over a live connection.

use crate::e2e_tests::helpers::{connect, frame, roundtrip, run_e2e};

#[test]
fn test_hset_then_hget_string() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;

        let reply = roundtrip(
            &mut conn,
            &frame(&[b"hset", b"users", b"alice", b"name", b"Alice"]),
        )
        .await;
        assert_eq!(reply, b"+OK\r\n");

        let reply = roundtrip(&mut conn, &frame(&[b"hget", b"users", b"alice", b"name"])).await;
        assert_eq!(reply, b"$5\r\nAlice\r\n");
    });
}

#[test]
fn test_hset_then_hget_integer() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;

        // Integer element in the request frame, integer reply back out.
        let request = b"*5\r\n$4\r\nhset\r\n$5\r\nusers\r\n$5\r\nalice\r\n$3\r\nage\r\n:30\r\n";
        let reply = roundtrip(&mut conn, request).await;
        assert_eq!(reply, b"+OK\r\n");

        let reply = roundtrip(&mut conn, &frame(&[b"hget", b"users", b"alice", b"age"])).await;
        assert_eq!(reply, b":30\r\n");
    });
}

#[test]
fn test_hget_miss_is_nil() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;
        let reply = roundtrip(&mut conn, &frame(&[b"hget", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$-1\r\n");
    });
}

#[test]
fn test_data_is_shared_between_connections() {
    run_e2e(|addr| async move {
        let mut writer = connect(addr).await;
        let mut reader = connect(addr).await;

        let reply = roundtrip(&mut writer, &frame(&[b"hset", b"t", b"k", b"f", b"v"])).await;
        assert_eq!(reply, b"+OK\r\n");

        let reply = roundtrip(&mut reader, &frame(&[b"hget", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$1\r\nv\r\n");
    });
}
