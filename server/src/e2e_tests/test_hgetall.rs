//! hgetall ordering over a live connection.

use crate::e2e_tests::helpers::{connect, frame, roundtrip, run_e2e};

#[test]
fn test_hgetall_orders_fields_shortest_first() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;

        // Inserted longest-first; replies come back shortest-first,
        // ties broken lexicographically.
        roundtrip(&mut conn, &frame(&[b"hset", b"t", b"k", b"name", b"bob"])).await;
        roundtrip(&mut conn, &frame(&[b"hset", b"t", b"k", b"age", b"33"])).await;

        let reply = roundtrip(&mut conn, &frame(&[b"hgetall", b"t", b"k"])).await;
        assert_eq!(
            reply,
            b"*4\r\n$3\r\nage\r\n$2\r\n33\r\n$4\r\nname\r\n$3\r\nbob\r\n"
        );
    });
}

#[test]
fn test_hgetall_ignores_other_keys() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;

        roundtrip(&mut conn, &frame(&[b"hset", b"t", b"k", b"f", b"v"])).await;
        roundtrip(&mut conn, &frame(&[b"hset", b"t", b"zz", b"f", b"x"])).await;
        roundtrip(&mut conn, &frame(&[b"hset", b"u", b"k", b"f", b"y"])).await;

        let reply = roundtrip(&mut conn, &frame(&[b"hgetall", b"t", b"k"])).await;
        assert_eq!(reply, b"*2\r\n$1\r\nf\r\n$1\r\nv\r\n");
    });
}
