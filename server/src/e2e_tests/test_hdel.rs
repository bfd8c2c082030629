//! Deleting fields over a live connection.

use crate::e2e_tests::helpers::{connect, frame, roundtrip, run_e2e};

#[test]
fn test_hdel_returns_value_then_misses() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;

        roundtrip(&mut conn, &frame(&[b"hset", b"t", b"k", b"f", b"hello"])).await;

        let reply = roundtrip(&mut conn, &frame(&[b"hdel", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$5\r\nhello\r\n");

        let reply = roundtrip(&mut conn, &frame(&[b"hget", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$-1\r\n");
    });
}

#[test]
fn test_hdelall_removes_the_whole_key() {
    run_e2e(|addr| async move {
        let mut conn = connect(addr).await;

        roundtrip(
            &mut conn,
            &frame(&[b"hset", b"t", b"k", b"a", b"1", b"b", b"2"]),
        )
        .await;
        roundtrip(&mut conn, &frame(&[b"hset", b"t", b"other", b"a", b"1"])).await;

        let reply = roundtrip(&mut conn, &frame(&[b"hdelall", b"t", b"k"])).await;
        assert_eq!(reply, b":2\r\n");

        // Only the named key is cleared.
        let reply = roundtrip(&mut conn, &frame(&[b"hgetall", b"t", b"k"])).await;
        assert_eq!(reply, b"*0\r\n");
        let reply = roundtrip(&mut conn, &frame(&[b"hget", b"t", b"other", b"a"])).await;
        assert_eq!(reply, b"$1\r\n1\r\n");
    });
}
