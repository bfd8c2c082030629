//! The connection table holds a fixed number of clients.

use crate::constants::MAX_CLIENTS;
use crate::e2e_tests::helpers::{connect, frame, read_reply, roundtrip, run_e2e};

#[test]
fn test_full_table_drops_the_extra_connection() {
    run_e2e(|addr| async move {
        let mut pool = Vec::new();
        for _ in 0..MAX_CLIENTS {
            pool.push(connect(addr).await);
        }

        // The listener accepts in arrival order, so every slot is taken
        // by the time this connection reaches the table.
        let mut extra = connect(addr).await;
        let reply = read_reply(&mut extra).await;
        assert!(reply.is_empty(), "expected a close with no reply");

        // A pooled client is unaffected by the dropped connection.
        let mut keeper = pool.pop().expect("pool is non-empty");
        let reply = roundtrip(&mut keeper, &frame(&[b"hset", b"t", b"k", b"f", b"v"])).await;
        assert_eq!(reply, b"+OK\r\n");
    });
}

#[test]
fn test_freed_slot_is_reusable() {
    run_e2e(|addr| async move {
        let mut pool = Vec::new();
        for _ in 0..MAX_CLIENTS {
            pool.push(connect(addr).await);
        }

        let mut keeper = pool.pop().expect("pool is non-empty");
        drop(pool.remove(0));

        // Every wakeup sweeps all slots, so by the time this reply
        // arrives the dropped connection's slot has been freed.
        let reply = roundtrip(&mut keeper, &frame(&[b"hset", b"t", b"k", b"f", b"v"])).await;
        assert_eq!(reply, b"+OK\r\n");

        let mut fresh = connect(addr).await;
        let reply = roundtrip(&mut fresh, &frame(&[b"hget", b"t", b"k", b"f"])).await;
        assert_eq!(reply, b"$1\r\nv\r\n");
    });
}
