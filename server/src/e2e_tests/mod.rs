//! End-to-end tests at the wire level.
//!
//! Each test file covers one scenario against a live server bound to
//! an ephemeral port, exercising the full socket → decoder → dispatch
//! → storage → reply cycle.

#![cfg(test)]

mod helpers;

mod test_connection_limit;
mod test_hdel;
mod test_hgetall;
mod test_hset_hget;
mod test_protocol_error;
