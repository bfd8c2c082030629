//! Command dispatch boundary between the event loop and the command
//! layer.
//!
//! The multiplexer knows nothing about commands; it hands every decoded
//! frame and every connection lifecycle event to a [`CommandHandler`]
//! and writes whatever bytes come back. Dispatch is synchronous: the
//! loop does not move to the next ready connection until the handler
//! returns. A handler panic is process-fatal: there is no
//! per-connection isolation of command-layer failures.

use std::borrow::Cow;
use std::net::IpAddr;

use crate::protocol::{
    Argument, append_array_header, append_bulk, append_integer, encode_bulk, encode_error,
    encode_integer, encode_nil, encode_simple_string,
};
use crate::storage::{Database, RecordValue};

/// Synthesized connection lifecycle events, delivered to the command
/// layer alongside real protocol commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Connect,
    Disconnect,
}

impl std::fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// The command layer's side of the dispatch boundary.
///
/// Returning `None` means no bytes are written back for that event.
pub trait CommandHandler {
    /// Handle one decoded command frame.
    fn dispatch_command(&mut self, args: &[Argument]) -> Option<Vec<u8>>;

    /// Handle a connect/disconnect event for the given remote peer.
    fn dispatch_lifecycle(&mut self, kind: LifecycleKind, addr: IpAddr, port: u16)
    -> Option<Vec<u8>>;
}

/// Built-in command layer: hierarchical hash commands over the
/// database.
///
/// Commands are matched ASCII case-insensitively. Key segments taken
/// from integer arguments use their decimal byte form.
pub struct HashCommands {
    db: Database,
}

impl HashCommands {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    fn hget(&self, args: &[Argument]) -> Vec<u8> {
        let Some([table, key, field]) = args.get(..3).map(|a| [&a[0], &a[1], &a[2]]) else {
            return encode_nil();
        };
        let value = self.db.hget(
            &table.segment_bytes(),
            &key.segment_bytes(),
            &field.segment_bytes(),
        );
        value.map_or_else(encode_nil, encode_value)
    }

    fn hdel(&mut self, args: &[Argument]) -> Vec<u8> {
        let Some([table, key, field]) = args.get(..3).map(|a| [&a[0], &a[1], &a[2]]) else {
            return encode_nil();
        };
        let removed = self.db.hdel(
            &table.segment_bytes(),
            &key.segment_bytes(),
            &field.segment_bytes(),
        );
        removed.map_or_else(encode_nil, |value| encode_value(&value))
    }

    fn hgetall(&self, args: &[Argument]) -> Vec<u8> {
        let mut out = Vec::new();
        let Some([table, key]) = args.get(..2).map(|a| [&a[0], &a[1]]) else {
            append_array_header(&mut out, 0);
            return out;
        };
        let pairs = self.db.hgetall(&table.segment_bytes(), &key.segment_bytes());
        append_array_header(&mut out, pairs.len() * 2);
        for (field, value) in pairs {
            append_bulk(&mut out, field);
            append_value(&mut out, value);
        }
        out
    }

    fn hdelall(&mut self, args: &[Argument]) -> Vec<u8> {
        let Some([table, key]) = args.get(..2).map(|a| [&a[0], &a[1]]) else {
            return encode_integer(0);
        };
        let removed = self
            .db
            .hdelall(&table.segment_bytes(), &key.segment_bytes());
        encode_integer(removed.try_into().unwrap_or(i64::MAX))
    }

    fn hset(&mut self, args: &[Argument]) -> Vec<u8> {
        if args.len() < 2 {
            return encode_error("wrong number of arguments");
        }
        let table = args[0].segment_bytes();
        let key = args[1].segment_bytes();

        // The decoder pads frames to an odd element count, so the
        // field/value tail always pairs up.
        let pairs: Vec<(Cow<'_, [u8]>, RecordValue)> = args[2..]
            .chunks_exact(2)
            .map(|pair| (pair[0].segment_bytes(), argument_value(&pair[1])))
            .collect();

        match self.db.hset(&table, &key, pairs) {
            Ok(()) => encode_simple_string("OK"),
            Err(e) => {
                tracing::error!("hset failed: {e}");
                encode_error("out of memory")
            }
        }
    }
}

impl CommandHandler for HashCommands {
    fn dispatch_command(&mut self, args: &[Argument]) -> Option<Vec<u8>> {
        let (command, rest) = args.split_first()?;
        let reply = if command.is_command(b"hget") {
            self.hget(rest)
        } else if command.is_command(b"hset") {
            self.hset(rest)
        } else if command.is_command(b"hdel") {
            self.hdel(rest)
        } else if command.is_command(b"hgetall") {
            self.hgetall(rest)
        } else if command.is_command(b"hdelall") {
            self.hdelall(rest)
        } else {
            encode_error("unknown command")
        };
        Some(reply)
    }

    fn dispatch_lifecycle(
        &mut self,
        kind: LifecycleKind,
        addr: IpAddr,
        port: u16,
    ) -> Option<Vec<u8>> {
        tracing::debug!(%kind, %addr, port, "lifecycle event");
        None
    }
}

fn argument_value(arg: &Argument) -> RecordValue {
    match arg {
        Argument::Integer(n) => RecordValue::integer(*n),
        Argument::Bytes(bytes) => RecordValue::string(bytes),
    }
}

fn encode_value(value: &RecordValue) -> Vec<u8> {
    match value {
        RecordValue::Integer(n) => encode_integer(*n),
        RecordValue::String(bytes) => encode_bulk(bytes),
    }
}

fn append_value(out: &mut Vec<u8>, value: &RecordValue) {
    match value {
        RecordValue::Integer(n) => append_integer(out, *n),
        RecordValue::String(bytes) => append_bulk(out, bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatCounters;
    use std::rc::Rc;

    fn handler() -> HashCommands {
        HashCommands::new(Database::new(Rc::new(StatCounters::default())))
    }

    fn args(parts: &[&[u8]]) -> Vec<Argument> {
        parts.iter().map(|p| Argument::Bytes(p.to_vec())).collect()
    }

    fn dispatch(h: &mut HashCommands, parts: &[&[u8]]) -> Vec<u8> {
        h.dispatch_command(&args(parts)).expect("reply expected")
    }

    #[test]
    fn test_hset_then_hget_integer() {
        let mut h = handler();
        let set = h
            .dispatch_command(&[
                Argument::Bytes(b"hset".to_vec()),
                Argument::Bytes(b"users".to_vec()),
                Argument::Bytes(b"alice".to_vec()),
                Argument::Bytes(b"age".to_vec()),
                Argument::Integer(30),
            ])
            .expect("reply");
        assert_eq!(set, b"+OK\r\n");

        let got = dispatch(&mut h, &[b"hget", b"users", b"alice", b"age"]);
        assert_eq!(got, b":30\r\n");
    }

    #[test]
    fn test_hget_miss_is_nil() {
        let mut h = handler();
        assert_eq!(dispatch(&mut h, &[b"hget", b"t", b"k", b"f"]), b"$-1\r\n");
    }

    #[test]
    fn test_hdel_returns_value_then_misses() {
        let mut h = handler();
        dispatch(&mut h, &[b"hset", b"t", b"k", b"f", b"hello"]);
        assert_eq!(
            dispatch(&mut h, &[b"hdel", b"t", b"k", b"f"]),
            b"$5\r\nhello\r\n"
        );
        assert_eq!(dispatch(&mut h, &[b"hget", b"t", b"k", b"f"]), b"$-1\r\n");
    }

    #[test]
    fn test_hgetall_returns_all_pairs() {
        let mut h = handler();
        dispatch(&mut h, &[b"hset", b"t", b"k", b"a", b"1"]);
        dispatch(&mut h, &[b"hset", b"t", b"k", b"b", b"2"]);
        let reply = dispatch(&mut h, &[b"hgetall", b"t", b"k"]);
        assert_eq!(reply, b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n");
    }

    #[test]
    fn test_hdelall_counts_removed_records() {
        let mut h = handler();
        dispatch(&mut h, &[b"hset", b"t", b"k", b"a", b"1", b"b", b"2"]);
        assert_eq!(dispatch(&mut h, &[b"hdelall", b"t", b"k"]), b":2\r\n");
        assert_eq!(dispatch(&mut h, &[b"hgetall", b"t", b"k"]), b"*0\r\n");
    }

    #[test]
    fn test_commands_are_case_insensitive() {
        let mut h = handler();
        dispatch(&mut h, &[b"HSET", b"t", b"k", b"f", b"v"]);
        assert_eq!(dispatch(&mut h, &[b"HGet", b"t", b"k", b"f"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_unknown_command() {
        let mut h = handler();
        assert_eq!(
            dispatch(&mut h, &[b"ping"]),
            b"-ERR unknown command\r\n"
        );
    }

    #[test]
    fn test_integer_segments_use_decimal_form() {
        let mut h = handler();
        let set = h
            .dispatch_command(&[
                Argument::Bytes(b"hset".to_vec()),
                Argument::Bytes(b"t".to_vec()),
                Argument::Integer(42),
                Argument::Bytes(b"f".to_vec()),
                Argument::Bytes(b"v".to_vec()),
            ])
            .expect("reply");
        assert_eq!(set, b"+OK\r\n");
        assert_eq!(dispatch(&mut h, &[b"hget", b"t", b"42", b"f"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_lifecycle_produces_no_reply() {
        let mut h = handler();
        let reply = h.dispatch_lifecycle(
            LifecycleKind::Connect,
            std::net::IpAddr::from([127, 0, 0, 1]),
            4242,
        );
        assert_eq!(reply, None);
    }
}
