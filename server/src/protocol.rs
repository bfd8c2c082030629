//! Redis-style (RESP) wire format: frame decoding and reply encoding.
//!
//! A request is one top-level array frame, `*<N>\r\n` followed by `N`
//! elements, each a bulk string (`$<len>\r\n<bytes>\r\n`) or an integer
//! (`:<digits>\r\n`). The decoder consumes exactly one read's worth of
//! buffer and assumes the complete frame is present in it: a frame
//! split across reads is a protocol error, not something we reassemble.
//!
//! Compatibility behavior: frames carry a command word followed by
//! field/value pairs, which only balances when the element count is
//! odd. An even count gets one implicit empty trailing argument so
//! downstream pairing always works out.

use std::borrow::Cow;

const ARRAY_MARKER: u8 = b'*';
const BULK_STRING_MARKER: u8 = b'$';
const INTEGER_MARKER: u8 = b':';

/// One decoded protocol argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Bytes(Vec<u8>),
    Integer(i64),
}

impl Argument {
    /// The argument as key-segment bytes. Integers render as their
    /// decimal form, matching the original number-to-string coercion.
    #[must_use]
    pub fn segment_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Bytes(bytes) => Cow::Borrowed(bytes),
            Self::Integer(n) => Cow::Owned(n.to_string().into_bytes()),
        }
    }

    /// Case-insensitive comparison against an ASCII command word.
    #[must_use]
    pub fn is_command(&self, word: &[u8]) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.eq_ignore_ascii_case(word),
            Self::Integer(_) => false,
        }
    }
}

/// Why a frame failed to decode. Any of these closes the connection
/// that sent the frame; none of them is fatal to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer does not begin with the `*` array marker.
    MissingArrayMarker,
    /// The declared element count is zero or negative.
    NonPositiveCount(i64),
    /// An element begins with a byte that is neither `$` nor `:`.
    UnknownTypeTag(u8),
    /// A count, length, or integer line holds a non-digit or overflows.
    InvalidInteger,
    /// A `\r\n` terminator was expected but other bytes were found.
    MissingTerminator,
    /// A declared length or offset would read past the buffer end.
    Truncated,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArrayMarker => write!(f, "frame does not start with an array marker"),
            Self::NonPositiveCount(n) => write!(f, "non-positive element count: {n}"),
            Self::UnknownTypeTag(tag) => write!(f, "unknown element type tag: 0x{tag:02x}"),
            Self::InvalidInteger => write!(f, "malformed integer"),
            Self::MissingTerminator => write!(f, "missing CRLF terminator"),
            Self::Truncated => write!(f, "frame truncated"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Decode one complete array frame from a single read buffer.
pub fn decode_frame(buf: &[u8]) -> Result<Vec<Argument>, ProtocolError> {
    let mut cursor = Cursor { buf, pos: 0 };

    if cursor.take_byte()? != ARRAY_MARKER {
        return Err(ProtocolError::MissingArrayMarker);
    }
    let count = cursor.read_integer_line()?;
    if count < 1 {
        return Err(ProtocolError::NonPositiveCount(count));
    }

    let mut args = Vec::new();
    for _ in 0..count {
        match cursor.take_byte()? {
            BULK_STRING_MARKER => {
                let len = cursor.read_integer_line()?;
                let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidInteger)?;
                let bytes = cursor.take(len)?;
                cursor.expect_crlf()?;
                args.push(Argument::Bytes(bytes.to_vec()));
            }
            INTEGER_MARKER => {
                args.push(Argument::Integer(cursor.read_integer_line()?));
            }
            tag => return Err(ProtocolError::UnknownTypeTag(tag)),
        }
    }

    // Command word plus field/value pairs balances only for an odd
    // element count; pad an even count with one empty trailing value.
    if args.len() % 2 == 0 {
        args.push(Argument::Bytes(Vec::new()));
    }

    Ok(args)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take_byte(&mut self) -> Result<u8, ProtocolError> {
        let byte = *self.buf.get(self.pos).ok_or(ProtocolError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(len).ok_or(ProtocolError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(ProtocolError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Read a signed decimal integer terminated by `\r\n`.
    fn read_integer_line(&mut self) -> Result<i64, ProtocolError> {
        let mut value: i64 = 0;
        let mut negative = false;
        let mut digits = 0usize;
        loop {
            match self.take_byte()? {
                b'\r' => break,
                b'-' if digits == 0 && !negative => negative = true,
                byte @ b'0'..=b'9' => {
                    digits += 1;
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(byte - b'0')))
                        .ok_or(ProtocolError::InvalidInteger)?;
                }
                _ => return Err(ProtocolError::InvalidInteger),
            }
        }
        if digits == 0 {
            return Err(ProtocolError::InvalidInteger);
        }
        if self.take_byte()? != b'\n' {
            return Err(ProtocolError::MissingTerminator);
        }
        Ok(if negative { -value } else { value })
    }

    fn expect_crlf(&mut self) -> Result<(), ProtocolError> {
        if self.take_byte()? != b'\r' || self.take_byte()? != b'\n' {
            return Err(ProtocolError::MissingTerminator);
        }
        Ok(())
    }
}

// Reply encoding. Responses are raw bytes from the multiplexer's point
// of view; these helpers are what the command layer uses to build them.

pub fn append_array_header(out: &mut Vec<u8>, len: usize) {
    out.push(ARRAY_MARKER);
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

pub fn append_bulk(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(BULK_STRING_MARKER);
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(bytes);
    out.extend_from_slice(b"\r\n");
}

pub fn append_integer(out: &mut Vec<u8>, n: i64) {
    out.push(INTEGER_MARKER);
    out.extend_from_slice(n.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

#[must_use]
pub fn encode_simple_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 3);
    out.push(b'+');
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\r\n");
    out
}

#[must_use]
pub fn encode_error(message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 8);
    out.extend_from_slice(b"-ERR ");
    out.extend_from_slice(message.as_bytes());
    out.extend_from_slice(b"\r\n");
    out
}

#[must_use]
pub fn encode_integer(n: i64) -> Vec<u8> {
    let mut out = Vec::new();
    append_integer(&mut out, n);
    out
}

#[must_use]
pub fn encode_bulk(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    append_bulk(&mut out, bytes);
    out
}

/// The nil bulk string, the "not found" reply.
#[must_use]
pub fn encode_nil() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_arg(s: &[u8]) -> Argument {
        Argument::Bytes(s.to_vec())
    }

    #[test]
    fn test_decode_three_bulk_strings() {
        let frame = b"*3\r\n$3\r\nfoo\r\n$3\r\nbar\r\n$3\r\nbaz\r\n";
        let args = decode_frame(frame).expect("decode");
        assert_eq!(
            args,
            vec![bytes_arg(b"foo"), bytes_arg(b"bar"), bytes_arg(b"baz")]
        );
    }

    #[test]
    fn test_decode_mixed_bulk_and_integer() {
        let frame = b"*5\r\n$4\r\nhset\r\n$5\r\nusers\r\n$5\r\nalice\r\n$3\r\nage\r\n:30\r\n";
        let args = decode_frame(frame).expect("decode");
        assert_eq!(
            args,
            vec![
                bytes_arg(b"hset"),
                bytes_arg(b"users"),
                bytes_arg(b"alice"),
                bytes_arg(b"age"),
                Argument::Integer(30),
            ]
        );
    }

    #[test]
    fn test_decode_negative_integer() {
        let args = decode_frame(b"*1\r\n:-42\r\n").expect("decode");
        assert_eq!(args, vec![Argument::Integer(-42)]);
    }

    #[test]
    fn test_even_count_gains_empty_trailing_argument() {
        let frame = b"*4\r\n$4\r\nhset\r\n$1\r\nt\r\n$1\r\nk\r\n$1\r\nf\r\n";
        let args = decode_frame(frame).expect("decode");
        assert_eq!(args.len(), 5);
        assert_eq!(args.last(), Some(&bytes_arg(b"")));
    }

    #[test]
    fn test_odd_count_is_not_padded() {
        let frame = b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n";
        let args = decode_frame(frame).expect("decode");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_missing_array_marker() {
        assert_eq!(
            decode_frame(b"PING\r\n"),
            Err(ProtocolError::MissingArrayMarker)
        );
        assert_eq!(decode_frame(b""), Err(ProtocolError::Truncated));
    }

    #[test]
    fn test_non_positive_count() {
        assert_eq!(
            decode_frame(b"*0\r\n"),
            Err(ProtocolError::NonPositiveCount(0))
        );
        assert_eq!(
            decode_frame(b"*-1\r\n"),
            Err(ProtocolError::NonPositiveCount(-1))
        );
    }

    #[test]
    fn test_unknown_type_tag() {
        assert_eq!(
            decode_frame(b"*1\r\n%3\r\nfoo\r\n"),
            Err(ProtocolError::UnknownTypeTag(b'%'))
        );
    }

    #[test]
    fn test_truncated_frames_error_without_partial_result() {
        // Missing the trailing \r\n after the payload.
        assert_eq!(
            decode_frame(b"*1\r\n$3\r\nfoo"),
            Err(ProtocolError::Truncated)
        );
        // Declared length reads past the end of the buffer.
        assert_eq!(
            decode_frame(b"*1\r\n$10\r\nfoo\r\n"),
            Err(ProtocolError::Truncated)
        );
        // Fewer elements than declared.
        assert_eq!(
            decode_frame(b"*2\r\n$3\r\nfoo\r\n"),
            Err(ProtocolError::Truncated)
        );
    }

    #[test]
    fn test_malformed_lengths() {
        assert_eq!(
            decode_frame(b"*1\r\n$x\r\nfoo\r\n"),
            Err(ProtocolError::InvalidInteger)
        );
        assert_eq!(
            decode_frame(b"*1\r\n$-3\r\nfoo\r\n"),
            Err(ProtocolError::InvalidInteger)
        );
        assert_eq!(decode_frame(b"*\r\n"), Err(ProtocolError::InvalidInteger));
    }

    #[test]
    fn test_payload_terminator_must_be_crlf() {
        assert_eq!(
            decode_frame(b"*1\r\n$3\r\nfooXX"),
            Err(ProtocolError::MissingTerminator)
        );
    }

    #[test]
    fn test_segment_bytes_renders_integers_as_decimal() {
        assert_eq!(
            Argument::Integer(-7).segment_bytes().as_ref(),
            b"-7".as_slice()
        );
        assert_eq!(
            bytes_arg(b"abc").segment_bytes().as_ref(),
            b"abc".as_slice()
        );
    }

    #[test]
    fn test_reply_encoders() {
        assert_eq!(encode_simple_string("OK"), b"+OK\r\n");
        assert_eq!(encode_error("unknown command"), b"-ERR unknown command\r\n");
        assert_eq!(encode_integer(30), b":30\r\n");
        assert_eq!(encode_bulk(b"hi"), b"$2\r\nhi\r\n");
        assert_eq!(encode_nil(), b"$-1\r\n");

        let mut out = Vec::new();
        append_array_header(&mut out, 2);
        append_bulk(&mut out, b"age");
        append_integer(&mut out, 30);
        assert_eq!(out, b"*2\r\n$3\r\nage\r\n:30\r\n");
    }
}
