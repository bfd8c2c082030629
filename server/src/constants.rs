//! Fixed limits shared across the server.

/// Maximum length in bytes of one key segment (table, key, or field).
/// Longer input is saturating-truncated, never rejected.
pub const MAX_SEGMENT_LENGTH: usize = 65_535;

/// Maximum length in bytes of a string value. Longer input is truncated.
pub const MAX_VALUE_LENGTH: usize = 65_535;

/// Number of client connection slots. Connections beyond this are dropped
/// at accept time; there is no queueing beyond the OS backlog.
pub const MAX_CLIENTS: usize = 100;

/// Size of the per-iteration socket read buffer. One read is expected to
/// hold one complete protocol frame.
pub const READ_BUFFER_SIZE: usize = 256_000;
