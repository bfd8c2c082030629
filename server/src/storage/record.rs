//! Record key and value types for the hierarchical store.
//!
//! A record is addressed by three byte-string segments (table, key,
//! field) and holds either a signed 64-bit integer or a byte string.
//! Keys come in two forms behind one comparator-compatible interface:
//!
//! - [`RecordKey`]: owned, all three segments copied into a single
//!   contiguous allocation. This is the form stored in the index.
//! - [`ProbeKey`]: borrowed, pointing at caller-owned memory. Built in
//!   O(1) for find/scan probes that are never stored; dropping it
//!   releases nothing.
//!
//! # Ordering
//!
//! Segment comparison is length-first, then lexicographic: a shorter
//! segment always orders before a longer one regardless of content.
//! The full key order applies the segment comparator to table, then
//! key, then field. Range scans depend on this: the empty field
//! segment is the minimum possible field, so `(table, key, "")` is a
//! valid inclusive lower bound for "all fields of one key".

use std::cmp::Ordering;

use crate::constants::{MAX_SEGMENT_LENGTH, MAX_VALUE_LENGTH};

/// Access to the three segments of a key, owned or borrowed.
pub trait KeySegments {
    fn table(&self) -> &[u8];
    fn key(&self) -> &[u8];
    fn field(&self) -> &[u8];
}

/// An owned record key.
///
/// The segments live consecutively in one allocation after the length
/// header, matching their construction order. Immutable once built.
#[derive(Debug)]
pub struct RecordKey {
    data: Box<[u8]>,
    table_len: u16,
    key_len: u16,
}

impl RecordKey {
    /// Copy the three segments into a new owned key.
    ///
    /// Segments longer than [`MAX_SEGMENT_LENGTH`] are truncated.
    #[must_use]
    pub fn new(table: &[u8], key: &[u8], field: &[u8]) -> Self {
        let table = clamp_segment(table);
        let key = clamp_segment(key);
        let field = clamp_segment(field);

        let mut data = Vec::with_capacity(table.len() + key.len() + field.len());
        data.extend_from_slice(table);
        data.extend_from_slice(key);
        data.extend_from_slice(field);

        #[allow(clippy::cast_possible_truncation)] // clamped to MAX_SEGMENT_LENGTH above
        let (table_len, key_len) = (table.len() as u16, key.len() as u16);
        Self {
            data: data.into_boxed_slice(),
            table_len,
            key_len,
        }
    }
}

impl KeySegments for RecordKey {
    fn table(&self) -> &[u8] {
        &self.data[..self.table_len as usize]
    }

    fn key(&self) -> &[u8] {
        let start = self.table_len as usize;
        &self.data[start..start + self.key_len as usize]
    }

    fn field(&self) -> &[u8] {
        &self.data[self.table_len as usize + self.key_len as usize..]
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        compare_keys(self, other) == Ordering::Equal
    }
}

impl Eq for RecordKey {}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(self, other)
    }
}

/// A borrowed probe key for lookups and scan lower bounds.
#[derive(Debug, Clone, Copy)]
pub struct ProbeKey<'a> {
    table: &'a [u8],
    key: &'a [u8],
    field: &'a [u8],
}

impl<'a> ProbeKey<'a> {
    /// Borrow the three segments without copying.
    ///
    /// Applies the same [`MAX_SEGMENT_LENGTH`] truncation as
    /// [`RecordKey::new`] so a probe compares identically to the owned
    /// key built from the same input.
    #[must_use]
    pub fn new(table: &'a [u8], key: &'a [u8], field: &'a [u8]) -> Self {
        Self {
            table: clamp_segment(table),
            key: clamp_segment(key),
            field: clamp_segment(field),
        }
    }
}

impl KeySegments for ProbeKey<'_> {
    fn table(&self) -> &[u8] {
        self.table
    }

    fn key(&self) -> &[u8] {
        self.key
    }

    fn field(&self) -> &[u8] {
        self.field
    }
}

/// Compare two segments: shorter first, equal lengths byte-for-byte.
#[must_use]
pub fn compare_segments(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two keys segment by segment (table, key, field),
/// short-circuiting on the first non-equal segment.
pub fn compare_keys<A, B>(a: &A, b: &B) -> Ordering
where
    A: KeySegments + ?Sized,
    B: KeySegments + ?Sized,
{
    compare_segments(a.table(), b.table())
        .then_with(|| compare_segments(a.key(), b.key()))
        .then_with(|| compare_segments(a.field(), b.field()))
}

fn clamp_segment(segment: &[u8]) -> &[u8] {
    &segment[..segment.len().min(MAX_SEGMENT_LENGTH)]
}

/// A stored value: a signed 64-bit integer or a byte string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValue {
    Integer(i64),
    String(Box<[u8]>),
}

impl RecordValue {
    /// Build a string value, truncating to [`MAX_VALUE_LENGTH`] bytes.
    #[must_use]
    pub fn string(bytes: &[u8]) -> Self {
        let bytes = &bytes[..bytes.len().min(MAX_VALUE_LENGTH)];
        Self::String(bytes.into())
    }

    /// Build an integer value.
    #[must_use]
    pub const fn integer(n: i64) -> Self {
        Self::Integer(n)
    }
}
