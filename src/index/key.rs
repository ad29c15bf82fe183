//! Index keys.
//!
//! Keys are fixed-length byte strings whose length is the indexed column's
//! length. [`KeyComparator`] is the only place that orders them.

use std::cmp::Ordering;
use std::fmt;

use crate::common::config::{KEY_PAD, MAX_CHAR_KEY_LENGTH};
use crate::common::{Error, Result};

/// Width of an encoded numeric key.
const NUMERIC_KEY_LEN: usize = 4;

/// Type of the indexed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Signed 32-bit integer, big-endian.
    Int,
    /// IEEE 754 single precision float, big-endian.
    Float,
    /// Fixed-width text of the given column length, padded with
    /// [`KEY_PAD`].
    Char(u8),
}

impl KeyKind {
    /// Text kind for a column of `len` bytes.
    ///
    /// # Errors
    /// `Error::InvalidKeyColumn` unless `1 <= len <= 255`.
    pub fn char(len: usize) -> Result<Self> {
        match u8::try_from(len) {
            Ok(n) if n > 0 => Ok(KeyKind::Char(n)),
            _ => Err(Error::InvalidKeyColumn(format!(
                "char column length {} outside 1..={}",
                len, MAX_CHAR_KEY_LENGTH
            ))),
        }
    }

    /// Encoded key length in bytes.
    #[inline]
    pub fn key_len(self) -> usize {
        match self {
            KeyKind::Int | KeyKind::Float => NUMERIC_KEY_LEN,
            KeyKind::Char(n) => n as usize,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Int => write!(f, "int"),
            KeyKind::Float => write!(f, "float"),
            KeyKind::Char(n) => write!(f, "char({})", n),
        }
    }
}

/// Three-way ordering over encoded keys of one kind.
///
/// # Example
/// ```
/// use blocktree::index::{int_key, KeyComparator, KeyKind};
/// use std::cmp::Ordering;
///
/// let cmp = KeyComparator::new(KeyKind::Int).unwrap();
/// assert_eq!(cmp.compare(&int_key(-5), &int_key(3)), Ordering::Less);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KeyComparator {
    kind: KeyKind,
}

impl KeyComparator {
    /// Create a comparator for `kind`.
    ///
    /// # Errors
    /// `Error::InvalidKeyColumn` for a zero-length text column.
    pub fn new(kind: KeyKind) -> Result<Self> {
        if kind.key_len() == 0 {
            return Err(Error::InvalidKeyColumn(
                "char column length must be at least 1".to_string(),
            ));
        }
        Ok(Self { kind })
    }

    #[inline]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    #[inline]
    pub fn key_len(&self) -> usize {
        self.kind.key_len()
    }

    /// Compare two encoded keys.
    ///
    /// Both must be `key_len` bytes, as produced by [`normalize`] or read
    /// back from a node.
    ///
    /// [`normalize`]: KeyComparator::normalize
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.kind {
            KeyKind::Int => decode_i32(a).cmp(&decode_i32(b)),
            // NaN never gets past normalize
            KeyKind::Float => decode_f32(a)
                .partial_cmp(&decode_f32(b))
                .unwrap_or(Ordering::Equal),
            KeyKind::Char(_) => a.cmp(b),
        }
    }

    /// Validate a caller-supplied key and return its stored form.
    ///
    /// Numeric keys must be exactly 4 bytes, and floats must not be NaN.
    /// Text keys may be shorter than the column and are padded with
    /// [`KEY_PAD`]; trailing pad bytes already present are accepted, any
    /// other pad byte is not.
    ///
    /// # Errors
    /// `Error::MalformedKey` when the key cannot belong to this column.
    pub fn normalize(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self.kind {
            KeyKind::Int | KeyKind::Float => {
                if raw.len() != NUMERIC_KEY_LEN {
                    return Err(Error::MalformedKey(format!(
                        "{} key must be {} bytes, got {}",
                        self.kind,
                        NUMERIC_KEY_LEN,
                        raw.len()
                    )));
                }
                if self.kind == KeyKind::Float && decode_f32(raw).is_nan() {
                    return Err(Error::MalformedKey("float key is NaN".to_string()));
                }
                Ok(raw.to_vec())
            }
            KeyKind::Char(n) => {
                let len = n as usize;
                let text = match raw.iter().rposition(|&b| b != KEY_PAD) {
                    Some(last) => &raw[..=last],
                    None => &[][..],
                };
                if text.len() > len {
                    return Err(Error::MalformedKey(format!(
                        "text key of {} bytes exceeds column length {}",
                        text.len(),
                        len
                    )));
                }
                if text.contains(&KEY_PAD) {
                    return Err(Error::MalformedKey(format!(
                        "text key contains reserved byte {:#04x}",
                        KEY_PAD
                    )));
                }
                let mut key = Vec::with_capacity(len);
                key.extend_from_slice(text);
                key.resize(len, KEY_PAD);
                Ok(key)
            }
        }
    }
}

/// Encode an integer key.
#[inline]
pub fn int_key(value: i32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Encode a float key.
#[inline]
pub fn float_key(value: f32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn decode_i32(bytes: &[u8]) -> i32 {
    let mut buf = [0u8; NUMERIC_KEY_LEN];
    buf.copy_from_slice(&bytes[..NUMERIC_KEY_LEN]);
    i32::from_be_bytes(buf)
}

fn decode_f32(bytes: &[u8]) -> f32 {
    let mut buf = [0u8; NUMERIC_KEY_LEN];
    buf.copy_from_slice(&bytes[..NUMERIC_KEY_LEN]);
    f32::from_be_bytes(buf)
}

/// Where a row lives in its table file: block number and byte offset
/// within that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecordLocator {
    pub block: u32,
    pub offset: u32,
}

impl RecordLocator {
    #[inline]
    pub fn new(block: u32, offset: u32) -> Self {
        Self { block, offset }
    }
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block, self.offset)
    }
}
