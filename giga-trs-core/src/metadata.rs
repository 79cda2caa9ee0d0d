//! This contains the TRS header map and its tag-length-value codec.
//!
//! The header is a sequence of `(tag, length, value)` records terminated by
//! the [`TrsTag::TraceBlock`] sentinel; everything after the sentinel is
//! trace data. All multi-byte values are little-endian.
use indexmap::IndexMap;
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};
use std::convert::{TryFrom, TryInto};

use crate::errors::*;
use crate::tags::{TagKind, TrsTag};

/// The value carried by one header tag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum TagValue {
    Int(i32),
    Float(f32),
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl TagValue {
    /// The kind of this value.
    pub fn kind(&self) -> TagKind {
        match self {
            Self::Int(_) => TagKind::Int,
            Self::Float(_) => TagKind::Float,
            Self::Str(_) => TagKind::Str,
            Self::Bool(_) => TagKind::Bool,
            Self::Bytes(_) => TagKind::Bytes,
        }
    }

    /// Encode the value bytes for a record of the given tag.
    fn value_bytes(&self, tag: TrsTag) -> Vec<u8> {
        match self {
            Self::Int(v) => encode_int(*v, tag.default_length()),
            Self::Float(v) => v.to_le_bytes().to_vec(),
            Self::Str(v) => v.as_bytes().to_vec(),
            Self::Bool(v) => vec![*v as u8],
            Self::Bytes(v) => v.clone(),
        }
    }

    /// Decode value bytes according to a tag's kind.
    fn from_value_bytes(kind: TagKind, bytes: &[u8]) -> Result<Self, TrsError> {
        match kind {
            TagKind::Int => decode_int(bytes).map(Self::Int),
            TagKind::Float => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| TrsError::TrsFormat {
                    msg: format!("float tag value is {}-bytes, must be 4", bytes.len()),
                })?;
                Ok(Self::Float(f32::from_le_bytes(raw)))
            }
            TagKind::Str => Ok(Self::Str(String::from_utf8_lossy(bytes).to_string())),
            TagKind::Bool => match bytes {
                [b] => Ok(Self::Bool(*b != 0)),
                _ => Err(TrsError::TrsFormat {
                    msg: format!("bool tag value is {}-bytes, must be 1", bytes.len()),
                }),
            },
            TagKind::Bytes => Ok(Self::Bytes(bytes.to_vec())),
        }
    }
}

/// Append the TLV length of a record to `out`.
///
/// Lengths below 0x80 take a single byte. Larger lengths are written as
/// `0x80 | n` followed by `n` little-endian bytes.
pub(crate) fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let le = (len as u64).to_le_bytes();
    let n = 8 - le.iter().rev().take_while(|b| **b == 0).count();
    out.push(0x80 | n as u8);
    out.extend_from_slice(&le[..n]);
}

/// Decode a TLV length, returning `(length, bytes consumed)`.
pub(crate) fn decode_length(bytes: &[u8]) -> Result<(usize, usize), TrsError> {
    let first = *bytes.first().ok_or_else(|| TrsError::TrsFormat {
        msg: "header ends inside a record length".to_string(),
    })?;
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }
    let n = (first & 0x7F) as usize;
    if n > 8 {
        return Err(TrsError::TrsFormat {
            msg: format!("record length occupies {} bytes", n),
        });
    }
    let rest = bytes.get(1..1 + n).ok_or_else(|| TrsError::TrsFormat {
        msg: "header ends inside a record length".to_string(),
    })?;
    let mut le = [0u8; 8];
    le[..n].copy_from_slice(rest);
    let len = u64::from_le_bytes(le);
    usize::try_from(len)
        .map(|len| (len, 1 + n))
        .map_err(|_| TrsError::TrsFormat {
            msg: format!("record length {} does not fit in memory", len),
        })
}

/// Encode a signed int little-endian using the smallest two's-complement
/// width that round-trips, but never fewer than `min_len` bytes.
pub(crate) fn encode_int(value: i32, min_len: usize) -> Vec<u8> {
    let le = value.to_le_bytes();
    let mut n = 4;
    while n > 1 {
        let sign_extended = (le[n - 1] == 0x00 && le[n - 2] & 0x80 == 0)
            || (le[n - 1] == 0xFF && le[n - 2] & 0x80 != 0);
        if !sign_extended {
            break;
        }
        n -= 1;
    }
    le[..n.max(min_len.min(4))].to_vec()
}

/// Decode a sign-extended little-endian int of one to four bytes.
pub(crate) fn decode_int(bytes: &[u8]) -> Result<i32, TrsError> {
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(TrsError::TrsFormat {
            msg: format!("int tag value is {}-bytes, must be 1 to 4", bytes.len()),
        });
    }
    let mut v: u32 = 0;
    for (i, b) in bytes.iter().enumerate() {
        v |= (*b as u32) << (8 * i);
    }
    let shift = 32 - 8 * bytes.len();
    Ok(((v << shift) as i32) >> shift)
}

/// The parsed TRS header: an insertion-ordered mapping from tag to value.
///
/// Tags that are absent fall back to their registry defaults when read
/// through the typed getters, which is also how the on-disk format treats
/// them.
///
/// ```
/// use giga_trs_core::{TagValue, TrsMetaData, TrsTag};
///
/// let mut m = TrsMetaData::new();
/// m.set(TrsTag::NumberOfTraces, TagValue::Int(10)).unwrap();
/// m.set(TrsTag::NumberOfSamples, TagValue::Int(3)).unwrap();
/// m.set(TrsTag::SampleCoding, TagValue::Int(0x02)).unwrap();
/// m.set(TrsTag::GlobalTitle, TagValue::Str("aes".to_string())).unwrap();
///
/// let bytes = m.as_bytes().unwrap();
/// let (back, consumed) = TrsMetaData::from_bytes(&bytes).unwrap();
/// assert_eq!(consumed, bytes.len());
/// assert_eq!(back, m);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct TrsMetaData {
    values: IndexMap<TrsTag, TagValue>,
}

impl TrsMetaData {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tag is explicitly present.
    pub fn is_present(&self, tag: TrsTag) -> bool {
        self.values.contains_key(&tag)
    }

    /// Get the explicitly present value of a tag, if any.
    pub fn get(&self, tag: TrsTag) -> Option<&TagValue> {
        self.values.get(&tag)
    }

    /// Set a tag. The value kind must match the tag's registered kind.
    pub fn set(&mut self, tag: TrsTag, value: TagValue) -> Result<(), TrsError> {
        if value.kind() != tag.value_kind() {
            return Err(TrsError::TypeMismatch {
                key: tag.to_string(),
                requested: kind_name(value.kind()),
                actual: kind_name(tag.value_kind()),
            });
        }
        self.values.insert(tag, value);
        Ok(())
    }

    /// Set a tag unless the caller already supplied a value for it.
    pub fn set_if_absent(&mut self, tag: TrsTag, value: TagValue) -> Result<(), TrsError> {
        if self.is_present(tag) {
            return Ok(());
        }
        self.set(tag, value)
    }

    /// Get an int tag, falling back to the registry default.
    pub fn get_int(&self, tag: TrsTag) -> i32 {
        match self.values.get(&tag) {
            Some(TagValue::Int(v)) => *v,
            _ => match tag.default_value() {
                TagValue::Int(v) => v,
                _ => 0,
            },
        }
    }

    /// Get a float tag, falling back to the registry default.
    pub fn get_float(&self, tag: TrsTag) -> f32 {
        match self.values.get(&tag) {
            Some(TagValue::Float(v)) => *v,
            _ => match tag.default_value() {
                TagValue::Float(v) => v,
                _ => 0.0,
            },
        }
    }

    /// Get a string tag, falling back to the registry default.
    pub fn get_str(&self, tag: TrsTag) -> String {
        match self.values.get(&tag) {
            Some(TagValue::Str(v)) => v.clone(),
            _ => match tag.default_value() {
                TagValue::Str(v) => v,
                _ => String::new(),
            },
        }
    }

    /// Get a bool tag, falling back to the registry default.
    pub fn get_bool(&self, tag: TrsTag) -> bool {
        match self.values.get(&tag) {
            Some(TagValue::Bool(v)) => *v,
            _ => matches!(tag.default_value(), TagValue::Bool(true)),
        }
    }

    /// Get a bytes tag, falling back to the registry default (empty).
    pub fn get_bytes(&self, tag: TrsTag) -> Vec<u8> {
        match self.values.get(&tag) {
            Some(TagValue::Bytes(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    /// Emit the header.
    ///
    /// Present tags are written in insertion order when they are required
    /// or differ from their default, followed by the
    /// [`TrsTag::TraceBlock`] sentinel with a zero length. All required
    /// tags must be present.
    pub fn as_bytes(&self) -> Result<Vec<u8>, TrsError> {
        for tag in [
            TrsTag::NumberOfTraces,
            TrsTag::NumberOfSamples,
            TrsTag::SampleCoding,
        ] {
            if !self.is_present(tag) {
                return Err(TrsError::MissingRequiredTag { tag });
            }
        }

        let mut output = Vec::with_capacity(64);
        for (tag, value) in &self.values {
            if *tag == TrsTag::TraceBlock {
                continue;
            }
            if !tag.required() && *value == tag.default_value() {
                continue;
            }
            let value_bytes = value.value_bytes(*tag);
            output.push(tag.id());
            encode_length(value_bytes.len(), &mut output);
            output.extend_from_slice(&value_bytes);
        }
        output.push(TrsTag::TraceBlock.id());
        output.push(0);
        Ok(output)
    }

    /// Parse a header from the start of `bytes`.
    ///
    /// Returns the map and the number of bytes consumed, i.e. the offset of
    /// the first trace record.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), TrsError> {
        let mut values = IndexMap::new();
        let mut pos = 0usize;
        loop {
            let id = *bytes.get(pos).ok_or_else(|| TrsError::TrsFormat {
                msg: "header is not terminated by a trace block tag".to_string(),
            })?;
            let tag = TrsTag::by_id(id)?;
            let (len, len_bytes) = decode_length(&bytes[pos + 1..])?;
            let value_start = pos + 1 + len_bytes;
            let value = bytes
                .get(value_start..value_start + len)
                .ok_or_else(|| TrsError::TrsFormat {
                    msg: format!("header record {} is truncated", tag),
                })?;
            pos = value_start + len;
            if tag == TrsTag::TraceBlock {
                break;
            }
            values.insert(tag, TagValue::from_value_bytes(tag.value_kind(), value)?);
        }

        for tag in [
            TrsTag::NumberOfTraces,
            TrsTag::NumberOfSamples,
            TrsTag::SampleCoding,
        ] {
            if !values.contains_key(&tag) {
                return Err(TrsError::MissingRequiredTag { tag });
            }
        }
        Ok((TrsMetaData { values }, pos))
    }

    #[cfg(feature = "to_json")]
    /// Serialize the header map to a JSON string.
    pub fn to_json(&self) -> Result<String, TrsError> {
        serde_json::to_string(self).map_err(TrsError::SerdeError)
    }
}

fn kind_name(kind: TagKind) -> &'static str {
    match kind {
        TagKind::Int => "Int",
        TagKind::Float => "Float",
        TagKind::Str => "Str",
        TagKind::Bool => "Bool",
        TagKind::Bytes => "Bytes",
    }
}
