//! This contains the typed, ordered parameter bundles a trace set can carry.
//!
//! Per-trace parameters are stored as a bare concatenation of values inside
//! each trace's data blob; the framing lives in a separate definition map
//! which is serialized into the header under
//! [`TrsTag::TraceParameterDefinitions`](crate::tags::TrsTag). Trace set
//! wide parameters are self-describing and live whole under
//! [`TrsTag::TraceSetParameters`](crate::tags::TrsTag).
//!
//! All multi-byte values are little-endian; strings count bytes, not code
//! points; bools are written as exactly 0 or 1 and read as non-zero = true.
use indexmap::IndexMap;
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};
use std::convert::{TryFrom, TryInto};

use crate::enums::ParameterKind;
use crate::errors::*;

/// A homogeneous run of parameter values of one kind.
///
/// A "scalar" parameter is simply the length one case; the scalar accessors
/// on [`ParameterMap`] expose the first element directly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum ParameterValue {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(String),
    Bool(Vec<bool>),
}

impl ParameterValue {
    /// The wire kind of this value.
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Byte(_) => ParameterKind::Byte,
            Self::Short(_) => ParameterKind::Short,
            Self::Int(_) => ParameterKind::Int,
            Self::Long(_) => ParameterKind::Long,
            Self::Float(_) => ParameterKind::Float,
            Self::Double(_) => ParameterKind::Double,
            Self::String(_) => ParameterKind::String,
            Self::Bool(_) => ParameterKind::Bool,
        }
    }

    /// The element count. Strings count bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.as_bytes().len(),
            Self::Bool(v) => v.len(),
        }
    }

    /// Obligatory `is_empty` method.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The serialized size in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.kind().element_size()
    }

    /// Append the little-endian serialization of the values to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Self::Byte(v) => out.extend(v.iter().map(|x| *x as u8)),
            Self::Short(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::Int(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::Long(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::Double(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Self::String(v) => out.extend_from_slice(v.as_bytes()),
            Self::Bool(v) => out.extend(v.iter().map(|x| *x as u8)),
        }
    }

    /// Decode `length` elements of `kind` from `bytes`.
    ///
    /// `bytes` must hold exactly `length * element_size` bytes.
    pub fn deserialize(kind: ParameterKind, length: usize, bytes: &[u8]) -> Result<Self, TrsError> {
        let expected = length * kind.element_size();
        if bytes.len() != expected {
            return Err(TrsError::ParameterLengthMismatch {
                actual: bytes.len(),
                expected,
            });
        }
        let value = match kind {
            ParameterKind::Byte => Self::Byte(bytes.iter().map(|b| *b as i8).collect()),
            ParameterKind::Short => Self::Short(decode_run(bytes, i16::from_le_bytes)?),
            ParameterKind::Int => Self::Int(decode_run(bytes, i32::from_le_bytes)?),
            ParameterKind::Long => Self::Long(decode_run(bytes, i64::from_le_bytes)?),
            ParameterKind::Float => Self::Float(decode_run(bytes, f32::from_le_bytes)?),
            ParameterKind::Double => Self::Double(decode_run(bytes, f64::from_le_bytes)?),
            ParameterKind::String => Self::String(String::from_utf8_lossy(bytes).to_string()),
            ParameterKind::Bool => Self::Bool(bytes.iter().map(|b| *b != 0).collect()),
        };
        Ok(value)
    }
}

fn decode_run<T, const N: usize>(
    bytes: &[u8],
    from_le: fn([u8; N]) -> T,
) -> Result<Vec<T>, TrsError> {
    let mut out = Vec::with_capacity(bytes.len() / N);
    for chunk in bytes.chunks_exact(N) {
        out.push(from_le(chunk.try_into()?));
    }
    Ok(out)
}

/// This trait projects Rust scalars in and out of [`ParameterValue`] so
/// that the typed accessors on [`ParameterMap`] can be written once.
///
/// It is implemented for the seven numeric/bool element types; strings go
/// through their own accessors since their length is counted in bytes.
pub trait ParameterData: Sized {
    /// The wire kind values of this type are stored under.
    fn kind() -> ParameterKind;
    /// Wrap a run of values.
    fn into_value(values: Vec<Self>) -> ParameterValue;
    /// Borrow the run back out, or `None` if `value` holds another kind.
    fn from_value(value: &ParameterValue) -> Option<&[Self]>;
}

macro_rules! impl_parameter_data {
    ($rust:ty, $kind:ident) => {
        impl ParameterData for $rust {
            fn kind() -> ParameterKind {
                ParameterKind::$kind
            }
            fn into_value(values: Vec<Self>) -> ParameterValue {
                ParameterValue::$kind(values)
            }
            fn from_value(value: &ParameterValue) -> Option<&[Self]> {
                match value {
                    ParameterValue::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_parameter_data!(i8, Byte);
impl_parameter_data!(i16, Short);
impl_parameter_data!(i32, Int);
impl_parameter_data!(i64, Long);
impl_parameter_data!(f32, Float);
impl_parameter_data!(f64, Double);
impl_parameter_data!(bool, Bool);

/// An ordered mapping from parameter name to typed value.
///
/// Serialization writes the values back-to-back in insertion order with no
/// per-entry framing; the framing is carried by a separate
/// [`TraceParameterDefinitionMap`].
///
/// ```
/// use giga_trs_core::{ParameterMap, TraceParameterDefinitionMap};
///
/// let mut map = ParameterMap::new();
/// map.insert_array("iv", vec![0xdeu8 as i8, 0xadu8 as i8]).unwrap();
/// map.insert_array("ct", vec![1i32, 2, 3]).unwrap();
/// map.insert_scalar("attempts", 7i16);
///
/// let defs = TraceParameterDefinitionMap::from_map(&map).unwrap();
/// let blob = map.to_bytes();
/// assert_eq!(blob.len(), defs.total_size());
///
/// let back = ParameterMap::from_bytes(&blob, &defs).unwrap();
/// assert_eq!(back, map);
/// assert_eq!(back.get_scalar::<i16>("attempts").unwrap(), 7);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct ParameterMap {
    entries: IndexMap<String, ParameterValue>,
}

impl ParameterMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Obligatory `is_empty` method.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a parameter with this name exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate the parameters in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ParameterValue> {
        self.entries.iter()
    }

    /// Insert a parameter. Empty runs are rejected: every parameter must
    /// hold at least one element.
    pub fn insert<N: Into<String>>(&mut self, name: N, value: ParameterValue) -> Result<(), TrsError> {
        if value.is_empty() {
            return Err(TrsError::ParameterLengthMismatch {
                actual: 0,
                expected: value.kind().element_size(),
            });
        }
        self.entries.insert(name.into(), value);
        Ok(())
    }

    /// Insert a single-element parameter.
    pub fn insert_scalar<N: Into<String>, T: ParameterData>(&mut self, name: N, value: T) {
        self.entries.insert(name.into(), T::into_value(vec![value]));
    }

    /// Insert an array parameter. Empty arrays are rejected.
    pub fn insert_array<N: Into<String>, T: ParameterData>(
        &mut self,
        name: N,
        values: Vec<T>,
    ) -> Result<(), TrsError> {
        self.insert(name, T::into_value(values))
    }

    /// Insert a string parameter. Empty strings are rejected.
    pub fn insert_string<N: Into<String>, S: Into<String>>(
        &mut self,
        name: N,
        value: S,
    ) -> Result<(), TrsError> {
        self.insert(name, ParameterValue::String(value.into()))
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Result<&ParameterValue, TrsError> {
        self.entries.get(name).ok_or_else(|| TrsError::KeyNotFound {
            name: name.to_string(),
        })
    }

    /// Get the first element of a parameter as a scalar.
    pub fn get_scalar<T: ParameterData>(&self, name: &str) -> Result<T, TrsError>
    where
        T: Copy,
    {
        self.get_array::<T>(name).map(|v| v[0])
    }

    /// Borrow the full run of a parameter.
    pub fn get_array<T: ParameterData>(&self, name: &str) -> Result<&[T], TrsError> {
        let value = self.get(name)?;
        T::from_value(value).ok_or_else(|| TrsError::TypeMismatch {
            key: name.to_string(),
            requested: kind_label(T::kind()),
            actual: kind_label(value.kind()),
        })
    }

    /// Borrow a string parameter.
    pub fn get_string(&self, name: &str) -> Result<&str, TrsError> {
        match self.get(name)? {
            ParameterValue::String(s) => Ok(s),
            other => Err(TrsError::TypeMismatch {
                key: name.to_string(),
                requested: kind_label(ParameterKind::String),
                actual: kind_label(other.kind()),
            }),
        }
    }

    /// The serialized size of the map in bytes.
    pub fn total_size(&self) -> usize {
        self.entries.values().map(ParameterValue::byte_len).sum()
    }

    /// Serialize the values back-to-back in insertion order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size());
        for value in self.entries.values() {
            value.serialize(&mut out);
        }
        out
    }

    /// Decode a parameter blob using a definition map as the schema.
    ///
    /// The blob must hold exactly [`TraceParameterDefinitionMap::total_size`]
    /// bytes; in particular an empty blob against non-empty definitions is
    /// a length mismatch with `actual = 0`. The result is an immutable
    /// [`ParameterMapView`].
    pub fn from_bytes(
        bytes: &[u8],
        definitions: &TraceParameterDefinitionMap,
    ) -> Result<ParameterMapView, TrsError> {
        let expected = definitions.total_size();
        if bytes.len() != expected {
            return Err(TrsError::ParameterLengthMismatch {
                actual: bytes.len(),
                expected,
            });
        }
        let mut map = ParameterMap::new();
        let mut pos = 0usize;
        for (name, def) in definitions.iter() {
            let take = def.length as usize * def.kind.element_size();
            let value =
                ParameterValue::deserialize(def.kind, def.length as usize, &bytes[pos..pos + take])?;
            pos += take;
            map.insert(name.clone(), value)?;
        }
        Ok(ParameterMapView { inner: map })
    }
}

/// An immutable view over a deserialized [`ParameterMap`].
///
/// The view only exposes lookup operations; [`ParameterMapView::into_map`]
/// is the explicit escape into a mutable copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapView {
    inner: ParameterMap,
}

impl ParameterMapView {
    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Obligatory `is_empty` method.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether a parameter with this name exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Iterate the parameters in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ParameterValue> {
        self.inner.iter()
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Result<&ParameterValue, TrsError> {
        self.inner.get(name)
    }

    /// Get the first element of a parameter as a scalar.
    pub fn get_scalar<T: ParameterData + Copy>(&self, name: &str) -> Result<T, TrsError> {
        self.inner.get_scalar(name)
    }

    /// Borrow the full run of a parameter.
    pub fn get_array<T: ParameterData>(&self, name: &str) -> Result<&[T], TrsError> {
        self.inner.get_array(name)
    }

    /// Borrow a string parameter.
    pub fn get_string(&self, name: &str) -> Result<&str, TrsError> {
        self.inner.get_string(name)
    }

    /// Serialize the values back-to-back in insertion order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    /// Give up immutability, turning the view into a plain map.
    pub fn into_map(self) -> ParameterMap {
        self.inner
    }
}

impl PartialEq<ParameterMap> for ParameterMapView {
    fn eq(&self, other: &ParameterMap) -> bool {
        &self.inner == other
    }
}

impl PartialEq<ParameterMapView> for ParameterMap {
    fn eq(&self, other: &ParameterMapView) -> bool {
        self == &other.inner
    }
}

/// The layout of one parameter inside a per-trace blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct ParameterDefinition {
    pub kind: ParameterKind,
    /// Element count; at least one.
    pub length: u16,
    /// Byte offset of the first element within the blob.
    pub offset: u16,
}

/// The schema of the per-trace parameter blobs.
///
/// Offsets increase monotonically in insertion order and exactly tile the
/// blob, so the total size doubles as the expected blob length. The map is
/// serialized into the header under
/// [`TrsTag::TraceParameterDefinitions`](crate::tags::TrsTag).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct TraceParameterDefinitionMap {
    entries: IndexMap<String, ParameterDefinition>,
}

impl TraceParameterDefinitionMap {
    /// Create an empty definition map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive definitions from a prototype map: same keys, same order,
    /// offsets accumulated over the serialized sizes.
    pub fn from_map(map: &ParameterMap) -> Result<Self, TrsError> {
        let mut entries = IndexMap::with_capacity(map.len());
        let mut offset = 0usize;
        for (name, value) in map.iter() {
            let def = ParameterDefinition {
                kind: value.kind(),
                length: fit_u16(value.len(), "parameter length")?,
                offset: fit_u16(offset, "parameter offset")?,
            };
            entries.insert(name.clone(), def);
            offset += value.byte_len();
        }
        Ok(Self { entries })
    }

    /// The number of definitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Obligatory `is_empty` method.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a definition.
    pub fn insert<N: Into<String>>(&mut self, name: N, def: ParameterDefinition) {
        self.entries.insert(name.into(), def);
    }

    /// Look up a definition by name.
    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.entries.get(name)
    }

    /// Iterate the definitions in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ParameterDefinition> {
        self.entries.iter()
    }

    /// The byte length of a blob laid out by these definitions.
    pub fn total_size(&self) -> usize {
        self.entries
            .values()
            .map(|d| d.length as usize * d.kind.element_size())
            .sum()
    }

    /// Serialize the definition map for embedding into the header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrsError> {
        let mut out = Vec::new();
        out.extend_from_slice(&fit_u16(self.entries.len(), "definition count")?.to_le_bytes());
        for (name, def) in &self.entries {
            let name_bytes = name.as_bytes();
            out.extend_from_slice(&fit_u16(name_bytes.len(), "parameter name")?.to_le_bytes());
            out.extend_from_slice(name_bytes);
            out.push(def.kind.code());
            out.extend_from_slice(&def.length.to_le_bytes());
            out.extend_from_slice(&def.offset.to_le_bytes());
        }
        Ok(out)
    }

    /// Parse a definition map embedded in a header.
    ///
    /// Checks the layout invariant: offsets must increase monotonically and
    /// exactly tile the blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrsError> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.take_u16()? as usize;
        let mut entries = IndexMap::with_capacity(count);
        let mut expected_offset = 0usize;
        for _ in 0..count {
            let name_len = cursor.take_u16()? as usize;
            let name = String::from_utf8_lossy(cursor.take(name_len)?).to_string();
            let kind = ParameterKind::new(cursor.take_u8()?)?;
            let length = cursor.take_u16()?;
            let offset = cursor.take_u16()?;
            if length == 0 {
                return Err(TrsError::TrsFormat {
                    msg: format!("parameter \"{}\" is defined with length 0", name),
                });
            }
            if offset as usize != expected_offset {
                return Err(TrsError::TrsFormat {
                    msg: format!(
                        "parameter \"{}\" starts at offset {}, expected {}",
                        name, offset, expected_offset
                    ),
                });
            }
            expected_offset += length as usize * kind.element_size();
            entries.insert(name, ParameterDefinition { kind, length, offset });
        }
        if !cursor.exhausted() {
            return Err(TrsError::TrsFormat {
                msg: "trailing bytes after the parameter definitions".to_string(),
            });
        }
        Ok(Self { entries })
    }
}

/// Trace set wide parameters: a self-describing bundle stored whole under
/// [`TrsTag::TraceSetParameters`](crate::tags::TrsTag).
///
/// Unlike the per-trace blobs, each serialized entry carries its own name,
/// kind and length, so no separate definition map is needed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct TraceSetParameterMap {
    inner: ParameterMap,
}

impl TraceSetParameterMap {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the underlying map.
    pub fn map(&self) -> &ParameterMap {
        &self.inner
    }

    /// Mutably borrow the underlying map.
    pub fn map_mut(&mut self) -> &mut ParameterMap {
        &mut self.inner
    }

    /// Serialize the bundle for embedding into the header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrsError> {
        let mut out = Vec::new();
        out.extend_from_slice(&fit_u16(self.inner.len(), "parameter count")?.to_le_bytes());
        for (name, value) in self.inner.iter() {
            let name_bytes = name.as_bytes();
            out.extend_from_slice(&fit_u16(name_bytes.len(), "parameter name")?.to_le_bytes());
            out.extend_from_slice(name_bytes);
            out.push(value.kind().code());
            out.extend_from_slice(&fit_u16(value.len(), "parameter length")?.to_le_bytes());
            value.serialize(&mut out);
        }
        Ok(out)
    }

    /// Parse a bundle embedded in a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrsError> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.take_u16()? as usize;
        let mut inner = ParameterMap::new();
        for _ in 0..count {
            let name_len = cursor.take_u16()? as usize;
            let name = String::from_utf8_lossy(cursor.take(name_len)?).to_string();
            let kind = ParameterKind::new(cursor.take_u8()?)?;
            let length = cursor.take_u16()? as usize;
            let raw = cursor.take(length * kind.element_size())?;
            inner.insert(name, ParameterValue::deserialize(kind, length, raw)?)?;
        }
        if !cursor.exhausted() {
            return Err(TrsError::TrsFormat {
                msg: "trailing bytes after the trace set parameters".to_string(),
            });
        }
        Ok(Self { inner })
    }
}

/// A way to save LOC when walking serialized parameter tables.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TrsError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or_else(|| TrsError::TrsFormat {
                msg: "parameter table is truncated".to_string(),
            })?;
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, TrsError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, TrsError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into()?))
    }

    fn exhausted(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn fit_u16(value: usize, what: &str) -> Result<u16, TrsError> {
    u16::try_from(value).map_err(|_| TrsError::TrsFormat {
        msg: format!("{} {} does not fit in 16 bits", what, value),
    })
}

fn kind_label(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Byte => "Byte",
        ParameterKind::Short => "Short",
        ParameterKind::Int => "Int",
        ParameterKind::Long => "Long",
        ParameterKind::Float => "Float",
        ParameterKind::Double => "Double",
        ParameterKind::String => "String",
        ParameterKind::Bool => "Bool",
    }
}
