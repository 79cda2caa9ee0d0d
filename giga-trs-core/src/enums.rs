//! This contains the enums that describe how on-disk values are encoded.
//!
//! A TRS trace set stores its samples in one of a small set of numeric
//! representations, and its per-trace parameters in a slightly larger set.
//! Both sets are closed and keyed by a one-byte code in the file, which
//! lends itself well to being represented by enums.
//!
//! As a general rule, a code that cannot be resolved maps to the `Illegal`
//! variant rather than crashing, and it is for the consuming reader or
//! writer to reject `Illegal` codings with a proper error.
use num::FromPrimitive;
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};

use crate::errors::*;

/// The numeric representation of on-disk samples.
///
/// The code stored in the header under [`crate::tags::TrsTag::SampleCoding`]
/// carries the sample byte length in its low nibble; bit 4 marks a floating
/// point representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum Encoding {
    Illegal = 0x00,
    Byte = 0x01,
    Short = 0x02,
    Int = 0x04,
    Float = 0x14,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl Encoding {
    /// Resolve an on-disk coding code. Unknown codes resolve to `Illegal`.
    pub fn new(code: i32) -> Self {
        Self::from_i32(code).unwrap_or(Self::Illegal)
    }

    /// The code as stored in the header.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The byte length of a single sample.
    pub fn size(self) -> usize {
        match self {
            Self::Illegal => 0,
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 4,
            Self::Float => 4,
        }
    }

    /// The inclusive range of integers this coding can hold, or `None`
    /// for non-integer codings.
    pub fn int_range(self) -> Option<(f64, f64)> {
        match self {
            Self::Byte => Some((i8::MIN as f64, i8::MAX as f64)),
            Self::Short => Some((i16::MIN as f64, i16::MAX as f64)),
            Self::Int => Some((i32::MIN as f64, i32::MAX as f64)),
            Self::Float | Self::Illegal => None,
        }
    }
}

/// The value kind of a single trace parameter.
///
/// The low nibble of the code carries the element byte length for the
/// numeric kinds; `String` and `Bool` have their own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum ParameterKind {
    Byte = 0x01,
    Short = 0x02,
    Int = 0x04,
    Long = 0x08,
    Float = 0x14,
    Double = 0x18,
    String = 0x20,
    Bool = 0x31,
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl ParameterKind {
    /// Resolve an on-disk parameter kind code.
    pub fn new(code: u8) -> Result<Self, TrsError> {
        Self::from_u8(code).ok_or_else(|| TrsError::TrsFormat {
            msg: format!("unknown parameter kind code 0x{:02X}", code),
        })
    }

    /// The code as stored in a definition map.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The byte length of a single element of this kind.
    ///
    /// `String` counts UTF-8 code units, so its element is one byte.
    pub fn element_size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 4,
            Self::Long => 8,
            Self::Float => 4,
            Self::Double => 8,
            Self::String => 1,
            Self::Bool => 1,
        }
    }
}
