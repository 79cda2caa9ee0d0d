//! This contains the registry of TRS header tags.
//!
//! A TRS header is a sequence of tag-length-value records. The tag set is
//! fixed: each tag has a one-byte identifier, a value kind, a default value
//! and a required flag. Parsing an identifier outside this set is an error,
//! since there is no way of knowing how much of the header it occupies.
use num::FromPrimitive;
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::metadata::TagValue;

/// The value kind a header tag may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum TagKind {
    Int,
    Float,
    Str,
    Bool,
    Bytes,
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

/// A TRS header tag.
///
/// The discriminants are the identifier bytes as they appear on disk.
/// [`TrsTag::TraceBlock`] is the sentinel that terminates the header; the
/// trace records follow it immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum TrsTag {
    NumberOfTraces = 0x41,
    NumberOfSamples = 0x42,
    SampleCoding = 0x43,
    DataLength = 0x44,
    TitleSpace = 0x45,
    GlobalTitle = 0x46,
    Description = 0x47,
    OffsetX = 0x48,
    LabelX = 0x49,
    LabelY = 0x4A,
    ScaleX = 0x4B,
    ScaleY = 0x4C,
    TraceOffset = 0x4D,
    LogarithmicScale = 0x4E,
    TrsVersion = 0x4F,
    AcquisitionRangeOfScope = 0x55,
    AcquisitionCouplingOfScope = 0x56,
    AcquisitionOffsetOfScope = 0x57,
    AcquisitionInputRange = 0x58,
    AcquisitionDeviceId = 0x59,
    AcquisitionTypeFilter = 0x5A,
    AcquisitionFrequencyFilter = 0x5B,
    AcquisitionRangeFilter = 0x5C,
    TraceBlock = 0x5F,
    ExternalClockUsed = 0x60,
    ExternalClockThreshold = 0x61,
    ExternalClockMultiplier = 0x62,
    ExternalClockPhaseShift = 0x63,
    ExternalClockResamplerMask = 0x64,
    ExternalClockResamplerEnabled = 0x65,
    ExternalClockFrequency = 0x66,
    ExternalClockBase = 0x67,
    TraceSetParameters = 0x76,
    TraceParameterDefinitions = 0x77,
}

impl std::fmt::Display for TrsTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl TrsTag {
    /// Resolve an identifier byte from the file.
    pub fn by_id(id: u8) -> Result<Self, TrsError> {
        Self::from_u8(id).ok_or(TrsError::UnknownTag { id })
    }

    /// The identifier byte as written to the file.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// The value kind this tag holds.
    pub fn value_kind(self) -> TagKind {
        use self::TrsTag::*;
        match self {
            NumberOfTraces | NumberOfSamples | SampleCoding | DataLength | TitleSpace | OffsetX
            | TraceOffset | TrsVersion | AcquisitionCouplingOfScope | AcquisitionTypeFilter
            | ExternalClockMultiplier | ExternalClockPhaseShift | ExternalClockResamplerMask
            | ExternalClockBase => TagKind::Int,
            ScaleX | ScaleY | AcquisitionRangeOfScope | AcquisitionOffsetOfScope
            | AcquisitionInputRange | AcquisitionFrequencyFilter | AcquisitionRangeFilter
            | ExternalClockThreshold | ExternalClockFrequency => TagKind::Float,
            GlobalTitle | Description | LabelX | LabelY | AcquisitionDeviceId => TagKind::Str,
            LogarithmicScale | ExternalClockUsed | ExternalClockResamplerEnabled => TagKind::Bool,
            TraceBlock | TraceSetParameters | TraceParameterDefinitions => TagKind::Bytes,
        }
    }

    /// The minimum number of value bytes this tag is written with.
    ///
    /// Int tags are written with at least this many bytes even when the
    /// value would fit fewer; [`TrsTag::NumberOfTraces`] is pinned to four
    /// so that patching it in place never changes the header length.
    pub fn default_length(self) -> usize {
        use self::TrsTag::*;
        match self {
            NumberOfTraces | NumberOfSamples => 4,
            SampleCoding | TitleSpace | TrsVersion => 1,
            DataLength => 2,
            tag => match tag.value_kind() {
                TagKind::Int | TagKind::Float => 4,
                TagKind::Bool => 1,
                TagKind::Str | TagKind::Bytes => 0,
            },
        }
    }

    /// Whether a header is valid without this tag.
    pub fn required(self) -> bool {
        matches!(
            self,
            Self::NumberOfTraces | Self::NumberOfSamples | Self::SampleCoding | Self::TraceBlock
        )
    }

    /// The value assumed when the tag is absent from a header.
    pub fn default_value(self) -> TagValue {
        use self::TrsTag::*;
        match self {
            SampleCoding => TagValue::Int(crate::enums::Encoding::Float.code()),
            GlobalTitle => TagValue::Str("trace".to_string()),
            // A unit scale keeps `1 / SCALE_X` finite for files that omit it.
            ScaleX | ScaleY => TagValue::Float(1.0),
            tag => match tag.value_kind() {
                TagKind::Int => TagValue::Int(0),
                TagKind::Float => TagValue::Float(0.0),
                TagKind::Str => TagValue::Str(String::new()),
                TagKind::Bool => TagValue::Bool(false),
                TagKind::Bytes => TagValue::Bytes(Vec::new()),
            },
        }
    }
}
