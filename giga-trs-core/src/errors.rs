use crate::enums::Encoding;
use crate::tags::TrsTag;

/// Basic Error types.
#[derive(Debug)]
pub enum TrsError {
    /// TryFromSliceError from the std library.
    TryFromSlice(std::array::TryFromSliceError),
    /// IoError from the std library.
    StdIoError(std::io::Error),
    /// Map file error (this is just a `std::io` error when mapping files).
    MapFile(std::io::Error),
    /// A tag identifier byte that is not part of the TRS tag set.
    UnknownTag { id: u8 },
    /// A sample coding code that does not resolve to a usable encoding.
    UnknownEncoding { code: i32 },
    /// A required header tag was absent when parsing or emitting a header.
    MissingRequiredTag { tag: TrsTag },
    /// Structural problems with the TRS data: truncation, bad TLV value
    /// lengths, unknown parameter kind codes, header re-emission drift.
    TrsFormat { msg: String },
    /// The file length does not match `header + trace_size * trace_count`.
    FileSizeMismatch { expected: u64, actual: u64 },
    /// Operation on a closed trace set.
    NotOpen,
    /// `get(i)` beyond the number of traces in the set.
    IndexOutOfBounds { index: usize, count: usize },
    /// An added trace does not match the shape fixed by the first trace.
    ShapeMismatch {
        field: TrsTag,
        got: f64,
        expected: f64,
    },
    /// A sample cannot be stored in the trace set's sample coding.
    SampleOutOfRange { value: f32, coding: Encoding },
    /// A parameter blob whose length does not match its definitions.
    ParameterLengthMismatch { actual: usize, expected: usize },
    /// A typed parameter accessor used with the wrong kind.
    TypeMismatch {
        key: String,
        requested: &'static str,
        actual: &'static str,
    },
    /// Parameter map lookup miss.
    KeyNotFound { name: String },
    #[cfg(feature = "to_json")]
    /// Serialisation/Deserialisation error.
    SerdeError(serde_json::Error),
}

impl From<std::array::TryFromSliceError> for TrsError {
    fn from(e: std::array::TryFromSliceError) -> Self {
        Self::TryFromSlice(e)
    }
}

impl From<std::io::Error> for TrsError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl std::fmt::Display for TrsError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use self::TrsError::*;
        match self {
            #[cfg(feature = "to_json")]
            SerdeError(x) => write!(fmt, "{}", x),
            StdIoError(x) => write!(fmt, "{}", x),
            TryFromSlice(x) => write!(fmt, "{}", x),
            MapFile(e) => write!(fmt, "Could not create file map: {}", e),
            UnknownTag { id } => write!(fmt, "Unknown TRS header tag: 0x{:02X}", id),
            UnknownEncoding { code } => write!(fmt, "Unknown sample coding: 0x{:02X}", code),
            MissingRequiredTag { tag } => write!(fmt, "Required header tag {} is missing", tag),
            TrsFormat { msg } => write!(fmt, "Malformed TRS data: {}", msg),
            FileSizeMismatch { expected, actual } => write!(
                fmt,
                "File is {}-bytes, but the header declares {}-bytes of traces",
                actual, expected
            ),
            NotOpen => write!(fmt, "The trace set has been closed"),
            IndexOutOfBounds { index, count } => write!(
                fmt,
                "Trace no. {} not found (the set holds {} traces)",
                index, count
            ),
            ShapeMismatch {
                field,
                got,
                expected,
            } => write!(
                fmt,
                "Added trace has {} = {}, but the trace set is bound to {}",
                field, got, expected
            ),
            SampleOutOfRange { value, coding } => {
                write!(fmt, "Sample {} does not fit coding {}", value, coding)
            }
            ParameterLengthMismatch { actual, expected } => write!(
                fmt,
                "Parameter data is {}-bytes, but the definitions take {}-bytes",
                actual, expected
            ),
            TypeMismatch {
                key,
                requested,
                actual,
            } => write!(
                fmt,
                "Parameter \"{}\" was requested as {}, but holds {}",
                key, requested, actual
            ),
            KeyNotFound { name } => write!(fmt, "No parameter named \"{}\"", name),
        }
    }
}

impl From<TrsError> for String {
    fn from(e: TrsError) -> String {
        e.to_string()
    }
}

impl std::error::Error for TrsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::TrsError::*;
        match self {
            #[cfg(feature = "to_json")]
            SerdeError(x) => x.source(),
            StdIoError(x) | MapFile(x) => x.source(),
            TryFromSlice(x) => x.source(),
            _ => None,
        }
    }
}
