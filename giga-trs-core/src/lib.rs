//! This library is the foundation for the `giga-trs-in` and `giga-trs-out` crates. It can be built
//! either with serialization support, or in a slightly more lightweight manner without it (see
//! features).
//!
//! A TRS trace set is a binary container for measurement traces (typically side-channel power or
//! electromagnetic captures): a tag-length-value header followed by fixed-size trace records, each
//! carrying a title, a raw data blob and a run of numeric samples. This crate holds the pieces the
//! reading and writing crates share: the tag and encoding registries, the header codec, the typed
//! parameter maps and the [`Trace`] value type.
#![allow(clippy::derive_partial_eq_without_eq)]
extern crate num;
#[macro_use]
extern crate num_derive;

#[cfg(any(feature = "to_json", feature = "serde"))]
extern crate serde;
#[cfg(feature = "to_json")]
extern crate serde_json;

pub mod bitconverter;
pub mod enums;
pub mod errors;
pub mod metadata;
pub mod parameters;
pub mod tags;

pub use errors::TrsError;

pub use enums::*;
pub use metadata::{TagValue, TrsMetaData};
pub use parameters::{
    ParameterData, ParameterDefinition, ParameterMap, ParameterMapView, ParameterValue,
    TraceParameterDefinitionMap, TraceSetParameterMap,
};
pub use tags::{TagKind, TrsTag};

#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};

/// This structure represents a single trace: one captured signal.
///
/// It is a plain value type. On disk a trace occupies
/// `TITLE_SPACE + DATA_LENGTH + NUMBER_OF_SAMPLES * sample size` bytes; the
/// reader widens stored samples to `f32` regardless of the sample coding,
/// and the writer narrows them back.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct Trace {
    /// The title of this individual trace.
    pub title: String,
    /// The raw data blob; when the set carries parameter definitions this
    /// is the serialized parameter map.
    pub data: Vec<u8>,
    /// The measured samples.
    pub samples: Vec<f32>,
    /// Sampling frequency in Hz; the header stores its reciprocal under
    /// [`TrsTag::ScaleX`].
    pub sample_frequency: f32,
}

impl Trace {
    /// Construct a new trace.
    pub fn new(title: String, data: Vec<u8>, samples: Vec<f32>, sample_frequency: f32) -> Self {
        Trace {
            title,
            data,
            samples,
            sample_frequency,
        }
    }

    /// The number of samples in this trace.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// The narrowest sample coding that holds every sample of this trace.
    ///
    /// Any fractional sample, or one beyond the `i32` range, forces
    /// [`Encoding::Float`]; otherwise the narrowest integer coding that
    /// fits the largest magnitude is chosen.
    /// ```
    /// use giga_trs_core::{Encoding, Trace};
    ///
    /// let t = Trace::new("t".to_string(), vec![], vec![1.0, -3.0], 1.0);
    /// assert_eq!(t.preferred_coding(), Encoding::Byte);
    /// let t = Trace::new("t".to_string(), vec![], vec![0.5, 1.0], 1.0);
    /// assert_eq!(t.preferred_coding(), Encoding::Float);
    /// let t = Trace::new("t".to_string(), vec![], vec![40_000.0], 1.0);
    /// assert_eq!(t.preferred_coding(), Encoding::Int);
    /// ```
    pub fn preferred_coding(&self) -> Encoding {
        let mut max = 0f64;
        for sample in &self.samples {
            let sample = *sample as f64;
            if sample.fract() != 0.0 || sample.abs() > i32::MAX as f64 {
                return Encoding::Float;
            }
            max = max.max(sample.abs());
        }
        if max < (1 << 7) as f64 {
            Encoding::Byte
        } else if max < (1 << 15) as f64 {
            Encoding::Short
        } else {
            Encoding::Int
        }
    }

    /// Decode the data blob as a parameter map laid out by `definitions`.
    pub fn parameter_map(
        &self,
        definitions: &TraceParameterDefinitionMap,
    ) -> Result<ParameterMapView, TrsError> {
        ParameterMap::from_bytes(&self.data, definitions)
    }
}
