// Copyright (C) 2022 by GiGa infosystems
//! This is a simplified library for writing TRS trace sets from rust. It is designed
//! purely for writing trace sets in a trace by trace manner: the first added trace fixes
//! the layout (sample count, data length, title space, sample coding and scale) and a
//! placeholder header is written; closing the set rewinds and patches the header with the
//! final trace count.
//!
//! This library is not designed for editing of TRS files, although it can theoretically
//! be accomplished with the clever use of `giga_trs_in`. However we do not recommend this.
extern crate giga_trs_core;
extern crate tinyvec;
#[cfg(test)]
extern crate giga_trs_in;
#[cfg(test)]
extern crate tempfile;

#[cfg(test)]
mod integration_tests;
pub mod write_data;

pub use giga_trs_core::enums;
pub use giga_trs_core::errors::*;
pub use giga_trs_core::{
    Encoding, TagValue, Trace, TraceParameterDefinitionMap, TraceSetParameterMap, TrsMetaData,
    TrsTag,
};

use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

/// A structure which represents a TRS file being written trace by trace.
///
/// The header stays mutable until the first trace is added; at that point
/// the layout is derived from the trace (without overwriting anything the
/// caller supplied) and committed to disk as a placeholder. On
/// [`TrsFile::close`] the header is rewritten in place with the final trace
/// count. The two emissions are byte-for-byte the same length, since the
/// count is pinned to a four byte encoding.
#[derive(Debug)]
pub struct TrsFile {
    /// Metadata, mutable until the first trace commits it.
    metadata: TrsMetaData,
    /// The file which the trace set is being written to.
    file: Option<File>,
    first_trace: bool,
    header_len: usize,
    number_of_samples: usize,
    data_length: usize,
    title_space: usize,
    coding: Encoding,
    scale_x: f32,
}

impl TrsFile {
    /// Create a file and return the handle to a writeable trace set. Traces
    /// can then be added one by one.
    ///
    /// Refuses to overwrite an existing file.
    /// ```
    /// use giga_trs_core::{TagValue, Trace, TrsTag};
    ///
    /// let dir = tempfile::tempdir().expect("Couldn't get tempfile.");
    /// let path = dir.path().join("my-first-trs.trs");
    ///
    /// let mut file = giga_trs_out::TrsFile::create(&path, None).unwrap();
    /// file.set_tag(TrsTag::GlobalTitle, TagValue::Str("demo".to_string())).unwrap();
    /// for i in 0..10 {
    ///     let samples = (i..(i + 50)).map(|x| x as f32).collect::<Vec<f32>>();
    ///     let trace = Trace::new(format!("demo {}", i), vec![], samples, 1.0);
    ///     file.add_trace(&trace).unwrap();
    /// }
    /// file.close().unwrap();
    /// ```
    pub fn create<T: AsRef<Path>>(
        file_name: T,
        metadata: Option<TrsMetaData>,
    ) -> Result<Self, TrsError> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create_new(true)
            .open(file_name)?;

        let mut metadata = metadata.unwrap_or_default();
        // The count reflects `add_trace` calls, whatever the caller put in.
        metadata.set(TrsTag::NumberOfTraces, TagValue::Int(0))?;

        Ok(TrsFile {
            metadata,
            file: Some(file),
            first_trace: true,
            header_len: 0,
            number_of_samples: 0,
            data_length: 0,
            title_space: 0,
            coding: Encoding::Illegal,
            scale_x: 0.0,
        })
    }

    /// Get a reference to the header metadata as it currently stands.
    pub fn metadata(&self) -> &TrsMetaData {
        &self.metadata
    }

    /// The number of traces written so far.
    pub fn trace_count(&self) -> usize {
        self.metadata.get_int(TrsTag::NumberOfTraces).max(0) as usize
    }

    /// Set a header tag.
    ///
    /// Only allowed before the first trace; once the placeholder header is
    /// on disk its layout cannot change.
    pub fn set_tag(&mut self, tag: TrsTag, value: TagValue) -> Result<(), TrsError> {
        if self.file.is_none() {
            return Err(TrsError::NotOpen);
        }
        if !self.first_trace {
            return Err(TrsError::TrsFormat {
                msg: "the header is already committed to disk".to_string(),
            });
        }
        self.metadata.set(tag, value)
    }

    /// Declare the per-trace parameter schema.
    ///
    /// Stores the serialized definitions under
    /// [`TrsTag::TraceParameterDefinitions`]; every added trace must then
    /// carry a data blob of exactly [`TraceParameterDefinitionMap::total_size`]
    /// bytes.
    pub fn set_parameter_definitions(
        &mut self,
        definitions: &TraceParameterDefinitionMap,
    ) -> Result<(), TrsError> {
        let bytes = definitions.to_bytes()?;
        self.set_tag(TrsTag::TraceParameterDefinitions, TagValue::Bytes(bytes))
    }

    /// Declare the trace set wide parameter bundle.
    pub fn set_trace_set_parameters(
        &mut self,
        parameters: &TraceSetParameterMap,
    ) -> Result<(), TrsError> {
        let bytes = parameters.to_bytes()?;
        self.set_tag(TrsTag::TraceSetParameters, TagValue::Bytes(bytes))
    }

    /// This function will add a trace to the file being written.
    ///
    /// The first trace fixes the layout and writes the placeholder header;
    /// every trace after it must match that layout exactly. Samples are
    /// narrowed to the set's sample coding, and any sample outside the
    /// coding's range is rejected before a single record byte is written.
    pub fn add_trace(&mut self, trace: &Trace) -> Result<(), TrsError> {
        if self.file.is_none() {
            return Err(TrsError::NotOpen);
        }
        if self.first_trace {
            self.bind_layout(trace)?;
        }

        if trace.num_samples() != self.number_of_samples {
            return Err(TrsError::ShapeMismatch {
                field: TrsTag::NumberOfSamples,
                got: trace.num_samples() as f64,
                expected: self.number_of_samples as f64,
            });
        }
        if trace.data.len() != self.data_length {
            return Err(TrsError::ShapeMismatch {
                field: TrsTag::DataLength,
                got: trace.data.len() as f64,
                expected: self.data_length as f64,
            });
        }
        if 1.0 / trace.sample_frequency != self.scale_x {
            return Err(TrsError::ShapeMismatch {
                field: TrsTag::ScaleX,
                got: trace.sample_frequency as f64,
                expected: (1.0 / self.scale_x) as f64,
            });
        }

        // Encode before writing so a bad sample cannot leave a partial
        // record behind.
        let sample_bytes = write_data::convert_samples(&trace.samples, self.coding)?;

        let mut title_bytes = trace.title.as_bytes().to_vec();
        title_bytes.resize(self.title_space, b' ');

        let file = self.file.as_mut().ok_or(TrsError::NotOpen)?;
        file.write_all(&title_bytes)?;
        file.write_all(&trace.data)?;
        file.write_all(&sample_bytes)?;

        let count = self.metadata.get_int(TrsTag::NumberOfTraces) + 1;
        self.metadata.set(TrsTag::NumberOfTraces, TagValue::Int(count))?;
        Ok(())
    }

    /// Derive the layout from the first trace (never overwriting a value
    /// the caller supplied) and commit the placeholder header.
    fn bind_layout(&mut self, trace: &Trace) -> Result<(), TrsError> {
        let samples = i32::try_from(trace.num_samples()).map_err(|_| TrsError::TrsFormat {
            msg: "trace holds more samples than a header can declare".to_string(),
        })?;
        let data_len = i32::try_from(trace.data.len()).map_err(|_| TrsError::TrsFormat {
            msg: "trace data is longer than a header can declare".to_string(),
        })?;
        let title_len = i32::try_from(trace.title.as_bytes().len()).map_err(|_| {
            TrsError::TrsFormat {
                msg: "trace title is longer than a header can declare".to_string(),
            }
        })?;

        self.metadata
            .set_if_absent(TrsTag::NumberOfSamples, TagValue::Int(samples))?;
        self.metadata
            .set_if_absent(TrsTag::DataLength, TagValue::Int(data_len))?;
        self.metadata
            .set_if_absent(TrsTag::TitleSpace, TagValue::Int(title_len))?;
        self.metadata.set_if_absent(
            TrsTag::SampleCoding,
            TagValue::Int(trace.preferred_coding().code()),
        )?;
        self.metadata.set_if_absent(
            TrsTag::ScaleX,
            TagValue::Float(1.0 / trace.sample_frequency),
        )?;
        if self.metadata.is_present(TrsTag::TraceParameterDefinitions) {
            self.metadata
                .set_if_absent(TrsTag::TrsVersion, TagValue::Int(2))?;
        }

        self.number_of_samples = size_of_tag(&self.metadata, TrsTag::NumberOfSamples)?;
        self.data_length = size_of_tag(&self.metadata, TrsTag::DataLength)?;
        self.title_space = size_of_tag(&self.metadata, TrsTag::TitleSpace)?;
        self.coding = Encoding::new(self.metadata.get_int(TrsTag::SampleCoding));
        if self.coding == Encoding::Illegal {
            return Err(TrsError::UnknownEncoding {
                code: self.metadata.get_int(TrsTag::SampleCoding),
            });
        }
        self.scale_x = self.metadata.get_float(TrsTag::ScaleX);
        if !(self.scale_x > 0.0) {
            return Err(TrsError::TrsFormat {
                msg: format!("{} must be positive, is {}", TrsTag::ScaleX, self.scale_x),
            });
        }

        if self.metadata.is_present(TrsTag::TraceParameterDefinitions) {
            let defs = TraceParameterDefinitionMap::from_bytes(
                &self.metadata.get_bytes(TrsTag::TraceParameterDefinitions),
            )?;
            if defs.total_size() != self.data_length {
                return Err(TrsError::ParameterLengthMismatch {
                    actual: self.data_length,
                    expected: defs.total_size(),
                });
            }
        }

        let header = self.metadata.as_bytes()?;
        let file = self.file.as_mut().ok_or(TrsError::NotOpen)?;
        file.write_all(&header)?;
        self.header_len = header.len();
        self.first_trace = false;
        Ok(())
    }

    /// Patch the header with the final trace count, flush and release the
    /// file handle.
    ///
    /// Closing an already closed set is a no-op. If no trace was ever
    /// added, the header is written as it stands, yielding a valid, empty
    /// trace set (provided the caller supplied the required tags).
    pub fn close(&mut self) -> Result<(), TrsError> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => return Ok(()),
        };

        let header = self.metadata.as_bytes()?;
        if self.first_trace {
            file.write_all(&header)?;
        } else {
            if header.len() != self.header_len {
                return Err(TrsError::TrsFormat {
                    msg: format!(
                        "rewritten header is {}-bytes, placeholder was {}-bytes",
                        header.len(),
                        self.header_len
                    ),
                });
            }
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Convenience: create a file, add all `traces`, close.
    pub fn save<T: AsRef<Path>>(
        file_name: T,
        traces: &[Trace],
        metadata: Option<TrsMetaData>,
    ) -> Result<(), TrsError> {
        let mut file = Self::create(file_name, metadata)?;
        for trace in traces {
            file.add_trace(trace)?;
        }
        file.close()
    }
}

/// Read a non-negative int tag as a size.
fn size_of_tag(metadata: &TrsMetaData, tag: TrsTag) -> Result<usize, TrsError> {
    usize::try_from(metadata.get_int(tag)).map_err(|_| TrsError::TrsFormat {
        msg: format!("{} must not be negative", tag),
    })
}
