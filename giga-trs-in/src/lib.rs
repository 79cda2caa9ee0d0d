//! This is a simplified library for reading TRS trace sets into rust. It is designed for
//! efficient random access to individual traces without holding potentially very large
//! trace set files in memory.
//!
//! A trace set is opened read-only; the header is parsed once and the trace records are
//! then read through a sliding memory-mapped window. Each [`TrsFile::get`] call returns an
//! owned [`Trace`] with its samples widened to `f32`.
//!
//! This library is not designed for editing of TRS files; writing is handled trace by
//! trace by `giga_trs_out`.
extern crate giga_trs_core;
extern crate memmap2;

pub mod memory_map;

use memory_map::MappedTrs;
use std::convert::TryFrom;
use std::fs::File;
use std::path::Path;

pub use giga_trs_core::enums;
pub use giga_trs_core::errors::*;
pub use giga_trs_core::{
    Encoding, TagValue, Trace, TraceParameterDefinitionMap, TraceSetParameterMap, TrsMetaData,
    TrsTag,
};

use giga_trs_core::bitconverter;

/// The largest window mapped in one piece (2 GiB).
pub const MAX_WINDOW: usize = 1 << 31;

/// A structure which represents a mapped TRS file, opened for reading.
///
/// The structure contains:
///
/// - The sliding memory map of the file.
///
/// - The parsed header metadata.
///
/// - The trace layout (sizes and coding) resolved from the header once, so
///   that [`TrsFile::get`] is plain offset arithmetic.
///
/// NB: The header is parsed eagerly; trace data stays in the memory map
/// until a trace is requested.
#[derive(Debug)]
pub struct TrsFile {
    metadata: TrsMetaData,
    metadata_size: usize,
    number_of_traces: usize,
    data_length: usize,
    title_space: usize,
    coding: Encoding,
    trace_size: usize,
    sample_frequency: f32,
    global_title: String,
    data: Option<MappedTrs>,
}

impl TrsFile {
    /// Attempts to open a TRS file stored in a given location.
    ///
    /// This parses and validates the header and creates an instance of
    /// [`TrsFile`] which can then be used as a handle to get traces.
    ///
    /// ```
    /// use giga_trs_core::Trace;
    ///
    /// let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    /// let path = dir.path().join("demo.trs");
    ///
    /// let traces = vec![Trace::new("t".to_string(), vec![], vec![1., 2., 3.], 1.0)];
    /// giga_trs_out::TrsFile::save(&path, &traces, None).unwrap();
    ///
    /// let mut file = giga_trs_in::TrsFile::open(&path).unwrap();
    /// assert_eq!(file.trace_count(), 1);
    /// assert_eq!(file.get(0).unwrap().samples, vec![1., 2., 3.]);
    /// ```
    pub fn open<T: AsRef<Path>>(file_name: T) -> Result<Self, TrsError> {
        Self::open_with_window(file_name, MAX_WINDOW)
    }

    /// As [`TrsFile::open`], but with a custom cap on the mapped window.
    ///
    /// The cap must be at least as large as the header and one trace
    /// record. Mostly useful for exercising the window slide without
    /// multi-gigabyte files.
    pub fn open_with_window<T: AsRef<Path>>(
        file_name: T,
        max_window: usize,
    ) -> Result<Self, TrsError> {
        let file = File::open(file_name)?;
        let mut data = MappedTrs::new(file, max_window)?;

        let head_len = std::cmp::min(data.file_size(), max_window as u64) as usize;
        let (metadata, metadata_size) = TrsMetaData::from_bytes(data.view(0, head_len)?)?;

        let coding = Encoding::new(metadata.get_int(TrsTag::SampleCoding));
        if coding == Encoding::Illegal {
            return Err(TrsError::UnknownEncoding {
                code: metadata.get_int(TrsTag::SampleCoding),
            });
        }
        let number_of_traces = tag_as_size(&metadata, TrsTag::NumberOfTraces)?;
        let number_of_samples = tag_as_size(&metadata, TrsTag::NumberOfSamples)?;
        let data_length = tag_as_size(&metadata, TrsTag::DataLength)?;
        let title_space = tag_as_size(&metadata, TrsTag::TitleSpace)?;
        let trace_size = title_space + data_length + number_of_samples * coding.size();

        let expected = metadata_size as u64 + trace_size as u64 * number_of_traces as u64;
        if expected != data.file_size() {
            return Err(TrsError::FileSizeMismatch {
                expected,
                actual: data.file_size(),
            });
        }

        let sample_frequency = 1.0 / metadata.get_float(TrsTag::ScaleX);
        let global_title = metadata.get_str(TrsTag::GlobalTitle);

        Ok(TrsFile {
            metadata,
            metadata_size,
            number_of_traces,
            data_length,
            title_space,
            coding,
            trace_size,
            sample_frequency,
            global_title,
            data: Some(data),
        })
    }

    /// Get a reference to the parsed header metadata.
    pub fn metadata(&self) -> &TrsMetaData {
        &self.metadata
    }

    /// The number of traces declared by the header.
    pub fn trace_count(&self) -> usize {
        self.number_of_traces
    }

    /// The sample coding the traces are stored in.
    pub fn sample_coding(&self) -> Encoding {
        self.coding
    }

    /// The byte length of the header, i.e. the offset of trace zero.
    pub fn metadata_size(&self) -> usize {
        self.metadata_size
    }

    /// How often the mapped window has been repositioned since opening.
    pub fn remap_count(&self) -> usize {
        self.data.as_ref().map(MappedTrs::remap_count).unwrap_or(0)
    }

    /// The per-trace parameter schema from the header, if the set carries
    /// one.
    pub fn parameter_definitions(&self) -> Result<Option<TraceParameterDefinitionMap>, TrsError> {
        if !self.metadata.is_present(TrsTag::TraceParameterDefinitions) {
            return Ok(None);
        }
        let bytes = self.metadata.get_bytes(TrsTag::TraceParameterDefinitions);
        TraceParameterDefinitionMap::from_bytes(&bytes).map(Some)
    }

    /// The trace set wide parameter bundle from the header, if the set
    /// carries one.
    pub fn trace_set_parameters(&self) -> Result<Option<TraceSetParameterMap>, TrsError> {
        if !self.metadata.is_present(TrsTag::TraceSetParameters) {
            return Ok(None);
        }
        let bytes = self.metadata.get_bytes(TrsTag::TraceSetParameters);
        TraceSetParameterMap::from_bytes(&bytes).map(Some)
    }

    /// Read the trace at `index`.
    ///
    /// Repositions the mapped window when the record lies outside of it.
    /// A stored title that is empty after trailing padding is stripped is
    /// synthesized as `"<global title> <index>"`.
    pub fn get(&mut self, index: usize) -> Result<Trace, TrsError> {
        let data = self.data.as_mut().ok_or(TrsError::NotOpen)?;
        if index >= self.number_of_traces {
            return Err(TrsError::IndexOutOfBounds {
                index,
                count: self.number_of_traces,
            });
        }

        let start = self.metadata_size as u64 + (index * self.trace_size) as u64;
        let record = data.view(start, self.trace_size)?;

        let mut title = bitconverter::title_bytes_to_string(&record[..self.title_space]);
        if title.is_empty() {
            title = format!("{} {}", self.global_title, index);
        }
        let blob = record[self.title_space..self.title_space + self.data_length].to_vec();

        let converter = bitconverter::converter_chooser(self.coding)?;
        let sample_bytes = &record[self.title_space + self.data_length..];
        let mut samples = Vec::with_capacity(sample_bytes.len() / self.coding.size());
        for chunk in sample_bytes.chunks_exact(self.coding.size()) {
            samples.push(converter(chunk)?);
        }

        Ok(Trace::new(title, blob, samples, self.sample_frequency))
    }

    /// Release the memory map and the file handle.
    ///
    /// Closing an already closed set is a no-op; any later [`TrsFile::get`]
    /// fails with [`TrsError::NotOpen`].
    pub fn close(&mut self) -> Result<(), TrsError> {
        self.data.take();
        Ok(())
    }
}

/// Read a non-negative int tag as a size.
fn tag_as_size(metadata: &TrsMetaData, tag: TrsTag) -> Result<usize, TrsError> {
    usize::try_from(metadata.get_int(tag)).map_err(|_| TrsError::TrsFormat {
        msg: format!("{} must not be negative", tag),
    })
}
