//! This submodule exists to map the file as a "memory map" and then allow
//! reading of the data through a sliding window.
//!
//! A trace set can be far larger than what is worth (or possible) to map in
//! one piece, so only a window of up to `max_window` bytes is mapped at a
//! time. The window is repositioned whenever a requested range falls
//! outside of it.
use giga_trs_core::errors::*;

use memmap2::{Mmap, MmapOptions};
use std::fs::File;

/// This structure represents a sliding memory map with an underlying TRS
/// file handle.
#[derive(Debug)]
pub struct MappedTrs {
    pub(crate) map: Mmap,
    file: File,
    file_size: u64,
    window_start: u64,
    max_window: usize,
    remaps: usize,
}

impl MappedTrs {
    /// Map the first window of a file.
    pub(crate) fn new(file: File, max_window: usize) -> Result<MappedTrs, TrsError> {
        let file_size = file.metadata().map_err(TrsError::MapFile)?.len();
        // Sanity check; an empty file cannot be mapped, let alone parsed.
        if file_size == 0 {
            return Err(TrsError::TrsFormat {
                msg: "file is empty".to_string(),
            });
        }
        if max_window == 0 {
            return Err(TrsError::TrsFormat {
                msg: "mapping window must be larger than zero".to_string(),
            });
        }
        let len = std::cmp::min(file_size, max_window as u64) as usize;
        let map = unsafe {
            MmapOptions::new()
                .len(len)
                .map(&file)
                .map_err(TrsError::MapFile)?
        };
        Ok(MappedTrs {
            map,
            file,
            file_size,
            window_start: 0,
            max_window,
            remaps: 0,
        })
    }

    /// The length of the underlying file in bytes.
    pub(crate) fn file_size(&self) -> u64 {
        self.file_size
    }

    /// How often the window has been repositioned since opening.
    pub(crate) fn remap_count(&self) -> usize {
        self.remaps
    }

    /// Borrow `len` bytes starting at absolute file offset `start`,
    /// repositioning the window if the range falls outside of it.
    pub(crate) fn view(&mut self, start: u64, len: usize) -> Result<&[u8], TrsError> {
        let end = start
            .checked_add(len as u64)
            .filter(|end| *end <= self.file_size)
            .ok_or_else(|| TrsError::TrsFormat {
                msg: "read beyond the end of the file".to_string(),
            })?;
        if len > self.max_window {
            return Err(TrsError::TrsFormat {
                msg: format!(
                    "a {}-byte record does not fit the {}-byte mapping window",
                    len, self.max_window
                ),
            });
        }
        if start < self.window_start || end > self.window_start + self.map.len() as u64 {
            let window_len = std::cmp::min(self.file_size - start, self.max_window as u64) as usize;
            self.map = unsafe {
                MmapOptions::new()
                    .offset(start)
                    .len(window_len)
                    .map(&self.file)
                    .map_err(TrsError::MapFile)?
            };
            self.window_start = start;
            self.remaps += 1;
        }
        let offset = (start - self.window_start) as usize;
        Ok(&self.map[offset..offset + len])
    }
}
