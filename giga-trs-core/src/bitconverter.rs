// Copyright (C) 2020 by GiGa infosystems
//! This submodule deals with decoding raw sample bytes into `f32` once a
//! trace has been located in the file.
use crate::enums::Encoding;
use crate::errors::*;

use std::array::TryFromSliceError;
use std::convert::TryInto;

pub type BitConverter = fn(&[u8]) -> Result<f32, TryFromSliceError>;

/// This function chooses the converter for the binary sample data.
///
/// The converter should be chosen once per trace (or better still once per
/// file) for efficiency. TRS sample data is always little-endian; integer
/// codings are widened to `f32` on the way out.
/// ```
/// # use giga_trs_core::bitconverter::converter_chooser;
/// # use giga_trs_core::enums::Encoding;
/// let bytes_to_f32: fn(&[u8]) -> Result<f32, _> =
///     converter_chooser(Encoding::Short).unwrap();
///
/// let bytes = (-513i16).to_le_bytes();
/// let nmbr = bytes_to_f32(&bytes[..]).unwrap();
/// assert_eq!(nmbr, -513.);
/// ```
pub fn converter_chooser(coding: Encoding) -> Result<BitConverter, TrsError> {
    let f = match coding {
        Encoding::Byte => {
            fn x(input: &[u8]) -> Result<f32, TryFromSliceError> {
                Ok(i8::from_le_bytes(input.try_into()?) as f32)
            }
            x
        }
        Encoding::Short => {
            fn x(input: &[u8]) -> Result<f32, TryFromSliceError> {
                Ok(i16::from_le_bytes(input.try_into()?) as f32)
            }
            x
        }
        Encoding::Int => {
            fn x(input: &[u8]) -> Result<f32, TryFromSliceError> {
                Ok(i32::from_le_bytes(input.try_into()?) as f32)
            }
            x
        }
        Encoding::Float => {
            fn x(input: &[u8]) -> Result<f32, TryFromSliceError> {
                Ok(f32::from_le_bytes(input.try_into()?))
            }
            x
        }
        Encoding::Illegal => {
            return Err(TrsError::UnknownEncoding {
                code: coding.code(),
            });
        }
    };
    Ok(f)
}

/// A helper function that turns a stored title field back into a string.
///
/// Titles are padded on the right with spaces or NUL bytes up to the title
/// space of the set; the padding is stripped here.
/// ```
/// # use giga_trs_core::bitconverter::title_bytes_to_string;
/// assert_eq!(&title_bytes_to_string(b"key 12  "), "key 12");
/// assert_eq!(&title_bytes_to_string(b"key 12\0\0"), "key 12");
/// assert_eq!(&title_bytes_to_string(b"   "), "");
/// ```
pub fn title_bytes_to_string(bytes: &[u8]) -> String {
    let title = String::from_utf8_lossy(bytes);
    title
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}
