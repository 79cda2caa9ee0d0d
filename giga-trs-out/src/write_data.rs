// Copyright (C) 2022 by GiGa infosystems
//! This contains the code for converting samples to their on-disk coding.
use giga_trs_core::enums::Encoding;
use giga_trs_core::errors::*;
use tinyvec::TinyVec;

/// This exists to save us a lot of typing.
pub(crate) type TVu8 = TinyVec<[u8; 4]>;

/// Very much like `giga_trs_core::bitconverter::BitConverter`, but in reverse.
pub(crate) type BitConverter = fn(f32) -> Result<TVu8, TrsError>;

macro_rules! make_int_converter {
    ($int:ty, $coding:expr) => {{
        fn x(sample: f32) -> Result<TVu8, TrsError> {
            let wide = sample as f64;
            // NaN fails both comparisons and is rejected alongside the
            // out-of-range values.
            if !(wide >= <$int>::MIN as f64 && wide <= <$int>::MAX as f64) {
                return Err(TrsError::SampleOutOfRange {
                    value: sample,
                    coding: $coding,
                });
            }
            Ok(TinyVec::from(&(sample as $int).to_le_bytes()[..]))
        }
        x
    }};
}

/// This function chooses the converter for the binary sample data.
///
/// Choosing once per trace set is more efficient than dispatching on the
/// coding for every sample. Integer codings reject samples outside their
/// range; fractional parts are truncated towards zero.
pub(crate) fn converter_chooser(coding: Encoding) -> Result<BitConverter, TrsError> {
    let f = match coding {
        Encoding::Byte => make_int_converter!(i8, Encoding::Byte),
        Encoding::Short => make_int_converter!(i16, Encoding::Short),
        Encoding::Int => make_int_converter!(i32, Encoding::Int),
        Encoding::Float => {
            fn x(sample: f32) -> Result<TVu8, TrsError> {
                Ok(TinyVec::from(&sample.to_le_bytes()[..]))
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

/// Encode a whole sample run with the converter for `coding`.
pub(crate) fn convert_samples(samples: &[f32], coding: Encoding) -> Result<Vec<u8>, TrsError> {
    let converter = converter_chooser(coding)?;
    let mut output = Vec::with_capacity(samples.len() * coding.size());
    for sample in samples {
        output.extend_from_slice(converter(*sample)?.as_ref());
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converter_chooser_codings() {
        for coding in [
            Encoding::Byte,
            Encoding::Short,
            Encoding::Int,
            Encoding::Float,
        ]
        .iter()
        {
            assert!(
                converter_chooser(*coding).is_ok(),
                "`converter_chooser` should work for Encoding::{:?}",
                coding
            );
        }
        assert!(matches!(
            converter_chooser(Encoding::Illegal),
            Err(TrsError::UnknownEncoding { .. })
        ));
    }

    #[test]
    fn byte_range() {
        assert_eq!(convert_samples(&[127.], Encoding::Byte).unwrap(), vec![0x7F]);
        assert_eq!(convert_samples(&[-128.], Encoding::Byte).unwrap(), vec![0x80]);
        let err = convert_samples(&[128.], Encoding::Byte).unwrap_err();
        assert!(matches!(
            err,
            TrsError::SampleOutOfRange {
                coding: Encoding::Byte,
                ..
            }
        ));
    }

    #[test]
    fn short_range() {
        assert_eq!(
            convert_samples(&[-513.], Encoding::Short).unwrap(),
            (-513i16).to_le_bytes().to_vec()
        );
        assert!(convert_samples(&[32767.], Encoding::Short).is_ok());
        assert!(convert_samples(&[-32768.], Encoding::Short).is_ok());
        assert!(convert_samples(&[40_000.], Encoding::Short).is_err());
    }

    #[test]
    fn int_range() {
        assert_eq!(
            convert_samples(&[1_000_000.], Encoding::Int).unwrap(),
            1_000_000i32.to_le_bytes().to_vec()
        );
        assert!(convert_samples(&[1.0e12], Encoding::Int).is_err());
    }

    #[test]
    fn float_is_verbatim() {
        assert_eq!(
            convert_samples(&[0.5, -1.25], Encoding::Float).unwrap(),
            [0.5f32.to_le_bytes(), (-1.25f32).to_le_bytes()].concat()
        );
    }

    #[test]
    fn fractions_truncate_towards_zero() {
        assert_eq!(convert_samples(&[2.75], Encoding::Byte).unwrap(), vec![0x02]);
        assert_eq!(
            convert_samples(&[-2.75], Encoding::Byte).unwrap(),
            vec![0xFE]
        );
    }

    #[test]
    fn nan_is_rejected_by_integer_codings() {
        assert!(convert_samples(&[f32::NAN], Encoding::Byte).is_err());
        assert!(convert_samples(&[f32::NAN], Encoding::Float).is_ok());
    }
}
