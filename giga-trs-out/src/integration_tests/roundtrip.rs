// Copyright (C) 2022 by GiGa infosystems
use super::{reopen, tmp, trace};
use crate::{Encoding, TagValue, TrsError, TrsFile, TrsTag};
use giga_trs_core::{ParameterMap, Trace, TraceParameterDefinitionMap, TraceSetParameterMap};

#[test]
fn single_trace_with_default_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "single.trs");

    let t = trace("t", vec![], vec![1., 2., 3.]);
    TrsFile::save(&path, &[t.clone()], None).unwrap();

    let mut file = reopen(&path);
    assert_eq!(file.metadata().get_int(TrsTag::NumberOfTraces), 1);
    assert_eq!(file.sample_coding(), Encoding::Byte);

    let back = file.get(0).unwrap();
    assert_eq!(back, t);

    // The file holds exactly the header and one record.
    let trace_size = 1 + 0 + 3 * Encoding::Byte.size() as u64;
    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert_eq!(on_disk, file.metadata_size() as u64 + trace_size);
}

#[test]
fn second_trace_must_match_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "shape.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.add_trace(&trace("a", vec![], vec![1., 2., 3.])).unwrap();

    let err = file.add_trace(&trace("b", vec![], vec![1., 2.])).unwrap_err();
    assert!(matches!(
        err,
        TrsError::ShapeMismatch {
            field: TrsTag::NumberOfSamples,
            got,
            expected,
        } if got == 2.0 && expected == 3.0
    ));

    // A failed add leaves the set usable.
    file.add_trace(&trace("c", vec![], vec![4., 5., 6.])).unwrap();
    file.close().unwrap();

    let mut file = reopen(&path);
    assert_eq!(file.trace_count(), 2);
    assert_eq!(file.get(1).unwrap().samples, vec![4., 5., 6.]);
}

#[test]
fn mismatched_data_length_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "datalen.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.add_trace(&trace("a", vec![1, 2], vec![0.])).unwrap();

    let err = file.add_trace(&trace("b", vec![1], vec![0.])).unwrap_err();
    assert!(matches!(
        err,
        TrsError::ShapeMismatch {
            field: TrsTag::DataLength,
            ..
        }
    ));
}

#[test]
fn mismatched_frequency_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "freq.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.add_trace(&Trace::new("a".to_string(), vec![], vec![0.], 4.0))
        .unwrap();

    let err = file
        .add_trace(&Trace::new("b".to_string(), vec![], vec![0.], 2.0))
        .unwrap_err();
    assert!(matches!(
        err,
        TrsError::ShapeMismatch {
            field: TrsTag::ScaleX,
            got,
            expected,
        } if got == 2.0 && expected == 4.0
    ));
}

#[test]
fn fractional_samples_force_the_float_coding() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "float.trs");

    let t = trace("t", vec![], vec![0.5, 1.0]);
    assert_eq!(t.preferred_coding(), Encoding::Float);
    TrsFile::save(&path, &[t], None).unwrap();

    let mut file = reopen(&path);
    assert_eq!(file.sample_coding(), Encoding::Float);
    // 0.5 is exactly representable and must survive the roundtrip bit for bit.
    assert_eq!(file.get(0).unwrap().samples, vec![0.5, 1.0]);
}

#[test]
fn short_and_int_codings_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    let path = tmp(&dir, "short.trs");
    let t = trace("t", vec![], vec![-300., 500., 32767.]);
    TrsFile::save(&path, &[t.clone()], None).unwrap();
    let mut file = reopen(&path);
    assert_eq!(file.sample_coding(), Encoding::Short);
    assert_eq!(file.get(0).unwrap().samples, t.samples);

    let path = tmp(&dir, "int.trs");
    let t = trace("t", vec![], vec![100_000., -70_000.]);
    TrsFile::save(&path, &[t.clone()], None).unwrap();
    let mut file = reopen(&path);
    assert_eq!(file.sample_coding(), Encoding::Int);
    assert_eq!(file.get(0).unwrap().samples, t.samples);
}

#[test]
fn out_of_range_samples_are_rejected_whole() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "range.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    // Pin the coding; 128 does not fit a signed byte.
    file.set_tag(TrsTag::SampleCoding, TagValue::Int(Encoding::Byte.code()))
        .unwrap();

    let err = file.add_trace(&trace("t", vec![], vec![128.])).unwrap_err();
    assert!(matches!(
        err,
        TrsError::SampleOutOfRange {
            coding: Encoding::Byte,
            ..
        }
    ));

    // Nothing of the record reached the file: closing yields a valid,
    // empty trace set.
    file.close().unwrap();
    let file = reopen(&path);
    assert_eq!(file.trace_count(), 0);
}

#[test]
fn explicit_metadata_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "explicit.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.set_tag(TrsTag::GlobalTitle, TagValue::Str("power".to_string()))
        .unwrap();
    file.set_tag(TrsTag::Description, TagValue::Str("test campaign".to_string()))
        .unwrap();
    file.set_tag(TrsTag::TitleSpace, TagValue::Int(8)).unwrap();
    file.set_tag(TrsTag::SampleCoding, TagValue::Int(Encoding::Short.code()))
        .unwrap();

    // Samples would prefer Byte; the explicit Short must win.
    file.add_trace(&Trace::new("ab".to_string(), vec![], vec![1., 2.], 2.0))
        .unwrap();
    file.close().unwrap();

    let mut file = reopen(&path);
    assert_eq!(file.sample_coding(), Encoding::Short);
    assert_eq!(file.metadata().get_int(TrsTag::TitleSpace), 8);
    assert_eq!(file.metadata().get_str(TrsTag::Description), "test campaign");
    assert_eq!(file.metadata().get_str(TrsTag::GlobalTitle), "power");
    assert_eq!(file.metadata().get_float(TrsTag::ScaleX), 0.5);

    let back = file.get(0).unwrap();
    assert_eq!(back.title, "ab");
    assert_eq!(back.sample_frequency, 2.0);
}

#[test]
fn long_titles_are_truncated_to_the_title_space() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "truncated.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.set_tag(TrsTag::TitleSpace, TagValue::Int(2)).unwrap();
    file.add_trace(&trace("abcdef", vec![], vec![0.])).unwrap();
    file.close().unwrap();

    let mut file = reopen(&path);
    assert_eq!(file.get(0).unwrap().title, "ab");
}

#[test]
fn trace_parameters_roundtrip_through_the_data_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "params.trs");

    let mut params = ParameterMap::new();
    params
        .insert_array("iv", vec![0xdeu8 as i8, 0xadu8 as i8])
        .unwrap();
    params.insert_array("ct", vec![1i32, 2, 3]).unwrap();
    let defs = TraceParameterDefinitionMap::from_map(&params).unwrap();

    let mut file = TrsFile::create(&path, None).unwrap();
    file.set_parameter_definitions(&defs).unwrap();
    file.add_trace(&trace("t", params.to_bytes(), vec![1., 2.])).unwrap();
    file.close().unwrap();

    let mut file = reopen(&path);
    assert_eq!(file.metadata().get_int(TrsTag::TrsVersion), 2);
    let read_defs = file.parameter_definitions().unwrap().expect("definitions");
    assert_eq!(read_defs, defs);

    let back = file.get(0).unwrap();
    let view = back.parameter_map(&read_defs).unwrap();
    assert_eq!(view, params);
    assert_eq!(view.get_array::<i32>("ct").unwrap(), &[1, 2, 3]);
}

#[test]
fn parameter_definitions_must_match_the_data_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "paramlen.trs");

    let mut params = ParameterMap::new();
    params.insert_array("iv", vec![1i8, 2, 3, 4]).unwrap();
    let defs = TraceParameterDefinitionMap::from_map(&params).unwrap();

    let mut file = TrsFile::create(&path, None).unwrap();
    file.set_parameter_definitions(&defs).unwrap();
    // A two byte blob cannot satisfy a four byte schema.
    let err = file.add_trace(&trace("t", vec![1, 2], vec![0.])).unwrap_err();
    assert!(matches!(
        err,
        TrsError::ParameterLengthMismatch {
            actual: 2,
            expected: 4
        }
    ));
}

#[test]
fn trace_set_parameters_roundtrip_through_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "setparams.trs");

    let mut set_params = TraceSetParameterMap::new();
    set_params.map_mut().insert_string("device", "scope-07").unwrap();
    set_params.map_mut().insert_scalar("gain", 0.5f32);

    let mut file = TrsFile::create(&path, None).unwrap();
    file.set_trace_set_parameters(&set_params).unwrap();
    file.add_trace(&trace("t", vec![], vec![0.])).unwrap();
    file.close().unwrap();

    let file = reopen(&path);
    let back = file.trace_set_parameters().unwrap().expect("parameters");
    assert_eq!(back, set_params);
}

#[test]
fn trace_count_tracks_every_add() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "count.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    for i in 0..5 {
        assert_eq!(file.trace_count(), i);
        file.add_trace(&trace("t", vec![7; 4], vec![-40., 0., 41.]))
            .unwrap();
    }
    assert_eq!(file.trace_count(), 5);
    file.close().unwrap();

    let file = reopen(&path);
    assert_eq!(file.trace_count(), 5);
    let trace_size = (1 + 4 + 3) as u64;
    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert_eq!(on_disk, file.metadata_size() as u64 + 5 * trace_size);
}

#[test]
fn the_header_freezes_at_the_first_trace() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "frozen.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.add_trace(&trace("t", vec![], vec![0.])).unwrap();

    let err = file
        .set_tag(TrsTag::GlobalTitle, TagValue::Str("late".to_string()))
        .unwrap_err();
    assert!(matches!(err, TrsError::TrsFormat { .. }));
}

#[test]
fn closed_writers_reject_adds() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "closed.trs");

    let mut file = TrsFile::create(&path, None).unwrap();
    file.add_trace(&trace("t", vec![], vec![0.])).unwrap();
    file.close().unwrap();

    let err = file.add_trace(&trace("t", vec![], vec![0.])).unwrap_err();
    assert!(matches!(err, TrsError::NotOpen));
    // Double close is a no-op.
    file.close().unwrap();
}

#[test]
fn creating_over_an_existing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = tmp(&dir, "exists.trs");
    std::fs::write(&path, b"something").unwrap();

    let err = TrsFile::create(&path, None).unwrap_err();
    assert!(matches!(err, TrsError::StdIoError(_)));
}
