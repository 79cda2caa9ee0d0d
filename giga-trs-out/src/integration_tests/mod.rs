// Copyright (C) 2022 by GiGa infosystems
//! This module uses `giga_trs_out` and `giga_trs_in` to make roundtrip
//! tests and observe whether the crates work in a compatible manner: each
//! test writes a trace set trace by trace and reads it back through the
//! public reading API.
use giga_trs_core::Trace;
use std::path::{Path, PathBuf};

mod roundtrip;

fn tmp(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn reopen(path: &Path) -> giga_trs_in::TrsFile {
    giga_trs_in::TrsFile::open(path).expect("reopen failed")
}

fn trace(title: &str, data: Vec<u8>, samples: Vec<f32>) -> Trace {
    Trace::new(title.to_string(), data, samples, 1.0)
}
