// File: samples.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ProbeError;

/// Expected WAF behavior for a sample, encoded in the filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleClass {
    /// `*.black`: an attack payload the WAF must block.
    Black,
    /// `*.white`: benign traffic the WAF must let through.
    White,
}

impl SampleClass {
    pub fn expected_blocked(self) -> bool {
        matches!(self, SampleClass::Black)
    }

    pub fn label(self) -> &'static str {
        match self {
            SampleClass::Black => "black",
            SampleClass::White => "white",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub path: PathBuf,
    pub name: String,
    pub class: SampleClass,
}

impl Sample {
    pub fn new(path: PathBuf, class: SampleClass) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Sample { path, name, class }
    }

    pub fn expected_blocked(&self) -> bool {
        self.class.expected_blocked()
    }
}

/// Lists labeled samples in a directory, black samples first, each class
/// sorted by filename so repeated listings are stable within a run.
///
/// A missing or unreadable directory is fatal; it aborts the run before
/// any task starts.
pub fn list_samples(dir: &Path) -> Result<Vec<Sample>, ProbeError> {
    if !dir.is_dir() {
        return Err(ProbeError::config(format!(
            "sample directory does not exist: {}",
            dir.display()
        )));
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        ProbeError::config(format!("cannot read sample directory {}: {e}", dir.display()))
    })?;

    let mut black = Vec::new();
    let mut white = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ProbeError::config(format!("cannot read sample directory {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("black") => black.push(path),
            Some("white") => white.push(path),
            _ => {}
        }
    }

    black.sort();
    white.sort();

    Ok(black
        .into_iter()
        .map(|p| Sample::new(p, SampleClass::Black))
        .chain(white.into_iter().map(|p| Sample::new(p, SampleClass::White)))
        .collect())
}
