// File: report.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs::{self, File};
use std::io::{Result, Write};
use std::path::Path;

use serde::Serialize;

use crate::verdict::Verdict;

/// One row of the final report, shared by the CSV and JSON renderers.
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub file: String,
    pub sample_type: String,
    pub expected: String,
    pub status: String,
    pub reason: String,
    pub matched: bool,
}

impl ReportRow {
    pub fn from_verdict(verdict: &Verdict) -> Self {
        ReportRow {
            file: verdict.sample.name.clone(),
            sample_type: verdict.sample.class.label().to_string(),
            expected: if verdict.expected_blocked {
                "block".to_string()
            } else {
                "pass".to_string()
            },
            status: if verdict.outcome.status != 0 {
                verdict.outcome.status.to_string()
            } else {
                verdict.outcome.reason.clone()
            },
            reason: verdict.outcome.reason.clone(),
            matched: verdict.correct,
        }
    }
}

pub enum ReportFormat {
    Csv,
    Json,
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn generate_report(
        verdicts: &[Verdict],
        output_path: &Path,
        format: ReportFormat,
    ) -> Result<()> {
        let rows: Vec<ReportRow> = verdicts.iter().map(ReportRow::from_verdict).collect();
        match format {
            ReportFormat::Csv => Self::generate_csv_report(&rows, output_path),
            ReportFormat::Json => Self::generate_json_report(&rows, output_path),
        }
    }

    fn generate_csv_report(rows: &[ReportRow], output_path: &Path) -> Result<()> {
        let mut file = File::create(output_path)?;
        writeln!(file, "file,sample type,expected action,status,reason,match")?;
        for row in rows {
            writeln!(
                file,
                "{},{},{},{},{},{}",
                csv_field(&row.file),
                csv_field(&row.sample_type),
                csv_field(&row.expected),
                csv_field(&row.status),
                csv_field(&row.reason),
                if row.matched { "yes" } else { "no" }
            )?;
        }
        Ok(())
    }

    fn generate_json_report(rows: &[ReportRow], output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(rows)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(output_path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Partitions the original sample files into `<base>/expected/` and
/// `<base>/unexpected/` by verdict correctness. Returns the copy counts.
pub fn split_samples(verdicts: &[Verdict], base_dir: &Path) -> Result<(usize, usize)> {
    let expected_dir = base_dir.join("expected");
    let unexpected_dir = base_dir.join("unexpected");
    fs::create_dir_all(&expected_dir)?;
    fs::create_dir_all(&unexpected_dir)?;

    let mut expected = 0;
    let mut unexpected = 0;
    for verdict in verdicts {
        let source = &verdict.sample.path;
        if !source.exists() {
            continue;
        }
        let dest_dir = if verdict.correct {
            expected += 1;
            &expected_dir
        } else {
            unexpected += 1;
            &unexpected_dir
        };
        fs::copy(source, dest_dir.join(&verdict.sample.name))?;
    }
    Ok((expected, unexpected))
}
