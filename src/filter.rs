use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::LengthWindow;
use crate::error::MycoError;
use crate::fasta::{read_fasta, write_records};
use crate::layout::{ensure_dir, require_dir};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FilterOutcome {
    Filtered {
        output: Utf8PathBuf,
        total: usize,
        kept: usize,
    },
    /// No sequences in the input; nothing was written.
    Empty,
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FilteredFile {
    pub file: String,
    #[serde(flatten)]
    pub outcome: FilterOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterResult {
    pub window: LengthWindow,
    pub files: Vec<FilteredFile>,
}

/// `*.fasta` files directly inside `dir`, sorted by name.
pub fn fasta_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, MycoError> {
    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| MycoError::Filesystem(format!("read {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MycoError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
            continue;
        };
        if path.extension() == Some("fasta") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn filter_file(input: &Utf8Path, output: &Utf8Path, window: LengthWindow) -> FilterOutcome {
    let records = match read_fasta(input) {
        Ok(records) => records,
        Err(err) => {
            tracing::error!(%input, error = %err, "failed to read FASTA");
            return FilterOutcome::Failed {
                reason: err.to_string(),
            };
        }
    };
    if records.is_empty() {
        tracing::warn!(%input, "no sequences found, skipping");
        return FilterOutcome::Empty;
    }
    let total = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|record| window.contains(record.len()))
        .collect();
    if let Err(err) = write_records(output, &kept) {
        tracing::error!(%output, error = %err, "failed to write filtered FASTA");
        return FilterOutcome::Failed {
            reason: err.to_string(),
        };
    }
    tracing::info!(%input, total, kept = kept.len(), %output, "filtered sequences");
    FilterOutcome::Filtered {
        output: output.to_path_buf(),
        total,
        kept: kept.len(),
    }
}

/// Filters every FASTA file of `input_dir` into a same-named file in
/// `output_dir`.
pub fn filter_dir(
    input_dir: &Utf8Path,
    output_dir: &Utf8Path,
    window: LengthWindow,
) -> Result<FilterResult, MycoError> {
    require_dir(input_dir)?;
    ensure_dir(output_dir)?;
    let inputs = fasta_files(input_dir)?;
    if inputs.is_empty() {
        return Err(MycoError::NoFastaFiles(input_dir.as_std_path().to_path_buf()));
    }
    let files = inputs
        .iter()
        .map(|input| {
            let file = input.file_name().unwrap_or_default().to_string();
            let outcome = filter_file(input, &output_dir.join(&file), window);
            FilteredFile { file, outcome }
        })
        .collect();
    Ok(FilterResult { window, files })
}
