use std::collections::HashSet;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use serde::Serialize;
use zip::ZipArchive;

use crate::error::MycoError;
use crate::layout::ensure_dir;
use crate::manifest::Manifest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractOutcome {
    /// A `.gz` member was decompressed to `path`.
    Extracted { path: Utf8PathBuf },
    /// A `.zip` archive was unpacked in full into `dir`.
    Unpacked { dir: Utf8PathBuf },
    Unsupported,
    NoArchive,
    Failed { reason: String },
}

impl ExtractOutcome {
    /// Value recorded in the manifest's `extracted_file` column. For zip
    /// archives this is the output directory, not a specific member.
    pub fn recorded_path(&self) -> Option<Utf8PathBuf> {
        match self {
            ExtractOutcome::Extracted { path } => Some(path.clone()),
            ExtractOutcome::Unpacked { dir } => Some(dir.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedEntry {
    pub portal: String,
    pub compressed_file: Option<String>,
    #[serde(flatten)]
    pub outcome: ExtractOutcome,
}

/// Manifest archive names absent from `source_dir`, in manifest order and
/// without repeats.
pub fn find_missing_archives(
    manifest: &Manifest,
    source_dir: &Utf8Path,
) -> Result<Vec<String>, MycoError> {
    let entries = fs::read_dir(source_dir.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("read {source_dir}: {err}")))?;
    let mut available = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| MycoError::Filesystem(err.to_string()))?;
        available.insert(entry.file_name().to_string_lossy().into_owned());
    }

    let mut reported = HashSet::new();
    Ok(manifest
        .expected_archives()
        .into_iter()
        .filter(|name| !available.contains(*name))
        .filter(|name| reported.insert(*name))
        .map(str::to_string)
        .collect())
}

/// Aborts with every missing name listed before anything is extracted.
pub fn require_archives(manifest: &Manifest, source_dir: &Utf8Path) -> Result<(), MycoError> {
    let missing = find_missing_archives(manifest, source_dir)?;
    if missing.is_empty() {
        tracing::info!(dir = %source_dir, "all expected archives are present");
        Ok(())
    } else {
        Err(MycoError::MissingArchives(missing))
    }
}

pub fn extract_archive(
    compressed_name: &str,
    source_dir: &Utf8Path,
    target_dir: &Utf8Path,
) -> ExtractOutcome {
    let source = source_dir.join(compressed_name);
    if let Some(stem) = compressed_name.strip_suffix(".gz") {
        let target = target_dir.join(stem);
        match extract_gz(&source, &target) {
            Ok(()) => {
                tracing::info!(archive = compressed_name, %target, "extracted");
                ExtractOutcome::Extracted { path: target }
            }
            Err(err) => failed(compressed_name, err),
        }
    } else if compressed_name.ends_with(".zip") {
        match extract_zip(&source, target_dir) {
            Ok(()) => {
                tracing::info!(archive = compressed_name, dir = %target_dir, "unpacked");
                ExtractOutcome::Unpacked {
                    dir: target_dir.to_path_buf(),
                }
            }
            Err(err) => failed(compressed_name, err),
        }
    } else {
        tracing::warn!(archive = compressed_name, "skipping unsupported archive type");
        ExtractOutcome::Unsupported
    }
}

/// Checks presence, then extracts every row and records the result in
/// `extracted_file`. Per-row failures leave that column empty.
pub fn extract_manifest(
    manifest: &mut Manifest,
    source_dir: &Utf8Path,
    target_dir: &Utf8Path,
) -> Result<Vec<ExtractedEntry>, MycoError> {
    require_archives(manifest, source_dir)?;
    ensure_dir(target_dir)?;

    let mut results = Vec::with_capacity(manifest.entries.len());
    for entry in &mut manifest.entries {
        let outcome = match entry.compressed_file.as_deref() {
            Some(name) => extract_archive(name, source_dir, target_dir),
            None => ExtractOutcome::NoArchive,
        };
        entry.extracted_file = outcome.recorded_path();
        results.push(ExtractedEntry {
            portal: entry.portal.clone(),
            compressed_file: entry.compressed_file.clone(),
            outcome,
        });
    }
    Ok(results)
}

pub fn extract_gz(source: &Utf8Path, target: &Utf8Path) -> Result<(), MycoError> {
    let file = fs::File::open(source.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("open {source}: {err}")))?;
    let mut decoder = MultiGzDecoder::new(io::BufReader::new(file));
    let mut out = fs::File::create(target.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("create {target}: {err}")))?;
    io::copy(&mut decoder, &mut out)
        .map_err(|err| MycoError::Filesystem(format!("decompress {source}: {err}")))?;
    Ok(())
}

pub fn extract_zip(zip_path: &Utf8Path, target_dir: &Utf8Path) -> Result<(), MycoError> {
    let zip_error = |what: String| MycoError::Filesystem(format!("{zip_path}: {what}"));
    let file = fs::File::open(zip_path.as_std_path()).map_err(|err| zip_error(format!("open: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|err| zip_error(format!("not a zip archive: {err}")))?;

    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|err| zip_error(format!("member #{index}: {err}")))?;
        let name = member.name().to_string();
        let relative = member
            .enclosed_name()
            .ok_or_else(|| zip_error(format!("member {name} escapes the target directory")))?;
        let destination = target_dir.as_std_path().join(relative);

        let dir = if member.is_dir() {
            Some(destination.as_path())
        } else {
            destination.parent()
        };
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|err| zip_error(format!("member {name}: {err}")))?;
        }
        if member.is_dir() {
            continue;
        }
        let mut out = fs::File::create(&destination)
            .map_err(|err| zip_error(format!("member {name}: create: {err}")))?;
        let bytes = io::copy(&mut member, &mut out)
            .map_err(|err| zip_error(format!("member {name}: {err}")))?;
        tracing::debug!(archive = %zip_path, member = %name, bytes, "unpacked member");
    }
    Ok(())
}

fn failed(compressed_name: &str, err: MycoError) -> ExtractOutcome {
    tracing::error!(archive = compressed_name, error = %err, "failed to extract");
    ExtractOutcome::Failed {
        reason: err.to_string(),
    }
}
