use std::fs;
use std::io::{BufWriter, Read, Write};

use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use needletail::parse_fastx_reader;
use needletail::parser::{LineEnding, write_fasta};

use crate::error::MycoError;
use crate::layout::ensure_dir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Full header line without the leading `>`.
    pub header: String,
    pub sequence: Vec<u8>,
}

impl FastaRecord {
    pub fn new(header: &str, sequence: &[u8]) -> Self {
        Self {
            header: header.to_string(),
            sequence: sequence.to_vec(),
        }
    }

    /// Identifier: the header up to the first whitespace.
    pub fn id(&self) -> &str {
        self.header.split_whitespace().next().unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Replaces the whole header, dropping any description.
    pub fn set_id(&mut self, id: &str) {
        self.header = id.to_string();
    }
}

/// Reads every record of a FASTA file (plain or gzip). Blank lines before
/// the first header are skipped, so a whitespace-only file has no records.
pub fn read_fasta(path: &Utf8Path) -> Result<Vec<FastaRecord>, MycoError> {
    let raw = fs::read(path.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("read {path}: {err}")))?;
    let fasta_error = |message: String| MycoError::Fasta {
        path: path.as_std_path().to_path_buf(),
        message,
    };

    let content = if raw.starts_with(&GZIP_MAGIC) {
        let mut plain = Vec::new();
        MultiGzDecoder::new(raw.as_slice())
            .read_to_end(&mut plain)
            .map_err(|err| fasta_error(format!("gzip: {err}")))?;
        plain
    } else {
        raw
    };
    let start = content
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(content.len());
    let body = &content[start..];
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = parse_fastx_reader(body).map_err(|err| fasta_error(err.to_string()))?;
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|err| fasta_error(err.to_string()))?;
        records.push(FastaRecord {
            header: String::from_utf8_lossy(record.id()).into_owned(),
            sequence: record.seq().into_owned(),
        });
    }
    Ok(records)
}

/// Writes through a temporary file in the same directory, then moves it over
/// `path`.
pub fn write_records(path: &Utf8Path, records: &[FastaRecord]) -> Result<(), MycoError> {
    let parent = path
        .parent()
        .ok_or_else(|| MycoError::Filesystem(format!("no parent directory for {path}")))?;
    ensure_dir(parent)?;
    let temp = tempfile::Builder::new()
        .prefix(".mycocosm-etl")
        .suffix(".fasta")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("create temp for {path}: {err}")))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        for record in records {
            write_fasta(
                record.header.as_bytes(),
                &record.sequence,
                &mut writer,
                LineEnding::Unix,
            )
            .map_err(|err| MycoError::Filesystem(format!("write {path}: {err}")))?;
        }
        writer
            .flush()
            .map_err(|err| MycoError::Filesystem(format!("write {path}: {err}")))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("persist {path}: {err}")))?;
    Ok(())
}
