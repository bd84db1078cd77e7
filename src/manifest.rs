use camino::{Utf8Path, Utf8PathBuf};

use crate::error::MycoError;
use crate::layout::ensure_dir;

const PORTAL: &str = "portal";
const COMPRESSED_FILE: &str = "compressed_file";
const EXTRACTED_FILE: &str = "extracted_file";
const RENAMED_FILE: &str = "renamed_file";

/// One curated proteome row. `extracted_file` and `renamed_file` are filled
/// in by the extraction and renaming stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    pub portal: String,
    pub compressed_file: Option<String>,
    pub extracted_file: Option<Utf8PathBuf>,
    pub renamed_file: Option<Utf8PathBuf>,
    extra: Vec<String>,
}

impl ManifestEntry {
    pub fn new(portal: &str, compressed_file: Option<&str>) -> Self {
        Self {
            portal: portal.to_string(),
            compressed_file: compressed_file.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_extracted_file(mut self, path: Utf8PathBuf) -> Self {
        self.extracted_file = Some(path);
        self
    }

    pub fn with_renamed_file(mut self, path: Utf8PathBuf) -> Self {
        self.renamed_file = Some(path);
        self
    }
}

/// The curated manifest. Columns the pipeline does not know about are kept
/// in their original position and written back untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    headers: Vec<String>,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self {
            headers: vec![PORTAL.to_string(), COMPRESSED_FILE.to_string()],
            entries,
        }
    }

    pub fn read(path: &Utf8Path) -> Result<Self, MycoError> {
        let mut reader = csv::Reader::from_path(path.as_std_path())?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let find = |name: &str| headers.iter().position(|header| header == name);
        let portal_idx = find(PORTAL).ok_or_else(|| MycoError::MissingColumn(PORTAL.to_string()))?;
        let compressed_idx =
            find(COMPRESSED_FILE).ok_or_else(|| MycoError::MissingColumn(COMPRESSED_FILE.to_string()))?;
        let extracted_idx = find(EXTRACTED_FILE);
        let renamed_idx = find(RENAMED_FILE);

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();
            let optional = |idx: Option<usize>| {
                idx.map(field)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            entries.push(ManifestEntry {
                portal: field(portal_idx).to_string(),
                compressed_file: optional(Some(compressed_idx)),
                extracted_file: optional(extracted_idx).map(Utf8PathBuf::from),
                renamed_file: optional(renamed_idx).map(Utf8PathBuf::from),
                extra: (0..headers.len())
                    .map(|idx| record.get(idx).unwrap_or_default().to_string())
                    .collect(),
            });
        }
        Ok(Self { headers, entries })
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), MycoError> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let mut headers = self.headers.clone();
        for name in [EXTRACTED_FILE, RENAMED_FILE] {
            if !headers.iter().any(|header| header == name) {
                headers.push(name.to_string());
            }
        }
        let mut writer = csv::Writer::from_path(path.as_std_path())?;
        writer.write_record(&headers)?;
        for entry in &self.entries {
            let record: Vec<String> = headers
                .iter()
                .enumerate()
                .map(|(idx, header)| match header.as_str() {
                    PORTAL => entry.portal.clone(),
                    COMPRESSED_FILE => entry.compressed_file.clone().unwrap_or_default(),
                    EXTRACTED_FILE => path_text(&entry.extracted_file),
                    RENAMED_FILE => path_text(&entry.renamed_file),
                    _ => entry.extra.get(idx).cloned().unwrap_or_default(),
                })
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|err| MycoError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Non-empty compressed file names in manifest order.
    pub fn expected_archives(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| entry.compressed_file.as_deref())
            .collect()
    }
}

fn path_text(path: &Option<Utf8PathBuf>) -> String {
    path.as_ref().map(|p| p.to_string()).unwrap_or_default()
}
