use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::OrganismId;
use crate::error::MycoError;
use crate::layout::{Layout, ensure_dir};
use crate::listing::page_files;

pub const NO_FILES_FOUND: &str = "NO FILES FOUND";

pub const FILE_TABLE_COLUMNS: [&str; 16] = [
    "organism",
    "file_name",
    "file_id",
    "_id",
    "file_status",
    "md5sum",
    "file_date",
    "ncbi_taxon_id",
    "jat_label",
    "ncbi_taxon_class",
    "ncbi_taxon_family",
    "ncbi_taxon_order",
    "ncbi_taxon_genus",
    "ncbi_taxon_species",
    "file_type",
    "portal_display_location",
];

/// Taxonomy snapshot attached to each remote file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Taxonomy {
    pub ncbi_taxon_id: Option<String>,
    pub ncbi_taxon_class: Option<String>,
    pub ncbi_taxon_family: Option<String>,
    pub ncbi_taxon_order: Option<String>,
    pub ncbi_taxon_genus: Option<String>,
    pub ncbi_taxon_species: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    pub file_name: Option<String>,
    pub file_id: Option<String>,
    pub internal_id: Option<String>,
    pub file_status: Option<String>,
    pub md5sum: Option<String>,
    pub file_date: Option<String>,
    pub jat_label: Option<String>,
    pub taxonomy: Taxonomy,
    pub file_type: Option<String>,
    pub display_location: Option<String>,
}

/// What the persisted pages say about one organism. `Empty` is lowered to
/// the `NO FILES FOUND` row only when written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganismFiles {
    Files(Vec<FileRecord>),
    Empty,
}

/// One line of the flattened file table, in its fixed column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub organism: String,
    pub file_name: Option<String>,
    pub file_id: Option<String>,
    #[serde(rename = "_id")]
    pub internal_id: Option<String>,
    pub file_status: Option<String>,
    pub md5sum: Option<String>,
    pub file_date: Option<String>,
    pub ncbi_taxon_id: Option<String>,
    pub jat_label: Option<String>,
    pub ncbi_taxon_class: Option<String>,
    pub ncbi_taxon_family: Option<String>,
    pub ncbi_taxon_order: Option<String>,
    pub ncbi_taxon_genus: Option<String>,
    pub ncbi_taxon_species: Option<String>,
    pub file_type: Option<String>,
    pub portal_display_location: Option<String>,
}

impl FileRow {
    pub fn sentinel(organism: &str) -> Self {
        Self {
            organism: organism.to_string(),
            file_name: Some(NO_FILES_FOUND.to_string()),
            ..Self::default()
        }
    }

    pub fn from_record(organism: &str, record: &FileRecord) -> Self {
        let taxonomy = record.taxonomy.clone();
        Self {
            organism: organism.to_string(),
            file_name: record.file_name.clone(),
            file_id: record.file_id.clone(),
            internal_id: record.internal_id.clone(),
            file_status: record.file_status.clone(),
            md5sum: record.md5sum.clone(),
            file_date: record.file_date.clone(),
            ncbi_taxon_id: taxonomy.ncbi_taxon_id,
            jat_label: record.jat_label.clone(),
            ncbi_taxon_class: taxonomy.ncbi_taxon_class,
            ncbi_taxon_family: taxonomy.ncbi_taxon_family,
            ncbi_taxon_order: taxonomy.ncbi_taxon_order,
            ncbi_taxon_genus: taxonomy.ncbi_taxon_genus,
            ncbi_taxon_species: taxonomy.ncbi_taxon_species,
            file_type: record.file_type.clone(),
            portal_display_location: record.display_location.clone(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.file_name.as_deref() == Some(NO_FILES_FOUND)
    }

    pub fn taxonomy(&self) -> Taxonomy {
        Taxonomy {
            ncbi_taxon_id: self.ncbi_taxon_id.clone(),
            ncbi_taxon_class: self.ncbi_taxon_class.clone(),
            ncbi_taxon_family: self.ncbi_taxon_family.clone(),
            ncbi_taxon_order: self.ncbi_taxon_order.clone(),
            ncbi_taxon_genus: self.ncbi_taxon_genus.clone(),
            ncbi_taxon_species: self.ncbi_taxon_species.clone(),
        }
    }
}

pub fn lower_rows(organism: &str, files: &OrganismFiles) -> Vec<FileRow> {
    match files {
        OrganismFiles::Files(records) if !records.is_empty() => records
            .iter()
            .map(|record| FileRow::from_record(organism, record))
            .collect(),
        _ => vec![FileRow::sentinel(organism)],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlattenResult {
    pub output: String,
    pub organisms: usize,
    pub rows: usize,
    pub organisms_without_files: Vec<String>,
    pub unreadable: Vec<String>,
    pub unreadable_log: String,
}

pub fn flatten_file(file: &Value) -> FileRecord {
    let metadata = file.get("metadata");
    let meta = |key: &str| metadata.and_then(|m| m.get(key)).and_then(field_text);
    let taxon = |key: &str| {
        metadata
            .and_then(|m| m.get("ncbi_taxon"))
            .and_then(|t| t.get(key))
            .and_then(field_text)
    };
    FileRecord {
        file_name: file.get("file_name").and_then(field_text),
        file_id: file.get("file_id").and_then(field_text),
        internal_id: file.get("_id").and_then(field_text),
        file_status: file.get("file_status").and_then(field_text),
        md5sum: file.get("md5sum").and_then(field_text),
        file_date: file.get("file_date").and_then(field_text),
        jat_label: meta("jat_label"),
        taxonomy: Taxonomy {
            ncbi_taxon_id: meta("ncbi_taxon_id"),
            ncbi_taxon_class: taxon("ncbi_taxon_class"),
            ncbi_taxon_family: taxon("ncbi_taxon_family"),
            ncbi_taxon_order: taxon("ncbi_taxon_order"),
            ncbi_taxon_genus: taxon("ncbi_taxon_genus"),
            ncbi_taxon_species: taxon("ncbi_taxon_species"),
        },
        file_type: file.get("file_type").and_then(field_text),
        display_location: metadata
            .and_then(|m| m.get("portal"))
            .and_then(|p| p.get("display_location"))
            .and_then(field_text),
    }
}

/// Reads every persisted page for `organism` in page order.
pub fn collect_organism(layout: &Layout, organism: &OrganismId) -> Result<OrganismFiles, MycoError> {
    let artifacts = layout.list_artifacts(organism)?;
    if artifacts.is_empty() {
        tracing::warn!(%organism, "no JSON artifacts, recording as without files");
        return Ok(OrganismFiles::Empty);
    }
    let mut records = Vec::new();
    for path in &artifacts {
        let body = fs::read_to_string(path.as_std_path())
            .map_err(|err| MycoError::Filesystem(format!("read {path}: {err}")))?;
        let files = page_files(&body).map_err(|err| MycoError::Json(format!("{path}: {err}")))?;
        tracing::debug!(%organism, %path, files = files.len(), "parsed page");
        records.extend(files.iter().map(flatten_file));
    }
    if records.is_empty() {
        tracing::warn!(%organism, "parsed pages hold no files");
        return Ok(OrganismFiles::Empty);
    }
    Ok(OrganismFiles::Files(records))
}

pub fn flatten_all(
    layout: &Layout,
    organisms: &[OrganismId],
    output: &Utf8Path,
) -> Result<FlattenResult, MycoError> {
    let mut rows = Vec::new();
    let mut without_files = Vec::new();
    let mut unreadable = Vec::new();
    for organism in organisms {
        let files = match collect_organism(layout, organism) {
            Ok(files) => files,
            Err(err) => {
                tracing::error!(%organism, error = %err, "skipping unreadable artifacts");
                unreadable.push(organism.to_string());
                OrganismFiles::Empty
            }
        };
        if files == OrganismFiles::Empty {
            without_files.push(organism.to_string());
        }
        rows.extend(lower_rows(organism.as_str(), &files));
    }
    write_file_table(&rows, output)?;
    tracing::info!(%output, rows = rows.len(), "wrote flattened file table");

    // Unreadable organisms share the sentinel row with empty ones; this file
    // tells them apart.
    let unreadable_log = layout.unreadable_listings_path();
    let unreadable_rows: Vec<(&str,)> = unreadable.iter().map(|o| (o.as_str(),)).collect();
    write_csv(&unreadable_log, &["portal"], &unreadable_rows)?;
    if !unreadable.is_empty() {
        tracing::warn!(path = %unreadable_log, count = unreadable.len(), "recorded unreadable organisms");
    }
    Ok(FlattenResult {
        output: output.to_string(),
        organisms: organisms.len(),
        rows: rows.len(),
        organisms_without_files: without_files,
        unreadable,
        unreadable_log: unreadable_log.to_string(),
    })
}

pub fn write_file_table(rows: &[FileRow], path: &Utf8Path) -> Result<(), MycoError> {
    write_csv(path, &FILE_TABLE_COLUMNS, rows)
}

pub fn read_file_table(path: &Utf8Path) -> Result<Vec<FileRow>, MycoError> {
    let mut reader = csv::Reader::from_path(path.as_std_path())?;
    let rows = reader
        .deserialize::<FileRow>()
        .collect::<Result<Vec<_>, csv::Error>>()?;
    Ok(rows)
}

/// Writes `headers` followed by `rows`, so empty tables still carry a header.
pub fn write_csv<T: Serialize>(path: &Utf8Path, headers: &[&str], rows: &[T]) -> Result<(), MycoError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path.as_std_path())?;
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|err| MycoError::Filesystem(err.to_string()))?;
    Ok(())
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_metadata_is_flattened() {
        let file = json!({
            "file_name": "Aspni7_GeneCatalog_proteins.aa.fasta.gz",
            "file_id": 123,
            "_id": "abc",
            "metadata": {
                "ncbi_taxon_id": 5061,
                "jat_label": "label",
                "ncbi_taxon": {"ncbi_taxon_genus": "Aspergillus", "ncbi_taxon_species": ""},
                "portal": {"display_location": ["Files", "Annotation"]}
            }
        });
        let record = flatten_file(&file);
        assert_eq!(record.file_id.as_deref(), Some("123"));
        assert_eq!(record.taxonomy.ncbi_taxon_id.as_deref(), Some("5061"));
        assert_eq!(record.taxonomy.ncbi_taxon_genus.as_deref(), Some("Aspergillus"));
        assert_eq!(record.taxonomy.ncbi_taxon_species, None);
        assert_eq!(record.display_location.as_deref(), Some(r#"["Files","Annotation"]"#));
        assert_eq!(record.md5sum, None);
    }

    #[test]
    fn empty_listing_lowers_to_one_sentinel() {
        let rows = lower_rows("Aspni7", &OrganismFiles::Empty);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_sentinel());
        assert_eq!(rows[0].taxonomy(), Taxonomy::default());
    }
}
