use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::OrganismId;
use crate::error::MycoError;

/// Fixed on-disk locations shared by every stage. Later stages find earlier
/// outputs through this type rather than through parameters.
#[derive(Debug, Clone)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn portals_table_path(&self) -> Utf8PathBuf {
        self.root.join("mycocosm_fungi_data.csv")
    }

    pub fn organism_ids_path(&self) -> Utf8PathBuf {
        self.root.join("selectedorganism_ids.csv")
    }

    pub fn json_dir(&self) -> Utf8PathBuf {
        self.root.join("json_files")
    }

    pub fn artifact_path(&self, organism: &OrganismId, page: u32) -> Utf8PathBuf {
        self.json_dir().join(artifact_file_name(organism, page))
    }

    pub fn files_metadata_path(&self) -> Utf8PathBuf {
        self.root.join("mycocosm_data.csv")
    }

    /// Organisms whose page artifacts could not be parsed during flattening.
    pub fn unreadable_listings_path(&self) -> Utf8PathBuf {
        self.root.join("unreadable_listings.csv")
    }

    pub fn portals_dir(&self) -> Utf8PathBuf {
        self.root.join("portals")
    }

    pub fn missing_partition_path(&self) -> Utf8PathBuf {
        self.portals_dir().join("missing_portals_phylogeny.csv")
    }

    pub fn incomplete_partition_path(&self) -> Utf8PathBuf {
        self.portals_dir().join("portals_incomplete_phylogeny.csv")
    }

    pub fn single_partition_path(&self) -> Utf8PathBuf {
        self.portals_dir().join("portals_single_phylogeny.csv")
    }

    pub fn double_partition_path(&self) -> Utf8PathBuf {
        self.portals_dir().join("portals_double_phylogeny.csv")
    }

    pub fn selected_manifest_path(&self) -> Utf8PathBuf {
        self.root.join("selected_proteomes.csv")
    }

    pub fn processed_manifest_path(&self) -> Utf8PathBuf {
        self.root.join("processed_proteomes.csv")
    }

    pub fn proteomes_dir(&self) -> Utf8PathBuf {
        self.root.join("proteomes")
    }

    pub fn compressed_dir(&self) -> Utf8PathBuf {
        self.proteomes_dir().join("compressed")
    }

    pub fn extracted_dir(&self) -> Utf8PathBuf {
        self.proteomes_dir().join("extracted")
    }

    pub fn renamed_dir(&self) -> Utf8PathBuf {
        self.proteomes_dir().join("renamed")
    }

    pub fn clean_dir(&self) -> Utf8PathBuf {
        self.proteomes_dir().join("clean")
    }

    pub fn rename_log_path(&self) -> Utf8PathBuf {
        self.proteomes_dir().join("rename_log.csv")
    }

    pub fn custom_rename_log_path(&self) -> Utf8PathBuf {
        self.proteomes_dir().join("custom_rename_log.csv")
    }

    /// Page artifacts already on disk for `organism`, ordered by page number.
    pub fn list_artifacts(&self, organism: &OrganismId) -> Result<Vec<Utf8PathBuf>, MycoError> {
        let json_dir = self.json_dir();
        if !json_dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(json_dir.as_std_path())
            .map_err(|err| MycoError::Filesystem(format!("read {json_dir}: {err}")))?;
        let mut pages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| MycoError::Filesystem(err.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(page) = parse_artifact_page(organism, name) {
                pages.push((page, json_dir.join(name)));
            }
        }
        pages.sort_by_key(|(page, _)| *page);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }
}

pub fn artifact_file_name(organism: &OrganismId, page: u32) -> String {
    format!("all_files_{organism}_page_{page}.json")
}

fn parse_artifact_page(organism: &OrganismId, file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("all_files_")?
        .strip_prefix(organism.as_str())?
        .strip_prefix("_page_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), MycoError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("create {path}: {err}")))
}

pub fn require_dir(path: &Utf8Path) -> Result<(), MycoError> {
    if path.as_std_path().is_dir() {
        Ok(())
    } else {
        Err(MycoError::DirectoryNotFound(path.as_std_path().to_path_buf()))
    }
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), MycoError> {
    let parent = path
        .parent()
        .ok_or_else(|| MycoError::Filesystem(format!("no parent directory for {path}")))?;
    ensure_dir(parent)?;
    let temp = tempfile::Builder::new()
        .prefix(".mycocosm-etl")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MycoError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| MycoError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| MycoError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Final path component as a lossy string, used for log rows.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_page_parsing_rejects_other_organisms() {
        let id: OrganismId = "Aspni7".parse().unwrap();
        assert_eq!(parse_artifact_page(&id, "all_files_Aspni7_page_12.json"), Some(12));
        assert_eq!(parse_artifact_page(&id, "all_files_Aspni7_x_page_1.json"), None);
        assert_eq!(parse_artifact_page(&id, "all_files_Aspni_page_1.json"), None);
        assert_eq!(parse_artifact_page(&id, "all_files_Aspni7_page_1.json.tmp"), None);
    }
}
