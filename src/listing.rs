use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;
use serde_json::Value;

use crate::domain::OrganismId;
use crate::error::{FailureClass, MycoError};
use crate::jgi::FileListClient;
use crate::layout::{Layout, write_bytes_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListingOutcome {
    /// At least one non-empty page was fetched and persisted.
    Found { pages: u32, files: usize },
    /// The first page was already empty.
    Empty,
    /// Artifacts were on disk, so nothing was requested.
    Cached { artifacts: usize },
    Failed { reason: String },
}

impl ListingOutcome {
    pub fn found_files(&self) -> bool {
        matches!(self, ListingOutcome::Found { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganismListing {
    pub organism: String,
    #[serde(flatten)]
    pub outcome: ListingOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingResult {
    pub organisms: Vec<OrganismListing>,
}

impl ListingResult {
    pub fn count(&self, predicate: impl Fn(&ListingOutcome) -> bool) -> usize {
        self.organisms
            .iter()
            .filter(|item| predicate(&item.outcome))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PagingOptions {
    pub per_page: u32,
    pub delay: Duration,
}

/// Organism ids from the `portal` column of the curated list, blank rows
/// skipped.
pub fn read_organism_ids(path: &Utf8Path) -> Result<Vec<OrganismId>, MycoError> {
    let mut reader = csv::Reader::from_path(path.as_std_path())?;
    let portal_idx = reader
        .headers()?
        .iter()
        .position(|header| header == "portal")
        .ok_or_else(|| MycoError::MissingColumn("portal".to_string()))?;
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        let value = record.get(portal_idx).unwrap_or_default();
        if value.trim().is_empty() {
            continue;
        }
        ids.push(value.parse()?);
    }
    Ok(ids)
}

/// Entries of `organisms[0].files`; a body without that path has no files.
pub fn page_files(body: &str) -> Result<Vec<Value>, MycoError> {
    let value: Value = serde_json::from_str(body).map_err(|err| MycoError::Json(err.to_string()))?;
    Ok(value
        .get("organisms")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("files"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default())
}

/// Walks the listing for one organism until an empty page, persisting each
/// non-empty page body as `all_files_<organism>_page_<n>.json`.
///
/// Any artifact already on disk marks the organism as done, even if an
/// earlier run stopped part-way through its pages.
pub fn fetch_organism<C: FileListClient + ?Sized>(
    client: &C,
    layout: &Layout,
    organism: &OrganismId,
    options: PagingOptions,
) -> ListingOutcome {
    match layout.list_artifacts(organism) {
        Ok(existing) if !existing.is_empty() => {
            tracing::info!(%organism, artifacts = existing.len(), "using cached listing");
            return ListingOutcome::Cached {
                artifacts: existing.len(),
            };
        }
        Ok(_) => {}
        Err(err) => return failed(organism, err),
    }

    match walk_pages(client, layout, organism, options) {
        Ok((0, _)) => {
            tracing::warn!(%organism, "no files found across any pages");
            ListingOutcome::Empty
        }
        Ok((files, pages)) => {
            tracing::info!(%organism, files, pages, "saved file listing");
            ListingOutcome::Found { pages, files }
        }
        Err(err) => failed(organism, err),
    }
}

pub fn fetch_all<C: FileListClient + ?Sized>(
    client: &C,
    layout: &Layout,
    organisms: &[OrganismId],
    options: PagingOptions,
    mut on_done: impl FnMut(&OrganismId, &ListingOutcome),
) -> ListingResult {
    let organisms = organisms
        .iter()
        .map(|organism| {
            let outcome = fetch_organism(client, layout, organism, options);
            on_done(organism, &outcome);
            OrganismListing {
                organism: organism.to_string(),
                outcome,
            }
        })
        .collect();
    ListingResult { organisms }
}

fn walk_pages<C: FileListClient + ?Sized>(
    client: &C,
    layout: &Layout,
    organism: &OrganismId,
    options: PagingOptions,
) -> Result<(usize, u32), MycoError> {
    let mut page = 1u32;
    let mut total = 0usize;
    loop {
        tracing::debug!(%organism, page, "fetching page");
        let body = client.fetch_page(organism, page, options.per_page)?;
        let files = page_files(&body)?;
        if files.is_empty() {
            tracing::debug!(%organism, page, "empty page, stopping");
            return Ok((total, page - 1));
        }
        total += files.len();
        let path = layout.artifact_path(organism, page);
        write_bytes_atomic(&path, body.as_bytes())?;
        tracing::info!(%organism, page, files = files.len(), %path, "saved page");
        page += 1;
        if !options.delay.is_zero() {
            thread::sleep(options.delay);
        }
    }
}

fn failed(organism: &OrganismId, err: MycoError) -> ListingOutcome {
    match err.class() {
        FailureClass::Network => tracing::error!(%organism, error = %err, "request failed"),
        FailureClass::Parse => tracing::error!(%organism, error = %err, "unreadable listing"),
        _ => tracing::error!(%organism, error = %err, "listing failed"),
    }
    ListingOutcome::Failed {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_read_from_first_organism() {
        let body = r#"{"organisms":[{"files":[{"file_name":"a"},{"file_name":"b"}]}]}"#;
        assert_eq!(page_files(body).unwrap().len(), 2);
    }

    #[test]
    fn missing_organisms_means_no_files() {
        assert!(page_files(r#"{"organisms":[]}"#).unwrap().is_empty());
        assert!(page_files("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let err = page_files("<html>").unwrap_err();
        assert_eq!(err.class(), FailureClass::Parse);
    }
}
