use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::domain::OrganismId;
use crate::error::MycoError;
use crate::extract::{ExtractedEntry, extract_manifest};
use crate::filter::{FilterOutcome, FilterResult, filter_dir};
use crate::flatten::{FlattenResult, flatten_all, read_file_table, write_csv};
use crate::jgi::FileListClient;
use crate::layout::{Layout, ensure_dir, require_dir};
use crate::listing::{ListingOutcome, ListingResult, PagingOptions, fetch_all, read_organism_ids};
use crate::manifest::Manifest;
use crate::reconcile::{ReconcileResult, distinct_organisms, partition, summarize, write_partitions};
use crate::rename::{
    PORTAL_RENAME_LOG_COLUMNS, PortalRename, PortalRenameLogEntry, RENAME_LOG_COLUMNS,
    RenameOutcome, rename_custom, rename_manifest,
};
use crate::table::{PortalPageClient, TableResult, fetch_portal_table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Table,
    Files,
    Flatten,
    Reconcile,
    Proteomes,
    RenameCustom,
    Filter,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Table => "table",
            Stage::Files => "files",
            Stage::Flatten => "flatten",
            Stage::Reconcile => "reconcile",
            Stage::Proteomes => "proteomes",
            Stage::RenameCustom => "rename-custom",
            Stage::Filter => "filter",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub failed: bool,
}

impl ProgressEvent {
    fn ok(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            failed: false,
        }
    }

    fn failed(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            failed: true,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct FilesResult {
    pub listing: ListingResult,
    pub flatten: FlattenResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProteomeResult {
    pub extracted: Vec<ExtractedEntry>,
    pub renamed: Vec<RenameOutcome>,
    pub manifest: String,
    pub log: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomRenameResult {
    pub renamed: Vec<PortalRename>,
    pub log: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub table: TableResult,
    pub files: FilesResult,
    pub reconcile: ReconcileResult,
    pub proteomes: ProteomeResult,
    pub custom: CustomRenameResult,
    pub filter: FilterResult,
    pub started_at: String,
    pub elapsed_secs: f64,
}

pub struct App<P: PortalPageClient, F: FileListClient> {
    config: PipelineConfig,
    layout: Layout,
    pages: P,
    files: F,
}

impl<P: PortalPageClient, F: FileListClient> App<P, F> {
    pub fn new(config: PipelineConfig, pages: P, files: F) -> Self {
        let layout = Layout::new(config.data_dir.clone());
        Self {
            config,
            layout,
            pages,
            files,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fetch_table(&self, sink: &dyn ProgressSink) -> TableResult {
        sink.event(ProgressEvent::ok(
            Stage::Table,
            format!("fetching {}", self.config.table_url),
        ));
        let result = fetch_portal_table(
            &self.pages,
            &self.config.table_url,
            &self.config.portal_url_prefix,
            &self.layout.portals_table_path(),
        );
        match &result.error {
            None => sink.event(ProgressEvent::ok(
                Stage::Table,
                format!("saved {} portals to {}", result.rows, result.output),
            )),
            Some(reason) => sink.event(ProgressEvent::failed(Stage::Table, reason.clone())),
        }
        result
    }

    pub fn organism_ids(&self) -> Result<Vec<OrganismId>, MycoError> {
        read_organism_ids(&self.layout.organism_ids_path())
    }

    pub fn fetch_file_lists(
        &self,
        organisms: &[OrganismId],
        sink: &dyn ProgressSink,
    ) -> Result<ListingResult, MycoError> {
        ensure_dir(&self.layout.json_dir())?;
        let options = PagingOptions {
            per_page: self.config.files_per_page,
            delay: self.config.request_delay,
        };
        Ok(fetch_all(
            &self.files,
            &self.layout,
            organisms,
            options,
            |organism, outcome| {
                let event = match outcome {
                    ListingOutcome::Found { pages, files } => ProgressEvent::ok(
                        Stage::Files,
                        format!("{organism}: {files} files over {pages} pages"),
                    ),
                    ListingOutcome::Empty => {
                        ProgressEvent::ok(Stage::Files, format!("{organism}: no files"))
                    }
                    ListingOutcome::Cached { artifacts } => ProgressEvent::ok(
                        Stage::Files,
                        format!("{organism}: using {artifacts} cached pages"),
                    ),
                    ListingOutcome::Failed { reason } => {
                        ProgressEvent::failed(Stage::Files, format!("{organism}: {reason}"))
                    }
                };
                sink.event(event);
            },
        ))
    }

    pub fn flatten(
        &self,
        organisms: &[OrganismId],
        sink: &dyn ProgressSink,
    ) -> Result<FlattenResult, MycoError> {
        let result = flatten_all(&self.layout, organisms, &self.layout.files_metadata_path())?;
        for organism in &result.unreadable {
            sink.event(ProgressEvent::failed(
                Stage::Flatten,
                format!("{organism}: unreadable artifacts"),
            ));
        }
        sink.event(ProgressEvent::ok(
            Stage::Flatten,
            format!(
                "{} rows for {} organisms ({} without files) written to {}",
                result.rows,
                result.organisms,
                result.organisms_without_files.len(),
                result.output
            ),
        ));
        Ok(result)
    }

    /// Fetches every listed organism, then rebuilds the flattened table.
    pub fn files(&self, sink: &dyn ProgressSink) -> Result<FilesResult, MycoError> {
        let organisms = self.organism_ids()?;
        let listing = self.fetch_file_lists(&organisms, sink)?;
        let flatten = self.flatten(&organisms, sink)?;
        Ok(FilesResult { listing, flatten })
    }

    pub fn reconcile(&self, sink: &dyn ProgressSink) -> Result<ReconcileResult, MycoError> {
        let rows = read_file_table(&self.layout.files_metadata_path())?;
        let organisms = distinct_organisms(&rows).len();
        let partitions = partition(&rows)?;
        ensure_dir(&self.layout.portals_dir())?;
        write_partitions(&partitions, &self.layout)?;
        let result = summarize(&partitions, organisms, &self.layout);
        sink.event(ProgressEvent::ok(
            Stage::Reconcile,
            format!(
                "{} organisms: {} missing, {} incomplete, {} single, {} double",
                result.organisms, result.missing, result.incomplete, result.single, result.double
            ),
        ));
        Ok(result)
    }

    /// Extracts every manifest archive, normalises FASTA headers, and writes
    /// the updated manifest plus the rename log.
    pub fn process_proteomes(&self, sink: &dyn ProgressSink) -> Result<ProteomeResult, MycoError> {
        require_dir(&self.layout.proteomes_dir())?;
        require_dir(&self.layout.compressed_dir())?;
        let mut manifest = Manifest::read(&self.layout.selected_manifest_path())?;

        let extracted = extract_manifest(
            &mut manifest,
            &self.layout.compressed_dir(),
            &self.layout.extracted_dir(),
        )?;
        for entry in &extracted {
            let name = entry.compressed_file.as_deref().unwrap_or("-");
            let event = match entry.outcome.recorded_path() {
                Some(path) => ProgressEvent::ok(Stage::Proteomes, format!("extracted {name} to {path}")),
                None => ProgressEvent::failed(Stage::Proteomes, format!("no extraction for {name}")),
            };
            sink.event(event);
        }

        ensure_dir(&self.layout.renamed_dir())?;
        let renamed = rename_manifest(&mut manifest, &self.layout.renamed_dir());
        for outcome in &renamed {
            sink.event(rename_event(Stage::Proteomes, None, outcome));
        }

        let manifest_path = self.layout.processed_manifest_path();
        manifest.write(&manifest_path)?;
        let log_path = self.layout.rename_log_path();
        let log: Vec<_> = renamed.iter().map(RenameOutcome::log_entry).collect();
        write_csv(&log_path, &RENAME_LOG_COLUMNS, &log)?;
        sink.event(ProgressEvent::ok(
            Stage::Proteomes,
            format!("updated manifest {manifest_path}, log {log_path}"),
        ));

        Ok(ProteomeResult {
            extracted,
            renamed,
            manifest: manifest_path.to_string(),
            log: log_path.to_string(),
        })
    }

    pub fn rename_custom(&self, sink: &dyn ProgressSink) -> Result<CustomRenameResult, MycoError> {
        let manifest_path = self.layout.processed_manifest_path();
        let mut manifest = Manifest::read(&manifest_path)?;
        ensure_dir(&self.layout.renamed_dir())?;
        let renamed = rename_custom(
            &mut manifest,
            &self.config.custom_rules,
            &self.layout.renamed_dir(),
        );
        manifest.write(&manifest_path)?;
        for item in &renamed {
            sink.event(rename_event(Stage::RenameCustom, Some(&item.portal), &item.outcome));
        }
        let log_path = self.layout.custom_rename_log_path();
        let log: Vec<_> = renamed
            .iter()
            .map(|item| PortalRenameLogEntry::new(&item.portal, item.outcome.log_entry()))
            .collect();
        write_csv(&log_path, &PORTAL_RENAME_LOG_COLUMNS, &log)?;
        Ok(CustomRenameResult {
            renamed,
            log: log_path.to_string(),
        })
    }

    pub fn filter(&self, sink: &dyn ProgressSink) -> Result<FilterResult, MycoError> {
        let result = filter_dir(
            &self.layout.renamed_dir(),
            &self.layout.clean_dir(),
            self.config.length_window,
        )?;
        for file in &result.files {
            let event = match &file.outcome {
                FilterOutcome::Filtered { total, kept, .. } => ProgressEvent::ok(
                    Stage::Filter,
                    format!("{}: kept {kept} of {total} sequences", file.file),
                ),
                FilterOutcome::Empty => {
                    ProgressEvent::failed(Stage::Filter, format!("{}: no sequences", file.file))
                }
                FilterOutcome::Failed { reason } => {
                    ProgressEvent::failed(Stage::Filter, format!("{}: {reason}", file.file))
                }
            };
            sink.event(event);
        }
        Ok(result)
    }

    /// Every stage in order. The metadata pipeline runs first; the proteome
    /// pipeline only depends on the curated manifest.
    pub fn run_all(&self, sink: &dyn ProgressSink) -> Result<RunResult, MycoError> {
        let started_at = Utc::now().to_rfc3339();
        let started = Instant::now();
        let table = self.fetch_table(sink);
        let files = self.files(sink)?;
        let reconcile = self.reconcile(sink)?;
        let proteomes = self.process_proteomes(sink)?;
        let custom = self.rename_custom(sink)?;
        let filter = self.filter(sink)?;
        Ok(RunResult {
            table,
            files,
            reconcile,
            proteomes,
            custom,
            filter,
            started_at,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

fn rename_event(stage: Stage, portal: Option<&str>, outcome: &RenameOutcome) -> ProgressEvent {
    let prefix = portal.map(|p| format!("{p}: ")).unwrap_or_default();
    match outcome {
        RenameOutcome::Renamed { output, stats, .. } => ProgressEvent::ok(
            stage,
            format!("{prefix}renamed {}/{} headers in {output}", stats.renamed, stats.total),
        ),
        RenameOutcome::Missing { file } => ProgressEvent::failed(
            stage,
            format!("{prefix}input missing: {}", file.as_deref().unwrap_or("-")),
        ),
        RenameOutcome::Failed { file, reason } => {
            ProgressEvent::failed(stage, format!("{prefix}{file}: {reason}"))
        }
    }
}
