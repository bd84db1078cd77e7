use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    CustomRenameResult, FilesResult, ProgressEvent, ProgressSink, ProteomeResult, RunResult,
};
use crate::filter::{FilterOutcome, FilterResult};
use crate::flatten::FlattenResult;
use crate::listing::ListingOutcome;
use crate::reconcile::ReconcileResult;
use crate::rename::RenameOutcome;
use crate::table::TableResult;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Console }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_table(result: &TableResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_files(result: &FilesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_flatten(result: &FlattenResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_reconcile(result: &ReconcileResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_proteomes(result: &ProteomeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_custom(result: &CustomRenameResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_filter(result: &FilterResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr, one per event.
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn event(&self, event: ProgressEvent) {
        let marker = if event.failed { "!" } else { "-" };
        eprintln!("{marker} stage={}; {}", event.stage.as_str(), event.message);
    }
}

pub struct ConsoleSummary;

impl ConsoleSummary {
    pub fn print_table(result: &TableResult) {
        match &result.error {
            None => println!("portal table: {} rows -> {}", result.rows, result.output),
            Some(reason) => println!("portal table: failed ({reason})"),
        }
    }

    pub fn print_files(result: &FilesResult) {
        let listing = &result.listing;
        println!(
            "file listings: {} found, {} empty, {} cached, {} failed",
            listing.count(|o| matches!(o, ListingOutcome::Found { .. })),
            listing.count(|o| matches!(o, ListingOutcome::Empty)),
            listing.count(|o| matches!(o, ListingOutcome::Cached { .. })),
            listing.count(|o| matches!(o, ListingOutcome::Failed { .. })),
        );
        Self::print_flatten(&result.flatten);
    }

    pub fn print_flatten(result: &FlattenResult) {
        println!(
            "file table: {} rows for {} organisms -> {}",
            result.rows, result.organisms, result.output
        );
        if !result.unreadable.is_empty() {
            println!(
                "unreadable listings: {} -> {}",
                result.unreadable.join(", "),
                result.unreadable_log
            );
        }
    }

    pub fn print_reconcile(result: &ReconcileResult) {
        println!(
            "phylogeny: {} organisms, {} missing, {} incomplete, {} single, {} double -> {}",
            result.organisms,
            result.missing,
            result.incomplete,
            result.single,
            result.double,
            result.output_dir
        );
    }

    pub fn print_proteomes(result: &ProteomeResult) {
        let extracted = result
            .extracted
            .iter()
            .filter(|entry| entry.outcome.recorded_path().is_some())
            .count();
        println!("extracted: {extracted}/{}", result.extracted.len());
        print_renames(&result.renamed);
        println!("manifest: {}", result.manifest);
        println!("rename log: {}", result.log);
    }

    pub fn print_custom(result: &CustomRenameResult) {
        let outcomes: Vec<RenameOutcome> =
            result.renamed.iter().map(|item| item.outcome.clone()).collect();
        print_renames(&outcomes);
        println!("custom rename log: {}", result.log);
    }

    pub fn print_filter(result: &FilterResult) {
        println!(
            "length window: {}..={}",
            result.window.min, result.window.max
        );
        for file in &result.files {
            match &file.outcome {
                FilterOutcome::Filtered {
                    output,
                    total,
                    kept,
                } => println!("  {}: kept {kept}/{total} -> {output}", file.file),
                FilterOutcome::Empty => println!("  {}: empty, skipped", file.file),
                FilterOutcome::Failed { reason } => println!("  {}: failed ({reason})", file.file),
            }
        }
    }

    pub fn print_run(result: &RunResult) {
        Self::print_table(&result.table);
        Self::print_files(&result.files);
        Self::print_reconcile(&result.reconcile);
        Self::print_proteomes(&result.proteomes);
        Self::print_custom(&result.custom);
        Self::print_filter(&result.filter);
        println!("finished in {:.1}s", result.elapsed_secs);
    }
}

fn print_renames(outcomes: &[RenameOutcome]) {
    for outcome in outcomes {
        match outcome {
            RenameOutcome::Renamed { file, stats, .. } => println!(
                "  {file}: {}/{} headers renamed",
                stats.renamed, stats.total
            ),
            RenameOutcome::Missing { file } => {
                println!("  {}: missing", file.as_deref().unwrap_or("-"))
            }
            RenameOutcome::Failed { file, reason } => println!("  {file}: failed ({reason})"),
        }
    }
}
