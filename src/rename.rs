use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::PortalRule;
use crate::error::MycoError;
use crate::fasta::{FastaRecord, read_fasta, write_records};
use crate::layout::file_name_of;
use crate::manifest::Manifest;

pub const JGI_TAG: &str = "jgi|";
pub const MISSING_MARKER: &str = "MISSING";
pub const ERROR_MARKER: &str = "ERROR";

pub const RENAME_LOG_COLUMNS: [&str; 5] = [
    "file",
    "total_sequences",
    "renamed_sequences",
    "first_id_before",
    "first_id_after",
];

pub const PORTAL_RENAME_LOG_COLUMNS: [&str; 6] = [
    "portal",
    "file",
    "total_sequences",
    "renamed_sequences",
    "first_id_before",
    "first_id_after",
];

/// Maps an identifier to its normalised form, or `None` to leave it as is.
pub trait HeaderRewrite {
    fn rewrite(&self, id: &str) -> Option<String>;
}

/// `jgi|<portal>|<protein id>|...` becomes `<portal>-<protein id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JgiTagRewrite;

impl HeaderRewrite for JgiTagRewrite {
    fn rewrite(&self, id: &str) -> Option<String> {
        if !id.starts_with(JGI_TAG) {
            return None;
        }
        let parts: Vec<&str> = id.split('|').collect();
        if parts.len() < 3 {
            return None;
        }
        Some(format!("{}-{}", parts[1], parts[2]))
    }
}

impl HeaderRewrite for PortalRule {
    fn rewrite(&self, id: &str) -> Option<String> {
        let captures = self.pattern.captures(id)?;
        if captures.get(0)?.start() != 0 {
            return None;
        }
        Some(format!("{}-{}", self.portal, captures.get(1)?.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameStats {
    pub total: usize,
    pub renamed: usize,
    pub first_before: Option<String>,
    pub first_after: Option<String>,
}

/// Rewrites identifiers in place. Records the rule does not match keep
/// their original header, description included.
pub fn rename_records(records: &mut [FastaRecord], rule: &dyn HeaderRewrite) -> RenameStats {
    let mut stats = RenameStats {
        total: records.len(),
        ..RenameStats::default()
    };
    for (idx, record) in records.iter_mut().enumerate() {
        let before = record.id().to_string();
        if let Some(new_id) = rule.rewrite(&before) {
            record.set_id(&new_id);
            stats.renamed += 1;
        }
        if idx == 0 {
            stats.first_after = Some(record.id().to_string());
            stats.first_before = Some(before);
        }
    }
    stats
}

pub fn rename_file(
    input: &Utf8Path,
    output: &Utf8Path,
    rule: &dyn HeaderRewrite,
) -> Result<RenameStats, MycoError> {
    let mut records = read_fasta(input)?;
    let stats = rename_records(&mut records, rule);
    write_records(output, &records)?;
    Ok(stats)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenameOutcome {
    Renamed {
        file: String,
        output: Utf8PathBuf,
        stats: RenameStats,
    },
    Missing {
        file: Option<String>,
    },
    Failed {
        file: String,
        reason: String,
    },
}

impl RenameOutcome {
    pub fn output(&self) -> Option<&Utf8Path> {
        match self {
            RenameOutcome::Renamed { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn log_entry(&self) -> RenameLogEntry {
        match self {
            RenameOutcome::Renamed { file, stats, .. } => RenameLogEntry {
                file: file.clone(),
                total_sequences: stats.total,
                renamed_sequences: stats.renamed,
                first_id_before: stats.first_before.clone().unwrap_or_default(),
                first_id_after: stats.first_after.clone().unwrap_or_default(),
            },
            RenameOutcome::Missing { file } => RenameLogEntry {
                file: file.clone().unwrap_or_else(|| MISSING_MARKER.to_string()),
                total_sequences: 0,
                renamed_sequences: 0,
                first_id_before: MISSING_MARKER.to_string(),
                first_id_after: MISSING_MARKER.to_string(),
            },
            RenameOutcome::Failed { file, .. } => RenameLogEntry {
                file: file.clone(),
                total_sequences: 0,
                renamed_sequences: 0,
                first_id_before: ERROR_MARKER.to_string(),
                first_id_after: ERROR_MARKER.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameLogEntry {
    pub file: String,
    pub total_sequences: usize,
    pub renamed_sequences: usize,
    pub first_id_before: String,
    pub first_id_after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalRenameLogEntry {
    pub portal: String,
    pub file: String,
    pub total_sequences: usize,
    pub renamed_sequences: usize,
    pub first_id_before: String,
    pub first_id_after: String,
}

impl PortalRenameLogEntry {
    pub fn new(portal: &str, entry: RenameLogEntry) -> Self {
        Self {
            portal: portal.to_string(),
            file: entry.file,
            total_sequences: entry.total_sequences,
            renamed_sequences: entry.renamed_sequences,
            first_id_before: entry.first_id_before,
            first_id_after: entry.first_id_after,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortalRename {
    pub portal: String,
    #[serde(flatten)]
    pub outcome: RenameOutcome,
}

/// Runs `rule` over `input` when it is a readable file, writing `output`.
pub fn rename_one(
    input: Option<&Utf8Path>,
    output: &Utf8Path,
    rule: &dyn HeaderRewrite,
) -> RenameOutcome {
    let Some(input) = input.filter(|path| path.as_std_path().is_file()) else {
        let file = input.map(|path| file_name_of(path.as_std_path()));
        tracing::warn!(input = ?input, "input FASTA not found, skipping");
        return RenameOutcome::Missing { file };
    };
    let file = file_name_of(input.as_std_path());
    match rename_file(input, output, rule) {
        Ok(stats) => {
            tracing::info!(
                %output,
                renamed = stats.renamed,
                total = stats.total,
                "renamed headers"
            );
            RenameOutcome::Renamed {
                file,
                output: output.to_path_buf(),
                stats,
            }
        }
        Err(err) => {
            tracing::error!(%input, error = %err, "failed to rename headers");
            RenameOutcome::Failed {
                file,
                reason: err.to_string(),
            }
        }
    }
}

/// Generic pass over the manifest: each extracted file is written to
/// `<renamed_dir>/<portal>.fasta` (or its own name when the row has no
/// portal) and `renamed_file` is set only on success.
pub fn rename_manifest(manifest: &mut Manifest, renamed_dir: &Utf8Path) -> Vec<RenameOutcome> {
    let rule = JgiTagRewrite;
    let mut outcomes = Vec::with_capacity(manifest.entries.len());
    for entry in &mut manifest.entries {
        let input = entry.extracted_file.clone();
        let output_name = if entry.portal.is_empty() {
            input
                .as_ref()
                .map(|path| file_name_of(path.as_std_path()))
                .unwrap_or_default()
        } else {
            format!("{}.fasta", entry.portal)
        };
        let outcome = rename_one(input.as_deref(), &renamed_dir.join(output_name), &rule);
        entry.renamed_file = outcome.output().map(Utf8Path::to_path_buf);
        outcomes.push(outcome);
    }
    outcomes
}

/// Portal-specific pass over an already processed manifest: rows whose
/// portal has a rule are rewritten in place at `<renamed_dir>/<portal>.fasta`.
/// A row whose rewrite did not succeed loses its `renamed_file`.
pub fn rename_custom(
    manifest: &mut Manifest,
    rules: &[PortalRule],
    renamed_dir: &Utf8Path,
) -> Vec<PortalRename> {
    let mut results = Vec::new();
    for entry in &mut manifest.entries {
        let Some(rule) = rules.iter().find(|rule| rule.portal == entry.portal) else {
            continue;
        };
        let output = renamed_dir.join(format!("{}.fasta", entry.portal));
        let outcome = rename_one(entry.renamed_file.as_deref(), &output, rule);
        entry.renamed_file = outcome.output().map(Utf8Path::to_path_buf);
        results.push(PortalRename {
            portal: entry.portal.clone(),
            outcome,
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn jgi_tag_uses_second_and_third_fields() {
        let rule = JgiTagRewrite;
        assert_eq!(
            rule.rewrite("jgi|Aspni7|1234|fgenesh1_pg.1_#_1").as_deref(),
            Some("Aspni7-1234")
        );
        assert_eq!(rule.rewrite("jgi|Aspni7"), None);
        assert_eq!(rule.rewrite("sp|P69905|HBA_HUMAN"), None);
    }

    #[test]
    fn portal_rule_strips_prefix_and_leading_zeros() {
        let rule = PortalRule {
            portal: "Altbr1".to_string(),
            pattern: Regex::new(r"^AB0*(\d+)\.\d+").unwrap(),
        };
        assert_eq!(rule.rewrite("AB000123.1").as_deref(), Some("Altbr1-123"));
        assert_eq!(rule.rewrite("AB000.1").as_deref(), Some("Altbr1-0"));
        assert_eq!(rule.rewrite("XAB01.1"), None);
    }

    #[test]
    fn unanchored_rule_only_matches_at_start() {
        let rule = PortalRule {
            portal: "Pyrtr1".to_string(),
            pattern: Regex::new(r"PTRG_0*(\d+)").unwrap(),
        };
        assert_eq!(rule.rewrite("PTRG_00042").as_deref(), Some("Pyrtr1-42"));
        assert_eq!(rule.rewrite("xPTRG_00042"), None);
    }

    #[test]
    fn stats_track_first_record() {
        let mut records = vec![
            FastaRecord::new("jgi|Aspni7|1|m desc", b"MK"),
            FastaRecord::new("other", b"MK"),
        ];
        let stats = rename_records(&mut records, &JgiTagRewrite);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.renamed, 1);
        assert_eq!(stats.first_before.as_deref(), Some("jgi|Aspni7|1|m"));
        assert_eq!(stats.first_after.as_deref(), Some("Aspni7-1"));
        assert_eq!(records[0].header, "Aspni7-1");
        assert_eq!(records[1].header, "other");
    }
}
