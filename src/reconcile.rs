use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::MycoError;
use crate::flatten::{FileRow, Taxonomy, write_csv};
use crate::layout::Layout;

pub const PHYLOGENY_COLUMNS: [&str; 7] = [
    "organism",
    "ncbi_taxon_id",
    "ncbi_taxon_class",
    "ncbi_taxon_family",
    "ncbi_taxon_order",
    "ncbi_taxon_genus",
    "ncbi_taxon_species",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PhylogenyRow {
    pub organism: String,
    pub ncbi_taxon_id: Option<String>,
    pub ncbi_taxon_class: Option<String>,
    pub ncbi_taxon_family: Option<String>,
    pub ncbi_taxon_order: Option<String>,
    pub ncbi_taxon_genus: Option<String>,
    pub ncbi_taxon_species: Option<String>,
}

impl PhylogenyRow {
    fn new(organism: &str, taxonomy: Taxonomy) -> Self {
        Self {
            organism: organism.to_string(),
            ncbi_taxon_id: taxonomy.ncbi_taxon_id,
            ncbi_taxon_class: taxonomy.ncbi_taxon_class,
            ncbi_taxon_family: taxonomy.ncbi_taxon_family,
            ncbi_taxon_order: taxonomy.ncbi_taxon_order,
            ncbi_taxon_genus: taxonomy.ncbi_taxon_genus,
            ncbi_taxon_species: taxonomy.ncbi_taxon_species,
        }
    }

    pub fn has_taxon_id(&self) -> bool {
        self.ncbi_taxon_id.is_some()
    }
}

/// The four disjoint organism classes. Each organism in the input appears in
/// exactly one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitions {
    pub missing: Vec<PhylogenyRow>,
    pub incomplete: Vec<PhylogenyRow>,
    pub single: Vec<PhylogenyRow>,
    pub double: Vec<PhylogenyRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub organisms: usize,
    pub missing: usize,
    pub incomplete: usize,
    pub single: usize,
    pub double: usize,
    pub output_dir: String,
}

/// Organisms in first-seen order.
pub fn distinct_organisms(rows: &[FileRow]) -> Vec<&str> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.organism.as_str())
        .filter(|organism| seen.insert(*organism))
        .collect()
}

/// Organisms with a sentinel row, and every other organism.
pub fn split_missing(rows: &[FileRow]) -> (HashSet<&str>, HashSet<&str>) {
    let missing: HashSet<&str> = rows
        .iter()
        .filter(|row| row.is_sentinel())
        .map(|row| row.organism.as_str())
        .collect();
    let retrieved = rows
        .iter()
        .map(|row| row.organism.as_str())
        .filter(|organism| !missing.contains(organism))
        .collect();
    (missing, retrieved)
}

/// Organism plus taxonomy columns, keeping the first of identical rows.
pub fn project_phylogeny(rows: &[FileRow]) -> Vec<PhylogenyRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| PhylogenyRow::new(&row.organism, row.taxonomy()))
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

pub fn partition(rows: &[FileRow]) -> Result<Partitions, MycoError> {
    let organisms = distinct_organisms(rows);
    let (missing_set, _) = split_missing(rows);
    let phylogeny = project_phylogeny(rows);

    let missing: Vec<PhylogenyRow> = phylogeny
        .iter()
        .filter(|row| missing_set.contains(row.organism.as_str()))
        .cloned()
        .collect();

    let complete: Vec<PhylogenyRow> = phylogeny
        .iter()
        .filter(|row| row.has_taxon_id() && !missing_set.contains(row.organism.as_str()))
        .cloned()
        .collect();
    let complete_set: HashSet<&str> = complete.iter().map(|row| row.organism.as_str()).collect();

    let incomplete: Vec<PhylogenyRow> = phylogeny
        .iter()
        .filter(|row| {
            !missing_set.contains(row.organism.as_str())
                && !complete_set.contains(row.organism.as_str())
        })
        .cloned()
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in &complete {
        *counts.entry(row.organism.as_str()).or_default() += 1;
    }
    let (double, single): (Vec<PhylogenyRow>, Vec<PhylogenyRow>) = complete
        .iter()
        .cloned()
        .partition(|row| counts.get(row.organism.as_str()).copied().unwrap_or(0) > 1);

    let partitions = Partitions {
        missing,
        incomplete,
        single,
        double,
    };
    check_partitions(&partitions, organisms.len())?;
    Ok(partitions)
}

/// Fails unless every organism lands in exactly one partition.
pub fn check_partitions(partitions: &Partitions, expected: usize) -> Result<(), MycoError> {
    let mut owner: HashMap<&str, usize> = HashMap::new();
    let groups = [
        &partitions.missing,
        &partitions.incomplete,
        &partitions.single,
        &partitions.double,
    ];
    for (group_idx, group) in groups.iter().enumerate() {
        for row in group.iter() {
            let previous = owner.entry(row.organism.as_str()).or_insert(group_idx);
            if *previous != group_idx {
                return Err(MycoError::PartitionOverlap(row.organism.clone()));
            }
        }
    }
    if owner.len() != expected {
        return Err(MycoError::ReconciliationMismatch {
            expected,
            actual: owner.len(),
        });
    }
    Ok(())
}

pub fn write_partitions(partitions: &Partitions, layout: &Layout) -> Result<(), MycoError> {
    write_csv(&layout.missing_partition_path(), &PHYLOGENY_COLUMNS, &partitions.missing)?;
    write_csv(
        &layout.incomplete_partition_path(),
        &PHYLOGENY_COLUMNS,
        &partitions.incomplete,
    )?;
    write_csv(&layout.single_partition_path(), &PHYLOGENY_COLUMNS, &partitions.single)?;
    write_csv(&layout.double_partition_path(), &PHYLOGENY_COLUMNS, &partitions.double)?;
    Ok(())
}

pub fn summarize(partitions: &Partitions, organisms: usize, layout: &Layout) -> ReconcileResult {
    let unique = |rows: &[PhylogenyRow]| {
        rows.iter()
            .map(|row| row.organism.as_str())
            .collect::<HashSet<_>>()
            .len()
    };
    ReconcileResult {
        organisms,
        missing: unique(&partitions.missing),
        incomplete: unique(&partitions.incomplete),
        single: unique(&partitions.single),
        double: unique(&partitions.double),
        output_dir: layout.portals_dir().to_string(),
    }
}
