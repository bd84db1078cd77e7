use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use mycocosm_etl::config::PortalRule;
use mycocosm_etl::fasta::read_fasta;
use mycocosm_etl::manifest::{Manifest, ManifestEntry};
use mycocosm_etl::rename::{ERROR_MARKER, MISSING_MARKER, RenameOutcome, rename_custom, rename_manifest};

fn root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

fn write(path: &Utf8Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
    std::fs::write(path.as_std_path(), content).unwrap();
}

fn altbr_rule() -> PortalRule {
    PortalRule {
        portal: "Altbr1".to_string(),
        pattern: Regex::new(r"^AB0*(\d+)\.\d+").unwrap(),
    }
}

#[test]
fn jgi_headers_are_normalised_and_others_kept() {
    let (_temp, root) = root();
    let input = root.join("extracted/Aspni7_proteins.fasta");
    write(
        &input,
        ">jgi|Aspni7|1001|fgenesh1_pg.1 some description\nMKVLAAGIVG\n\
         >plain_id kept as is\nMSTNPKPQRK\n\
         >jgi|Aspni7|1002|e_gw1.1.2\nMAAA\n",
    );
    let renamed_dir = root.join("renamed");
    let mut manifest = Manifest::from_entries(vec![ManifestEntry::new(
        "Aspni7",
        Some("Aspni7_proteins.fasta.gz"),
    )
    .with_extracted_file(input)]);

    let outcomes = rename_manifest(&mut manifest, &renamed_dir);
    let output = renamed_dir.join("Aspni7.fasta");
    assert_matches!(
        &outcomes[0],
        RenameOutcome::Renamed { file, stats, .. }
            if file == "Aspni7_proteins.fasta" && stats.total == 3 && stats.renamed == 2
    );
    assert_eq!(manifest.entries[0].renamed_file.as_ref(), Some(&output));

    let records = read_fasta(&output).unwrap();
    let headers: Vec<&str> = records.iter().map(|record| record.header.as_str()).collect();
    assert_eq!(headers, vec!["Aspni7-1001", "plain_id kept as is", "Aspni7-1002"]);
    assert_eq!(records[1].sequence, b"MSTNPKPQRK");

    let log = outcomes[0].log_entry();
    assert_eq!(log.first_id_before, "jgi|Aspni7|1001|fgenesh1_pg.1");
    assert_eq!(log.first_id_after, "Aspni7-1001");
}

#[test]
fn missing_input_is_logged_and_not_recorded() {
    let (_temp, root) = root();
    let renamed_dir = root.join("renamed");
    let mut manifest = Manifest::from_entries(vec![
        ManifestEntry::new("Noext1", Some("Noext1.tar")),
        ManifestEntry::new("Gone1", Some("gone.fasta.gz"))
            .with_extracted_file(root.join("extracted/gone.fasta")),
    ]);

    let outcomes = rename_manifest(&mut manifest, &renamed_dir);
    assert_eq!(outcomes[0], RenameOutcome::Missing { file: None });
    assert_eq!(
        outcomes[1],
        RenameOutcome::Missing {
            file: Some("gone.fasta".to_string())
        }
    );
    assert!(manifest.entries.iter().all(|entry| entry.renamed_file.is_none()));

    let log = outcomes[0].log_entry();
    assert_eq!(log.file, MISSING_MARKER);
    assert_eq!(log.total_sequences, 0);
    assert_eq!(log.first_id_before, MISSING_MARKER);
}

#[test]
fn custom_rule_rewrites_only_its_portal_in_place() {
    let (_temp, root) = root();
    let renamed_dir = root.join("renamed");
    let altbr = renamed_dir.join("Altbr1.fasta");
    let aspni = renamed_dir.join("Aspni7.fasta");
    write(&altbr, ">AB000123.1 hypothetical\nMKVL\n>XYZ_9\nMKVL\n");
    write(&aspni, ">AB000123.1\nMKVL\n");

    let mut manifest = Manifest::from_entries(vec![
        ManifestEntry::new("Altbr1", Some("Altbr1.fasta.gz")).with_renamed_file(altbr.clone()),
        ManifestEntry::new("Aspni7", Some("Aspni7.fasta.gz")).with_renamed_file(aspni.clone()),
    ]);

    let results = rename_custom(&mut manifest, &[altbr_rule()], &renamed_dir);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].portal, "Altbr1");
    assert_matches!(
        &results[0].outcome,
        RenameOutcome::Renamed { stats, .. } if stats.renamed == 1 && stats.total == 2
    );

    let records = read_fasta(&altbr).unwrap();
    assert_eq!(records[0].header, "Altbr1-123");
    assert_eq!(records[1].header, "XYZ_9");
    let untouched = read_fasta(&aspni).unwrap();
    assert_eq!(untouched[0].header, "AB000123.1");
    assert_eq!(manifest.entries[0].renamed_file.as_ref(), Some(&altbr));
    assert_eq!(manifest.entries[1].renamed_file.as_ref(), Some(&aspni));
}

#[test]
fn failed_custom_rewrite_clears_renamed_file() {
    let (_temp, root) = root();
    let renamed_dir = root.join("renamed");
    let altbr = renamed_dir.join("Altbr1.fasta");
    write(&altbr, "this is not FASTA\n");
    let mut manifest = Manifest::from_entries(vec![
        ManifestEntry::new("Altbr1", Some("Altbr1.fasta.gz")).with_renamed_file(altbr),
    ]);

    let results = rename_custom(&mut manifest, &[altbr_rule()], &renamed_dir);
    assert_matches!(&results[0].outcome, RenameOutcome::Failed { file, .. } if file == "Altbr1.fasta");
    assert_eq!(results[0].outcome.log_entry().first_id_before, ERROR_MARKER);
    assert!(manifest.entries[0].renamed_file.is_none());
}

#[test]
fn custom_rule_reports_absent_file() {
    let (_temp, root) = root();
    let mut manifest = Manifest::from_entries(vec![ManifestEntry::new("Altbr1", None)]);
    let results = rename_custom(&mut manifest, &[altbr_rule()], &root.join("renamed"));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, RenameOutcome::Missing { file: None });
}

#[test]
fn leading_blank_line_does_not_fail_the_rewrite() {
    let (_temp, root) = root();
    let input = root.join("extracted/Aspni7_proteins.fasta");
    write(&input, "\n>jgi|Aspni7|1001|m1\nMKVL\n");
    let renamed_dir = root.join("renamed");
    let mut manifest = Manifest::from_entries(vec![
        ManifestEntry::new("Aspni7", Some("Aspni7_proteins.fasta.gz")).with_extracted_file(input),
    ]);

    let outcomes = rename_manifest(&mut manifest, &renamed_dir);
    assert_matches!(&outcomes[0], RenameOutcome::Renamed { stats, .. } if stats.renamed == 1);
    let records = read_fasta(&renamed_dir.join("Aspni7.fasta")).unwrap();
    assert_eq!(records[0].header, "Aspni7-1001");
}
