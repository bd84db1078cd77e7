use std::io::Write;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use zip::write::SimpleFileOptions;

use mycocosm_etl::error::MycoError;
use mycocosm_etl::extract::{ExtractOutcome, extract_manifest, extract_zip, find_missing_archives};
use mycocosm_etl::manifest::{Manifest, ManifestEntry};

const PROTEOME: &str = ">jgi|Aspni7|1|m1\nMKVLAAGIVG\n";

fn dirs() -> (tempfile::TempDir, Utf8PathBuf, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let compressed = root.join("compressed");
    let extracted = root.join("extracted");
    std::fs::create_dir_all(compressed.as_std_path()).unwrap();
    (temp, compressed, extracted)
}

fn write_gz(dir: &Utf8Path, name: &str, content: &str) {
    let file = std::fs::File::create(dir.join(name).as_std_path()).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn write_zip(dir: &Utf8Path, name: &str, members: &[(&str, &str)]) {
    let file = std::fs::File::create(dir.join(name).as_std_path()).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (member, content) in members {
        writer
            .start_file(*member, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn gzip_member_is_written_without_suffix() {
    let (_temp, compressed, extracted) = dirs();
    write_gz(&compressed, "Aspni7_proteins.fasta.gz", PROTEOME);
    let mut manifest =
        Manifest::from_entries(vec![ManifestEntry::new("Aspni7", Some("Aspni7_proteins.fasta.gz"))]);

    let results = extract_manifest(&mut manifest, &compressed, &extracted).unwrap();
    let target = extracted.join("Aspni7_proteins.fasta");
    assert_eq!(results[0].outcome, ExtractOutcome::Extracted { path: target.clone() });
    assert_eq!(manifest.entries[0].extracted_file.as_ref(), Some(&target));
    assert_eq!(std::fs::read_to_string(target.as_std_path()).unwrap(), PROTEOME);
}

#[test]
fn zip_is_unpacked_into_the_directory() {
    let (_temp, compressed, extracted) = dirs();
    write_zip(
        &compressed,
        "Pyrtr1.zip",
        &[("Pyrtr1.fasta", PROTEOME), ("notes/readme.txt", "hello")],
    );
    let mut manifest = Manifest::from_entries(vec![ManifestEntry::new("Pyrtr1", Some("Pyrtr1.zip"))]);

    extract_manifest(&mut manifest, &compressed, &extracted).unwrap();
    assert_eq!(manifest.entries[0].extracted_file.as_ref(), Some(&extracted));
    assert!(extracted.join("Pyrtr1.fasta").as_std_path().is_file());
    assert!(extracted.join("notes/readme.txt").as_std_path().is_file());
}

#[test]
fn escaping_zip_member_is_refused_by_name() {
    let (_temp, compressed, extracted) = dirs();
    write_zip(&compressed, "Evil1.zip", &[("../evil.fasta", PROTEOME)]);

    let err = extract_zip(&compressed.join("Evil1.zip"), &extracted).unwrap_err();
    assert_matches!(&err, MycoError::Filesystem(message) if message.contains("../evil.fasta"));
    assert!(!extracted.parent().unwrap().join("evil.fasta").as_std_path().exists());
}

#[test]
fn unknown_and_absent_archive_types_are_recorded_not_fatal() {
    let (_temp, compressed, extracted) = dirs();
    std::fs::write(compressed.join("Altbr1.tar").as_std_path(), b"tar").unwrap();
    std::fs::write(compressed.join("Bad1.fasta.gz").as_std_path(), b"not gzip").unwrap();
    let mut manifest = Manifest::from_entries(vec![
        ManifestEntry::new("Altbr1", Some("Altbr1.tar")),
        ManifestEntry::new("Nofile1", None),
        ManifestEntry::new("Bad1", Some("Bad1.fasta.gz")),
    ]);

    let results = extract_manifest(&mut manifest, &compressed, &extracted).unwrap();
    assert_eq!(results[0].outcome, ExtractOutcome::Unsupported);
    assert_eq!(results[1].outcome, ExtractOutcome::NoArchive);
    assert_matches!(results[2].outcome, ExtractOutcome::Failed { .. });
    assert!(manifest.entries.iter().all(|entry| entry.extracted_file.is_none()));
}

#[test]
fn missing_archives_abort_before_any_extraction() {
    let (_temp, compressed, extracted) = dirs();
    write_gz(&compressed, "present.fasta.gz", PROTEOME);
    let mut manifest = Manifest::from_entries(vec![
        ManifestEntry::new("Aspni7", Some("present.fasta.gz")),
        ManifestEntry::new("Gone1", Some("gone.fasta.gz")),
        ManifestEntry::new("Gone2", Some("gone.fasta.gz")),
        ManifestEntry::new("Lost1", Some("lost.zip")),
    ]);

    assert_eq!(
        find_missing_archives(&manifest, &compressed).unwrap(),
        vec!["gone.fasta.gz", "lost.zip"]
    );
    let err = extract_manifest(&mut manifest, &compressed, &extracted).unwrap_err();
    assert_matches!(&err, MycoError::MissingArchives(names) if names.len() == 2);
    assert!(err.to_string().contains("gone.fasta.gz"));
    assert!(!extracted.as_std_path().exists());
    assert!(manifest.entries[0].extracted_file.is_none());
}

#[test]
fn manifest_round_trip_keeps_unknown_columns() {
    let (_temp, compressed, _) = dirs();
    let input = compressed.join("selected.csv");
    std::fs::write(
        input.as_std_path(),
        "species,portal,compressed_file\nAspergillus niger,Aspni7,a.fasta.gz\n",
    )
    .unwrap();

    let mut manifest = Manifest::read(&input).unwrap();
    manifest.entries[0].extracted_file = Some(Utf8PathBuf::from("x/a.fasta"));
    let output = compressed.join("processed.csv");
    manifest.write(&output).unwrap();

    let written = std::fs::read_to_string(output.as_std_path()).unwrap();
    assert_eq!(
        written,
        "species,portal,compressed_file,extracted_file,renamed_file\n\
         Aspergillus niger,Aspni7,a.fasta.gz,x/a.fasta,\n"
    );
}
