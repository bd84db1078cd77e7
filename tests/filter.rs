use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use mycocosm_etl::domain::LengthWindow;
use mycocosm_etl::error::MycoError;
use mycocosm_etl::fasta::read_fasta;
use mycocosm_etl::filter::{FilterOutcome, filter_dir};

fn root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

fn fasta_with_lengths(lengths: &[usize]) -> String {
    lengths
        .iter()
        .enumerate()
        .map(|(idx, len)| format!(">seq{idx}\n{}\n", "M".repeat(*len)))
        .collect()
}

#[test]
fn only_sequences_inside_the_window_are_kept() {
    let (_temp, root) = root();
    let input_dir = root.join("renamed");
    let output_dir = root.join("clean");
    std::fs::create_dir_all(input_dir.as_std_path()).unwrap();
    std::fs::write(
        input_dir.join("Aspni7.fasta").as_std_path(),
        fasta_with_lengths(&[10, 50, 5000, 10_000, 10_001]),
    )
    .unwrap();
    std::fs::write(input_dir.join("Empty1.fasta").as_std_path(), "").unwrap();
    std::fs::write(input_dir.join("notes.txt").as_std_path(), "ignored").unwrap();

    let result = filter_dir(&input_dir, &output_dir, LengthWindow::default()).unwrap();
    assert_eq!(result.files.len(), 2);

    assert_eq!(result.files[0].file, "Aspni7.fasta");
    assert_matches!(
        result.files[0].outcome,
        FilterOutcome::Filtered { total: 5, kept: 3, .. }
    );
    let kept = read_fasta(&output_dir.join("Aspni7.fasta")).unwrap();
    let ids: Vec<&str> = kept.iter().map(|record| record.id()).collect();
    assert_eq!(ids, vec!["seq1", "seq2", "seq3"]);

    assert_eq!(result.files[1].file, "Empty1.fasta");
    assert_eq!(result.files[1].outcome, FilterOutcome::Empty);
    assert!(!output_dir.join("Empty1.fasta").as_std_path().exists());
    assert!(!output_dir.join("notes.txt").as_std_path().exists());
}

#[test]
fn wrapped_sequences_are_measured_without_line_breaks() {
    let (_temp, root) = root();
    let input_dir = root.join("renamed");
    let output_dir = root.join("clean");
    std::fs::create_dir_all(input_dir.as_std_path()).unwrap();
    // 25 + 25 residues sits on the lower bound; 24 + 25 would reach it only
    // if the line break were counted.
    let wrapped = format!(
        ">exact\n{}\n{}\n>short\n{}\n{}\n",
        "M".repeat(25),
        "K".repeat(25),
        "M".repeat(24),
        "K".repeat(25)
    );
    std::fs::write(input_dir.join("Wrap1.fasta").as_std_path(), wrapped).unwrap();

    let result = filter_dir(&input_dir, &output_dir, LengthWindow::default()).unwrap();
    assert_matches!(
        result.files[0].outcome,
        FilterOutcome::Filtered { total: 2, kept: 1, .. }
    );
    let kept = read_fasta(&output_dir.join("Wrap1.fasta")).unwrap();
    assert_eq!(kept[0].id(), "exact");
    assert_eq!(kept[0].len(), 50);
}

#[test]
fn blank_and_leading_newline_files() {
    let (_temp, root) = root();
    let input_dir = root.join("renamed");
    let output_dir = root.join("clean");
    std::fs::create_dir_all(input_dir.as_std_path()).unwrap();
    std::fs::write(input_dir.join("Blank1.fasta").as_std_path(), "\n").unwrap();
    std::fs::write(
        input_dir.join("Lead1.fasta").as_std_path(),
        format!("\n>a\n{}\n", "M".repeat(60)),
    )
    .unwrap();

    let result = filter_dir(&input_dir, &output_dir, LengthWindow::default()).unwrap();
    assert_eq!(result.files[0].file, "Blank1.fasta");
    assert_eq!(result.files[0].outcome, FilterOutcome::Empty);
    assert!(!output_dir.join("Blank1.fasta").as_std_path().exists());
    assert_eq!(result.files[1].file, "Lead1.fasta");
    assert_matches!(
        result.files[1].outcome,
        FilterOutcome::Filtered { total: 1, kept: 1, .. }
    );
}

#[test]
fn directory_without_fasta_files_is_fatal() {
    let (_temp, root) = root();
    let input_dir = root.join("renamed");
    std::fs::create_dir_all(input_dir.as_std_path()).unwrap();
    std::fs::write(input_dir.join("readme.md").as_std_path(), "x").unwrap();

    let err = filter_dir(&input_dir, &root.join("clean"), LengthWindow::default()).unwrap_err();
    assert_matches!(err, MycoError::NoFastaFiles(_));
}

#[test]
fn absent_input_directory_is_reported() {
    let (_temp, root) = root();
    let err = filter_dir(&root.join("nope"), &root.join("clean"), LengthWindow::default())
        .unwrap_err();
    assert_matches!(err, MycoError::DirectoryNotFound(_));
}

#[test]
fn filtered_outcome_serializes_its_output_path() {
    let (_temp, root) = root();
    let input_dir = root.join("renamed");
    let output_dir = root.join("clean");
    std::fs::create_dir_all(input_dir.as_std_path()).unwrap();
    std::fs::write(
        input_dir.join("Aspni7.fasta").as_std_path(),
        fasta_with_lengths(&[60]),
    )
    .unwrap();

    let result = filter_dir(&input_dir, &output_dir, LengthWindow::default()).unwrap();
    let value = serde_json::to_value(&result.files[0]).unwrap();
    assert_eq!(value["status"], "filtered");
    assert_eq!(value["file"], "Aspni7.fasta");
    assert_eq!(value["output"], output_dir.join("Aspni7.fasta").as_str());
}
