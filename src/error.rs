use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Coarse grouping used to decide whether a stage logs and continues or
/// aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Network,
    Parse,
    Filesystem,
    Config,
    Fatal,
}

#[derive(Debug, Error, Diagnostic)]
pub enum MycoError {
    #[error("invalid organism id: {0:?}")]
    InvalidOrganismId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JGI_API_TOKEN is not set")]
    #[diagnostic(help("export JGI_API_TOKEN with the bearer token for files.jgi.doe.gov"))]
    MissingToken,

    #[error("request failed: {0}")]
    Http(String),

    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("malformed HTML: {0}")]
    Html(String),

    #[error("no <table> found on {0}")]
    TableNotFound(String),

    #[error("table has no {0:?} column")]
    MissingColumn(String),

    #[error("portal {0:?} appears in more than one table row")]
    DuplicatePortal(String),

    #[error("malformed FASTA in {path}: {message}")]
    Fasta { path: PathBuf, message: String },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("missing compressed files: {}", .0.join(", "))]
    #[diagnostic(help("place every compressed_file listed in the manifest in the compressed proteomes directory"))]
    MissingArchives(Vec<String>),

    #[error("organism count mismatch: {expected} distinct organisms, {actual} after partitioning")]
    ReconciliationMismatch { expected: usize, actual: usize },

    #[error("organism {0:?} falls into more than one partition")]
    PartitionOverlap(String),

    #[error("no FASTA files found in {0}")]
    NoFastaFiles(PathBuf),
}

impl MycoError {
    pub fn class(&self) -> FailureClass {
        match self {
            MycoError::Http(_) | MycoError::Status { .. } => FailureClass::Network,
            MycoError::Json(_)
            | MycoError::Html(_)
            | MycoError::TableNotFound(_)
            | MycoError::MissingColumn(_)
            | MycoError::DuplicatePortal(_)
            | MycoError::Fasta { .. }
            | MycoError::Csv(_) => FailureClass::Parse,
            MycoError::Filesystem(_) | MycoError::DirectoryNotFound(_) => {
                FailureClass::Filesystem
            }
            MycoError::InvalidOrganismId(_)
            | MycoError::ConfigRead(_)
            | MycoError::ConfigParse(_)
            | MycoError::InvalidConfig(_)
            | MycoError::MissingToken => FailureClass::Config,
            MycoError::MissingArchives(_)
            | MycoError::ReconciliationMismatch { .. }
            | MycoError::PartitionOverlap(_)
            | MycoError::NoFastaFiles(_) => FailureClass::Fatal,
        }
    }
}

impl From<csv::Error> for MycoError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => MycoError::Filesystem(err.to_string()),
            _ => MycoError::Csv(err.to_string()),
        }
    }
}
