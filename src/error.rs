//! Error types for dendrostyle

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between reading the lookup table and
/// launching Dendroscope.
#[derive(Error, Debug)]
pub enum Error {
    /// An intermediate year has no base colour. The palette only covers
    /// years 2 through 6, so the cohort needs operator attention.
    #[error(
        "no base colour for year {year} of infection (patient {patient}, visit {visit_code}, {wpi} WPI); supported years are 2-6"
    )]
    UnsupportedYear {
        patient: String,
        visit_code: u32,
        wpi: u32,
        year: u32,
    },

    /// A leaf name whose WPI field cannot be read
    #[error("malformed leaf name '{leaf}': {reason}")]
    MalformedLeafName { leaf: String, reason: String },

    /// A tree names a patient that is not in the lookup table
    #[error("patient {patient} (from {}) is not in the lookup table", tree.display())]
    MissingVisitData { patient: String, tree: PathBuf },

    /// The same visit code appears twice for one patient
    #[error("duplicate visit code {visit_code} for patient {patient}")]
    DuplicateVisit { patient: String, visit_code: u32 },

    /// Newick text that could not be tokenised
    #[error("invalid Newick tree: {reason}")]
    Newick { reason: String },

    /// A generated selector is not a valid regular expression
    #[error("invalid selector '{selector}': {source}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: regex::Error,
    },

    /// Dendroscope exited unsuccessfully
    #[error("'{command}' exited with {status}")]
    Render {
        command: String,
        status: std::process::ExitStatus,
    },

    /// Config file could not be parsed
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Context for any failure scoped to a single tree
    #[error("{}: {source}", tree.display())]
    Tree {
        tree: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach the tree file this error was raised for
    pub fn in_tree(self, tree: impl Into<PathBuf>) -> Self {
        match self {
            // Already scoped
            Error::Tree { .. } | Error::MissingVisitData { .. } => self,
            other => Error::Tree {
                tree: tree.into(),
                source: Box::new(other),
            },
        }
    }

    /// True for the errors that skip a tree rather than fail it
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::MissingVisitData { .. })
    }
}
