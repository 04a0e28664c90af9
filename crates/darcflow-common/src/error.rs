use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DarcError {
    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    #[error("Format violation in {path}, line {line}: {details}")]
    FormatViolation {
        path: PathBuf,
        line: usize,
        details: String,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ExternalToolFailure {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Ran out of ligand identifiers after {exhausted_after} codes")]
    IdentifierExhaustion { exhausted_after: usize },

    #[error("Invalid ligand identifier `{0}`: expected 3 characters from 0-9 and A-Z")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DarcError {
    pub fn format(path: impl Into<PathBuf>, line: usize, details: impl Into<String>) -> Self {
        Self::FormatViolation {
            path: path.into(),
            line,
            details: details.into(),
        }
    }

    /// Fails with `MissingInput` unless `path` exists.
    pub fn require(path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if path.exists() {
            Ok(())
        } else {
            Err(Self::MissingInput(path))
        }
    }
}

pub type Result<T> = std::result::Result<T, DarcError>;
