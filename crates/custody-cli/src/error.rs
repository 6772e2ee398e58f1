use std::path::PathBuf;

use custody_core::CustodyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("fund error: {0}")]
    Fund(#[from] CustodyError),

    #[error("cannot read script {path}: {source}")]
    ScriptIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid script: {0}")]
    ScriptParse(#[from] serde_json::Error),

    #[error("step {step} failed: {source}")]
    StepFailed { step: usize, source: CustodyError },
}

pub type CliResult<T> = Result<T, CliError>;
