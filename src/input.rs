use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CpraRequest, Email};

#[derive(Error, Debug)]
pub enum InputError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid batch input: {0}")]
    Json(#[from] serde_json::Error),
}

/// Batch file handed over by the parsing collaborator: requests plus
/// already-parsed emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInput {
    pub requests: Vec<CpraRequest>,
    pub emails: Vec<Email>,
}

impl SessionInput {
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, InputError> {
        let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}
