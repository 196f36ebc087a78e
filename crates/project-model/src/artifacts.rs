//! Debug artifacts.
//!
//! Intermediate results of the caption path are dumped as JSON next to the
//! material so a failing line or character index can be traced back to its
//! inputs. None of these files are read back by the pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::project::ProjectError;

/// Which intermediate result an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    NormalizedScript,
    AsrTokens,
    Timeline,
    CandidateLines,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::NormalizedScript => "_debug_normalized.json",
            ArtifactKind::AsrTokens => "_debug_asr_tokens.json",
            ArtifactKind::Timeline => "_debug_timeline.json",
            ArtifactKind::CandidateLines => "_debug_candidate_lines.json",
        }
    }
}

/// Envelope written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugArtifact<T> {
    pub generated_at: DateTime<Utc>,
    pub payload: T,
}

/// Write one artifact into `dir`, returning its path.
pub fn write_artifact<T: Serialize>(
    dir: &Path,
    kind: ArtifactKind,
    payload: &T,
) -> Result<PathBuf, ProjectError> {
    let path = dir.join(kind.file_name());
    let envelope = DebugArtifact {
        generated_at: Utc::now(),
        payload,
    };
    let json = serde_json::to_string_pretty(&envelope).map_err(|e| ProjectError::ParseError {
        path: path.clone(),
        source: e,
    })?;
    std::fs::write(&path, json).map_err(|e| ProjectError::IoError {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Read an artifact back (used by tooling and tests).
pub fn read_artifact<T: DeserializeOwned>(
    dir: &Path,
    kind: ArtifactKind,
) -> Result<DebugArtifact<T>, ProjectError> {
    let path = dir.join(kind.file_name());
    let json = std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError {
        path: path.clone(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| ProjectError::ParseError { path, source: e })
}
