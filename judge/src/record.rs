//! Completion records for accepted submissions.
//!
//! The judge itself persists nothing; callers append a record after an
//! `Accepted` verdict.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// One accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub problem_id: String,
    pub user: Option<String>,
    /// SHA-256 of the submitted code, hex encoded.
    pub code_sha256: String,
    /// RFC 3339 UTC timestamp.
    pub completed_at: String,
}

impl CompletionRecord {
    pub fn new(
        problem_id: &str,
        user: Option<&str>,
        code: &[u8],
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            problem_id: problem_id.to_string(),
            user: user.map(str::to_string),
            code_sha256: hex::encode(Sha256::digest(code)),
            completed_at: completed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Persistence collaborator notified of completions.
pub trait CompletionRecorder {
    fn record(&self, record: &CompletionRecord) -> Result<()>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlRecorder {
    path: PathBuf,
}

impl JsonlRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompletionRecorder for JsonlRecorder {
    #[instrument(skip_all, fields(path = %self.path.display(), problem_id = %record.problem_id))]
    fn record(&self, record: &CompletionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record).context("serialize completion record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", self.path.display()))?;
        debug!("completion recorded");
        Ok(())
    }
}
