//! Append-only JSON Lines logs: the run history and the trigger error log.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::payload::{CommitAuthor, Trigger};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Log serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of a triggered run, as recorded and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

/// One line of `tests.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub result: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub commit_id: String,
    #[serde(default)]
    pub commit_url: Option<String>,
    #[serde(default)]
    pub commit_author: Option<CommitAuthor>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
}

impl HistoryEntry {
    pub fn new(result: Outcome, trigger: &Trigger, stdout: String, exit_code: Option<i32>) -> Self {
        Self {
            time: Utc::now(),
            result,
            id: trigger.id.clone(),
            commit_id: trigger.commit.id.clone(),
            commit_url: trigger.commit.url.clone(),
            commit_author: trigger.commit.author.clone(),
            commit_message: trigger.commit.message.clone(),
            exit_code,
            stdout,
        }
    }
}

/// One line of `error.log`: a trigger that failed before a result existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub time: DateTime<Utc>,
    pub error: String,
    /// The request body, as JSON when it parses, otherwise as a string.
    pub payload: serde_json::Value,
}

impl ErrorEntry {
    pub fn new(error: impl Into<String>, body: &[u8]) -> Self {
        let payload = serde_json::from_slice(body)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()));
        Self {
            time: Utc::now(),
            error: error.into(),
            payload,
        }
    }
}

/// A file of newline-delimited JSON records, appended one record at a time.
#[derive(Debug)]
pub struct JsonLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as a single line.
    pub async fn append<T: Serialize>(&self, record: &T) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every record in file order.
    ///
    /// A missing file is an empty log. Lines that do not parse are skipped.
    pub async fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, LogError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        log = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping malformed log line"
                    );
                }
            }
        }
        Ok(records)
    }
}
