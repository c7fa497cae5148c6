//! Output CSV: `name;createdAt;count` per line, no header, append-only.

use crate::error::Result;
use crate::model::ResultRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const NO_RESULTS_MESSAGE: &str = "no results yet";

/// What the control surface returns for a results query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Results {
    Records(Vec<ResultRecord>),
    Empty { message: String },
}

impl Results {
    pub fn empty() -> Self {
        Results::Empty {
            message: NO_RESULTS_MESSAGE.to_string(),
        }
    }

    pub fn records(&self) -> &[ResultRecord] {
        match self {
            Results::Records(records) => records,
            Results::Empty { .. } => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn open_appender(&self) -> Result<ResultAppender> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(ResultAppender { file, written: 0 })
    }

    /// Everything durably written so far. A missing or empty file yields
    /// [`Results::Empty`].
    pub async fn read(&self) -> Result<Results> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Results::empty()),
            Err(e) => return Err(e.into()),
        };

        let records: Vec<ResultRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let record = ResultRecord::from_csv_line(line);
                if record.is_none() {
                    warn!("Skipping malformed result line {:?}", line);
                }
                record
            })
            .collect();

        if records.is_empty() {
            return Ok(Results::empty());
        }
        Ok(Results::Records(records))
    }
}

pub struct ResultAppender {
    file: File,
    written: usize,
}

impl ResultAppender {
    /// One durable write per record.
    pub async fn append(&mut self, record: &ResultRecord) -> Result<()> {
        self.file.write_all(record.to_csv_line().as_bytes()).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}
