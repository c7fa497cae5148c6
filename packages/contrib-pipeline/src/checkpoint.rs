//! Checkpoint journal
//!
//! Append-only JSON-lines file of [`NormalizedItem`]s. Written by the FIRST
//! chain, replayed by the RESUME chain.

use crate::error::{PipelineError, Result};
use crate::model::NormalizedItem;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CheckpointJournal {
    path: PathBuf,
}

impl CheckpointJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Drop every recorded line, creating the file if needed.
    pub async fn truncate(&self) -> Result<()> {
        ensure_parent(&self.path).await?;
        File::create(&self.path).await?;
        info!("Checkpoint journal truncated: {}", self.path.display());
        Ok(())
    }

    pub async fn open_writer(&self) -> Result<JournalWriter> {
        ensure_parent(&self.path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(JournalWriter { file, written: 0 })
    }

    /// Open the journal for sequential replay. Fails if the file is missing.
    pub async fn open_reader(&self) -> Result<JournalReader> {
        let file = File::open(&self.path).await?;
        Ok(JournalReader {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            skipped: 0,
        })
    }

    /// Read the whole journal, skipping malformed lines.
    pub async fn read_all(&self) -> Result<Vec<NormalizedItem>> {
        let mut reader = self.open_reader().await?;
        let mut items = Vec::new();
        while let Some(item) = reader.next_record().await? {
            items.push(item);
        }
        Ok(items)
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

pub struct JournalWriter {
    file: File,
    written: usize,
}

impl JournalWriter {
    /// Append one record; it is on disk when this returns.
    pub async fn append(&mut self, item: &NormalizedItem) -> Result<()> {
        let mut line = serde_json::to_string(item).map_err(PipelineError::serialization)?;
        line.push('\n');

        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

pub struct JournalReader {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    skipped: usize,
}

impl JournalReader {
    /// Next well-formed record, or `None` at end of file.
    pub async fn next_record(&mut self) -> Result<Option<NormalizedItem>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<NormalizedItem>(&line) {
                Ok(item) => return Ok(Some(item)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        "Could not parse checkpoint line {} {:?}: {}",
                        self.line_no, line, e
                    );
                }
            }
        }
        Ok(None)
    }

    /// Number of malformed lines dropped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
