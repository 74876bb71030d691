//! Durable JSONL log of run reports.

use crate::report::SmokeTestReport;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportLogError {
    #[error("report log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Which call site produced a logged report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Boot,
    OnDemand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportLogEntry {
    pub trigger: RunTrigger,
    pub report: SmokeTestReport,
}

pub struct ReportLog {
    path: PathBuf,
}

impl ReportLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one report as a single line, creating parent directories.
    pub fn append(
        &self,
        trigger: RunTrigger,
        report: &SmokeTestReport,
    ) -> Result<(), ReportLogError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io(source))?;
        let mut writer = BufWriter::new(file);

        // Borrowed view so the report is not cloned per append.
        #[derive(Serialize)]
        struct Line<'a> {
            trigger: RunTrigger,
            report: &'a SmokeTestReport,
        }

        serde_json::to_writer(&mut writer, &Line { trigger, report })?;
        writer.write_all(b"\n").map_err(|source| self.io(source))?;
        writer.flush().map_err(|source| self.io(source))?;
        Ok(())
    }

    /// Reads every entry back, skipping lines that do not parse.
    pub fn read_all(&self) -> Result<Vec<ReportLogEntry>, ReportLogError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io(source)),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| self.io(source))?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn io(&self, source: std::io::Error) -> ReportLogError {
        ReportLogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
