use std::fs::File;
use std::io::{self, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::RunfolderName;
use crate::error::CleanerError;
use crate::manager::{FolderOutcome, FolderRecord, RunSummary, SkippedFolder};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let json = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for record in &summary.records {
            writeln!(stdout, "{}", outcome_line(record))?;
        }
        let names = |list: Vec<&RunfolderName>| {
            list.iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        if summary.dry_run {
            writeln!(stdout, "would delete: [{}]", names(summary.would_delete()))?;
        } else {
            writeln!(stdout, "deleted: [{}]", names(summary.deleted()))?;
        }
        Ok(())
    }
}

pub fn outcome_line(record: &FolderRecord) -> String {
    let name = record.report.runfolder();
    match &record.outcome {
        FolderOutcome::Deleted => format!("{name}\tdeleted"),
        FolderOutcome::DryRun => format!("{name}\teligible (dry run, not deleted)"),
        FolderOutcome::Ineligible { reasons } => {
            format!("{name}\tineligible: {}", reasons.join("; "))
        }
        FolderOutcome::Errored { error } => format!("{name}\terror: {error}"),
    }
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum RunLogRecord<'a> {
    Folder(&'a FolderRecord),
    Summary {
        timestamp: &'a str,
        root: &'a Utf8Path,
        dry_run: bool,
        evaluated: usize,
        deleted: Vec<&'a RunfolderName>,
        would_delete: Vec<&'a RunfolderName>,
        skipped: &'a [SkippedFolder],
    },
}

pub struct RunLog {
    path: Utf8PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    pub fn create(path: Utf8PathBuf) -> Result<Self, CleanerError> {
        let file = File::create(path.as_std_path())
            .map_err(|err| CleanerError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn write_summary(&mut self, summary: &RunSummary, timestamp: &str) -> Result<(), CleanerError> {
        for record in &summary.records {
            self.write_line(&RunLogRecord::Folder(record))?;
        }
        self.write_line(&RunLogRecord::Summary {
            timestamp,
            root: &summary.root,
            dry_run: summary.dry_run,
            evaluated: summary.records.len(),
            deleted: summary.deleted(),
            would_delete: summary.would_delete(),
            skipped: &summary.skipped,
        })?;
        self.writer
            .flush()
            .map_err(|err| CleanerError::Filesystem(format!("write {}: {err}", self.path)))
    }

    fn write_line(&mut self, record: &RunLogRecord<'_>) -> Result<(), CleanerError> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|err| CleanerError::Filesystem(format!("write {}: {err}", self.path)))?;
        self.writer
            .write_all(b"\n")
            .map_err(|err| CleanerError::Filesystem(format!("write {}: {err}", self.path)))
    }
}
