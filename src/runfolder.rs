use std::fs;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::EvaluationPolicy;
use crate::domain::RunfolderName;
use crate::error::CleanerError;

const SECONDS_PER_DAY: u64 = 24 * 3600;
const MAX_REPORTED_ERROR_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalFastq {
    pub relative_path: String,
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarkerLog {
    Missing,
    Present { token_found: bool },
    Unreadable { error: String },
}

impl MarkerLog {
    pub fn exists(&self) -> bool {
        !matches!(self, MarkerLog::Missing)
    }

    pub fn token_found(&self) -> bool {
        matches!(self, MarkerLog::Present { token_found: true })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadLogScan {
    Missing { path: Utf8PathBuf },
    Clean { path: Utf8PathBuf },
    ErrorsFound { path: Utf8PathBuf, lines: Vec<String> },
    Unreadable { path: Utf8PathBuf, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Runfolder {
    pub name: RunfolderName,
    pub path: Utf8PathBuf,
    pub age_days: u64,
    pub local_fastqs: Vec<LocalFastq>,
    pub panel_marker: MarkerLog,
    pub upload_log: UploadLogScan,
}

impl Runfolder {
    pub fn scan(
        name: RunfolderName,
        path: &Utf8Path,
        now: SystemTime,
        policy: &EvaluationPolicy,
    ) -> Result<Self, CleanerError> {
        let age_days = age_in_days(path, now)?;
        let local_fastqs = find_fastqs(path, &policy.fastq_pattern)?;
        debug!(
            runfolder = %name,
            age_days,
            fastqs = local_fastqs.len(),
            "scanned runfolder"
        );
        let panel_marker = read_marker_log(
            &path.join(&policy.panel.marker_logfile),
            &policy.panel.marker_token,
        );
        let upload_log = scan_upload_log(
            &policy.upload_log_path(name.as_str()),
            &policy.error_markers,
        );

        Ok(Self {
            name,
            path: path.to_path_buf(),
            age_days,
            local_fastqs,
            panel_marker,
            upload_log,
        })
    }
}

// A future mtime counts as zero days.
pub fn age_in_days(path: &Utf8Path, now: SystemTime) -> Result<u64, CleanerError> {
    let modified = fs::metadata(path.as_std_path())
        .and_then(|meta| meta.modified())
        .map_err(|err| CleanerError::Filesystem(format!("stat {path}: {err}")))?;
    let elapsed = now.duration_since(modified).unwrap_or(Duration::ZERO);
    Ok(elapsed.as_secs() / SECONDS_PER_DAY)
}

pub fn find_fastqs(path: &Utf8Path, pattern: &Regex) -> Result<Vec<LocalFastq>, CleanerError> {
    let mut fastqs = Vec::new();
    for entry in WalkDir::new(path.as_std_path()).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|err| CleanerError::Filesystem(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        if !pattern.is_match(file_name) {
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|err| CleanerError::Filesystem(err.to_string()))?
            .len();
        let relative_path = entry
            .path()
            .strip_prefix(path.as_std_path())
            .map(|rel| rel.to_string_lossy().into_owned())
            .unwrap_or_else(|_| file_name.to_string());
        fastqs.push(LocalFastq {
            relative_path,
            file_name: file_name.to_string(),
            size,
        });
    }
    fastqs.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(fastqs)
}

pub fn read_marker_log(path: &Utf8Path, token: &str) -> MarkerLog {
    if !path.as_std_path().is_file() {
        return MarkerLog::Missing;
    }
    match fs::read(path.as_std_path()) {
        Ok(bytes) => MarkerLog::Present {
            token_found: String::from_utf8_lossy(&bytes).contains(token),
        },
        Err(err) => MarkerLog::Unreadable {
            error: err.to_string(),
        },
    }
}

pub fn scan_upload_log(path: &Utf8Path, markers: &[Regex]) -> UploadLogScan {
    let path_buf = path.to_path_buf();
    if !path.as_std_path().is_file() {
        return UploadLogScan::Missing { path: path_buf };
    }
    let bytes = match fs::read(path.as_std_path()) {
        Ok(bytes) => bytes,
        Err(err) => {
            return UploadLogScan::Unreadable {
                path: path_buf,
                error: err.to_string(),
            };
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines = text
        .lines()
        .filter(|line| markers.iter().any(|marker| marker.is_match(line)))
        .map(|line| line.trim().to_string())
        .collect::<Vec<_>>();
    if lines.is_empty() {
        UploadLogScan::Clean { path: path_buf }
    } else {
        UploadLogScan::ErrorsFound {
            path: path_buf,
            lines: lines.into_iter().take(MAX_REPORTED_ERROR_LINES).collect(),
        }
    }
}
