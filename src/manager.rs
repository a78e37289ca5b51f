use std::fs;
use std::io;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::config::CleanerSettings;
use crate::domain::RunfolderName;
use crate::eligibility::{EligibilityReport, RemoteFacts, evaluate};
use crate::error::CleanerError;
use crate::remote::RemoteQuery;
use crate::runfolder::{Runfolder, age_in_days};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FolderOutcome {
    Deleted,
    DryRun,
    Ineligible { reasons: Vec<String> },
    Errored { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderRecord {
    pub report: EligibilityReport,
    pub outcome: FolderOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NotRunfolder,
    NonUtf8Name,
    SequencingIncomplete,
    TooYoung { age_days: u64, min_age_days: u64 },
    Unreadable { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFolder {
    pub name: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: RunfolderName,
    pub path: Utf8PathBuf,
    pub age_days: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedFolder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root: Utf8PathBuf,
    pub dry_run: bool,
    pub records: Vec<FolderRecord>,
    pub skipped: Vec<SkippedFolder>,
}

impl RunSummary {
    pub fn reports(&self) -> impl Iterator<Item = &EligibilityReport> {
        self.records.iter().map(|record| &record.report)
    }

    pub fn with_outcome<'a>(
        &'a self,
        matches: fn(&FolderOutcome) -> bool,
    ) -> impl Iterator<Item = &'a RunfolderName> + 'a {
        self.records
            .iter()
            .filter(move |record| matches(&record.outcome))
            .map(|record| record.report.runfolder())
    }

    pub fn deleted(&self) -> Vec<&RunfolderName> {
        self.with_outcome(|outcome| matches!(outcome, FolderOutcome::Deleted))
            .collect()
    }

    pub fn would_delete(&self) -> Vec<&RunfolderName> {
        self.with_outcome(|outcome| matches!(outcome, FolderOutcome::DryRun))
            .collect()
    }
}

pub struct RunFolderManager<Q: RemoteQuery> {
    root: Utf8PathBuf,
    remote: Q,
    settings: CleanerSettings,
    dry_run: bool,
    now: SystemTime,
}

impl<Q: RemoteQuery> RunFolderManager<Q> {
    pub fn new(
        root: &Utf8Path,
        remote: Q,
        settings: CleanerSettings,
        dry_run: bool,
    ) -> Result<Self, CleanerError> {
        if !root.as_std_path().is_dir() {
            error!(root = %root, "runfolder root does not exist");
            return Err(CleanerError::InvalidRoot(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            remote,
            settings,
            dry_run,
            now: SystemTime::now(),
        })
    }

    pub fn with_clock(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    pub fn remote(&self) -> &Q {
        &self.remote
    }

    pub fn discover(&self) -> Result<Discovery, CleanerError> {
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| CleanerError::Filesystem(format!("read {}: {err}", self.root)))?;

        let mut discovery = Discovery::default();
        for entry in entries {
            let name = match directory_name(entry) {
                Ok(Some(name)) => name,
                Ok(None) => continue,
                Err(skipped) => {
                    warn!(folder = %skipped.name, reason = ?skipped.reason, "unable to inspect folder");
                    discovery.skipped.push(skipped);
                    continue;
                }
            };
            let name = name.as_str();
            let Ok(runfolder) = name.parse::<RunfolderName>() else {
                discovery.skip(name.to_string(), SkipReason::NotRunfolder);
                continue;
            };
            let path = self.root.join(name);
            let marker = path.join(&self.settings.policy.sequencing_complete_marker);
            if !marker.as_std_path().is_file() {
                discovery.skip(name.to_string(), SkipReason::SequencingIncomplete);
                continue;
            }
            let age_days = match age_in_days(&path, self.now) {
                Ok(age_days) => age_days,
                Err(err) => {
                    warn!(runfolder = name, error = %err, "unable to read runfolder age");
                    discovery.skip(
                        name.to_string(),
                        SkipReason::Unreadable {
                            error: err.to_string(),
                        },
                    );
                    continue;
                }
            };
            if age_days < self.settings.min_age_days {
                discovery.skip(
                    name.to_string(),
                    SkipReason::TooYoung {
                        age_days,
                        min_age_days: self.settings.min_age_days,
                    },
                );
                continue;
            }
            debug!(runfolder = name, age_days, "runfolder is a deletion candidate");
            discovery.candidates.push(Candidate {
                name: runfolder,
                path,
                age_days,
            });
        }

        discovery
            .candidates
            .sort_by(|a, b| a.name.cmp(&b.name));
        discovery.skipped.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(discovery)
    }

    pub fn run(&self) -> Result<RunSummary, CleanerError> {
        self.verify_access()?;
        info!(root = %self.root, dry_run = self.dry_run, "searching for runfolders");
        let Discovery {
            candidates,
            skipped,
        } = self.discover()?;
        info!(
            candidates = candidates.len(),
            skipped = skipped.len(),
            "identified runfolders to consider deleting"
        );

        let workers = self.settings.workers.clamp(1, candidates.len().max(1));
        let queue = Mutex::new(candidates.into_iter());
        let (sender, receiver) = mpsc::channel();
        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = sender.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .next();
                        let Some(candidate) = next else {
                            break;
                        };
                        if sender.send(self.process(candidate)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(sender);

        let mut records = receiver.into_iter().collect::<Vec<_>>();
        records.sort_by(|a, b| a.report.runfolder().cmp(b.report.runfolder()));

        let summary = RunSummary {
            root: self.root.clone(),
            dry_run: self.dry_run,
            records,
            skipped,
        };
        if self.dry_run {
            info!(would_delete = ?summary.would_delete(), "runfolders that would be deleted in this run");
        } else {
            info!(deleted = ?summary.deleted(), "runfolders deleted in this run");
        }
        Ok(summary)
    }

    // 401/403 from the account check is fatal before any folder is touched.
    fn verify_access(&self) -> Result<(), CleanerError> {
        match self.remote.whoami() {
            Ok(account) => {
                info!(account = %account, "authenticated with DNAnexus");
                Ok(())
            }
            Err(CleanerError::RemoteStatus { status, message }) if matches!(status, 401 | 403) => {
                error!(status, "DNAnexus rejected the auth token");
                Err(CleanerError::RejectedCredential { status, message })
            }
            Err(err) => Err(err),
        }
    }

    fn process(&self, candidate: Candidate) -> FolderRecord {
        let span = info_span!("runfolder", name = %candidate.name);
        let _entered = span.enter();
        info!(age_days = candidate.age_days, "processing runfolder");

        let policy = &self.settings.policy;
        let runfolder = match Runfolder::scan(candidate.name.clone(), &candidate.path, self.now, policy) {
            Ok(runfolder) => runfolder,
            Err(err) => {
                error!(error = %err, "local scan failed");
                return FolderRecord {
                    report: EligibilityReport::errored(candidate.name, &err.to_string()),
                    outcome: FolderOutcome::Errored {
                        error: err.to_string(),
                    },
                };
            }
        };
        let facts = RemoteFacts::gather(&runfolder, &self.remote, policy);
        let report = evaluate(&runfolder, &facts, policy);
        log_report(&report);

        let outcome = self.act(&report, &candidate.path);
        FolderRecord { report, outcome }
    }

    fn act(&self, report: &EligibilityReport, path: &Utf8Path) -> FolderOutcome {
        if !report.eligible() {
            let reasons = report
                .failures()
                .map(|result| format!("{}: {}", result.criterion, result.detail))
                .collect::<Vec<_>>();
            warn!(reasons = %reasons.join("; "), "runfolder not eligible for deletion");
            return FolderOutcome::Ineligible { reasons };
        }
        if self.dry_run {
            info!(path = %path, "DRY RUN DELETE");
            return FolderOutcome::DryRun;
        }
        match fs::remove_dir_all(path.as_std_path()) {
            Ok(()) => {
                info!(path = %path, "runfolder deleted");
                FolderOutcome::Deleted
            }
            Err(err) => {
                error!(path = %path, error = %err, "failed to delete runfolder");
                FolderOutcome::Errored {
                    error: format!("delete {path} failed: {err}"),
                }
            }
        }
    }
}

const UNREADABLE_ENTRY: &str = "<unreadable entry>";

fn directory_name(entry: io::Result<fs::DirEntry>) -> Result<Option<String>, SkippedFolder> {
    let entry = entry.map_err(|err| SkippedFolder {
        name: UNREADABLE_ENTRY.to_string(),
        reason: SkipReason::Unreadable {
            error: err.to_string(),
        },
    })?;
    let raw_name = entry.file_name();
    let file_type = entry.file_type().map_err(|err| SkippedFolder {
        name: raw_name.to_string_lossy().into_owned(),
        reason: SkipReason::Unreadable {
            error: err.to_string(),
        },
    })?;
    if !file_type.is_dir() {
        return Ok(None);
    }
    match raw_name.into_string() {
        Ok(name) => Ok(Some(name)),
        Err(raw_name) => Err(SkippedFolder {
            name: raw_name.to_string_lossy().into_owned(),
            reason: SkipReason::NonUtf8Name,
        }),
    }
}

impl Discovery {
    fn skip(&mut self, name: String, reason: SkipReason) {
        debug!(folder = %name, reason = ?reason, "skipping folder");
        self.skipped.push(SkippedFolder { name, reason });
    }
}

fn log_report(report: &EligibilityReport) {
    for result in report.criteria() {
        info!(
            criterion = %result.criterion,
            status = %result.status,
            detail = %result.detail,
            "criterion evaluated"
        );
    }
    info!(
        project = report.project().map(|project| project.id.as_str()).unwrap_or("none"),
        run_type = %report.run_type(),
        eligible = report.eligible(),
        "eligibility decided"
    );
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn failed_entry_is_skipped_not_fatal() {
        let skipped = directory_name(Err(io::Error::other("stale file handle"))).unwrap_err();
        assert_eq!(skipped.name, UNREADABLE_ENTRY);
        assert_matches!(skipped.reason, SkipReason::Unreadable { error } if error.contains("stale file handle"));
    }

    #[test]
    fn directory_entries_yield_names() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("230101_RUN1")).unwrap();
        fs::write(temp.path().join("notes.txt"), b"x").unwrap();

        let mut names = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| directory_name(entry).unwrap())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec![None, Some("230101_RUN1".to_string())]);
    }
}
