use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::config::{EvaluationPolicy, PanelMarkers};
use crate::domain::{RemoteFile, RemoteProject, RunType, RunfolderName};
use crate::remote::RemoteQuery;
use crate::runfolder::{MarkerLog, Runfolder, UploadLogScan};

const NO_PROJECT: &str = "not evaluated: no project";
const MAX_LISTED_PROBLEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    ProjectResolution,
    FastqUpload,
    LogfileCount,
    UploadLog,
    PanelMarkerLogfile,
    PanelMarkerToken,
    PanelProjectMarker,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Criterion::ProjectResolution,
        Criterion::FastqUpload,
        Criterion::LogfileCount,
        Criterion::UploadLog,
        Criterion::PanelMarkerLogfile,
        Criterion::PanelMarkerToken,
        Criterion::PanelProjectMarker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Criterion::ProjectResolution => "project_resolution",
            Criterion::FastqUpload => "fastq_upload",
            Criterion::LogfileCount => "logfile_count",
            Criterion::UploadLog => "upload_log",
            Criterion::PanelMarkerLogfile => "panel_marker_logfile",
            Criterion::PanelMarkerToken => "panel_marker_token",
            Criterion::PanelProjectMarker => "panel_project_marker",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    Passed,
    Failed,
    NotApplicable,
    NotEvaluated,
}

impl fmt::Display for CriterionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriterionStatus::Passed => write!(f, "passed"),
            CriterionStatus::Failed => write!(f, "failed"),
            CriterionStatus::NotApplicable => write!(f, "not_applicable"),
            CriterionStatus::NotEvaluated => write!(f, "not_evaluated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub status: CriterionStatus,
    pub detail: String,
}

impl CriterionResult {
    fn new(criterion: Criterion, status: CriterionStatus, detail: impl Into<String>) -> Self {
        Self {
            criterion,
            status,
            detail: detail.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CriterionStatus::Passed
    }

    pub fn is_applicable(&self) -> bool {
        self.status != CriterionStatus::NotApplicable
    }
}

// Partial panel evidence selects DisputedPanel: standard checks plus the panel checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    Standard,
    SpecializedPanel,
    DisputedPanel,
}

const STANDARD_RULES: &[Criterion] = &[
    Criterion::ProjectResolution,
    Criterion::FastqUpload,
    Criterion::LogfileCount,
    Criterion::UploadLog,
];

const PANEL_RULES: &[Criterion] = &[
    Criterion::ProjectResolution,
    Criterion::LogfileCount,
    Criterion::UploadLog,
    Criterion::PanelMarkerLogfile,
    Criterion::PanelMarkerToken,
    Criterion::PanelProjectMarker,
];

const DISPUTED_RULES: &[Criterion] = &Criterion::ALL;

impl RuleSet {
    pub fn criteria(self) -> &'static [Criterion] {
        match self {
            RuleSet::Standard => STANDARD_RULES,
            RuleSet::SpecializedPanel => PANEL_RULES,
            RuleSet::DisputedPanel => DISPUTED_RULES,
        }
    }

    pub fn applies(self, criterion: Criterion) -> bool {
        self.criteria().contains(&criterion)
    }

    pub fn run_type(self) -> RunType {
        match self {
            RuleSet::SpecializedPanel => RunType::SpecializedPanel,
            RuleSet::Standard | RuleSet::DisputedPanel => RunType::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelEvidence {
    pub marker_logfile: bool,
    pub marker_token: bool,
    pub project_marker: Option<bool>,
}

impl PanelEvidence {
    pub fn collect(
        runfolder: &Runfolder,
        project: Option<&RemoteProject>,
        markers: &PanelMarkers,
    ) -> Self {
        Self {
            marker_logfile: runfolder.panel_marker.exists(),
            marker_token: runfolder.panel_marker.token_found(),
            project_marker: project.map(|project| project.name.contains(&markers.project_marker)),
        }
    }

    pub fn complete(&self) -> bool {
        self.marker_logfile && self.marker_token && self.project_marker == Some(true)
    }

    // The marker logfile alone is written for every run, so it is not evidence.
    pub fn partial(&self) -> bool {
        !self.complete() && (self.marker_token || self.project_marker == Some(true))
    }

    pub fn rule_set(&self) -> RuleSet {
        if self.complete() {
            RuleSet::SpecializedPanel
        } else if self.partial() {
            RuleSet::DisputedPanel
        } else {
            RuleSet::Standard
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionFailure {
    NoMatch,
    Ambiguous { candidates: Vec<String> },
    Query { error: String },
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::NoMatch => write!(f, "no matching remote project"),
            ResolutionFailure::Ambiguous { candidates } => write!(
                f,
                "ambiguous remote project match: {} projects ({})",
                candidates.len(),
                candidates.join(", ")
            ),
            ResolutionFailure::Query { error } => write!(f, "remote query failed: {error}"),
        }
    }
}

pub fn resolve_project(
    remote: &dyn RemoteQuery,
    runfolder: &RunfolderName,
) -> Result<RemoteProject, ResolutionFailure> {
    let mut projects = remote
        .find_projects(runfolder.as_str())
        .map_err(|err| ResolutionFailure::Query {
            error: err.to_string(),
        })?;
    match projects.len() {
        0 => Err(ResolutionFailure::NoMatch),
        1 => Ok(projects.remove(0)),
        _ => Err(ResolutionFailure::Ambiguous {
            candidates: projects
                .into_iter()
                .map(|project| format!("{} ({})", project.name, project.id))
                .collect(),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct RemoteFacts {
    pub project: Result<RemoteProject, ResolutionFailure>,
    pub fastqs: Option<Result<Vec<RemoteFile>, String>>,
    pub logfiles: Option<Result<Vec<RemoteFile>, String>>,
}

impl RemoteFacts {
    pub fn gather(
        runfolder: &Runfolder,
        remote: &dyn RemoteQuery,
        policy: &EvaluationPolicy,
    ) -> Self {
        let matched = match resolve_project(remote, &runfolder.name) {
            Ok(matched) => matched,
            Err(failure) => {
                return Self {
                    project: Err(failure),
                    fastqs: None,
                    logfiles: None,
                };
            }
        };

        let rule_set = PanelEvidence::collect(runfolder, Some(&matched), &policy.panel).rule_set();
        let fastqs = rule_set.applies(Criterion::FastqUpload).then(|| {
            remote
                .list_files(&matched, &policy.fastq_folder)
                .map_err(|err| err.to_string())
        });
        let logfiles = Some(
            remote
                .list_files(&matched, &policy.logfile_path(runfolder.name.as_str()))
                .map_err(|err| err.to_string()),
        );

        Self {
            project: Ok(matched),
            fastqs,
            logfiles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityReport {
    runfolder: RunfolderName,
    run_type: RunType,
    rule_set: RuleSet,
    project: Option<RemoteProject>,
    criteria: Vec<CriterionResult>,
    eligible: bool,
}

impl EligibilityReport {
    fn new(
        runfolder: RunfolderName,
        rule_set: RuleSet,
        project: Option<RemoteProject>,
        criteria: Vec<CriterionResult>,
    ) -> Self {
        let eligible = criteria
            .iter()
            .filter(|result| result.is_applicable())
            .all(CriterionResult::passed);
        Self {
            runfolder,
            run_type: rule_set.run_type(),
            rule_set,
            project,
            criteria,
            eligible,
        }
    }

    pub fn errored(runfolder: RunfolderName, detail: &str) -> Self {
        let criteria = Criterion::ALL
            .iter()
            .map(|criterion| {
                CriterionResult::new(
                    *criterion,
                    CriterionStatus::NotEvaluated,
                    format!("not evaluated: {detail}"),
                )
            })
            .collect();
        Self::new(runfolder, RuleSet::Standard, None, criteria)
    }

    pub fn runfolder(&self) -> &RunfolderName {
        &self.runfolder
    }

    pub fn run_type(&self) -> RunType {
        self.run_type
    }

    pub fn rule_set(&self) -> RuleSet {
        self.rule_set
    }

    pub fn project(&self) -> Option<&RemoteProject> {
        self.project.as_ref()
    }

    pub fn criteria(&self) -> &[CriterionResult] {
        &self.criteria
    }

    pub fn criterion(&self, criterion: Criterion) -> Option<&CriterionResult> {
        self.criteria
            .iter()
            .find(|result| result.criterion == criterion)
    }

    pub fn eligible(&self) -> bool {
        self.eligible
    }

    pub fn failures(&self) -> impl Iterator<Item = &CriterionResult> {
        self.criteria
            .iter()
            .filter(|result| result.is_applicable() && !result.passed())
    }

    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|result| format!("{}: {}", result.criterion, result.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn evaluate(
    runfolder: &Runfolder,
    facts: &RemoteFacts,
    policy: &EvaluationPolicy,
) -> EligibilityReport {
    let project = facts.project.as_ref().ok();
    let evidence = PanelEvidence::collect(runfolder, project, &policy.panel);
    let rule_set = evidence.rule_set();

    let criteria = Criterion::ALL
        .iter()
        .map(|criterion| {
            if !rule_set.applies(*criterion) {
                return CriterionResult::new(
                    *criterion,
                    CriterionStatus::NotApplicable,
                    format!("not applicable: {} run", rule_set.run_type()),
                );
            }
            match criterion {
                Criterion::ProjectResolution => check_project(facts),
                Criterion::FastqUpload => check_fastqs(runfolder, facts, policy),
                Criterion::LogfileCount => check_logfiles(runfolder, facts, policy),
                Criterion::UploadLog => check_upload_log(&runfolder.upload_log),
                Criterion::PanelMarkerLogfile => check_marker_logfile(runfolder, policy),
                Criterion::PanelMarkerToken => check_marker_token(runfolder, policy),
                Criterion::PanelProjectMarker => check_project_marker(project, policy),
            }
        })
        .collect();

    EligibilityReport::new(runfolder.name.clone(), rule_set, project.cloned(), criteria)
}

fn check_project(facts: &RemoteFacts) -> CriterionResult {
    let criterion = Criterion::ProjectResolution;
    match &facts.project {
        Ok(project) => CriterionResult::new(
            criterion,
            CriterionStatus::Passed,
            format!("matched {} ({})", project.name, project.id),
        ),
        Err(failure) => CriterionResult::new(criterion, CriterionStatus::Failed, failure.to_string()),
    }
}

fn check_fastqs(
    runfolder: &Runfolder,
    facts: &RemoteFacts,
    policy: &EvaluationPolicy,
) -> CriterionResult {
    let criterion = Criterion::FastqUpload;
    if facts.project.is_err() {
        return CriterionResult::new(criterion, CriterionStatus::NotEvaluated, NO_PROJECT);
    }
    let remote_files = match &facts.fastqs {
        Some(Ok(files)) => files,
        Some(Err(error)) => {
            return CriterionResult::new(
                criterion,
                CriterionStatus::Failed,
                format!("remote query failed: {error}"),
            );
        }
        None => {
            return CriterionResult::new(
                criterion,
                CriterionStatus::NotEvaluated,
                "not evaluated: remote fastqs not listed",
            );
        }
    };
    if runfolder.local_fastqs.is_empty() {
        return CriterionResult::new(criterion, CriterionStatus::Failed, "no local fastqs found");
    }

    let mut remote_by_name = HashMap::<&str, Vec<&RemoteFile>>::new();
    for file in remote_files
        .iter()
        .filter(|file| policy.fastq_pattern.is_match(&file.name))
    {
        remote_by_name.entry(file.name.as_str()).or_default().push(file);
    }

    let mut problems = Vec::new();
    for local in &runfolder.local_fastqs {
        let candidates = remote_by_name
            .get(local.file_name.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let verified = candidates
            .iter()
            .any(|remote| remote.is_closed() && remote.size == Some(local.size));
        if verified {
            continue;
        }
        let reason = if candidates.is_empty() {
            "missing".to_string()
        } else if !candidates.iter().any(|remote| remote.is_closed()) {
            format!("state {}", candidates[0].state)
        } else {
            let remote_size = candidates
                .iter()
                .find(|remote| remote.is_closed())
                .and_then(|remote| remote.size)
                .map(|size| size.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            format!("size {remote_size} != local {}", local.size)
        };
        problems.push(format!("{} ({reason})", local.file_name));
    }

    let total = runfolder.local_fastqs.len();
    if problems.is_empty() {
        CriterionResult::new(
            criterion,
            CriterionStatus::Passed,
            format!("{total} local fastqs uploaded and closed"),
        )
    } else {
        let listed = problems
            .iter()
            .take(MAX_LISTED_PROBLEMS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let more = problems.len().saturating_sub(MAX_LISTED_PROBLEMS);
        let suffix = if more > 0 {
            format!(" and {more} more")
        } else {
            String::new()
        };
        CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!(
                "{} of {total} local fastqs not verified remotely: {listed}{suffix}",
                problems.len()
            ),
        )
    }
}

fn check_logfiles(
    runfolder: &Runfolder,
    facts: &RemoteFacts,
    policy: &EvaluationPolicy,
) -> CriterionResult {
    let criterion = Criterion::LogfileCount;
    if facts.project.is_err() {
        return CriterionResult::new(criterion, CriterionStatus::NotEvaluated, NO_PROJECT);
    }
    let folder = policy.logfile_path(runfolder.name.as_str());
    match &facts.logfiles {
        Some(Ok(files)) if files.len() >= policy.logfile_count => CriterionResult::new(
            criterion,
            CriterionStatus::Passed,
            format!(
                "{} logfiles in {folder} (threshold {})",
                files.len(),
                policy.logfile_count
            ),
        ),
        Some(Ok(files)) => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!(
                "{} logfiles in {folder}, expected at least {}",
                files.len(),
                policy.logfile_count
            ),
        ),
        Some(Err(error)) => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("remote query failed: {error}"),
        ),
        None => CriterionResult::new(
            criterion,
            CriterionStatus::NotEvaluated,
            "not evaluated: remote logfiles not listed",
        ),
    }
}

fn check_upload_log(scan: &UploadLogScan) -> CriterionResult {
    let criterion = Criterion::UploadLog;
    match scan {
        UploadLogScan::Clean { path } => CriterionResult::new(
            criterion,
            CriterionStatus::Passed,
            format!("no error markers in {path}"),
        ),
        UploadLogScan::Missing { path } => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("upload log not found at {path}"),
        ),
        UploadLogScan::ErrorsFound { path, lines } => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!(
                "error markers in {path}: {}",
                lines.first().map(String::as_str).unwrap_or_default()
            ),
        ),
        UploadLogScan::Unreadable { path, error } => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("upload log {path} unreadable: {error}"),
        ),
    }
}

fn check_marker_logfile(runfolder: &Runfolder, policy: &EvaluationPolicy) -> CriterionResult {
    let criterion = Criterion::PanelMarkerLogfile;
    let file = &policy.panel.marker_logfile;
    match &runfolder.panel_marker {
        MarkerLog::Missing => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("{file} not found in runfolder"),
        ),
        MarkerLog::Unreadable { error } => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("{file} unreadable: {error}"),
        ),
        MarkerLog::Present { .. } => {
            CriterionResult::new(criterion, CriterionStatus::Passed, format!("{file} present"))
        }
    }
}

fn check_marker_token(runfolder: &Runfolder, policy: &EvaluationPolicy) -> CriterionResult {
    let criterion = Criterion::PanelMarkerToken;
    let PanelMarkers {
        marker_logfile,
        marker_token,
        ..
    } = &policy.panel;
    if runfolder.panel_marker.token_found() {
        CriterionResult::new(
            criterion,
            CriterionStatus::Passed,
            format!("{marker_logfile} contains {marker_token:?}"),
        )
    } else {
        CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("{marker_logfile} does not contain {marker_token:?}"),
        )
    }
}

fn check_project_marker(
    project: Option<&RemoteProject>,
    policy: &EvaluationPolicy,
) -> CriterionResult {
    let criterion = Criterion::PanelProjectMarker;
    let marker = &policy.panel.project_marker;
    match project {
        None => CriterionResult::new(criterion, CriterionStatus::NotEvaluated, NO_PROJECT),
        Some(project) if project.name.contains(marker.as_str()) => CriterionResult::new(
            criterion,
            CriterionStatus::Passed,
            format!("project name {} contains {marker:?}", project.name),
        ),
        Some(project) => CriterionResult::new(
            criterion,
            CriterionStatus::Failed,
            format!("project name {} does not contain {marker:?}", project.name),
        ),
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use crate::domain::FileState;
    use crate::runfolder::LocalFastq;

    use super::*;

    fn policy() -> EvaluationPolicy {
        let mut policy = EvaluationPolicy::with_defaults(Utf8PathBuf::from("/logs")).unwrap();
        policy.logfile_count = 6;
        policy
    }

    fn fastq(name: &str, size: u64) -> LocalFastq {
        LocalFastq {
            relative_path: format!("Data/Intensities/BaseCalls/{name}"),
            file_name: name.to_string(),
            size,
        }
    }

    fn remote(name: &str, state: FileState, size: Option<u64>) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            folder: "/230101_RUN1/Data/Intensities/BaseCalls".to_string(),
            state,
            size,
        }
    }

    fn logfiles(count: usize) -> Vec<RemoteFile> {
        (0..count)
            .map(|i| remote(&format!("stage{i}.log"), FileState::Closed, Some(10)))
            .collect()
    }

    fn standard_folder(fastqs: Vec<LocalFastq>) -> Runfolder {
        Runfolder {
            name: "230101_RUN1".parse().unwrap(),
            path: Utf8PathBuf::from("/data/230101_RUN1"),
            age_days: 10,
            local_fastqs: fastqs,
            panel_marker: MarkerLog::Present { token_found: false },
            upload_log: UploadLogScan::Clean {
                path: Utf8PathBuf::from("/logs/230101_RUN1_upload_runfolder.log"),
            },
        }
    }

    fn project(name: &str) -> RemoteProject {
        RemoteProject {
            id: "project-1".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn standard_run_all_checks_pass() {
        let folder = standard_folder(vec![fastq("S1_R1_001.fastq.gz", 4)]);
        let facts = RemoteFacts {
            project: Ok(project("002_230101_RUN1")),
            fastqs: Some(Ok(vec![remote("S1_R1_001.fastq.gz", FileState::Closed, Some(4))])),
            logfiles: Some(Ok(logfiles(8))),
        };
        let report = evaluate(&folder, &facts, &policy());
        assert!(report.eligible(), "{}", report.failure_summary());
        assert_eq!(report.rule_set(), RuleSet::Standard);
        let order = report
            .criteria()
            .iter()
            .map(|result| result.criterion)
            .collect::<Vec<_>>();
        assert_eq!(order, Criterion::ALL.to_vec());
        assert_eq!(
            report.criterion(Criterion::PanelProjectMarker).unwrap().status,
            CriterionStatus::NotApplicable
        );
    }

    #[test]
    fn open_or_resized_remote_fastq_fails() {
        let folder = standard_folder(vec![
            fastq("S1_R1_001.fastq.gz", 4),
            fastq("S1_R2_001.fastq.gz", 5),
        ]);
        let facts = RemoteFacts {
            project: Ok(project("002_230101_RUN1")),
            fastqs: Some(Ok(vec![
                remote("S1_R1_001.fastq.gz", FileState::Open, None),
                remote("S1_R2_001.fastq.gz", FileState::Closed, Some(3)),
            ])),
            logfiles: Some(Ok(logfiles(8))),
        };
        let report = evaluate(&folder, &facts, &policy());
        assert!(!report.eligible());
        let result = report.criterion(Criterion::FastqUpload).unwrap();
        assert_eq!(result.status, CriterionStatus::Failed);
        assert!(result.detail.contains("S1_R1_001.fastq.gz (state open)"));
        assert!(result.detail.contains("S1_R2_001.fastq.gz (size 3 != local 5)"));
    }

    #[test]
    fn no_local_fastqs_fails_closed() {
        let folder = standard_folder(Vec::new());
        let facts = RemoteFacts {
            project: Ok(project("002_230101_RUN1")),
            fastqs: Some(Ok(Vec::new())),
            logfiles: Some(Ok(logfiles(8))),
        };
        let report = evaluate(&folder, &facts, &policy());
        assert!(!report.eligible());
        assert_eq!(
            report.criterion(Criterion::FastqUpload).unwrap().detail,
            "no local fastqs found"
        );
    }

    #[test]
    fn missing_project_blocks_remote_checks() {
        let folder = standard_folder(vec![fastq("S1_R1_001.fastq.gz", 4)]);
        let facts = RemoteFacts {
            project: Err(ResolutionFailure::NoMatch),
            fastqs: None,
            logfiles: None,
        };
        let report = evaluate(&folder, &facts, &policy());
        assert!(!report.eligible());
        assert_eq!(
            report.criterion(Criterion::ProjectResolution).unwrap().detail,
            "no matching remote project"
        );
        for criterion in [Criterion::FastqUpload, Criterion::LogfileCount] {
            let result = report.criterion(criterion).unwrap();
            assert_eq!(result.status, CriterionStatus::NotEvaluated);
            assert_eq!(result.detail, NO_PROJECT);
        }
        assert_eq!(
            report.criterion(Criterion::UploadLog).unwrap().status,
            CriterionStatus::Passed
        );
    }

    #[test]
    fn panel_run_skips_fastqs() {
        let mut folder = standard_folder(Vec::new());
        folder.panel_marker = MarkerLog::Present { token_found: true };
        let facts = RemoteFacts {
            project: Ok(project("002_230101_RUN1_TSO23001")),
            fastqs: None,
            logfiles: Some(Ok(logfiles(6))),
        };
        let report = evaluate(&folder, &facts, &policy());
        assert_eq!(report.run_type(), RunType::SpecializedPanel);
        assert!(report.eligible(), "{}", report.failure_summary());
        assert_eq!(
            report.criterion(Criterion::FastqUpload).unwrap().status,
            CriterionStatus::NotApplicable
        );
    }

    #[test]
    fn project_marker_alone_disputes_classification() {
        let folder = standard_folder(vec![fastq("S1_R1_001.fastq.gz", 4)]);
        let facts = RemoteFacts {
            project: Ok(project("002_230101_RUN1_TSO23001")),
            fastqs: Some(Ok(vec![remote("S1_R1_001.fastq.gz", FileState::Closed, Some(4))])),
            logfiles: Some(Ok(logfiles(6))),
        };
        let report = evaluate(&folder, &facts, &policy());
        assert_eq!(report.rule_set(), RuleSet::DisputedPanel);
        assert_eq!(report.run_type(), RunType::Standard);
        assert!(!report.eligible());
        let failed = report.failures().map(|r| r.criterion).collect::<Vec<_>>();
        assert_eq!(failed, vec![Criterion::PanelMarkerToken]);
    }

    #[test]
    fn errored_report_is_never_eligible() {
        let report = EligibilityReport::errored("230101_RUN1".parse().unwrap(), "stat failed");
        assert!(!report.eligible());
        assert_eq!(report.failures().count(), Criterion::ALL.len());
    }
}
