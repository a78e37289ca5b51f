use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CleanerError;

pub const DEFAULT_CONFIG_FILE: &str = "rf-cleaner.json";
pub const DEFAULT_MIN_AGE_DAYS: u64 = 14;
pub const DEFAULT_LOGFILE_COUNT: usize = 5;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_LOGFILE_FOLDER: &str = "automated_scripts_logfiles";
pub const DEFAULT_FASTQ_FOLDER: &str = "/";
pub const DEFAULT_FASTQ_PATTERN: &str = r"\.fastq\.gz$";
pub const DEFAULT_SEQUENCING_COMPLETE_MARKER: &str = "RTAComplete.txt";
pub const DEFAULT_UPLOAD_LOG_SUFFIX: &str = "_upload_runfolder.log";
pub const DEFAULT_PANEL_MARKER_LOGFILE: &str = "bcl2fastq2_output.log";
pub const DEFAULT_PANEL_MARKER_TOKEN: &str = "TSO500 run.";
pub const DEFAULT_PANEL_PROJECT_MARKER: &str = "_TSO";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub min_age_days: Option<u64>,
    #[serde(default)]
    pub logfile_count: Option<usize>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub upload_log_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub upload_log_suffix: Option<String>,
    #[serde(default)]
    pub fastq_pattern: Option<String>,
    #[serde(default)]
    pub fastq_folder: Option<String>,
    #[serde(default)]
    pub logfile_folder: Option<String>,
    #[serde(default)]
    pub error_markers: Option<Vec<String>>,
    #[serde(default)]
    pub sequencing_complete_marker: Option<String>,
    #[serde(default)]
    pub panel: Option<PanelConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub marker_logfile: Option<String>,
    #[serde(default)]
    pub marker_token: Option<String>,
    #[serde(default)]
    pub project_marker: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub min_age_days: Option<u64>,
    pub logfile_count: Option<usize>,
    pub workers: Option<usize>,
    pub upload_log_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CleanerSettings {
    pub min_age_days: u64,
    pub workers: usize,
    pub policy: EvaluationPolicy,
}

#[derive(Debug, Clone)]
pub struct PanelMarkers {
    pub marker_logfile: String,
    pub marker_token: String,
    pub project_marker: String,
}

impl Default for PanelMarkers {
    fn default() -> Self {
        Self {
            marker_logfile: DEFAULT_PANEL_MARKER_LOGFILE.to_string(),
            marker_token: DEFAULT_PANEL_MARKER_TOKEN.to_string(),
            project_marker: DEFAULT_PANEL_PROJECT_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationPolicy {
    pub logfile_count: usize,
    pub logfile_folder: String,
    pub fastq_folder: String,
    pub fastq_pattern: Regex,
    pub error_markers: Vec<Regex>,
    pub upload_log_dir: Utf8PathBuf,
    pub upload_log_suffix: String,
    pub sequencing_complete_marker: String,
    pub panel: PanelMarkers,
}

impl EvaluationPolicy {
    pub fn with_defaults(upload_log_dir: Utf8PathBuf) -> Result<Self, CleanerError> {
        Ok(Self {
            logfile_count: DEFAULT_LOGFILE_COUNT,
            logfile_folder: DEFAULT_LOGFILE_FOLDER.to_string(),
            fastq_folder: DEFAULT_FASTQ_FOLDER.to_string(),
            fastq_pattern: compile(DEFAULT_FASTQ_PATTERN)?,
            error_markers: compile_all(&default_error_markers())?,
            upload_log_dir,
            upload_log_suffix: DEFAULT_UPLOAD_LOG_SUFFIX.to_string(),
            sequencing_complete_marker: DEFAULT_SEQUENCING_COMPLETE_MARKER.to_string(),
            panel: PanelMarkers::default(),
        })
    }

    pub fn upload_log_path(&self, runfolder: &str) -> Utf8PathBuf {
        self.upload_log_dir
            .join(format!("{runfolder}{}", self.upload_log_suffix))
    }

    pub fn logfile_path(&self, runfolder: &str) -> String {
        format!("/{runfolder}/{}", self.logfile_folder.trim_matches('/'))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Utf8Path>) -> Result<Config, CleanerError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| CleanerError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| CleanerError::ConfigParse(err.to_string()))
    }

    pub fn resolve_settings(
        config: Config,
        overrides: Overrides,
        root: &Utf8Path,
    ) -> Result<CleanerSettings, CleanerError> {
        let workers = overrides
            .workers
            .or(config.workers)
            .unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(CleanerError::InvalidSetting(
                "workers must be at least 1".to_string(),
            ));
        }

        let upload_log_dir = overrides
            .upload_log_dir
            .or(config.upload_log_dir)
            .unwrap_or_else(|| default_upload_log_dir(root));
        let fastq_pattern = config
            .fastq_pattern
            .unwrap_or_else(|| DEFAULT_FASTQ_PATTERN.to_string());
        let error_markers = config
            .error_markers
            .unwrap_or_else(default_error_markers);
        if error_markers.is_empty() {
            return Err(CleanerError::InvalidSetting(
                "error_markers must not be empty".to_string(),
            ));
        }
        let panel = config.panel.unwrap_or_default();
        let defaults = PanelMarkers::default();

        let policy = EvaluationPolicy {
            logfile_count: overrides
                .logfile_count
                .or(config.logfile_count)
                .unwrap_or(DEFAULT_LOGFILE_COUNT),
            logfile_folder: config
                .logfile_folder
                .unwrap_or_else(|| DEFAULT_LOGFILE_FOLDER.to_string()),
            fastq_folder: config
                .fastq_folder
                .unwrap_or_else(|| DEFAULT_FASTQ_FOLDER.to_string()),
            fastq_pattern: compile(&fastq_pattern)?,
            error_markers: compile_all(&error_markers)?,
            upload_log_dir,
            upload_log_suffix: config
                .upload_log_suffix
                .unwrap_or_else(|| DEFAULT_UPLOAD_LOG_SUFFIX.to_string()),
            sequencing_complete_marker: config
                .sequencing_complete_marker
                .unwrap_or_else(|| DEFAULT_SEQUENCING_COMPLETE_MARKER.to_string()),
            panel: PanelMarkers {
                marker_logfile: panel.marker_logfile.unwrap_or(defaults.marker_logfile),
                marker_token: panel.marker_token.unwrap_or(defaults.marker_token),
                project_marker: panel.project_marker.unwrap_or(defaults.project_marker),
            },
        };

        Ok(CleanerSettings {
            min_age_days: overrides
                .min_age_days
                .or(config.min_age_days)
                .unwrap_or(DEFAULT_MIN_AGE_DAYS),
            workers,
            policy,
        })
    }
}

pub fn default_upload_log_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("automate_demultiplexing_logfiles")
        .join("upload_runfolder_script_logfiles")
}

// The upload tool logs as "<asctime> <name> <LEVEL> - <message>".
pub fn default_error_markers() -> Vec<String> {
    vec![
        r"\bERROR\b".to_string(),
        r"\bCRITICAL\b".to_string(),
        r"Traceback \(most recent call last\)".to_string(),
    ]
}

fn compile(pattern: &str) -> Result<Regex, CleanerError> {
    Regex::new(pattern).map_err(|err| CleanerError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, CleanerError> {
    patterns.iter().map(|pattern| compile(pattern)).collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_defaults() {
        let settings = ConfigLoader::resolve_settings(
            Config::default(),
            Overrides::default(),
            Utf8Path::new("/data/share"),
        )
        .unwrap();
        assert_eq!(settings.min_age_days, DEFAULT_MIN_AGE_DAYS);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.policy.logfile_count, DEFAULT_LOGFILE_COUNT);
        assert_eq!(
            settings.policy.upload_log_path("230101_RUN1"),
            Utf8PathBuf::from(
                "/data/share/automate_demultiplexing_logfiles/upload_runfolder_script_logfiles/230101_RUN1_upload_runfolder.log"
            )
        );
        assert_eq!(
            settings.policy.logfile_path("230101_RUN1"),
            "/230101_RUN1/automated_scripts_logfiles"
        );
    }

    #[test]
    fn overrides_win_over_file() {
        let config: Config =
            serde_json::from_str(r#"{"min_age_days": 30, "logfile_count": 8, "workers": 2}"#)
                .unwrap();
        let overrides = Overrides {
            min_age_days: Some(3),
            ..Overrides::default()
        };
        let settings =
            ConfigLoader::resolve_settings(config, overrides, Utf8Path::new("/data")).unwrap();
        assert_eq!(settings.min_age_days, 3);
        assert_eq!(settings.policy.logfile_count, 8);
        assert_eq!(settings.workers, 2);
    }

    #[test]
    fn rejects_invalid_marker_pattern() {
        let config: Config = serde_json::from_str(r#"{"error_markers": ["(unclosed"]}"#).unwrap();
        let err =
            ConfigLoader::resolve_settings(config, Overrides::default(), Utf8Path::new("/data"))
                .unwrap_err();
        assert_matches!(err, CleanerError::InvalidPattern { .. });
    }

    #[test]
    fn rejects_zero_workers() {
        let overrides = Overrides {
            workers: Some(0),
            ..Overrides::default()
        };
        let err =
            ConfigLoader::resolve_settings(Config::default(), overrides, Utf8Path::new("/data"))
                .unwrap_err();
        assert_matches!(err, CleanerError::InvalidSetting(_));
    }
}
