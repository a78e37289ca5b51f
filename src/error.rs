use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CleanerError {
    #[error("runfolder root is not a directory: {0}")]
    #[diagnostic(help("pass an existing directory to --runfolders-dir"))]
    InvalidRoot(Utf8PathBuf),

    #[error("invalid runfolder name: {0}")]
    InvalidRunfolderName(String),

    #[error("auth token file not found: {0}")]
    #[diagnostic(help("pass --auth <FILE> or cache a token with `rf-cleaner key set <TOKEN>`"))]
    MissingCredential(Utf8PathBuf),

    #[error("auth token file is empty: {0}")]
    EmptyCredential(Utf8PathBuf),

    #[error("DNAnexus rejected the auth token (status {status}): {message}")]
    #[diagnostic(help("the token may be expired or revoked; generate a new one and pass it with --auth"))]
    RejectedCredential { status: u16, message: String },

    #[error("credential cache error: {0}")]
    CredentialCache(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("DNAnexus request failed: {0}")]
    RemoteHttp(String),

    #[error("DNAnexus returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("DNAnexus file not found: {0}")]
    RemoteFileNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to set up logging: {0}")]
    LogSetup(String),
}
