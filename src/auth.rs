use std::fmt;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::CleanerError;

#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn from_file(path: &Utf8Path) -> Result<Self, CleanerError> {
        if !path.as_std_path().is_file() {
            return Err(CleanerError::MissingCredential(path.to_path_buf()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| CleanerError::Filesystem(format!("read {path}: {err}")))?;
        Self::new(&content).ok_or_else(|| CleanerError::EmptyCredential(path.to_path_buf()))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CachedToken {
    auth_token: String,
}

#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: Utf8PathBuf,
}

impl CredentialCache {
    pub fn new() -> Result<Self, CleanerError> {
        let path = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.config_dir().join("runfolder-cleaner").join("auth.json"),
                )
                .ok()
            })
            .ok_or_else(|| {
                CleanerError::CredentialCache("unable to resolve config directory".to_string())
            })?;
        Ok(Self { path })
    }

    pub fn new_with_path(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn load(&self) -> Result<Credential, CleanerError> {
        if !self.path.as_std_path().is_file() {
            return Err(CleanerError::MissingCredential(self.path.clone()));
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;
        let cached: CachedToken = serde_json::from_str(&content)
            .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;
        Credential::new(&cached.auth_token)
            .ok_or_else(|| CleanerError::EmptyCredential(self.path.clone()))
    }

    pub fn store(&self, credential: &Credential) -> Result<(), CleanerError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| CleanerError::CredentialCache("cache path has no parent".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;

        let body = serde_json::to_vec(&CachedToken {
            auth_token: credential.token().to_string(),
        })
        .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;
        let mut temp = NamedTempFile::new_in(parent.as_std_path())
            .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;
        temp.write_all(&body)
            .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| CleanerError::CredentialCache(err.to_string()))?;
        Ok(())
    }
}

pub fn resolve_credential(
    auth_file: Option<&Utf8Path>,
    cache: &CredentialCache,
) -> Result<Credential, CleanerError> {
    match auth_file {
        Some(path) => Credential::from_file(path),
        None => cache.load(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).unwrap()
    }

    #[test]
    fn token_file_is_trimmed() {
        let temp = tempfile::tempdir().unwrap();
        let path = utf8(temp.path().join("token"));
        fs::write(&path, "  abc123\n").unwrap();
        let credential = Credential::from_file(&path).unwrap();
        assert_eq!(credential.token(), "abc123");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
    }

    #[test]
    fn empty_and_missing_token_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = utf8(temp.path().join("token"));
        assert_matches!(
            Credential::from_file(&path),
            Err(CleanerError::MissingCredential(_))
        );
        fs::write(&path, "\n").unwrap();
        assert_matches!(
            Credential::from_file(&path),
            Err(CleanerError::EmptyCredential(_))
        );
    }

    #[test]
    fn cache_round_trip_and_precedence() {
        let temp = tempfile::tempdir().unwrap();
        let cache = CredentialCache::new_with_path(utf8(temp.path().join("cfg").join("auth.json")));
        cache.store(&Credential::new("cached").unwrap()).unwrap();

        let token_file = utf8(temp.path().join("token"));
        fs::write(&token_file, "explicit").unwrap();

        assert_eq!(resolve_credential(None, &cache).unwrap().token(), "cached");
        assert_eq!(
            resolve_credential(Some(&token_file), &cache).unwrap().token(),
            "explicit"
        );
    }
}
