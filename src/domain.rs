use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CleanerError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunfolderName(String);

impl RunfolderName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunfolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunfolderName {
    type Err = CleanerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_valid = match value.split_once('_') {
            Some((date, rest)) => {
                date.len() == 6
                    && date.chars().all(|ch| ch.is_ascii_digit())
                    && !rest.is_empty()
                    && !rest.contains('/')
            }
            None => false,
        };
        if !is_valid {
            return Err(CleanerError::InvalidRunfolderName(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Standard,
    SpecializedPanel,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunType::Standard => write!(f, "standard"),
            RunType::SpecializedPanel => write!(f, "specialized_panel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Open,
    Closing,
    Closed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Open => write!(f, "open"),
            FileState::Closing => write!(f, "closing"),
            FileState::Closed => write!(f, "closed"),
            FileState::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub folder: String,
    pub state: FileState,
    #[serde(default)]
    pub size: Option<u64>,
}

impl RemoteFile {
    pub fn is_closed(&self) -> bool {
        self.state == FileState::Closed
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_runfolder_name_valid() {
        let name: RunfolderName = "190408_NB551068_0234_AHJ7MTAFXY_NGS265B".parse().unwrap();
        assert_eq!(name.as_str(), "190408_NB551068_0234_AHJ7MTAFXY_NGS265B");
    }

    #[test]
    fn parse_runfolder_name_invalid() {
        for value in ["automate_demultiplexing_logfiles", "19040_RUN", "190408_", "190408"] {
            let err = value.parse::<RunfolderName>().unwrap_err();
            assert_matches!(err, CleanerError::InvalidRunfolderName(_));
        }
    }

    #[test]
    fn file_state_unknown_values() {
        let state: FileState = serde_json::from_str("\"abandoned\"").unwrap();
        assert_eq!(state, FileState::Unknown);
        let state: FileState = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(state, FileState::Closed);
    }
}
