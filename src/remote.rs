use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::auth::Credential;
use crate::domain::{FileState, RemoteFile, RemoteProject};
use crate::error::CleanerError;

pub const DNANEXUS_API_URL: &str = "https://api.dnanexus.com";

pub trait RemoteQuery: Send + Sync {
    fn whoami(&self) -> Result<String, CleanerError>;
    fn find_projects(&self, runfolder: &str) -> Result<Vec<RemoteProject>, CleanerError>;
    fn list_files(
        &self,
        project: &RemoteProject,
        folder: &str,
    ) -> Result<Vec<RemoteFile>, CleanerError>;
    fn read_text(&self, project: &RemoteProject, path: &str) -> Result<String, CleanerError>;
}

#[derive(Clone)]
pub struct DnanexusHttpClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct FindProjectsRequest<'a> {
    name: NameQuery<'a>,
    describe: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting: Option<Value>,
}

#[derive(Debug, Serialize)]
struct NameQuery<'a> {
    regexp: &'a str,
}

#[derive(Debug, Serialize)]
struct FindDataObjectsRequest<'a> {
    class: &'static str,
    scope: Scope<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    describe: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Scope<'a> {
    project: &'a str,
    folder: &'a str,
    recurse: bool,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
    #[serde(default)]
    next: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ProjectHit {
    id: String,
    describe: ProjectDescription,
}

#[derive(Debug, Deserialize)]
struct ProjectDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileHit {
    id: String,
    describe: FileDescription,
}

#[derive(Debug, Deserialize)]
struct FileDescription {
    name: String,
    #[serde(default)]
    folder: String,
    state: FileState,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl DnanexusHttpClient {
    pub fn new(credential: &Credential) -> Result<Self, CleanerError> {
        Self::with_base_url(credential, DNANEXUS_API_URL)
    }

    pub fn with_base_url(credential: &Credential, base_url: &str) -> Result<Self, CleanerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("rf-cleaner/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CleanerError::RemoteHttp(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential.token()))
            .map_err(|_| CleanerError::CredentialCache("token is not a valid header".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| CleanerError::RemoteHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn call<B: Serialize, T: DeserializeOwned>(&self, route: &str, body: &B) -> Result<T, CleanerError> {
        let url = format!("{}/{}", self.base_url, route.trim_start_matches('/'));
        let response = self.send_with_retries(|| self.client.post(&url).json(body))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| CleanerError::RemoteHttp(err.to_string()))
    }

    fn find_file_objects(
        &self,
        project: &RemoteProject,
        folder: &str,
        name: Option<&str>,
        recurse: bool,
    ) -> Result<Vec<FileHit>, CleanerError> {
        let mut hits = Vec::new();
        let mut starting = None;
        loop {
            let request = FindDataObjectsRequest {
                class: "file",
                scope: Scope {
                    project: &project.id,
                    folder,
                    recurse,
                },
                name,
                describe: json!({"fields": {"name": true, "folder": true, "state": true, "size": true}}),
                starting,
            };
            let page: Page<FileHit> = self.call("system/findDataObjects", &request)?;
            hits.extend(page.results);
            match page.next {
                Some(next) if !next.is_null() => starting = Some(next),
                _ => break,
            }
        }
        Ok(hits)
    }

    fn download_request(&self, link: &DownloadLink) -> reqwest::blocking::RequestBuilder {
        let mut request = self.client.get(&link.url);
        for (key, value) in &link.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        request
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, CleanerError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "DNAnexus request failed".to_string());
        Err(CleanerError::RemoteStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, CleanerError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying DNAnexus request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "retrying DNAnexus request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(CleanerError::RemoteHttp(err.to_string()));
                }
            }
        }
    }
}

impl RemoteQuery for DnanexusHttpClient {
    fn whoami(&self) -> Result<String, CleanerError> {
        let who: WhoAmI = self.call("system/whoami", &json!({}))?;
        Ok(who.id)
    }

    fn find_projects(&self, runfolder: &str) -> Result<Vec<RemoteProject>, CleanerError> {
        let pattern = regex::escape(runfolder);
        let mut projects = Vec::new();
        let mut starting = None;
        loop {
            let request = FindProjectsRequest {
                name: NameQuery { regexp: &pattern },
                describe: json!({"fields": {"name": true}}),
                starting,
            };
            let page: Page<ProjectHit> = self.call("system/findProjects", &request)?;
            projects.extend(page.results.into_iter().map(|hit| RemoteProject {
                id: hit.id,
                name: hit.describe.name,
            }));
            match page.next {
                Some(next) if !next.is_null() => starting = Some(next),
                _ => break,
            }
        }
        debug!(runfolder, matches = projects.len(), "searched DNAnexus projects");
        Ok(projects)
    }

    fn list_files(
        &self,
        project: &RemoteProject,
        folder: &str,
    ) -> Result<Vec<RemoteFile>, CleanerError> {
        let hits = self.find_file_objects(project, folder, None, true)?;
        Ok(hits
            .into_iter()
            .map(|hit| RemoteFile {
                name: hit.describe.name,
                folder: hit.describe.folder,
                state: hit.describe.state,
                size: hit.describe.size,
            })
            .collect())
    }

    fn read_text(&self, project: &RemoteProject, path: &str) -> Result<String, CleanerError> {
        let (folder, name) = split_remote_path(path);
        let hit = closed_file(self.find_file_objects(project, folder, Some(name), false)?)
            .ok_or_else(|| CleanerError::RemoteFileNotFound(format!("{}:{path}", project.id)))?;

        let link: DownloadLink = self.call(
            &format!("{}/download", hit.id),
            &json!({"project": project.id}),
        )?;
        let response = self.send_with_retries(|| self.download_request(&link))?;
        Self::handle_status(response)?
            .text()
            .map_err(|err| CleanerError::RemoteHttp(err.to_string()))
    }
}

fn closed_file(hits: Vec<FileHit>) -> Option<FileHit> {
    hits.into_iter()
        .find(|hit| hit.describe.state == FileState::Closed)
}

fn split_remote_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((folder, name)) => (folder, name),
        None => ("/", path),
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
