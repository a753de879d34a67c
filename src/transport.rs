use std::borrow::Cow;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::error::AcquireError;
use crate::fs_util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Json,
    Csv,
    Gzip,
    Zip,
    Netcdf,
    Shapefile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Gzip,
    Zip,
}

#[derive(Debug, Clone)]
pub enum PayloadBody {
    Memory(Vec<u8>),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RawPayload {
    pub body: PayloadBody,
    pub content_type: Option<String>,
    pub origin: String,
    pub byte_len: u64,
}

impl RawPayload {
    pub fn from_bytes(origin: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            byte_len: bytes.len() as u64,
            body: PayloadBody::Memory(bytes),
            content_type,
            origin: origin.into(),
        }
    }

    pub fn from_file(origin: impl Into<String>, path: &Path) -> Result<Self, AcquireError> {
        let byte_len = fs::metadata(path)
            .map_err(|err| AcquireError::Filesystem(format!("stat {}: {err}", path.display())))?
            .len();
        Ok(Self {
            body: PayloadBody::File(path.to_path_buf()),
            content_type: None,
            origin: origin.into(),
            byte_len,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.body {
            PayloadBody::File(path) => Some(path.as_path()),
            PayloadBody::Memory(_) => None,
        }
    }

    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, AcquireError> {
        match &self.body {
            PayloadBody::Memory(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            PayloadBody::File(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|err| AcquireError::Filesystem(format!("read {}: {err}", path.display()))),
        }
    }

    pub fn file_name(&self) -> String {
        if let Some(name) = self
            .path()
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str())
        {
            return name.to_string();
        }
        let without_query = self.origin.split(['?', '#']).next().unwrap_or("");
        without_query
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("payload")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub expected: PayloadFormat,
    pub destination: Option<PathBuf>,
}

impl FetchRequest {
    pub fn in_memory(url: impl Into<String>, expected: PayloadFormat) -> Self {
        Self {
            url: url.into(),
            expected,
            destination: None,
        }
    }

    pub fn to_file(url: impl Into<String>, expected: PayloadFormat, destination: PathBuf) -> Self {
        Self {
            url: url.into(),
            expected,
            destination: Some(destination),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionNote {
    pub archive: String,
    pub member: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    pub member_path: PathBuf,
    pub candidates: usize,
    pub ambiguous: bool,
}

#[derive(Debug, Clone)]
pub struct Extracted {
    pub payload: RawPayload,
    pub note: ExtractionNote,
}

pub trait Transport: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<RawPayload, AcquireError>;

    fn extract(
        &self,
        payload: &RawPayload,
        kind: ArchiveKind,
        expected_suffix: &str,
        target_dir: &Path,
    ) -> Result<Extracted, AcquireError> {
        fs_util::extract(payload, kind, expected_suffix, target_dir)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("enviro-acq/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AcquireError::Network(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| AcquireError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, AcquireError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(AcquireError::NetworkStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: &FetchRequest) -> Result<RawPayload, AcquireError> {
        tracing::debug!(url = %request.url, expected = ?request.expected, "fetching");
        let response = self
            .client
            .get(&request.url)
            .send()
            .map_err(|err| AcquireError::Network(err.to_string()))?;
        let mut response = Self::handle_status(&request.url, response)?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let payload = match &request.destination {
            Some(destination) => {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|err| AcquireError::Filesystem(err.to_string()))?;
                }
                let mut file = File::create(destination)
                    .map_err(|err| AcquireError::Filesystem(err.to_string()))?;
                let byte_len = std::io::copy(&mut response, &mut file)
                    .map_err(|err| AcquireError::Network(err.to_string()))?;
                RawPayload {
                    body: PayloadBody::File(destination.clone()),
                    content_type,
                    origin: request.url.clone(),
                    byte_len,
                }
            }
            None => {
                let bytes = response
                    .bytes()
                    .map_err(|err| AcquireError::Network(err.to_string()))?;
                RawPayload::from_bytes(request.url.clone(), content_type, bytes.to_vec())
            }
        };
        tracing::info!(url = %payload.origin, bytes = payload.byte_len, "fetched");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_query() {
        let payload = RawPayload::from_bytes(
            "https://example.org/data/cru_ts4.08.2001.2010.pre.dat.nc.gz?x=1",
            None,
            vec![1, 2, 3],
        );
        assert_eq!(payload.file_name(), "cru_ts4.08.2001.2010.pre.dat.nc.gz");
        assert_eq!(payload.byte_len, 3);
    }
}
