//! Blocking multipart uploads over HTTP.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::UtilError;

/// One file field of a `multipart/form-data` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Form field name.
    pub field: String,
    /// File whose contents become the field value.
    pub path: PathBuf,
}

impl FormPart {
    pub fn new(field: &str, path: &Path) -> Self {
        Self {
            field: field.to_owned(),
            path: path.to_path_buf(),
        }
    }
}

/// POST the given files to `url` as `multipart/form-data`.
///
/// The request is sent once. Redirects are followed by the client; any status
/// outside `2xx` is reported as an error.
///
/// # Errors
/// Returns [`UtilError::Io`] if a part cannot be read and
/// [`UtilError::Transport`] if the request fails or is rejected.
pub fn post_multipart(url: &str, parts: &[FormPart]) -> Result<u16, UtilError> {
    let boundary = make_boundary();
    let body = encode_multipart(&boundary, parts)?;

    let agent = ureq::Agent::new_with_config(
        ureq::config::Config::builder()
            .timeout_connect(Some(Duration::from_secs(30)))
            .timeout_global(Some(Duration::from_secs(600)))
            .build(),
    );

    log::debug!("POST {url} ({} bytes, {} parts)", body.len(), parts.len());
    let response = agent
        .post(url)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .send(&body[..])
        .map_err(|e| UtilError::Transport {
            url: url.to_owned(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(UtilError::Transport {
            url: url.to_owned(),
            message: format!("server responded with status {}", status.as_u16()),
        });
    }
    Ok(status.as_u16())
}

/// Encode `parts` as a `multipart/form-data` body delimited by `boundary`.
///
/// # Errors
/// Returns an error if a part's file cannot be read.
pub fn encode_multipart(boundary: &str, parts: &[FormPart]) -> Result<Vec<u8>, UtilError> {
    let mut body = Vec::new();
    for part in parts {
        let content = std::fs::read(&part.path).map_err(|source| UtilError::Io {
            path: part.path.display().to_string(),
            source,
        })?;
        let filename = part
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| part.field.clone());

        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field,
                filename.replace('"', "%22")
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("Content-Type: {}\r\n\r\n", content_type(&part.path)).as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(body)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn make_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("----testhaul{nanos:x}")
}
