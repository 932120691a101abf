//! File downloads with extraction and permission handling.

use super::http::HttpAuth;
use super::CapabilityError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Permission applied to a file after download/extraction.
#[derive(Debug, Clone)]
pub struct PermissionAssignment {
    /// Octal mode string, e.g. `755`.
    pub mode: String,
    pub target: String,
}

/// A download job as the engine assembles it.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub path: String,
    pub headers: Vec<String>,
    pub auth: Option<HttpAuth>,
    pub overwrite: bool,
    pub permissions: Vec<PermissionAssignment>,
    /// Extract the archive into this directory after download.
    pub extract_to: Option<String>,
    /// Remove the archive file after successful extraction.
    pub remove_archive: bool,
}

/// Download capability consumed by the engine.
#[async_trait]
pub trait DownloadCapability: Send + Sync {
    async fn download(&self, request: DownloadRequest) -> Result<(), CapabilityError>;
}

/// reqwest-backed downloader with tar.gz extraction.
pub struct Downloader {
    client: reqwest::Client,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_to_file(&self, request: &DownloadRequest) -> Result<(), CapabilityError> {
        let mut builder = self.client.get(&request.url);
        for header in &request.headers {
            if let Some((name, value)) = header.split_once(':') {
                builder = builder.header(name.trim(), value.trim());
            }
        }
        match &request.auth {
            Some(HttpAuth::Bearer(token)) => builder = builder.bearer_auth(token),
            Some(HttpAuth::Basic(credentials)) => {
                let (user, password) = credentials
                    .split_once(':')
                    .map(|(u, p)| (u.to_string(), Some(p.to_string())))
                    .unwrap_or((credentials.clone(), None));
                builder = builder.basic_auth(user, password);
            }
            Some(HttpAuth::Token(value)) => {
                builder = builder.header(reqwest::header::AUTHORIZATION, value);
            }
            None => {}
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CapabilityError::Download(format!("requesting {}: {e}", request.url)))?;
        if !response.status().is_success() {
            return Err(CapabilityError::Download(format!(
                "{} returned status {}",
                request.url,
                response.status().as_u16()
            )));
        }

        if let Some(parent) = Path::new(&request.path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CapabilityError::Download(format!("creating {}: {e}", parent.display()))
                })?;
            }
        }

        let mut file = tokio::fs::File::create(&request.path)
            .await
            .map_err(|e| CapabilityError::Download(format!("creating {}: {e}", request.path)))?;
        let mut stream = response;
        while let Some(chunk) = stream
            .chunk()
            .await
            .map_err(|e| CapabilityError::Download(format!("reading body: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| CapabilityError::Download(format!("writing {}: {e}", request.path)))?;
        }
        file.flush()
            .await
            .map_err(|e| CapabilityError::Download(format!("writing {}: {e}", request.path)))?;
        Ok(())
    }
}

#[async_trait]
impl DownloadCapability for Downloader {
    async fn download(&self, request: DownloadRequest) -> Result<(), CapabilityError> {
        if !request.overwrite && Path::new(&request.path).exists() {
            return Err(CapabilityError::Download(format!(
                "target `{}` already exists (use `allow overwrite`)",
                request.path
            )));
        }

        self.fetch_to_file(&request).await?;
        debug!(url = %request.url, path = %request.path, "downloaded");

        if let Some(extract_to) = &request.extract_to {
            extract_archive(&request.path, extract_to)?;
            if request.remove_archive {
                tokio::fs::remove_file(&request.path).await.map_err(|e| {
                    CapabilityError::Download(format!("removing {}: {e}", request.path))
                })?;
            }
        }

        for assignment in &request.permissions {
            apply_permission(assignment)?;
        }
        Ok(())
    }
}

/// Extract `.tar.gz`/`.tgz` archives; other extensions are rejected so
/// the failure is explicit rather than a silent copy.
fn extract_archive(archive: &str, into: &str) -> Result<(), CapabilityError> {
    let lower = archive.to_lowercase();
    if !(lower.ends_with(".tar.gz") || lower.ends_with(".tgz")) {
        return Err(CapabilityError::Download(format!(
            "cannot extract `{archive}`: only .tar.gz/.tgz archives are supported"
        )));
    }
    std::fs::create_dir_all(into)
        .map_err(|e| CapabilityError::Download(format!("creating {into}: {e}")))?;
    let file = std::fs::File::open(archive)
        .map_err(|e| CapabilityError::Download(format!("opening {archive}: {e}")))?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(into)
        .map_err(|e| CapabilityError::Download(format!("extracting {archive}: {e}")))?;
    Ok(())
}

#[cfg(unix)]
fn apply_permission(assignment: &PermissionAssignment) -> Result<(), CapabilityError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = u32::from_str_radix(&assignment.mode, 8).map_err(|_| {
        CapabilityError::Download(format!("invalid permission mode `{}`", assignment.mode))
    })?;
    std::fs::set_permissions(
        PathBuf::from(&assignment.target),
        std::fs::Permissions::from_mode(mode),
    )
    .map_err(|e| CapabilityError::Download(format!("chmod {}: {e}", assignment.target)))
}

#[cfg(not(unix))]
fn apply_permission(_assignment: &PermissionAssignment) -> Result<(), CapabilityError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overwrite_guard() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("existing.bin");
        std::fs::write(&target, b"old").unwrap();

        let downloader = Downloader::new();
        let err = downloader
            .download(DownloadRequest {
                url: "http://127.0.0.1:1/never".into(),
                path: target.to_str().unwrap().into(),
                headers: vec![],
                auth: None,
                overwrite: false,
                permissions: vec![],
                extract_to: None,
                remove_archive: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(err.classification(), "download");
    }

    #[test]
    fn test_extract_rejects_unknown_extension() {
        let err = extract_archive("artifact.zip", "out").unwrap_err();
        assert!(err.to_string().contains("artifact.zip"));
    }

    #[test]
    fn test_extract_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("bundle.tar.gz");
        let out_dir = dir.path().join("out");

        // Build a tiny tar.gz containing one file.
        let file = std::fs::File::create(&archive_path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let payload = b"inside the archive";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "payload.txt", payload.as_slice())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        extract_archive(archive_path.to_str().unwrap(), out_dir.to_str().unwrap()).unwrap();
        let extracted = std::fs::read_to_string(out_dir.join("payload.txt")).unwrap();
        assert_eq!(extracted, "inside the archive");
    }
}
