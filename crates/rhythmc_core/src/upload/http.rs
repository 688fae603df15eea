//! reqwest implementation of [`PackUploader`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};

use crate::config::BackendSettings;
use crate::models::ArchiveBlob;

use super::{PackUploader, UploadError, UploadResult};

pub const AUTH_HEADER: &str = "X-Auth-Token";
pub const HASH_HEADER: &str = "X-PlayerPack-Hash";

const ZIP_MIME: &str = "application/zip";

/// Uploads archives as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    base_url: String,
}

impl HttpUploader {
    /// `timeout` applies to each request; `None` waits indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> UploadResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(UploadError::InvalidUrl {
                url: base_url,
                message: "expected an http:// or https:// URL".to_string(),
            });
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_settings(settings: &BackendSettings) -> UploadResult<Self> {
        let timeout = (settings.request_timeout_secs > 0)
            .then(|| Duration::from_secs(settings.request_timeout_secs));
        Self::new(&settings.base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn archive_part(archive: &ArchiveBlob) -> UploadResult<Part> {
        let part = Part::stream_with_length(Body::from(archive.data.clone()), archive.len() as u64)
            .file_name(archive.file_name.clone())
            .mime_str(ZIP_MIME)?;
        Ok(part)
    }

    /// POST an archive to `/api/texture/<endpoint>` and return the body.
    async fn post_archive(
        &self,
        endpoint: &str,
        access_key: &str,
        archive: &ArchiveBlob,
        part: Option<u32>,
        hash: Option<&str>,
    ) -> UploadResult<String> {
        let mut form = Form::new().part("file", Self::archive_part(archive)?);
        if let Some(part) = part {
            form = form.text("part", part.to_string());
        }

        let url = self.url(&format!("/api/texture/{}", endpoint));
        let mut request = self
            .client
            .post(&url)
            .header(AUTH_HEADER, access_key)
            .multipart(form);
        if let Some(hash) = hash {
            request = request.header(HASH_HEADER, hash);
        }

        tracing::debug!(
            "POST {} ({}, {} bytes, md5 {})",
            url,
            archive.file_name,
            archive.len(),
            archive.md5
        );

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(UploadError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl PackUploader for HttpUploader {
    async fn verify(&self, access_key: &str) -> UploadResult<()> {
        if access_key.is_empty() {
            return Err(UploadError::MissingCredential);
        }

        let response = self
            .client
            .get(self.url("/api/verify"))
            .header(AUTH_HEADER, access_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(UploadError::Unauthorized {
                status: status.as_u16(),
            }),
        }
    }

    async fn upload_full(
        &self,
        access_key: &str,
        archive: &ArchiveBlob,
        part_count: u32,
    ) -> UploadResult<String> {
        let part = (part_count > 0).then_some(part_count);
        let body = self
            .post_archive("player", access_key, archive, part, None)
            .await?;

        let hash = body.trim();
        if hash.is_empty() {
            return Err(UploadError::EmptyHash);
        }
        Ok(hash.to_string())
    }

    async fn upload_charter(
        &self,
        access_key: &str,
        archive: &ArchiveBlob,
        part: u32,
        hash: &str,
    ) -> UploadResult<()> {
        self.post_archive("charter", access_key, archive, Some(part), Some(hash))
            .await?;
        Ok(())
    }
}
