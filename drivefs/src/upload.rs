//! Sequential upload sessions.
//!
//! The HTTP flavour speaks a chunked upload protocol modelled on the OCI
//! distribution API: `POST` opens a session and answers with its `Location`,
//! each `PATCH` appends a chunk described by `Content-Range`, and the final
//! `PUT` carries the tail and returns the resulting metadata.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, LOCATION};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, info};

use crate::client::RequestBuilderExt;
use crate::config::Config;
use crate::error::{FsError, Result};
use crate::node::{NodeMeta, RemoteNode};

#[async_trait]
pub trait UploadSession: Send {
    /// Append `data` after everything written so far.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Bytes accepted so far.
    fn len(&self) -> i64;

    /// Finish the upload and return the metadata of the stored object.
    async fn complete(&mut self) -> Result<NodeMeta>;
}

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Start replacing the content of an existing object.
    async fn overwrite(&self, node: &dyn RemoteNode) -> Result<Box<dyn UploadSession>>;

    /// Start a new object called `name` under `parent`.
    async fn create(&self, parent: &dyn RemoteNode, name: &str)
    -> Result<Box<dyn UploadSession>>;
}

#[derive(Serialize)]
struct OpenUploadRequest<'a> {
    filename: &'a str,
    overwrite: bool,
}

pub struct HttpUploader {
    client: Client,
    config: Arc<Config>,
}

impl HttpUploader {
    pub fn new(client: Client, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    async fn open(&self, target_id: &str, filename: &str, overwrite: bool) -> Result<Box<dyn UploadSession>> {
        let url = format!("{}/Drive/Item/{}:upload", self.config.endpoint(), target_id);
        let res = self
            .client
            .post(&url)
            .authorized(self.config.access_token.as_deref())
            .json(&OpenUploadRequest {
                filename,
                overwrite,
            })
            .send_checked()
            .await?;

        let location = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FsError::InvalidResponse(format!("no upload location from {url}")))?;
        let session_url = res
            .url()
            .join(location)
            .map_err(|e| FsError::InvalidResponse(format!("bad upload location {location}: {e}")))?;

        info!(%session_url, filename, overwrite, "opened upload session");
        Ok(Box::new(HttpUploadSession {
            client: self.client.clone(),
            token: self.config.access_token.clone(),
            url: session_url,
            chunk_size: self.config.upload_chunk_size,
            buf: Vec::new(),
            committed: 0,
            finished: false,
        }))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn overwrite(&self, node: &dyn RemoteNode) -> Result<Box<dyn UploadSession>> {
        let meta = node.meta();
        self.open(&meta.id, &meta.name, true).await
    }

    async fn create(
        &self,
        parent: &dyn RemoteNode,
        name: &str,
    ) -> Result<Box<dyn UploadSession>> {
        let parent_id = parent.meta().id;
        self.open(&parent_id, name, false).await
    }
}

pub struct HttpUploadSession {
    client: Client,
    token: Option<String>,
    url: Url,
    chunk_size: usize,
    buf: Vec<u8>,
    // bytes the server acknowledged
    committed: u64,
    finished: bool,
}

impl HttpUploadSession {
    fn content_range(&self) -> String {
        let end = self.committed + self.buf.len() as u64 - 1;
        format!("{}-{}", self.committed, end)
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        debug!(url = %self.url, range = %self.content_range(), "sending upload chunk");
        self.client
            .patch(self.url.clone())
            .authorized(self.token.as_deref())
            .header(CONTENT_RANGE, self.content_range())
            .body(self.buf.clone())
            .send_checked()
            .await?;
        self.committed += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }
}

#[async_trait]
impl UploadSession for HttpUploadSession {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.finished {
            return Err(FsError::invalid("upload already completed"));
        }
        let before = self.buf.len();
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.chunk_size {
            if let Err(err) = self.flush().await {
                self.buf.truncate(before);
                return Err(err);
            }
        }
        Ok(data.len())
    }

    fn len(&self) -> i64 {
        (self.committed + self.buf.len() as u64) as i64
    }

    async fn complete(&mut self) -> Result<NodeMeta> {
        if self.finished {
            return Err(FsError::invalid("upload already completed"));
        }
        let mut req = self
            .client
            .put(self.url.clone())
            .authorized(self.token.as_deref());
        if !self.buf.is_empty() {
            req = req
                .header(CONTENT_RANGE, self.content_range())
                .body(self.buf.clone());
        }
        let meta: NodeMeta = req.send_and_json().await?;

        self.committed += self.buf.len() as u64;
        self.buf.clear();
        self.finished = true;
        info!(url = %self.url, id = %meta.id, size = meta.size, "upload completed");
        Ok(meta)
    }
}
