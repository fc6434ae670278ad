use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::{AccessMode, FileHandle, Whence};
use crate::client::DriveClient;
use crate::error::{FsError, Result};
use crate::node::{NodeMeta, RemoteNode};
use crate::transport::BodyReader;
use crate::upload::UploadSession;

/// An open response body and how far into the object it has been consumed.
struct ActiveStream {
    body: BodyReader,
    pos: i64,
}

/// File handle over a remote object.
///
/// Reads are served from ranged GET requests, keeping the last response open
/// so sequential reads cost no extra round-trip. Writes feed an upload session
/// that is finalized exactly once, by [`FileHandle::stat`] or
/// [`FileHandle::close`], whichever comes first.
pub struct RemoteFile {
    client: DriveClient,
    mode: AccessMode,
    pos: i64,
    node: Option<Weak<dyn RemoteNode>>,
    // only set for files that do not exist remotely yet
    parent: Option<Weak<dyn RemoteNode>>,
    name: String,
    upload: Option<Box<dyn UploadSession>>,
    stream: Option<ActiveStream>,
}

impl RemoteFile {
    /// Open an existing object.
    pub fn open(client: DriveClient, node: Arc<dyn RemoteNode>, mode: AccessMode) -> Self {
        let name = node.meta().name;
        Self {
            client,
            mode,
            pos: 0,
            node: Some(Arc::downgrade(&node)),
            parent: None,
            name,
            upload: None,
            stream: None,
        }
    }

    /// Prepare a new object `name` under `parent`; it appears in the tree once
    /// the first upload is finalized.
    pub fn create(
        client: DriveClient,
        parent: Arc<dyn RemoteNode>,
        name: impl Into<String>,
        mode: AccessMode,
    ) -> Self {
        Self {
            client,
            mode,
            pos: 0,
            node: None,
            parent: Some(Arc::downgrade(&parent)),
            name: name.into(),
            upload: None,
            stream: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn position(&self) -> i64 {
        self.pos
    }

    pub fn has_pending_upload(&self) -> bool {
        self.upload.is_some()
    }

    pub fn has_active_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// The node this handle is bound to, if it is still part of the tree.
    pub fn node(&self) -> Option<Arc<dyn RemoteNode>> {
        self.node.as_ref().and_then(Weak::upgrade)
    }

    fn bound_node(&self) -> Result<Arc<dyn RemoteNode>> {
        self.node()
            .ok_or_else(|| FsError::NotFound(format!("remote node for {}", self.name)))
    }

    fn parent_node(&self) -> Result<Arc<dyn RemoteNode>> {
        self.parent
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| FsError::NotFound(format!("parent folder of {}", self.name)))
    }

    fn release_stream(&mut self, reason: &str) {
        if let Some(stream) = self.stream.take() {
            debug!(file = %self.name, stream_pos = stream.pos, reason, "releasing response stream");
        }
    }

    /// Try to serve a read from the open stream. `None` means the stream could
    /// not serve `self.pos` and has been released.
    async fn read_from_stream(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        // Taken out so that every early return drops (and closes) it.
        let Some(mut stream) = self.stream.take() else {
            return Ok(None);
        };

        let gap = self.pos - stream.pos;
        if gap > 0 && (gap as u64) < self.client.config.catch_up_window {
            debug!(file = %self.name, gap, "draining stream to catch up");
            let drained = tokio::io::copy(
                &mut (&mut stream.body).take(gap as u64),
                &mut tokio::io::sink(),
            )
            .await?;
            stream.pos += drained as i64;
        }

        if stream.pos != self.pos {
            debug!(
                file = %self.name,
                stream_pos = stream.pos,
                pos = self.pos,
                "stream cannot serve position, releasing"
            );
            return Ok(None);
        }

        let n = stream.body.read(buf).await?;
        stream.pos += n as i64;
        self.pos += n as i64;
        self.stream = Some(stream);
        Ok(Some(n))
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.upload.is_none() {
            return Ok(());
        }
        // A new file must still have somewhere to land before it is committed.
        let parent = match self.node {
            None => Some(self.parent_node()?),
            Some(_) => None,
        };
        let Some(upload) = self.upload.as_mut() else {
            return Ok(());
        };
        let meta = upload.complete().await?;
        self.upload = None;

        if let Some(parent) = parent {
            let child = parent.add_child(meta);
            self.node = Some(Arc::downgrade(&child));
            info!(file = %self.name, "created remote file");
        } else if let Some(node) = self.node() {
            node.store(meta);
        } else {
            warn!(file = %self.name, "node left the tree before its upload finished");
        }
        Ok(())
    }

    fn end_offset(&self) -> i64 {
        match self.node() {
            Some(node) => node.size(),
            None => self.upload.as_ref().map_or(0, |upload| upload.len()),
        }
    }
}

#[async_trait]
impl FileHandle for RemoteFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.mode.can_read() {
            return Err(FsError::invalid(format!("{} is not open for reading", self.name)));
        }

        if let Some(n) = self.read_from_stream(buf).await? {
            return Ok(n);
        }

        if self.pos < 0 {
            return Err(FsError::NegativeOffset(self.pos));
        }
        let meta = self.bound_node()?.meta();
        if self.pos >= meta.size {
            return Ok(0);
        }
        let url = meta.url.ok_or_else(|| FsError::NoContent(meta.name.clone()))?;

        let from = (self.pos != 0).then_some(self.pos as u64);
        let body = self.client.transport.get(&url, from).await?;
        let mut stream = ActiveStream {
            body,
            pos: self.pos,
        };

        let n = stream.body.read(buf).await?;
        stream.pos += n as i64;
        self.pos += n as i64;
        self.stream = Some(stream);
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.mode.can_write() {
            return Err(FsError::invalid(format!("{} is not open for writing", self.name)));
        }

        let written = self.upload.as_ref().map_or(0, |upload| upload.len());
        if self.pos != written {
            return Err(FsError::invalid(format!(
                "non-sequential write to {} at {}, upload is at {}",
                self.name, self.pos, written
            )));
        }

        if self.upload.is_none() {
            let session = match self.node() {
                Some(node) => self.client.uploader.overwrite(node.as_ref()).await?,
                None => {
                    let parent = self.parent_node()?;
                    self.client.uploader.create(parent.as_ref(), &self.name).await?
                }
            };
            self.upload = Some(session);
        }
        let Some(upload) = self.upload.as_mut() else {
            return Err(FsError::invalid("upload session unavailable"));
        };

        let n = upload.write(buf).await?;
        self.pos += n as i64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos,
            Whence::End => self.end_offset(),
        };
        self.pos = base
            .checked_add(offset)
            .ok_or_else(|| FsError::invalid(format!("seek overflow: {base} + {offset}")))?;
        Ok(self.pos)
    }

    async fn close(&mut self) -> Result<()> {
        self.pos = 0;
        self.release_stream("close");
        self.finalize().await
    }

    async fn stat(&mut self) -> Result<NodeMeta> {
        self.finalize().await?;
        Ok(self.bound_node()?.meta())
    }

    async fn readdir(&mut self, _count: i32) -> Result<Vec<NodeMeta>> {
        Err(FsError::invalid(format!("{} is not a directory", self.name)))
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        if self.upload.is_some() {
            warn!(file = %self.name, "file handle dropped with an unfinished upload");
        }
    }
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("pos", &self.pos)
            .field("stream_pos", &self.stream.as_ref().map(|s| s.pos))
            .field("pending_upload", &self.upload.is_some())
            .finish_non_exhaustive()
    }
}
