//! File handle abstraction consumed by a file-serving protocol layer.

mod remote;

pub use remote::RemoteFile;

use async_trait::async_trait;

use crate::error::{FsError, Result};
use crate::node::NodeMeta;

/// Random-access file operations, one call at a time per handle.
#[async_trait]
pub trait FileHandle: Send {
    /// Read at the cursor; `Ok(0)` means end of data.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Move the cursor. Out-of-range results are only rejected by the next read or write.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64>;

    async fn close(&mut self) -> Result<()>;

    async fn stat(&mut self) -> Result<NodeMeta>;

    async fn readdir(&mut self, count: i32) -> Result<Vec<NodeMeta>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    /// Derive the mode from `open(2)` style flags.
    pub fn from_flags(flags: i32) -> Self {
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => AccessMode::WriteOnly,
            libc::O_RDWR => AccessMode::ReadWrite,
            _ => AccessMode::ReadOnly,
        }
    }

    pub fn can_read(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl TryFrom<i32> for Whence {
    type Error = FsError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            libc::SEEK_SET => Ok(Whence::Start),
            libc::SEEK_CUR => Ok(Whence::Current),
            libc::SEEK_END => Ok(Whence::End),
            other => Err(FsError::invalid(format!("unsupported whence {other}"))),
        }
    }
}
