//! drivefs: seekable file handles over objects that live behind an HTTP API.
//!
//! [`RemoteFile`] turns ranged GET requests and a sequential upload session
//! into read/write/seek/stat semantics for a file-serving protocol layer.
//! The metadata tree, the transport and the uploader are collaborators
//! reached through the traits in [`node`], [`transport`] and [`upload`].

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod node;
pub mod transport;
pub mod upload;
pub mod utils;

pub use client::DriveClient;
pub use config::Config;
pub use error::{FsError, Result};
pub use file::{AccessMode, FileHandle, RemoteFile, Whence};
pub use node::{DriveNode, NodeMeta, RemoteNode};
