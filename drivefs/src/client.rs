//! Shared HTTP plumbing: one `reqwest::Client` per process, wrapped together
//! with the transport and uploader every file handle needs.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{FsError, Result};
use crate::transport::{HttpTransport, RangeTransport};
use crate::upload::{HttpUploader, Uploader};

pub fn build_http_client(config: &Config) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("drivefs/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[async_trait]
pub trait RequestBuilderExt {
    /// Attach the bearer token, if any.
    fn authorized(self, token: Option<&str>) -> Self;

    /// Send and fail on any non-2xx status.
    async fn send_checked(self) -> Result<Response>;

    async fn send_and_json<U>(self) -> Result<U>
    where
        U: DeserializeOwned;
}

#[async_trait]
impl RequestBuilderExt for RequestBuilder {
    fn authorized(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.bearer_auth(token),
            None => self,
        }
    }

    async fn send_checked(self) -> Result<Response> {
        let res = self.send().await?;
        if !res.status().is_success() {
            return Err(FsError::from_status(res.status(), res.url().as_str()));
        }
        Ok(res)
    }

    async fn send_and_json<U>(self) -> Result<U>
    where
        U: DeserializeOwned,
    {
        let body = self.send_checked().await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Everything a [`crate::RemoteFile`] needs from the outside world.
#[derive(Clone)]
pub struct DriveClient {
    pub config: Arc<Config>,
    pub transport: Arc<dyn RangeTransport>,
    pub uploader: Arc<dyn Uploader>,
}

impl DriveClient {
    pub fn new(
        config: Config,
        transport: Arc<dyn RangeTransport>,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            uploader,
        }
    }

    /// Wire up the reqwest-backed transport and uploader for `config`.
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(&config)?;
        let config = Arc::new(config);
        Ok(Self {
            transport: Arc::new(HttpTransport::new(http.clone(), config.access_token.clone())),
            uploader: Arc::new(HttpUploader::new(http, config.clone())),
            config,
        })
    }
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("endpoint", &self.config.api_endpoint)
            .finish_non_exhaustive()
    }
}
