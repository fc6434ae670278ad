use std::pin::Pin;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::client::RequestBuilderExt;
use crate::error::{FsError, Result};

/// A streaming response body. Dropping it closes the underlying connection.
pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Value of a `Range` header asking for everything from `offset` on.
pub fn range_from(offset: u64) -> String {
    format!("bytes={offset}-")
}

#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// GET `url`; with `Some(offset)` the body starts at that byte.
    async fn get(&self, url: &str, from: Option<u64>) -> Result<BodyReader>;
}

pub struct HttpTransport {
    client: Client,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(client: Client, token: Option<String>) -> Self {
        Self { client, token }
    }

    /// Size of the object behind `url` according to a HEAD request.
    pub async fn content_length(&self, url: &str) -> Result<u64> {
        let res = self
            .client
            .head(url)
            .authorized(self.token.as_deref())
            .send_checked()
            .await?;
        res.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| FsError::InvalidResponse(format!("content length not found for {url}")))
    }
}

#[async_trait]
impl RangeTransport for HttpTransport {
    async fn get(&self, url: &str, from: Option<u64>) -> Result<BodyReader> {
        let mut req = self.client.get(url).authorized(self.token.as_deref());
        if let Some(offset) = from {
            req = req.header(RANGE, range_from(offset));
        }
        debug!(url, ?from, "issuing range request");

        let res = req.send_checked().await?;
        let status = res.status();

        let stream = res.bytes_stream().map_err(std::io::Error::other);
        let mut reader: BodyReader = Box::pin(StreamReader::new(stream));

        // Some servers ignore Range and answer with the whole object.
        if let Some(offset) = from {
            if status != StatusCode::PARTIAL_CONTENT && offset > 0 {
                warn!(url, offset, %status, "range ignored by server, skipping prefix");
                let skipped = tokio::io::copy(&mut (&mut reader).take(offset), &mut tokio::io::sink())
                    .await?;
                if skipped < offset {
                    return Err(FsError::InvalidResponse(format!(
                        "body of {url} ended at {skipped}, before offset {offset}"
                    )));
                }
            }
        }
        Ok(reader)
    }
}
