use std::time::Duration;

use crate::error::{FsError, Result};

pub const DEFAULT_API_ENDPOINT: &str = "https://hub.atonline.com/_special/rest";
/// Below this gap, draining an open stream beats opening a new ranged request.
pub const DEFAULT_CATCH_UP_WINDOW: u64 = 8 * 1024;
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 4 * 1024 * 1024; // 4MiB
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_endpoint: String,
    pub access_token: Option<String>,
    pub catch_up_window: u64,
    pub upload_chunk_size: usize,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            access_token: None,
            catch_up_window: DEFAULT_CATCH_UP_WINDOW,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let mut validation_errors = Vec::new();

        if !(self.api_endpoint.starts_with("http://") || self.api_endpoint.starts_with("https://"))
        {
            validation_errors.push(format!(
                "DRIVEFS_API_ENDPOINT `{}` is not an http(s) url",
                self.api_endpoint
            ));
        }
        if self.upload_chunk_size == 0 {
            validation_errors.push("DRIVEFS_UPLOAD_CHUNK_SIZE must be greater than zero".into());
        }
        if self.request_timeout.is_zero() {
            validation_errors.push("DRIVEFS_REQUEST_TIMEOUT must be greater than zero".into());
        }

        if validation_errors.is_empty() {
            Ok(())
        } else {
            Err(FsError::Config(validation_errors.join("; ")))
        }
    }

    /// Endpoint without trailing slash, ready for path concatenation.
    pub fn endpoint(&self) -> &str {
        self.api_endpoint.trim_end_matches('/')
    }
}
