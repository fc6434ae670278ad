use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::{
    Config, DEFAULT_API_ENDPOINT, DEFAULT_CATCH_UP_WINDOW, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_UPLOAD_CHUNK_SIZE,
};

#[derive(Parser, Debug)]
#[command(name = "drivefs")]
#[command(version, about = "Random-access file handles over a remote drive", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub remote: RemoteArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs, Debug)]
pub struct RemoteArgs {
    /// Drive REST API endpoint
    #[arg(long, env = "DRIVEFS_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT)]
    pub endpoint: String,

    /// Bearer token issued by the authorization flow
    #[arg(long, env = "DRIVEFS_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Bytes an open stream may be drained to reach a nearby offset
    #[arg(long, env = "DRIVEFS_CATCH_UP_WINDOW", default_value_t = DEFAULT_CATCH_UP_WINDOW)]
    pub catch_up_window: u64,

    /// Bytes buffered before an upload chunk is sent
    #[arg(long, env = "DRIVEFS_UPLOAD_CHUNK_SIZE", default_value_t = DEFAULT_UPLOAD_CHUNK_SIZE)]
    pub upload_chunk_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "DRIVEFS_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Stream a remote object to stdout using ./drivefs cat <URL>")]
    Cat {
        #[arg(value_name = "URL")]
        url: String,

        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Object size; probed with HEAD when omitted
        #[arg(long)]
        size: Option<i64>,
    },
    #[command(about = "Upload a local file using ./drivefs put --parent <ID> --name <NAME> <PATH>")]
    Put {
        /// Id of the remote folder receiving the file
        #[arg(long)]
        parent: String,

        /// Remote file name, defaults to the local file name
        #[arg(long)]
        name: Option<String>,

        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

impl From<&RemoteArgs> for Config {
    fn from(args: &RemoteArgs) -> Self {
        Config {
            api_endpoint: args.endpoint.clone(),
            access_token: args.token.clone(),
            catch_up_window: args.catch_up_window,
            upload_chunk_size: args.upload_chunk_size,
            request_timeout: Duration::from_secs(args.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cat_with_overrides() {
        let args = Args::try_parse_from([
            "drivefs",
            "--endpoint",
            "http://127.0.0.1:9000",
            "--catch-up-window",
            "1024",
            "cat",
            "http://127.0.0.1:9000/f/1",
            "--offset",
            "10",
        ])
        .unwrap();
        let config = Config::from(&args.remote);
        assert_eq!(config.api_endpoint, "http://127.0.0.1:9000");
        assert_eq!(config.catch_up_window, 1024);
        match args.command {
            Commands::Cat { url, offset, size } => {
                assert_eq!(url, "http://127.0.0.1:9000/f/1");
                assert_eq!(offset, 10);
                assert!(size.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_put_requires_parent() {
        assert!(Args::try_parse_from(["drivefs", "put", "a.txt"]).is_err());
    }
}
