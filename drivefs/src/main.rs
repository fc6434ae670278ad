use std::path::Path;

use anyhow::Context;
use clap::Parser;
use drivefs::client::build_http_client;
use drivefs::transport::HttpTransport;
use drivefs::utils::cli::{Args, Commands};
use drivefs::{AccessMode, Config, DriveClient, DriveNode, FileHandle, NodeMeta, RemoteFile, Whence};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

const COPY_BUF_SIZE: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // stdout carries file content, keep logs on stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from(&args.remote);
    config.validate()?;

    match args.command {
        Commands::Cat { url, offset, size } => cat(config, &url, offset, size).await,
        Commands::Put { parent, name, path } => put(config, &parent, name, &path).await,
    }
}

async fn cat(config: Config, url: &str, offset: i64, size: Option<i64>) -> anyhow::Result<()> {
    let size = match size {
        Some(size) => size,
        None => {
            let probe = HttpTransport::new(build_http_client(&config)?, config.access_token.clone());
            probe.content_length(url).await? as i64
        }
    };
    let name = url.rsplit('/').next().unwrap_or(url);
    let node = DriveNode::root(NodeMeta::file(url, name, size).with_url(url));

    let client = DriveClient::connect(config)?;
    let mut file = RemoteFile::open(client, node.clone(), AccessMode::ReadOnly);
    file.seek(offset, Whence::Start)?;

    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n]).await?;
    }
    stdout.flush().await?;
    file.close().await?;
    Ok(())
}

async fn put(config: Config, parent_id: &str, name: Option<String>, path: &Path) -> anyhow::Result<()> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a remote name from {}", path.display()))?,
    };
    let mut local = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let parent = DriveNode::root(NodeMeta::dir(parent_id, ""));
    let client = DriveClient::connect(config)?;
    let mut file = RemoteFile::create(client, parent.clone(), name, AccessMode::WriteOnly);

    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = local.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let mut chunk = &buf[..n];
        while !chunk.is_empty() {
            let written = file.write(chunk).await?;
            chunk = &chunk[written..];
        }
    }

    let meta = file.stat().await.context("Failed to finalize upload")?;
    file.close().await?;
    tracing::info!(name = %meta.name, size = meta.size, "uploaded");
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}
