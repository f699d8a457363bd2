//! Async streaming download with progress reporting and SHA256 verification.
//!
//! Bytes are written to disk as they arrive and hashed on the fly. The
//! transfer can be aborted at any await point through a
//! [`CancellationToken`], and a transfer that stops delivering bytes for
//! longer than the configured stall window is aborted the same way.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Ways a single transfer can fail.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status code {status} did not indicate success ({url})")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Download cancelled")]
    Cancelled,

    #[error("No data received for {0:?}")]
    Stalled(Duration),
}

/// What a finished download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// Hex-encoded SHA256 of the bytes written.
    pub sha256: String,
    /// Number of bytes written.
    pub size: u64,
}

/// Request for a download operation
#[derive(Debug)]
pub struct DownloadRequest<'a> {
    pub client: &'a Client,
    pub url: &'a str,
    pub dest: &'a Path,
    pub expected_hash: Option<&'a str>,
    pub stall_timeout: Option<Duration>,
    pub cancel: &'a CancellationToken,
}

impl<'a> DownloadRequest<'a> {
    pub fn new(
        client: &'a Client,
        url: &'a str,
        dest: &'a Path,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            url,
            dest,
            expected_hash: None,
            stall_timeout: None,
            cancel,
        }
    }

    /// Verify the body against a SHA-256 hex digest.
    pub fn with_expected_hash(mut self, expected_hash: Option<&'a str>) -> Self {
        self.expected_hash = expected_hash;
        self
    }

    /// Abort when no bytes arrive for `stall_timeout`.
    pub fn with_stall_timeout(mut self, stall_timeout: Option<Duration>) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Execute the download, calling `on_progress(received, total)` after
    /// every chunk.
    ///
    /// On any failure the partially written file is removed.
    pub async fn execute<F>(self, on_progress: F) -> Result<Downloaded, DownloadError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let dest = self.dest;
        let result = download_and_verify(self, on_progress).await;
        if result.is_err() {
            tokio::fs::remove_file(dest).await.ok();
        }
        result
    }
}

async fn download_and_verify<F>(
    req: DownloadRequest<'_>,
    mut on_progress: F,
) -> Result<Downloaded, DownloadError>
where
    F: FnMut(u64, Option<u64>),
{
    let response = tokio::select! {
        biased;
        () = req.cancel.cancelled() => return Err(DownloadError::Cancelled),
        resp = req
            .client
            .get(req.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send() => resp?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status: status.as_u16(),
            url: req.url.to_string(),
        });
    }

    let total = response.content_length();
    let mut stream = response.bytes_stream();
    let mut file = File::create(req.dest).await?;
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;

    loop {
        let chunk = tokio::select! {
            biased;
            () = req.cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = next_chunk(&mut stream, req.stall_timeout) => next?,
        };
        let Some(chunk) = chunk else { break };

        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        received += chunk.len() as u64;
        on_progress(received, total);
    }

    file.flush().await?;
    let actual_hash = hex::encode(hasher.finalize());

    if let Some(expected) = req.expected_hash {
        if !actual_hash.eq_ignore_ascii_case(expected) {
            return Err(DownloadError::HashMismatch {
                expected: expected.to_string(),
                actual: actual_hash,
            });
        }
    }

    Ok(Downloaded {
        sha256: actual_hash,
        size: received,
    })
}

async fn next_chunk<S>(
    stream: &mut S,
    stall_timeout: Option<Duration>,
) -> Result<Option<Bytes>, DownloadError>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let next = match stall_timeout {
        Some(window) => tokio::time::timeout(window, stream.next())
            .await
            .map_err(|_| DownloadError::Stalled(window))?,
        None => stream.next().await,
    };
    Ok(next.transpose()?)
}
