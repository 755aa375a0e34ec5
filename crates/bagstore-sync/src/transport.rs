use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use bagstore_ledger::OperatorEndpoint;
use bagstore_store::BlobWriter;
use bagstore_types::ContentHash;

use crate::error::{SyncError, SyncResult};

/// Transport interface for downloading blobs from peer storage operators.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Stream the bytes the peer serves for `hash` into `writer`, refusing
    /// more than `limit` bytes. Returns the number of bytes written. The
    /// caller checks the digest and decides whether to commit.
    async fn fetch(
        &self,
        peer: &OperatorEndpoint,
        hash: &ContentHash,
        limit: u64,
        writer: &mut dyn BlobWriter,
    ) -> SyncResult<u64>;
}

/// Fetches from a peer's `GET /files/{hash}` endpoint.
#[derive(Clone, Debug)]
pub struct HttpPeerTransport {
    client: Client,
}

impl HttpPeerTransport {
    pub fn new(request_timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn file_url(peer: &OperatorEndpoint, hash: &ContentHash) -> String {
        format!("{}/files/{}", peer.url.trim_end_matches('/'), hash)
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn fetch(
        &self,
        peer: &OperatorEndpoint,
        hash: &ContentHash,
        limit: u64,
        writer: &mut dyn BlobWriter,
    ) -> SyncResult<u64> {
        let url = Self::file_url(peer, hash);
        let mut resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("{url}: {e}")))?;
        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(SyncError::PeerMissing {
                    url: peer.url.clone(),
                    hash: *hash,
                })
            }
            status => return Err(SyncError::Transport(format!("{url} returned {status}"))),
        }

        let oversized = || SyncError::Oversized {
            url: peer.url.clone(),
            limit,
        };
        if resp.content_length().is_some_and(|len| len > limit) {
            return Err(oversized());
        }
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| SyncError::Transport(format!("{url}: {e}")))?
        {
            if writer.written() + chunk.len() as u64 > limit {
                return Err(oversized());
            }
            writer.write(&chunk).await?;
        }
        Ok(writer.written())
    }
}
