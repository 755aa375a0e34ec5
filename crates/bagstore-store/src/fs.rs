//! Filesystem-backed content store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<64 hex chars>   one file per blob, named by its content hash
//! <root>/.temp/<uuid>     in-flight writes
//! ```
//!
//! Writes go to `.temp/` and are renamed into place only after the last byte
//! is flushed and hashed, so a reader never observes a partial blob under a
//! content address. Leftovers in `.temp/` after a crash are removed by
//! [`FsContentStore::open`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use bagstore_crypto::{ContentHasher, StreamingHasher};
use bagstore_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobInfo, BlobWriter, CommittedBlob, ContentStore};

/// Content store rooted at a local directory.
#[derive(Clone, Debug)]
pub struct FsContentStore {
    root: PathBuf,
    temp_dir: PathBuf,
}

impl FsContentStore {
    /// Name of the staging directory inside the root.
    pub const TEMP_DIR: &'static str = ".temp";

    /// Open (or create) a store at `root`, clearing stale staging files.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let temp_dir = root.join(Self::TEMP_DIR);
        fs::create_dir_all(&temp_dir).await?;

        let mut stale = 0usize;
        let mut entries = fs::read_dir(&temp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                stale += 1;
            }
        }
        if stale > 0 {
            warn!(count = stale, "removed stale staging files");
        }

        info!(root = %root.display(), "content store opened");
        Ok(Self { root, temp_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final on-disk location of a blob.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>> {
        let temp_path = self.temp_dir.join(Uuid::now_v7().to_string());
        let file = File::create(&temp_path).await?;
        Ok(Box::new(FsBlobWriter {
            file: Some(BufWriter::new(file)),
            temp_path,
            root: self.root.clone(),
            hasher: ContentHasher::streaming(),
        }))
    }

    async fn get(&self, hash: &ContentHash) -> StoreResult<Option<Bytes>> {
        match fs::read(self.blob_path(hash)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(fs::try_exists(self.blob_path(hash)).await?)
    }

    async fn delete(&self, hash: &ContentHash) -> StoreResult<bool> {
        match fs::remove_file(self.blob_path(hash)).await {
            Ok(()) => {
                debug!(hash = %hash.short_hex(), "blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_if_older(&self, hash: &ContentHash, cutoff_ms: u64) -> StoreResult<bool> {
        let path = self.blob_path(hash);
        let aside = self.temp_dir.join(format!("prune-{}", Uuid::now_v7()));
        let deleted = tokio::task::spawn_blocking(move || remove_if_older(&path, &aside, cutoff_ms))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        if deleted {
            debug!(hash = %hash.short_hex(), "blob deleted");
        } else {
            debug!(hash = %hash.short_hex(), cutoff_ms, "blob absent or modified after cutoff, kept");
        }
        Ok(deleted)
    }

    async fn list(&self) -> StoreResult<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(hash) = name.to_str().and_then(|n| ContentHash::from_hex(n).ok()) else {
                debug!(file = ?name, "ignoring non-blob file");
                continue;
            };
            blobs.push(BlobInfo {
                hash,
                size: metadata.len(),
                modified_ms: modified_ms(&metadata),
            });
        }
        blobs.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(blobs)
    }
}

fn modified_ms(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The blob is moved into staging before its age is read. A commit racing
/// with the prune then lands a new file under the final name, which stays.
/// Runs on a blocking thread so a cancelled caller cannot stop it between
/// the move and the restore.
fn remove_if_older(path: &Path, aside: &Path, cutoff_ms: u64) -> std::io::Result<bool> {
    match std::fs::rename(path, aside) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    }
    if modified_ms(&std::fs::metadata(aside)?) > cutoff_ms {
        // Identical bytes by construction, so restoring over a concurrent
        // commit changes nothing.
        std::fs::rename(aside, path)?;
        return Ok(false);
    }
    std::fs::remove_file(aside)?;
    Ok(true)
}

struct FsBlobWriter {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    root: PathBuf,
    hasher: StreamingHasher,
}

#[async_trait]
impl BlobWriter for FsBlobWriter {
    async fn write(&mut self, chunk: &[u8]) -> StoreResult<()> {
        let file = self.file.as_mut().ok_or(StoreError::WriterClosed)?;
        file.write_all(chunk).await?;
        self.hasher.update(chunk);
        Ok(())
    }

    fn written(&self) -> u64 {
        self.hasher.len()
    }

    fn digest(&self) -> ContentHash {
        self.hasher.finalize().0
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<CommittedBlob> {
        let mut file = self.file.take().ok_or(StoreError::WriterClosed)?;
        file.flush().await?;
        file.get_ref().sync_all().await?;
        drop(file);

        let (hash, size) = self.hasher.finalize();
        let final_path = self.root.join(hash.to_hex());
        if let Err(e) = fs::rename(&self.temp_path, &final_path).await {
            // Some platforms refuse to rename over an existing file; the
            // existing blob has the same bytes by construction.
            if fs::try_exists(&final_path).await.unwrap_or(false) {
                let _ = fs::remove_file(&self.temp_path).await;
            } else {
                let _ = fs::remove_file(&self.temp_path).await;
                return Err(e.into());
            }
        }

        debug!(hash = %hash.short_hex(), size, "blob committed");
        Ok(CommittedBlob { hash, size })
    }

    async fn abort(mut self: Box<Self>) -> StoreResult<()> {
        drop(self.file.take());
        match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FsBlobWriter {
    // A writer dropped mid-stream (client gone, sync task cancelled) never
    // committed or aborted; its staging file goes with it.
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
