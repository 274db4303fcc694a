use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::pipeline::sha256_file;
use crate::twitch::Video;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("archive rejected video: {0}")]
    Rejected(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Destination for finished artifacts. The real object-storage uploader
/// lives outside this crate; the watchdog only consumes this contract.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn save(&self, video: &Video, file_path: &Path) -> ArchiveResult<()>;
}

/// Filesystem stand-in: places the artifact under a deterministic
/// `<title>_<id>.ts` name next to a JSON metadata sidecar.
#[derive(Debug, Clone)]
pub struct LocalArchiveStore {
    root: PathBuf,
}

impl LocalArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_name(video: &Video) -> String {
        let title: String = video
            .title
            .chars()
            .map(|ch| if matches!(ch, '/' | '\\') { '_' } else { ch })
            .collect();
        format!("{}_{}", title, video.id)
    }
}

#[async_trait]
impl ArchiveStore for LocalArchiveStore {
    async fn save(&self, video: &Video, file_path: &Path) -> ArchiveResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ArchiveError::Io {
                path: self.root.clone(),
                source,
            })?;

        let object = Self::object_name(video);
        let destination = self.root.join(format!("{object}.ts"));
        fs::copy(file_path, &destination)
            .await
            .map_err(|source| ArchiveError::Io {
                path: destination.clone(),
                source,
            })?;

        let checksum = sha256_file(&destination)
            .await
            .map_err(|source| ArchiveError::Io {
                path: destination.clone(),
                source,
            })?;
        let metadata = serde_json::json!({
            "id": video.id,
            "title": video.title,
            "description": video.description,
            "duration": video.duration,
            "publish_date": video.published_at.to_rfc3339(),
            "sha256": checksum,
        });
        let sidecar = self.root.join(format!("{object}.json"));
        let body = serde_json::to_vec_pretty(&metadata)
            .map_err(|err| ArchiveError::Rejected(err.to_string()))?;
        fs::write(&sidecar, body)
            .await
            .map_err(|source| ArchiveError::Io {
                path: sidecar.clone(),
                source,
            })?;

        info!(video = %video.id, destination = %destination.display(), "video stored in archive");
        Ok(())
    }
}
