mod assembler;

pub use assembler::concatenate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

use crate::twitch::{
    playlist, usher, GqlClient, PlaylistError, RenditionVariant, Segment, TwitchError, Video,
    VodHandle,
};

const USER_AGENT: &str = "vodar/1.0";
const DEFAULT_SEGMENT_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("twitch api error: {0}")]
    Api(#[from] TwitchError),
    #[error("manifest error: {0}")]
    Manifest(#[from] PlaylistError),
    #[error("no playable rendition for video {0}")]
    NoPlayableRendition(String),
    #[error("rendition of video {0} has no segments")]
    EmptyRendition(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("segment sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
    #[error("segment {0} has not been downloaded")]
    MissingChunk(u64),
    #[error("output {path} already exists")]
    OutputExists { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        PipelineError::Network(error.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Acquisition pipeline for one video: rendition resolution, segment
/// download and assembly. Holds the shared HTTP client used for manifests
/// and segment transfers.
#[derive(Clone)]
pub struct VodPipeline {
    gql: GqlClient,
    http: Client,
    segment_concurrency: usize,
}

impl VodPipeline {
    pub fn new(gql: GqlClient) -> PipelineResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| PipelineError::Network(err.to_string()))?;
        Ok(Self {
            gql,
            http,
            segment_concurrency: DEFAULT_SEGMENT_CONCURRENCY,
        })
    }

    /// Caps concurrent segment transfers for one video.
    pub fn with_segment_concurrency(mut self, cap: usize) -> Self {
        self.segment_concurrency = cap.max(1);
        self
    }

    /// Resolves the best playable rendition: reuse or fetch the playback
    /// token, request the CDN master manifest, pick the largest variant.
    pub async fn resolve_rendition(
        &self,
        handle: &mut VodHandle,
    ) -> PipelineResult<RenditionVariant> {
        let token = handle.ensure_token(&self.gql).await?;
        let manifest = usher::fetch_master_manifest(&self.http, &handle.video.id, &token).await?;
        let variant = playlist::resolve_best_rendition(&manifest)?;
        variant.ok_or_else(|| PipelineError::NoPlayableRendition(handle.video.id.clone()))
    }

    pub async fn fetch_segments(
        &self,
        variant: &RenditionVariant,
    ) -> PipelineResult<Vec<Segment>> {
        let contents = self.fetch_text(&variant.url).await?;
        Ok(playlist::resolve_segments(&contents, &variant.url)?)
    }

    /// Downloads every segment into `chunk_dir`, at most
    /// `segment_concurrency` transfers in flight. A zero-byte body is a
    /// warning (some platform segments are legitimately empty filler); any
    /// transport error fails the whole video.
    pub async fn download_all(
        &self,
        segments: Vec<Segment>,
        chunk_dir: &Path,
    ) -> PipelineResult<Vec<Segment>> {
        fs::create_dir_all(chunk_dir)
            .await
            .map_err(|source| PipelineError::Io {
                path: chunk_dir.to_path_buf(),
                source,
            })?;
        futures::stream::iter(
            segments
                .into_iter()
                .map(|segment| self.download_segment(segment, chunk_dir)),
        )
        .buffered(self.segment_concurrency)
        .try_collect()
        .await
    }

    async fn download_segment(
        &self,
        mut segment: Segment,
        chunk_dir: &Path,
    ) -> PipelineResult<Segment> {
        let path = chunk_dir.join(format!("chunk_{}.ts", segment.id));
        let written = self.fetch_to_file(&segment.uri, &path).await?;
        if written == 0 {
            warn!(segment = segment.id, uri = %segment.uri, "segment body was empty");
        }
        segment.path = Some(path);
        segment.downloaded = true;
        Ok(segment)
    }

    /// Full acquisition for one video into `work_dir`: resolve rendition,
    /// enumerate segments, download, assemble `<id>.ts`. The per-video
    /// chunk directory is removed once the artifact exists.
    pub async fn download(&self, video: &Video, work_dir: &Path) -> PipelineResult<PathBuf> {
        let mut handle = VodHandle::new(video.clone());
        let variant = self.resolve_rendition(&mut handle).await?;
        info!(
            video = %video.id,
            resolution = %variant.resolution,
            frame_rate = variant.frame_rate,
            chunked = variant.chunked,
            "rendition selected"
        );

        let segments = self.fetch_segments(&variant).await?;
        if segments.is_empty() {
            return Err(PipelineError::EmptyRendition(video.id.clone()));
        }

        let chunk_dir = work_dir.join(&video.id);
        let downloaded = self.download_all(segments, &chunk_dir).await?;
        info!(video = %video.id, segments = downloaded.len(), "all segments downloaded");

        let output = work_dir.join(format!("{}.ts", video.id));
        concatenate(&downloaded, &output).await?;
        let checksum = sha256_file(&output).await.map_err(|source| PipelineError::Io {
            path: output.clone(),
            source,
        })?;
        info!(video = %video.id, artifact = %output.display(), checksum = %checksum, "video assembled");

        self.cleanup_chunks(&chunk_dir).await;
        Ok(output)
    }

    async fn fetch_text(&self, url: &str) -> PipelineResult<String> {
        if let Ok(parsed) = Url::parse(url) {
            if parsed.scheme() == "file" {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| PipelineError::Network("invalid file url".into()))?;
                return fs::read_to_string(&path)
                    .await
                    .map_err(|source| PipelineError::Io { path, source });
            }
        }
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_to_file(&self, url: &str, path: &Path) -> PipelineResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| PipelineError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        if let Ok(parsed) = Url::parse(url) {
            if parsed.scheme() == "file" {
                let source_path = parsed
                    .to_file_path()
                    .map_err(|_| PipelineError::Network("invalid file url".into()))?;
                return fs::copy(&source_path, path)
                    .await
                    .map_err(|source| PipelineError::Io {
                        path: path.to_path_buf(),
                        source,
                    });
            }
        }
        let response = self.http.get(url).send().await?.error_for_status()?;
        let mut stream = response.bytes_stream();
        let mut file = fs::File::create(path)
            .await
            .map_err(|source| PipelineError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let data = chunk?;
            written += data.len() as u64;
            file.write_all(&data)
                .await
                .map_err(|source| PipelineError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        file.flush().await.map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(written)
    }

    async fn cleanup_chunks(&self, chunk_dir: &Path) {
        if let Err(err) = fs::remove_dir_all(chunk_dir).await {
            warn!(path = %chunk_dir.display(), error = %err, "failed to clean chunk directory");
        }
    }
}

pub(crate) async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}
