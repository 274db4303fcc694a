use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::archive::ArchiveStore;
use crate::pipeline::{PipelineResult, VodPipeline};
use crate::queue::DownloadQueue;
use crate::store::{StoreError, UpdateMessage, VideoStatus, VideoStatusStore, WatchedVideo};
use crate::twitch::{GqlClient, TwitchError, TwitchResult, Video};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("watchdog already running")]
    AlreadyRunning,
    #[error("watchdog not running")]
    NotRunning,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("twitch api error: {0}")]
    Api(#[from] TwitchError),
}

pub type WatchdogResult<T> = Result<T, WatchdogError>;

/// Where the discovery loop gets a channel's current video list.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn channel_videos(&self, login: &str) -> TwitchResult<Vec<Video>>;
}

#[async_trait]
impl VideoSource for GqlClient {
    async fn channel_videos(&self, login: &str) -> TwitchResult<Vec<Video>> {
        self.fetch_channel_videos(login).await
    }
}

/// What the dispatch loop runs for each dequeued video.
#[async_trait]
pub trait VodFetcher: Send + Sync {
    async fn fetch(&self, video: &Video, work_dir: &Path) -> PipelineResult<PathBuf>;
}

#[async_trait]
impl VodFetcher for VodPipeline {
    async fn fetch(&self, video: &Video, work_dir: &Path) -> PipelineResult<PathBuf> {
        self.download(video, work_dir).await
    }
}

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub channel: String,
    pub poll_interval: Duration,
    pub work_dir: PathBuf,
}

impl WatchdogConfig {
    pub fn new(channel: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            channel: channel.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            work_dir: work_dir.into(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Long-running supervisor: the discovery loop feeds newly-published videos
/// into the queue, the dispatch loop drains it through the download
/// pipeline. Both run until [`Watchdog::stop`].
pub struct Watchdog {
    config: WatchdogConfig,
    store: VideoStatusStore,
    source: Arc<dyn VideoSource>,
    fetcher: Arc<dyn VodFetcher>,
    archive: Option<Arc<dyn ArchiveStore>>,
    queue: Arc<DownloadQueue>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Watchdog {
    pub fn new(
        config: WatchdogConfig,
        store: VideoStatusStore,
        source: Arc<dyn VideoSource>,
        fetcher: Arc<dyn VodFetcher>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            store,
            source,
            fetcher,
            archive: None,
            queue: Arc::new(DownloadQueue::new()),
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn with_archive_store(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn queue(&self) -> Arc<DownloadQueue> {
        Arc::clone(&self.queue)
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Sink of status-change notifications; every caller gets an
    /// independent receiver on the store's broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateMessage> {
        self.store.subscribe()
    }

    /// Opens the store and starts the discovery and dispatch loops.
    pub fn run(&mut self) -> WatchdogResult<()> {
        if self.is_running() {
            return Err(WatchdogError::AlreadyRunning);
        }
        self.store.initialize()?;
        let _ = self.shutdown.send(false);

        let discovery = DiscoveryLoop {
            channel: self.config.channel.clone(),
            poll_interval: self.config.poll_interval,
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            queue: Arc::clone(&self.queue),
        };
        self.tasks
            .push(tokio::spawn(discovery.run(self.shutdown.subscribe())));

        let dispatch = DispatchLoop {
            work_dir: self.config.work_dir.clone(),
            fetcher: Arc::clone(&self.fetcher),
            archive: self.archive.clone(),
            store: self.store.clone(),
            queue: Arc::clone(&self.queue),
        };
        self.tasks
            .push(tokio::spawn(dispatch.run(self.shutdown.subscribe())));

        info!(channel = %self.config.channel, "watchdog running");
        Ok(())
    }

    /// Signals both loops and waits for them to exit. An in-flight download
    /// completes first; pending queue entries are abandoned.
    pub async fn stop(&mut self) -> WatchdogResult<()> {
        if !self.is_running() {
            return Err(WatchdogError::NotRunning);
        }
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "watchdog loop ended abnormally");
            }
        }
        info!("watchdog stopped");
        Ok(())
    }
}

struct DiscoveryLoop {
    channel: String,
    poll_interval: Duration,
    source: Arc<dyn VideoSource>,
    store: VideoStatusStore,
    queue: Arc<DownloadQueue>,
}

impl DiscoveryLoop {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    info!(channel = %self.channel, "synchronizing channel videos");
                    if let Err(err) = self.sync_videos().await {
                        error!(channel = %self.channel, error = %err, "discovery cycle failed");
                    }
                }
            }
        }
        debug!("discovery loop exited");
    }

    async fn sync_videos(&self) -> WatchdogResult<()> {
        let vods = self.source.channel_videos(&self.channel).await?;
        debug!(count = vods.len(), channel = %self.channel, "channel videos fetched");

        let known = self.store.list_all()?;
        for vod in vods {
            if let Some(existing) = known.iter().find(|watched| watched.video.id == vod.id) {
                // Heartbeat so late subscribers learn the current state.
                self.store.notify(existing);
                continue;
            }
            if let Err(err) = self.track_new_video(&vod) {
                error!(video = %vod.id, error = %err, "failed to track discovered video");
            }
        }
        Ok(())
    }

    fn track_new_video(&self, video: &Video) -> WatchdogResult<()> {
        self.store.insert(video, VideoStatus::Missing)?;
        self.queue.enqueue(WatchedVideo {
            video: video.clone(),
            status: VideoStatus::Missing,
        });
        self.store.update_status(&video.id, VideoStatus::Queued)?;
        info!(video = %video.id, queued = self.queue.len(), "video added to download queue");
        Ok(())
    }
}

struct DispatchLoop {
    work_dir: PathBuf,
    fetcher: Arc<dyn VodFetcher>,
    archive: Option<Arc<dyn ArchiveStore>>,
    store: VideoStatusStore,
    queue: Arc<DownloadQueue>,
}

impl DispatchLoop {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let entry = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                entry = self.queue.dequeue() => entry,
            };
            self.process(entry).await;
            if *shutdown.borrow() {
                break;
            }
        }
        debug!("dispatch loop exited");
    }

    async fn process(&self, entry: WatchedVideo) {
        let video = entry.video;
        info!(video = %video.id, title = %video.title, "video is being downloaded");
        match self.fetcher.fetch(&video, &self.work_dir).await {
            Ok(artifact) => {
                info!(video = %video.id, artifact = %artifact.display(), "video has been downloaded");
                self.record_status(&video.id, VideoStatus::Downloaded);
                if let Some(archive) = &self.archive {
                    match archive.save(&video, &artifact).await {
                        Ok(()) => self.record_status(&video.id, VideoStatus::Archived),
                        Err(err) => {
                            warn!(video = %video.id, error = %err, "archive store rejected video");
                        }
                    }
                }
            }
            Err(err) => {
                error!(video = %video.id, error = %err, "download pipeline failed");
                self.discard_staging(&video.id).await;
                self.record_status(&video.id, VideoStatus::Expired);
            }
        }
    }

    fn record_status(&self, video_id: &str, status: VideoStatus) {
        if let Err(err) = self.store.update_status(video_id, status) {
            error!(video = %video_id, status = %status, error = %err, "failed to record status");
        }
    }

    async fn discard_staging(&self, video_id: &str) {
        let staging = self.work_dir.join(video_id);
        if let Err(err) = tokio::fs::remove_dir_all(&staging).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %staging.display(), error = %err, "failed to discard staging directory");
            }
        }
    }
}
