use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::sqlite::configure_connection;
use crate::twitch::Video;

const VIDEOS_SCHEMA: &str = include_str!("../sql/videos.sql");

/// Capacity of the update broadcast; slow subscribers lag rather than block
/// the store.
const UPDATE_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open status database {path}: {source}")]
    Open {
        source: rusqlite::Error,
        path: PathBuf,
    },
    #[error("failed to execute statement on status database: {0}")]
    Execute(#[from] rusqlite::Error),
    #[error("status database path not configured")]
    MissingStore,
    #[error("invalid video status: {0}")]
    InvalidStatus(String),
    #[error("video {0} already tracked")]
    AlreadyTracked(String),
    #[error("video {0} not tracked")]
    NotTracked(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lifecycle stage of a video in the archive. Forward-only, except that
/// `Expired` is a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoStatus {
    Queued,
    Missing,
    Expired,
    Archived,
    Downloaded,
    Concatenated,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Queued => "VIDEO_STATUS_QUEUED",
            VideoStatus::Missing => "VIDEO_STATUS_MISSING",
            VideoStatus::Expired => "VIDEO_STATUS_EXPIRED",
            VideoStatus::Archived => "VIDEO_STATUS_ARCHIVED",
            VideoStatus::Downloaded => "VIDEO_STATUS_DOWNLOADED",
            VideoStatus::Concatenated => "VIDEO_STATUS_CONCATENATED",
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VideoStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIDEO_STATUS_QUEUED" => Ok(Self::Queued),
            "VIDEO_STATUS_MISSING" => Ok(Self::Missing),
            "VIDEO_STATUS_EXPIRED" => Ok(Self::Expired),
            "VIDEO_STATUS_ARCHIVED" => Ok(Self::Archived),
            "VIDEO_STATUS_DOWNLOADED" => Ok(Self::Downloaded),
            "VIDEO_STATUS_CONCATENATED" => Ok(Self::Concatenated),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// A tracked video together with its current lifecycle status.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedVideo {
    pub video: Video,
    pub status: VideoStatus,
}

/// Snapshot broadcast on every successful store mutation (and as discovery
/// heartbeats). Fire-and-forget, never persisted.
#[derive(Debug, Clone)]
pub struct UpdateMessage {
    pub video: WatchedVideo,
}

#[derive(Debug, Clone)]
pub struct VideoStatusStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for VideoStatusStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl VideoStatusStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<VideoStatusStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Ok(VideoStatusStore {
            path,
            flags,
            updates,
        })
    }
}

/// Durable record of each known video's archival status, keyed by video id.
/// Every successful mutation broadcasts an [`UpdateMessage`] to all
/// subscribers.
#[derive(Debug, Clone)]
pub struct VideoStatusStore {
    path: PathBuf,
    flags: OpenFlags,
    updates: broadcast::Sender<UpdateMessage>,
}

impl VideoStatusStore {
    pub fn builder() -> VideoStatusStoreBuilder {
        VideoStatusStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        VideoStatusStoreBuilder::new().path(path).build()
    }

    fn open(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(VIDEOS_SCHEMA)?;
        Ok(())
    }

    pub fn list_all(&self) -> StoreResult<Vec<WatchedVideo>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, published_at, duration, status \
             FROM videos_status ORDER BY published_at",
        )?;
        let rows = stmt.query_map([], raw_row)?;
        let mut videos = Vec::new();
        for row in rows {
            let (video, status) = row?;
            videos.push(WatchedVideo {
                video,
                status: status.parse()?,
            });
        }
        Ok(videos)
    }

    pub fn get(&self, video_id: &str) -> StoreResult<Option<WatchedVideo>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, title, description, published_at, duration, status \
                 FROM videos_status WHERE id = ?1",
                params![video_id],
                raw_row,
            )
            .optional()?;
        match row {
            Some((video, status)) => Ok(Some(WatchedVideo {
                video,
                status: status.parse()?,
            })),
            None => Ok(None),
        }
    }

    /// Starts tracking a video. Refuses ids that are already present.
    pub fn insert(&self, video: &Video, status: VideoStatus) -> StoreResult<()> {
        let conn = self.open()?;
        let result = conn.execute(
            "INSERT INTO videos_status (id, title, description, published_at, duration, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                video.id,
                video.title,
                video.description,
                video.published_at,
                video.duration as i64,
                status.as_str()
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(StoreError::AlreadyTracked(video.id.clone()));
            }
            Err(err) => return Err(err.into()),
        }
        self.notify(&WatchedVideo {
            video: video.clone(),
            status,
        });
        Ok(())
    }

    /// Moves a tracked video to a new status. Refuses ids that are absent.
    /// The read-then-write runs inside one transaction.
    pub fn update_status(&self, video_id: &str, status: VideoStatus) -> StoreResult<WatchedVideo> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT id, title, description, published_at, duration, status \
                 FROM videos_status WHERE id = ?1",
                params![video_id],
                raw_row,
            )
            .optional()?;
        let Some((video, _)) = row else {
            return Err(StoreError::NotTracked(video_id.to_string()));
        };
        tx.execute(
            "UPDATE videos_status SET status = ?1 WHERE id = ?2",
            params![status.as_str(), video_id],
        )?;
        tx.commit()?;
        let watched = WatchedVideo { video, status };
        self.notify(&watched);
        Ok(watched)
    }

    /// Sink of status-change notifications; each subscriber gets its own
    /// receiver fed by the same broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateMessage> {
        self.updates.subscribe()
    }

    pub(crate) fn notify(&self, watched: &WatchedVideo) {
        // Nobody listening is fine.
        let _ = self.updates.send(UpdateMessage {
            video: watched.clone(),
        });
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<(Video, String)> {
    Ok((
        Video {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            published_at: row.get("published_at")?,
            duration: row.get::<_, i64>("duration")? as u64,
        },
        row.get("status")?,
    ))
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
