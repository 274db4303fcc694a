pub mod archive;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod sqlite;
pub mod store;
pub mod twitch;
pub mod watchdog;

pub use archive::{ArchiveError, ArchiveResult, ArchiveStore, LocalArchiveStore};
pub use config::{
    load_vodar_config, ChannelSection, NetworkSection, PathsSection, VodarConfig, WatchdogSection,
};
pub use error::{ConfigError, Result};
pub use pipeline::{PipelineError, PipelineResult, VodPipeline};
pub use queue::DownloadQueue;
pub use store::{
    StoreError, StoreResult, UpdateMessage, VideoStatus, VideoStatusStore, VideoStatusStoreBuilder,
    WatchedVideo,
};
pub use twitch::{GqlClient, PlaybackAccessToken, TwitchError, TwitchResult, Video, VodHandle};
pub use watchdog::{
    VideoSource, VodFetcher, Watchdog, WatchdogConfig, WatchdogError, WatchdogResult,
};
