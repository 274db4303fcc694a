use serde::Serialize;
use vodar_core::WatchedVideo;

use crate::{Cli, Result, VodsArgs};

#[derive(Debug, Serialize)]
pub struct VodRow {
    pub id: String,
    pub title: String,
    pub published_at: String,
    pub duration: u64,
    pub status: String,
}

impl From<WatchedVideo> for VodRow {
    fn from(watched: WatchedVideo) -> Self {
        Self {
            id: watched.video.id,
            title: watched.video.title,
            published_at: watched.video.published_at.to_rfc3339(),
            duration: watched.video.duration,
            status: watched.status.as_str().to_string(),
        }
    }
}

pub fn execute(cli: &Cli, args: &VodsArgs) -> Result<Vec<VodRow>> {
    let config = crate::load_config(cli)?;
    let store = crate::open_store(cli, &config)?;
    store.initialize()?;

    let rows = store
        .list_all()?
        .into_iter()
        .filter(|watched| {
            args.status
                .as_deref()
                .map(|filter| status_matches(watched, filter))
                .unwrap_or(true)
        })
        .take(args.limit)
        .map(VodRow::from)
        .collect();
    Ok(rows)
}

/// Accepts the full wire value or the bare suffix, case-insensitively.
fn status_matches(watched: &WatchedVideo, filter: &str) -> bool {
    let wire = watched.status.as_str();
    let suffix = wire.strip_prefix("VIDEO_STATUS_").unwrap_or(wire);
    wire.eq_ignore_ascii_case(filter) || suffix.eq_ignore_ascii_case(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vodar_core::twitch::Video;
    use vodar_core::VideoStatus;

    fn watched(status: VideoStatus) -> WatchedVideo {
        WatchedVideo {
            video: Video {
                id: "1".into(),
                title: "vod".into(),
                description: String::new(),
                published_at: Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap(),
                duration: 1,
            },
            status,
        }
    }

    #[test]
    fn filter_accepts_suffix_and_wire_forms() {
        let row = watched(VideoStatus::Downloaded);
        assert!(status_matches(&row, "downloaded"));
        assert!(status_matches(&row, "VIDEO_STATUS_DOWNLOADED"));
        assert!(!status_matches(&row, "expired"));
    }
}
