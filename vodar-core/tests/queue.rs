use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::timeout;

use vodar_core::twitch::Video;
use vodar_core::{DownloadQueue, VideoStatus, WatchedVideo};

fn watched(id: &str) -> WatchedVideo {
    WatchedVideo {
        video: Video {
            id: id.into(),
            title: format!("vod {id}"),
            description: String::new(),
            published_at: Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap(),
            duration: 120,
        },
        status: VideoStatus::Missing,
    }
}

#[tokio::test]
async fn dequeue_preserves_fifo_order() {
    let queue = DownloadQueue::new();
    queue.enqueue(watched("a"));
    queue.enqueue(watched("b"));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.dequeue().await.video.id, "a");
    assert_eq!(queue.dequeue().await.video.id, "b");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn dequeue_blocks_until_an_entry_arrives() {
    let queue = Arc::new(DownloadQueue::new());
    let consumer = Arc::clone(&queue);
    let handle = tokio::spawn(async move { consumer.dequeue().await });

    // Give the consumer a chance to suspend on the empty queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    queue.enqueue(watched("late"));
    let entry = timeout(Duration::from_secs(1), handle)
        .await
        .expect("dequeue should wake after enqueue")
        .expect("consumer task");
    assert_eq!(entry.video.id, "late");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn interleaved_producers_keep_arrival_order() {
    let queue = Arc::new(DownloadQueue::new());
    queue.enqueue(watched("1"));
    let first = queue.dequeue().await;
    queue.enqueue(watched("2"));
    queue.enqueue(watched("3"));
    assert_eq!(first.video.id, "1");
    assert_eq!(queue.dequeue().await.video.id, "2");
    assert_eq!(queue.dequeue().await.video.id, "3");
}
