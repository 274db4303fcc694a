use std::path::Path;

use tempfile::TempDir;
use url::Url;

use vodar_core::pipeline::concatenate;
use vodar_core::twitch::{resolve_segments, GqlClient, RenditionVariant, Segment};
use vodar_core::{PipelineError, VodPipeline};

fn file_url(path: &Path) -> String {
    Url::from_file_path(path).expect("absolute path").into()
}

fn pipeline() -> VodPipeline {
    let gql = GqlClient::new().expect("build gql client");
    VodPipeline::new(gql)
        .expect("build pipeline")
        .with_segment_concurrency(2)
}

/// Writes segment fixtures plus a media playlist referencing them, starting
/// at the given media sequence. Returns the playlist path.
fn write_rendition(dir: &Path, media_sequence: u64, bodies: &[&[u8]]) -> std::path::PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let mut manifest = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:{media_sequence}\n"
    );
    for (index, body) in bodies.iter().enumerate() {
        let name = format!("{}.ts", media_sequence + index as u64);
        std::fs::write(dir.join(&name), body).unwrap();
        manifest.push_str("#EXTINF:10.000,\n");
        manifest.push_str(&name);
        manifest.push('\n');
    }
    manifest.push_str("#EXT-X-ENDLIST\n");
    let playlist_path = dir.join("index-dvr.m3u8");
    std::fs::write(&playlist_path, &manifest).unwrap();
    playlist_path
}

#[tokio::test]
async fn download_and_concatenate_round_trip() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source");
    let playlist_path = write_rendition(&source, 4, &[b"alpha", b"", b"gamma"]);

    let manifest = std::fs::read_to_string(&playlist_path).unwrap();
    let segments = resolve_segments(&manifest, &file_url(&playlist_path)).unwrap();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].id, 4);

    let chunk_dir = dir.path().join("chunks");
    let downloaded = pipeline().download_all(segments, &chunk_dir).await.unwrap();
    assert!(downloaded.iter().all(|segment| segment.downloaded));
    assert!(downloaded
        .iter()
        .all(|segment| segment.path.as_ref().is_some_and(|path| path.exists())));

    let output = dir.path().join("assembled.ts");
    concatenate(&downloaded, &output).await.unwrap();
    // The empty middle segment contributes nothing but is not an error.
    assert_eq!(std::fs::read(&output).unwrap(), b"alphagamma");
}

#[tokio::test]
async fn fetch_segments_reads_the_rendition_manifest() {
    let dir = TempDir::new().unwrap();
    let playlist_path = write_rendition(&dir.path().join("source"), 0, &[b"one", b"two"]);

    let variant = RenditionVariant {
        url: file_url(&playlist_path),
        resolution: "1920x1080".into(),
        frame_rate: 60.0,
        chunked: true,
    };
    let segments = pipeline().fetch_segments(&variant).await.unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].id, 1);
}

fn downloaded_segment(dir: &Path, id: u64, body: &[u8]) -> Segment {
    let path = dir.join(format!("chunk_{id}.ts"));
    std::fs::write(&path, body).unwrap();
    Segment {
        id,
        uri: String::new(),
        duration: 10.0,
        path: Some(path),
        downloaded: true,
    }
}

#[tokio::test]
async fn out_of_order_segments_are_sorted_before_assembly() {
    let dir = TempDir::new().unwrap();
    let segments = vec![
        downloaded_segment(dir.path(), 6, b"b"),
        downloaded_segment(dir.path(), 5, b"a"),
        downloaded_segment(dir.path(), 7, b"c"),
    ];
    let output = dir.path().join("out.ts");
    concatenate(&segments, &output).await.unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"abc");
}

#[tokio::test]
async fn sequence_gap_aborts_before_any_output() {
    let dir = TempDir::new().unwrap();
    let segments = vec![
        downloaded_segment(dir.path(), 5, b"a"),
        downloaded_segment(dir.path(), 7, b"c"),
    ];
    let output = dir.path().join("out.ts");
    let error = concatenate(&segments, &output).await.unwrap_err();
    assert!(matches!(
        error,
        PipelineError::SequenceGap {
            expected: 6,
            found: 7
        }
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn undownloaded_segment_aborts_before_any_output() {
    let dir = TempDir::new().unwrap();
    let mut missing = downloaded_segment(dir.path(), 2, b"b");
    missing.downloaded = false;
    let segments = vec![downloaded_segment(dir.path(), 1, b"a"), missing];
    let output = dir.path().join("out.ts");
    let error = concatenate(&segments, &output).await.unwrap_err();
    assert!(matches!(error, PipelineError::MissingChunk(2)));
    assert!(!output.exists());
}

#[tokio::test]
async fn existing_output_is_never_truncated() {
    let dir = TempDir::new().unwrap();
    let segments = vec![downloaded_segment(dir.path(), 1, b"new")];
    let output = dir.path().join("out.ts");
    std::fs::write(&output, b"previous archive").unwrap();

    let error = concatenate(&segments, &output).await.unwrap_err();
    assert!(matches!(error, PipelineError::OutputExists { .. }));
    assert_eq!(std::fs::read(&output).unwrap(), b"previous archive");
}

#[tokio::test]
async fn single_segment_round_trip() {
    let dir = TempDir::new().unwrap();
    let segments = vec![downloaded_segment(dir.path(), 0, b"only")];
    let output = dir.path().join("out.ts");
    concatenate(&segments, &output).await.unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"only");
}
