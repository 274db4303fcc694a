use std::path::Path;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::twitch::Segment;

use super::{PipelineError, PipelineResult};

/// Concatenates downloaded segments into one artifact in ascending
/// sequence-id order. Ids must be strictly consecutive once sorted; a gap
/// aborts before any byte is written. The output file must not already
/// exist, so a prior artifact is never truncated.
pub async fn concatenate(segments: &[Segment], output_path: &Path) -> PipelineResult<()> {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|segment| segment.id);

    for pair in ordered.windows(2) {
        let expected = pair[0].id + 1;
        if pair[1].id != expected {
            return Err(PipelineError::SequenceGap {
                expected,
                found: pair[1].id,
            });
        }
    }

    let mut chunks: Vec<(u64, &Path)> = Vec::with_capacity(ordered.len());
    for segment in &ordered {
        let path = segment
            .path
            .as_deref()
            .filter(|_| segment.downloaded)
            .ok_or(PipelineError::MissingChunk(segment.id))?;
        chunks.push((segment.id, path));
    }

    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output_path)
        .await
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                PipelineError::OutputExists {
                    path: output_path.to_path_buf(),
                }
            } else {
                PipelineError::Io {
                    path: output_path.to_path_buf(),
                    source,
                }
            }
        })?;

    for (id, path) in chunks {
        let bytes = fs::read(path).await.map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            warn!(segment = id, "appending empty segment");
        }
        output
            .write_all(&bytes)
            .await
            .map_err(|source| PipelineError::Io {
                path: output_path.to_path_buf(),
                source,
            })?;
    }
    output.flush().await.map_err(|source| PipelineError::Io {
        path: output_path.to_path_buf(),
        source,
    })?;
    Ok(())
}
