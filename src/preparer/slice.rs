//! Time-slicing.
//!
//! Splits a transcoded artifact into equal `segment_duration_secs` slices,
//! named with a zero-padded monotonic index so lexicographic sort equals
//! time order.

use super::runner::CommandRunner;
use crate::error::PrepareError;
use crate::types::{ArtifactRole, AudioArtifact};
use std::path::Path;

/// Output extension for sliced segments, derived from the input extension.
pub fn slice_extension(input_ext: &str) -> &'static str {
    match input_ext.to_ascii_lowercase().as_str() {
        "m4a" => "m4a",
        "ogg" | "oga" => "ogg",
        "wav" => "wav",
        _ => "mp3",
    }
}

fn codec_for_extension(ext: &str) -> &'static str {
    match ext {
        "m4a" => "aac",
        "ogg" => "libvorbis",
        "wav" => "pcm_s16le",
        _ => "libmp3lame",
    }
}

pub fn segment_name(index: usize, ext: &str) -> String {
    format!("segment_{:03}.{}", index, ext)
}

/// Invoke the transcoder once with `-f segment` to produce all slices, then
/// discover them on disk in lexicographic (== time) order.
pub async fn slice(
    runner: &dyn CommandRunner,
    binary: &str,
    input: &Path,
    out_dir: &Path,
    segment_duration_secs: u64,
    input_ext: &str,
) -> Result<Vec<AudioArtifact>, PrepareError> {
    let ext = slice_extension(input_ext);
    let codec = codec_for_extension(ext);
    let pattern = out_dir.join(format!("segment_%03d.{}", ext));

    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-f".to_string(),
        "segment".to_string(),
        "-segment_time".to_string(),
        segment_duration_secs.to_string(),
        "-reset_timestamps".to_string(),
        "1".to_string(),
        "-acodec".to_string(),
        codec.to_string(),
        pattern.to_string_lossy().to_string(),
    ];

    let outcome = runner.run(binary, &args).await;
    if !outcome.success {
        return Err(PrepareError::SegmentationFailed(outcome.stderr));
    }

    let mut names: Vec<String> = std::fs::read_dir(out_dir)
        .map_err(|e| PrepareError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("segment_") && name.ends_with(&format!(".{}", ext)))
        .collect();
    names.sort();

    if names.is_empty() {
        return Err(PrepareError::SegmentationFailed(
            "transcoder reported success but produced no segment files".to_string(),
        ));
    }

    let mut artifacts = Vec::with_capacity(names.len());
    for name in names {
        let path = out_dir.join(&name);
        let size_bytes = std::fs::metadata(&path)
            .map_err(|e| PrepareError::Io(e.to_string()))?
            .len();
        artifacts.push(AudioArtifact {
            path,
            size_bytes,
            ext: ext.to_string(),
            role: ArtifactRole::Segment,
        });
    }

    Ok(artifacts)
}
