//! Transcode cascade.
//!
//! Tries a fixed list of codecs in order, falling through on codec
//! unavailability (a nonzero exit from the transcoder), and returns the
//! first successfully produced artifact.

use super::runner::CommandRunner;
use crate::error::PrepareError;
use crate::types::{ArtifactRole, AudioArtifact};
use crate::validator::{self, ValidationOutcome};
use std::path::Path;

/// (ffmpeg codec name, output extension)
pub const CODEC_CASCADE: &[(&str, &str)] = &[
    ("libmp3lame", "mp3"),
    ("mp3", "mp3"),
    ("aac", "m4a"),
    ("libvorbis", "ogg"),
    ("pcm_s16le", "wav"),
];

/// Probe whether the configured transcoder binary exists at all, by running
/// it with `-version`. Cached by the caller for the `PipelineCore`'s
/// lifetime.
pub async fn probe_available(runner: &dyn CommandRunner, binary: &str) -> bool {
    runner.run(binary, &["-version".to_string()]).await.success
}

/// Try each codec in `CODEC_CASCADE` until one produces a valid artifact.
/// The provider-limit size comparison is left to the caller in `mod.rs`
/// (this function only transcodes).
pub async fn transcode(
    runner: &dyn CommandRunner,
    binary: &str,
    input: &Path,
    out_dir: &Path,
) -> Result<AudioArtifact, PrepareError> {
    let mut tried = Vec::new();

    for (codec, ext) in CODEC_CASCADE {
        tried.push((*codec).to_string());
        let out_path = out_dir.join(format!("transcoded.{}", ext));
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-b:a".to_string(),
            "48k".to_string(),
            "-acodec".to_string(),
            (*codec).to_string(),
            out_path.to_string_lossy().to_string(),
        ];

        let outcome = runner.run(binary, &args).await;
        if !outcome.success || !out_path.exists() {
            tracing::debug!(codec, "transcode attempt failed, trying next codec");
            continue;
        }

        let size_bytes = std::fs::metadata(&out_path)
            .map_err(|e| PrepareError::Io(e.to_string()))?
            .len();

        match validator::validate(&out_path) {
            Ok(ValidationOutcome::Ok) | Ok(ValidationOutcome::OkWithWarning(_)) => {
                return Ok(AudioArtifact {
                    path: out_path,
                    size_bytes,
                    ext: (*ext).to_string(),
                    role: ArtifactRole::Transcoded,
                });
            }
            Err(e) => {
                tracing::debug!(codec, error = %e, "transcoded artifact failed re-validation");
                continue;
            }
        }
    }

    Err(PrepareError::TranscoderUnavailable { tried })
}
