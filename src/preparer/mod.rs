//! Preparer — size-adaptive transcode/segment decision.

pub mod runner;
pub mod slice;
pub mod transcode;

use crate::error::PrepareError;
use crate::job_log::JobLog;
use crate::types::{ArtifactRole, AudioArtifact, Plan};
use runner::CommandRunner;
use std::path::Path;

pub async fn prepare(
    runner: &dyn CommandRunner,
    binary: &str,
    original: AudioArtifact,
    out_dir: &Path,
    provider_limit_bytes: u64,
    segment_duration_secs: u64,
    job_id: &str,
    log: &JobLog,
) -> Result<Plan, PrepareError> {
    if original.size_bytes <= provider_limit_bytes {
        log.info(job_id, "prepare", "input within provider limit, no transcode needed")
            .await;
        return Ok(Plan::Single(original));
    }

    log.info(
        job_id,
        "prepare",
        format!(
            "input {} bytes exceeds provider limit {} bytes, transcoding",
            original.size_bytes, provider_limit_bytes
        ),
    )
    .await;

    let transcoded = transcode::transcode(runner, binary, &original.path, out_dir).await?;

    if transcoded.size_bytes <= provider_limit_bytes {
        log.success(job_id, "prepare", "transcode brought file under provider limit")
            .await;
        return Ok(Plan::Single(transcoded));
    }

    log.info(
        job_id,
        "prepare",
        format!(
            "transcoded size {} bytes still exceeds limit, slicing into {}s segments",
            transcoded.size_bytes, segment_duration_secs
        ),
    )
    .await;

    let segments = slice::slice(
        runner,
        binary,
        &transcoded.path,
        out_dir,
        segment_duration_secs,
        &transcoded.ext,
    )
    .await?;

    for segment in &segments {
        crate::validator::validate(&segment.path)?;
    }

    log.success(
        job_id,
        "prepare",
        format!("prepared {} segments", segments.len()),
    )
    .await;

    Ok(Plan::Segmented {
        segments,
        segment_duration_secs,
    })
}

/// Build the "original" artifact record for a file already written to disk.
pub fn original_artifact(path: &Path, size_bytes: u64, ext: &str) -> AudioArtifact {
    AudioArtifact {
        path: path.to_path_buf(),
        size_bytes,
        ext: ext.to_string(),
        role: ArtifactRole::Original,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopRunner;
    #[async_trait]
    impl CommandRunner for NoopRunner {
        async fn run(&self, _binary: &str, _args: &[String]) -> runner::CommandOutcome {
            runner::CommandOutcome {
                success: false,
                stderr: "not reached".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn small_file_produces_single_plan_without_transcoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.mp3");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        let artifact = original_artifact(&path, 1024, "mp3");
        let log = JobLog::new();

        let plan = prepare(&NoopRunner, "ffmpeg", artifact, dir.path(), 25 * 1024 * 1024, 300, "job", &log)
            .await
            .unwrap();

        match plan {
            Plan::Single(a) => assert_eq!(a.role, ArtifactRole::Original),
            Plan::Segmented { .. } => panic!("expected Single plan"),
        }
    }
}
