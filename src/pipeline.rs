//! `PipelineCore` — orchestrates Fetch → Validate → Prepare → Transcribe →
//! Merge → Post-process → Render behind the crate's core API.

use crate::config::PipelineConfig;
use crate::custodian::TempDirGuard;
use crate::error::{ErrorClass, PipelineError, UserError};
use crate::job::{JobHandle, JobRecord, JobStore};
use crate::job_log::JobLog;
use crate::merger;
use crate::postprocess::{self, llm::LlmProvider, PostProcessParams};
use crate::preparer::runner::{CommandRunner, RealCommandRunner};
use crate::preparer::{self, transcode};
use crate::renderer;
use crate::transcriber::{self, provider::SttProvider};
use crate::types::{ArtifactRole, AudioArtifact, JobParams, JobResult, JobState, Plan};
use crate::validator;
use crate::{fetcher, job_log};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Where a job's input audio comes from. `SubmitFromBytes`/`SubmitFromUrl`
/// only differ in how this is populated.
enum Source {
    Bytes { bytes: Vec<u8>, filename_hint: String },
    Url(String),
}

/// Derive an extension to validate/store the input under. Neither Core API
/// call carries an explicit content-type, so the extension is read off the
/// filename hint (the job title for `SubmitFromBytes`, the URL path for
/// `SubmitFromUrl`), defaulting to `mp3` when none is present.
/// Build the client `fetcher::fetch` runs redirects over. Disables
/// reqwest's own redirect-following so the fetcher's manual hop-bounded
/// loop is the only thing that ever follows a `Location` header.
fn fetcher_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn derive_extension(hint: &str) -> String {
    Path::new(hint)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| validator::ACCEPTED_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "mp3".to_string())
}

pub struct PipelineCore {
    config: PipelineConfig,
    jobs: JobStore,
    log: JobLog,
    http_client: reqwest::Client,
    stt_provider: Arc<dyn SttProvider>,
    llm_provider: Option<Arc<dyn LlmProvider>>,
    command_runner: Arc<dyn CommandRunner>,
}

impl PipelineCore {
    /// Build a core wired to real providers (OpenAI Whisper + OpenAI chat)
    /// and a real subprocess runner, resolving API keys per `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, String> {
        let stt_key = config
            .resolve_stt_api_key()
            .ok_or_else(|| "no STT API key configured (set stt_api_key or stt_api_key_env)".to_string())?;
        let stt_provider = Arc::new(transcriber::provider::OpenAIWhisperProvider::new(
            stt_key,
            config.stt_base_url.clone(),
            config.stt_model.clone(),
        ));

        let llm_provider: Option<Arc<dyn LlmProvider>> = config.resolve_llm_api_key().map(|key| {
            Arc::new(crate::postprocess::llm::OpenAIChatProvider::new(
                key,
                config.llm_base_url.clone(),
                config.llm_model.clone(),
            )) as Arc<dyn LlmProvider>
        });

        Ok(Self {
            config,
            jobs: JobStore::new(),
            log: JobLog::new(),
            http_client: fetcher_http_client(),
            stt_provider,
            llm_provider,
            command_runner: Arc::new(RealCommandRunner),
        })
    }

    /// Build a core with injected providers, for deterministic testing
    /// without any real network/subprocess calls.
    pub fn with_providers(
        config: PipelineConfig,
        stt_provider: Arc<dyn SttProvider>,
        llm_provider: Option<Arc<dyn LlmProvider>>,
        command_runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            jobs: JobStore::new(),
            log: JobLog::new(),
            http_client: fetcher_http_client(),
            stt_provider,
            llm_provider,
            command_runner,
        }
    }

    pub async fn submit_from_bytes(
        &self,
        job_id: Option<String>,
        title: String,
        bytes: Vec<u8>,
        params: JobParams,
    ) -> Result<JobHandle, UserError> {
        if bytes.len() as u64 > self.config.upload_cap_bytes {
            return Err(UserError::new(
                ErrorClass::InvalidInput,
                format!(
                    "upload of {} bytes exceeds the {} byte cap",
                    bytes.len(),
                    self.config.upload_cap_bytes
                ),
            ));
        }

        let filename_hint = title.clone();
        self.submit(
            job_id,
            title,
            params,
            Source::Bytes { bytes, filename_hint },
        )
        .await
    }

    pub async fn submit_from_url(
        &self,
        job_id: Option<String>,
        title: String,
        url: String,
        params: JobParams,
    ) -> Result<JobHandle, UserError> {
        self.submit(job_id, title, params, Source::Url(url)).await
    }

    async fn submit(
        &self,
        job_id: Option<String>,
        title: String,
        params: JobParams,
        source: Source,
    ) -> Result<JobHandle, UserError> {
        let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = JobRecord::new(job_id.clone(), title, params);
        self.jobs.insert(record.clone()).await;

        let handle = JobHandle { job_id: job_id.clone() };

        let config = self.config.clone();
        let log = self.log.clone();
        let stt_provider = self.stt_provider.clone();
        let llm_provider = self.llm_provider.clone();
        let command_runner = self.command_runner.clone();
        let http_client = self.http_client.clone();
        let record_for_task = record.clone();
        let jobs = self.jobs.clone();

        tokio::spawn(async move {
            run_job(
                record_for_task,
                source,
                config,
                log,
                http_client,
                stt_provider,
                llm_provider,
                command_runner,
                jobs,
            )
            .await;
        });

        Ok(handle)
    }

    /// Block until the job reaches a terminal state and return its outcome.
    pub async fn await_result(&self, handle: &JobHandle) -> Result<JobResult, UserError> {
        let record = match self.jobs.get(&handle.job_id).await {
            Some(r) => r,
            None => {
                return Err(UserError::new(
                    ErrorClass::Internal,
                    format!("unknown job id '{}'", handle.job_id),
                ))
            }
        };

        loop {
            // Register interest before checking, so a `finish()` that races
            // with this check is never missed (`Notified` captures the
            // notification counter at creation, not at first poll).
            let notified = record.done.notified();
            if let Some(outcome) = record.outcome.read().await.clone() {
                return outcome;
            }
            notified.await;
        }
    }

    pub async fn poll_logs(&self, job_id: &str) -> Vec<job_log::JobLogEntry> {
        self.log.poll(job_id).await
    }

    pub async fn cancel(&self, handle: &JobHandle) {
        if let Some(record) = self.jobs.get(&handle.job_id).await {
            record.cancellation.cancel();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    record: Arc<JobRecord>,
    source: Source,
    config: PipelineConfig,
    log: JobLog,
    http_client: reqwest::Client,
    stt_provider: Arc<dyn SttProvider>,
    llm_provider: Option<Arc<dyn LlmProvider>>,
    command_runner: Arc<dyn CommandRunner>,
    jobs: JobStore,
) {
    let job_id = record.job_id.clone();
    let cancellation = record.cancellation.clone();
    let deadline = Duration::from_secs(config.default_deadline_secs.min(config.max_deadline_secs));

    let work = execute(
        record.clone(),
        source,
        config,
        log.clone(),
        http_client,
        stt_provider,
        llm_provider,
        command_runner,
    );

    let outcome = tokio::select! {
        result = work => result,
        _ = cancellation.cancelled() => {
            log.warn(&job_id, "pipeline", "job cancelled").await;
            Err(PipelineError::Cancelled)
        }
        _ = tokio::time::sleep(deadline) => {
            log.error(&job_id, "pipeline", "job exceeded its deadline").await;
            Err(PipelineError::Timeout)
        }
    };

    let final_state = match &outcome {
        Ok(_) => JobState::Done,
        Err(PipelineError::Cancelled) => JobState::Cancelled,
        Err(_) => JobState::Failed,
    };
    let result = outcome.map_err(|e| e.to_user_error());

    record.finish(result, final_state).await;
    log.schedule_eviction(job_id.clone());
    jobs.schedule_eviction(job_id);
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    record: Arc<JobRecord>,
    source: Source,
    config: PipelineConfig,
    log: JobLog,
    http_client: reqwest::Client,
    stt_provider: Arc<dyn SttProvider>,
    llm_provider: Option<Arc<dyn LlmProvider>>,
    command_runner: Arc<dyn CommandRunner>,
) -> Result<JobResult, PipelineError> {
    let job_id = record.job_id.clone();
    let params = record.params.clone();

    record.set_state(JobState::Preparing).await;

    let guard = TempDirGuard::new(&job_id)
        .map_err(|e| PipelineError::Internal(format!("failed to create temp dir: {}", e)))?;

    let (bytes, ext) = match source {
        Source::Bytes { bytes, filename_hint } => (bytes, derive_extension(&filename_hint)),
        Source::Url(url) => {
            log.info(&job_id, "fetch", format!("fetching {}", url)).await;
            let bytes = fetcher::fetch(&http_client, &url, &job_id, &log).await?;
            (bytes, derive_extension(&url))
        }
    };

    let original_path = guard.join(format!("original.{}", ext));
    std::fs::write(&original_path, &bytes)
        .map_err(|e| PipelineError::Internal(format!("failed to write input file: {}", e)))?;
    let size_bytes = bytes.len() as u64;
    drop(bytes);

    validator::validate(&original_path)?;
    log.success(&job_id, "validate", "input passed validation").await;

    let original = AudioArtifact {
        path: original_path,
        size_bytes,
        ext,
        role: ArtifactRole::Original,
    };

    let transcoder_available = transcode::probe_available(command_runner.as_ref(), &config.transcoder_binary).await;
    if !transcoder_available && size_bytes > config.provider_limit_bytes {
        return Err(PipelineError::Prepare(crate::error::PrepareError::TranscoderUnavailable {
            tried: vec![],
        }));
    }

    let plan = preparer::prepare(
        command_runner.as_ref(),
        &config.transcoder_binary,
        original,
        guard.path(),
        config.provider_limit_bytes,
        config.segment_duration_secs,
        &job_id,
        &log,
    )
    .await?;

    record.set_state(JobState::Transcribing).await;

    let merged = match &plan {
        Plan::Single(artifact) => {
            let raw = transcriber::transcribe_single(
                stt_provider.as_ref(),
                &artifact.path,
                params.content_type,
                &params.source_language,
                &params.keywords,
                &job_id,
                &log,
            )
            .await?;
            merger::merge_single(raw)
        }
        Plan::Segmented { segment_duration_secs, .. } => {
            let outcomes = transcriber::transcribe_segments(
                stt_provider.clone(),
                &plan,
                params.content_type,
                &params.source_language,
                &params.keywords,
                config.concurrent_limit,
                &job_id,
                &log,
            )
            .await;
            merger::merge_segments(outcomes, *segment_duration_secs)
        }
    };
    log.success(&job_id, "transcribe", "transcription complete").await;

    record.set_state(JobState::PostProcessing).await;
    let mut merged = merged;
    let postprocess_params = PostProcessParams::from_job(&params, &job_id, llm_provider.is_some());
    postprocess::run(
        &mut merged,
        &postprocess_params,
        llm_provider.as_deref().map(|p| p as &dyn LlmProvider),
        &job_id,
        &log,
    )
    .await;

    record.set_state(JobState::Rendering).await;
    let formats = renderer::render_all(
        &merged,
        &params.output_formats,
        config.stt_model.as_deref().unwrap_or("unknown"),
        &chrono::Utc::now().to_rfc3339(),
        Some(&job_id),
    );
    log.success(&job_id, "render", format!("rendered {} format(s)", formats.len()))
        .await;

    Ok(JobResult {
        formats,
        language: merged.language,
        duration_sec: merged.duration_sec,
        segments: merged.segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderErrorClass, SttError};
    use crate::transcriber::provider::TranscribeOptions;
    use crate::types::{OutputFormat, RawTranscript, Segment, SourceLanguage};
    use async_trait::async_trait;
    use std::path::Path as StdPath;

    struct FakeStt;
    #[async_trait]
    impl SttProvider for FakeStt {
        async fn transcribe(
            &self,
            _path: &StdPath,
            _options: &TranscribeOptions,
        ) -> Result<RawTranscript, SttError> {
            Ok(RawTranscript {
                text: "hello world".to_string(),
                duration_sec: 1.5,
                language: Some("en".to_string()),
                segments: vec![Segment {
                    start: 0.0,
                    end: 1.5,
                    text: "hello world".to_string(),
                    words: vec![],
                    speaker: None,
                }],
            })
        }
    }

    struct SlowStt;
    #[async_trait]
    impl SttProvider for SlowStt {
        async fn transcribe(
            &self,
            _path: &StdPath,
            _options: &TranscribeOptions,
        ) -> Result<RawTranscript, SttError> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(RawTranscript {
                text: "too late".to_string(),
                duration_sec: 1.0,
                language: Some("en".to_string()),
                segments: vec![],
            })
        }
    }

    struct AlwaysFailStt;
    #[async_trait]
    impl SttProvider for AlwaysFailStt {
        async fn transcribe(
            &self,
            _path: &StdPath,
            _options: &TranscribeOptions,
        ) -> Result<RawTranscript, SttError> {
            Err(SttError::new(ProviderErrorClass::QuotaExhausted, "no credit"))
        }
    }

    struct NoopRunner;
    #[async_trait]
    impl CommandRunner for NoopRunner {
        async fn run(&self, _binary: &str, _args: &[String]) -> crate::preparer::runner::CommandOutcome {
            crate::preparer::runner::CommandOutcome {
                success: true,
                stderr: String::new(),
            }
        }
    }

    fn small_mp3_bytes() -> Vec<u8> {
        let mut payload = b"ID3\x03\x00\x00\x00\x00\x00\x00".to_vec();
        payload.resize(2000, 0);
        payload
    }

    fn test_config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.default_deadline_secs = 5;
        cfg
    }

    #[tokio::test]
    async fn small_file_succeeds_end_to_end() {
        let core = PipelineCore::with_providers(
            test_config(),
            Arc::new(FakeStt),
            None,
            Arc::new(NoopRunner),
        );

        let handle = core
            .submit_from_bytes(
                None,
                "episode.mp3".to_string(),
                small_mp3_bytes(),
                JobParams {
                    output_formats: vec![OutputFormat::Txt],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = core.await_result(&handle).await.unwrap();
        assert_eq!(result.language, Some("en".to_string()));
        assert!(result.formats.contains_key(&OutputFormat::Txt));
    }

    #[tokio::test]
    async fn quota_error_surfaces_as_provider_quota_exhausted() {
        let core = PipelineCore::with_providers(
            test_config(),
            Arc::new(AlwaysFailStt),
            None,
            Arc::new(NoopRunner),
        );

        let handle = core
            .submit_from_bytes(None, "episode.mp3".to_string(), small_mp3_bytes(), JobParams::default())
            .await
            .unwrap();

        let err = core.await_result(&handle).await.unwrap_err();
        assert_eq!(err.class, ErrorClass::ProviderQuotaExhausted);
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected_before_any_pipeline_work() {
        let mut cfg = test_config();
        cfg.upload_cap_bytes = 1024;
        let core = PipelineCore::with_providers(cfg, Arc::new(FakeStt), None, Arc::new(NoopRunner));

        let err = core
            .submit_from_bytes(None, "episode.mp3".to_string(), vec![0u8; 2048], JobParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidInput);
    }

    #[tokio::test]
    async fn cancelling_a_job_surfaces_cancelled_class() {
        let core = PipelineCore::with_providers(
            test_config(),
            Arc::new(SlowStt),
            None,
            Arc::new(NoopRunner),
        );

        let handle = core
            .submit_from_bytes(None, "episode.mp3".to_string(), small_mp3_bytes(), JobParams::default())
            .await
            .unwrap();

        core.cancel(&handle).await;
        let err = core.await_result(&handle).await.unwrap_err();
        assert_eq!(err.class, ErrorClass::Cancelled);
    }

    #[test]
    fn extension_falls_back_to_mp3_for_unknown_hint() {
        assert_eq!(derive_extension("not-a-file"), "mp3");
        assert_eq!(derive_extension("episode.wav"), "wav");
        assert_eq!(derive_extension("https://example.com/ep.m4a"), "m4a");
    }
}
