//! Post-processor — language fallback, optional spelling pass, optional
//! speaker labelling.

pub mod language;
pub mod llm;
pub mod speaker;

use crate::job_log::JobLog;
use crate::types::{JobParams, MergedTranscript, SourceLanguage};
use llm::LlmProvider;

/// Parameters shaping the post-process stage, derived from `JobParams` plus
/// the job id (for the speaker RNG's default seed).
#[derive(Debug, Clone)]
pub struct PostProcessParams {
    pub source_language: SourceLanguage,
    pub enable_speaker_diarization: bool,
    pub run_spelling_pass: bool,
    /// Seed for the speaker-labelling heuristic's RNG. Defaults to a hash
    /// of the job id so repeated runs of the same job are reproducible.
    pub seed: u64,
}

impl PostProcessParams {
    pub fn from_job(params: &JobParams, job_id: &str, run_spelling_pass: bool) -> Self {
        Self {
            source_language: params.source_language.clone(),
            enable_speaker_diarization: params.enable_speaker_diarization,
            run_spelling_pass,
            seed: speaker::seed_from_job_id(job_id),
        }
    }
}

/// Run every enabled post-process step against `transcript` in place.
pub async fn run(
    transcript: &mut MergedTranscript,
    params: &PostProcessParams,
    llm_provider: Option<&dyn LlmProvider>,
    job_id: &str,
    log: &JobLog,
) {
    if transcript.language.is_none() && params.source_language == SourceLanguage::Auto {
        let detected = language::detect_language(&transcript.text);
        log.info(job_id, "postprocess", format!("no provider language, detected '{}' from text", detected))
            .await;
        transcript.language = Some(detected.to_string());
    }

    if params.run_spelling_pass {
        if let Some(provider) = llm_provider {
            llm::run_spelling_pass(provider, transcript, job_id, log).await;
        }
    }

    if params.enable_speaker_diarization {
        speaker::label_speakers(&mut transcript.segments, params.seed);
        log.info(job_id, "postprocess", "speaker labels attached").await;
    }
}
