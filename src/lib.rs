//! Batch podcast transcription pipeline: Fetch → Validate → Prepare →
//! Transcribe → Merge → Post-process → Render, exposed through
//! `pipeline::PipelineCore`.

pub mod config;
pub mod custodian;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod job_log;
pub mod merger;
pub mod pipeline;
pub mod postprocess;
pub mod preparer;
pub mod renderer;
pub mod transcriber;
pub mod types;
pub mod validator;

pub use error::{ErrorClass, PipelineError, UserError};
pub use job::JobHandle;
pub use pipeline::PipelineCore;
pub use types::{JobParams, JobResult, JobState};
