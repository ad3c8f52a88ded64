//! Merger — fixed-offset timestamp discipline.
//!
//! This is the one genuinely novel piece of arithmetic this crate needs.
//! The critical design decision is
//! never to accumulate `duration` from provider responses to compute
//! offsets — a failed segment would corrupt every later timestamp. Instead
//! segment `i`'s offset is always `i * segment_duration_secs`, independent
//! of what any other segment returned or failed to return.

use crate::transcriber::SegmentOutcome;
use crate::types::{MergedTranscript, Plan, RawTranscript, Segment};

/// Segment-index divider inserted between segment text blocks when there is
/// more than one segment.
fn divider(index: usize) -> String {
    format!("=== 片段 {} ===", index)
}

fn shift_segment(mut segment: Segment, offset: f64) -> Segment {
    segment.start = (segment.start + offset).max(0.0);
    segment.end = (segment.end + offset).max(0.0);
    for word in &mut segment.words {
        word.start = (word.start + offset).max(0.0);
        word.end = (word.end + offset).max(0.0);
    }
    segment
}

/// Merge a `Plan::Single` response straight through: no offset, language and
/// duration come directly from the provider.
pub fn merge_single(raw: RawTranscript) -> MergedTranscript {
    MergedTranscript {
        text: raw.text,
        duration_sec: raw.duration_sec,
        language: raw.language,
        segments: raw.segments,
        total_segments: 1,
    }
}

/// Merge all segment outcomes (already sorted by index by the transcriber)
/// into one timeline. Failed segments are skipped but the timeline still
/// advances by `segment_duration_secs` for their slot, so later segments'
/// offsets are unaffected by earlier failures.
pub fn merge_segments(outcomes: Vec<SegmentOutcome>, segment_duration_secs: u64) -> MergedTranscript {
    let total_segments = outcomes.len();
    let mut merged_segments = Vec::new();
    let mut text_blocks = Vec::new();
    let mut detected_language = None;

    for outcome in outcomes {
        let offset = outcome.index as f64 * segment_duration_secs as f64;

        match outcome.result {
            Ok(raw) => {
                if detected_language.is_none() {
                    detected_language = raw.language.clone();
                }

                let shifted: Vec<Segment> = raw
                    .segments
                    .into_iter()
                    .map(|s| shift_segment(s, offset))
                    .collect();

                let mut block = String::new();
                if total_segments > 1 {
                    block.push_str(&divider(outcome.index));
                    block.push('\n');
                }
                block.push_str(raw.text.trim());
                text_blocks.push(block);

                merged_segments.extend(shifted);
            }
            Err(_) => {
                // Failure marker: timeline still advances by segment_duration_secs
                // for this slot (handled implicitly since offsets are
                // index-derived, not accumulated), but no text/segments are
                // contributed.
            }
        }
    }

    MergedTranscript {
        text: text_blocks.join("\n\n"),
        duration_sec: total_segments as f64 * segment_duration_secs as f64,
        language: detected_language,
        segments: merged_segments,
        total_segments,
    }
}

/// Dispatch on plan shape: single-file pass-through vs segmented merge.
/// `single_raw` is only consulted for `Plan::Single`.
pub fn merge(
    plan: &Plan,
    single_raw: Option<RawTranscript>,
    segment_outcomes: Vec<SegmentOutcome>,
) -> MergedTranscript {
    match plan {
        Plan::Single(_) => merge_single(single_raw.expect("single plan must carry a raw transcript")),
        Plan::Segmented {
            segment_duration_secs,
            ..
        } => merge_segments(segment_outcomes, *segment_duration_secs),
    }
}
