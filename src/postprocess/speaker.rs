//! Speaker-labelling heuristic.
//!
//! `ai/idle_behaviors.rs` reaches for bare `rand::random()` wherever it
//! needs a coin flip, but this heuristic is an explicit placeholder for a
//! real diarization model and needs its randomness seeded for reproducible
//! testing — so this uses a seeded `StdRng` instead of an unseeded global
//! RNG.

use crate::types::Segment;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GAP_THRESHOLD_SEC: f64 = 3.0;
const LENGTH_JUMP_THRESHOLD: usize = 50;
const MAX_SPEAKERS: u32 = 4;
/// Probability that a detected speaker-change signal is accepted.
const ACCEPTANCE_PROBABILITY: f64 = 0.7;

/// Derive a deterministic seed from a job id, used when the caller doesn't
/// supply an explicit `PostProcessParams::seed`.
pub fn seed_from_job_id(job_id: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in job_id.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Attach `speaker = "Speaker k"` to every segment in place, incrementing
/// the speaker counter (capped at `MAX_SPEAKERS`) whenever a gap or a
/// length jump between consecutive segments is detected and accepted by
/// the seeded RNG.
pub fn label_speakers(segments: &mut [Segment], seed: u64) {
    if segments.is_empty() {
        return;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut current_speaker: u32 = 1;

    segments[0].speaker = Some(format!("Speaker {}", current_speaker));

    for i in 1..segments.len() {
        let gap = segments[i].start - segments[i - 1].end;
        let length_jump = segments[i].text.len().abs_diff(segments[i - 1].text.len());

        let signal = gap > GAP_THRESHOLD_SEC || length_jump > LENGTH_JUMP_THRESHOLD;

        if signal && current_speaker < MAX_SPEAKERS && rng.gen_bool(ACCEPTANCE_PROBABILITY) {
            current_speaker += 1;
        }

        segments[i].speaker = Some(format!("Speaker {}", current_speaker));
    }
}
