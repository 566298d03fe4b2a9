use crate::game::clock::TransportState;
use crate::game::judgment::{FeedbackEvent, RunState};
use crate::game::note::Note;

/// Judged notes linger this long in the snapshot so hit/miss feedback can
/// animate out before the note disappears.
const JUDGED_LINGER_MS: f64 = 600.0;

/// Renderer-facing view of one note. `drop_progress` runs 0 at spawn to 1
/// at the hit line, so a renderer needs no timing knowledge of its own.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoteView {
    pub lane: usize,
    pub time_ms: f64,
    pub judged: bool,
    pub hit: bool,
    pub drop_progress: f64,
}

#[derive(Clone, Debug)]
pub struct ScoreSummary {
    pub score: i64,
    pub combo: u32,
    pub longest_combo: u32,
    pub tier_counts: Vec<u32>,
    pub misses: u32,
    pub judged: u32,
    pub total_notes: usize,
}

/// Read-only per-tick state handed to the renderer. Plain data throughout;
/// nothing here can reach back into the engine.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub logical_time_ms: f64,
    pub transport: TransportState,
    /// Remaining pre-roll countdown, when applicable.
    pub countdown_ms: Option<f64>,
    pub notes: Vec<NoteView>,
    pub feedback: Vec<FeedbackEvent>,
    pub summary: ScoreSummary,
}

pub fn build(
    logical_time_ms: f64,
    transport: TransportState,
    countdown_ms: Option<f64>,
    notes: &[Note],
    run: &RunState,
    drop_ms: f64,
) -> Snapshot {
    let mut views = Vec::new();
    for note in notes {
        let time_to_hit = note.time_ms - logical_time_ms;
        if note.judged && -time_to_hit > JUDGED_LINGER_MS {
            continue;
        }
        if time_to_hit > drop_ms {
            continue;
        }
        views.push(NoteView {
            lane: note.lane,
            time_ms: note.time_ms,
            judged: note.judged,
            hit: note.hit,
            drop_progress: (1.0 - time_to_hit / drop_ms).clamp(0.0, 1.0),
        });
    }

    Snapshot {
        logical_time_ms,
        transport,
        countdown_ms,
        notes: views,
        feedback: run.feedback.iter().copied().collect(),
        summary: ScoreSummary {
            score: run.score,
            combo: run.combo,
            longest_combo: run.longest_combo,
            tier_counts: run.tier_counts.clone(),
            misses: run.misses,
            judged: run.judged,
            total_notes: notes.len(),
        },
    }
}
