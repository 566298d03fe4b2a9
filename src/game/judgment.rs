use std::fmt;

use log::debug;
use smallvec::SmallVec;

use crate::game::note::Note;

/// One accuracy bracket: activations whose absolute delta falls inside
/// `threshold_ms` (and outside every tighter tier) earn `score`.
#[derive(Clone, Debug)]
pub struct Tier {
    pub name: String,
    pub threshold_ms: f64,
    pub score: i64,
    /// Feedback color tag for the renderer; the engine never interprets it.
    pub color: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TierTableError {
    Empty,
    /// Threshold at `index` does not strictly exceed the one before it.
    NonMonotonic { index: usize },
}

impl fmt::Display for TierTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "tier table must contain at least one tier"),
            Self::NonMonotonic { index } => {
                write!(f, "tier threshold at index {index} is not strictly increasing")
            }
        }
    }
}

impl std::error::Error for TierTableError {}

/// Ordered, closed set of judgment tiers. Thresholds must be finite,
/// positive, and strictly increasing; violating that is a configuration
/// error caught here, before any run starts.
#[derive(Clone, Debug)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, TierTableError> {
        if tiers.is_empty() {
            return Err(TierTableError::Empty);
        }
        let mut prev = 0.0_f64;
        for (index, tier) in tiers.iter().enumerate() {
            if !tier.threshold_ms.is_finite() || tier.threshold_ms <= prev {
                return Err(TierTableError::NonMonotonic { index });
            }
            prev = tier.threshold_ms;
        }
        Ok(Self { tiers })
    }

    #[inline(always)]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Widest configured window; activations beyond this never bind a note.
    #[inline(always)]
    pub fn outer_window_ms(&self) -> f64 {
        self.tiers.last().map_or(0.0, |t| t.threshold_ms)
    }

    /// Classifies a signed delta into the tightest tier whose threshold
    /// contains it. Returns the tier index, or None beyond the outer window.
    pub fn classify(&self, delta_ms: f64) -> Option<usize> {
        let abs = delta_ms.abs();
        self.tiers.iter().position(|t| abs <= t.threshold_ms)
    }
}

impl Default for TierTable {
    /// The stock four-tier scale: Perfect 5ms/300, Great 10ms/200,
    /// Good 20ms/120, Okay 30ms/50.
    fn default() -> Self {
        let tiers = vec![
            Tier { name: "Perfect".into(), threshold_ms: 5.0, score: 300, color: "#00ff80".into() },
            Tier { name: "Great".into(), threshold_ms: 10.0, score: 200, color: "#2ecc71".into() },
            Tier { name: "Good".into(), threshold_ms: 20.0, score: 120, color: "#f6d860".into() },
            Tier { name: "Okay".into(), threshold_ms: 30.0, score: 50, color: "#ff8c42".into() },
        ];
        Self::new(tiers).expect("stock tier table is monotonic")
    }
}

/// Transient feedback for the renderer: one entry per judgment this tick.
/// `tier` is None for a late miss.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeedbackEvent {
    pub lane: usize,
    pub tier: Option<usize>,
    pub delta_ms: f64,
}

/// Per-run mutable counters, owned by the engine and handed to the renderer
/// as read-only data. Reset wholesale on every (re)start.
#[derive(Clone, Debug)]
pub struct RunState {
    pub score: i64,
    pub combo: u32,
    pub longest_combo: u32,
    /// Hit counts, indexed parallel to the tier table.
    pub tier_counts: Vec<u32>,
    pub misses: u32,
    pub judged: u32,
    pub feedback: SmallVec<[FeedbackEvent; 8]>,
}

impl RunState {
    pub fn new(tier_count: usize) -> Self {
        Self {
            score: 0,
            combo: 0,
            longest_combo: 0,
            tier_counts: vec![0; tier_count],
            misses: 0,
            judged: 0,
            feedback: SmallVec::new(),
        }
    }

    pub fn reset(&mut self) {
        let tier_count = self.tier_counts.len();
        *self = Self::new(tier_count);
    }
}

/// Successful judgment of one activation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JudgeOutcome {
    pub note_index: usize,
    pub tier: usize,
    pub delta_ms: f64,
}

/// Scores one lane activation against the working chart.
///
/// Candidate selection: unjudged notes in `lane` whose absolute delta from
/// `at_ms` is within the outer window. The smallest absolute delta wins;
/// exact ties go to the earliest-scheduled note (stable scan order).
/// An activation with no candidate is a ghost tap: no penalty, no change.
pub fn evaluate_activation(
    notes: &mut [Note],
    table: &TierTable,
    run: &mut RunState,
    lane: usize,
    at_ms: f64,
) -> Option<JudgeOutcome> {
    let outer = table.outer_window_ms();
    let mut best: Option<(usize, f64)> = None;
    for (index, note) in notes.iter().enumerate() {
        if note.lane != lane || note.judged {
            continue;
        }
        let abs = (at_ms - note.time_ms).abs();
        if abs > outer {
            continue;
        }
        // Strict comparison keeps the earliest-scheduled note on a tie.
        match best {
            Some((_, best_abs)) if abs >= best_abs => {}
            _ => best = Some((index, abs)),
        }
    }

    let (note_index, _) = best?;
    let delta_ms = at_ms - notes[note_index].time_ms;
    // Step 2 already bounds the delta; classification must still agree.
    let Some(tier) = table.classify(delta_ms) else {
        debug!("activation on lane {lane} escaped classification (delta {delta_ms:.2}ms)");
        return None;
    };

    let note = &mut notes[note_index];
    note.judged = true;
    note.hit = true;

    run.score += table.tiers()[tier].score;
    run.combo += 1;
    if run.combo > run.longest_combo {
        run.longest_combo = run.combo;
    }
    run.tier_counts[tier] += 1;
    run.judged += 1;
    run.feedback.push(FeedbackEvent { lane, tier: Some(tier), delta_ms });

    Some(JudgeOutcome { note_index, tier, delta_ms })
}

/// Marks every unjudged note older than `late_miss_ms` as a miss. Runs once
/// per tick before activations, whether or not any input occurred; misses
/// are time-driven. Returns the number of notes missed this call.
pub fn sweep_late_misses(
    notes: &mut [Note],
    late_miss_ms: f64,
    run: &mut RunState,
    now_ms: f64,
) -> u32 {
    let mut missed = 0;
    for note in notes.iter_mut() {
        if note.judged || now_ms - note.time_ms <= late_miss_ms {
            continue;
        }
        note.judged = true;
        note.hit = false;
        run.judged += 1;
        run.misses += 1;
        run.combo = 0;
        run.feedback.push(FeedbackEvent {
            lane: note.lane,
            tier: None,
            delta_ms: now_ms - note.time_ms,
        });
        missed += 1;
    }
    missed
}
