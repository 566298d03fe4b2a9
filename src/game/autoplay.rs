use rand::Rng;
use smallvec::SmallVec;

use crate::config::AutoplayMode;
use crate::game::judgment::TierTable;
use crate::game::note::{AutoplayPlan, Note, PlanKind};

/// Probability that a note is deliberately left for the late-miss sweep.
const MISS_RATE: f64 = 0.12;
/// Evaluation slack around the planned hit time.
const HIT_WINDOW_MS: f64 = 18.0;
/// How far ahead of a note's scheduled time a plan may be committed.
const LOOKAHEAD_MS: f64 = 200.0;

/// A synthetic lane activation proposed by the simulator. Fed through the
/// same judgment path as real input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Activation {
    pub lane: usize,
    pub at_ms: f64,
}

/// Samples a signed hit offset from a tiered skill curve: a small weight on
/// the tightest band, growing toward the looser bands, with the magnitude
/// drawn uniformly inside the chosen band.
fn sample_offset<R: Rng>(table: &TierTable, rng: &mut R) -> f64 {
    let tiers = table.tiers();
    let bands = tiers.len();
    let total = (bands * (bands + 1) / 2) as f64;
    let mut pick = rng.random::<f64>() * total;
    let mut band = bands - 1;
    for i in 0..bands {
        let weight = (i + 1) as f64;
        if pick < weight {
            band = i;
            break;
        }
        pick -= weight;
    }

    if band == 0 {
        // Stay comfortably inside the tightest window.
        (rng.random::<f64>() * 2.0 - 1.0) * tiers[0].threshold_ms * 0.8
    } else {
        let direction = if rng.random::<bool>() { 1.0 } else { -1.0 };
        let lo = tiers[band - 1].threshold_ms;
        let hi = tiers[band].threshold_ms;
        direction * (lo + rng.random::<f64>() * (hi - lo))
    }
}

/// One simulator pass over the working chart.
///
/// For each unjudged note inside the lookahead horizon a plan is committed
/// exactly once: either a deliberate miss, or a target time offset from the
/// note. Plans from a different mode are discarded wholesale. A committed
/// hit fires once the clock reaches the target (within `HIT_WINDOW_MS`); if
/// the clock overshoots the target past the outer tolerance, the plan flips
/// to a miss so the sweep accounts for the note with no double counting.
pub fn step<R: Rng>(
    notes: &mut [Note],
    table: &TierTable,
    mode: AutoplayMode,
    now_ms: f64,
    rng: &mut R,
) -> SmallVec<[Activation; 4]> {
    let mut out = SmallVec::new();
    let outer = table.outer_window_ms();

    for note in notes.iter_mut() {
        if note.judged {
            continue;
        }

        if mode == AutoplayMode::Perfect {
            if now_ms < note.time_ms {
                continue;
            }
            out.push(Activation { lane: note.lane, at_ms: note.time_ms });
            continue;
        }

        if note.plan.is_some_and(|p| p.mode != mode) {
            note.plan = None;
        }

        if now_ms - note.time_ms < -LOOKAHEAD_MS {
            continue;
        }

        let plan = match note.plan {
            Some(plan) => plan,
            None => {
                let kind = if rng.random::<f64>() < MISS_RATE {
                    PlanKind::WillMiss
                } else {
                    PlanKind::Hit { target_ms: note.time_ms + sample_offset(table, rng) }
                };
                let plan = AutoplayPlan { mode, kind };
                note.plan = Some(plan);
                plan
            }
        };

        match plan.kind {
            PlanKind::WillMiss => {}
            PlanKind::Hit { target_ms } => {
                if now_ms + HIT_WINDOW_MS < target_ms {
                    continue;
                }
                if now_ms - target_ms > outer {
                    note.plan = Some(AutoplayPlan { mode, kind: PlanKind::WillMiss });
                    continue;
                }
                out.push(Activation { lane: note.lane, at_ms: now_ms });
            }
        }
    }

    out
}
