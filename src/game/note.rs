use crate::config::AutoplayMode;

/// Committed autoplay decision for a single note. Sampled once when the note
/// enters the simulator's lookahead horizon and replaced wholesale if the
/// autoplay mode changes mid-run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AutoplayPlan {
    pub mode: AutoplayMode,
    pub kind: PlanKind,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PlanKind {
    /// Let the note fall through to the late-miss sweep.
    WillMiss,
    /// Activate the lane when the clock reaches `target_ms`.
    Hit { target_ms: f64 },
}

/// A single scheduled lane event. `time_ms` and `lane` are fixed by the
/// chart; `judged`, `hit`, and `plan` are runtime-only and cleared on every
/// (re)start. Once `judged` is set, the note is never re-evaluated until the
/// working chart is rebuilt.
#[derive(Clone, Debug)]
pub struct Note {
    /// Milliseconds relative to the first note of the chart.
    pub time_ms: f64,
    pub lane: usize,
    pub judged: bool,
    pub hit: bool,
    pub plan: Option<AutoplayPlan>,
}

impl Note {
    pub const fn new(time_ms: f64, lane: usize) -> Self {
        Self { time_ms, lane, judged: false, hit: false, plan: None }
    }

    pub fn reset_runtime(&mut self) {
        self.judged = false;
        self.hit = false;
        self.plan = None;
    }
}
