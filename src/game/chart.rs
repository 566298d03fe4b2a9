use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::game::note::Note;

/// Display-only chart metadata. The engine never reads these fields; they
/// exist so a frontend can label what is being played.
#[derive(Clone, Debug, Default)]
pub struct ChartMeta {
    pub game: Option<String>,
    pub character: Option<String>,
    pub start_time: Option<String>,
}

/// Canonical, immutable-by-convention chart: an ordered note list plus
/// metadata and a content fingerprint. Runs never mutate this copy; the
/// transport hands out fresh working copies instead.
#[derive(Clone, Debug)]
pub struct Chart {
    pub meta: ChartMeta,
    notes: Vec<Note>,
    fingerprint: u64,
}

impl Chart {
    /// Builds a chart from loader output. Notes are sorted ascending by time
    /// and shifted so the earliest note sits at t=0. An empty note list is a
    /// valid chart, not an error.
    pub fn new(meta: ChartMeta, mut notes: Vec<Note>, fingerprint: u64) -> Self {
        notes.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        if let Some(t0) = notes.first().map(|n| n.time_ms) {
            for n in &mut notes {
                n.time_ms -= t0;
            }
        }
        Self { meta, notes, fingerprint }
    }

    pub fn empty() -> Self {
        Self { meta: ChartMeta::default(), notes: Vec::new(), fingerprint: 0 }
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[inline(always)]
    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Scheduled time of the last note, or 0 for an empty chart.
    pub fn last_note_time_ms(&self) -> f64 {
        self.notes.last().map_or(0.0, |n| n.time_ms)
    }

    /// Deep-clones the note list with every runtime field cleared. This is
    /// the per-run working copy; the canonical list stays untouched.
    pub fn working_copy(&self) -> Vec<Note> {
        let mut copy = self.notes.clone();
        for n in &mut copy {
            n.reset_runtime();
        }
        copy
    }
}

/// Stable content fingerprint of raw chart data, used to key run history.
pub fn fingerprint_of(data: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data.as_bytes());
    hasher.finish()
}
