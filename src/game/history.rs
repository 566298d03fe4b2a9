use log::info;
use rustc_hash::FxHashMap;

use crate::game::judgment::RunState;

/// Frozen outcome of one completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunStats {
    /// Hit counts, indexed parallel to the tier table in effect for the run.
    pub tier_counts: Vec<u32>,
    pub misses: u32,
    pub score: i64,
    pub longest_streak: u32,
}

impl RunStats {
    pub fn from_run(run: &RunState) -> Self {
        Self {
            tier_counts: run.tier_counts.clone(),
            misses: run.misses,
            score: run.score,
            longest_streak: run.longest_combo,
        }
    }

    fn accumulate(&mut self, other: &Self) {
        if self.tier_counts.len() < other.tier_counts.len() {
            self.tier_counts.resize(other.tier_counts.len(), 0);
        }
        for (total, &count) in self.tier_counts.iter_mut().zip(&other.tier_counts) {
            *total += count;
        }
        self.misses += other.misses;
        self.score += other.score;
        self.longest_streak = self.longest_streak.max(other.longest_streak);
    }
}

/// Best/worst/cumulative statistics for one chart fingerprint. Created on
/// the first completed run and updated in place afterwards; `best` and
/// `worst` are replaced only on strict score comparison, so ties keep the
/// record already stored.
#[derive(Clone, Debug)]
pub struct HistoryRecord {
    pub best: RunStats,
    pub worst: RunStats,
    pub total: RunStats,
    pub runs: u32,
    pub longest_streak: u32,
}

/// In-memory run history, keyed by chart content fingerprint.
#[derive(Debug, Default)]
pub struct ScoreHistory {
    records: FxHashMap<u64, HistoryRecord>,
}

impl ScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: u64) -> Option<&HistoryRecord> {
        self.records.get(&fingerprint)
    }

    pub fn record_run(&mut self, fingerprint: u64, stats: RunStats) -> &HistoryRecord {
        let record = self
            .records
            .entry(fingerprint)
            .and_modify(|record| {
                record.runs += 1;
                record.total.accumulate(&stats);
                record.longest_streak = record.longest_streak.max(stats.longest_streak);
                if stats.score > record.best.score {
                    record.best = stats.clone();
                }
                if stats.score < record.worst.score {
                    record.worst = stats.clone();
                }
            })
            .or_insert_with(|| HistoryRecord {
                best: stats.clone(),
                worst: stats.clone(),
                total: stats.clone(),
                runs: 1,
                longest_streak: stats.longest_streak,
            });
        info!(
            "run recorded for chart {fingerprint:#018x}: score {} (best {}, runs {})",
            stats.score, record.best.score, record.runs
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(score: i64, streak: u32, counts: &[u32]) -> RunStats {
        RunStats {
            tier_counts: counts.to_vec(),
            misses: 1,
            score,
            longest_streak: streak,
        }
    }

    #[test]
    fn first_run_seeds_all_fields() {
        let mut history = ScoreHistory::new();
        let record = history.record_run(42, stats(1000, 12, &[5, 3, 1, 0]));
        assert_eq!(record.runs, 1);
        assert_eq!(record.best.score, 1000);
        assert_eq!(record.worst.score, 1000);
        assert_eq!(record.total.score, 1000);
        assert_eq!(record.longest_streak, 12);
    }

    #[test]
    fn best_worst_total_track_two_runs() {
        let mut history = ScoreHistory::new();
        history.record_run(42, stats(1000, 12, &[5, 3, 1, 0]));
        history.record_run(42, stats(500, 4, &[2, 2, 2, 2]));

        let record = history.get(42).unwrap();
        assert_eq!(record.runs, 2);
        assert_eq!(record.best.score, 1000);
        assert_eq!(record.worst.score, 500);
        assert_eq!(record.total.score, 1500);
        assert_eq!(record.total.tier_counts, vec![7, 5, 3, 2]);
        assert_eq!(record.total.misses, 2);
        assert_eq!(record.longest_streak, 12);
    }

    #[test]
    fn tied_score_keeps_existing_best_and_worst() {
        let mut history = ScoreHistory::new();
        history.record_run(7, stats(800, 3, &[1]));
        let tied = RunStats { tier_counts: vec![9], misses: 0, score: 800, longest_streak: 9 };
        history.record_run(7, tied);

        let record = history.get(7).unwrap();
        // Same score: the original run stays as both best and worst.
        assert_eq!(record.best.tier_counts, vec![1]);
        assert_eq!(record.worst.tier_counts, vec![1]);
        assert_eq!(record.longest_streak, 9);
    }

    #[test]
    fn fingerprints_are_tracked_independently() {
        let mut history = ScoreHistory::new();
        history.record_run(1, stats(100, 1, &[1]));
        history.record_run(2, stats(900, 2, &[2]));
        assert_eq!(history.get(1).unwrap().best.score, 100);
        assert_eq!(history.get(2).unwrap().best.score, 900);
        assert!(history.get(3).is_none());
    }
}
