use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::time::{Duration, Instant};

use crate::config::{self, AutoplayMode, Config};
use crate::game::autoplay;
use crate::game::chart::Chart;
use crate::game::clock::{Transport, TransportState};
use crate::game::history::{RunStats, ScoreHistory};
use crate::game::judgment::{self, RunState, TierTable};
use crate::game::note::Note;
use crate::game::parsing;
use crate::game::snapshot::{self, Snapshot};

/// Engine driver. Owns the canonical chart, the per-run working notes, the
/// transport, and the run counters; everything mutable lives here rather
/// than in globals. The caller samples the wall clock once per frame and
/// passes the same value into `tick`.
pub struct App {
    chart: Chart,
    notes: Vec<Note>,
    transport: Transport,
    run: RunState,
    history: ScoreHistory,
    rng: StdRng,
    tier_table: TierTable,
    late_miss_ms: f64,
    drop_ms: f64,
    loop_runs: bool,
    autoplay: bool,
    autoplay_mode: AutoplayMode,
}

impl App {
    pub fn new(config: &Config, rng: StdRng) -> Self {
        Self {
            chart: Chart::empty(),
            notes: Vec::new(),
            transport: Transport::new(config.pre_roll_ms),
            run: RunState::new(config.tier_table.len()),
            history: ScoreHistory::new(),
            rng,
            tier_table: config.tier_table.clone(),
            late_miss_ms: config.late_miss_ms,
            drop_ms: config.drop_ms,
            loop_runs: config.loop_runs,
            autoplay: config.autoplay,
            autoplay_mode: config.autoplay_mode,
        }
    }

    /// Installs a chart and rewinds to Idle. Run history survives a reload;
    /// it is keyed by content fingerprint, not by the loaded instance.
    pub fn load_chart(&mut self, chart: Chart) {
        self.chart = chart;
        self.transport.seek_to_start();
        self.notes = self.chart.working_copy();
        self.run.reset();
        info!(
            "chart loaded: {} note(s), fingerprint {:#018x}",
            self.chart.len(),
            self.chart.fingerprint()
        );
    }

    /// Begins a fresh run: new working copy, zeroed counters, pre-roll.
    pub fn start(&mut self, wall_now_ms: f64) {
        self.notes = self.chart.working_copy();
        self.run.reset();
        self.transport.start(wall_now_ms);
    }

    /// Abandons the current run, if any, and starts over.
    pub fn restart(&mut self, wall_now_ms: f64) {
        self.start(wall_now_ms);
    }

    pub fn pause(&mut self, wall_now_ms: f64) {
        self.transport.pause(wall_now_ms);
    }

    pub fn resume(&mut self, wall_now_ms: f64) {
        self.transport.resume(wall_now_ms);
    }

    /// Rewinds to Idle without starting a new run or touching history.
    pub fn seek_to_start(&mut self) {
        self.transport.seek_to_start();
        self.notes = self.chart.working_copy();
        self.run.reset();
    }

    /// Manual lane activation. Judged at the logical time of the given wall
    /// sample; ignored outside Playing, so taps during pre-roll or pause
    /// never reach the judgment path.
    pub fn activate(&mut self, lane: usize, wall_now_ms: f64) {
        if !self.transport.is_playing() {
            return;
        }
        let at_ms = self.transport.logical_time_ms(wall_now_ms);
        judgment::evaluate_activation(&mut self.notes, &self.tier_table, &mut self.run, lane, at_ms);
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Advances the engine by one frame and returns the render snapshot.
    ///
    /// Order within a tick is fixed: transport promotion, late-miss sweep,
    /// simulator activations, completion check. The sweep runs before
    /// activations so a tap can never bind a note the sweep already owed a
    /// miss. Feedback events are drained into the snapshot; each event is
    /// delivered exactly once.
    pub fn tick(&mut self, wall_now_ms: f64) -> Snapshot {
        self.transport.update(wall_now_ms);

        if self.transport.is_playing() {
            let logical = self.transport.logical_time_ms(wall_now_ms);
            judgment::sweep_late_misses(&mut self.notes, self.late_miss_ms, &mut self.run, logical);
            if self.autoplay {
                let activations = autoplay::step(
                    &mut self.notes,
                    &self.tier_table,
                    self.autoplay_mode,
                    logical,
                    &mut self.rng,
                );
                for act in activations {
                    judgment::evaluate_activation(
                        &mut self.notes,
                        &self.tier_table,
                        &mut self.run,
                        act.lane,
                        act.at_ms,
                    );
                }
            }
            if self.notes.iter().all(|n| n.judged) {
                self.finish_run(wall_now_ms);
            }
        }

        let logical = self.transport.logical_time_ms(wall_now_ms);
        let snap = snapshot::build(
            logical,
            self.transport.state(),
            self.transport.countdown_ms(wall_now_ms),
            &self.notes,
            &self.run,
            self.drop_ms,
        );
        self.run.feedback.clear();
        snap
    }

    fn finish_run(&mut self, wall_now_ms: f64) {
        let stats = RunStats::from_run(&self.run);
        self.history.record_run(self.chart.fingerprint(), stats);
        self.transport.complete(self.chart.last_note_time_ms());
        if self.loop_runs {
            self.start(wall_now_ms);
        } else {
            self.transport.finalize();
        }
    }
}

/// Headless demo loop: plays the chart once (or forever when looping is
/// configured) and logs judgments as they land.
pub fn run() -> Result<(), Box<dyn Error>> {
    let config = config::get();

    let chart = match std::env::args().nth(1) {
        Some(path) => {
            info!("loading chart from '{path}'");
            parsing::parse_chart(&std::fs::read_to_string(&path)?, config.lanes)
        }
        None => parsing::parse_chart(&parsing::sample_chart_json(config.lanes), config.lanes),
    };

    let tier_names: Vec<String> =
        config.tier_table.tiers().iter().map(|t| t.name.clone()).collect();

    let mut app = App::new(&config, StdRng::from_os_rng());
    app.load_chart(chart);

    let origin = Instant::now();
    app.start(0.0);

    loop {
        let wall_now_ms = origin.elapsed().as_secs_f64() * 1000.0;
        let snap = app.tick(wall_now_ms);

        for event in &snap.feedback {
            match event.tier {
                Some(tier) => info!(
                    "lane {:>2}: {} ({:+.1}ms)  combo {}  score {}",
                    event.lane,
                    tier_names[tier],
                    event.delta_ms,
                    snap.summary.combo,
                    snap.summary.score
                ),
                None => info!("lane {:>2}: MISS ({:+.1}ms)", event.lane, event.delta_ms),
            }
        }

        if snap.transport == TransportState::Idle {
            let summary = &snap.summary;
            info!(
                "run complete: score {}  longest combo {}  tiers {:?}  misses {}",
                summary.score, summary.longest_combo, summary.tier_counts, summary.misses
            );
            if let Some(record) = app.history().get(app.chart().fingerprint()) {
                info!(
                    "history: best {}  worst {}  runs {}  longest streak {}",
                    record.best.score, record.worst.score, record.runs, record.longest_streak
                );
            }
            return Ok(());
        }

        std::thread::sleep(Duration::from_millis(16));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::ChartMeta;

    fn config() -> Config {
        Config { pre_roll_ms: 0.0, autoplay_mode: AutoplayMode::Perfect, ..Config::default() }
    }

    fn app_with_notes(config: &Config, times_lanes: &[(f64, usize)]) -> App {
        let notes = times_lanes.iter().map(|&(t, lane)| Note::new(t, lane)).collect();
        let mut app = App::new(config, StdRng::seed_from_u64(1));
        app.load_chart(Chart::new(ChartMeta::default(), notes, 7));
        app
    }

    #[test]
    fn perfect_autoplay_clears_the_chart() {
        let cfg = config();
        let mut app = app_with_notes(&cfg, &[(0.0, 0), (300.0, 1), (600.0, 2)]);
        app.start(0.0);

        app.tick(0.0);
        app.tick(300.0);
        let snap = app.tick(600.0);

        assert_eq!(snap.transport, TransportState::Idle);
        assert_eq!(snap.summary.score, 900);
        assert_eq!(snap.summary.longest_combo, 3);
        assert_eq!(snap.summary.misses, 0);

        let record = app.history().get(7).unwrap();
        assert_eq!(record.runs, 1);
        assert_eq!(record.best.score, 900);
    }

    #[test]
    fn unplayed_notes_are_swept_and_the_run_still_completes() {
        let cfg = Config { autoplay: false, ..config() };
        let mut app = app_with_notes(&cfg, &[(0.0, 0)]);
        app.start(0.0);

        app.tick(0.0);
        let snap = app.tick(100.0);

        assert_eq!(snap.summary.misses, 1);
        assert_eq!(snap.summary.score, 0);
        assert_eq!(snap.transport, TransportState::Idle);
        assert_eq!(app.history().get(7).unwrap().worst.misses, 1);
    }

    #[test]
    fn manual_activation_is_judged_at_logical_time() {
        let cfg = Config { autoplay: false, ..config() };
        let mut app = app_with_notes(&cfg, &[(0.0, 2)]);
        app.start(0.0);

        app.tick(0.0);
        app.activate(2, 3.0);
        let snap = app.tick(10.0);

        // 3ms late is inside the tightest stock window.
        assert_eq!(snap.summary.score, 300);
        assert_eq!(snap.summary.misses, 0);
        assert_eq!(snap.transport, TransportState::Idle);
    }

    #[test]
    fn feedback_is_delivered_exactly_once() {
        let cfg = Config { autoplay: false, ..config() };
        let mut app = app_with_notes(&cfg, &[(0.0, 0), (2000.0, 1)]);
        app.start(0.0);

        app.tick(0.0);
        app.activate(0, 2.0);
        let first = app.tick(10.0);
        assert_eq!(first.feedback.len(), 1);

        let second = app.tick(20.0);
        assert!(second.feedback.is_empty());
    }

    #[test]
    fn pause_freezes_the_sweep() {
        let cfg = Config { autoplay: false, ..config() };
        let mut app = app_with_notes(&cfg, &[(1000.0, 0)]);
        app.start(0.0);
        app.tick(0.0);

        app.pause(500.0);
        let frozen = app.tick(60_000.0);
        assert_eq!(frozen.transport, TransportState::Paused);
        assert_eq!(frozen.summary.misses, 0);

        app.resume(60_000.0);
        // Logical time picks up at 500ms; the note is not yet late.
        let resumed = app.tick(60_400.0);
        assert_eq!(resumed.summary.misses, 0);

        let late = app.tick(61_100.0);
        assert_eq!(late.summary.misses, 1);
    }

    #[test]
    fn taps_during_pre_roll_are_ignored() {
        let cfg = Config { pre_roll_ms: 3000.0, autoplay: false, ..config() };
        let mut app = app_with_notes(&cfg, &[(0.0, 0)]);
        app.start(0.0);

        let countdown = app.tick(1000.0);
        assert!(matches!(countdown.transport, TransportState::PreRoll { .. }));
        assert_eq!(countdown.countdown_ms, Some(2000.0));
        assert_eq!(countdown.logical_time_ms, -2000.0);

        // A tap 1ms before the deadline would be a perfect hit if judged.
        app.activate(0, 2999.0);
        let started = app.tick(3000.0);
        assert_eq!(started.transport, TransportState::Playing);
        // The pre-roll tap never reached the note.
        assert_eq!(started.summary.judged, 0);

        let late = app.tick(3100.0);
        assert_eq!(late.summary.misses, 1);
    }

    #[test]
    fn looping_restarts_and_accumulates_history() {
        let cfg = Config { loop_runs: true, ..config() };
        let mut app = app_with_notes(&cfg, &[(0.0, 0)]);
        app.start(0.0);

        let first = app.tick(0.0);
        assert!(matches!(first.transport, TransportState::PreRoll { .. }));
        assert_eq!(app.history().get(7).unwrap().runs, 1);

        app.tick(16.0);
        assert_eq!(app.history().get(7).unwrap().runs, 2);
    }

    #[test]
    fn restart_mid_run_discards_progress() {
        let cfg = Config { autoplay: false, ..config() };
        let mut app = app_with_notes(&cfg, &[(0.0, 0), (5000.0, 1)]);
        app.start(0.0);
        app.tick(0.0);
        app.activate(0, 1.0);

        app.restart(100.0);
        let snap = app.tick(100.0);
        assert_eq!(snap.summary.score, 0);
        assert_eq!(snap.summary.judged, 0);
        // History only records completed runs.
        assert!(app.history().get(7).is_none());
    }
}
