use log::info;

/// Trailing margin added when a run finalizes, so the last judgments stay
/// visible instead of the clock snapping back to zero.
pub const COMPLETE_MARGIN_MS: f64 = 50.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TransportState {
    Idle,
    /// Countdown before logical time reaches 0; no judging happens here.
    PreRoll { deadline_ms: f64 },
    Playing,
    Paused,
    Complete,
}

/// Transport state machine over a monotonic wall clock.
///
/// The load-bearing invariant is `logical = max(0, wall_now - epoch)`, with
/// the epoch recomputed on every transition into Playing: a fresh start sets
/// `epoch = wall_now` the instant pre-roll elapses, and a resume sets
/// `epoch = wall_now - paused_offset` so logical time continues seamlessly.
///
/// Every method takes `wall_now_ms` explicitly: the driver samples the wall
/// clock once per tick and feeds the same value everywhere, which keeps all
/// in-tick comparisons internally consistent.
#[derive(Clone, Debug)]
pub struct Transport {
    state: TransportState,
    pre_roll_ms: f64,
    epoch_ms: f64,
    paused_offset_ms: f64,
    /// Logical time reported in Idle and Complete; set when a run finalizes.
    pinned_ms: f64,
}

impl Transport {
    pub fn new(pre_roll_ms: f64) -> Self {
        Self {
            state: TransportState::Idle,
            pre_roll_ms: pre_roll_ms.max(0.0),
            epoch_ms: 0.0,
            paused_offset_ms: 0.0,
            pinned_ms: 0.0,
        }
    }

    #[inline(always)]
    pub const fn state(&self) -> TransportState {
        self.state
    }

    /// True only while activations may be judged.
    #[inline(always)]
    pub fn is_playing(&self) -> bool {
        matches!(self.state, TransportState::Playing)
    }

    /// Enters pre-roll from any state. The caller rebuilds the working chart
    /// and run counters alongside this call.
    pub fn start(&mut self, wall_now_ms: f64) {
        self.state = TransportState::PreRoll { deadline_ms: wall_now_ms + self.pre_roll_ms };
        self.paused_offset_ms = 0.0;
        self.pinned_ms = 0.0;
        info!("transport: pre-roll for {:.0}ms", self.pre_roll_ms);
    }

    /// Promotes PreRoll to Playing once the deadline elapses. The epoch is
    /// anchored to the deadline itself, not the sample that observed it, so
    /// logical time is exactly 0 at the promotion instant.
    pub fn update(&mut self, wall_now_ms: f64) {
        if let TransportState::PreRoll { deadline_ms } = self.state
            && wall_now_ms >= deadline_ms
        {
            self.epoch_ms = deadline_ms;
            self.state = TransportState::Playing;
            info!("transport: playing");
        }
    }

    pub fn pause(&mut self, wall_now_ms: f64) {
        if self.is_playing() {
            self.paused_offset_ms = self.logical_time_ms(wall_now_ms);
            self.state = TransportState::Paused;
            info!("transport: paused at {:.1}ms", self.paused_offset_ms);
        }
    }

    pub fn resume(&mut self, wall_now_ms: f64) {
        if self.state == TransportState::Paused {
            self.epoch_ms = wall_now_ms - self.paused_offset_ms;
            self.state = TransportState::Playing;
            info!("transport: resumed at {:.1}ms", self.paused_offset_ms);
        }
    }

    /// Playing -> Complete, once every working-chart note is judged.
    pub fn complete(&mut self, last_note_time_ms: f64) {
        if self.is_playing() {
            self.state = TransportState::Complete;
            self.pinned_ms = last_note_time_ms + COMPLETE_MARGIN_MS;
        }
    }

    /// Complete -> Idle (non-loop finalization). Logical time stays pinned
    /// just past the final note.
    pub fn finalize(&mut self) {
        if self.state == TransportState::Complete {
            self.state = TransportState::Idle;
        }
    }

    /// Stops and rewinds without entering pre-roll.
    pub fn seek_to_start(&mut self) {
        self.state = TransportState::Idle;
        self.paused_offset_ms = 0.0;
        self.pinned_ms = 0.0;
    }

    /// Logical song time. During pre-roll this is a non-positive countdown
    /// value for rendering only; it must never feed judgment.
    pub fn logical_time_ms(&self, wall_now_ms: f64) -> f64 {
        match self.state {
            TransportState::Idle | TransportState::Complete => self.pinned_ms,
            TransportState::PreRoll { deadline_ms } => (wall_now_ms - deadline_ms).min(0.0),
            TransportState::Playing => (wall_now_ms - self.epoch_ms).max(0.0),
            TransportState::Paused => self.paused_offset_ms,
        }
    }

    /// Remaining pre-roll countdown, for display.
    pub fn countdown_ms(&self, wall_now_ms: f64) -> Option<f64> {
        match self.state {
            TransportState::PreRoll { deadline_ms } => Some((deadline_ms - wall_now_ms).max(0.0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_roll_counts_down_then_plays_from_zero() {
        let mut t = Transport::new(3000.0);
        t.start(10_000.0);
        assert!(matches!(t.state(), TransportState::PreRoll { .. }));
        assert_eq!(t.logical_time_ms(11_000.0), -2000.0);
        assert_eq!(t.countdown_ms(11_000.0), Some(2000.0));

        t.update(11_000.0);
        assert!(!t.is_playing());

        // The epoch anchors to the deadline, so a late sample still yields
        // logical time measured from the promotion instant.
        t.update(13_004.0);
        assert!(t.is_playing());
        assert_eq!(t.logical_time_ms(13_004.0), 4.0);
    }

    #[test]
    fn pause_resume_round_trip_does_not_jump() {
        let mut t = Transport::new(0.0);
        t.start(0.0);
        t.update(0.0);
        assert!(t.is_playing());

        assert_eq!(t.logical_time_ms(500.0), 500.0);
        t.pause(500.0);
        // Wall time advances while paused; logical time does not.
        assert_eq!(t.logical_time_ms(9000.0), 500.0);

        t.resume(9000.0);
        assert_eq!(t.logical_time_ms(9000.0), 500.0);
        assert_eq!(t.logical_time_ms(9250.0), 750.0);
    }

    #[test]
    fn immediate_resume_within_one_tick() {
        let mut t = Transport::new(0.0);
        t.start(0.0);
        t.update(0.0);

        let before = t.logical_time_ms(1000.0);
        t.pause(1000.0);
        t.resume(1016.0);
        let after = t.logical_time_ms(1016.0);
        // pause() then resume() one tick later changes logical time by less
        // than the wall delta between the two samples.
        assert!((after - before).abs() < 16.1);
        assert!(after >= before);
    }

    #[test]
    fn completion_pins_time_past_last_note() {
        let mut t = Transport::new(0.0);
        t.start(0.0);
        t.update(0.0);
        t.complete(4200.0);
        assert_eq!(t.state(), TransportState::Complete);
        assert_eq!(t.logical_time_ms(99_999.0), 4250.0);

        t.finalize();
        assert_eq!(t.state(), TransportState::Idle);
        assert_eq!(t.logical_time_ms(123_456.0), 4250.0);
    }

    #[test]
    fn restart_from_complete_reenters_pre_roll() {
        let mut t = Transport::new(1000.0);
        t.start(0.0);
        t.update(1000.0);
        t.complete(500.0);

        t.start(2000.0);
        assert!(matches!(t.state(), TransportState::PreRoll { .. }));
        assert_eq!(t.logical_time_ms(2000.0), -1000.0);
        t.update(3000.0);
        assert!(t.is_playing());
        assert_eq!(t.logical_time_ms(3000.0), 0.0);
    }

    #[test]
    fn pause_is_ignored_outside_playing() {
        let mut t = Transport::new(1000.0);
        t.pause(0.0);
        assert_eq!(t.state(), TransportState::Idle);

        t.start(0.0);
        t.pause(100.0);
        assert!(matches!(t.state(), TransportState::PreRoll { .. }));
    }
}
