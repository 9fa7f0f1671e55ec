//! Fixed-Rate Tick Scheduler
//!
//! Owns simulation time for one participant. A real frame delta is split
//! into whole logic ticks and whole physics ticks at two independent rates;
//! the fractional remainder carries to the next frame.
//!
//! Physics ticks run their phases in a fixed order:
//!
//! ```text
//! before_physics -> before_physics_player -> integrate(dt) -> after_physics
//! ```
//!
//! Handlers are injected through [`TickHandler`], so the order is plain
//! sequencing inside [`TickScheduler::advance`].

use chrono::{DateTime, Utc};
use tracing::debug;
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::config::TickConfig;

/// Slack for accumulator comparisons, so evenly divisible frame deltas fire
/// the exact tick count despite float rounding.
pub const TICK_EPSILON: f64 = 1e-9;

/// Context of one logic tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogicTick {
    /// Zero-based logic tick index since start
    pub index: u64,
}

/// Context of one physics tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsStep {
    /// Zero-based physics tick index since start
    pub index: u64,
    /// Integration step (seconds)
    pub dt: f32,
    /// Simulated physics time at the start of this step (seconds)
    pub time: f64,
}

/// Receiver of tick phases. Every method runs to completion before the next.
pub trait TickHandler {
    /// Fired once per logic interval.
    fn logic_tick(&mut self, tick: LogicTick);

    /// World objects (platforms) move and inject forces.
    fn before_physics(&mut self, step: PhysicsStep);

    /// Player movement rules fold in input and external force.
    fn before_physics_player(&mut self, step: PhysicsStep);

    /// Run the integrator once for exactly `step.dt`.
    fn integrate(&mut self, step: PhysicsStep);

    /// Post-integration checks and per-tick resets.
    fn after_physics(&mut self, step: PhysicsStep);
}

/// Ticks fired by one `advance` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Logic ticks fired
    pub logic_ticks: u32,
    /// Full physics cycles fired
    pub physics_ticks: u32,
}

/// Simulation clock with two accumulators.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    logic_interval: f64,
    physics_interval: f64,
    logic_accumulator: f64,
    physics_accumulator: f64,
    started: bool,
    logic_ticks: u64,
    physics_ticks: u64,
}

impl TickScheduler {
    /// Create a stopped clock. Rates must be positive (see `GameConfig::validate`).
    pub fn new(logic_hz: f64, physics_hz: f64) -> Self {
        Self {
            logic_interval: 1.0 / logic_hz,
            physics_interval: 1.0 / physics_hz,
            logic_accumulator: 0.0,
            physics_accumulator: 0.0,
            started: false,
            logic_ticks: 0,
            physics_ticks: 0,
        }
    }

    /// Create from configuration.
    pub fn from_config(config: &TickConfig) -> Self {
        Self::new(config.logic_hz, config.physics_hz)
    }

    /// Start on the server: accumulators at zero.
    pub fn start_server(&mut self) {
        self.logic_accumulator = 0.0;
        self.physics_accumulator = 0.0;
        self.started = true;
        debug!("Server clock started");
    }

    /// Start on a client from the server's start timestamp.
    ///
    /// The logic accumulator is phase-shifted by the time elapsed since the
    /// server started, modulo one logic interval. A clock that reads earlier
    /// than the server still lands in `[0, interval)`.
    pub fn start_client(&mut self, start_utc: DateTime<Utc>, now_utc: DateTime<Utc>) {
        let elapsed = now_utc - start_utc;
        let elapsed_secs = match elapsed.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => elapsed.num_milliseconds() as f64 / 1_000.0,
        };

        self.logic_accumulator = elapsed_secs.rem_euclid(self.logic_interval);
        self.physics_accumulator = 0.0;
        self.started = true;
        debug!(
            "Client clock started, phase {:.4}s of {:.4}s",
            self.logic_accumulator, self.logic_interval
        );
    }

    /// Whether the clock has been started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Seconds between logic ticks.
    pub fn logic_interval(&self) -> f64 {
        self.logic_interval
    }

    /// Seconds between physics ticks.
    pub fn physics_interval(&self) -> f64 {
        self.physics_interval
    }

    /// Pending fraction of a logic interval.
    pub fn logic_accumulator(&self) -> f64 {
        self.logic_accumulator
    }

    /// Pending fraction of a physics interval.
    pub fn physics_accumulator(&self) -> f64 {
        self.physics_accumulator
    }

    /// Logic ticks fired since start.
    pub fn logic_ticks(&self) -> u64 {
        self.logic_ticks
    }

    /// Physics ticks fired since start.
    pub fn physics_ticks(&self) -> u64 {
        self.physics_ticks
    }

    /// Simulated physics time since start. Time base for movement timers.
    pub fn physics_time(&self) -> f64 {
        self.physics_ticks as f64 * self.physics_interval
    }

    /// Advance by one real frame, firing every due tick on `handler`.
    ///
    /// Does nothing before the clock is started.
    pub fn advance<H: TickHandler + ?Sized>(&mut self, delta_seconds: f64, handler: &mut H) -> TickReport {
        let mut report = TickReport::default();
        if !self.started || !(delta_seconds > 0.0) {
            return report;
        }

        self.logic_accumulator += delta_seconds;
        while self.logic_accumulator + TICK_EPSILON >= self.logic_interval {
            self.logic_accumulator = (self.logic_accumulator - self.logic_interval).max(0.0);

            let tick = LogicTick { index: self.logic_ticks };
            self.logic_ticks += 1;
            report.logic_ticks += 1;

            #[cfg(feature = "debug-tracing")]
            trace!("logic tick {}", tick.index);

            handler.logic_tick(tick);
        }

        self.physics_accumulator += delta_seconds;
        while self.physics_accumulator + TICK_EPSILON >= self.physics_interval {
            self.physics_accumulator = (self.physics_accumulator - self.physics_interval).max(0.0);

            let step = PhysicsStep {
                index: self.physics_ticks,
                dt: self.physics_interval as f32,
                time: self.physics_time(),
            };
            self.physics_ticks += 1;
            report.physics_ticks += 1;

            #[cfg(feature = "debug-tracing")]
            trace!("physics tick {} at {:.4}s", step.index, step.time);

            handler.before_physics(step);
            handler.before_physics_player(step);
            handler.integrate(step);
            handler.after_physics(step);
        }

        report
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Phase {
        Logic(u64),
        Before(u64),
        BeforePlayer(u64),
        Integrate(u64),
        After(u64),
    }

    #[derive(Default)]
    struct Recorder {
        phases: Vec<Phase>,
        dts: Vec<f32>,
    }

    impl TickHandler for Recorder {
        fn logic_tick(&mut self, tick: LogicTick) {
            self.phases.push(Phase::Logic(tick.index));
        }
        fn before_physics(&mut self, step: PhysicsStep) {
            self.phases.push(Phase::Before(step.index));
        }
        fn before_physics_player(&mut self, step: PhysicsStep) {
            self.phases.push(Phase::BeforePlayer(step.index));
        }
        fn integrate(&mut self, step: PhysicsStep) {
            self.dts.push(step.dt);
            self.phases.push(Phase::Integrate(step.index));
        }
        fn after_physics(&mut self, step: PhysicsStep) {
            self.phases.push(Phase::After(step.index));
        }
    }

    #[test]
    fn test_not_started_does_nothing() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        let mut rec = Recorder::default();
        let report = clock.advance(1.0, &mut rec);
        assert_eq!(report, TickReport::default());
        assert!(rec.phases.is_empty());
    }

    #[test]
    fn test_exact_tick_counts() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        clock.start_server();
        let mut rec = Recorder::default();

        let report = clock.advance(0.1, &mut rec);
        assert_eq!(report.logic_ticks, 2);
        assert_eq!(report.physics_ticks, 5);
        assert_eq!(rec.dts.len(), 5);
        assert!(rec.dts.iter().all(|dt| (*dt - 0.02).abs() < 1e-7));
    }

    #[test]
    fn test_physics_phase_order() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        clock.start_server();
        let mut rec = Recorder::default();
        clock.advance(0.04, &mut rec);

        assert_eq!(
            rec.phases,
            vec![
                Phase::Before(0),
                Phase::BeforePlayer(0),
                Phase::Integrate(0),
                Phase::After(0),
                Phase::Before(1),
                Phase::BeforePlayer(1),
                Phase::Integrate(1),
                Phase::After(1),
            ]
        );
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        clock.start_server();
        let mut rec = Recorder::default();

        assert_eq!(clock.advance(0.03, &mut rec).logic_ticks, 0);
        assert_eq!(clock.advance(0.03, &mut rec).logic_ticks, 1);
        assert!((clock.logic_accumulator() - 0.01).abs() < 1e-9);
        assert_eq!(clock.logic_ticks(), 1);
        assert_eq!(clock.physics_ticks(), 3);
    }

    #[test]
    fn test_many_small_frames_match_one_large() {
        let mut a = TickScheduler::new(20.0, 50.0);
        let mut b = TickScheduler::new(20.0, 50.0);
        a.start_server();
        b.start_server();
        let mut rec = Recorder::default();

        for _ in 0..100 {
            a.advance(0.01, &mut rec);
        }
        b.advance(1.0, &mut rec);

        assert_eq!(a.logic_ticks(), b.logic_ticks());
        assert_eq!(a.physics_ticks(), b.physics_ticks());
        assert_eq!(b.logic_ticks(), 20);
        assert_eq!(b.physics_ticks(), 50);
    }

    #[test]
    fn test_client_phase_shift() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        let start = Utc::now();
        clock.start_client(start, start + Duration::milliseconds(1_030));
        assert!(clock.is_started());
        assert!((clock.logic_accumulator() - 0.03).abs() < 1e-6);

        // 0.02s more completes the interval
        let mut rec = Recorder::default();
        assert_eq!(clock.advance(0.02, &mut rec).logic_ticks, 1);
    }

    #[test]
    fn test_client_clock_behind_server() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        let start = Utc::now();
        clock.start_client(start, start - Duration::milliseconds(10));
        let phase = clock.logic_accumulator();
        assert!((0.0..clock.logic_interval()).contains(&phase));
        assert!((phase - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_physics_time_advances() {
        let mut clock = TickScheduler::new(20.0, 50.0);
        clock.start_server();
        let mut rec = Recorder::default();
        clock.advance(0.5, &mut rec);
        assert!((clock.physics_time() - 0.5).abs() < 1e-9);
    }
}
