use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::debug;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{CaseError, HarnessError, Result};
use crate::workload::CorpusConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
    pub min_time: Option<Duration>,
    pub repetitions: Option<u32>,
}

impl BenchConfig {
    pub fn new(profile: Profile, seed: u64) -> Self {
        Self {
            profile,
            seed,
            min_time: None,
            repetitions: None,
        }
    }

    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }

    pub fn timing(&self) -> TimingConfig {
        let base = match self.profile {
            Profile::Quick => TimingConfig {
                min_time: Duration::from_millis(50),
                repetitions: 1,
                ..TimingConfig::default()
            },
            Profile::Full => TimingConfig {
                min_time: Duration::from_millis(500),
                repetitions: 3,
                ..TimingConfig::default()
            },
        };
        TimingConfig {
            min_time: self.min_time.unwrap_or(base.min_time),
            repetitions: self.repetitions.unwrap_or(base.repetitions).max(1),
            ..base
        }
    }

    pub fn corpus(&self) -> CorpusConfig {
        let block_lines = match self.profile {
            Profile::Quick => 10_000,
            Profile::Full => 100_000,
        };
        CorpusConfig {
            field_target: 1_000,
            block_lines,
            seed: self.seed,
        }
    }
}

/// Knobs for the adaptive iteration search.
#[derive(Clone, Debug)]
pub struct TimingConfig {
    /// A round shorter than this is discarded and retried with more iterations.
    pub min_time: Duration,
    pub initial_iterations: u64,
    /// Upper bound for the per-round multiplier. The lower bound is 2.
    pub growth_factor: f64,
    pub max_rounds: u32,
    /// Hard ceiling on the iteration count. A round that hits it and is
    /// still shorter than `min_time` is `UnstableTiming`.
    pub max_iterations: u64,
    /// Timed rounds at the accepted iteration count.
    pub repetitions: u32,
    /// Reject the result when the repetitions' relative stddev exceeds this.
    pub max_relative_stddev: Option<f64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_time: Duration::from_millis(500),
            initial_iterations: 1,
            growth_factor: 10.0,
            max_rounds: 12,
            max_iterations: 1_000_000_000,
            repetitions: 1,
            max_relative_stddev: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Timer {
    Idle,
    Running(Instant),
    Stopped,
}

/// Live state of one timed round, handed to the case body.
///
/// The body loops on [`RunState::should_continue`]; the timer starts on the
/// first call and stops on the call that returns `false`, so work before and
/// after the loop is not measured.
#[derive(Debug)]
pub struct RunState {
    max_iterations: u64,
    completed: u64,
    timer: Timer,
    elapsed: Duration,
    bytes_per_iteration: Option<u64>,
    fields_per_iteration: Option<u64>,
    counters: BTreeMap<String, f64>,
}

impl RunState {
    pub fn new(max_iterations: u64) -> Self {
        Self {
            max_iterations,
            completed: 0,
            timer: Timer::Idle,
            elapsed: Duration::ZERO,
            bytes_per_iteration: None,
            fields_per_iteration: None,
            counters: BTreeMap::new(),
        }
    }

    pub fn should_continue(&mut self) -> bool {
        match self.timer {
            Timer::Idle => {
                if self.max_iterations == 0 {
                    self.timer = Timer::Stopped;
                    return false;
                }
                self.timer = Timer::Running(Instant::now());
                true
            }
            Timer::Running(start) => {
                self.completed += 1;
                if self.completed < self.max_iterations {
                    return true;
                }
                self.elapsed = start.elapsed();
                self.timer = Timer::Stopped;
                false
            }
            Timer::Stopped => false,
        }
    }

    /// Iterations the body has finished so far.
    pub fn iterations(&self) -> u64 {
        self.completed
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.timer, Timer::Stopped)
    }

    /// Bytes one pass over the workload touches.
    pub fn set_bytes_per_iteration(&mut self, bytes: u64) {
        self.bytes_per_iteration = Some(bytes);
    }

    /// Numeric fields one pass converts.
    pub fn set_fields_per_iteration(&mut self, fields: u64) {
        self.fields_per_iteration = Some(fields);
    }

    pub fn bytes_per_iteration(&self) -> Option<u64> {
        self.bytes_per_iteration
    }

    pub fn fields_per_iteration(&self) -> Option<u64> {
        self.fields_per_iteration
    }

    /// Free-form per-case value copied into the report row (thread count, chunk size).
    pub fn set_counter(&mut self, name: &str, value: f64) {
        self.counters.insert(name.to_string(), value);
    }

    pub fn counters(&self) -> &BTreeMap<String, f64> {
        &self.counters
    }
}

/// Outcome of [`run_adaptive`].
#[derive(Clone, Debug)]
pub struct Measured {
    pub iterations: u64,
    /// Mean over the repetitions.
    pub elapsed: Duration,
    pub rounds: u32,
    pub samples: Vec<Duration>,
    pub bytes_per_iteration: Option<u64>,
    pub fields_per_iteration: Option<u64>,
    pub counters: BTreeMap<String, f64>,
}

impl Measured {
    pub fn ns_per_iter(&self) -> f64 {
        self.elapsed.as_nanos() as f64 / self.iterations.max(1) as f64
    }

    /// Sample stddev over mean; zero for a single sample.
    pub fn relative_stddev(&self) -> f64 {
        relative_stddev(&self.samples)
    }
}

fn relative_stddev(samples: &[Duration]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let secs: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
    let n = secs.len() as f64;
    let mean = secs.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt() / mean
}

/// Iteration count for the round after one that ran `iters` in `elapsed`.
///
/// Always strictly greater than `iters` unless `iters` is already at the cap.
pub fn next_iterations(iters: u64, elapsed: Duration, cfg: &TimingConfig) -> u64 {
    let ceiling = cfg.growth_factor.max(2.0);
    let min_s = cfg.min_time.as_secs_f64();
    let elapsed_s = elapsed.as_secs_f64();

    let factor = if elapsed_s > 0.0 && elapsed_s / min_s > 0.1 {
        min_s * 1.4 / elapsed_s
    } else {
        ceiling
    };
    let factor = factor.clamp(2.0, ceiling);

    let grown = (iters as f64 * factor).ceil();
    let next = if grown >= cfg.max_iterations as f64 {
        cfg.max_iterations
    } else {
        (grown as u64).max(iters + 1)
    };
    next.min(cfg.max_iterations)
}

fn run_round<F>(body: &F, iterations: u64) -> Result<RunState>
where
    F: Fn(&mut RunState) -> std::result::Result<(), CaseError> + ?Sized,
{
    let mut state = RunState::new(iterations);
    body(&mut state).map_err(HarnessError::CaseFailed)?;
    if !state.is_finished() {
        return Err(HarnessError::CaseFailed(
            format!(
                "body returned after {} of {} iterations",
                state.iterations(),
                state.max_iterations()
            )
            .into(),
        ));
    }
    Ok(state)
}

/// Grow the iteration count until one round lasts at least `cfg.min_time`,
/// then time `cfg.repetitions` rounds at that count.
pub fn run_adaptive<F>(body: &F, cfg: &TimingConfig) -> Result<Measured>
where
    F: Fn(&mut RunState) -> std::result::Result<(), CaseError> + ?Sized,
{
    let mut iters = cfg.initial_iterations.clamp(1, cfg.max_iterations.max(1));
    let mut last_elapsed = Duration::ZERO;

    for round in 1..=cfg.max_rounds {
        let state = run_round(body, iters)?;
        let elapsed = state.elapsed();
        debug!("round {round}: {iters} iterations in {elapsed:?}");

        if elapsed < cfg.min_time && iters >= cfg.max_iterations {
            return Err(HarnessError::UnstableTiming {
                rounds: round,
                iterations: iters,
                elapsed,
                min_time: cfg.min_time,
            });
        }

        if elapsed >= cfg.min_time {
            let mut samples = vec![elapsed];
            let mut last = state;
            for _ in 1..cfg.repetitions {
                last = run_round(body, iters)?;
                samples.push(last.elapsed());
            }

            let total: Duration = samples.iter().sum();
            let measured = Measured {
                iterations: iters,
                elapsed: total / samples.len() as u32,
                rounds: round,
                samples,
                bytes_per_iteration: last.bytes_per_iteration(),
                fields_per_iteration: last.fields_per_iteration(),
                counters: last.counters().clone(),
            };

            if let Some(limit) = cfg.max_relative_stddev {
                if measured.relative_stddev() > limit {
                    return Err(HarnessError::UnstableTiming {
                        rounds: round,
                        iterations: iters,
                        elapsed: measured.elapsed,
                        min_time: cfg.min_time,
                    });
                }
            }
            return Ok(measured);
        }

        last_elapsed = elapsed;
        iters = next_iterations(iters, elapsed, cfg);
    }

    Err(HarnessError::UnstableTiming {
        rounds: cfg.max_rounds,
        iterations: iters,
        elapsed: last_elapsed,
        min_time: cfg.min_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::hint::black_box;

    fn quick_cfg() -> TimingConfig {
        TimingConfig {
            min_time: Duration::from_millis(2),
            ..TimingConfig::default()
        }
    }

    fn spin(state: &mut RunState) -> std::result::Result<(), CaseError> {
        while state.should_continue() {
            black_box((0..100u64).sum::<u64>());
        }
        state.set_bytes_per_iteration(8);
        state.set_fields_per_iteration(1);
        Ok(())
    }

    #[test]
    fn test_run_state_counts_and_stops() {
        let mut state = RunState::new(3);
        let mut passes = 0;
        while state.should_continue() {
            passes += 1;
        }
        assert_eq!(passes, 3);
        assert_eq!(state.iterations(), 3);
        assert!(state.is_finished());
        assert!(!state.should_continue());
        assert_eq!(state.iterations(), 3);
    }

    #[test]
    fn test_zero_iterations_never_runs() {
        let mut state = RunState::new(0);
        assert!(!state.should_continue());
        assert!(state.is_finished());
    }

    #[test]
    fn test_growth_strictly_increasing() {
        let cfg = TimingConfig::default();
        let mut iters = 1;
        for elapsed_us in [0u64, 1, 10, 1_000, 100_000, 400_000, 499_999] {
            let next = next_iterations(iters, Duration::from_micros(elapsed_us), &cfg);
            assert!(next > iters, "{next} <= {iters}");
            iters = next;
        }
    }

    #[test]
    fn test_growth_bounded_by_factor_and_cap() {
        let cfg = TimingConfig {
            max_iterations: 1_000,
            ..TimingConfig::default()
        };
        assert_eq!(next_iterations(10, Duration::ZERO, &cfg), 100);
        assert_eq!(next_iterations(10, Duration::from_millis(400), &cfg), 20);
        assert_eq!(next_iterations(500, Duration::ZERO, &cfg), 1_000);
    }

    #[test]
    fn test_adaptive_reaches_min_time() {
        let cfg = quick_cfg();
        let m = run_adaptive(&spin, &cfg).unwrap();
        assert!(m.iterations > 0);
        assert!(m.elapsed >= cfg.min_time);
        assert!(m.rounds <= cfg.max_rounds);
        assert_eq!(m.bytes_per_iteration, Some(8));
        assert_eq!(m.fields_per_iteration, Some(1));
    }

    #[test]
    fn test_only_final_round_reported() {
        let seen = Cell::new(Vec::<u64>::new());
        let body = |state: &mut RunState| -> std::result::Result<(), CaseError> {
            let mut v = seen.take();
            v.push(state.max_iterations());
            seen.set(v);
            spin(state)
        };
        let m = run_adaptive(&body, &quick_cfg()).unwrap();
        let rounds = seen.take();
        assert_eq!(rounds.len() as u32, m.rounds);
        assert_eq!(*rounds.last().unwrap(), m.iterations);
        assert!(rounds.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_repetitions_recorded() {
        let cfg = TimingConfig {
            repetitions: 3,
            ..quick_cfg()
        };
        let m = run_adaptive(&spin, &cfg).unwrap();
        assert_eq!(m.samples.len(), 3);
        assert!(m.relative_stddev() >= 0.0);
    }

    #[test]
    fn test_round_cap_gives_unstable_timing() {
        let cfg = TimingConfig {
            min_time: Duration::from_secs(60),
            max_rounds: 2,
            ..TimingConfig::default()
        };
        let err = run_adaptive(&spin, &cfg).unwrap_err();
        assert!(matches!(err, HarnessError::UnstableTiming { rounds: 2, .. }));
    }

    #[test]
    fn test_iteration_cap_below_min_time_is_unstable() {
        let cfg = TimingConfig {
            min_time: Duration::from_secs(3600),
            max_iterations: 1_000,
            ..TimingConfig::default()
        };
        let err = run_adaptive(&spin, &cfg).unwrap_err();
        match err {
            HarnessError::UnstableTiming {
                rounds,
                iterations,
                elapsed,
                min_time,
            } => {
                assert_eq!(rounds, 4);
                assert_eq!(iterations, 1_000);
                assert!(elapsed < min_time);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_counters_reach_measurement() {
        let body = |state: &mut RunState| -> std::result::Result<(), CaseError> {
            spin(state)?;
            state.set_counter("threads", 4.0);
            Ok(())
        };
        let m = run_adaptive(&body, &quick_cfg()).unwrap();
        assert_eq!(m.counters.get("threads"), Some(&4.0));
    }

    #[test]
    fn test_body_error_propagates() {
        let body = |_: &mut RunState| -> std::result::Result<(), CaseError> {
            "123x".parse::<i64>()?;
            Ok(())
        };
        let err = run_adaptive(&body, &quick_cfg()).unwrap_err();
        assert!(matches!(err, HarnessError::CaseFailed(_)));
    }

    #[test]
    fn test_body_that_skips_loop_fails() {
        let body = |_: &mut RunState| -> std::result::Result<(), CaseError> { Ok(()) };
        let err = run_adaptive(&body, &quick_cfg()).unwrap_err();
        assert!(matches!(err, HarnessError::CaseFailed(_)));
    }

    #[test]
    fn test_profile_overrides() {
        let mut cfg = BenchConfig::new(Profile::Full, 1);
        assert_eq!(cfg.timing().repetitions, 3);
        assert_eq!(cfg.corpus().block_lines, 100_000);

        cfg.min_time = Some(Duration::from_millis(5));
        cfg.repetitions = Some(0);
        let timing = cfg.timing();
        assert_eq!(timing.min_time, Duration::from_millis(5));
        assert_eq!(timing.repetitions, 1);
    }
}
