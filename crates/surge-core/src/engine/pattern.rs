//! Phase planning for the five attack patterns.
//!
//! Every count-bounded pattern is reduced up front to an ordered list of
//! [`Phase`]s whose sizes sum to the requested total (ramp-up may stop
//! short of it). The scheduler then runs the phases one after another.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::model::Pattern;

/// Number of waves in the wave pattern.
pub const WAVE_COUNT: u64 = 3;
/// Pause between two waves.
pub const WAVE_PAUSE: Duration = Duration::from_millis(2000);
/// Pause between the normal and spike phases.
pub const SPIKE_PAUSE: Duration = Duration::from_millis(1000);

/// What role a phase plays in its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Burst,
    Sustained,
    Plateau,
    Wave,
    /// The first spike phase: 80 % of the requests at reduced concurrency.
    Normal,
    /// The second spike phase: the remainder at full concurrency.
    Spike,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseKind::Burst => "burst",
            PhaseKind::Sustained => "sustained",
            PhaseKind::Plateau => "plateau",
            PhaseKind::Wave => "wave",
            PhaseKind::Normal => "normal",
            PhaseKind::Spike => "spike",
        };
        write!(f, "{s}")
    }
}

/// A batch of requests dispatched under one fixed concurrency level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Phase {
    pub kind: PhaseKind,
    /// 1-based position of the phase within the run.
    pub ordinal: usize,
    pub size: u64,
    /// Nominal concurrency; the limiter floors it at 1.
    pub concurrency: usize,
    /// Wait after this phase before starting the next one.
    pub pause_after: Duration,
}

impl Phase {
    pub fn new(kind: PhaseKind, size: u64, concurrency: usize, pause_after: Duration) -> Self {
        Self {
            kind,
            ordinal: 0,
            size,
            concurrency,
            pause_after,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.ordinal)
    }
}

/// Split `total` requests into the phases of `pattern`.
///
/// Empty phases are dropped and the final phase never carries a pause. The
/// phase sizes sum to at most `total`: exactly `total` for every pattern but
/// ramp-up, which stops after its end-concurrency plateau.
pub fn plan_phases(pattern: &Pattern, concurrency: u32, total: u64, delay: Duration) -> Vec<Phase> {
    let concurrency = concurrency as usize;

    let phases = match *pattern {
        Pattern::Burst => vec![Phase::new(PhaseKind::Burst, total, concurrency, Duration::ZERO)],
        Pattern::Sustained => sustained(concurrency, total, delay),
        Pattern::RampUp {
            start_concurrency,
            end_concurrency,
            step,
            ramp_up_time_ms,
        } => ramp_up(
            start_concurrency as u64,
            end_concurrency as u64,
            step as u64,
            Duration::from_millis(ramp_up_time_ms),
            total,
        ),
        Pattern::Wave => wave(concurrency, total),
        Pattern::Spike => spike(concurrency, total),
    };

    finalize(phases)
}

fn sustained(concurrency: usize, total: u64, delay: Duration) -> Vec<Phase> {
    let per_phase = concurrency.max(1) as u64;
    let mut phases = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let size = per_phase.min(remaining);
        phases.push(Phase::new(PhaseKind::Sustained, size, concurrency, delay));
        remaining -= size;
    }
    phases
}

/// Time between two plateaus: the ramp time spread over the number of steps.
pub fn plateau_interval(start: u64, end: u64, step: u64, ramp_up_time: Duration) -> Duration {
    let steps = end.saturating_sub(start).div_ceil(step.max(1)).max(1);
    ramp_up_time / steps as u32
}

fn ramp_up(start: u64, end: u64, step: u64, ramp_up_time: Duration, total: u64) -> Vec<Phase> {
    let interval = plateau_interval(start, end, step, ramp_up_time);
    let mut phases = Vec::new();
    let mut remaining = total;
    let mut current = start;

    loop {
        let size = current.min(remaining);
        phases.push(Phase::new(
            PhaseKind::Plateau,
            size,
            current as usize,
            interval,
        ));
        remaining -= size;
        if current >= end || remaining == 0 {
            break;
        }
        current = (current + step.max(1)).min(end);
    }

    phases
}

fn wave(concurrency: usize, total: u64) -> Vec<Phase> {
    let base = total / WAVE_COUNT;
    let last = total - base * (WAVE_COUNT - 1);
    vec![
        Phase::new(PhaseKind::Wave, base, concurrency, WAVE_PAUSE),
        Phase::new(PhaseKind::Wave, base, concurrency, WAVE_PAUSE),
        Phase::new(PhaseKind::Wave, last, concurrency, WAVE_PAUSE),
    ]
}

fn spike(concurrency: usize, total: u64) -> Vec<Phase> {
    // floor(total * 0.8) and floor(concurrency * 0.3), in exact integer form.
    let normal_size = total * 4 / 5;
    let reduced = concurrency * 3 / 10;
    if reduced == 0 {
        tracing::warn!(
            concurrency,
            "spike: reduced concurrency rounds down to 0, the limiter will use 1"
        );
    }
    vec![
        Phase::new(PhaseKind::Normal, normal_size, reduced, SPIKE_PAUSE),
        Phase::new(PhaseKind::Spike, total - normal_size, concurrency, Duration::ZERO),
    ]
}

fn finalize(phases: Vec<Phase>) -> Vec<Phase> {
    let mut phases: Vec<Phase> = phases.into_iter().filter(|p| p.size > 0).collect();
    for (i, phase) in phases.iter_mut().enumerate() {
        phase.ordinal = i + 1;
    }
    if let Some(last) = phases.last_mut() {
        last.pause_after = Duration::ZERO;
    }
    phases
}
