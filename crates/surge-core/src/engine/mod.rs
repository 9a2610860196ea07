pub mod aggregator;
pub mod executor;
pub mod limiter;
pub mod pattern;
pub mod progress;
pub mod scheduler;

pub use aggregator::{compute_stats, percentile, run_stats, time_series, TimeBucketEntry};
pub use executor::RequestExecutor;
pub use limiter::{Limiter, Permit};
pub use pattern::{plan_phases, Phase, PhaseKind};
pub use progress::{ProgressObserver, ProgressSnapshot, PROGRESS_WINDOW};
pub use scheduler::{run_test, Scheduler};
