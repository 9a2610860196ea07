pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod results;

pub use config::{Pattern, RunLength, TestConfig};
pub use engine::{run_test, Scheduler};
pub use error::SurgeError;
pub use results::{CompletedRun, RequestResult, TestRunResult, TestStats};
