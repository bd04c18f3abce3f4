//! ROI brightness time series from video frames, plus completion-beep
//! detection to pick the frame range to analyze.

pub mod api;
pub mod config;
pub mod core;

pub use api::{AnalysisRequest, AnalysisResult, AnalysisWorker, BeepDetectionWorker};
pub use config::{AnalysisConfig, BeepConfig};
pub use crate::core::{AnalysisError, AudioError};

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Install a stderr logger driven by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_logging() {
    LOGGER_INIT.call_once(|| {
        let started = flexi_logger::Logger::try_with_env_or_str("info")
            .and_then(|logger| logger.log_to_stderr().start());
        if let Err(e) = started {
            eprintln!("lumen_lib: logger initialization failed: {}", e);
        }
    });
}
