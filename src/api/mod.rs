pub mod analysis;
pub mod audio;
pub mod worker;

pub use analysis::{
    run_analysis, AnalysisEvent, AnalysisOutcome, AnalysisRequest, AnalysisResult, AnalysisWorker,
    RoiSeries,
};
pub use audio::{BeepDetectionWorker, BeepRequest, DetectionEvent};
pub use worker::{CancelToken, WorkerHandle};
