pub mod audio;
pub mod error;
pub mod stats;
pub mod video;

pub use audio::AudioError;
pub use error::AnalysisError;
