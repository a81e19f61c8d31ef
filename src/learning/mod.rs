pub mod analytics;
pub mod confidence;
pub mod scheduler;

pub use analytics::ResponseRecord;
pub use confidence::{ConfidenceLevel, LearningState, classify};
pub use scheduler::ReviewSchedule;
