pub mod grading;
pub mod model;
pub mod session;

pub use model::{Answer, Difficulty, Question, QuestionKind, Quiz};
pub use session::{Advance, QuizOutcome, QuizSession, SubmitReason};
