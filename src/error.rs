use thiserror::Error;

/// Errors raised by the quiz-taking state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("the quiz has not been started")]
    NotStarted,

    #[error("the quiz has already been started")]
    AlreadyStarted,

    #[error("the quiz has already been submitted")]
    AlreadySubmitted,

    #[error("time is up, the quiz was submitted automatically")]
    TimeExpired,

    #[error("answer the question before moving on")]
    AnswerRequired,

    #[error("rate your confidence before moving on")]
    ConfidenceRequired,

    #[error("already at the first question")]
    NoPreviousQuestion,

    #[error("question {index} does not exist (quiz has {total} questions)")]
    QuestionOutOfRange { index: usize, total: usize },

    #[error("{} question(s) still need an answer and a confidence rating", unanswered.len())]
    Incomplete { unanswered: Vec<usize> },

    #[error("the quiz has no questions")]
    Empty,
}

/// Errors raised while turning model output into questions
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no usable questions in the model response")]
    NoQuestions,

    #[error("malformed quiz JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised when validating quiz content before it is stored or taken
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("question text is empty")]
    EmptyPrompt,

    #[error("multiple choice questions need at least 2 options, got {0}")]
    TooFewOptions(usize),

    #[error("multiple choice questions allow at most 6 options, got {0}")]
    TooManyOptions(usize),

    #[error("correct option {index} is out of range for {len} options")]
    CorrectOutOfRange { index: usize, len: usize },

    #[error("expected answer is empty")]
    EmptyAnswer,

    #[error("quiz has no questions")]
    NoQuestions,
}
