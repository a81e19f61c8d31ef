use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub const MAX_OPTIONS: usize = 6;
pub const DEFAULT_CONCEPT: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" | "normal" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => anyhow::bail!("Unknown difficulty '{}' (expected easy, medium or hard)", other),
        }
    }
}

/// The shape of a question and its answer key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice { options: Vec<String>, correct: usize },
    TrueFalse { answer: bool },
    FillInBlank { answer: String },
    ShortAnswer { expected: String },
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple choice",
            QuestionKind::TrueFalse { .. } => "true/false",
            QuestionKind::FillInBlank { .. } => "fill in the blank",
            QuestionKind::ShortAnswer { .. } => "short answer",
        }
    }

    /// Human readable answer key
    pub fn answer_text(&self) -> String {
        match self {
            QuestionKind::MultipleChoice { options, correct } => options
                .get(*correct)
                .map(|o| format!("{}) {}", option_letter(*correct), o))
                .unwrap_or_else(|| "?".to_string()),
            QuestionKind::TrueFalse { answer } => bool_label(*answer).to_string(),
            QuestionKind::FillInBlank { answer } => answer.clone(),
            QuestionKind::ShortAnswer { expected } => expected.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Option<i64>,
    pub prompt: String,
    pub kind: QuestionKind,
    pub explanation: Option<String>,
    pub concept: String,
}

impl Question {
    pub fn new(prompt: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: None,
            prompt: prompt.into(),
            kind,
            explanation: None,
            concept: DEFAULT_CONCEPT.to_string(),
        }
    }

    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        let concept = concept.into();
        let concept = concept.trim();
        self.concept = if concept.is_empty() {
            DEFAULT_CONCEPT.to_string()
        } else {
            concept.to_lowercase()
        };
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        self.explanation = if explanation.trim().is_empty() {
            None
        } else {
            Some(explanation)
        };
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        match &self.kind {
            QuestionKind::MultipleChoice { options, correct } => {
                if options.len() < 2 {
                    return Err(ValidationError::TooFewOptions(options.len()));
                }
                if options.len() > MAX_OPTIONS {
                    return Err(ValidationError::TooManyOptions(options.len()));
                }
                if *correct >= options.len() {
                    return Err(ValidationError::CorrectOutOfRange {
                        index: *correct,
                        len: options.len(),
                    });
                }
            }
            QuestionKind::TrueFalse { .. } => {}
            QuestionKind::FillInBlank { answer } => {
                if answer.trim().is_empty() {
                    return Err(ValidationError::EmptyAnswer);
                }
            }
            QuestionKind::ShortAnswer { expected } => {
                if expected.trim().is_empty() {
                    return Err(ValidationError::EmptyAnswer);
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub title: String,
    pub document_ids: Vec<i64>,
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    pub time_limit: Option<Duration>,
}

impl Quiz {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.questions.is_empty() {
            return Err(ValidationError::NoQuestions);
        }
        for question in &self.questions {
            question.validate()?;
        }
        Ok(())
    }

    pub fn time_limit_minutes(&self) -> Option<i64> {
        self.time_limit.map(|d| d.num_minutes())
    }
}

/// A learner's response to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Choice(usize),
    Bool(bool),
    Text(String),
}

impl Answer {
    pub fn is_blank(&self) -> bool {
        matches!(self, Answer::Text(t) if t.trim().is_empty())
    }

    /// Render the answer the way it was given, resolving option letters
    pub fn display_for(&self, question: &Question) -> String {
        match (self, &question.kind) {
            (Answer::Choice(i), QuestionKind::MultipleChoice { options, .. }) => options
                .get(*i)
                .map(|o| format!("{}) {}", option_letter(*i), o))
                .unwrap_or_else(|| format!("{})", option_letter(*i))),
            (Answer::Choice(i), _) => option_letter(*i).to_string(),
            (Answer::Bool(b), _) => bool_label(*b).to_string(),
            (Answer::Text(t), _) => t.clone(),
        }
    }
}

fn bool_label(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// 0 -> 'a', 1 -> 'b', ...
pub fn option_letter(index: usize) -> char {
    (b'a' + (index.min(25) as u8)) as char
}

/// 'a' / 'A' -> 0, ... ; None for anything that is not a letter
pub fn option_index(letter: char) -> Option<usize> {
    let lower = letter.to_ascii_lowercase();
    if lower.is_ascii_lowercase() {
        Some((lower as u8 - b'a') as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(options: &[&str], correct: usize) -> Question {
        Question::new(
            "Which organelle makes ATP?",
            QuestionKind::MultipleChoice {
                options: options.iter().map(|s| s.to_string()).collect(),
                correct,
            },
        )
    }

    #[test]
    fn test_validate_multiple_choice() {
        assert!(mc(&["Nucleus", "Mitochondria"], 1).validate().is_ok());
        assert_eq!(
            mc(&["Only"], 0).validate(),
            Err(ValidationError::TooFewOptions(1))
        );
        assert_eq!(
            mc(&["a", "b", "c"], 3).validate(),
            Err(ValidationError::CorrectOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            mc(&["1", "2", "3", "4", "5", "6", "7"], 0).validate(),
            Err(ValidationError::TooManyOptions(7))
        );
    }

    #[test]
    fn test_validate_rejects_blank_prompt_and_answer() {
        let q = Question::new("  ", QuestionKind::TrueFalse { answer: true });
        assert_eq!(q.validate(), Err(ValidationError::EmptyPrompt));

        let q = Question::new(
            "The powerhouse of the cell is the ___",
            QuestionKind::FillInBlank {
                answer: " ".to_string(),
            },
        );
        assert_eq!(q.validate(), Err(ValidationError::EmptyAnswer));
    }

    #[test]
    fn test_quiz_requires_questions() {
        let quiz = Quiz {
            id: None,
            owner_id: 1,
            title: "Empty".to_string(),
            document_ids: vec![],
            difficulty: Difficulty::Easy,
            questions: vec![],
            time_limit: None,
        };
        assert_eq!(quiz.validate(), Err(ValidationError::NoQuestions));
    }

    #[test]
    fn test_concept_is_normalized() {
        let q = Question::new("Q", QuestionKind::TrueFalse { answer: false }).with_concept(" ");
        assert_eq!(q.concept, DEFAULT_CONCEPT);

        let q = Question::new("Q", QuestionKind::TrueFalse { answer: false })
            .with_concept("Cell Biology");
        assert_eq!(q.concept, "cell biology");
    }

    #[test]
    fn test_option_letters() {
        assert_eq!(option_letter(0), 'a');
        assert_eq!(option_letter(3), 'd');
        assert_eq!(option_index('C'), Some(2));
        assert_eq!(option_index('7'), None);
    }

    #[test]
    fn test_kind_round_trips_through_json() {
        let kind = QuestionKind::MultipleChoice {
            options: vec!["x".into(), "y".into()],
            correct: 1,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"multiple_choice\""));
        let back: QuestionKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("impossible".parse::<Difficulty>().is_err());
    }
}
