//! Confidence tracking and misconception classification.
//!
//! Every answer is paired with how sure the learner was. Crossing that with
//! correctness tells apart a solid answer from a lucky guess, and an honest
//! gap in knowledge from a confidently held wrong belief.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub const ALL: [ConfidenceLevel; 3] = [
        ConfidenceLevel::Low,
        ConfidenceLevel::Medium,
        ConfidenceLevel::High,
    ];

    /// Expected probability of being right at this confidence
    pub fn weight(&self) -> f64 {
        match self {
            ConfidenceLevel::Low => 1.0 / 3.0,
            ConfidenceLevel::Medium => 2.0 / 3.0,
            ConfidenceLevel::High => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "1" | "l" => Ok(ConfidenceLevel::Low),
            "medium" | "2" | "m" => Ok(ConfidenceLevel::Medium),
            "high" | "3" | "h" => Ok(ConfidenceLevel::High),
            other => anyhow::bail!("Unknown confidence level '{}'", other),
        }
    }
}

/// How urgently a learning state needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a learner stands on a question after answering it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningState {
    Mastered,
    Developing,
    LuckyGuess,
    KnowledgeGap,
    Confused,
    Misconception,
}

impl LearningState {
    pub const ALL: [LearningState; 6] = [
        LearningState::Mastered,
        LearningState::Developing,
        LearningState::LuckyGuess,
        LearningState::KnowledgeGap,
        LearningState::Confused,
        LearningState::Misconception,
    ];

    pub fn priority(&self) -> Priority {
        match self {
            LearningState::Mastered => Priority::None,
            LearningState::Developing => Priority::Low,
            LearningState::LuckyGuess => Priority::Medium,
            LearningState::KnowledgeGap => Priority::High,
            LearningState::Confused => Priority::High,
            LearningState::Misconception => Priority::Critical,
        }
    }

    /// Change applied to the 0-100 memory strength
    pub fn strength_delta(&self) -> i32 {
        match self {
            LearningState::Mastered => 20,
            LearningState::Developing => 10,
            LearningState::LuckyGuess => 5,
            LearningState::KnowledgeGap => -10,
            LearningState::Confused => -15,
            LearningState::Misconception => -25,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            LearningState::Mastered | LearningState::Developing | LearningState::LuckyGuess
        )
    }

    /// SM-2 style recall quality, 0-5
    pub fn quality(&self) -> u8 {
        match self {
            LearningState::Mastered => 5,
            LearningState::Developing => 4,
            LearningState::LuckyGuess => 3,
            LearningState::KnowledgeGap => 2,
            LearningState::Confused => 1,
            LearningState::Misconception => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningState::Mastered => "mastered",
            LearningState::Developing => "developing",
            LearningState::LuckyGuess => "lucky_guess",
            LearningState::KnowledgeGap => "knowledge_gap",
            LearningState::Confused => "confused",
            LearningState::Misconception => "misconception",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LearningState::Mastered => "Mastered",
            LearningState::Developing => "Developing",
            LearningState::LuckyGuess => "Lucky guess",
            LearningState::KnowledgeGap => "Knowledge gap",
            LearningState::Confused => "Confused",
            LearningState::Misconception => "Misconception",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LearningState::Mastered => "Correct and confident.",
            LearningState::Developing => "Correct, with some hesitation.",
            LearningState::LuckyGuess => "Correct, but you were guessing.",
            LearningState::KnowledgeGap => "Incorrect, and you knew you were unsure.",
            LearningState::Confused => "Incorrect, with moderate confidence.",
            LearningState::Misconception => "Incorrect, but you were sure you were right.",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            LearningState::Mastered => "Keep it fresh with occasional review.",
            LearningState::Developing => "Review again soon to build certainty.",
            LearningState::LuckyGuess => "Revisit the material, the right answer did not stick yet.",
            LearningState::KnowledgeGap => "Study this topic from the source material.",
            LearningState::Confused => "Compare the options carefully and reread the explanation.",
            LearningState::Misconception => {
                "Unlearn the wrong belief first: read the explanation and ask for a walkthrough."
            }
        }
    }
}

impl fmt::Display for LearningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LearningState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LearningState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown learning state '{}'", s))
    }
}

/// Map correctness and confidence to a learning state
pub fn classify(correct: bool, confidence: ConfidenceLevel) -> LearningState {
    match (correct, confidence) {
        (true, ConfidenceLevel::High) => LearningState::Mastered,
        (true, ConfidenceLevel::Medium) => LearningState::Developing,
        (true, ConfidenceLevel::Low) => LearningState::LuckyGuess,
        (false, ConfidenceLevel::Low) => LearningState::KnowledgeGap,
        (false, ConfidenceLevel::Medium) => LearningState::Confused,
        (false, ConfidenceLevel::High) => LearningState::Misconception,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_covers_every_combination() {
        assert_eq!(classify(true, ConfidenceLevel::High), LearningState::Mastered);
        assert_eq!(classify(true, ConfidenceLevel::Medium), LearningState::Developing);
        assert_eq!(classify(true, ConfidenceLevel::Low), LearningState::LuckyGuess);
        assert_eq!(classify(false, ConfidenceLevel::Low), LearningState::KnowledgeGap);
        assert_eq!(classify(false, ConfidenceLevel::Medium), LearningState::Confused);
        assert_eq!(classify(false, ConfidenceLevel::High), LearningState::Misconception);
    }

    #[test]
    fn test_correctness_is_preserved() {
        for confidence in ConfidenceLevel::ALL {
            assert!(classify(true, confidence).is_correct());
            assert!(!classify(false, confidence).is_correct());
        }
    }

    #[test]
    fn test_confident_errors_are_most_urgent() {
        let worst = LearningState::ALL
            .iter()
            .max_by_key(|s| s.priority())
            .copied();
        assert_eq!(worst, Some(LearningState::Misconception));
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::None < Priority::Low);
    }

    #[test]
    fn test_strength_delta_sign_follows_correctness() {
        for state in LearningState::ALL {
            assert_eq!(state.strength_delta() > 0, state.is_correct());
        }
    }

    #[test]
    fn test_parse_levels_and_states() {
        assert_eq!("HIGH".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::High);
        assert_eq!("2".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::Medium);
        assert!("sure".parse::<ConfidenceLevel>().is_err());

        for state in LearningState::ALL {
            assert_eq!(state.as_str().parse::<LearningState>().unwrap(), state);
        }
    }
}
