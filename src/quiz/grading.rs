use std::collections::HashSet;

use super::model::{Answer, Question, QuestionKind};

/// Share of expected keywords a short answer must mention
const SHORT_ANSWER_THRESHOLD: f64 = 0.4;

/// Words that carry no meaning when comparing free-text answers
const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "into", "their", "there", "which", "when", "where", "what",
    "they", "them", "then", "than", "have", "been", "were", "will", "would", "should", "could",
    "because", "about", "also", "some", "such", "only", "other", "each", "more", "most", "very",
];

/// Decide whether an answer is correct for a question
pub fn grade(question: &Question, answer: &Answer) -> bool {
    if answer.is_blank() {
        return false;
    }

    match (&question.kind, answer) {
        (QuestionKind::MultipleChoice { correct, .. }, Answer::Choice(choice)) => choice == correct,
        (QuestionKind::TrueFalse { answer: expected }, Answer::Bool(given)) => expected == given,
        (QuestionKind::FillInBlank { answer: expected }, Answer::Text(given)) => {
            fill_in_matches(expected, given)
        }
        (QuestionKind::ShortAnswer { expected }, Answer::Text(given)) => {
            short_answer_matches(expected, given)
        }
        _ => false,
    }
}

/// Percentage of correct answers, 0 when there is nothing to score
pub fn score_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (correct as f64 / total as f64) * 100.0
    }
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim_end_matches(['.', '!', '?', ',', ';', ':'])
        .trim()
        .to_lowercase()
}

fn fill_in_matches(expected: &str, given: &str) -> bool {
    let expected = normalize(expected);
    let given = normalize(given);

    if expected.is_empty() || given.is_empty() {
        return false;
    }

    expected == given || expected.contains(&given) || given.contains(&expected)
}

fn keywords(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn short_answer_matches(expected: &str, given: &str) -> bool {
    if given.trim().is_empty() {
        return false;
    }

    let expected_words = keywords(expected);
    if expected_words.is_empty() {
        return normalize(expected) == normalize(given);
    }

    let given_words = keywords(given);
    let overlap = expected_words.intersection(&given_words).count();

    overlap as f64 / expected_words.len() as f64 > SHORT_ANSWER_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind) -> Question {
        Question::new("prompt", kind)
    }

    #[test]
    fn test_multiple_choice() {
        let q = question(QuestionKind::MultipleChoice {
            options: vec!["Nucleus".into(), "Mitochondria".into(), "Ribosome".into()],
            correct: 1,
        });
        assert!(grade(&q, &Answer::Choice(1)));
        assert!(!grade(&q, &Answer::Choice(0)));
        assert!(!grade(&q, &Answer::Text("Mitochondria".into())));
    }

    #[test]
    fn test_true_false() {
        let q = question(QuestionKind::TrueFalse { answer: false });
        assert!(grade(&q, &Answer::Bool(false)));
        assert!(!grade(&q, &Answer::Bool(true)));
    }

    #[test]
    fn test_fill_in_blank_is_lenient_about_case_and_punctuation() {
        let q = question(QuestionKind::FillInBlank {
            answer: "Photosynthesis".into(),
        });
        assert!(grade(&q, &Answer::Text("photosynthesis.".into())));
        assert!(grade(&q, &Answer::Text("\"Photosynthesis\"".into())));
        assert!(!grade(&q, &Answer::Text("respiration".into())));
        assert!(!grade(&q, &Answer::Text("   ".into())));
    }

    #[test]
    fn test_short_answer_keyword_overlap() {
        let q = question(QuestionKind::ShortAnswer {
            expected: "Plants convert sunlight, water and carbon dioxide into glucose".into(),
        });
        assert!(grade(
            &q,
            &Answer::Text("they turn sunlight and carbon dioxide into glucose".into())
        ));
        assert!(!grade(&q, &Answer::Text("plants grow".into())));
    }

    #[test]
    fn test_short_answer_without_keywords_falls_back_to_equality() {
        let q = question(QuestionKind::ShortAnswer {
            expected: "H2O".into(),
        });
        assert!(grade(&q, &Answer::Text("h2o".into())));
        assert!(!grade(&q, &Answer::Text("CO2".into())));
    }

    #[test]
    fn test_score_percent() {
        assert_eq!(score_percent(0, 0), 0.0);
        assert_eq!(score_percent(3, 4), 75.0);
    }
}
