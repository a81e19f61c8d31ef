//! Turn model output into quiz questions.
//!
//! The model is asked for JSON, but it does not always comply. When no JSON
//! object can be found the numbered markdown layout is parsed instead.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::quiz::model::{Question, QuestionKind, option_index};

#[derive(Debug, Deserialize)]
struct RawQuiz {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(alias = "question")]
    prompt: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default, alias = "correct_answer")]
    answer: Value,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default, alias = "topic")]
    concept: Option<String>,
}

/// Parse a model response into validated questions
pub fn parse_response(text: &str) -> Result<Vec<Question>, ParseError> {
    let questions = match extract_json_object(text) {
        Some(json) => match parse_json(json) {
            Ok(questions) => questions,
            // Braces in a markdown reply (set notation, code) are not JSON
            Err(e) => {
                warn!("Model response is not valid quiz JSON ({}), trying text parsing", e);
                let questions = parse_text(text);
                if questions.is_empty() {
                    return Err(e);
                }
                questions
            }
        },
        None => {
            warn!("Model response contained no JSON, falling back to text parsing");
            parse_text(text)
        }
    };

    if questions.is_empty() {
        return Err(ParseError::NoQuestions);
    }
    Ok(questions)
}

/// Find the outermost `{ ... }` in the text, skipping code fences
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_json(json: &str) -> Result<Vec<Question>, ParseError> {
    let raw: RawQuiz = serde_json::from_str(json)?;

    let questions = raw
        .questions
        .into_iter()
        .enumerate()
        .filter_map(|(i, rq)| match convert(rq) {
            Some(q) => match q.validate() {
                Ok(()) => Some(q),
                Err(e) => {
                    warn!("Dropping generated question {}: {}", i + 1, e);
                    None
                }
            },
            None => {
                warn!("Dropping generated question {}: unrecognised shape", i + 1);
                None
            }
        })
        .collect();

    Ok(questions)
}

fn convert(raw: RawQuestion) -> Option<Question> {
    let kind_name = raw.kind.trim().to_lowercase().replace(['-', ' ', '/'], "_");

    let kind = match kind_name.as_str() {
        "multiple_choice" | "mcq" | "mc" => {
            let correct = resolve_choice(&raw.answer, &raw.options)?;
            QuestionKind::MultipleChoice {
                options: raw.options.iter().map(|o| strip_option_prefix(o)).collect(),
                correct,
            }
        }
        "true_false" | "truefalse" | "boolean" => QuestionKind::TrueFalse {
            answer: resolve_bool(&raw.answer)?,
        },
        "fill_in_blank" | "fill_in_the_blank" | "fill_blank" | "fill" => {
            QuestionKind::FillInBlank {
                answer: value_text(&raw.answer)?,
            }
        }
        "short_answer" | "short" | "open" => QuestionKind::ShortAnswer {
            expected: value_text(&raw.answer)?,
        },
        // Unlabelled: infer from what is present
        _ if raw.options.len() >= 2 => QuestionKind::MultipleChoice {
            correct: resolve_choice(&raw.answer, &raw.options)?,
            options: raw.options.iter().map(|o| strip_option_prefix(o)).collect(),
        },
        _ => QuestionKind::ShortAnswer {
            expected: value_text(&raw.answer)?,
        },
    };

    let mut question = Question::new(raw.prompt.trim(), kind);
    if let Some(explanation) = raw.explanation {
        question = question.with_explanation(explanation.trim());
    }
    if let Some(concept) = raw.concept {
        question = question.with_concept(concept);
    }
    Some(question)
}

/// Accepts an index, the option text itself, or a letter.
///
/// Option text wins over letters so short options like "Be" are not read as "b".
fn resolve_choice(answer: &Value, options: &[String]) -> Option<usize> {
    match answer {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => {
            let s = s.trim();
            let wanted = s.to_lowercase();
            if let Some(index) = options
                .iter()
                .position(|o| strip_option_prefix(o).to_lowercase() == wanted)
            {
                return Some(index);
            }

            let mut chars = s.chars();
            let first = chars.next()?;
            let rest = chars.as_str().trim_start_matches([')', '.', ':']).trim();
            if !rest.is_empty() && s.len() > 2 {
                return None;
            }
            option_index(first).filter(|index| *index < options.len())
        }
        _ => None,
    }
}

fn resolve_bool(answer: &Value) -> Option<bool> {
    match answer {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" => Some(true),
            "false" | "f" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn value_text(answer: &Value) -> Option<String> {
    match answer {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// "b) Mitochondria" -> "Mitochondria"
fn strip_option_prefix(option: &str) -> String {
    let trimmed = option.trim();
    extract_option(trimmed)
        .map(|(_, text)| text)
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parse the numbered markdown layout:
///
/// ```text
/// 1. Question text
///    a) Option A
///    b) Option B
///    **Answer: b)**
/// ```
fn parse_text(text: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let Some(q_text) = extract_question_text(lines[i]) else {
            i += 1;
            continue;
        };

        let mut options = Vec::new();
        let mut j = i + 1;
        while j < lines.len() {
            match extract_option(lines[j].trim()) {
                Some((letter, text)) => {
                    options.push((letter, text));
                    j += 1;
                }
                None => break,
            }
        }

        if options.len() >= 2 {
            let answer = find_answer_text(&lines[j..]);
            let correct = answer
                .as_deref()
                .and_then(|a| a.chars().find(|c| c.is_ascii_alphabetic()))
                .and_then(option_index)
                .filter(|idx| *idx < options.len());

            match correct {
                Some(correct) => questions.push(Question::new(
                    q_text,
                    QuestionKind::MultipleChoice {
                        options: options.into_iter().map(|(_, t)| t).collect(),
                        correct,
                    },
                )),
                None => debug!("Skipping multiple choice question without an answer key"),
            }
            i = if answer.is_some() { j + 1 } else { j };
            continue;
        }

        if let Some(answer) = find_answer_text(&lines[j..]) {
            let kind = if q_text.contains("___") {
                QuestionKind::FillInBlank { answer }
            } else if let Some(b) = resolve_bool(&Value::String(answer.clone())) {
                QuestionKind::TrueFalse { answer: b }
            } else {
                QuestionKind::ShortAnswer { expected: answer }
            };
            questions.push(Question::new(q_text, kind));
            i = j + 1;
            continue;
        }

        i += 1;
    }

    questions
        .into_iter()
        .filter(|q| q.validate().is_ok())
        .collect()
}

fn extract_question_text(line: &str) -> Option<String> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("Q:").or_else(|| line.strip_prefix("Q.")) {
        let rest = rest.trim();
        return (!rest.is_empty()).then(|| rest.to_string());
    }

    // "**1.** question"
    if let Some(inner) = line.strip_prefix("**") {
        if let Some(end) = inner.find("**") {
            let num_part = &inner[..end];
            if num_part.chars().any(|c| c.is_ascii_digit()) {
                let rest = inner[end..].trim_start_matches("**").trim();
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
            }
        }
    }

    // "1. question" or "1) question"
    if line.starts_with(|c: char| c.is_ascii_digit()) {
        let num_end = line
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(line.len());
        let rest = line[num_end..].trim_start_matches(['.', ')', ':']).trim();
        if !rest.is_empty() {
            return Some(rest.to_string());
        }
    }

    None
}

fn extract_option(line: &str) -> Option<(char, String)> {
    let first = line.chars().next()?;
    let lower = first.to_ascii_lowercase();
    if !('a'..='f').contains(&lower) {
        return None;
    }

    let rest = &line[first.len_utf8()..];
    let rest = rest
        .strip_prefix(')')
        .or_else(|| rest.strip_prefix('.'))
        .or_else(|| rest.strip_prefix(':'))?;
    let text = rest.trim();
    if text.is_empty() {
        return None;
    }
    Some((lower, text.to_string()))
}

fn find_answer_text(lines: &[&str]) -> Option<String> {
    for line in lines.iter().take(3) {
        let cleaned = line.trim().trim_matches('*').trim();
        let lower = cleaned.to_lowercase();
        if let Some(rest) = lower.strip_prefix("answer") {
            let offset = cleaned.len() - rest.len();
            let text = cleaned[offset..]
                .trim_start_matches([':', '*'])
                .trim()
                .trim_end_matches('*')
                .trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_with_code_fence() {
        let response = r#"Here is your quiz:
```json
{
  "questions": [
    {"type": "multiple_choice", "prompt": "What makes ATP?",
     "options": ["a) Nucleus", "b) Mitochondria", "c) Golgi"], "answer": "b",
     "explanation": "Cellular respiration happens there.", "concept": "Cell Energy"},
    {"type": "true_false", "prompt": "Bacteria have a nucleus.", "answer": false},
    {"type": "fill_in_blank", "prompt": "Plants make food by ___.", "answer": "photosynthesis"},
    {"type": "short_answer", "prompt": "Why do cells divide?", "answer": "Growth and repair of tissue"}
  ]
}
```"#;
        let questions = parse_response(response).unwrap();
        assert_eq!(questions.len(), 4);

        assert_eq!(
            questions[0].kind,
            QuestionKind::MultipleChoice {
                options: vec!["Nucleus".into(), "Mitochondria".into(), "Golgi".into()],
                correct: 1,
            }
        );
        assert_eq!(questions[0].concept, "cell energy");
        assert!(questions[0].explanation.is_some());
        assert_eq!(questions[1].kind, QuestionKind::TrueFalse { answer: false });
        assert_eq!(questions[1].concept, "general");
        assert!(matches!(questions[2].kind, QuestionKind::FillInBlank { .. }));
        assert!(matches!(questions[3].kind, QuestionKind::ShortAnswer { .. }));
    }

    #[test]
    fn test_json_answer_by_index_or_text() {
        let response = r#"{"questions": [
            {"type": "mcq", "question": "2+2?", "options": ["3", "4"], "answer": 1},
            {"type": "multiple_choice", "prompt": "Capital of France?", "options": ["Paris", "Rome"], "answer": "Paris"}
        ]}"#;
        let questions = parse_response(response).unwrap();
        assert_eq!(questions.len(), 2);
        assert!(matches!(
            questions[0].kind,
            QuestionKind::MultipleChoice { correct: 1, .. }
        ));
        assert!(matches!(
            questions[1].kind,
            QuestionKind::MultipleChoice { correct: 0, .. }
        ));
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let response = r#"{"questions": [
            {"type": "multiple_choice", "prompt": "Broken", "options": ["only"], "answer": "a"},
            {"type": "true_false", "prompt": "Ok?", "answer": "maybe"},
            {"type": "true_false", "prompt": "Water is wet", "answer": "true"}
        ]}"#;
        let questions = parse_response(response).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].prompt, "Water is wet");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = parse_response("{ not json }").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_text_fallback() {
        let response = "## Multiple Choice
1. Which organelle contains DNA?
   a) Nucleus
   b) Ribosome
   c) Vacuole
   **Answer: a)**

## Fill in the Blank
2. The process of ___ splits one cell into two.
   **Answer: mitosis**

## Short Answer
3. Explain osmosis.
   **Answer: movement of water across a membrane**
";
        let questions = parse_response(response).unwrap();
        assert_eq!(questions.len(), 3);
        assert!(matches!(
            questions[0].kind,
            QuestionKind::MultipleChoice { correct: 0, .. }
        ));
        assert_eq!(
            questions[1].kind,
            QuestionKind::FillInBlank {
                answer: "mitosis".into()
            }
        );
        assert!(matches!(questions[2].kind, QuestionKind::ShortAnswer { .. }));
    }

    #[test]
    fn test_short_option_text_beats_letters() {
        let response = r#"{"questions": [
            {"type": "multiple_choice", "prompt": "Which is an alkaline earth metal with atomic number 4?",
             "options": ["Be", "Mg", "Ca"], "answer": "Be"},
            {"type": "multiple_choice", "prompt": "Lightest noble gas?",
             "options": ["Ne", "He", "Ar"], "answer": "b)"}
        ]}"#;
        let questions = parse_response(response).unwrap();
        assert!(matches!(
            questions[0].kind,
            QuestionKind::MultipleChoice { correct: 0, .. }
        ));
        assert!(matches!(
            questions[1].kind,
            QuestionKind::MultipleChoice { correct: 1, .. }
        ));
    }

    #[test]
    fn test_braces_in_markdown_reply_use_text_fallback() {
        let response = "1. Which set is {1, 2} a subset of?
   a) {1}
   b) {1, 2, 3}
   **Answer: b)**";
        let questions = parse_response(response).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].prompt, "Which set is {1, 2} a subset of?");
        assert_eq!(
            questions[0].kind,
            QuestionKind::MultipleChoice {
                options: vec!["{1}".into(), "{1, 2, 3}".into()],
                correct: 1,
            }
        );
    }

    #[test]
    fn test_nothing_parsable() {
        assert!(matches!(
            parse_response("Sorry, I cannot help with that."),
            Err(ParseError::NoQuestions)
        ));
    }
}
