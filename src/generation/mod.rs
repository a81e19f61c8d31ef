pub mod parser;

pub use parser::parse_response;

use anyhow::{Context, Result};
use log::info;

use crate::llm::groq::Message;
use crate::quiz::model::{Answer, Difficulty, Question};
use crate::storage::Document;

/// Upper bound on document text sent with a generation request
pub const MAX_CONTEXT_CHARS: usize = 10_000;
const MAX_CONTEXT_DOCUMENTS: usize = 10;

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 30;

const QUIZ_SYSTEM_PROMPT: &str = r#"You write practice quizzes from a student's course materials.

Respond with a single JSON object and nothing else:

{"questions": [
  {"type": "multiple_choice", "prompt": "...", "options": ["...", "...", "...", "..."],
   "answer": "b", "explanation": "...", "concept": "..."},
  {"type": "true_false", "prompt": "...", "answer": true, "explanation": "...", "concept": "..."},
  {"type": "fill_in_blank", "prompt": "... ___ ...", "answer": "...", "explanation": "...", "concept": "..."},
  {"type": "short_answer", "prompt": "...", "answer": "...", "explanation": "...", "concept": "..."}
]}

Rules:
- Base every question only on the provided materials
- "concept" is a short topic tag (2-4 words) shared by related questions
- "explanation" says why the answer is right and what a common mistake is
- Multiple choice questions have exactly one correct option
- Order questions from easier to harder"#;

const TUTOR_SYSTEM_PROMPT: &str = r#"You are a patient tutor. The student answered a quiz question confidently but got it wrong.

1. Name the likely misconception behind their answer in one sentence
2. Explain the correct reasoning step by step
3. Give one short example that makes the difference clear

Keep it under 200 words. Do not lecture."#;

/// Something that can answer a chat-style prompt
#[allow(async_fn_in_trait)]
pub trait CompletionClient {
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: usize,
}

impl QuizRequest {
    pub fn new(topic: impl Into<String>, difficulty: Difficulty, question_count: usize) -> Self {
        Self {
            topic: topic.into(),
            difficulty,
            question_count: question_count.clamp(MIN_QUESTIONS, MAX_QUESTIONS),
        }
    }

    fn user_message(&self, context: &str) -> String {
        let focus = if self.topic.trim().is_empty() {
            "Cover the most important topics.".to_string()
        } else {
            format!("Focus on: {}", self.topic.trim())
        };

        format!(
            "Create a {} quiz with {} questions (mix of question types) from these materials:\n\n{}\n\n{}",
            self.difficulty, self.question_count, context, focus
        )
    }
}

/// Concatenate documents into a bounded prompt context
pub fn build_context(documents: &[Document], max_chars: usize) -> String {
    let mut context = String::new();
    let mut total_chars = 0;

    for doc in documents.iter().take(MAX_CONTEXT_DOCUMENTS) {
        let header = format!("--- Document: {} ---\n", doc.filename);
        let overhead = header.len() + 2;
        if total_chars + overhead >= max_chars {
            break;
        }

        let remaining = max_chars - total_chars - overhead;
        let content = truncate_at_char_boundary(&doc.content, remaining);
        if content.trim().is_empty() {
            continue;
        }

        context.push_str(&header);
        context.push_str(content);
        context.push_str("\n\n");
        total_chars += overhead + content.len();
    }

    context
}

fn truncate_at_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Ask the model for a quiz and parse the questions out of its reply
pub async fn generate_quiz<C: CompletionClient>(
    client: &C,
    request: &QuizRequest,
    context: &str,
) -> Result<Vec<Question>> {
    let messages = vec![
        Message::system(QUIZ_SYSTEM_PROMPT),
        Message::user(request.user_message(context)),
    ];

    let response = client.complete(&messages).await?;
    let mut questions =
        parse_response(&response).context("Could not read questions from the model response")?;

    questions.truncate(request.question_count);
    info!(
        "Generated {} questions ({} difficulty)",
        questions.len(),
        request.difficulty
    );
    Ok(questions)
}

/// Messages asking for a walkthrough of a confidently wrong answer
pub fn misconception_messages(question: &Question, learner_answer: Option<&Answer>) -> Vec<Message> {
    let given = learner_answer
        .map(|a| a.display_for(question))
        .unwrap_or_else(|| "(no answer)".to_string());

    let mut prompt = format!(
        "Question: {}\nStudent's answer: {}\nCorrect answer: {}",
        question.prompt,
        given,
        question.kind.answer_text()
    );
    if let Some(explanation) = &question.explanation {
        prompt.push_str(&format!("\nReference explanation: {}", explanation));
    }

    vec![Message::system(TUTOR_SYSTEM_PROMPT), Message::user(prompt)]
}
