pub mod groq;
pub mod whisper;

pub use groq::GroqClient;

use anyhow::Result;

use crate::config::Config;
use crate::generation::misconception_messages;
use crate::quiz::{Answer, Question};

/// Build a Groq client from the saved config, if an API key is available
pub fn client_from_config(config: &Config) -> Result<GroqClient> {
    let api_key = config.get_api_key().ok_or_else(|| {
        anyhow::anyhow!("No API key configured. Run 'quizwhiz config' or set GROQ_API_KEY.")
    })?;
    Ok(GroqClient::new(api_key, config.default_model.clone()))
}

/// Stream a short walkthrough of why the learner's answer was wrong
pub async fn explain_misconception(
    client: &GroqClient,
    question: &Question,
    learner_answer: Option<&Answer>,
) -> Result<String> {
    let messages = misconception_messages(question, learner_answer);
    client.chat_stream(&messages).await
}
