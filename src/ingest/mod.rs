pub mod pdf;
pub mod text;

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::llm::whisper::{self, WhisperClient};

/// Supported source material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    Text,
    Markdown,
    /// Recorded notes: audio
    Audio,
    /// Recorded notes: video, transcribed from its audio track
    Video,
    Unknown,
}

impl ContentType {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("pdf") => ContentType::Pdf,
            Some("txt") => ContentType::Text,
            Some("md" | "markdown") => ContentType::Markdown,
            Some("mp3" | "wav" | "m4a" | "ogg" | "flac") => ContentType::Audio,
            Some("mp4" | "mkv" | "avi" | "mov" | "webm") => ContentType::Video,
            _ => ContentType::Unknown,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, ContentType::Audio | ContentType::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Text => "text",
            ContentType::Markdown => "markdown",
            ContentType::Audio => "audio-notes",
            ContentType::Video => "video-notes",
            ContentType::Unknown => "unknown",
        }
    }
}

/// Extracted content from a file
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub source: String,
    pub content_type: ContentType,
    pub text: String,
}

/// Extract text from a document, transcribing recordings when needed
pub async fn extract_from_file(path: &Path) -> Result<ExtractedContent> {
    let content_type = ContentType::from_path(path);

    let text = match content_type {
        ContentType::Pdf => pdf::extract(path)?,
        ContentType::Text | ContentType::Markdown | ContentType::Unknown => text::extract(path)?,
        ContentType::Audio => transcribe_audio(path).await?,
        ContentType::Video => transcribe_video(path).await?,
    };

    if text.trim().is_empty() {
        anyhow::bail!("No text could be extracted from {:?}", path);
    }

    Ok(ExtractedContent {
        source: path.display().to_string(),
        content_type,
        text,
    })
}

async fn transcribe_audio(path: &Path) -> Result<String> {
    let config = Config::load()?;
    let api_key = config
        .get_api_key()
        .ok_or_else(|| anyhow::anyhow!("No API key configured for transcription"))?;

    WhisperClient::new(api_key, None).transcribe(path).await
}

async fn transcribe_video(path: &Path) -> Result<String> {
    let audio_path = whisper::extract_audio_from_video(path).await?;
    let result = transcribe_audio(&audio_path).await;
    let _ = std::fs::remove_file(&audio_path);
    result
}
