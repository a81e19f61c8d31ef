use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::multipart;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const GROQ_WHISPER_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const DEFAULT_WHISPER_MODEL: &str = "whisper-large-v3-turbo";

/// Speech-to-text for recorded lecture notes
#[derive(Debug, Clone)]
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    pub model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperClient {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string()),
        }
    }

    /// Transcribe an audio file
    pub async fn transcribe(&self, file_path: &Path) -> Result<String> {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("notes.mp3")
            .to_string();

        let file_bytes = tokio::fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read audio file: {:?}", file_path))?;
        debug!("Uploading {} ({} bytes) for transcription", file_name, file_bytes.len());

        let file_part = multipart::Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(guess_mime_type(file_path))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(GROQ_WHISPER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .context("Failed to send request to Groq Whisper")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Groq Whisper API error ({}): {}", status, text);
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse Whisper response")?;

        info!("Transcribed {} characters", transcription.text.len());
        Ok(transcription.text)
    }
}

fn guess_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("mp4" | "m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "audio/mpeg",
    }
}

async fn check_ffmpeg() -> bool {
    tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .is_ok()
}

/// Extract a mono 16kHz mp3 track from a recorded video
pub async fn extract_audio_from_video(video_path: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(video_path)
        .with_context(|| format!("Failed to resolve path: {:?}", video_path))?;
    if !canonical.is_file() {
        anyhow::bail!("Path is not a regular file: {:?}", video_path);
    }
    let input_str = canonical
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in video path"))?;

    if !check_ffmpeg().await {
        anyhow::bail!(
            "ffmpeg is required to transcribe video recordings. Install it with:\n\
             - Ubuntu: sudo apt install ffmpeg\n\
             - macOS: brew install ffmpeg"
        );
    }

    let timestamp = chrono::Utc::now().timestamp();
    let output_path = std::env::temp_dir().join(format!(
        "quizwhiz-audio-{}-{}.mp3",
        std::process::id(),
        timestamp
    ));
    let output_str = output_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in output path"))?;

    let status = tokio::process::Command::new("ffmpeg")
        .args([
            "-i",
            input_str,
            "-vn",
            "-acodec",
            "libmp3lame",
            "-ar",
            "16000",
            "-ac",
            "1",
            "-y",
            output_str,
        ])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .context("Failed to run ffmpeg")?;

    if !status.success() {
        anyhow::bail!("ffmpeg failed to extract audio from video");
    }

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(guess_mime_type(Path::new("lecture.M4A")), "audio/mp4");
        assert_eq!(guess_mime_type(Path::new("notes.wav")), "audio/wav");
        assert_eq!(guess_mime_type(Path::new("unknown")), "audio/mpeg");
    }
}
