use crate::core::config::{resolve_api_key, TranscriptionConfig};
use crate::core::error::TranscriptionError;
use crate::services::retry::{send_with_retry, RetryPolicy};
use crate::utils::audio::{split_chunks, AudioSegmenter, AudioToolkit};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const AUDIO_EXTENSIONS: [&str; 9] = [
    "mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm", "ogg", "flac",
];

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str, language: &str) -> Result<String>;
}

/// OpenAI-compatible `/audio/transcriptions` client.
pub struct WhisperClient {
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl WhisperClient {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>, retry: RetryPolicy) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            retry,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &TranscriptionConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key)
            .context("Transcription API key missing: set transcription.api_key or OPENAI_API_KEY")?;
        Ok(Self::new(&api_key, &config.model, config.base_url.as_deref(), retry))
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str, language: &str) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!("Uploading {} ({} bytes) for transcription", file_name, audio.len());

        // A multipart body is consumed by sending, so every attempt builds a fresh form.
        let resp = send_with_retry("Whisper", self.retry, || {
            let part = Part::bytes(audio.clone()).file_name(file_name.to_string());
            let form = Form::new()
                .text("model", self.model.clone())
                .text("language", language.to_string())
                .text("response_format", "text")
                .part("file", part);
            Ok(self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .multipart(form))
        })
        .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Whisper API error {}: {}", status, error_text));
        }

        Ok(resp.text().await?.trim().to_string())
    }
}

pub fn is_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Turns an audio file into one transcript, splitting it first when it exceeds the upload limit.
pub struct AudioTranscriber {
    stt: Arc<dyn SpeechToText>,
    segmenter: Option<Arc<dyn AudioSegmenter>>,
    config: TranscriptionConfig,
}

impl AudioTranscriber {
    /// Looks for ffmpeg/ffprobe once; without them only the single-file path is available.
    pub async fn new(stt: Arc<dyn SpeechToText>, config: TranscriptionConfig) -> Self {
        let segmenter = AudioToolkit::detect()
            .await
            .map(|t| Arc::new(t) as Arc<dyn AudioSegmenter>);
        Self::with_segmenter(stt, segmenter, config)
    }

    pub fn with_segmenter(
        stt: Arc<dyn SpeechToText>,
        segmenter: Option<Arc<dyn AudioSegmenter>>,
        config: TranscriptionConfig,
    ) -> Self {
        Self {
            stt,
            segmenter,
            config,
        }
    }

    pub fn can_split(&self) -> bool {
        self.segmenter.is_some()
    }

    pub async fn split_and_transcribe_audio(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !is_audio_extension(path) {
            return Err(TranscriptionError::Validation(format!(
                "unsupported audio format {:?} (supported: {})",
                path.extension().unwrap_or_default(),
                AUDIO_EXTENSIONS.join(", ")
            )));
        }

        info!(
            "Transcribing {} ({:.1} MB)",
            path.display(),
            metadata.len() as f64 / (1024.0 * 1024.0)
        );

        if metadata.len() <= self.config.max_upload_bytes {
            self.transcribe_single(path, language).await
        } else {
            self.transcribe_chunked(path, language).await
        }
    }

    async fn transcribe_single(&self, path: &Path, language: &str) -> Result<String, TranscriptionError> {
        let audio = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        self.stt
            .transcribe(audio, &file_name, language)
            .await
            .map_err(|e| TranscriptionError::Service(format!("{:#}", e)))
    }

    async fn transcribe_chunked(&self, path: &Path, language: &str) -> Result<String, TranscriptionError> {
        let segmenter = self.segmenter.as_ref().ok_or_else(|| {
            TranscriptionError::UnsupportedOperation(format!(
                "{} exceeds the single-upload limit and ffmpeg/ffprobe are not installed",
                path.display()
            ))
        })?;

        let duration_ms = segmenter.read_duration_ms(path).await.map_err(|e| {
            TranscriptionError::Validation(format!("cannot read audio duration: {:#}", e))
        })?;
        let spans = split_chunks(duration_ms, self.config.max_chunk_ms, self.config.overlap_ms)?;
        info!(
            "Audio is {:.1} min long, split into {} chunks",
            duration_ms as f64 / 60_000.0,
            spans.len()
        );

        // Dropping the directory removes every chunk, on success and on error alike.
        let temp_dir = tempfile::Builder::new().prefix("s2a-chunks").tempdir()?;
        debug!("Writing chunks to {}", temp_dir.path().display());
        let mut files = Vec::with_capacity(spans.len());
        for (i, span) in spans.iter().enumerate() {
            let chunk_path = temp_dir.path().join(format!("chunk_{:04}.mp3", i));
            segmenter
                .extract_segment(path, *span, &chunk_path)
                .await
                .map_err(|e| TranscriptionError::Io(std::io::Error::other(format!("{:#}", e))))?;
            files.push(chunk_path);
        }

        self.transcribe_files_in_order(&files, language).await
    }

    /// Transcribes `files` concurrently and joins the texts by paragraph break in file order.
    pub async fn transcribe_files_in_order(
        &self,
        files: &[PathBuf],
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let stt = &self.stt;
        let results: Vec<Result<(usize, String), TranscriptionError>> =
            futures_util::stream::iter(files.iter().enumerate())
                .map(|(i, file)| {
                    let pb = pb.clone();
                    async move {
                        let audio = tokio::fs::read(file).await?;
                        let name = format!("chunk_{:04}.mp3", i);
                        let text = stt
                            .transcribe(audio, &name, language)
                            .await
                            .map_err(|e| {
                                TranscriptionError::Service(format!("chunk {}: {:#}", i, e))
                            })?;
                        pb.inc(1);
                        Ok((i, text))
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        pb.finish_and_clear();

        let mut texts = vec![String::new(); files.len()];
        for res in results {
            let (i, text) = res?;
            texts[i] = text;
        }
        Ok(texts.join("\n\n"))
    }
}
