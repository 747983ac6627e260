use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    /// Language the narrative is written in.
    #[serde(default = "default_narrative_language")]
    pub narrative_language: String,

    #[serde(default = "default_min_transcript_chars")]
    pub min_transcript_chars: usize,

    pub llm: LlmConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "openai", "gemini" or "ollama"
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
    #[serde(default = "default_creative_temperature")]
    pub period_temperature: f32,
    #[serde(default = "default_creative_temperature")]
    pub integration_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            analysis_temperature: default_analysis_temperature(),
            period_temperature: default_creative_temperature(),
            integration_temperature: default_creative_temperature(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    #[serde(default = "default_transcription_language")]
    pub language: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: String,
    /// Files above this size go through the chunked path.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_max_chunk_ms")]
    pub max_chunk_ms: u64,
    #[serde(default = "default_overlap_ms")]
    pub overlap_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: default_transcription_language(),
            model: default_whisper_model(),
            base_url: None,
            api_key: String::new(),
            max_upload_bytes: default_max_upload_bytes(),
            max_chunk_ms: default_max_chunk_ms(),
            overlap_ms: default_overlap_ms(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_narrative_language() -> String {
    "Korean".to_string()
}
fn default_min_transcript_chars() -> usize {
    100
}
fn default_retry_count() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    10
}
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_analysis_temperature() -> f32 {
    0.3
}
fn default_creative_temperature() -> f32 {
    0.7
}
fn default_transcription_language() -> String {
    "ko".to_string()
}
fn default_whisper_model() -> String {
    "whisper-1".to_string()
}
fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_max_chunk_ms() -> u64 {
    10 * 60 * 1000
}
fn default_overlap_ms() -> u64 {
    5000
}
fn default_concurrency() -> usize {
    4
}

/// Falls back to `OPENAI_API_KEY` when the configured key is blank.
pub fn resolve_api_key(configured: &str) -> Option<String> {
    if !configured.trim().is_empty() {
        return Some(configured.trim().to_string());
    }
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.transcription;
        if t.max_chunk_ms == 0 {
            anyhow::bail!("transcription.max_chunk_ms must be greater than zero");
        }
        if t.overlap_ms >= t.max_chunk_ms {
            anyhow::bail!(
                "transcription.overlap_ms ({}) must be smaller than max_chunk_ms ({})",
                t.overlap_ms,
                t.max_chunk_ms
            );
        }
        if t.concurrency == 0 {
            anyhow::bail!("transcription.concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)
            .with_context(|| format!("Failed to create {}", self.output_folder))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() -> Result<()> {
        let yaml = r#"
llm:
  provider: openai
  openai:
    api_key: sk-test
"#;
        let config = Config::from_yaml(yaml)?;

        assert_eq!(config.output_folder, "output");
        assert_eq!(config.narrative_language, "Korean");
        assert_eq!(config.min_transcript_chars, 100);
        assert_eq!(config.llm.retry_count, 3);
        assert_eq!(config.llm.openai.as_ref().map(|o| o.model.as_str()), Some("gpt-4o"));
        assert!((config.generation.analysis_temperature - 0.3).abs() < f32::EPSILON);
        assert!((config.generation.period_temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.transcription.max_chunk_ms, 600_000);
        assert_eq!(config.transcription.overlap_ms, 5_000);
        assert_eq!(config.transcription.max_upload_bytes, 26_214_400);
        Ok(())
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let yaml = r#"
llm:
  provider: ollama
  ollama:
    base_url: http://localhost:11434
    model: llama3
transcription:
  max_chunk_ms: 1000
  overlap_ms: 1000
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("overlap_ms"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("config.yml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_example_config_parses() -> Result<()> {
        let config = Config::from_yaml(include_str!("../../config.example.yml"))?;
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.transcription.concurrency, 4);
        Ok(())
    }

    #[test]
    fn test_configured_key_wins_over_env() {
        assert_eq!(resolve_api_key("  sk-abc "), Some("sk-abc".to_string()));
    }
}
