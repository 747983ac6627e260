use crate::core::config::{resolve_api_key, Config};
use crate::services::retry::{send_with_retry, RetryPolicy};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// JSON schema the model output must conform to.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Returns the raw model text; the provider is asked to emit JSON matching `schema`.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &ResponseSchema,
        temperature: f32,
    ) -> Result<String>;
}

/// Schema-constrained completion decoded into `T`.
pub async fn complete_structured<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    system: &str,
    user: &str,
    schema: &ResponseSchema,
    temperature: f32,
) -> Result<T> {
    let raw = llm.complete(system, user, schema, temperature).await?;
    let clean_json = strip_code_blocks(&raw);
    serde_json::from_str(&clean_json).with_context(|| {
        format!(
            "Model output does not match schema '{}': {}",
            schema.name,
            clean_json.chars().take(200).collect::<String>()
        )
    })
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

pub fn create_llm(config: &Config) -> Result<Arc<dyn LlmClient>> {
    let retry = RetryPolicy::new(config.llm.retry_count, config.llm.retry_delay_seconds);
    match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = config.llm.gemini.as_ref().context("Gemini config missing")?;
            Ok(Arc::new(GeminiClient::new(&cfg.api_key, &cfg.model, retry)))
        }
        "ollama" => {
            let cfg = config.llm.ollama.as_ref().context("Ollama config missing")?;
            Ok(Arc::new(OllamaClient::new(&cfg.base_url, &cfg.model, retry)))
        }
        "openai" => {
            let cfg = config.llm.openai.as_ref().context("OpenAI config missing")?;
            let api_key = resolve_api_key(&cfg.api_key)
                .context("OpenAI API key missing: set llm.openai.api_key or OPENAI_API_KEY")?;
            Ok(Arc::new(OpenAIClient::new(
                &api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
                retry,
            )))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    }
}

// --- Gemini ---
#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    model: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(api_key: &str, model: &str, retry: RetryPolicy) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            retry,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    response_mime_type: String,
    response_json_schema: Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn gemini_text(response_text: &str) -> Result<String> {
    let result: GeminiResponse = serde_json::from_str(response_text).map_err(|e| {
        anyhow!("Failed to parse Gemini response: {}. Body: {}", e, response_text)
    })?;

    if let Some(err) = result.error {
        return Err(anyhow!("Gemini API returned error: {}", err.message));
    }

    if let Some(first) = result.candidates.as_ref().and_then(|c| c.first()) {
        if let Some(part) = first.content.as_ref().and_then(|c| c.parts.first()) {
            return Ok(part.text.clone());
        }
        let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(anyhow!("Gemini response empty. Finish reason: {}", reason));
    }

    Err(anyhow!("Gemini response format unexpected or empty. Body: {}", response_text))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &ResponseSchema,
        temperature: f32,
    ) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: user.to_string() }],
            }],
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiPart { text: system.to_string() }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature,
                response_mime_type: "application/json".to_string(),
                response_json_schema: schema.schema.clone(),
            },
        };

        debug!("Gemini request '{}' ({} chars of input)", schema.name, user.len());
        let resp = send_with_retry("Gemini", self.retry, || {
            Ok(self.client.post(&url).json(&request_body))
        })
        .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        gemini_text(&response_text)
    }
}

// --- Ollama ---
#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str, retry: RetryPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            retry,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: Value,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn pair(system: &str, user: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage { role: "system".to_string(), content: system.to_string() },
            ChatMessage { role: "user".to_string(), content: user.to_string() },
        ]
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &ResponseSchema,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: ChatMessage::pair(system, user),
            stream: false,
            format: schema.schema.clone(),
            options: OllamaOptions { temperature },
        };

        debug!("Ollama request '{}' ({} chars of input)", schema.name, user.len());
        let resp = send_with_retry("Ollama", self.retry, || {
            Ok(self.client.post(&url).json(&request_body))
        })
        .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>, retry: RetryPolicy) -> Self {
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
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: OpenAIResponseFormat,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: String,
    json_schema: OpenAIJsonSchema,
}

#[derive(Serialize)]
struct OpenAIJsonSchema {
    name: String,
    strict: bool,
    schema: Value,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &ResponseSchema,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: ChatMessage::pair(system, user),
            temperature,
            response_format: OpenAIResponseFormat {
                kind: "json_schema".to_string(),
                json_schema: OpenAIJsonSchema {
                    name: schema.name.to_string(),
                    strict: true,
                    schema: schema.schema.clone(),
                },
            },
        };

        debug!("OpenAI request '{}' ({} chars of input)", schema.name, user.len());
        let resp = send_with_retry("OpenAI", self.retry, || {
            Ok(self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request_body))
        })
        .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        if let Some(choice) = result.choices.first() {
            if let Some(refusal) = &choice.message.refusal {
                return Err(anyhow!("OpenAI refused the request: {}", refusal));
            }
            if let Some(content) = &choice.message.content {
                return Ok(content.clone());
            }
        }

        Err(anyhow!("OpenAI response empty or missing content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
    }

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{
            "candidates": [
                {
                    "finishReason": "SAFETY",
                    "index": 0
                }
            ]
        }"#;

        let err = gemini_text(json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_gemini_response_parsing_empty_content() {
        let json = r#"{
            "candidates": [
                {
                    "content": { "role": "model" },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let candidate = &result.candidates.as_ref().unwrap()[0];
        assert!(candidate.content.as_ref().unwrap().parts.is_empty());
        assert!(gemini_text(json).is_err());
    }

    #[test]
    fn test_gemini_response_parsing_success() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "{\"ok\": true}" }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        assert_eq!(gemini_text(json).unwrap(), r#"{"ok": true}"#);
    }

    #[test]
    fn test_openai_response_parsing_success() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"title\": \"A Life\"}",
                    "refusal": null
                },
                "finish_reason": "stop"
            }]
        }"#;

        let result: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.choices[0].message.content.as_deref(),
            Some(r#"{"title": "A Life"}"#)
        );
        assert!(result.choices[0].message.refusal.is_none());
    }

    #[test]
    fn test_openai_request_carries_schema_and_temperature() {
        let request = OpenAIRequest {
            model: "gpt-4o".to_string(),
            messages: ChatMessage::pair("sys", "usr"),
            temperature: 0.3,
            response_format: OpenAIResponseFormat {
                kind: "json_schema".to_string(),
                json_schema: OpenAIJsonSchema {
                    name: "analysis_result".to_string(),
                    strict: true,
                    schema: serde_json::json!({"type": "object"}),
                },
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "analysis_result");
        assert_eq!(value["messages"][0]["role"], "system");
        assert!((value["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[derive(Debug)]
    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _: &str, _: &str, _: &ResponseSchema, _: f32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Deserialize, Debug)]
    struct Ack {
        ok: bool,
    }

    #[tokio::test]
    async fn test_complete_structured_strips_fences() -> Result<()> {
        let schema = ResponseSchema { name: "ack", schema: serde_json::json!({}) };
        let llm = FixedLlm("```json\n{\"ok\": true}\n```");
        let ack: Ack = complete_structured(&llm, "s", "u", &schema, 0.0).await?;
        assert!(ack.ok);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_structured_rejects_schema_violation() {
        let schema = ResponseSchema { name: "ack", schema: serde_json::json!({}) };
        let llm = FixedLlm(r#"{"nope": 1}"#);
        let err = complete_structured::<Ack>(&llm, "s", "u", &schema, 0.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ack"));
    }
}
