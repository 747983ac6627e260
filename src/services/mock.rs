//! Scripted stand-ins for the remote services, shared by the workflow and job tests.

use crate::core::model::LifePeriod;
use crate::services::llm::{LlmClient, ResponseSchema};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ScriptedLlm {
    /// Schema name of every call, in call order.
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Period of every completed extraction, in completion order.
    pub completions: Arc<Mutex<Vec<LifePeriod>>>,
    pub integration_prompts: Arc<Mutex<Vec<String>>>,
    pub fail_analysis: bool,
    pub fail_integration: bool,
    pub failing_periods: Vec<LifePeriod>,
    pub empty_periods: Vec<LifePeriod>,
    pub delays: HashMap<LifePeriod, Duration>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self, schema: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == schema).count()
    }

    fn period_of(system: &str) -> Option<LifePeriod> {
        LifePeriod::ALL
            .into_iter()
            .find(|p| system.contains(&format!("specialising in {} (", p.label())))
    }

    pub fn extraction_title(period: LifePeriod) -> String {
        format!("{} title", period.label())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &ResponseSchema,
        _temperature: f32,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(schema.name.to_string());

        match schema.name {
            "analysis_result" => {
                if self.fail_analysis {
                    return Err(anyhow!("analysis service unavailable"));
                }
                Ok(json!({
                    "author_name": "Kim Younghee",
                    "birth_year": 1955,
                    "current_age": null,
                    "summary": "Born in Andong, taught for thirty years.",
                    "detected_periods": ["Childhood", "Youth", "Middle Age"],
                    "main_themes": ["family", "education"]
                })
                .to_string())
            }
            "period_extraction" => {
                let period = Self::period_of(system)
                    .ok_or_else(|| anyhow!("unrecognised period prompt"))?;
                if let Some(delay) = self.delays.get(&period) {
                    tokio::time::sleep(*delay).await;
                }
                self.completions.lock().unwrap().push(period);
                if self.failing_periods.contains(&period) {
                    return Err(anyhow!("{} writer timed out", period));
                }
                let has_content = !self.empty_periods.contains(&period);
                Ok(json!({
                    "period": period.label(),
                    "age_range": period.age_range(),
                    "title": Self::extraction_title(period),
                    "content": format!("{} content", period.label()),
                    "key_events": ["a", "b", "c", "d", "e"],
                    "emotions": ["joy", "fear", "hope", "grief"],
                    "lessons_learned": null,
                    "has_content": has_content
                })
                .to_string())
            }
            "autobiography_result" => {
                self.integration_prompts.lock().unwrap().push(user.to_string());
                if self.fail_integration {
                    return Err(anyhow!("integration service unavailable"));
                }
                // Chapters come back in reverse order; the stage must restore life order.
                let chapters: Vec<_> = LifePeriod::ALL
                    .into_iter()
                    .rev()
                    .filter(|p| user.contains(&format!("Title: {}", Self::extraction_title(*p))))
                    .map(|p| json!({ "period": p.label(), "title": p.label(), "content": "..." }))
                    .collect();
                Ok(format!(
                    "```json\n{}\n```",
                    json!({
                        "title": "A Life in Andong",
                        "author_name": "Kim Younghee",
                        "prologue": "It began in a small village.",
                        "chapters": chapters,
                        "epilogue": "And so it goes on.",
                        "key_themes": ["family", "education", "resilience", "faith", "home"],
                        "life_lessons": ["patience", "kindness", "courage", "humility", "gratitude"]
                    })
                ))
            }
            other => Err(anyhow!("unexpected schema {}", other)),
        }
    }
}
