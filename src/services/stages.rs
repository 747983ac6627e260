use crate::core::config::Config;
use crate::core::error::StageError;
use crate::core::model::{AnalysisResult, AutobiographyResult, LifePeriod, PeriodExtraction};
use crate::core::state::{PeriodOutcome, PeriodSlots};
use crate::services::llm::{complete_structured, LlmClient};
use crate::services::prompts;
use crate::services::schema;
use anyhow::Result;
use futures_util::future::join_all;
use log::{info, warn};

/// Prompt language and sampling temperatures for the three stages.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub language: String,
    pub analysis_temperature: f32,
    pub period_temperature: f32,
    pub integration_temperature: f32,
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            language: config.narrative_language.clone(),
            analysis_temperature: config.generation.analysis_temperature,
            period_temperature: config.generation.period_temperature,
            integration_temperature: config.generation.integration_temperature,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            language: "Korean".to_string(),
            analysis_temperature: 0.3,
            period_temperature: 0.7,
            integration_temperature: 0.7,
        }
    }
}

pub async fn analyze(
    llm: &dyn LlmClient,
    settings: &GenerationSettings,
    transcript: &str,
) -> Result<AnalysisResult, StageError> {
    complete_structured(
        llm,
        &prompts::analyzer_system_prompt(&settings.language),
        &prompts::analysis_user_prompt(transcript),
        &schema::analysis_schema(),
        settings.analysis_temperature,
    )
    .await
    .map_err(|e| StageError::Analysis(format!("{:#}", e)))
}

pub async fn extract_period(
    llm: &dyn LlmClient,
    settings: &GenerationSettings,
    period: LifePeriod,
    transcript: &str,
) -> Result<PeriodExtraction> {
    complete_structured(
        llm,
        &prompts::period_system_prompt(period, &settings.language),
        &prompts::period_user_prompt(transcript),
        &schema::period_schema(),
        settings.period_temperature,
    )
    .await
}

/// Runs all five period writers concurrently. A failing branch is recorded in its own slot and
/// never affects the others; the gathered outcomes keep canonical order.
pub async fn extract_periods(
    llm: &dyn LlmClient,
    settings: &GenerationSettings,
    transcript: &str,
) -> PeriodSlots {
    let branches = LifePeriod::ALL.map(|period| async move {
        match extract_period(llm, settings, period, transcript).await {
            Ok(extraction) => {
                if extraction.has_content {
                    info!("{} chapter written", period);
                } else {
                    info!("{}: no material in transcript", period);
                }
                PeriodOutcome::Extracted(extraction)
            }
            Err(e) => {
                warn!("{} chapter failed: {:#}", period, e);
                PeriodOutcome::Failed(format!("{:#}", e))
            }
        }
    });

    PeriodSlots::from_ordered(join_all(branches).await)
}

pub async fn integrate(
    llm: &dyn LlmClient,
    settings: &GenerationSettings,
    analysis: &AnalysisResult,
    periods: &PeriodSlots,
) -> Result<AutobiographyResult, StageError> {
    let mut result: AutobiographyResult = complete_structured(
        llm,
        &prompts::integrator_system_prompt(&settings.language),
        &prompts::integration_user_prompt(analysis, periods),
        &schema::autobiography_schema(),
        settings.integration_temperature,
    )
    .await
    .map_err(|e| StageError::Integration(format!("{:#}", e)))?;

    result.sort_chapters();
    Ok(result)
}
