use std::sync::Arc;

use chrono::Utc;
use truthmeter_common::Result;
use truthmeter_config::{AnalysisConfig, ExtractionMode, PricingConfig};
use truthmeter_llm::traits::ProviderBackend;
use uuid::Uuid;

use crate::cost::CostEstimator;
use crate::extract::extract_analysis;
use crate::history::HistoryStore;
use crate::model::{AnalysisHistoryEntry, AnalysisRequest, AnalysisResult};
use crate::prompt::PromptBuilder;

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub entry: AnalysisHistoryEntry,
}

/// Prompt, one provider call, extraction, cost, history append.
pub struct Analyzer {
    backend: Arc<dyn ProviderBackend>,
    history: Arc<dyn HistoryStore>,
    prompts: PromptBuilder,
    extraction: ExtractionMode,
    costs: CostEstimator,
}

impl Analyzer {
    pub fn new(
        backend: Arc<dyn ProviderBackend>,
        history: Arc<dyn HistoryStore>,
        analysis: &AnalysisConfig,
        pricing: &PricingConfig,
    ) -> Self {
        Self {
            backend,
            history,
            prompts: PromptBuilder::new(analysis.token_budget),
            extraction: analysis.extraction,
            costs: CostEstimator::new(pricing),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ProviderBackend> {
        &self.backend
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let prompt = self.prompts.build(request);
        tracing::info!(
            provider = %self.backend.provider(),
            model = %self.backend.model_name(),
            source_model = %request.source_model_label,
            content_chars = request.content.chars().count(),
            truncated_chars = prompt.truncated_content.chars().count(),
            "analysis.start"
        );

        let completion = self.backend.complete(&prompt.text).await.map_err(|e| {
            tracing::error!(error = %e, "analysis.provider_failed");
            e
        })?;

        let result = extract_analysis(&completion.text, self.extraction).map_err(|e| {
            tracing::warn!(
                error = %e,
                completion_chars = completion.text.chars().count(),
                "analysis.extract_failed"
            );
            e
        })?;

        let entry = AnalysisHistoryEntry {
            id: Uuid::new_v4().to_string(),
            source_model_label: request.source_model_label.clone(),
            truncated_content: prompt.truncated_content,
            result: result.clone(),
            created_at: Utc::now(),
            estimated_cost: self.costs.estimate(&prompt.text, &completion),
        };
        self.history.append(entry.clone()).await;

        tracing::info!(
            entry_id = %entry.id,
            overall_accuracy = result.overall_accuracy,
            confidence = result.confidence,
            estimated_cost = entry.estimated_cost,
            "analysis.done"
        );
        Ok(AnalysisOutcome { result, entry })
    }
}
