use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::AnalysisHistoryEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAverages {
    pub factual_correctness: f64,
    pub logical_consistency: f64,
    pub clarity: f64,
    pub depth: f64,
}

/// Counts by overall accuracy: high >= 80, medium 50..=79, low < 50.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyBands {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBreakdown {
    pub source_model_label: String,
    pub count: usize,
    pub average_accuracy: f64,
}

/// Aggregate statistics over the stored history. Recomputed on every read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub total_analyses: usize,
    pub average_accuracy: f64,
    pub average_metrics: MetricAverages,
    pub average_confidence: f64,
    pub total_cost: f64,
    pub accuracy_bands: AccuracyBands,
    pub by_model: Vec<ModelBreakdown>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn mean(entries: &[AnalysisHistoryEntry], f: impl Fn(&AnalysisHistoryEntry) -> u8) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let sum: f64 = entries.iter().map(|e| f64::from(f(e))).sum();
    round1(sum / entries.len() as f64)
}

impl HistoryReport {
    pub fn from_entries(entries: &[AnalysisHistoryEntry]) -> Self {
        let mut bands = AccuracyBands::default();
        for e in entries {
            match e.result.overall_accuracy {
                80.. => bands.high += 1,
                50..=79 => bands.medium += 1,
                _ => bands.low += 1,
            }
        }

        let mut per_model: HashMap<&str, (usize, u64)> = HashMap::new();
        for e in entries {
            let slot = per_model.entry(e.source_model_label.as_str()).or_default();
            slot.0 += 1;
            slot.1 += u64::from(e.result.overall_accuracy);
        }
        let mut by_model: Vec<ModelBreakdown> = per_model
            .into_iter()
            .map(|(label, (count, sum))| ModelBreakdown {
                source_model_label: label.to_string(),
                count,
                average_accuracy: round1(sum as f64 / count as f64),
            })
            .collect();
        by_model.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source_model_label.cmp(&b.source_model_label))
        });

        Self {
            total_analyses: entries.len(),
            average_accuracy: mean(entries, |e| e.result.overall_accuracy),
            average_metrics: MetricAverages {
                factual_correctness: mean(entries, |e| e.result.metrics.factual_correctness),
                logical_consistency: mean(entries, |e| e.result.metrics.logical_consistency),
                clarity: mean(entries, |e| e.result.metrics.clarity),
                depth: mean(entries, |e| e.result.metrics.depth),
            },
            average_confidence: mean(entries, |e| e.result.confidence),
            total_cost: entries.iter().map(|e| e.estimated_cost).sum(),
            accuracy_bands: bands,
            by_model,
        }
    }
}
