use truthmeter_config::PricingConfig;
use truthmeter_llm::Completion;

use crate::prompt::CHARS_PER_TOKEN;

/// Token count estimate at four characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Per-analysis USD cost from token usage.
#[derive(Debug, Clone, Copy)]
pub struct CostEstimator {
    input_per_1k: f64,
    output_per_1k: f64,
}

impl CostEstimator {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            input_per_1k: pricing.input_per_1k,
            output_per_1k: pricing.output_per_1k,
        }
    }

    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) / 1000.0) * self.input_per_1k
            + (f64::from(output_tokens) / 1000.0) * self.output_per_1k
    }

    /// Prefer provider-reported usage; estimate from text otherwise.
    pub fn estimate(&self, prompt: &str, completion: &Completion) -> f64 {
        let input = completion
            .input_tokens
            .unwrap_or_else(|| estimate_tokens(prompt));
        let output = completion
            .output_tokens
            .unwrap_or_else(|| estimate_tokens(&completion.text));
        self.cost(input, output)
    }
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new(&PricingConfig::default())
    }
}
