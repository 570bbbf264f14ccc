//! Prompt construction and cost-bounding truncation.

use crate::model::AnalysisRequest;

/// Rough characters-per-token ratio used for budgeting.
pub const CHARS_PER_TOKEN: usize = 4;
const ELLIPSIS: &str = "...";

/// Cut `content` so it fits in `token_budget * CHARS_PER_TOKEN` characters.
///
/// Content that already fits is returned unchanged. Otherwise the result is a
/// prefix of `content` ending before the last space in the window, followed
/// by `...`; the marker counts toward the limit. When the window holds no
/// usable space the prefix is cut mid-word. A limit too small to hold the
/// marker yields a bare prefix.
pub fn truncate_content(content: &str, token_budget: usize) -> String {
    let max_chars = token_budget.saturating_mul(CHARS_PER_TOKEN);
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    if max_chars <= ELLIPSIS.len() {
        return content.chars().take(max_chars).collect();
    }

    let keep = max_chars - ELLIPSIS.len();
    let window: String = content.chars().take(keep).collect();
    match window.rfind(' ') {
        Some(idx) if idx > 0 => format!("{}{ELLIPSIS}", &window[..idx]),
        _ => format!("{window}{ELLIPSIS}"),
    }
}

/// A ready-to-send prompt and the content it embeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub truncated_content: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    token_budget: usize,
}

impl PromptBuilder {
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn build(&self, request: &AnalysisRequest) -> Prompt {
        let truncated_content = truncate_content(&request.content, self.token_budget);
        let text = format!(
            r#"You are an AI accuracy analyzer. Analyze the following AI-generated content from {label} for accuracy and provide a detailed assessment.

Content to analyze:
"{content}"

Please provide a JSON response with the following structure:
{{
  "overallAccuracy": number (0-100),
  "metrics": {{
    "factualCorrectness": number (0-100),
    "logicalConsistency": number (0-100),
    "clarity": number (0-100),
    "depth": number (0-100)
  }},
  "whatWentWrong": ["specific issue 1", "specific issue 2"],
  "whatWentRight": ["positive aspect 1", "positive aspect 2"],
  "detailedAnalysis": "comprehensive analysis text",
  "confidence": number (0-100)
}}

Focus on:
- Factual accuracy and correctness
- Logical flow and consistency
- Clarity of expression
- Depth of information
- Identify specific errors or inaccuracies
- Highlight strengths and good aspects

Keep the response concise but thorough."#,
            label = request.source_model_label,
            content = truncated_content,
        );
        Prompt {
            text,
            truncated_content,
        }
    }
}
