//! The Truth Meter analysis pipeline.
//!
//! [`Analyzer`] ties the pieces together: [`prompt::PromptBuilder`] bounds
//! and formats the content, a [`truthmeter_llm::traits::ProviderBackend`]
//! produces the completion, [`extract`] recovers a sanitized
//! [`AnalysisResult`], and the outcome is appended to a
//! [`history::HistoryStore`]. [`report::HistoryReport`] summarises the
//! stored history.

pub mod analyzer;
pub mod cost;
pub mod extract;
pub mod history;
pub mod model;
pub mod prompt;
pub mod report;

pub use analyzer::{AnalysisOutcome, Analyzer};
pub use history::{open_history, HistoryStore};
pub use model::{AnalysisHistoryEntry, AnalysisMetrics, AnalysisRequest, AnalysisResult};
pub use report::HistoryReport;
