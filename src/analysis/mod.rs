// Synthesis of validation results into a decision report

mod analyzer;
mod types;

pub use analyzer::IntegrationAnalyzer;
pub use types::{AnalysisReport, ReportBody};
