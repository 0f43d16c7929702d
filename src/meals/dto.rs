use serde::{Deserialize, Serialize};

use crate::nutrition::{
    accumulator::DailySummary,
    record::{MacroDistribution, NutritionRecord},
};

/// POST /meals/analyze/report - run the pipeline over a report obtained
/// elsewhere.
#[derive(Debug, Deserialize)]
pub struct AnalyzeReportRequest {
    pub report_text: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub daily_limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub record: NutritionRecord,
    pub history_id: i64,
    pub daily: DailySummary,
    pub macro_distribution: Option<MacroDistribution>,
}

#[derive(Debug, Deserialize)]
pub struct SetLimitRequest {
    pub daily_limit: u32,
}
