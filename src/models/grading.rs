use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::exam_type::ExamType;
use crate::models::normalized::AudioMetrics;

/// 评分细项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricItem {
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
}

/// 评分结果
///
/// 由专项处理器产生，交给路由器后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub submission_id: String,
    pub exam_type: ExamType,
    /// 产生该结果的处理器名称
    pub handler: String,
    pub score: f64,
    pub max_score: f64,
    /// 总体评语
    pub rationale: String,
    pub items: Vec<RubricItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_metrics: Option<AudioMetrics>,
    pub graded_at: DateTime<Utc>,
}
