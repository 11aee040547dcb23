use serde::{Deserialize, Serialize};

/// 护栏规则类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// 硬规则：一旦失败立即停止检查
    Hard,
    /// 软规则：失败后继续检查，最后汇总
    Soft,
}

/// 单条规则违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: String,
    pub category: RuleCategory,
    pub message: String,
}

/// 护栏检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub violations: Vec<RuleViolation>,
}

impl GuardrailVerdict {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn failed(&self) -> bool {
        !self.passed()
    }

    /// 违规规则ID列表（按检查顺序）
    pub fn violated_rules(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.rule.clone()).collect()
    }

    /// 是否包含硬规则违规
    pub fn has_hard_failure(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.category == RuleCategory::Hard)
    }
}
