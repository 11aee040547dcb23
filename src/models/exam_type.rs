use std::fmt;

/// 考试类型枚举
///
/// 封闭集合：每个提交最终只会被分到其中一个类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    /// 技术类（计算、推导、编程）
    Technical,
    /// 叙述类（论述、策略分析）
    Narrative,
    /// 演讲类（路演录音）
    Presentation,
}

impl ExamType {
    /// 全部类型，按固定顺序
    pub const ALL: [ExamType; 3] = [
        ExamType::Technical,
        ExamType::Narrative,
        ExamType::Presentation,
    ];

    /// 获取标准标识
    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::Technical => "technical",
            ExamType::Narrative => "narrative",
            ExamType::Presentation => "presentation",
        }
    }

    /// 获取显示名称
    pub fn display_name(self) -> &'static str {
        match self {
            ExamType::Technical => "技术类",
            ExamType::Narrative => "叙述类",
            ExamType::Presentation => "演讲类",
        }
    }

    /// 尝试从字符串解析考试类型（忽略大小写，支持别名）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "technical" | "tech" | "技术" | "技术类" => Some(ExamType::Technical),
            "narrative" | "essay" | "叙述" | "叙述类" => Some(ExamType::Narrative),
            "presentation" | "vc_pitch" | "pitch" | "演讲" | "演讲类" => {
                Some(ExamType::Presentation)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ExamType::parse("Technical"), Some(ExamType::Technical));
        assert_eq!(ExamType::parse(" essay "), Some(ExamType::Narrative));
        assert_eq!(ExamType::parse("vc_pitch"), Some(ExamType::Presentation));
        assert_eq!(ExamType::parse("演讲"), Some(ExamType::Presentation));
        assert_eq!(ExamType::parse("oral"), None);
    }

    #[test]
    fn test_parse_round_trips_canonical_names() {
        for exam_type in ExamType::ALL {
            assert_eq!(ExamType::parse(exam_type.as_str()), Some(exam_type));
        }
    }

    #[test]
    fn test_deserialize_lowercase() {
        let parsed: ExamType = serde_json::from_str("\"narrative\"").unwrap();
        assert_eq!(parsed, ExamType::Narrative);
    }
}
