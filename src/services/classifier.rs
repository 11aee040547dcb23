//! 分类服务 - 业务能力层
//!
//! 只负责"这是哪一类考试"，规则固定、纯内存、同步执行

use std::sync::LazyLock;

use phf::{phf_set, Set};
use regex::Regex;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ExamType, NormalizedSubmission};

/// 当前分类策略版本；规则变化时必须更新
pub const CLASSIFIER_POLICY_VERSION: &str = "keyword-v1";

/// 每处数学记号的权重
const MATH_NOTATION_WEIGHT: f64 = 2.0;

static TECHNICAL_KEYWORDS: Set<&'static str> = phf_set! {
    "algorithm", "integral", "derivative", "equation", "theorem", "proof", "lemma",
    "matrix", "vector", "calculate", "compute", "formula", "function", "variable",
    "complexity", "code", "compile", "runtime", "voltage", "current", "circuit",
    "probability", "polynomial", "limit", "solve", "solution", "eigenvalue",
    "gradient", "recursion", "array", "pointer", "query", "database", "velocity",
    "acceleration", "force", "energy", "molar", "reaction",
};

static NARRATIVE_KEYWORDS: Set<&'static str> = phf_set! {
    "essay", "argue", "argument", "argues", "believe", "opinion", "strategy",
    "strategic", "narrative", "history", "historical", "perspective", "conclusion",
    "introduction", "evidence", "society", "social", "story", "analysis",
    "leadership", "ethics", "ethical", "culture", "policy", "discuss", "therefore",
    "however", "furthermore", "critique", "reflect", "reflection", "author",
};

static PRESENTATION_KEYWORDS: Set<&'static str> = phf_set! {
    "pitch", "investor", "investors", "startup", "traction", "tam", "funding",
    "slide", "slides", "audience", "customers", "revenue", "raise", "valuation",
    "team", "founder", "founders",
};

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+").expect("静态正则"));

static MATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9)]\s*\^\s*[A-Za-z0-9(]|\d+\s*[+\-*/=]\s*\d+|\\frac|\\int|\\sum|[∫∑√≤≥≠∞π]")
        .expect("静态正则")
});

/// 分类详情
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// 得分最高的类型；无任何信号时为 None
    pub exam_type: Option<ExamType>,
    pub confidence: f64,
    /// 各类型得分，顺序同 `ExamType::ALL`
    pub scores: [f64; 3],
    pub policy_version: &'static str,
}

/// 基于关键词的分类器
#[derive(Debug, Clone)]
pub struct Classifier {
    confidence_threshold: f64,
}

impl Classifier {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// 分类：返回唯一的考试类型，置信度不足时返回 `ClassificationAmbiguous`
    pub fn classify(&self, ns: &NormalizedSubmission) -> PipelineResult<ExamType> {
        let classification = self.score(ns);

        debug!(
            "分类得分 {:?} -> {:?} (置信度 {:.2}, 策略 {})",
            classification.scores,
            classification.exam_type,
            classification.confidence,
            classification.policy_version
        );

        match classification.exam_type {
            Some(exam_type) if classification.confidence >= self.confidence_threshold => {
                Ok(exam_type)
            }
            _ => Err(PipelineError::ClassificationAmbiguous {
                confidence: classification.confidence,
                threshold: self.confidence_threshold,
            }),
        }
    }

    /// 计算各类型得分和置信度
    pub fn score(&self, ns: &NormalizedSubmission) -> Classification {
        if let Some(declared) = ns.declared_type {
            return certain(declared);
        }
        if ns.is_audio() {
            return certain(ExamType::Presentation);
        }

        let text = ns.content.to_lowercase();
        let mut scores = [0.0f64; 3];

        for word in WORD_RE.find_iter(&text).map(|m| m.as_str()) {
            if TECHNICAL_KEYWORDS.contains(word) {
                scores[0] += 1.0;
            }
            if NARRATIVE_KEYWORDS.contains(word) {
                scores[1] += 1.0;
            }
            if PRESENTATION_KEYWORDS.contains(word) {
                scores[2] += 1.0;
            }
        }
        scores[0] += MATH_RE.find_iter(&ns.content).count() as f64 * MATH_NOTATION_WEIGHT;

        let total: f64 = scores.iter().sum();
        let (best_index, best) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        let tied = scores.iter().filter(|&&s| s == best).count() > 1;

        if total == 0.0 || tied {
            return Classification {
                exam_type: None,
                confidence: if total == 0.0 { 0.0 } else { best / total },
                scores,
                policy_version: CLASSIFIER_POLICY_VERSION,
            };
        }

        Classification {
            exam_type: Some(ExamType::ALL[best_index]),
            confidence: best / total,
            scores,
            policy_version: CLASSIFIER_POLICY_VERSION,
        }
    }
}

fn certain(exam_type: ExamType) -> Classification {
    let mut scores = [0.0; 3];
    if let Some(i) = ExamType::ALL.iter().position(|t| *t == exam_type) {
        scores[i] = 1.0;
    }
    Classification {
        exam_type: Some(exam_type),
        confidence: 1.0,
        scores,
        policy_version: CLASSIFIER_POLICY_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioMetrics, Modality};

    fn text(content: &str) -> NormalizedSubmission {
        NormalizedSubmission {
            submission_id: "s".to_string(),
            exam_id: "e".to_string(),
            student_id: "u".to_string(),
            modality: Modality::Document,
            content: content.to_string(),
            questions: None,
            rubric: None,
            declared_type: None,
            audio: None,
        }
    }

    #[test]
    fn test_math_answer_is_technical() {
        let classifier = Classifier::new(0.6);
        let ns = text("## Page 1\nderivative of x^2 is 2x\n");
        assert_eq!(classifier.classify(&ns).unwrap(), ExamType::Technical);
        assert_eq!(classifier.score(&ns).confidence, 1.0);
    }

    #[test]
    fn test_essay_is_narrative() {
        let classifier = Classifier::new(0.6);
        let ns = text(
            "In this essay I argue that the strategy failed. The evidence from history \
             supports this perspective. In conclusion, leadership matters.",
        );
        assert_eq!(classifier.classify(&ns).unwrap(), ExamType::Narrative);
    }

    #[test]
    fn test_no_signal_is_ambiguous() {
        let classifier = Classifier::new(0.6);
        let err = classifier.classify(&text("hello there")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ClassificationAmbiguous { confidence, .. } if confidence == 0.0
        ));
    }

    #[test]
    fn test_tie_is_ambiguous_even_with_zero_threshold() {
        let classifier = Classifier::new(0.0);
        let err = classifier.classify(&text("the essay about an algorithm")).unwrap_err();
        assert!(matches!(err, PipelineError::ClassificationAmbiguous { .. }));
    }

    #[test]
    fn test_below_threshold_is_ambiguous() {
        let classifier = Classifier::new(0.9);
        // 2 个技术词、1 个叙述词 -> 置信度 0.67
        let ns = text("solve the equation and discuss");
        assert!(classifier.classify(&ns).is_err());
        assert_eq!(Classifier::new(0.6).classify(&ns).unwrap(), ExamType::Technical);
    }

    #[test]
    fn test_declared_type_wins() {
        let classifier = Classifier::new(0.99);
        let mut ns = text("derivative of x^2 is 2x");
        ns.declared_type = Some(ExamType::Narrative);
        assert_eq!(classifier.classify(&ns).unwrap(), ExamType::Narrative);
    }

    #[test]
    fn test_audio_is_presentation() {
        let classifier = Classifier::new(0.99);
        let mut ns = text("");
        ns.modality = Modality::Audio;
        ns.audio = Some(AudioMetrics::compute("", 0.0, 0.0));
        assert_eq!(classifier.classify(&ns).unwrap(), ExamType::Presentation);
    }

    #[test]
    fn test_deterministic() {
        let classifier = Classifier::new(0.5);
        let ns = text("Our startup pitch: investors love our traction and revenue.");
        let first = classifier.score(&ns);
        let second = classifier.score(&ns);
        assert_eq!(first, second);
        assert_eq!(first.exam_type, Some(ExamType::Presentation));
    }
}
