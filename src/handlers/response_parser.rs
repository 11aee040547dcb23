//! LLM 评分响应解析
//!
//! 支持两种格式：
//! - 考试格式：`questions` 数组（或旧式 `question_N` 键）+ `total_score`
//! - 路演格式：`Problem` / `Market` / `Solution` / `Delivery` / `Feedback`

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::RubricItem;

/// 未给出满分时每题的默认满分
const DEFAULT_ITEM_MAX: f64 = 10.0;

const PITCH_DIMENSIONS: [&str; 4] = ["Problem", "Market", "Solution", "Delivery"];

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("静态正则"));

static QUESTION_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^question_?(\d+)$").expect("静态正则"));

/// 解析后的评分
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGrade {
    pub score: f64,
    pub max_score: f64,
    pub rationale: String,
    pub items: Vec<RubricItem>,
}

/// 从响应中取出 JSON 对象（兼容 ```json 代码块和前后多余文字）
pub fn extract_json(raw: &str) -> Result<Map<String, Value>, String> {
    let candidate = match FENCE_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => {
            let start = raw.find('{');
            let end = raw.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => &raw[s..=e],
                _ => return Err(format!("响应中没有 JSON 对象: {}", preview(raw))),
            }
        }
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("响应 JSON 不是对象".to_string()),
        Err(e) => Err(format!("JSON 解析失败: {} ({})", e, preview(raw))),
    }
}

/// 解析考试格式
pub fn parse_exam_response(raw: &str) -> Result<ParsedGrade, String> {
    let obj = extract_json(raw)?;

    let items = match obj.get("questions").or_else(|| obj.get("scores")) {
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| array_item(i, entry))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("questions 字段必须是数组".to_string()),
        None => keyed_items(&obj)?,
    };

    let total = number(&obj, &["total_score", "overall_score"]);
    let score = match total {
        Some(total) => total,
        None if !items.is_empty() => items.iter().map(|i| i.score).sum(),
        None => return Err("响应中没有任何分数".to_string()),
    };

    let max_score = number(&obj, &["max_score"]).unwrap_or_else(|| {
        if items.is_empty() {
            DEFAULT_ITEM_MAX
        } else {
            items.iter().map(|i| i.max_score).sum()
        }
    });

    let rationale = text(&obj, &["general_feedback", "feedback"]).unwrap_or_default();

    validated(ParsedGrade {
        score,
        max_score,
        rationale,
        items,
    })
}

/// 解析路演格式，总分取四个维度的平均值
pub fn parse_pitch_response(raw: &str) -> Result<ParsedGrade, String> {
    let obj = extract_json(raw)?;

    let mut items = Vec::with_capacity(PITCH_DIMENSIONS.len());
    for dimension in PITCH_DIMENSIONS {
        let score = lookup_ci(&obj, dimension)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("缺少维度 {}", dimension))?;
        items.push(RubricItem {
            name: dimension.to_string(),
            score,
            max_score: DEFAULT_ITEM_MAX,
            feedback: String::new(),
        });
    }

    let score = items.iter().map(|i| i.score).sum::<f64>() / items.len() as f64;
    let rationale = lookup_ci(&obj, "Feedback")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    validated(ParsedGrade {
        score,
        max_score: DEFAULT_ITEM_MAX,
        rationale,
        items,
    })
}

fn array_item(index: usize, entry: &Value) -> Result<RubricItem, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| format!("第 {} 项不是对象", index + 1))?;

    let name = ["question", "question_id", "id", "name"]
        .iter()
        .find_map(|k| obj.get(*k))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| (index + 1).to_string());

    let score = number(obj, &["score"]).ok_or_else(|| format!("第 {} 项缺少 score", index + 1))?;

    Ok(RubricItem {
        name,
        score,
        max_score: number(obj, &["max_score"]).unwrap_or(DEFAULT_ITEM_MAX),
        feedback: text(obj, &["feedback"]).unwrap_or_default(),
    })
}

/// 旧格式：`{"question_1": {"score": .., "feedback": ..}, ...}`，按题号排序
fn keyed_items(obj: &Map<String, Value>) -> Result<Vec<RubricItem>, String> {
    let mut numbered: Vec<(u64, RubricItem)> = Vec::new();

    for (key, value) in obj {
        let Some(caps) = QUESTION_KEY_RE.captures(key) else {
            continue;
        };
        let number_part = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let order = number_part.parse::<u64>().unwrap_or(u64::MAX);
        let entry = value
            .as_object()
            .ok_or_else(|| format!("{} 不是对象", key))?;
        let score = number(entry, &["score"]).ok_or_else(|| format!("{} 缺少 score", key))?;

        numbered.push((
            order,
            RubricItem {
                name: number_part.to_string(),
                score,
                max_score: number(entry, &["max_score"]).unwrap_or(DEFAULT_ITEM_MAX),
                feedback: text(entry, &["feedback"]).unwrap_or_default(),
            },
        ));
    }

    numbered.sort_by_key(|(order, _)| *order);
    Ok(numbered.into_iter().map(|(_, item)| item).collect())
}

fn validated(grade: ParsedGrade) -> Result<ParsedGrade, String> {
    let scores = std::iter::once((grade.score, grade.max_score))
        .chain(grade.items.iter().map(|i| (i.score, i.max_score)));

    for (score, max) in scores {
        if !score.is_finite() || !max.is_finite() || score < 0.0 || max <= 0.0 {
            return Err(format!("分数无效: {}/{}", score, max));
        }
        if score > max {
            return Err(format!("分数 {} 超过满分 {}", score, max));
        }
    }

    Ok(grade)
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn lookup_ci<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn preview(raw: &str) -> String {
    crate::utils::logging::truncate_text(raw, 80)
}
