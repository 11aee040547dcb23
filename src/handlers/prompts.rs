//! 评分提示词
//!
//! 只做字符串拼装，评分格式的解析见 `response_parser`

use crate::models::{ExamType, NormalizedSubmission};

const EXAM_OUTPUT_FORMAT: &str = r#"
### Output Format:
Respond ONLY with raw JSON (no markdown):
{
  "questions": [
    {"question": "1", "score": X, "max_score": 10, "feedback": "..."},
    {"question": "2", "score": Y, "max_score": 10, "feedback": "..."}
  ],
  "total_score": Z,
  "max_score": M,
  "general_feedback": "..."
}
"#;

const TECHNICAL_PROMPT_TEMPLATE: &str = r#"
You are a grading assistant for technical exams. Your role is to evaluate student responses based on the provided questions and, if available, the rubric.

### Grading Instructions:
- For each question:
  - Read the question and the student's answer.
  - If a rubric is provided for that question, follow it carefully to assign points based on the expected criteria.
  - If no rubric is provided, use your expert-level knowledge of the subject to assess:
    - Factual accuracy.
    - Completeness.
    - Clarity.
- Assign a score for each answer:
  - Use the point scale from the rubric, or if none is provided, use a default scale of 0-10 points.
- Provide feedback for each answer:
  - Explain why the student received the score.
  - Offer suggestions for improvement if the answer is incomplete or incorrect.
{output_format}
### Rubric (if available):
{rubric_markdown}
"#;

const NARRATIVE_PROMPT_WITH_RUBRIC: &str = "You are an exam grader. Use the rubric to assign each question a numeric score (0-10) and valuable concise feedback so the student can further understand their strengths and weaknesses of the material. Then compute the overall score and provide general feedback. Return JSON.";

const NARRATIVE_PROMPT_NO_RUBRIC: &str = "You are an exam grader. The rubric is not available. Use your own criteria to assign each question a numeric score (0-10) and constructive feedback. Then compute the overall score and provide general feedback. Return JSON.";

const PITCH_RUBRIC: &str = r#"
You are a seasoned VC pitch grader. For a {duration}-minute audio pitch, give each dimension a score from 1 (poor) to 10 (excellent), using the following anchors:

1. Problem Clarity
   - 1-3: No clear problem stated, listener confused
   - 4-6: Problem mentioned but lacks context or urgency
   - 7-8: Problem clearly described with context
   - 9-10: Problem statement is crisp, impactful, and immediately compelling

2. Market Evidence
   - 1-3: No market data or vague claims
   - 4-6: Qualitative market description, no numbers
   - 7-8: One clear quantitative metric (TAM, growth rate)
   - 9-10: Multiple strong data points (TAM, traction, growth) cited

3. Solution Differentiation
   - 1-3: Solution not differentiated, generic
   - 4-6: Mentions a unique feature but no defense
   - 7-8: Clearly highlights one defensible advantage
   - 9-10: Demonstrates multiple, well-justified differentiators or proprietary edge

4. Delivery & Pacing
   - 1-3: Monotone or too fast/slow (outside 80-200 WPM), frequent long pauses (>30 %)
   - 4-6: Understandable but some pacing issues (WPM 90-210, pauses 20-30 %)
   - 7-8: Good pace (110-160 WPM), pauses <20 %
   - 9-10: Engaging tone, ideal pacing (120-150 WPM), minimal pauses (<10 %)

Return valid JSON EXACTLY in this format (no extra keys):
{
  "Problem": <1-10>,
  "Market": <1-10>,
  "Solution": <1-10>,
  "Delivery": <1-10>,
  "Feedback": "<one sentence actionable feedback for each anchor>"
}
"#;

/// 构建 (system_message, user_message)
pub fn build_messages(exam_type: ExamType, ns: &NormalizedSubmission) -> (String, String) {
    match exam_type {
        ExamType::Technical => technical(ns),
        ExamType::Narrative => narrative(ns),
        ExamType::Presentation => presentation(ns),
    }
}

fn questions_or_default(ns: &NormalizedSubmission) -> &str {
    ns.questions
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .unwrap_or("No questions provided.")
}

fn rubric_text(ns: &NormalizedSubmission) -> Option<&str> {
    ns.rubric.as_deref().map(str::trim).filter(|r| !r.is_empty())
}

fn technical(ns: &NormalizedSubmission) -> (String, String) {
    let template = TECHNICAL_PROMPT_TEMPLATE
        .replace("{output_format}", EXAM_OUTPUT_FORMAT)
        .replace("{rubric_markdown}", rubric_text(ns).unwrap_or("No rubric provided."));

    let user = format!(
        "{}\n\nQuestions:\n{}\n\nStudent Responses:\n{}",
        template,
        questions_or_default(ns),
        ns.content
    );

    ("You are a helpful technical exam grader.".to_string(), user)
}

fn narrative(ns: &NormalizedSubmission) -> (String, String) {
    match rubric_text(ns) {
        Some(rubric) => (
            format!("{}\n{}", NARRATIVE_PROMPT_WITH_RUBRIC, EXAM_OUTPUT_FORMAT),
            format!(
                "Rubric:\n{}\n\nQuestions:\n{}\n\nStudent Responses:\n{}",
                rubric,
                questions_or_default(ns),
                ns.content
            ),
        ),
        None => (
            format!("{}\n{}", NARRATIVE_PROMPT_NO_RUBRIC, EXAM_OUTPUT_FORMAT),
            format!(
                "Questions:\n{}\n\nStudent Responses:\n{}",
                questions_or_default(ns),
                ns.content
            ),
        ),
    }
}

fn presentation(ns: &NormalizedSubmission) -> (String, String) {
    let (duration_minutes, wpm, silence_ratio) = ns
        .audio
        .map(|m| (m.duration_secs / 60.0, m.words_per_minute, m.silence_ratio))
        .unwrap_or((0.0, 0.0, 0.0));

    let rubric = PITCH_RUBRIC.replace("{duration}", &format!("{:.1}", duration_minutes));

    let user = format!(
        "Pitch transcript:\n{}\n\nAudio metrics:\n- Words-per-minute: {:.1}\n- Pause ratio: {:.1}%\n{}",
        ns.content,
        wpm,
        silence_ratio * 100.0,
        rubric
    );

    ("You are a helpful pitch grader.".to_string(), user)
}
