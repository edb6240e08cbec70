//! Reading a mastery score out of the evaluator's reply.

use regex::Regex;

/// Parsed evaluator reply.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorVerdict {
    /// Mastery in [0.0, 1.0].
    pub score: f64,
    pub feedback: Option<String>,
}

const SCORE_KEYS: &[&str] = &["mastery_score", "masteryScore", "score", "mastery"];
const FEEDBACK_KEYS: &[&str] = &["feedback", "reason", "rationale", "diagnosis"];

pub struct ScoreParser {
    number_re: Regex,
}

impl Default for ScoreParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreParser {
    pub fn new() -> Self {
        Self {
            number_re: Regex::new(
                r"(?i)(\d+(?:\.\d+)?|\.\d+)\s*(%)?(?:\s*(?:/|out\s+of)\s*(\d+(?:\.\d+)?))?",
            )
            .expect("score pattern is valid"),
        }
    }

    /// Parse a verdict, or `None` when the reply carries no usable score.
    ///
    /// Accepts a JSON object (optionally fenced or embedded in prose) with a
    /// score key, otherwise the first number in the text. Percentages and
    /// fractions are normalized; a bare number above 1 and up to 100 is read
    /// as a percentage.
    pub fn parse(&self, reply: &str) -> Option<EvaluatorVerdict> {
        let text = strip_markdown_fences(reply);
        if let Some(verdict) = parse_json(text) {
            return Some(verdict);
        }

        let caps = self.number_re.captures(text)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let score = if caps.get(2).is_some() {
            value / 100.0
        } else if let Some(den) = caps.get(3) {
            let den: f64 = den.as_str().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            value / den
        } else if value > 1.0 && value <= 100.0 {
            value / 100.0
        } else {
            value
        };

        let feedback = text
            .chars()
            .any(char::is_alphabetic)
            .then(|| text.trim().to_string());
        Some(EvaluatorVerdict {
            score: clamp_score(score)?,
            feedback,
        })
    }
}

fn parse_json(text: &str) -> Option<EvaluatorVerdict> {
    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return None,
    };
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    let raw = SCORE_KEYS.iter().find_map(|key| object.get(*key))?;
    let score = match raw {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse().ok()?,
        _ => return None,
    };
    let score = if score > 1.0 && score <= 100.0 {
        score / 100.0
    } else {
        score
    };

    let feedback = FEEDBACK_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Some(EvaluatorVerdict {
        score: clamp_score(score)?,
        feedback,
    })
}

fn clamp_score(score: f64) -> Option<f64> {
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

/// Strip markdown code fences from an LLM response to extract raw content.
/// Handles ```json, ```, and plain text (no fences).
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(reply: &str) -> Option<f64> {
        ScoreParser::new().parse(reply).map(|v| v.score)
    }

    #[test]
    fn test_json_with_feedback() {
        let v = ScoreParser::new()
            .parse(r#"{"mastery_score": 0.95, "feedback": "Solid grasp of recursion."}"#)
            .unwrap();
        assert_eq!(v.score, 0.95);
        assert_eq!(v.feedback.as_deref(), Some("Solid grasp of recursion."));
    }

    #[test]
    fn test_fenced_json() {
        assert_eq!(score("```json\n{\"score\": 0.4}\n```"), Some(0.4));
    }

    #[test]
    fn test_json_embedded_in_prose() {
        assert_eq!(
            score("Here is my evaluation: {\"mastery_score\": \"0.7\"} Hope that helps."),
            Some(0.7)
        );
    }

    #[test]
    fn test_plain_decimal() {
        assert_eq!(score("Mastery score: 0.6"), Some(0.6));
        assert_eq!(score(".25"), Some(0.25));
    }

    #[test]
    fn test_percentages_and_fractions() {
        assert_eq!(score("I'd say 85% mastery"), Some(0.85));
        assert_eq!(score("7/10"), Some(0.7));
        assert_eq!(score("3 out of 4"), Some(0.75));
        assert_eq!(score("Score: 80"), Some(0.8));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        assert_eq!(score(r#"{"score": -0.5}"#), Some(0.0));
        assert_eq!(score("9/5"), Some(1.0));
        assert_eq!(score("250"), Some(1.0));
    }

    #[test]
    fn test_unparseable_reply_is_none() {
        assert_eq!(score("The student is doing great!"), None);
        assert_eq!(score(""), None);
        assert_eq!(score("0/0"), None);
    }

    #[test]
    fn test_plain_text_keeps_feedback() {
        let v = ScoreParser::new()
            .parse("0.3 - still confuses necessity with sufficiency")
            .unwrap();
        assert_eq!(v.score, 0.3);
        assert!(v.feedback.unwrap().contains("sufficiency"));

        let v = ScoreParser::new().parse("0.3").unwrap();
        assert_eq!(v.feedback, None);
    }

    #[test]
    fn test_strip_markdown_fences_no_closing() {
        let input = "```json\n{\"key\": \"value\"}";
        assert_eq!(strip_markdown_fences(input), "{\"key\": \"value\"}");
    }
}
