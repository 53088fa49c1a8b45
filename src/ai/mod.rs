//! LLM-powered review suggestions.
//!
//! Speaks an OpenAI-compatible chat-completions API. Responses are asked
//! for as JSON; anything that comes back unparsable degrades to a raw-text
//! wrapper instead of failing the review.

mod prompts;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::AnalysisResult;
use crate::suggestion::{Severity, Suggestion};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Review requests truncate the file body past this size.
const MAX_REVIEW_CHARS: usize = 8_000;
/// Snippet requests (general / complex-function) use a tighter cap.
const MAX_SNIPPET_CHARS: usize = 5_000;

/// Errors from the model API boundary.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("model API key is required; pass --api-key or set OPENAI_API_KEY")]
    MissingApiKey,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response from model API: {0}")]
    InvalidResponse(String),
}

/// One structured suggestion from the model. Absent fields mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub improvement: String,
}

/// A structured model review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_quality: Option<f64>,
    #[serde(default)]
    pub suggestions: Vec<AiSuggestion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub best_practices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub potential_bugs: Vec<String>,
    /// Set when required fields were missing from the model response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_warning: Option<String>,
}

/// Model output: structured when the response parsed as JSON, raw text
/// otherwise. `Raw` is listed first so untagged deserialization only picks
/// it when the `raw_response` field is actually present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewPayload {
    Raw { raw_response: String },
    Structured(AiReview),
}

/// Result of one AI review attempt. `error` is the "review unavailable"
/// marker when the call failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiReviewResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AiReviewResult {
    pub fn unavailable(message: &str) -> Self {
        Self {
            review: None,
            error: Some(format!("AI review unavailable: {}", message)),
        }
    }

    /// Number of suggestions the model produced.
    pub fn suggestion_count(&self) -> usize {
        match &self.review {
            Some(ReviewPayload::Structured(review)) => review.suggestions.len(),
            Some(ReviewPayload::Raw { .. }) => 1,
            None => 0,
        }
    }

    /// Convert the model output into the common suggestion shape.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        match &self.review {
            Some(ReviewPayload::Structured(review)) => review
                .suggestions
                .iter()
                .map(|s| {
                    let detail = if s.improvement.is_empty() {
                        s.description.clone()
                    } else {
                        format!("{} Improvement: {}", s.description, s.improvement)
                    };
                    Suggestion::General {
                        title: s.title.clone(),
                        severity: Severity::parse(&s.severity),
                        category: s.category.clone(),
                        location: s.location.clone(),
                        detail,
                    }
                })
                .collect(),
            Some(ReviewPayload::Raw { raw_response }) => vec![Suggestion::General {
                title: "AI review (unstructured)".to_string(),
                severity: Severity::Unknown,
                category: "general".to_string(),
                location: String::new(),
                detail: raw_response.clone(),
            }],
            None => Vec::new(),
        }
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Client {
    /// Build a client. The key comes from the explicit argument or the
    /// `OPENAI_API_KEY` environment variable; missing both is a
    /// configuration error.
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Result<Self, AiError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
            .ok_or(AiError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("ai-review/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Comprehensive review of one file, with the static analysis passed
    /// along as context.
    pub async fn review(
        &self,
        code: &str,
        analysis: &AnalysisResult,
    ) -> Result<ReviewPayload, AiError> {
        let analysis_summary = json!({
            "file_path": analysis.path,
            "language": analysis.language,
            "loc": analysis.lines_of_code,
            "functions": analysis.functions.iter().map(|f| json!({
                "name": f.name,
                "line": f.line,
                "complexity": f.complexity,
            })).collect::<Vec<_>>(),
            "classes": analysis.classes.iter().map(|c| json!({
                "name": c.name,
                "line": c.line,
                "methods": c.methods,
            })).collect::<Vec<_>>(),
        });

        let user = format!(
            "Here is the code to review:\n\n```\n{}\n```\n\nHere is the analysis of the code:\n\n```json\n{}\n```\n\nProvide a code review with specific, actionable suggestions. Respond with valid JSON in the structure specified.",
            truncate(code, MAX_REVIEW_CHARS),
            serde_json::to_string_pretty(&analysis_summary).unwrap_or_default(),
        );

        let content = self.chat(prompts::REVIEW, &user, 2000, true).await?;
        Ok(parse_review(&content))
    }

    /// Refactoring suggestions for one complex function.
    pub async fn complex_function(
        &self,
        function_source: &str,
        name: &str,
        complexity: u32,
    ) -> Result<ReviewPayload, AiError> {
        let user = format!(
            "Analyze this function and suggest improvements for readability and maintainability:\n\n```\n{}\n```\n\nFunction name: {}\nComplexity score: {}\n\nRespond with valid JSON in the structure specified.",
            truncate(function_source, MAX_SNIPPET_CHARS),
            name,
            complexity,
        );
        let content = self.chat(prompts::COMPLEX_FUNCTION, &user, 1000, true).await?;
        Ok(parse_review(&content))
    }

    /// General quality suggestions for a snippet.
    pub async fn general(&self, code: &str) -> Result<ReviewPayload, AiError> {
        let user = format!(
            "Review this code and provide general suggestions for improvement:\n\n```\n{}\n```\n\nRespond with valid JSON in the structure specified.",
            truncate(code, MAX_SNIPPET_CHARS),
        );
        let content = self.chat(prompts::GENERAL, &user, 1000, true).await?;
        Ok(parse_review(&content))
    }

    /// Ask for a corrected version of the whole file. The response is
    /// file content, not JSON.
    pub async fn corrected_file(
        &self,
        code: &str,
        review: &AiReview,
    ) -> Result<String, AiError> {
        let mut items = String::new();
        for suggestion in &review.suggestions {
            let title = if suggestion.title.is_empty() {
                "suggestion"
            } else {
                suggestion.title.as_str()
            };
            items.push_str(&format!("- {}: {}\n", title, suggestion.description));
        }

        let user = format!(
            "Apply these review suggestions to the file below.\n\nSuggestions:\n{}\nFile:\n{}\n",
            items, code,
        );
        self.chat(prompts::FIX, &user, 4000, false).await
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.2,
            "max_tokens": max_tokens,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        debug!(url = %url, model = %self.model, "calling model API");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::InvalidResponse(format!(
                "HTTP {}: {}",
                status,
                truncate(&text, 300)
            )));
        }

        let value: Value = response.json().await?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AiError::InvalidResponse("missing choices[0].message.content".to_string())
            })?;
        Ok(content.trim().to_string())
    }
}

/// Parse model output into a structured review. A non-JSON body falls
/// back to the raw wrapper; missing required fields set a validation
/// warning rather than failing.
pub(crate) fn parse_review(content: &str) -> ReviewPayload {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "model response was not valid JSON");
            return ReviewPayload::Raw {
                raw_response: content.to_string(),
            };
        }
    };

    let missing: Vec<&str> = ["summary", "overall_quality", "suggestions"]
        .iter()
        .copied()
        .filter(|k| value.get(k).is_none())
        .collect();

    let mut review = review_from_value(&value);
    if !missing.is_empty() {
        warn!(fields = ?missing, "model response is missing expected fields");
        review.validation_warning = Some(format!(
            "response is missing expected fields: {}",
            missing.join(", ")
        ));
    }
    ReviewPayload::Structured(review)
}

/// Field-by-field extraction; anything with the wrong shape reads as
/// absent instead of poisoning the whole review.
fn review_from_value(value: &Value) -> AiReview {
    AiReview {
        summary: value.get("summary").and_then(Value::as_str).map(str::to_owned),
        overall_quality: value.get("overall_quality").and_then(value_as_f64),
        suggestions: value
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(suggestion_from_value).collect())
            .unwrap_or_default(),
        best_practices: string_list(value.get("best_practices")),
        potential_bugs: string_list(value.get("potential_bugs")),
        validation_warning: None,
    }
}

fn suggestion_from_value(value: &Value) -> AiSuggestion {
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    AiSuggestion {
        title: field("title"),
        description: field("description"),
        severity: field("severity"),
        category: field("category"),
        location: field("location"),
        improvement: field("improvement"),
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Char-boundary-safe prefix truncation.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured_review() {
        let content = r#"{
            "summary": "A small utility module.",
            "overall_quality": 7,
            "suggestions": [
                {
                    "title": "Add error handling",
                    "description": "The parse call can fail.",
                    "severity": "medium",
                    "category": "bug",
                    "location": "parse_config (line 10)",
                    "improvement": "Wrap in a match."
                }
            ],
            "best_practices": ["Use type hints"],
            "potential_bugs": ["Session token never expires"]
        }"#;

        let payload = parse_review(content);
        let ReviewPayload::Structured(review) = payload else {
            panic!("expected structured payload");
        };
        assert_eq!(review.summary.as_deref(), Some("A small utility module."));
        assert_eq!(review.overall_quality, Some(7.0));
        assert_eq!(review.suggestions.len(), 1);
        assert_eq!(review.suggestions[0].title, "Add error handling");
        assert_eq!(review.best_practices, vec!["Use type hints"]);
        assert!(review.validation_warning.is_none());
    }

    #[test]
    fn test_missing_required_fields_sets_warning() {
        let content = r#"{"suggestions": []}"#;
        let ReviewPayload::Structured(review) = parse_review(content) else {
            panic!("expected structured payload");
        };
        let warning = review.validation_warning.expect("warning");
        assert!(warning.contains("summary"));
        assert!(warning.contains("overall_quality"));
        assert!(!warning.contains("suggestions"));
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw() {
        let content = "The code looks fine to me, overall quality 8/10.";
        match parse_review(content) {
            ReviewPayload::Raw { raw_response } => assert_eq!(raw_response, content),
            other => panic!("expected raw payload, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_round_trip() {
        let raw = ReviewPayload::Raw {
            raw_response: "not json".to_string(),
        };
        let json = serde_json::to_string(&raw).unwrap();
        let back: ReviewPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raw);

        let structured = ReviewPayload::Structured(AiReview {
            summary: Some("ok".to_string()),
            overall_quality: Some(9.0),
            ..Default::default()
        });
        let json = serde_json::to_string(&structured).unwrap();
        let back: ReviewPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, structured);
    }

    #[test]
    fn test_quality_as_string_is_tolerated() {
        let content = r#"{"summary": "ok", "overall_quality": "8", "suggestions": []}"#;
        let ReviewPayload::Structured(review) = parse_review(content) else {
            panic!("expected structured payload");
        };
        assert_eq!(review.overall_quality, Some(8.0));
    }

    #[test]
    fn test_result_suggestions_mapping() {
        let result = AiReviewResult {
            review: Some(ReviewPayload::Structured(AiReview {
                suggestions: vec![AiSuggestion {
                    title: "Tighten loop".to_string(),
                    description: "Quadratic scan.".to_string(),
                    severity: "high".to_string(),
                    category: "performance".to_string(),
                    location: "hot_path".to_string(),
                    improvement: "Use a set.".to_string(),
                }],
                ..Default::default()
            })),
            error: None,
        };

        let suggestions = result.suggestions();
        assert_eq!(suggestions.len(), 1);
        match &suggestions[0] {
            Suggestion::General {
                title,
                severity,
                detail,
                ..
            } => {
                assert_eq!(title, "Tighten loop");
                assert_eq!(*severity, Severity::High);
                assert!(detail.contains("Use a set."));
            }
            other => panic!("expected general suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        // Force the env path to be empty for this check.
        let prev = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");
        let result = Client::new(None, DEFAULT_MODEL.to_string(), DEFAULT_BASE_URL.to_string());
        assert!(matches!(result, Err(AiError::MissingApiKey)));
        if let Some(key) = prev {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(t));
    }
}
