//! Review feedback types shared by every subsystem.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a finding or suggestion. Ordering puts the most severe
/// first so sorting a suggestion list front-loads what matters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    /// External tools report severities we do not recognize; absent or
    /// unrecognized means unknown, not an error.
    Unknown,
}

impl Severity {
    /// Lenient parse used for external tool output; never fails.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" | "info" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    /// Whether this severity should gate the exit code.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Severity::parse(s) {
            Severity::Unknown if !s.eq_ignore_ascii_case("unknown") => {
                Err(format!("unknown severity: {}", s))
            }
            sev => Ok(sev),
        }
    }
}

/// A unit of review feedback, tagged by its originating subsystem.
///
/// The `Extension` variant carries plugin-contributed shapes this crate
/// does not know statically; consumers treat absent fields as unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Suggestion {
    ComplexFunction {
        function: String,
        line: usize,
        complexity: u32,
        severity: Severity,
        #[serde(default)]
        detail: String,
    },
    General {
        #[serde(default)]
        title: String,
        severity: Severity,
        #[serde(default)]
        category: String,
        #[serde(default)]
        location: String,
        #[serde(default)]
        detail: String,
    },
    Security {
        category: String,
        line: usize,
        severity: Severity,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        recommendation: String,
    },
    Dependency {
        package: String,
        #[serde(default)]
        installed_version: String,
        severity: Severity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fix_version: Option<String>,
        #[serde(default)]
        detail: String,
    },
    Extension {
        kind: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
}

impl Suggestion {
    pub fn severity(&self) -> Severity {
        match self {
            Suggestion::ComplexFunction { severity, .. }
            | Suggestion::General { severity, .. }
            | Suggestion::Security { severity, .. }
            | Suggestion::Dependency { severity, .. } => *severity,
            Suggestion::Extension { fields, .. } => fields
                .get("severity")
                .and_then(Value::as_str)
                .map(Severity::parse)
                .unwrap_or(Severity::Unknown),
        }
    }

    /// Parse a loosely-typed value, e.g. a hook result or a foreign tool's
    /// JSON. Unknown or missing tags land in the `Extension` variant.
    pub fn from_value(value: Value) -> Suggestion {
        if let Ok(suggestion) = serde_json::from_value::<Suggestion>(value.clone()) {
            return suggestion;
        }

        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let kind = fields
            .remove("type")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_string());

        Suggestion::Extension { kind, fields }
    }

    /// Short label for terminal and markdown output.
    pub fn label(&self) -> String {
        match self {
            Suggestion::ComplexFunction { function, .. } => format!("complex function {}", function),
            Suggestion::General { title, .. } if !title.is_empty() => title.clone(),
            Suggestion::General { .. } => "general suggestion".to_string(),
            Suggestion::Security { category, .. } => format!("security: {}", category),
            Suggestion::Dependency { package, .. } => format!("dependency: {}", package),
            Suggestion::Extension { kind, .. } => format!("plugin: {}", kind),
        }
    }
}
