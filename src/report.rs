//! Unified report generation.
//!
//! Three encodings from the same result structure:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption (round-trips)
//! - Markdown: human-readable document for sharing

use chrono::Local;
use colored::*;
use serde::{Deserialize, Serialize};

use crate::ai::{AiReviewResult, ReviewPayload};
use crate::analysis::AnalysisResult;
use crate::apply::FixOutcome;
use crate::scan::{DependencyReport, SecurityReport};
use crate::suggestion::{Severity, Suggestion};

/// Review output for a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReview {
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiReviewResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixes: Option<FixOutcome>,
}

/// Issue counts across the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_issues: usize,
    pub complex_functions: usize,
    pub ai_suggestions: usize,
    pub security_findings: usize,
    pub vulnerable_dependencies: usize,
}

/// The merged output document for one review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedReport {
    pub version: String,
    pub generated: String,
    pub target: String,
    pub complexity_threshold: u32,
    pub files: Vec<FileReview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyReport>,
    pub summary: ReportSummary,
}

impl UnifiedReport {
    pub fn new(
        target: &str,
        complexity_threshold: u32,
        files: Vec<FileReview>,
        dependencies: Option<DependencyReport>,
    ) -> Self {
        let summary = summarize(&files, dependencies.as_ref(), complexity_threshold);
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated: Local::now().to_rfc3339(),
            target: target.to_string(),
            complexity_threshold,
            files,
            dependencies,
            summary,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether any finding should gate the exit code.
    pub fn has_blocking_findings(&self) -> bool {
        let file_blocking = self
            .files
            .iter()
            .flat_map(|f| f.suggestions.iter())
            .any(|s| s.severity().is_blocking());
        let dep_blocking = self
            .dependencies
            .as_ref()
            .map(|d| d.vulnerabilities.iter().any(|v| v.severity.is_blocking()))
            .unwrap_or(false);
        file_blocking || dep_blocking
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Unified Code Review Report\n\n");
        md.push_str(&format!("**Target:** {}  \n", self.target));
        md.push_str(&format!("**Generated:** {}  \n\n", self.generated));

        for file in &self.files {
            md.push_str(&format!("## {}\n\n", file.analysis.path));
            md.push_str(&format!("**Language:** {}  \n", file.analysis.language));
            md.push_str(&format!(
                "**Lines of Code:** {}  \n\n",
                file.analysis.lines_of_code
            ));

            if let Some(error) = &file.analysis.error {
                md.push_str(&format!("*Analysis failed: {}*\n\n", error));
                continue;
            }

            if !file.analysis.functions.is_empty() {
                md.push_str("### Functions\n\n");
                md.push_str("| Name | Line | Complexity | Status |\n");
                md.push_str("|------|------|------------|--------|\n");
                for func in &file.analysis.functions {
                    let status = if func.complexity > self.complexity_threshold {
                        "Complex"
                    } else {
                        "Normal"
                    };
                    md.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        func.name, func.line, func.complexity, status
                    ));
                }
                md.push('\n');
            }

            if !file.analysis.classes.is_empty() {
                md.push_str("### Classes\n\n");
                md.push_str("| Name | Line | Kind | Methods |\n");
                md.push_str("|------|------|------|--------|\n");
                for class in &file.analysis.classes {
                    md.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        class.name,
                        class.line,
                        class.kind,
                        class.methods.len()
                    ));
                }
                md.push('\n');
            }

            if !file.suggestions.is_empty() {
                md.push_str("### Suggestions\n\n");
                for (i, suggestion) in file.suggestions.iter().enumerate() {
                    md.push_str(&format!(
                        "**{}. {}** ({})\n\n",
                        i + 1,
                        suggestion.label(),
                        suggestion.severity()
                    ));
                    if let Suggestion::General { detail, .. }
                    | Suggestion::Security { detail, .. }
                    | Suggestion::Dependency { detail, .. }
                    | Suggestion::ComplexFunction { detail, .. } = suggestion
                    {
                        if !detail.is_empty() {
                            md.push_str(&format!("{}\n\n", detail));
                        }
                    }
                }
            }

            if let Some(security) = &file.security {
                md.push_str("### Security Scan\n\n");
                if security.findings.is_empty() {
                    md.push_str("*No security issues detected.*\n\n");
                } else {
                    md.push_str("| Category | Line | Severity | Detail |\n");
                    md.push_str("|----------|------|----------|--------|\n");
                    for finding in &security.findings {
                        md.push_str(&format!(
                            "| {} | {} | {} | {} |\n",
                            finding.category, finding.line, finding.severity, finding.detail
                        ));
                    }
                    md.push('\n');
                }
            }

            if let Some(ai) = &file.ai {
                md.push_str("### AI Review\n\n");
                match (&ai.review, &ai.error) {
                    (Some(ReviewPayload::Structured(review)), _) => {
                        if let Some(summary) = &review.summary {
                            md.push_str(&format!("{}  \n", summary));
                        }
                        if let Some(quality) = review.overall_quality {
                            md.push_str(&format!("**Overall quality:** {}/10  \n", quality));
                        }
                        md.push('\n');
                    }
                    (Some(ReviewPayload::Raw { raw_response }), _) => {
                        md.push_str("```\n");
                        md.push_str(raw_response);
                        md.push_str("\n```\n\n");
                    }
                    (None, Some(error)) => {
                        md.push_str(&format!("*{}*\n\n", error));
                    }
                    (None, None) => md.push_str("*No AI review available.*\n\n"),
                }
            }
        }

        md.push_str("## Dependency Scan\n\n");
        match &self.dependencies {
            Some(deps) if !deps.vulnerabilities.is_empty() => {
                md.push_str("| Package | Version | Severity | Fix |\n");
                md.push_str("|---------|---------|----------|-----|\n");
                for vuln in &deps.vulnerabilities {
                    md.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        vuln.package,
                        vuln.installed_version,
                        vuln.severity,
                        vuln.fix_version.as_deref().unwrap_or("-")
                    ));
                }
                md.push('\n');
            }
            Some(deps) => {
                md.push_str("*No vulnerable dependencies detected.*\n\n");
                for warning in &deps.warnings {
                    md.push_str(&format!("- ⚠ {}: {}\n", warning.tool, warning.message));
                }
                md.push('\n');
            }
            None => md.push_str("*No dependency scan results available.*\n\n"),
        }

        md.push_str("## Summary\n\n");
        md.push_str(&format!("**Total Issues:** {}  \n", self.summary.total_issues));
        md.push_str(&format!(
            "- Complex Functions: {}  \n",
            self.summary.complex_functions
        ));
        md.push_str(&format!(
            "- AI Suggestions: {}  \n",
            self.summary.ai_suggestions
        ));
        md.push_str(&format!(
            "- Security Findings: {}  \n",
            self.summary.security_findings
        ));
        md.push_str(&format!(
            "- Vulnerable Dependencies: {}  \n",
            self.summary.vulnerable_dependencies
        ));

        md
    }
}

fn summarize(
    files: &[FileReview],
    dependencies: Option<&DependencyReport>,
    threshold: u32,
) -> ReportSummary {
    let complex_functions = files
        .iter()
        .map(|f| f.analysis.complex_functions(threshold).count())
        .sum();
    let ai_suggestions = files
        .iter()
        .filter_map(|f| f.ai.as_ref())
        .map(|ai| ai.suggestion_count())
        .sum();
    let security_findings = files
        .iter()
        .filter_map(|f| f.security.as_ref())
        .map(|s| s.findings.len())
        .sum();
    let vulnerable_dependencies = dependencies.map(|d| d.vulnerabilities.len()).unwrap_or(0);

    ReportSummary {
        total_issues: complex_functions
            + ai_suggestions
            + security_findings
            + vulnerable_dependencies,
        complex_functions,
        ai_suggestions,
        security_findings,
        vulnerable_dependencies,
    }
}

// =============================================================================
// Pretty terminal output
// =============================================================================

/// Write the report to stdout with color.
pub fn write_pretty(report: &UnifiedReport) {
    println!();
    print!("  ");
    print!("{}", "ai-review".cyan().bold());
    println!(" v{}", report.version);
    println!();

    print!("  {}", "Target: ".dimmed());
    println!("{}", report.target);
    println!();

    for file in &report.files {
        println!("  {}", file.analysis.path.blue());

        if let Some(error) = &file.analysis.error {
            println!("    {} {}", "ERROR".red(), error);
            println!();
            continue;
        }

        println!(
            "    {} {} functions, {} classes, {} lines",
            file.analysis.language.dimmed(),
            file.analysis.functions.len(),
            file.analysis.classes.len(),
            file.analysis.lines_of_code
        );

        for func in &file.analysis.functions {
            let score = func.complexity.to_string();
            let colored_score = if func.complexity > report.complexity_threshold * 2 {
                score.red().bold()
            } else if func.complexity > report.complexity_threshold {
                score.yellow()
            } else {
                score.green()
            };
            println!(
                "      {} {} {}",
                func.name,
                format!("(line {})", func.line).dimmed(),
                colored_score
            );
        }

        if !file.suggestions.is_empty() {
            println!();
            for suggestion in &file.suggestions {
                write_severity_tag(suggestion.severity());
                println!("{}", suggestion.label());
            }
        }
        println!();
    }

    if let Some(deps) = &report.dependencies {
        println!("  {} ({}):", "Dependencies".bold(), deps.total);
        for vuln in &deps.vulnerabilities {
            write_severity_tag(vuln.severity);
            println!(
                "{} {} {}",
                vuln.package,
                vuln.installed_version.dimmed(),
                vuln.fix_version
                    .as_deref()
                    .map(|f| format!("fix: {}", f))
                    .unwrap_or_default()
                    .dimmed()
            );
        }
        for warning in &deps.warnings {
            println!("    {} {}: {}", "WARN ".yellow(), warning.tool, warning.message);
        }
        println!();
    }

    write_summary(&report.summary);
    println!();
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Critical => print!("    {} ", "CRIT ".red().bold()),
        Severity::High => print!("    {} ", "HIGH ".red()),
        Severity::Medium => print!("    {} ", "MED  ".yellow()),
        Severity::Low => print!("    {} ", "LOW  ".blue()),
        Severity::Unknown => print!("    {} ", "?    ".dimmed()),
    }
}

fn write_summary(summary: &ReportSummary) {
    println!("  {}", "Summary:".bold());
    println!(
        "    {:<24} {}",
        "complex functions",
        summary.complex_functions
    );
    println!("    {:<24} {}", "ai suggestions", summary.ai_suggestions);
    println!(
        "    {:<24} {}",
        "security findings",
        summary.security_findings
    );
    println!(
        "    {:<24} {}",
        "vulnerable dependencies",
        summary.vulnerable_dependencies
    );
    print!("    {:<24} ", "total");
    if summary.total_issues == 0 {
        println!("{}", "0".green().bold());
    } else {
        println!("{}", summary.total_issues.to_string().yellow().bold());
    }
}
