//! Regex-based security pattern scanning.
//!
//! Linear line-by-line scans with per-language pattern tables. Credentials
//! are masked before they reach any report output.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::SourceLanguage;
use crate::suggestion::{Severity, Suggestion};

/// A single security finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub category: String,
    pub issue: String,
    pub detail: String,
    pub line: usize,
    pub severity: Severity,
    pub recommendation: String,
}

/// Finding counts by severity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Security scan output for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub path: String,
    pub language: String,
    pub findings: Vec<SecurityFinding>,
    pub summary: SeverityCounts,
}

impl SecurityReport {
    /// Convert findings into the common suggestion shape.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.findings
            .iter()
            .map(|f| Suggestion::Security {
                category: f.category.clone(),
                line: f.line,
                severity: f.severity,
                detail: f.detail.clone(),
                recommendation: f.recommendation.clone(),
            })
            .collect()
    }
}

struct PatternRule {
    regex: Regex,
    issue: &'static str,
    severity: Severity,
    recommendation: &'static str,
}

fn rule(
    pattern: &str,
    issue: &'static str,
    severity: Severity,
    recommendation: &'static str,
) -> PatternRule {
    PatternRule {
        regex: Regex::new(pattern).expect("static security pattern"),
        issue,
        severity,
        recommendation,
    }
}

const SECRET_RECOMMENDATION: &str =
    "store sensitive values in environment variables or a secrets vault";
const SQL_RECOMMENDATION: &str = "use parameterized queries or prepared statements";
const XSS_RECOMMENDATION: &str = "sanitize user input before inserting it into the DOM";
const CRYPTO_RECOMMENDATION: &str = "use a modern algorithm such as SHA-256 or AES";
const PATH_RECOMMENDATION: &str = "validate and normalize file paths before opening them";
const CMD_RECOMMENDATION: &str = "pass arguments as a list instead of building command strings";

static SECRET_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r#"(?i)(api_key|apikey|secret|password|passwd|pwd|token|auth_token|credentials)\s*=\s*["']([^"']{8,})["']"#,
            "hardcoded credential",
            Severity::High,
            SECRET_RECOMMENDATION,
        ),
        rule(
            r"(AKIA[0-9A-Z]{16})",
            "AWS access key ID",
            Severity::High,
            SECRET_RECOMMENDATION,
        ),
        rule(
            r"(sk-[A-Za-z0-9]{32,})",
            "model API key",
            Severity::High,
            SECRET_RECOMMENDATION,
        ),
        rule(
            r"(xox[pboa]-[0-9A-Za-z-]{20,})",
            "Slack token",
            Severity::High,
            SECRET_RECOMMENDATION,
        ),
        rule(
            r"(eyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,})",
            "JSON Web Token",
            Severity::Medium,
            SECRET_RECOMMENDATION,
        ),
    ]
});

static SECRET_RULES_PY: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![rule(
        r#"(?i)os\.environ\.get\(["'][^"']*(?:key|secret|password|token)[^"']*["']\s*,\s*["']([^"']+)["']\)"#,
        "hardcoded fallback for environment variable",
        Severity::Medium,
        SECRET_RECOMMENDATION,
    )]
});

static SECRET_RULES_JS: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![rule(
        r#"(?i)process\.env\.[A-Z_]*(?:KEY|SECRET|PASSWORD|TOKEN)\s*\|\|\s*["'`]([^"'`]+)["'`]"#,
        "hardcoded fallback for environment variable",
        Severity::Medium,
        SECRET_RECOMMENDATION,
    )]
});

static SQL_RULES_PY: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r#"execute(?:many)?\(\s*["'](?:SELECT|INSERT INTO|UPDATE|DELETE FROM).*\+"#,
            "string concatenation in SQL query",
            Severity::High,
            SQL_RECOMMENDATION,
        ),
        rule(
            r#"execute(?:many)?\(\s*f["'](?:SELECT|INSERT|UPDATE|DELETE)"#,
            "f-string in SQL query",
            Severity::High,
            SQL_RECOMMENDATION,
        ),
        rule(
            r#"execute(?:many)?\(\s*["'].*["']\s*%"#,
            "string formatting in SQL query",
            Severity::High,
            SQL_RECOMMENDATION,
        ),
    ]
});

static SQL_RULES_JS: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r#"\.query\(\s*["'](?:SELECT|INSERT INTO|UPDATE|DELETE FROM).*\+"#,
            "string concatenation in SQL query",
            Severity::High,
            SQL_RECOMMENDATION,
        ),
        rule(
            r"`(?:SELECT|INSERT INTO|UPDATE|DELETE FROM)[^`]*\$\{",
            "template literal in SQL query",
            Severity::High,
            SQL_RECOMMENDATION,
        ),
    ]
});

static XSS_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r"innerHTML\s*=.*(?:params|query|input|data|request|req\.)",
            "unescaped data assigned to innerHTML",
            Severity::High,
            XSS_RECOMMENDATION,
        ),
        rule(
            r"document\.write\s*\(.*(?:params|query|input|data|request|req\.)",
            "unescaped data in document.write()",
            Severity::High,
            XSS_RECOMMENDATION,
        ),
        rule(
            r"\beval\s*\(.*(?:params|query|input|data|request|req\.)",
            "user input in eval()",
            Severity::High,
            XSS_RECOMMENDATION,
        ),
    ]
});

static CRYPTO_RULES_PY: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r"hashlib\.md5\(",
            "MD5 hashing algorithm",
            Severity::Medium,
            CRYPTO_RECOMMENDATION,
        ),
        rule(
            r"hashlib\.sha1\(",
            "SHA1 hashing algorithm",
            Severity::Medium,
            CRYPTO_RECOMMENDATION,
        ),
        rule(
            r"Crypto\.Cipher\.(?:DES|ARC4|Blowfish)",
            "weak encryption algorithm",
            Severity::Medium,
            CRYPTO_RECOMMENDATION,
        ),
    ]
});

static CRYPTO_RULES_JS: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r#"crypto\.createHash\(["'](?:md5|sha1)["']\)"#,
            "weak hashing algorithm",
            Severity::Medium,
            CRYPTO_RECOMMENDATION,
        ),
        rule(
            r#"crypto\.createCipheriv\(["'](?:des|des-ede3|rc4|bf)"#,
            "weak encryption algorithm",
            Severity::Medium,
            CRYPTO_RECOMMENDATION,
        ),
    ]
});

static PATH_RULES_PY: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r"\bopen\s*\([^)]*\+",
            "file path concatenation",
            Severity::High,
            PATH_RECOMMENDATION,
        ),
        rule(
            r"os\.path\.join\s*\([^)]*(?:request|input|params)",
            "user input in file path",
            Severity::High,
            PATH_RECOMMENDATION,
        ),
    ]
});

static PATH_RULES_JS: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r"fs\.(?:readFile|readFileSync|writeFile|writeFileSync)\s*\([^)]*\+",
            "file path concatenation",
            Severity::High,
            PATH_RECOMMENDATION,
        ),
        rule(
            r"path\.join\s*\([^)]*req\.(?:params|query|body)",
            "user input in file path",
            Severity::High,
            PATH_RECOMMENDATION,
        ),
    ]
});

static CMD_RULES_PY: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r#"os\.system\s*\(\s*(?:f["']|[^)]*\+)"#,
            "command string built from variables",
            Severity::High,
            CMD_RECOMMENDATION,
        ),
        rule(
            r"subprocess\.(?:run|call|check_output|Popen)\s*\([^)]*\+",
            "command string concatenation",
            Severity::High,
            CMD_RECOMMENDATION,
        ),
    ]
});

static CMD_RULES_JS: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![rule(
        r"child_process\.(?:exec|execSync|spawn|spawnSync)\s*\([^)]*(?:\+|\$\{)",
        "command string built from variables",
        Severity::High,
        CMD_RECOMMENDATION,
    )]
});

/// Scans a single file's source for security issues.
pub struct SecurityScanner<'a> {
    code: &'a str,
    path: &'a Path,
    language: SourceLanguage,
    findings: Vec<SecurityFinding>,
}

impl<'a> SecurityScanner<'a> {
    pub fn new(code: &'a str, path: &'a Path) -> Self {
        Self {
            code,
            path,
            language: SourceLanguage::from_path(path),
            findings: Vec::new(),
        }
    }

    /// Run every scan and produce the per-file report.
    pub fn run(mut self) -> SecurityReport {
        debug!(
            file = %self.path.display(),
            language = %self.language,
            "running security scan"
        );

        self.scan_hardcoded_secrets();
        self.scan_sql_injection();
        self.scan_command_injection();
        self.scan_insecure_crypto();
        self.scan_path_traversal();
        self.scan_xss();

        let summary = summarize(&self.findings);
        SecurityReport {
            path: self.path.display().to_string(),
            language: self.language.as_str().to_string(),
            findings: self.findings,
            summary,
        }
    }

    fn scan_hardcoded_secrets(&mut self) {
        self.scan_masked("credentials", &SECRET_RULES);
        match self.language {
            SourceLanguage::Python => self.scan_masked("credentials", &SECRET_RULES_PY),
            SourceLanguage::JavaScript | SourceLanguage::TypeScript => {
                self.scan_masked("credentials", &SECRET_RULES_JS)
            }
            SourceLanguage::Unknown => {}
        }
    }

    fn scan_sql_injection(&mut self) {
        match self.language {
            SourceLanguage::Python => self.scan_rules("sql_injection", &SQL_RULES_PY),
            SourceLanguage::JavaScript | SourceLanguage::TypeScript => {
                self.scan_rules("sql_injection", &SQL_RULES_JS)
            }
            SourceLanguage::Unknown => {}
        }
    }

    fn scan_xss(&mut self) {
        if !self.language.is_curly() {
            return;
        }
        self.scan_rules("xss", &XSS_RULES);
    }

    fn scan_insecure_crypto(&mut self) {
        match self.language {
            SourceLanguage::Python => self.scan_rules("crypto", &CRYPTO_RULES_PY),
            SourceLanguage::JavaScript | SourceLanguage::TypeScript => {
                self.scan_rules("crypto", &CRYPTO_RULES_JS)
            }
            SourceLanguage::Unknown => {}
        }
    }

    fn scan_path_traversal(&mut self) {
        match self.language {
            SourceLanguage::Python => self.scan_rules("path_traversal", &PATH_RULES_PY),
            SourceLanguage::JavaScript | SourceLanguage::TypeScript => {
                self.scan_rules("path_traversal", &PATH_RULES_JS)
            }
            SourceLanguage::Unknown => {}
        }
    }

    fn scan_command_injection(&mut self) {
        match self.language {
            SourceLanguage::Python => self.scan_rules("command_injection", &CMD_RULES_PY),
            SourceLanguage::JavaScript | SourceLanguage::TypeScript => {
                self.scan_rules("command_injection", &CMD_RULES_JS)
            }
            SourceLanguage::Unknown => {}
        }
    }

    fn scan_rules(&mut self, category: &str, rules: &[PatternRule]) {
        let code = self.code;
        for (idx, line) in code.lines().enumerate() {
            for rule in rules {
                if rule.regex.is_match(line) {
                    self.findings.push(SecurityFinding {
                        category: category.to_string(),
                        issue: rule.issue.to_string(),
                        detail: format!("{} detected", rule.issue),
                        line: idx + 1,
                        severity: rule.severity,
                        recommendation: rule.recommendation.to_string(),
                    });
                }
            }
        }
    }

    /// Like `scan_rules`, but the matched credential is masked in the
    /// finding detail.
    fn scan_masked(&mut self, category: &str, rules: &[PatternRule]) {
        let code = self.code;
        for (idx, line) in code.lines().enumerate() {
            for rule in rules {
                for caps in rule.regex.captures_iter(line) {
                    let credential = caps
                        .iter()
                        .skip(1)
                        .flatten()
                        .last()
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str())
                        .unwrap_or("");
                    self.findings.push(SecurityFinding {
                        category: category.to_string(),
                        issue: rule.issue.to_string(),
                        detail: format!("{} found: {}", rule.issue, mask_credential(credential)),
                        line: idx + 1,
                        severity: rule.severity,
                        recommendation: rule.recommendation.to_string(),
                    });
                }
            }
        }
    }
}

/// Mask all but the first and last four characters.
fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

fn summarize(findings: &[SecurityFinding]) -> SeverityCounts {
    let mut counts = SeverityCounts {
        total: findings.len(),
        ..Default::default()
    };
    for finding in findings {
        match finding.severity {
            Severity::Critical => counts.critical += 1,
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
            Severity::Unknown => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hardcoded_credential_is_masked() {
        let code = "api_key = \"abcdef1234567890\"\n";
        let report = SecurityScanner::new(code, &PathBuf::from("app.py")).run();

        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.high, 1);
        let finding = &report.findings[0];
        assert_eq!(finding.category, "credentials");
        assert_eq!(finding.line, 1);
        assert!(finding.detail.contains("abcd"));
        assert!(finding.detail.contains("****"));
        assert!(!finding.detail.contains("abcdef1234567890"));
    }

    #[test]
    fn test_sql_concatenation_python() {
        let code = "cursor.execute(\"SELECT * FROM users WHERE id = \" + user_id)\n";
        let report = SecurityScanner::new(code, &PathBuf::from("db.py")).run();
        assert!(report
            .findings
            .iter()
            .any(|f| f.category == "sql_injection"));
    }

    #[test]
    fn test_xss_only_for_curly_languages() {
        let code = "element.innerHTML = req.query.name;\n";
        let js = SecurityScanner::new(code, &PathBuf::from("app.js")).run();
        assert!(js.findings.iter().any(|f| f.category == "xss"));

        let py = SecurityScanner::new(code, &PathBuf::from("app.py")).run();
        assert!(!py.findings.iter().any(|f| f.category == "xss"));
    }

    #[test]
    fn test_command_injection_python() {
        let code = "os.system(\"ls -la \" + directory)\n";
        let report = SecurityScanner::new(code, &PathBuf::from("tool.py")).run();
        assert!(report
            .findings
            .iter()
            .any(|f| f.category == "command_injection" && f.severity == Severity::High));
    }

    #[test]
    fn test_clean_file_has_no_findings() {
        let code = "def add(a, b):\n    return a + b\n";
        let report = SecurityScanner::new(code, &PathBuf::from("math.py")).run();
        assert!(report.findings.is_empty());
        assert_eq!(report.summary, SeverityCounts::default());
    }

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("short"), "****");
        assert_eq!(mask_credential("abcdefghijkl"), "abcd****ijkl");
    }

    #[test]
    fn test_suggestions_conversion() {
        let code = "password = \"supersecret99\"\n";
        let report = SecurityScanner::new(code, &PathBuf::from("cfg.py")).run();
        let suggestions = report.suggestions();
        assert_eq!(suggestions.len(), report.findings.len());
        assert!(matches!(
            suggestions[0],
            Suggestion::Security { line: 1, .. }
        ));
    }
}
