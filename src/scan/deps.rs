//! Dependency vulnerability scanning.
//!
//! Delegates to external tools (`safety` for Python manifests, `npm audit`
//! for JavaScript) and normalizes their output into a common shape. A
//! missing tool degrades to an explicit warning, never a failed run.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::suggestion::{Severity, Suggestion};

/// One vulnerable dependency, normalized across tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyVulnerability {
    pub package: String,
    #[serde(default)]
    pub installed_version: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_version: Option<String>,
}

/// A scanning tool that was needed but unavailable or broken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolWarning {
    pub tool: String,
    pub message: String,
    pub install_hint: String,
}

/// Combined dependency scan results for a project directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyReport {
    pub vulnerabilities: Vec<DependencyVulnerability>,
    #[serde(default)]
    pub warnings: Vec<ToolWarning>,
    pub total: usize,
}

impl DependencyReport {
    /// Convert vulnerabilities into the common suggestion shape.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.vulnerabilities
            .iter()
            .map(|v| Suggestion::Dependency {
                package: v.package.clone(),
                installed_version: v.installed_version.clone(),
                severity: v.severity,
                fix_version: v.fix_version.clone(),
                detail: v.description.clone(),
            })
            .collect()
    }
}

/// Python manifest files checked in order.
const PYTHON_MANIFESTS: &[&str] = &["requirements.txt", "Pipfile", "pyproject.toml", "setup.py"];

/// Runs the available dependency scanners against one project directory.
pub struct DependencyScanner {
    project_dir: PathBuf,
}

impl DependencyScanner {
    pub fn new<P: AsRef<Path>>(project_dir: P) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Run every applicable scan. Tool failures become warnings; only an
    /// empty report ever comes back from a directory with no manifests.
    pub fn run(&self) -> DependencyReport {
        info!(dir = %self.project_dir.display(), "scanning dependencies");
        let mut report = DependencyReport::default();

        match self.find_python_manifest() {
            Some(manifest) if tool_available("safety") => {
                match self.scan_python(&manifest) {
                    Ok(vulns) => report.vulnerabilities.extend(vulns),
                    Err(e) => {
                        warn!(error = %e, "safety check failed");
                        report.warnings.push(ToolWarning {
                            tool: "safety".to_string(),
                            message: format!("scan failed: {}", e),
                            install_hint: "pip install safety".to_string(),
                        });
                    }
                }
            }
            Some(_) => {
                warn!("`safety` is not installed; skipping Python dependency scan");
                report.warnings.push(ToolWarning {
                    tool: "safety".to_string(),
                    message: "safety is not installed; Python dependencies were not scanned"
                        .to_string(),
                    install_hint: "pip install safety".to_string(),
                });
            }
            None => debug!("no Python dependency manifest found"),
        }

        match self.find_package_json() {
            Some(manifest) if tool_available("npm") => {
                let pkg_dir = manifest
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.project_dir.clone());
                match self.scan_javascript(&pkg_dir) {
                    Ok(vulns) => report.vulnerabilities.extend(vulns),
                    Err(e) => {
                        warn!(error = %e, "npm audit failed");
                        report.warnings.push(ToolWarning {
                            tool: "npm".to_string(),
                            message: format!("scan failed: {}", e),
                            install_hint: "install Node.js from https://nodejs.org/".to_string(),
                        });
                    }
                }
            }
            Some(_) => {
                warn!("`npm` is not installed; skipping JavaScript dependency scan");
                report.warnings.push(ToolWarning {
                    tool: "npm".to_string(),
                    message: "npm is not installed; JavaScript dependencies were not scanned"
                        .to_string(),
                    install_hint: "install Node.js from https://nodejs.org/".to_string(),
                });
            }
            None => debug!("no package.json found"),
        }

        report.total = report.vulnerabilities.len();
        info!(total = report.total, "dependency scan complete");
        report
    }

    fn find_python_manifest(&self) -> Option<PathBuf> {
        PYTHON_MANIFESTS
            .iter()
            .map(|name| self.project_dir.join(name))
            .find(|p| p.exists())
    }

    fn find_package_json(&self) -> Option<PathBuf> {
        let path = self.project_dir.join("package.json");
        path.exists().then_some(path)
    }

    fn scan_python(&self, manifest: &Path) -> anyhow::Result<Vec<DependencyVulnerability>> {
        info!(manifest = %manifest.display(), "running safety check");
        let output = Command::new("safety")
            .args(["check", "--json", "-r"])
            .arg(manifest)
            .output()?;

        // safety exits zero when nothing is vulnerable.
        if output.status.success() {
            return Ok(Vec::new());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_safety_output(&stdout))
    }

    fn scan_javascript(&self, pkg_dir: &Path) -> anyhow::Result<Vec<DependencyVulnerability>> {
        info!(dir = %pkg_dir.display(), "running npm audit");
        let output = Command::new("npm")
            .args(["audit", "--json"])
            .current_dir(pkg_dir)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_npm_audit(&stdout)
    }
}

fn tool_available(tool: &str) -> bool {
    which::which(tool).is_ok()
}

fn str_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| value.get(k).and_then(Value::as_str))
        .next()
        .unwrap_or("")
        .to_string()
}

/// Parse `safety check --json` output. Newer versions wrap findings in an
/// object, older ones emit a bare array; anything unparsable falls back to
/// one entry per non-empty text line.
pub(crate) fn parse_safety_output(stdout: &str) -> Vec<DependencyVulnerability> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(map)) => map
            .get("vulnerabilities")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(safety_entry).collect())
            .unwrap_or_default(),
        Ok(Value::Array(arr)) => arr.iter().map(safety_entry).collect(),
        _ => {
            warn!("could not parse safety output as JSON; using text fallback");
            stdout
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|line| DependencyVulnerability {
                    package: line
                        .split(['[', ' '])
                        .next()
                        .unwrap_or(line)
                        .trim()
                        .to_string(),
                    installed_version: String::new(),
                    severity: Severity::Unknown,
                    description: line.trim().to_string(),
                    fix_version: None,
                })
                .collect()
        }
    }
}

fn safety_entry(value: &Value) -> DependencyVulnerability {
    DependencyVulnerability {
        package: str_field(value, &["package_name", "package", "name"]),
        installed_version: str_field(value, &["analyzed_version", "installed_version"]),
        severity: Severity::parse(&str_field(value, &["severity"])),
        description: str_field(value, &["advisory", "description"]),
        fix_version: value
            .get("fixed_versions")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .or_else(|| value.get("fixed_version").and_then(Value::as_str))
            .map(str::to_owned),
    }
}

/// Parse `npm audit --json`, handling both the npm 6 `advisories` map and
/// the npm 7+ `vulnerabilities` map. Invalid JSON is an error here; the
/// caller converts it into a tool warning.
pub(crate) fn parse_npm_audit(stdout: &str) -> anyhow::Result<Vec<DependencyVulnerability>> {
    let value: Value = serde_json::from_str(stdout)
        .map_err(|e| anyhow::anyhow!("npm audit did not return valid JSON: {}", e))?;

    let mut vulnerabilities = Vec::new();

    if let Some(advisories) = value.get("advisories").and_then(Value::as_object) {
        for advisory in advisories.values() {
            vulnerabilities.push(DependencyVulnerability {
                package: str_field(advisory, &["module_name"]),
                installed_version: str_field(advisory, &["vulnerable_versions"]),
                severity: Severity::parse(&str_field(advisory, &["severity"])),
                description: str_field(advisory, &["overview", "title"]),
                fix_version: advisory
                    .get("recommendation")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            });
        }
    } else if let Some(vulns) = value.get("vulnerabilities").and_then(Value::as_object) {
        for (name, entry) in vulns {
            let description = entry
                .get("via")
                .and_then(Value::as_array)
                .and_then(|via| {
                    via.iter().find_map(|v| match v {
                        Value::String(s) => Some(format!("via {}", s)),
                        Value::Object(o) => o.get("title").and_then(Value::as_str).map(str::to_owned),
                        _ => None,
                    })
                })
                .unwrap_or_default();
            let fix_version = match entry.get("fixAvailable") {
                Some(Value::Object(fix)) => {
                    let pkg = fix.get("name").and_then(Value::as_str).unwrap_or(name);
                    fix.get("version")
                        .and_then(Value::as_str)
                        .map(|v| format!("{}@{}", pkg, v))
                }
                Some(Value::Bool(true)) => Some("update to the latest version".to_string()),
                _ => None,
            };
            vulnerabilities.push(DependencyVulnerability {
                package: name.clone(),
                installed_version: str_field(entry, &["range"]),
                severity: Severity::parse(&str_field(entry, &["severity"])),
                description,
                fix_version,
            });
        }
    }

    Ok(vulnerabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_python_manifest_priority() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("pyproject.toml"), "[project]\n").unwrap();
        std::fs::write(temp.path().join("requirements.txt"), "requests\n").unwrap();

        let scanner = DependencyScanner::new(temp.path());
        let manifest = scanner.find_python_manifest().unwrap();
        assert!(manifest.ends_with("requirements.txt"));
    }

    #[test]
    fn test_no_manifest_found() {
        let temp = TempDir::new().unwrap();
        let scanner = DependencyScanner::new(temp.path());
        assert!(scanner.find_python_manifest().is_none());
        assert!(scanner.find_package_json().is_none());
    }

    #[test]
    fn test_parse_safety_object_shape() {
        let stdout = r#"{
            "vulnerabilities": [
                {
                    "package_name": "django",
                    "analyzed_version": "2.2.0",
                    "severity": "high",
                    "advisory": "Cross-site scripting vulnerability",
                    "fixed_versions": ["2.2.28"]
                }
            ]
        }"#;
        let vulns = parse_safety_output(stdout);
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].package, "django");
        assert_eq!(vulns[0].installed_version, "2.2.0");
        assert_eq!(vulns[0].severity, Severity::High);
        assert_eq!(vulns[0].fix_version.as_deref(), Some("2.2.28"));
    }

    #[test]
    fn test_parse_safety_array_shape() {
        let stdout = r#"[{"package": "flask", "severity": "medium", "description": "open redirect"}]"#;
        let vulns = parse_safety_output(stdout);
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].package, "flask");
        assert_eq!(vulns[0].severity, Severity::Medium);
    }

    #[test]
    fn test_parse_safety_text_fallback() {
        let stdout = "urllib3 [1.25.0] insecure TLS handling\n\n";
        let vulns = parse_safety_output(stdout);
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].package, "urllib3");
        assert_eq!(vulns[0].severity, Severity::Unknown);
    }

    #[test]
    fn test_parse_npm_audit_advisories() {
        let stdout = r#"{
            "advisories": {
                "118": {
                    "module_name": "axios",
                    "vulnerable_versions": "<0.21.1",
                    "severity": "moderate",
                    "title": "Server-Side Request Forgery",
                    "recommendation": "Upgrade to 0.21.1 or later"
                }
            }
        }"#;
        let vulns = parse_npm_audit(stdout).unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].package, "axios");
        assert_eq!(vulns[0].severity, Severity::Medium);
        assert!(vulns[0].fix_version.as_deref().unwrap().contains("0.21.1"));
    }

    #[test]
    fn test_parse_npm_audit_v7_shape() {
        let stdout = r#"{
            "vulnerabilities": {
                "lodash": {
                    "severity": "high",
                    "range": "<4.17.21",
                    "via": [{"title": "Prototype Pollution"}],
                    "fixAvailable": {"name": "lodash", "version": "4.17.21"}
                }
            }
        }"#;
        let vulns = parse_npm_audit(stdout).unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].package, "lodash");
        assert_eq!(vulns[0].description, "Prototype Pollution");
        assert_eq!(vulns[0].fix_version.as_deref(), Some("lodash@4.17.21"));
    }

    #[test]
    fn test_parse_npm_audit_invalid_json() {
        assert!(parse_npm_audit("not json at all").is_err());
    }

    #[test]
    fn test_report_suggestions() {
        let report = DependencyReport {
            vulnerabilities: vec![DependencyVulnerability {
                package: "left-pad".to_string(),
                installed_version: "1.0.0".to_string(),
                severity: Severity::Critical,
                description: "bad things".to_string(),
                fix_version: Some("1.3.0".to_string()),
            }],
            warnings: Vec::new(),
            total: 1,
        };
        let suggestions = report.suggestions();
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].severity().is_blocking());
    }
}
