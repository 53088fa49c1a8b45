//! Command-line interface for ai-review.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::ai;
use crate::analysis;
use crate::apply::{FixApplier, FixOutcome};
use crate::config::ReviewConfig;
use crate::plugins::{PluginRegistry, SuggestContext};
use crate::report::{self, FileReview, UnifiedReport};
use crate::scan::{DependencyScanner, SecurityScanner};
use crate::suggestion::Suggestion;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

static DEFAULT_CONFIG_TEMPLATE: &str = include_str!("templates/default.yaml");

/// AI-assisted code review tool.
///
/// Reviews a file or directory and produces a unified report combining
/// structural complexity analysis, security pattern scanning, dependency
/// vulnerability scanning, and optional LLM-powered suggestions.
#[derive(Parser)]
#[command(name = "ai-review")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Review a file or directory
    Review(ReviewArgs),
    /// List registered plugins and supported extensions
    Plugins,
    /// Create a starter configuration file
    Init(InitArgs),
}

/// Arguments for the review command.
#[derive(Parser)]
pub struct ReviewArgs {
    /// Path to review (file or directory)
    pub path: PathBuf,

    /// Path to config file (default: auto-discover)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty, json, or markdown
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Complexity threshold for flagging functions
    #[arg(short = 'c', long)]
    pub complexity_threshold: Option<u32>,

    /// Run the AI-powered review
    #[arg(short, long)]
    pub ai: bool,

    /// Model API key (default: OPENAI_API_KEY environment variable)
    #[arg(short = 'k', long)]
    pub api_key: Option<String>,

    /// Model to use for the AI review
    #[arg(short, long)]
    pub model: Option<String>,

    /// Scan source files for security issues
    #[arg(short, long)]
    pub security_scan: bool,

    /// Scan dependency manifests for known vulnerabilities
    #[arg(short, long)]
    pub dependency_scan: bool,

    /// Apply AI-suggested fixes (requires --ai)
    #[arg(long)]
    pub apply_fixes: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = ".ai-review.yaml")]
    pub output: PathBuf,
}

/// Run the review command.
pub fn run_review(args: &ReviewArgs) -> anyhow::Result<i32> {
    // Configuration problems are fatal before any partial work happens.
    if !matches!(args.format.as_str(), "pretty" | "json" | "markdown") {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty', 'json', or 'markdown'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let mut config = match ReviewConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Some(threshold) = args.complexity_threshold {
        config.complexity_threshold = threshold;
    }
    if let Some(model) = &args.model {
        config.ai.model = model.clone();
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {}", e);
        return Ok(EXIT_ERROR);
    }

    if args.apply_fixes && !args.ai {
        eprintln!("Error: --apply-fixes requires --ai");
        return Ok(EXIT_ERROR);
    }

    let ai_client = if args.ai {
        match ai::Client::new(
            args.api_key.clone(),
            config.ai.model.clone(),
            config.ai.base_url.clone(),
        ) {
            Ok(client) => Some(client),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    } else {
        None
    };

    let abs_path = match args.path.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    let metadata = std::fs::metadata(&abs_path)?;

    // The registry is built once per run and passed by reference below.
    let mut registry = PluginRegistry::with_builtins();
    let load_results = registry.load_all();
    for (name, ok) in &load_results {
        if !ok {
            warn!(plugin = %name, "plugin failed to load");
        }
    }
    debug!(extensions = ?registry.supported_extensions(), "analyzers ready");

    let files = if metadata.is_dir() {
        collect_files(&abs_path, &registry, &config)?
    } else {
        vec![abs_path.clone()]
    };
    if files.is_empty() {
        eprintln!("Warning: no supported files to review");
        return Ok(EXIT_SUCCESS);
    }
    info!(count = files.len(), "reviewing files");

    let runtime = if ai_client.is_some() {
        Some(tokio::runtime::Runtime::new()?)
    } else {
        None
    };

    let mut reviews = Vec::with_capacity(files.len());
    for file in &files {
        reviews.push(review_file(
            file,
            &registry,
            &config,
            args,
            ai_client.as_ref(),
            runtime.as_ref(),
        ));
    }

    let dependencies = if args.dependency_scan {
        let project_dir = if metadata.is_dir() {
            abs_path.clone()
        } else {
            abs_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        Some(DependencyScanner::new(&project_dir).run())
    } else {
        None
    };

    let report = UnifiedReport::new(
        &args.path.to_string_lossy(),
        config.complexity_threshold,
        reviews,
        dependencies,
    );

    let rendered = match args.format.as_str() {
        "json" => Some(report.to_json()?),
        "markdown" => Some(report.to_markdown()),
        _ => None,
    };

    match (&args.output, rendered) {
        (Some(output), rendered) => {
            // A file target always gets a parseable document.
            let content = rendered.map(Ok).unwrap_or_else(|| report.to_json())?;
            std::fs::write(output, content)?;
            println!("Report saved to {}", output.display());
        }
        (None, Some(rendered)) => println!("{}", rendered),
        (None, None) => report::write_pretty(&report),
    }

    if report.has_blocking_findings() {
        Ok(EXIT_FINDINGS)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Review one file: analyze, scan, suggest, optionally fix.
///
/// Nothing here aborts the run; every failure lands in the corresponding
/// result structure.
fn review_file(
    path: &Path,
    registry: &PluginRegistry,
    config: &ReviewConfig,
    args: &ReviewArgs,
    ai_client: Option<&ai::Client>,
    runtime: Option<&tokio::runtime::Runtime>,
) -> FileReview {
    info!(file = %path.display(), "reviewing");

    let mut analysis = analysis::analyze_path(registry, path);
    let analyze_outcome = registry.dispatch_analyze(path, &mut analysis);
    if !analyze_outcome.failures.is_empty() {
        debug!(
            failed = analyze_outcome.failures.len(),
            "analyze hooks failed"
        );
    }

    let code = std::fs::read_to_string(path).unwrap_or_default();
    let mut suggestions: Vec<Suggestion> = Vec::new();

    let security = if args.security_scan && !analysis.is_error() {
        let security_report = SecurityScanner::new(&code, path).run();
        suggestions.extend(security_report.suggestions());
        Some(security_report)
    } else {
        None
    };

    let ai_result = match (ai_client, runtime) {
        (Some(client), Some(runtime)) if !analysis.is_error() => {
            let result = match runtime.block_on(client.review(&code, &analysis)) {
                Ok(payload) => ai::AiReviewResult {
                    review: Some(payload),
                    error: None,
                },
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "AI review unavailable");
                    ai::AiReviewResult::unavailable(&e.to_string())
                }
            };
            suggestions.extend(result.suggestions());
            Some(result)
        }
        _ => None,
    };

    let ctx = SuggestContext {
        file: path,
        analysis: &analysis,
        complexity_threshold: config.complexity_threshold,
    };
    registry.dispatch_suggest(&ctx, &mut suggestions);

    let fixes = apply_fixes(path, args, registry, ai_client, runtime, ai_result.as_ref(), &suggestions);

    FileReview {
        analysis,
        suggestions,
        security,
        ai: ai_result,
        fixes,
    }
}

fn apply_fixes(
    path: &Path,
    args: &ReviewArgs,
    registry: &PluginRegistry,
    ai_client: Option<&ai::Client>,
    runtime: Option<&tokio::runtime::Runtime>,
    ai_result: Option<&ai::AiReviewResult>,
    suggestions: &[Suggestion],
) -> Option<FixOutcome> {
    if !args.apply_fixes {
        return None;
    }
    let (client, runtime) = match (ai_client, runtime) {
        (Some(client), Some(runtime)) => (client, runtime),
        _ => return None,
    };
    let payload = match ai_result {
        Some(ai::AiReviewResult {
            review: Some(payload),
            ..
        }) => payload,
        _ => {
            warn!(file = %path.display(), "no AI review to apply fixes from");
            return None;
        }
    };

    let outcome = match runtime.block_on(FixApplier::new(client).apply(path, payload)) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to apply fixes");
            FixOutcome::failed(&e.to_string())
        }
    };

    let mut outcome_value = serde_json::to_value(&outcome).unwrap_or(Value::Null);
    for suggestion in suggestions {
        registry.dispatch_apply(path, suggestion, &mut outcome_value);
    }

    Some(outcome)
}

/// Collect reviewable files under a directory.
fn collect_files(
    root: &Path,
    registry: &PluginRegistry,
    config: &ReviewConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    let supported = registry.supported_extensions();
    let exclude = config.exclude_matcher()?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            e.path() == root || !config.is_dir_excluded(&name)
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        // Patterns match against the full path or just the file name, so
        // "*.min.js" works without a "**/" prefix.
        if exclude.is_match(path) || exclude.is_match(file_name.as_ref()) {
            debug!(file = %path.display(), "excluded by config");
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if supported.iter().any(|s| *s == ext) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Run the plugins command.
pub fn run_plugins() -> anyhow::Result<i32> {
    let mut registry = PluginRegistry::with_builtins();
    let results = registry.load_all();

    println!("Plugins:");
    for name in registry.plugin_names() {
        println!("  {}", name);
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(name, _)| name.as_str())
        .collect();
    if !failed.is_empty() {
        println!();
        println!("Failed to load:");
        for name in failed {
            println!("  {}", name);
        }
    }

    println!();
    println!("Supported extensions:");
    for ext in registry.supported_extensions() {
        println!("  .{}", ext);
    }

    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_CONFIG_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: ai-review review . --security-scan");

    Ok(EXIT_SUCCESS)
}
