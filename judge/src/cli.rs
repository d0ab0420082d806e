//! CLI command implementations.
//!
//! Each command returns the process exit code; errors bubble up as
//! [`exit_codes::INVALID`](crate::exit_codes::INVALID).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use sandbox::core::verdict::Verdict;
use sandbox::engine::ContainerSandbox;
use tracing::{debug, info};

use crate::catalog::{DirCatalog, ProblemCatalog};
use crate::config::{JudgeConfig, write_config};
use crate::exit_codes;
use crate::judge::{Judge, JudgeSettings};
use crate::record::{CompletionRecord, CompletionRecorder, JsonlRecorder};

/// Options for `judge submit`.
#[derive(Debug, Clone)]
pub struct SubmitOptions<'a> {
    pub problem_id: &'a str,
    pub code_file: &'a Path,
    pub json: bool,
    pub user: Option<&'a str>,
}

/// Write the default configuration to `path` unless it already exists.
pub fn init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        eprintln!(
            "config {} already exists; pass --force to overwrite",
            path.display()
        );
        return Ok(exit_codes::OK);
    }
    write_config(path, &JudgeConfig::default())
        .with_context(|| format!("write config {}", path.display()))?;
    info!(path = %path.display(), "config written");
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

/// List catalog problems.
pub fn list_problems(config: &JudgeConfig) -> Result<i32> {
    let catalog = DirCatalog::load(&config.catalog_dir)?;
    for problem in catalog.problems() {
        println!("{}\t{}", problem.id, problem.title);
    }
    Ok(exit_codes::OK)
}

/// Judge a code file against a problem and print the report.
pub fn submit(config: &JudgeConfig, options: &SubmitOptions<'_>) -> Result<i32> {
    let code = fs::read(options.code_file)
        .with_context(|| format!("read code file {}", options.code_file.display()))?;
    let catalog = DirCatalog::load(&config.catalog_dir)?;
    let sandbox = ContainerSandbox::new(config.sandbox.clone()).context("sandbox config")?;
    let settings = JudgeSettings {
        line_endings: config.compare.line_endings,
        report_limit_chars: config.report_limit_chars,
    };
    let judge = Judge::new(catalog, sandbox, settings);
    debug!(problem_id = options.problem_id, code_bytes = code.len(), "submitting");

    let report = judge.execute(options.problem_id, &code);
    if options.json {
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{json}");
    } else {
        print!("{}", report.render_text());
    }

    if report.verdict == Verdict::Accepted
        && let Some(path) = &config.record_path
    {
        let record = CompletionRecord::new(options.problem_id, options.user, &code, Utc::now());
        JsonlRecorder::new(path)
            .record(&record)
            .context("record completion")?;
        info!(path = %path.display(), "completion recorded");
    }

    Ok(report.exit_code())
}

/// Run the runtime preflight for `image` and print its diagnostics.
pub fn preflight(config: &JudgeConfig, image: &str) -> Result<i32> {
    let sandbox = ContainerSandbox::new(config.sandbox.clone()).context("sandbox config")?;
    let (result, diagnostics) = sandbox.preflight(image);
    print!("{diagnostics}");
    match result {
        Ok(()) => {
            println!("preflight: image={image} ready");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            println!("preflight: image={image} {}: {err}", err.reason());
            Ok(exit_codes::INFRASTRUCTURE)
        }
    }
}
