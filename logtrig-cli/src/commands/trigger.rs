//! `logtrig trigger` command handler

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use logtrig_core::config::LogtrigConfig;
use logtrig_source::SourceLoader;
use logtrig_trigger::recipe::{LoadFailure, NextTarget};
use logtrig_trigger::{
    ChainPass, EvalOptions, MultiInstance, RecipeLoader, StepOutcome, StepTrace, TriggerEngine,
    TriggerReport,
};

use crate::cli::{TriggerAction, TriggerArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, render_notes};

/// Execute the `trigger` command.
pub async fn execute(
    args: TriggerArgs,
    config: &LogtrigConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        TriggerAction::Test {
            recipe,
            sample,
            source,
            timestamp_format,
            no_rejected,
        } => {
            let request = TestRequest {
                recipe,
                sample,
                source,
                timestamp_format,
                include_rejected: config.trigger.include_rejected && !no_rejected,
            };
            execute_test(request, config, writer).await
        }
        TriggerAction::Validate { path } => {
            let dir = path.unwrap_or_else(|| PathBuf::from(&config.trigger.recipe_dir));
            execute_validate(&dir, writer).await
        }
    }
}

struct TestRequest {
    recipe: PathBuf,
    sample: PathBuf,
    source: Option<PathBuf>,
    timestamp_format: Option<String>,
    include_rejected: bool,
}

/// Execute the trigger test subcommand.
///
/// The timestamp format is resolved in order: `--timestamp-format`, the `--source`
/// definition's timestamp format, then `trigger.default_timestamp_format`.
/// Ctrl-C cancels the evaluation; the partial report is still rendered.
///
/// # Errors
///
/// Returns `CliError::Definition` if the recipe or source definition fails to load,
/// `CliError::Io` if the sample cannot be read, and `CliError::Command` if the
/// evaluation was cancelled.
async fn execute_test(
    request: TestRequest,
    config: &LogtrigConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let recipe = RecipeLoader::load_file(&request.recipe).await?;
    let sample = tokio::fs::read_to_string(&request.sample).await?;
    let format = resolve_timestamp_format(&request, config).await?;

    info!(
        recipe = %recipe.id,
        sample = %request.sample.display(),
        format = %format,
        "evaluating trigger recipe"
    );

    let lint = recipe.lint();
    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        })
    };

    let options = EvalOptions::default()
        .with_timestamp_format(&format)
        .with_include_rejected(request.include_rejected)
        .with_cancel(cancel);
    let report =
        tokio::task::spawn_blocking(move || TriggerEngine::evaluate(&recipe, &sample, &options))
            .await
            .map_err(|e| CliError::Command(format!("evaluation task failed: {e}")))?;
    watcher.abort();

    let cancelled = report.cancelled;
    let payload = TriggerTestReport {
        recipe_path: request.recipe.display().to_string(),
        sample_path: request.sample.display().to_string(),
        lint,
        report,
    };
    writer.render(&payload)?;

    if cancelled {
        return Err(CliError::Command("evaluation cancelled".to_owned()));
    }
    Ok(())
}

async fn resolve_timestamp_format(
    request: &TestRequest,
    config: &LogtrigConfig,
) -> Result<String, CliError> {
    if let Some(ref format) = request.timestamp_format {
        return Ok(format.clone());
    }
    if let Some(ref path) = request.source {
        let definition = SourceLoader::load_file(path).await?;
        match definition.timestamp {
            Some(ts) if !ts.format.is_empty() => return Ok(ts.format),
            _ => warn!(
                source = %definition.id,
                "source definition has no timestamp format, using config default"
            ),
        }
    }
    Ok(config.trigger.default_timestamp_format.clone())
}

/// Execute the trigger validate subcommand.
///
/// # Errors
///
/// Returns `CliError::Definition` if the directory cannot be read or any recipe is invalid.
async fn execute_validate(dir: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %dir.display(), "validating trigger recipes");

    let outcome = RecipeLoader::load_directory_report(dir).await?;
    let report = RecipeValidationReport {
        path: dir.display().to_string(),
        valid: outcome.recipes.len(),
        invalid: outcome.failures.len(),
        recipes: outcome
            .recipes
            .iter()
            .map(|(path, recipe)| RecipeEntry {
                file: path.display().to_string(),
                id: recipe.id.clone(),
                title: recipe.title.clone(),
                class: format!("{:?}", recipe.class).to_lowercase(),
                steps: recipe.steps.len(),
                warnings: recipe.lint(),
            })
            .collect(),
        failures: outcome.failures,
    };

    writer.render(&report)?;

    if report.invalid > 0 {
        return Err(CliError::Definition(format!(
            "{} invalid recipe file(s)",
            report.invalid
        )));
    }
    Ok(())
}

// ---- payloads ----

#[derive(Serialize)]
pub struct TriggerTestReport {
    pub recipe_path: String,
    pub sample_path: String,
    /// Recipe lint warnings (unreachable steps, malformed params, ...).
    pub lint: Vec<String>,
    pub report: TriggerReport,
}

impl Render for TriggerTestReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.report;
        writeln!(
            w,
            "Recipe: {} ({}) from {}",
            r.recipe_id.bold(),
            format!("{:?}", r.class).to_lowercase(),
            self.recipe_path
        )?;
        writeln!(
            w,
            "Sample: {} ({} lines, {} timestamped, format {})",
            self.sample_path,
            r.lines_scanned,
            r.lines_timestamped,
            r.timestamp_format.as_deref().unwrap_or("none")
        )?;
        let verdict = if r.triggered {
            "TRIGGERED".green().bold()
        } else {
            "not triggered".yellow()
        };
        writeln!(w, "Result: {verdict}")?;

        if !r.firings.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Firings:".bold())?;
            for firing in &r.firings {
                let suppressed = if firing.suppressed {
                    " [suppressed]".yellow().to_string()
                } else {
                    String::new()
                };
                writeln!(
                    w,
                    "  #{} at {}{}{}",
                    firing.index + 1,
                    timestamp_or_dash(firing.pass.firing_timestamp),
                    describe_terminal(firing.pass.terminal.as_ref()),
                    suppressed
                )?;
                render_pass(w, &firing.pass)?;
            }
        }

        if let Some(ref trailing) = r.trailing {
            writeln!(w)?;
            writeln!(w, "{}", "Unfinished pass:".bold())?;
            render_pass(w, trailing)?;
        }

        if !r.instances.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Instances:".bold())?;
            for instance in &r.instances {
                render_instance(w, instance)?;
            }
        }

        writeln!(w)?;
        writeln!(
            w,
            "Summary: {} firing(s), {} suppressed, {} instance(s) spawned, {} refused",
            r.summary.firings,
            r.summary.suppressed,
            r.summary.instances_spawned,
            r.summary.instances_refused
        )?;
        if r.summary.cap_reached {
            writeln!(w, "  {}", "firing cap reached, evaluation stopped early".red())?;
        }
        if r.cancelled {
            writeln!(w, "  {}", "evaluation cancelled".red())?;
        }

        render_notes(w, "Lint warnings:", &self.lint)?;
        render_notes(w, "Diagnostics:", &r.diagnostics)?;
        Ok(())
    }
}

fn render_pass(w: &mut dyn Write, pass: &ChainPass) -> std::io::Result<()> {
    if pass.resets > 0 {
        writeln!(w, "    chain reset {} time(s) by delay steps", pass.resets)?;
    }
    if pass.stalled {
        writeln!(w, "    pass stalled without consuming lines")?;
    }
    for step in &pass.steps {
        render_step(w, step, "    ")?;
    }
    Ok(())
}

fn render_instance(w: &mut dyn Write, instance: &MultiInstance) -> std::io::Result<()> {
    use colored::Colorize;

    let status = format!("{:?}", instance.status).to_lowercase();
    let status = match status.as_str() {
        "fired" => status.green(),
        "cancelled" => status.yellow(),
        _ => status.normal(),
    };
    writeln!(
        w,
        "  #{} key={} {} (created line {}){}{}",
        instance.id,
        instance.captured_key.bold(),
        status,
        instance.created_line,
        describe_terminal(instance.terminal.as_ref()),
        if instance.suppressed { " [suppressed]" } else { "" }
    )?;
    let groups: Vec<String> = instance
        .captured_groups
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    if !groups.is_empty() {
        writeln!(w, "    captures: {}", groups.join(", "))?;
    }
    for step in &instance.steps {
        render_step(w, step, "    ")?;
    }
    Ok(())
}

fn render_step(w: &mut dyn Write, step: &StepTrace, indent: &str) -> std::io::Result<()> {
    use colored::Colorize;

    let outcome = match step.outcome {
        StepOutcome::Fired => "fired".green(),
        StepOutcome::TimedOut => "timed out".green(),
        StepOutcome::Cancelled => "cancelled".yellow(),
        StepOutcome::Incomplete => "incomplete".normal(),
    };
    let lines: Vec<String> = step
        .matches
        .iter()
        .map(|m| m.line_number.to_string())
        .collect();
    let window = step
        .window
        .as_deref()
        .map(|win| format!(" within {win}"))
        .unwrap_or_default();
    writeln!(
        w,
        "{indent}step '{}' ({}{}) {}: matched lines [{}], completed at {}",
        step.name,
        step.step_type,
        window,
        outcome,
        lines.join(", "),
        timestamp_or_dash(step.completed_at)
    )?;
    for rejected in &step.rejected {
        writeln!(
            w,
            "{indent}  rejected line {}: {}",
            rejected.line_number,
            rejected.text.dimmed()
        )?;
    }
    Ok(())
}

fn describe_terminal(target: Option<&NextTarget>) -> String {
    match target {
        Some(NextTarget::Terminal(action)) => format!(" -> {action}"),
        Some(NextTarget::Unresolved(name)) => format!(" -> unresolved '{name}'"),
        Some(NextTarget::Step(idx)) => format!(" -> step #{idx}"),
        Some(NextTarget::End) | None => String::new(),
    }
}

fn timestamp_or_dash(ts: Option<chrono::NaiveDateTime>) -> String {
    ts.map_or_else(|| "-".to_owned(), |t| t.to_string())
}

#[derive(Serialize)]
pub struct RecipeValidationReport {
    pub path: String,
    pub valid: usize,
    pub invalid: usize,
    pub recipes: Vec<RecipeEntry>,
    pub failures: Vec<LoadFailure>,
}

#[derive(Serialize)]
pub struct RecipeEntry {
    pub file: String,
    pub id: String,
    pub title: String,
    pub class: String,
    pub steps: usize,
    pub warnings: Vec<String>,
}

impl Render for RecipeValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Recipe Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Files: {} total, {} valid, {} invalid",
            self.valid + self.invalid,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        if !self.recipes.is_empty() {
            writeln!(w)?;
            writeln!(w, "{:<25} {:<30} {:<8} Steps", "ID", "Title", "Class")?;
            writeln!(w, "{}", "-".repeat(70))?;
            for r in &self.recipes {
                writeln!(w, "{:<25} {:<30} {:<8} {}", r.id, r.title, r.class, r.steps)?;
                for warning in &r.warnings {
                    writeln!(w, "  {} {}", "warning:".yellow(), warning)?;
                }
            }
        }

        if !self.failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for f in &self.failures {
                writeln!(w, "  {}: {}", f.path.red(), f.reason)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    const RECIPE: &str = r#"
id: disk-full
title: Disk nearly full
steps:
  - name: full
    trigger:
      - syntax: "\\S+ disk usage=(<<pct>>\\d+)%"
        params: "1,90,>=,pct"
    next: "@notify"
"#;

    fn test_report(sample: &str) -> TriggerTestReport {
        let recipe = RecipeLoader::parse_yaml(RECIPE, "disk.yml").expect("parse");
        let options = EvalOptions::default().with_timestamp_format("HH:mm:ss");
        TriggerTestReport {
            recipe_path: "disk.yml".to_owned(),
            sample_path: "sample.log".to_owned(),
            lint: recipe.lint(),
            report: TriggerEngine::evaluate(&recipe, sample, &options),
        }
    }

    fn render_text(payload: &impl Render) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        payload.render_text(&mut buffer).expect("render");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn text_report_shows_firing_and_rejected_lines() {
        let payload = test_report("10:00:00 disk usage=50%\n10:00:05 disk usage=95%");
        let text = render_text(&payload);

        assert!(text.contains("Result: TRIGGERED"), "{text}");
        assert!(text.contains("#1 at 2000-01-01 10:00:05 -> @notify"), "{text}");
        assert!(text.contains("matched lines [2]"), "{text}");
        assert!(text.contains("rejected line 1"), "{text}");
    }

    #[test]
    fn json_report_nests_engine_report() {
        let payload = test_report("10:00:00 disk usage=99%");
        let writer = OutputWriter::new(OutputFormat::Json);
        let mut buffer = Vec::new();
        writer.render_to(&payload, &mut buffer).expect("render");

        let json: serde_json::Value = serde_json::from_slice(&buffer).expect("valid JSON");
        assert_eq!(json["recipe_path"], "disk.yml");
        assert_eq!(json["report"]["recipe_id"], "disk-full");
        assert_eq!(json["report"]["triggered"], true);
        assert_eq!(json["report"]["firings"][0]["terminal"]["target"], "notify");
    }

    #[tokio::test]
    async fn timestamp_format_resolution_order() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let source = temp_dir.path().join("app.yml");
        std::fs::write(
            &source,
            "id: app\ndirectory: /var/log/app\ntimestamp:\n  format: \"HH:mm:ss\"\n",
        )
        .expect("write");

        let config = LogtrigConfig::default();
        let mut request = TestRequest {
            recipe: PathBuf::from("r.yml"),
            sample: PathBuf::from("s.log"),
            source: Some(source),
            timestamp_format: Some("yyyy/MM/dd".to_owned()),
            include_rejected: true,
        };
        let format = resolve_timestamp_format(&request, &config).await.expect("resolve");
        assert_eq!(format, "yyyy/MM/dd");

        request.timestamp_format = None;
        let format = resolve_timestamp_format(&request, &config).await.expect("resolve");
        assert_eq!(format, "HH:mm:ss");

        request.source = None;
        let format = resolve_timestamp_format(&request, &config).await.expect("resolve");
        assert_eq!(format, config.trigger.default_timestamp_format);
    }

    #[test]
    fn validation_report_lists_failures() {
        let report = RecipeValidationReport {
            path: "/etc/logtrig/triggers".to_owned(),
            valid: 0,
            invalid: 1,
            recipes: Vec::new(),
            failures: vec![LoadFailure {
                path: "broken.yml".to_owned(),
                reason: "recipe must have at least one step".to_owned(),
            }],
        };
        let text = render_text(&report);
        assert!(text.contains("1 invalid"));
        assert!(text.contains("broken.yml: recipe must have at least one step"));
    }
}
