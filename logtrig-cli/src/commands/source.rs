//! `logtrig source` command handler
//!
//! Each action loads one log-source definition, runs a single transform over the
//! given input and renders the transform's report.

use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::info;

use logtrig_source::extract::{ExtractReport, extract_append};
use logtrig_source::group::{GroupReport, group_lines};
use logtrig_source::multiline::{MultilineReport, assemble};
use logtrig_source::path::{PathMatchReport, match_path};
use logtrig_source::watermark::{WatermarkReport, WatermarkVerdict, filter_lines};
use logtrig_source::{LogSourceConfig, SourceLoader};

use crate::cli::{SourceAction, SourceArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, render_notes};

/// Execute the `source` command.
pub async fn execute(args: SourceArgs, writer: &OutputWriter) -> Result<(), CliError> {
    match args.action {
        SourceAction::Path {
            definition,
            path,
            today,
        } => {
            let source = load_definition(&definition).await?;
            let today = parse_today(today.as_deref())?;
            let report = match_path(&source, &path, &today);
            writer.render(&Sourced::new(&source, report))
        }
        SourceAction::Multiline { definition, sample } => {
            let source = load_definition(&definition).await?;
            let config = section(&source, source.multiline.as_ref(), "multiline")?;
            let text = tokio::fs::read_to_string(&sample).await?;
            writer.render(&Sourced::new(&source, assemble(config, &text)))
        }
        SourceAction::Extract {
            definition,
            path,
            sample,
        } => {
            let source = load_definition(&definition).await?;
            let config = section(&source, source.extract.as_ref(), "extract")?;
            let text = tokio::fs::read_to_string(&sample).await?;
            writer.render(&Sourced::new(&source, extract_append(config, &path, &text)))
        }
        SourceAction::Watermark {
            definition,
            sample,
            since,
        } => {
            let source = load_definition(&definition).await?;
            let config = section(&source, source.timestamp.as_ref(), "timestamp")?;
            let initial = parse_since(&source, since.as_deref())?;
            let text = tokio::fs::read_to_string(&sample).await?;
            writer.render(&Sourced::new(&source, filter_lines(config, &text, initial)))
        }
        SourceAction::Group { definition, sample } => {
            let source = load_definition(&definition).await?;
            let config = section(&source, source.grouping.as_ref(), "grouping")?;
            let text = tokio::fs::read_to_string(&sample).await?;
            writer.render(&Sourced::new(&source, group_lines(config, &text)))
        }
    }
}

async fn load_definition(path: &Path) -> Result<LogSourceConfig, CliError> {
    let source = SourceLoader::load_file(path).await?;
    info!(source = %source.id, path = %path.display(), "loaded log-source definition");
    Ok(source)
}

fn section<'a, T>(
    source: &LogSourceConfig,
    section: Option<&'a T>,
    name: &str,
) -> Result<&'a T, CliError> {
    section.ok_or_else(|| {
        CliError::Definition(format!("source '{}' has no {name} section", source.id))
    })
}

/// Parse `--today` (yyyy-MM-dd). Defaults to the local current time.
fn parse_today(raw: Option<&str>) -> Result<NaiveDateTime, CliError> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| {
                CliError::Command(format!("invalid --today '{s}', expected yyyy-MM-dd"))
            }),
        None => Ok(chrono::Local::now().naive_local()),
    }
}

/// Parse `--since` with the source's own timestamp format.
fn parse_since(
    source: &LogSourceConfig,
    raw: Option<&str>,
) -> Result<Option<NaiveDateTime>, CliError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let format = source.timestamp_format().ok_or_else(|| {
        CliError::Definition(format!(
            "source '{}' has no usable timestamp format",
            source.id
        ))
    })?;
    format.parse(raw).map(Some).ok_or_else(|| {
        CliError::Command(format!(
            "invalid --since '{raw}': expected format '{}'",
            format.as_str()
        ))
    })
}

/// A transform report tagged with the source it came from.
#[derive(Serialize)]
pub struct Sourced<'a, T> {
    pub source: &'a str,
    #[serde(flatten)]
    pub report: T,
}

impl<'a, T> Sourced<'a, T> {
    fn new(source: &'a LogSourceConfig, report: T) -> Self {
        Self {
            source: &source.id,
            report,
        }
    }
}

impl Render for Sourced<'_, PathMatchReport> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.report;
        let verdict = if r.matched {
            "matched".green().bold()
        } else {
            "not matched".red().bold()
        };
        writeln!(w, "Source {}: {} {}", self.source.bold(), r.path, verdict)?;
        for check in &r.steps {
            let mark = if check.passed {
                "ok".green()
            } else {
                "FAIL".red()
            };
            writeln!(w, "  [{mark}] {:<16} {}", check.kind.label(), check.detail)?;
        }
        Ok(())
    }
}

impl Render for Sourced<'_, MultilineReport> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.report;
        writeln!(
            w,
            "Source {}: {} block(s), {} skipped line(s)",
            self.source.bold(),
            r.blocks.len(),
            r.skipped.len()
        )?;
        for (idx, block) in r.blocks.iter().enumerate() {
            writeln!(
                w,
                "  block #{} lines {}-{} (ended by {:?})",
                idx + 1,
                block.start_line,
                block.end_line,
                block.ended_by
            )?;
            for line in &block.lines {
                writeln!(w, "    | {line}")?;
            }
        }
        for line in &r.skipped {
            writeln!(w, "  skipped line {}: {}", line.line_number, line.text.dimmed())?;
        }
        render_notes(w, "Diagnostics:", &r.diagnostics)
    }
}

impl Render for Sourced<'_, ExtractReport> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.report;
        if r.matched {
            writeln!(
                w,
                "Source {}: path matched, inserting {:?}",
                self.source.bold(),
                r.inserted
            )?;
            let captures: Vec<String> = r
                .captures
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_empty())
                .map(|(idx, value)| format!("@{}={value}", idx + 1))
                .collect();
            if !captures.is_empty() {
                writeln!(w, "  captures: {}", captures.join(", "))?;
            }
        } else {
            writeln!(
                w,
                "Source {}: path {}, lines unchanged",
                self.source.bold(),
                "not matched".yellow()
            )?;
        }
        for line in &r.lines {
            writeln!(w, "  {line}")?;
        }
        render_notes(w, "Diagnostics:", &r.diagnostics)
    }
}

impl Render for Sourced<'_, WatermarkReport> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.report;
        writeln!(
            w,
            "Source {}: {} passed, {} skipped, {} without timestamp",
            self.source.bold(),
            r.passed,
            r.skipped,
            r.no_match
        )?;
        for line in &r.lines {
            let verdict = match line.verdict {
                WatermarkVerdict::Pass => "pass".green(),
                WatermarkVerdict::Skip => "skip".yellow(),
                WatermarkVerdict::NoMatch => "no-match".normal(),
            };
            writeln!(w, "  {:>4} {:<8} {}", line.line_number, verdict, line.text)?;
        }
        if let Some(watermark) = r.watermark {
            writeln!(w, "Watermark: {watermark}")?;
        }
        render_notes(w, "Diagnostics:", &r.diagnostics)
    }
}

impl Render for Sourced<'_, GroupReport> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let r = &self.report;
        writeln!(
            w,
            "Source {}: {} group(s), {} bypassed line(s)",
            self.source.bold(),
            r.groups.len(),
            r.bypassed.len()
        )?;
        for (idx, group) in r.groups.iter().enumerate() {
            writeln!(w, "  group #{}: {}", idx + 1, group.text)?;
        }
        for line in &r.bypassed {
            writeln!(w, "  bypassed line {}: {}", line.line_number, line.text)?;
        }
        if r.incomplete_group {
            writeln!(
                w,
                "  {} {} line(s) left in an incomplete group",
                "warning:".yellow(),
                r.buffered.len()
            )?;
        }
        render_notes(w, "Diagnostics:", &r.diagnostics)
    }
}
