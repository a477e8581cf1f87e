//! Rendering of pipeline results for humans and for plotting tools.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::evaluation::{PipelineReport, Selection};

/// Output format for summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width text table (default).
    #[default]
    Text,
    /// Markdown table.
    Markdown,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    report: &'a PipelineReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection: Option<&'a Selection>,
}

/// Write the per-episode table (and the selection, when given) in `format`.
pub fn write_summary<W: Write>(
    report: &PipelineReport,
    selection: Option<&Selection>,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(report, selection, &mut writer)?,
        OutputFormat::Markdown => write_markdown(report, selection, &mut writer)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &SummaryDocument { report, selection })?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn write_text<W: Write>(
    report: &PipelineReport,
    selection: Option<&Selection>,
    writer: &mut W,
) -> io::Result<()> {
    writeln!(
        writer,
        "{:>8} {:>14} {:>12} {:>12} {:>7} {:>9}",
        "EPISODE", "MEAN_REWARD", "REWARD_STD", "MEAN_|ACT|", "VALID", "MALFORMED"
    )?;
    writeln!(
        writer,
        "{:->8} {:->14} {:->12} {:->12} {:->7} {:->9}",
        "", "", "", "", "", ""
    )?;
    for s in &report.summaries {
        let marker = match selection {
            Some(sel) if sel.episode == s.episode => " *",
            _ => "",
        };
        writeln!(
            writer,
            "{:>8} {:>14.6} {:>12.6} {:>12.4} {:>7} {:>9}{}",
            s.episode,
            s.mean_reward,
            s.reward_std,
            s.mean_action_magnitude,
            s.valid_trajectories,
            s.malformed_trajectories,
            marker
        )?;
    }

    write_skipped(report, writer)?;
    if let Some(sel) = selection {
        writeln!(writer)?;
        writeln!(
            writer,
            "Selected episode {} (mean reward {:.6})",
            sel.episode, sel.mean_reward
        )?;
        writeln!(
            writer,
            "  checkpoint:    {}{}",
            sel.checkpoint.path.display(),
            missing_tag(sel.checkpoint.exists)
        )?;
        writeln!(
            writer,
            "  traced policy: {}{}",
            sel.traced_policy.path.display(),
            missing_tag(sel.traced_policy.exists)
        )?;
    }
    Ok(())
}

fn write_markdown<W: Write>(
    report: &PipelineReport,
    selection: Option<&Selection>,
    writer: &mut W,
) -> io::Result<()> {
    writeln!(
        writer,
        "| episode | mean_reward | reward_std | mean_abs_action | valid | malformed |"
    )?;
    writeln!(
        writer,
        "|---------|-------------|------------|-----------------|-------|-----------|"
    )?;
    for s in &report.summaries {
        let episode = match selection {
            Some(sel) if sel.episode == s.episode => format!("**{}**", s.episode),
            _ => s.episode.to_string(),
        };
        writeln!(
            writer,
            "| {} | {:.6} | {:.6} | {:.4} | {} | {} |",
            episode,
            s.mean_reward,
            s.reward_std,
            s.mean_action_magnitude,
            s.valid_trajectories,
            s.malformed_trajectories
        )?;
    }

    write_skipped(report, writer)?;
    if let Some(sel) = selection {
        writeln!(writer)?;
        writeln!(
            writer,
            "Selected episode **{}**: checkpoint `{}`, traced policy `{}`",
            sel.episode,
            sel.checkpoint.path.display(),
            sel.traced_policy.path.display()
        )?;
    }
    Ok(())
}

fn write_skipped<W: Write>(report: &PipelineReport, writer: &mut W) -> io::Result<()> {
    if !report.missing_files.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Missing observations: {}", join_indices(&report.missing_files))?;
    }
    if !report.unreadable_files.is_empty() {
        writeln!(writer, "Unreadable observations: {}", join_indices(&report.unreadable_files))?;
    }
    if !report.excluded.is_empty() {
        let excluded: Vec<u32> = report.excluded.iter().map(|e| e.episode).collect();
        writeln!(writer, "Excluded episodes: {}", join_indices(&excluded))?;
    }
    Ok(())
}

fn join_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn missing_tag(exists: bool) -> &'static str {
    if exists {
        ""
    } else {
        " (missing)"
    }
}

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
