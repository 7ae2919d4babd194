//! Writes run artifacts: `run.json`, one markdown file per stage and a
//! `summary.md`, all under `<results_dir>/<run_id>/`.

use crate::pipeline::{PipelineRun, StageResult};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RUN_FILE: &str = "run.json";
pub const SUMMARY_FILE: &str = "summary.md";

pub struct ArtifactWriter {
    results_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(results_dir: impl AsRef<Path>) -> Self {
        Self {
            results_dir: results_dir.as_ref().to_path_buf(),
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.results_dir.join(run_id)
    }

    /// Writes every artifact of `run` and returns the run directory.
    pub fn write(&self, run: &PipelineRun) -> Result<PathBuf> {
        let dir = self.run_dir(&run.run_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;

        let json = serde_json::to_string_pretty(run).context("Failed to serialize run")?;
        write_file(&dir.join(RUN_FILE), &json)?;

        for (index, result) in run.results.iter().enumerate() {
            write_file(&dir.join(stage_file_name(index, &result.stage)), &render_stage(result))?;
        }

        write_file(&dir.join(SUMMARY_FILE), &render_summary(run))?;

        info!(run_id = %run.run_id, dir = %dir.display(), "artifacts written");
        Ok(dir)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn stage_file_name(index: usize, stage: &str) -> String {
    format!("{:02}_{}.md", index + 1, stage)
}

pub fn render_stage(result: &StageResult) -> String {
    let mut out = format!("# {}\n\n", title_case(&result.stage));
    let _ = writeln!(out, "_Completed in {} ms_\n", result.duration_ms);
    out.push_str(&render_markdown(&result.payload, 2));
    out
}

pub fn render_summary(run: &PipelineRun) -> String {
    let mut out = String::from("# Run Summary\n\n");
    let _ = writeln!(out, "- **Run**: {}", run.run_id);
    let _ = writeln!(out, "- **Content**: {}", run.input.content_ref);
    let _ = writeln!(out, "- **Location**: {}", run.input.location);
    let _ = writeln!(out, "- **Date**: {}", run.input.date_string());
    if !run.input.participants.is_empty() {
        let _ = writeln!(out, "- **Participants**: {}", run.input.participants.join(", "));
    }
    let _ = writeln!(out, "- **Duration**: {} ms\n", run.duration_ms());

    out.push_str("| # | Stage | Status | Duration (ms) | Keys |\n");
    out.push_str("|---|-------|--------|---------------|------|\n");
    for (index, result) in run.results.iter().enumerate() {
        let keys = result
            .payload
            .as_object()
            .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            index + 1,
            result.stage,
            if result.success { "ok" } else { "failed" },
            result.duration_ms,
            keys
        );
    }

    out
}

/// Renders a JSON value as nested markdown, headings starting at `level`.
pub fn render_markdown(value: &Value, level: usize) -> String {
    let mut out = String::new();
    render_into(&mut out, value, level, 0);
    out
}

fn render_into(out: &mut String, value: &Value, level: usize, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                match item {
                    Value::Object(_) if level <= 4 => {
                        let _ = writeln!(out, "{} {}\n", "#".repeat(level), title_case(key));
                        render_into(out, item, level + 1, 0);
                        out.push('\n');
                    }
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{pad}- **{}**:", title_case(key));
                        render_into(out, item, level + 1, indent + 1);
                    }
                    scalar => {
                        let _ = writeln!(out, "{pad}- **{}**: {}", title_case(key), scalar_text(scalar));
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        let _ = writeln!(out, "{pad}-");
                        render_into(out, item, level, indent + 1);
                    }
                    scalar => {
                        let _ = writeln!(out, "{pad}- {}", scalar_text(scalar));
                    }
                }
            }
        }
        scalar => {
            let _ = writeln!(out, "{pad}{}", scalar_text(scalar));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn title_case(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineInput;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn run() -> PipelineRun {
        PipelineRun {
            run_id: "2024-01-15-0a1b2c3d".to_string(),
            input: PipelineInput::parse("abc123", "Seattle, WA", "2024-01-15")
                .unwrap()
                .with_participants(["a@example.com"]),
            results: vec![
                StageResult::new("analyze_content", json!({"topics": ["coffee"]}), 12),
                StageResult::new(
                    "plan_route",
                    json!({"route": {"legs": [{"from": "A", "to": "B"}], "total": "3 mi"}}),
                    40,
                ),
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn writes_all_artifacts() {
        let tmp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(tmp.path());

        let dir = writer.write(&run()).unwrap();

        assert_eq!(dir, tmp.path().join("2024-01-15-0a1b2c3d"));
        assert!(dir.join("01_analyze_content.md").exists());
        assert!(dir.join("02_plan_route.md").exists());

        let saved: PipelineRun =
            serde_json::from_str(&std::fs::read_to_string(dir.join(RUN_FILE)).unwrap()).unwrap();
        assert_eq!(saved.results.len(), 2);

        let summary = std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("Seattle, WA"));
        assert!(summary.contains("| 2 | plan_route | ok | 40 | route |"));
    }

    #[test]
    fn renders_nested_payload() {
        let markdown = render_markdown(
            &json!({"venue_name": "Kerry Park", "route": {"total": "3 mi"}, "tags": ["view", "sunset"]}),
            2,
        );

        assert!(markdown.contains("- **Venue Name**: Kerry Park"));
        assert!(markdown.contains("## Route"));
        assert!(markdown.contains("- **Total**: 3 mi"));
        assert!(markdown.contains("  - sunset"));
    }

    #[test]
    fn stage_file_names_are_numbered() {
        assert_eq!(stage_file_name(0, "analyze_content"), "01_analyze_content.md");
        assert_eq!(stage_file_name(9, "x"), "10_x.md");
    }
}
