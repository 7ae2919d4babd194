use console::style;
use roam_core::error::ToolError;
use roam_core::output::render_summary;
use roam_core::pipeline::{BatchOutcome, BatchStatus, PipelineRun, Roster};
use roam_core::trace::{TraceRecord, TraceStatus};
use std::path::Path;
use termimad::MadSkin;

pub fn print_run(run: &PipelineRun, saved_to: Option<&Path>, traces: &[TraceRecord]) {
    let skin = MadSkin::default();
    println!();
    skin.print_text(&render_summary(run));

    if let Some(last) = run.results.last() {
        println!(
            "  {} Final stage {}",
            style("→").green(),
            style(&last.stage).cyan().bold()
        );
        skin.print_text(&roam_core::output::render_markdown(&last.payload, 3));
    }

    if !traces.is_empty() {
        let failed = traces
            .iter()
            .filter(|t| t.status == TraceStatus::Error)
            .count();
        println!(
            "  {} {} trace records ({} failed)",
            style("•").dim(),
            traces.len(),
            failed
        );
    }

    if let Some(dir) = saved_to {
        println!(
            "  {} Results saved to {}",
            style("✓").green(),
            style(dir.display()).cyan()
        );
    }
    println!();
}

pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {:#}", style("✗").red().bold(), error);
}

pub fn print_health(results: &[(String, Result<(), ToolError>)]) {
    println!();
    for (name, result) in results {
        match result {
            Ok(()) => println!("  {} {}", style("✓").green(), style(name).white().bold()),
            Err(e) => println!(
                "  {} {} {}",
                style("✗").red(),
                style(name).white().bold(),
                style(e).dim()
            ),
        }
    }
    println!();
}

pub fn print_roster(roster: &Roster) {
    println!();
    for (index, stage) in roster.stages.iter().enumerate() {
        println!(
            "  {} {} {}",
            style(format!("{:02}", index + 1)).dim(),
            style(&stage.name).white().bold(),
            style(format!("({})", stage.agent.role)).dim()
        );
        if let Some(event) = &stage.event {
            let emits = stage.emits.as_deref().unwrap_or("-");
            println!("     on {} → {}", style(event).cyan(), style(emits).cyan());
        }
        if !stage.requires.is_empty() {
            println!("     requires {}", stage.requires.join(", "));
        }
        if !stage.agent.tools.is_empty() {
            println!("     tools {}", stage.agent.tools.join(", "));
        }
    }
    println!();
}

pub fn print_batch(outcomes: &[BatchOutcome]) {
    println!();
    for outcome in outcomes {
        match outcome.status {
            BatchStatus::Success => {
                let run_id = outcome.run.as_ref().map(|r| r.run_id.as_str()).unwrap_or("-");
                println!(
                    "  {} #{} {} {}",
                    style("✓").green(),
                    outcome.index,
                    style(&outcome.event_type).cyan(),
                    style(run_id).dim()
                );
            }
            BatchStatus::Error => println!(
                "  {} #{} {} {}",
                style("✗").red(),
                outcome.index,
                style(&outcome.event_type).cyan(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let ok = outcomes
        .iter()
        .filter(|o| o.status == BatchStatus::Success)
        .count();
    println!();
    println!("  {}/{} events succeeded", ok, outcomes.len());
    println!();
}
