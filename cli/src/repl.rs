//! Interactive prompt over the pipeline with persistent history.

use crate::app::App;
use crate::render;
use anyhow::Result;
use console::style;
use roam_core::config::get_roam_dir;
use roam_core::pipeline::{PipelineInput, PipelineRun};
use rustyline::error::ReadlineError;
use std::path::PathBuf;

const HELP: &str = "
Commands:
  pipeline <content> <location> <date> [emails...]      Run every stage in order
  event <type> <content> <location> <date> [emails...]  Dispatch an event
  stage <name> <content> <location> <date> [emails...]  Run a single stage
  stages                                                List the stages
  health                                                Probe every tool service
  status                                                Show configuration
  help                                                  Show this message
  exit                                                  Leave

Quote arguments that contain spaces:
  pipeline https://youtube.com/watch?v=abc123 \"San Francisco, CA\" 2024-01-15 a@example.com
";

pub struct Repl<'a> {
    app: &'a App,
    editor: rustyline::DefaultEditor,
    history_path: PathBuf,
}

impl<'a> Repl<'a> {
    pub fn new(app: &'a App) -> Result<Self> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let history_path = get_roam_dir().join("history");
        let _ = editor.load_history(&history_path);
        Ok(Self {
            app,
            editor,
            history_path,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{}", style("roam").cyan().bold());
        println!("Type 'help' for commands, Ctrl+D to exit.");

        loop {
            match self.editor.readline("roam> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(&line);
                    if !self.handle(&line).await {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        self.save_history();
        println!("Goodbye!");
        Ok(())
    }

    /// Returns false when the session should end.
    async fn handle(&self, line: &str) -> bool {
        let words = split_words(line);
        let Some((command, args)) = words.split_first() else {
            return true;
        };

        let outcome = match command.to_lowercase().as_str() {
            "exit" | "quit" => return false,
            "help" => {
                println!("{HELP}");
                Ok(())
            }
            "stages" => {
                render::print_roster(&self.app.roster);
                Ok(())
            }
            "health" => {
                render::print_health(&self.app.services.check_all().await);
                Ok(())
            }
            "status" => {
                self.print_status();
                Ok(())
            }
            "pipeline" => match parse_input(args) {
                Ok(input) => self.finish(self.app.run_pipeline(&input).await),
                Err(e) => Err(e),
            },
            "event" | "stage" if args.is_empty() => {
                Err(anyhow::anyhow!("Usage: {command} <name> <content> <location> <date>"))
            }
            "event" => match parse_input(&args[1..]) {
                Ok(input) => self.finish(self.app.dispatch(&args[0], &input).await),
                Err(e) => Err(e),
            },
            "stage" => match parse_input(&args[1..]) {
                Ok(input) => self.finish(self.app.run_stage(&args[0], &input, None).await),
                Err(e) => Err(e),
            },
            other => Err(anyhow::anyhow!(
                "Unknown command '{other}'. Type 'help' for commands."
            )),
        };

        if let Err(e) = outcome {
            render::print_error(&e);
        }
        true
    }

    fn finish(&self, run: Result<PipelineRun>) -> Result<()> {
        let run = run?;
        let saved = self.app.save(&run)?;
        render::print_run(&run, Some(&saved), &self.app.traces_for(&run.run_id));
        Ok(())
    }

    fn print_status(&self) {
        let config = &self.app.config;
        println!();
        println!("  Provider  {} ({})", config.provider, config.model);
        println!(
            "  Tracing   {}",
            if self.app.tracing_enabled() { "enabled" } else { "disabled" }
        );
        println!("  Stages    {}", self.app.roster.names().join(", "));
        println!("  Events    {}", self.app.events.events().join(", "));
        println!("  Services  {}", self.app.services.names().collect::<Vec<_>>().join(", "));
        println!("  Results   {}", config.results_dir.display());
        println!();
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&self.history_path);
    }
}

fn parse_input(args: &[String]) -> Result<PipelineInput> {
    let [content, location, date, participants @ ..] = args else {
        anyhow::bail!("Expected <content> <location> <date> [emails...]");
    };
    Ok(PipelineInput::parse(content, location, date)?.with_participants(participants))
}

/// Splits on whitespace, keeping double-quoted runs together.
fn split_words(line: &str) -> Vec<String> {
    let mut words = vec![];
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
