use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use roam_core::config;
use roam_core::mcp::McpServices;
use roam_core::pipeline::{PipelineInput, Roster};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod app;
mod onboard;
mod render;
mod repl;

use app::App;

#[derive(Parser)]
#[command(name = "roam")]
#[command(about = "roam - turn a video into a researched, routed and scheduled day out", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.roam/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable trace recording
    #[arg(long, global = true)]
    no_trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct InputArgs {
    /// Video URL or id the day is built around
    #[arg(short, long)]
    content: String,

    #[arg(short, long)]
    location: String,

    /// Date of the day out, YYYY-MM-DD
    #[arg(short, long)]
    date: String,

    /// Participant emails, comma separated
    #[arg(short, long, value_delimiter = ',')]
    participants: Vec<String>,
}

impl InputArgs {
    fn into_input(self) -> Result<PipelineInput> {
        Ok(PipelineInput::parse(self.content, self.location, &self.date)?
            .with_participants(self.participants))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup of ~/.roam/config.toml
    Init,
    /// Run the pipeline, or a single stage with --stage
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        stage: Option<String>,

        /// Earlier run.json providing the upstream result for --stage
        #[arg(long, requires = "stage")]
        from: Option<PathBuf>,
    },
    /// Dispatch one event through the event-driven flow
    Event {
        event_type: String,

        #[command(flatten)]
        input: InputArgs,
    },
    /// Process a JSON file of events
    Batch {
        file: PathBuf,

        /// Write the outcomes as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Probe every tool service
    Health,
    /// List the configured stages
    Stages,
    /// Interactive prompt
    Repl,
}

/// Writes the onboarding result to `explicit` when given, else to the
/// default location, and returns the path written.
fn save_initial_config(config: &config::Config, explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            config::save_config_to(config, path)?;
            Ok(path.to_path_buf())
        }
        None => {
            config::save_config(config)?;
            Ok(config::get_config_path())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roam=info,roam_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let command = cli.command.unwrap_or_else(|| {
        if cli.config.is_none() && !config::config_exists() {
            Commands::Init
        } else {
            Commands::Repl
        }
    });

    let build = || App::build(cli.config.as_deref(), !cli.no_trace);

    match command {
        Commands::Init => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                render::print_error(&e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            let path = save_initial_config(&onboard_config, cli.config.as_deref())?;
            println!(
                "  {} Config saved to {}",
                console::style("→").green(),
                console::style(path.display()).cyan()
            );
        }
        Commands::Run { input, stage, from } => {
            let app = build()?;
            let input = input.into_input()?;
            let run = match stage {
                Some(stage) => app.run_stage(&stage, &input, from.as_deref()).await?,
                None => app.run_pipeline(&input).await?,
            };
            let saved = app.save(&run)?;
            render::print_run(&run, Some(&saved), &app.traces_for(&run.run_id));
        }
        Commands::Event { event_type, input } => {
            let app = build()?;
            let input = input.into_input()?;
            let run = app.dispatch(&event_type, &input).await?;
            let saved = app.save(&run)?;
            render::print_run(&run, Some(&saved), &app.traces_for(&run.run_id));
        }
        Commands::Batch { file, output } => {
            let app = build()?;
            let events = app::load_batch(&file)?;
            let outcomes = app.process_batch(&events).await;
            for run in outcomes.iter().filter_map(|o| o.run.as_ref()) {
                app.save(run)?;
            }
            render::print_batch(&outcomes);
            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&outcomes)?)?;
            }
        }
        Commands::Health => {
            let config = config::Config::load(cli.config.as_deref())?;
            let results = McpServices::from_config(&config).check_all().await;
            render::print_health(&results);
            let down = results.iter().filter(|(_, r)| r.is_err()).count();
            if down > 0 {
                anyhow::bail!("{down} service(s) unhealthy");
            }
        }
        Commands::Stages => {
            let config = config::Config::load(cli.config.as_deref())?;
            render::print_roster(&Roster::load_or_default(config.roster.as_deref())?);
        }
        Commands::Repl => {
            let app = build()?;
            repl::Repl::new(&app)?.run().await?;
        }
    }

    Ok(())
}
