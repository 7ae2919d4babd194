use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use roam_core::config::{Config, KNOWN_PROVIDERS};

const BANNER: &str = r"
    -------------------------------------

     ____   ___    _    __  __
    |  _ \ / _ \  / \  |  \/  |
    | |_) | | | |/ _ \ | |\/| |
    |  _ <| |_| / ___ \| |  | |
    |_| \_\\___/_/   \_\_|  |_|

    -------------------------------------
";

const TOTAL_STEPS: usize = 4;

fn print_step(step: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, TOTAL_STEPS, title))
            .cyan()
            .bold()
    );
    println!();
}

fn models_for(provider: &str) -> &'static [&'static str] {
    match provider {
        "openai" => &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"],
        "ollama" => &["llama3.1", "qwen2.5", "mistral"],
        _ => &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"],
    }
}

fn setup_provider() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your model provider")
        .items(KNOWN_PROVIDERS)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(KNOWN_PROVIDERS[selection].to_string())
}

fn setup_api_key(provider: &str) -> Result<String> {
    if provider == "ollama" {
        return Ok(String::new());
    }

    let api_key: String = Input::new()
        .with_prompt(format!(
            "Enter your {provider} API key (leave empty to read it from the environment)"
        ))
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")?;

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: &str) -> Result<String> {
    let models = models_for(provider);

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

fn setup_services(config: &mut Config) -> Result<()> {
    let customize = Confirm::new()
        .with_prompt("Customize tool service URLs?")
        .default(false)
        .interact()
        .context("Failed to read answer")?;

    if !customize {
        for (name, service) in &config.services {
            println!("  {} {} {}", style("•").dim(), name, style(&service.base_url).dim());
        }
        return Ok(());
    }

    for (name, service) in config.services.iter_mut() {
        let url: String = Input::new()
            .with_prompt(format!("{name} service URL"))
            .default(service.base_url.clone())
            .interact_text()
            .with_context(|| format!("Failed to read URL for {name}"))?;
        service.base_url = url.trim().to_string();
    }

    Ok(())
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to roam!").white().bold());
    println!(
        "  {}",
        style("This wizard sets up the model provider and the tool services.").dim()
    );
    println!();

    print_step(1, "Provider");
    let provider = setup_provider()?;

    print_step(2, "API Key");
    let api_key = setup_api_key(&provider)?;

    print_step(3, "Model Selection");
    let model = setup_model(&provider)?;

    let mut config = Config {
        provider,
        api_key,
        model,
        ..Default::default()
    };

    print_step(4, "Tool Services");
    setup_services(&mut config)?;

    config
        .validate()
        .context("The entered configuration is not valid")?;

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!();
    println!(
        "  {} Check your services with: {}",
        style("→").green(),
        style("roam health").cyan().bold()
    );
    println!(
        "  {} Then run: {}",
        style("→").green(),
        style("roam run --content <url> --location <place> --date YYYY-MM-DD")
            .cyan()
            .bold()
    );
    println!();

    Ok(config)
}
