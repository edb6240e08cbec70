use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::client::{CompletionClient, Nothing};
use rig::providers::{anthropic, groq, ollama, openai};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use socratic_config::{find_config_path, load_config, resolve_path, save_config, Config, ModelRef};
use socratic_core::agent::{role_table_from_pool, ModelEntry, ModelPool, Role};
use socratic_core::dialogue::{
    ContextBounder, DialogueLoop, DialogueSettings, TurnEvent, TutorSession,
};
use socratic_core::history::{HistoryStore, TranscriptStore};

/// Render markdown text to the terminal using termimad.
fn render_markdown(text: &str) {
    let skin = termimad::MadSkin::default();
    skin.print_text(text);
}

/// Save terminal attributes for later restoration.
#[cfg(unix)]
fn save_terminal_state() -> Option<nix::sys::termios::Termios> {
    nix::sys::termios::tcgetattr(std::io::stdin()).ok()
}

/// Restore previously saved terminal attributes.
#[cfg(unix)]
fn restore_terminal_state(saved: &nix::sys::termios::Termios) {
    let _ = nix::sys::termios::tcsetattr(
        std::io::stdin(),
        nix::sys::termios::SetArg::TCSADRAIN,
        saved,
    );
}

/// Flush any pending input from the terminal.
#[cfg(unix)]
fn flush_pending_input() {
    let _ = nix::sys::termios::tcflush(std::io::stdin(), nix::sys::termios::FlushArg::TCIFLUSH);
}

#[derive(Parser)]
#[command(name = "socratic", about = "Socratic tutoring dialogue", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tutoring conversation
    Chat {
        /// Single message mode (non-interactive)
        #[arg(short, long)]
        message: Option<String>,

        /// Neither load nor save the message history file
        #[arg(long)]
        no_history: bool,
    },
    /// Delete the saved message history
    Reset,
    /// Show configuration and history status
    Status,
    /// Write a starter configuration
    Init {
        /// Skip interactive prompts and write defaults
        #[arg(long)]
        non_interactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let base_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = format!("{base_filter},socratic_core=info");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { non_interactive } = cli.command {
        return run_init(cli.config, non_interactive);
    }

    let config_path = cli.config.unwrap_or_else(find_config_path);
    let config = load_config(&config_path)?;

    match cli.command {
        Commands::Reset => {
            let store = HistoryStore::new(resolve_path(&config.history.path));
            store.reset()?;
            println!("History cleared ({}).", store.path().display());
        }
        Commands::Status => run_status(&config_path, &config),
        Commands::Chat {
            message,
            no_history,
        } => {
            let history = (config.history.enabled && !no_history)
                .then(|| HistoryStore::new(resolve_path(&config.history.path)));
            let dialogue = build_dialogue(&config)?;
            let prior = history.as_ref().map(|h| h.load()).unwrap_or_default();
            let session = TutorSession::new(dialogue, prior);

            if let Some(msg) = message {
                run_single_message(session, history.as_ref(), &msg).await?;
            } else {
                run_interactive(session, history.as_ref()).await?;
            }
        }
        Commands::Init { .. } => unreachable!(),
    }

    Ok(())
}

/// Resolve an API key from config, falling back to an environment variable.
fn resolve_api_key(
    provider_cfg: &Option<socratic_config::ProviderConfig>,
    env_var: &str,
) -> Option<String> {
    provider_cfg
        .as_ref()
        .and_then(|c| c.api_key.clone())
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
}

fn api_base(provider_cfg: &Option<socratic_config::ProviderConfig>) -> Option<String> {
    provider_cfg
        .as_ref()
        .and_then(|c| c.api_base.clone())
        .filter(|b| !b.is_empty())
}

/// Create a completion model for a specific provider + model combination.
///
/// Errors clearly if provider is unknown or has no API key.
#[allow(deprecated)]
fn create_model_for(
    provider: &str,
    model_name: &str,
    config: &Config,
) -> Result<CompletionModelHandle<'static>> {
    if provider.is_empty() {
        anyhow::bail!("No provider configured.\nValid providers: ollama, openai, anthropic, groq");
    }

    if model_name.is_empty() {
        anyhow::bail!("No model configured for provider '{provider}'.");
    }

    match provider {
        "ollama" => {
            let mut builder = ollama::Client::builder().api_key(Nothing);
            if let Some(ref base) = api_base(&config.providers.ollama) {
                builder = builder.base_url(base);
            }
            let client: ollama::Client = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Ollama client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Ollama provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "openai" => {
            let key =
                resolve_api_key(&config.providers.openai, "OPENAI_API_KEY").ok_or_else(|| {
                    anyhow::anyhow!(
                        "OpenAI provider selected but no API key found. \
                     Set providers.openai.apiKey in config.json or OPENAI_API_KEY env var."
                    )
                })?;
            let mut builder = openai::CompletionsClient::builder().api_key(&key);
            if let Some(ref base) = api_base(&config.providers.openai) {
                builder = builder.base_url(base);
                tracing::info!("Using OpenAI provider with custom base: {base}");
            }
            let client: openai::CompletionsClient = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create OpenAI client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using OpenAI provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "anthropic" => {
            let key = resolve_api_key(&config.providers.anthropic, "ANTHROPIC_API_KEY")
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Anthropic provider selected but no API key found. \
                     Set providers.anthropic.apiKey in config.json or ANTHROPIC_API_KEY env var."
                    )
                })?;
            let client: anthropic::Client = anthropic::Client::builder()
                .api_key(&key)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Anthropic client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Anthropic provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "groq" => {
            let key = resolve_api_key(&config.providers.groq, "GROQ_API_KEY").ok_or_else(|| {
                anyhow::anyhow!(
                    "Groq provider selected but no API key found. \
                     Set providers.groq.apiKey in config.json or GROQ_API_KEY env var."
                )
            })?;
            let client: groq::Client = groq::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create Groq client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Groq provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        other => {
            anyhow::bail!("Unknown provider '{other}'. Valid providers: ollama, openai, anthropic, groq");
        }
    }
}

/// Build a ModelPool from `agents.models`.
///
/// A single "default" entry means every role shares one model; entries
/// keyed by role name ("arbiter", "elenchus", ...) give that role its own.
fn create_model_pool(config: &Config) -> Result<ModelPool> {
    if !config.agents.models.contains_key("default") {
        anyhow::bail!(
            "No models configured. Set agents.models in config.json with at least a \"default\" entry \
             (or run `socratic init`).\n\
             Example:\n  \
             \"models\": {{ \"default\": {{ \"provider\": \"ollama\", \"model\": \"llama3\" }} }}"
        );
    }

    let mut models = HashMap::new();
    for (key, model_ref) in &config.agents.models {
        if key != "default" && Role::from_name(key).is_none() {
            tracing::warn!("Ignoring agents.models entry '{key}': not a role name");
            continue;
        }
        let handle = create_model_for(&model_ref.provider, &model_ref.model, config)
            .with_context(|| format!("Failed to create model for '{key}'"))?;
        tracing::info!("Model '{key}': {} / {}", model_ref.provider, model_ref.model);
        models.insert(
            key.clone(),
            ModelEntry {
                handle,
                name: model_ref.model.clone(),
                temperature: model_ref.temperature.map(f64::from),
            },
        );
    }

    ModelPool::new(models)
}

/// Prompt overrides from `prompts`, keyed by any role name.
fn prompt_overrides(config: &Config) -> Vec<(Role, String)> {
    config
        .prompts
        .iter()
        .filter_map(|(key, prompt)| match Role::from_name(key) {
            Some(role) => Some((role, prompt.clone())),
            None => {
                tracing::warn!("Ignoring prompt override '{key}': not a role name");
                None
            }
        })
        .collect()
}

fn build_dialogue(config: &Config) -> Result<DialogueLoop> {
    let pool = create_model_pool(config)?;
    if pool.is_shared() {
        tracing::debug!("All roles share the default model");
    }
    let roles = role_table_from_pool(
        &pool,
        u64::from(config.agents.defaults.max_tokens),
        config.agents.defaults.temperature.map(f64::from),
        prompt_overrides(config),
    )?;
    let bounder = ContextBounder::for_estimate(config.dialogue.size_estimate);
    Ok(DialogueLoop::new(roles, DialogueSettings::from(&config.dialogue)).with_bounder(bounder))
}

fn print_events(events: &[TurnEvent]) {
    for event in events {
        match event {
            TurnEvent::RoleOutput { role, text } => {
                println!();
                println!("[{}]:", Role::from(*role).domain_name().to_uppercase());
                render_markdown(text);
            }
            TurnEvent::ScoreUpdate { score, feedback } => {
                println!();
                println!("--- Current Mastery Score: {score:.2} ---");
                if let Some(feedback) = feedback {
                    tracing::debug!("Evaluator feedback: {feedback}");
                }
            }
            TurnEvent::LoopBack { step_count } => {
                tracing::debug!("Looping back to the arbiter after {step_count} steps");
            }
            TurnEvent::Diagnostic { kind, note } => {
                tracing::warn!("{kind}: {note}");
            }
            TurnEvent::SessionDone {
                final_score,
                reason,
            } => {
                println!();
                println!("Session complete: {reason} (final score {final_score:.2})");
            }
        }
    }
    println!();
}

fn save_history(history: Option<&HistoryStore>, session: &TutorSession) {
    if let Some(store) = history {
        if let Err(e) = store.save(session.transcript()) {
            tracing::warn!("Failed to save history: {e:#}");
        }
    }
}

async fn run_single_message(
    mut session: TutorSession,
    history: Option<&HistoryStore>,
    message: &str,
) -> Result<()> {
    let events = session.submit(message).await;
    print_events(&events);
    save_history(history, &session);
    Ok(())
}

async fn run_interactive(mut session: TutorSession, history: Option<&HistoryStore>) -> Result<()> {
    // Save terminal state for restoration on exit
    #[cfg(unix)]
    let saved_term = save_terminal_state();

    let history_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".socratic");
    std::fs::create_dir_all(&history_dir)?;
    let history_path = history_dir.join("cli_history");

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    println!("socratic tutor (type /help for commands, Ctrl-D to quit)");
    if !session.transcript().is_empty() {
        println!("Resuming with {} earlier messages.", session.transcript().len());
    }
    println!();

    let result = loop {
        // Flush any pending input before reading
        #[cfg(unix)]
        flush_pending_input();

        let readline = rl.readline("you> ");
        match readline {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(input);

                if matches!(input, "exit" | "quit" | "/exit" | "/quit" | ":q") {
                    break Ok(());
                }

                match input {
                    "/help" => {
                        println!("Commands:");
                        println!("  /reset - Forget the conversation and delete saved history");
                        println!("  /score - Show the current mastery score");
                        println!("  /help  - Show this help");
                        println!("  /quit  - Exit");
                        println!();
                        continue;
                    }
                    "/reset" => {
                        session.reset();
                        if let Some(store) = history {
                            if let Err(e) = store.reset() {
                                eprintln!("Could not delete history: {e:#}");
                            }
                        }
                        println!("Conversation reset.");
                        println!();
                        continue;
                    }
                    "/score" => {
                        println!(
                            "--- Current Mastery Score: {:.2} --- (threshold {:.2})",
                            session.mastery_score(),
                            session.settings().mastery_threshold
                        );
                        println!();
                        continue;
                    }
                    _ => {}
                }

                let events = session.submit(input).await;
                print_events(&events);
                save_history(history, &session);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break Ok(());
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break Ok(());
            }
        }
    };

    let _ = rl.save_history(&history_path);

    // Restore terminal state on exit
    #[cfg(unix)]
    if let Some(ref saved) = saved_term {
        restore_terminal_state(saved);
    }

    result
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    use std::io::{self, Write};
    print!("{prompt} [{default}]: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn prompt_yes_no(prompt: &str, default_yes: bool) -> Result<bool> {
    use std::io::{self, Write};
    let default = if default_yes { "Y/n" } else { "y/N" };
    print!("{prompt} ({default}): ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    if answer.is_empty() {
        return Ok(default_yes);
    }
    let lower = answer.to_lowercase();
    Ok(matches!(lower.as_str(), "y" | "yes"))
}

/// Write a starter config with a single shared model.
fn run_init(config_arg: Option<PathBuf>, non_interactive: bool) -> Result<()> {
    let config_path = match config_arg {
        Some(path) => path,
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".socratic")
            .join("config.json"),
    };

    if config_path.exists()
        && (non_interactive
            || !prompt_yes_no(
                &format!("{} exists. Overwrite?", config_path.display()),
                false,
            )?)
    {
        println!("Keeping existing config at {}", config_path.display());
        return Ok(());
    }

    let (provider, model) = if non_interactive {
        ("ollama".to_string(), "llama3".to_string())
    } else {
        (
            prompt_with_default("Provider (ollama, openai, anthropic, groq)", "ollama")?,
            prompt_with_default("Model", "llama3")?,
        )
    };

    let mut config = Config::default();
    config.agents.models.insert(
        "default".into(),
        ModelRef {
            provider,
            model,
            temperature: None,
        },
    );
    save_config(&config_path, &config)?;

    println!("Wrote {}", config_path.display());
    println!("Run `socratic chat` to start.");
    Ok(())
}

fn run_status(config_path: &Path, config: &Config) {
    println!("socratic status");
    println!();

    if config_path.exists() {
        println!("  Config:    {} (found)", config_path.display());
    } else {
        println!(
            "  Config:    {} (not found, run `socratic init`)",
            config_path.display()
        );
    }

    let mut keys: Vec<&String> = config.agents.models.keys().collect();
    keys.sort();
    if keys.is_empty() {
        println!("  Models:    (not set)");
    }
    for key in keys {
        let m = &config.agents.models[key];
        println!("  Model:     {key} = {} / {}", m.provider, m.model);
    }

    let d = &config.dialogue;
    println!();
    println!("  Dialogue:");
    println!("    Mastery threshold: {:.2}", d.mastery_threshold);
    println!("    Context budget:    {} ({:?})", d.context_budget, d.size_estimate);
    println!("    Max steps:         {}", d.max_steps);
    println!("    Default role:      {:?}", d.default_content_role);
    println!("    Persist counters:  {}", d.persist_across_turns);
    println!("    Yield on loop:     {}", d.yield_on_loop);

    println!();
    if config.history.enabled {
        let store = HistoryStore::new(resolve_path(&config.history.path));
        println!(
            "  History:   {} ({} messages)",
            store.path().display(),
            store.load().len()
        );
    } else {
        println!("  History:   disabled");
    }
}
