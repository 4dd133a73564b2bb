mod client;
mod config;
mod controller;
mod conversation;
mod editor;
mod error;
mod logging;
mod picker;
mod session;
mod tui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use config::{ConfigFile, Overrides, ResolvedConfig};

use crate::client::ChatClient;
use crate::controller::Controller;
use crate::conversation::Conversation;

#[derive(Parser, Debug)]
#[command(
    name = "codesplice",
    about = "Terminal editor that splices language-model edits into your code",
    long_about = None,
)]
struct Args {
    /// File to edit (created on first save if it does not exist)
    #[arg(default_value = "example.py")]
    file: PathBuf,

    /// Profile to use from config file
    #[arg(short, long, env = "CODESPLICE_PROFILE")]
    profile: Option<String>,

    /// Override endpoint URL
    #[arg(long, env = "CODESPLICE_ENDPOINT")]
    endpoint: Option<String>,

    /// Override model name
    #[arg(short, long, env = "CODESPLICE_MODEL")]
    model: Option<String>,

    /// Override API key (falls back to OPENAI_API_KEY)
    #[arg(long, env = "CODESPLICE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Session history file
    #[arg(long, value_name = "PATH")]
    session: Option<PathBuf>,

    /// Instructions file used to seed a new session
    #[arg(long, value_name = "PATH")]
    instructions: Option<PathBuf>,

    /// Write a default config and instructions file to ~/.config/codesplice and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,

    /// Send one prompt without the editor and print the reply
    #[arg(long, value_name = "PROMPT")]
    ask: Option<String>,

    /// File whose content goes in front of the --ask prompt
    #[arg(long, value_name = "FILE", requires = "ask")]
    context: Option<PathBuf>,

    /// Also write the --ask reply to this file
    #[arg(long, value_name = "FILE", requires = "ask")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let (config, instructions) = ConfigFile::write_default_if_missing()?;
        println!("Config written to:       {}", config.display());
        println!("Instructions written to: {}", instructions.display());
        println!("Edit them, then run: codesplice");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let _log_guard = logging::init(&config::data_dir())?;

    let mut resolved = ResolvedConfig::resolve(
        &file,
        &Overrides {
            profile: args.profile.as_deref(),
            endpoint: args.endpoint.as_deref(),
            model: args.model.as_deref(),
            api_key: args.api_key.as_deref(),
            instructions: args.instructions.as_deref(),
            session: args.session.as_deref(),
        },
    );
    if resolved.api_key.is_none() {
        resolved.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    }
    tracing::info!(
        profile = %resolved.profile_name,
        endpoint = %resolved.endpoint,
        model = %resolved.model,
        "starting"
    );

    let conversation = open_conversation(&resolved)?;
    tracing::info!(
        session = %conversation.session_path().display(),
        turns = conversation.log().len(),
        "session ready"
    );

    // ── Headless mode (plain stdout, no TUI) ──────────────────────────────────
    if let Some(prompt) = &args.ask {
        return run_ask(conversation, prompt, args.context, args.output).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    let controller = Controller::open(&args.file, conversation, resolved.prompt_template.clone())?;
    tui::run(controller, resolved).await
}

fn open_conversation(resolved: &ResolvedConfig) -> Result<Conversation<ChatClient>> {
    let client = ChatClient::from_config(resolved)?;
    Conversation::initialize(&resolved.instructions, &resolved.session, client).with_context(|| {
        format!(
            "Could not start a session (instructions {}, session {}). Run `codesplice --init` for a starter instructions file.",
            resolved.instructions.display(),
            resolved.session.display()
        )
    })
}

// ── Headless ask ──────────────────────────────────────────────────────────────

async fn run_ask(
    mut conversation: Conversation<ChatClient>,
    prompt: &str,
    context: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = &context {
        conversation.load_file_context(path)?;
    }
    conversation.ask(prompt).await?;
    println!("{}", conversation.last_response());

    if let Some(path) = &output {
        conversation.write_last_response(path)?;
        eprintln!("  wrote {}", path.display());
    }
    Ok(())
}

// ── Profiles listing ──────────────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<_> = file.profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    if entries.is_empty() {
        println!();
        println!("  No profiles configured. Run `codesplice --init` to write a starter config.");
        return;
    }
    println!();
    println!("  Profiles");
    for (name, p) in entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint  {}", p.endpoint);
        println!("    model     {}", p.model);
        println!("    session   {}", p.session);
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => anyhow::bail!("Unknown shell: {shell_name} (supported: bash, zsh, fish, elvish)"),
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "codesplice", &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        Args::command().debug_assert();
        let args = Args::parse_from(["codesplice"]);
        assert_eq!(args.file, PathBuf::from("example.py"));
        assert!(args.ask.is_none());
    }

    #[test]
    fn test_context_requires_ask() {
        assert!(Args::try_parse_from(["codesplice", "--context", "a.py"]).is_err());
        let args = Args::try_parse_from(["codesplice", "--ask", "hi", "--context", "a.py"]).unwrap();
        assert_eq!(args.context, Some(PathBuf::from("a.py")));
    }
}
