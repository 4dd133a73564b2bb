use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::controller::DEFAULT_PROMPT_TEMPLATE;

// ── Profile ───────────────────────────────────────────────────────────────────

/// One model persona: which model to talk to, what it is told, and where its
/// conversation is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// OpenAI-compatible base URL, including the version segment
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Optional API key (sent as Bearer token)
    pub api_key: Option<String>,
    /// Optional sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Plain-text file seeding the system turn of a new session
    #[serde(default = "default_instructions")]
    pub instructions: String,
    /// JSON session log, resumed on startup when present
    #[serde(default = "default_session")]
    pub session: String,
    /// Prompt sent for an edit; `{code}` and `{prompt}` are filled in
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_instructions() -> String {
    config_dir().join("instructions.txt").display().to_string()
}

fn default_session() -> String {
    "history.json".to_string()
}

fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            api_key: None,
            temperature: None,
            timeout_secs: default_timeout_secs(),
            instructions: default_instructions(),
            session: default_session(),
            prompt_template: default_prompt_template(),
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "code".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: HashMap::new(),
        }
    }
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write the starter config and instructions files (only those missing).
    /// Returns the paths written or already present.
    pub fn write_default_if_missing() -> Result<(PathBuf, PathBuf)> {
        let dir = config_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let config = config_path();
        if !config.exists() {
            fs::write(&config, DEFAULT_CONFIG_TOML)?;
        }
        let instructions = dir.join("instructions.txt");
        if !instructions.exists() {
            fs::write(&instructions, DEFAULT_INSTRUCTIONS)?;
        }
        Ok((config, instructions))
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub instructions: PathBuf,
    pub session: PathBuf,
    pub prompt_template: String,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

/// Per-invocation overrides collected from the command line and environment.
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub profile: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub model: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub instructions: Option<&'a Path>,
    pub session: Option<&'a Path>,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(file: &ConfigFile, overrides: &Overrides<'_>) -> Self {
        let profile_name = overrides
            .profile
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(overrides.profile)
            .cloned()
            .unwrap_or_default();

        Self {
            endpoint: overrides
                .endpoint
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            model: overrides.model.map(str::to_string).unwrap_or(base.model),
            api_key: overrides.api_key.map(str::to_string).or(base.api_key),
            temperature: base.temperature,
            timeout_secs: base.timeout_secs,
            instructions: overrides
                .instructions
                .map(Path::to_path_buf)
                .unwrap_or_else(|| expand_tilde(&base.instructions)),
            session: overrides
                .session
                .map(Path::to_path_buf)
                .unwrap_or_else(|| expand_tilde(&base.session)),
            prompt_template: base.prompt_template,
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codesplice")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Where the log file goes: `$XDG_DATA_HOME/codesplice` or `~/.local/share/codesplice`.
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(".local/share")
        })
        .join("codesplice")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS, %APPDATA% on Windows
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .or_else(|| std::env::var("APPDATA").ok().map(PathBuf::from))
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(rest),
            Err(_) => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

// ── Default files written by --init ───────────────────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# codesplice configuration
# Run `codesplice --init` to regenerate this file.

default_profile = "code"

# ── Code generator (default) ─────────────────────────────────────────────────
# Edits selections and generates code into the open file.
[profiles.code]
endpoint     = "https://api.openai.com/v1"
model        = "gpt-4.1"
instructions = "~/.config/codesplice/instructions.txt"
session      = "history.json"
# api_key    = "sk-..."            # or set CODESPLICE_API_KEY / OPENAI_API_KEY
# temperature = 0.2
# timeout_secs = 120
# prompt_template = "here is the code: {code}, and here is the user prompt: {prompt}"

# ── Instruction generator ────────────────────────────────────────────────────
# Same editor, different persona: drafts instruction files for other profiles.
# Keeps its own conversation so the two histories never mix.
# [profiles.instructions]
# endpoint     = "https://api.openai.com/v1"
# model        = "gpt-4.1-nano"
# instructions = "instructions/generator.txt"
# session      = "instructions_history.json"

# ── Local Ollama ─────────────────────────────────────────────────────────────
# [profiles.local]
# endpoint     = "http://localhost:11434/v1"
# model        = "gemma3"
# instructions = "~/.config/codesplice/instructions.txt"
# session      = "history.json"
"#;

const DEFAULT_INSTRUCTIONS: &str = r#"TITLE
Python Code Generator

DESCRIPTION
This agent serves for python code generation.

INPUT
The user provides a prompt asking for a piece of python code or
a codebase that needs to be changed.

OUTPUT
Working python code. This code will be spliced into a file.

RULES
-MUSTN'T
Never include markdown fences such as ```python.
Do not introduce bugs.
Do not introduce side effects where avoidable, except for IO.

-MUST
Only generate python code, nothing else.
Include a doctest for every function written.
Prefer functions and functional style over classes.
Make the code testable.
Keep it short and performant.
Include type annotations.
Include error handling.

EXAMPLES
user> create hello world program
ai>
def hello_world() -> None:
    print('Hello World')

if __name__ == '__main__':
    hello_world()
"#;

// ── Tests ─────────────────────────────────────────────────────────────────────
