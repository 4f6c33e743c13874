// src/main.rs
mod apply;
mod config;
mod credential;
mod fetch;
mod generate;
mod pipeline;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::apply::{setter_for, Platform};
use crate::config::Config;
use crate::credential::{load_env_file, resolve_credential, TerminalPrompt};

#[derive(Parser)]
#[command(name = "prompt-wallpaper")]
#[command(about = "Generate an image from a prompt and set it as the wallpaper", version)]
struct Cli {
    /// Image prompt; asked for interactively when omitted
    prompt: Option<String>,

    /// Where the generated image is saved
    #[arg(long, default_value = config::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Image model requested from the API
    #[arg(long, default_value = config::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = config::DEFAULT_API_BASE)]
    api_base: String,

    /// File the API key is stored in after manual entry
    #[arg(long, default_value = config::DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Environment variable holding the API key
    #[arg(long, default_value = config::DEFAULT_KEY_VAR)]
    key_var: String,

    /// Download timeout in seconds
    #[arg(long, default_value_t = config::DOWNLOAD_TIMEOUT.as_secs())]
    download_timeout: u64,

    /// Generation request timeout in seconds
    #[arg(long, default_value_t = config::REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> (Config, Option<String>) {
        let config = Config {
            key_var: self.key_var,
            env_file: self.env_file,
            api_base: self.api_base,
            model: self.model,
            output: self.output,
            download_timeout: Duration::from_secs(self.download_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            ..Config::default()
        };
        (config, self.prompt)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_prompt() -> io::Result<String> {
    print!("Enter a prompt for the image: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Takes the prompt from the command line or asks for it. Blank prompts are
/// rejected before anything else happens.
fn resolve_prompt(
    arg: Option<String>,
    read: impl FnOnce() -> io::Result<String>,
) -> anyhow::Result<String> {
    let prompt = match arg {
        Some(prompt) => prompt,
        None => {
            let line = read().context("failed to read prompt")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if prompt.trim().is_empty() {
        bail!("Configuration error: the image prompt is empty");
    }
    Ok(prompt)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, prompt) = cli.into_config();
    let setter = setter_for(&Platform::detect());

    let prompt = resolve_prompt(prompt, read_prompt)?;

    load_env_file(&config.env_file);
    let credential = resolve_credential(&config, &mut TerminalPrompt)?;

    pipeline::run(&config, &credential, &prompt, setter.as_ref())?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
