//! anonchat - CLI entry point.

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use anonchat::reply::{build_draft_messages, parse_draft};
use anonchat::{ChatClient, ChatMessage, ClientConfig};

/// Send a prompt to an anonymous chat backend.
#[derive(Parser, Debug)]
#[command(name = "anonchat")]
#[command(about = "Send a prompt to an anonymous chat backend")]
#[command(version)]
struct Cli {
    /// Prompt text (read from stdin when omitted)
    prompt: Option<String>,

    /// System message sent before the prompt
    #[arg(short, long)]
    system: Option<String>,

    /// Treat stdin as a staged diff and draft a commit message for it
    #[arg(long, conflicts_with = "prompt")]
    draft_commit: bool,

    /// Extra hint included in the commit draft prompt
    #[arg(short = 'm', long, requires = "draft_commit")]
    message: Option<String>,

    /// Print the messages that would be sent and exit
    #[arg(short = 'p', long)]
    print_prompt: bool,

    /// Print the full completion object as JSON
    #[arg(long)]
    json: bool,

    /// Backend origin (overrides ANONCHAT_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Step 1: Build the conversation
    let messages = if cli.draft_commit {
        let diff = read_stdin().await?;
        if diff.trim().is_empty() {
            bail!("No diff on stdin. Pipe `git diff --staged` into anonchat --draft-commit.");
        }
        build_draft_messages(&diff, cli.message.as_deref())
    } else {
        let prompt = match cli.prompt.clone() {
            Some(p) => p,
            None => read_stdin().await?,
        };
        if prompt.trim().is_empty() {
            bail!("Empty prompt. Pass it as an argument or on stdin.");
        }

        let mut messages = Vec::new();
        if let Some(system) = cli.system.as_deref() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    };

    if cli.print_prompt {
        for message in &messages {
            println!("[{}]\n{}\n", message.role, message.content);
        }
        return Ok(());
    }

    // Step 2: Configure the client
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.base_url.as_deref() {
        config = config.with_base_url(url);
    }
    let client = ChatClient::new(config).context("Failed to set up HTTP client")?;

    // Step 3: Run the completion
    let result = client
        .complete(&messages)
        .await
        .context("Completion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to render completion")?
        );
        return Ok(());
    }

    // Step 4: Print the reply
    if cli.draft_commit {
        let draft = parse_draft(result.content())
            .with_context(|| format!("Could not read a commit draft from: {}", result.content()))?;
        println!("{}", draft.format());
    } else {
        println!("{}", result.content());
    }

    Ok(())
}

/// Install the stderr subscriber; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "anonchat=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read stdin")?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_draft_commit_rejects_positional_prompt() {
        let err = Cli::try_parse_from(["anonchat", "--draft-commit", "hello"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_draft_commit_accepts_hint() {
        let cli = Cli::try_parse_from(["anonchat", "--draft-commit", "-m", "fixes #12"]).unwrap();
        assert!(cli.draft_commit);
        assert_eq!(cli.message.as_deref(), Some("fixes #12"));
        assert!(cli.prompt.is_none());
    }
}
